//! In-memory IP range index and lookup logic.
//!
//! This module contains the core data structures used for fast point lookups
//! of IPv4 addresses against a table of geo ranges.
//!
//! ## Structure
//!
//! - [`RangeIndex`] owns a sorted, non-overlapping table of [`Range`]s
//! - [`GeoRecord`] stores the location attached to a range
//! - [`RangeIndexBuilder`] collects raw ranges and enforces the invariants
//!
//! ## Performance characteristics
//!
//! - Lookups are `O(log n)` binary searches
//! - No heap allocation during lookup
//! - Building is `O(n log n)`
//!
//! ## Safety and correctness
//!
//! A built index guarantees that ranges are:
//!
//! - Well formed (`start <= end`)
//! - Non-overlapping
//! - Sorted by start address
//!
//! How conflicting input is handled is decided by [`OverlapPolicy`].
//!
//! Once built, an index is never mutated. Reloads build a fresh index and
//! publish it in one step (see [`crate::LookupService::replace`]).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Location attached to an address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRecord {
    pub country: String,
    pub country_code: String,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl GeoRecord {
    pub fn new(country: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            country_code: country_code.into(),
            region: None,
            city: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

/// A contiguous, inclusive block of addresses mapped to one record.
#[derive(Debug, Clone)]
pub struct Range {
    start: u32,
    end: u32,
    record: Arc<GeoRecord>,
}

impl Range {
    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn record(&self) -> &Arc<GeoRecord> {
        &self.record
    }

    #[inline]
    pub fn contains(&self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }

    /// Number of addresses covered (at most 2^32).
    pub fn size(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }
}

/// What to do when a newly added range overlaps one already in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Fail the build with [`Error::OverlappingRange`].
    #[default]
    Reject,
    /// The later range wins; earlier ranges are trimmed or split around it.
    LastWriteWins,
}

impl OverlapPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlapPolicy::Reject => "reject",
            OverlapPolicy::LastWriteWins => "last-write-wins",
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(OverlapPolicy::Reject),
            "last-write-wins" | "last_write_wins" | "lww" => Ok(OverlapPolicy::LastWriteWins),
            other => Err(format!(
                "unknown overlap policy {other:?} (expected \"reject\" or \"last-write-wins\")"
            )),
        }
    }
}

/// Accumulates ranges and produces a [`RangeIndex`].
///
/// Ranges may be pushed in any order.
#[derive(Debug, Default)]
pub struct RangeIndexBuilder {
    policy: OverlapPolicy,
    // start -> (end, record); kept non-overlapping after every push
    ranges: BTreeMap<u32, (u32, Arc<GeoRecord>)>,
    overlaps: usize,
}

impl RangeIndexBuilder {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            ranges: BTreeMap::new(),
            overlaps: 0,
        }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of overlaps resolved so far under [`OverlapPolicy::LastWriteWins`].
    pub fn overlaps_resolved(&self) -> usize {
        self.overlaps
    }

    /// Add the inclusive range `start..=end`.
    ///
    /// # Errors
    /// [`Error::InvalidRange`] if `start > end`; [`Error::OverlappingRange`]
    /// if the range conflicts with an earlier one and the policy is
    /// [`OverlapPolicy::Reject`].
    pub fn push(&mut self, start: u32, end: u32, record: impl Into<Arc<GeoRecord>>) -> Result<()> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        let record = record.into();

        match self.policy {
            OverlapPolicy::Reject => {
                // The only candidate is the last range starting at or before `end`.
                if let Some((&existing_start, &(existing_end, _))) =
                    self.ranges.range(..=end).next_back()
                {
                    if existing_end >= start {
                        return Err(Error::OverlappingRange {
                            start,
                            end,
                            existing_start,
                            existing_end,
                        });
                    }
                }
            }
            OverlapPolicy::LastWriteWins => self.carve_out(start, end),
        }

        self.ranges.insert(start, (end, record));
        Ok(())
    }

    /// Remove `start..=end` from every existing range, keeping the remainders.
    fn carve_out(&mut self, start: u32, end: u32) {
        let mut fragments = Vec::new();

        loop {
            let Some(s) = self
                .ranges
                .range(..=end)
                .next_back()
                .filter(|(_, (e, _))| *e >= start)
                .map(|(&s, _)| s)
            else {
                break;
            };
            let Some((e, record)) = self.ranges.remove(&s) else {
                break;
            };
            debug!(start, end, existing_start = s, existing_end = e, "range overlap replaced");
            self.overlaps += 1;

            if s < start {
                fragments.push((s, start - 1, Arc::clone(&record)));
            }
            if e > end {
                fragments.push((end + 1, e, record));
            }
        }

        for (s, e, record) in fragments {
            self.ranges.insert(s, (e, record));
        }
    }

    pub fn build(self) -> RangeIndex {
        if self.overlaps > 0 {
            warn!(
                overlaps = self.overlaps,
                policy = %self.policy,
                "resolved overlapping ranges while building index"
            );
        }

        let ranges = self
            .ranges
            .into_iter()
            .map(|(start, (end, record))| Range { start, end, record })
            .collect();

        RangeIndex { ranges }
    }
}

/// Immutable, sorted table of address ranges.
///
/// Shared read-only between all request handlers; lookups never lock.
#[derive(Debug, Default, Clone)]
pub struct RangeIndex {
    ranges: Vec<Range>,
}

impl RangeIndex {
    /// An index that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from `(start, end, record)` triples.
    ///
    /// # Examples
    /// ```
    /// use ip_geo_lookup::{GeoRecord, OverlapPolicy, RangeIndex};
    ///
    /// let index = RangeIndex::from_ranges(
    ///     [(16_777_216, 16_777_471, GeoRecord::new("United States", "US"))],
    ///     OverlapPolicy::Reject,
    /// )
    /// .unwrap();
    /// assert_eq!(index.lookup(16_777_316).unwrap().country_code, "US");
    /// assert!(index.lookup(16_777_472).is_none());
    /// ```
    pub fn from_ranges<I>(ranges: I, policy: OverlapPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, u32, GeoRecord)>,
    {
        let mut builder = RangeIndexBuilder::new(policy);
        for (start, end, record) in ranges {
            builder.push(start, end, record)?;
        }
        Ok(builder.build())
    }

    /// Find the record whose range contains `address`.
    ///
    /// Returns [`None`] if the address falls in a gap or outside all ranges.
    #[inline]
    pub fn lookup(&self, address: u32) -> Option<&Arc<GeoRecord>> {
        self.find_range(address).map(Range::record)
    }

    /// Look up a typed IPv4 address.
    #[inline]
    pub fn lookup_addr(&self, ip: Ipv4Addr) -> Option<&Arc<GeoRecord>> {
        self.lookup(ip.into())
    }

    /// Like [`RangeIndex::lookup`], returning the whole matching range.
    pub fn find_range(&self, address: u32) -> Option<&Range> {
        match self.ranges.binary_search_by_key(&address, |r| r.start) {
            Ok(idx) => Some(&self.ranges[idx]),
            Err(idx) => {
                if idx > 0 {
                    let range = &self.ranges[idx - 1];
                    if range.contains(address) {
                        return Some(range);
                    }
                }
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.ranges.iter()
    }

    /// Return basic statistics about the loaded index.
    pub fn stats(&self) -> IndexStats {
        let countries: HashSet<&str> = self
            .ranges
            .iter()
            .map(|r| r.record.country_code.as_str())
            .collect();

        IndexStats {
            total_ranges: self.ranges.len(),
            total_addresses: self.ranges.iter().map(Range::size).sum(),
            countries: countries.len(),
        }
    }
}

/// Summary counts for the index contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub total_ranges: usize,
    pub total_addresses: u64,
    pub countries: usize,
}
