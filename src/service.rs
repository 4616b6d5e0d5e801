//! Parse, look up, classify.
//!
//! [`LookupService`] is the single entry point used by the HTTP layer. It
//! owns the current [`RangeIndex`] behind an [`ArcSwap`], so lookups are
//! lock-free and a reload publishes a complete new index in one atomic
//! pointer swap. A lookup that started before a reload keeps reading the
//! snapshot it loaded.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info};

use crate::address::{ParseError, parse_ipv4};
use crate::database::{GeoRecord, RangeIndex};
use crate::error::Result;
use crate::loader::{self, LoadOptions, LoadReport};

/// Outcome of resolving one address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found(Arc<GeoRecord>),
    NotFound,
    Invalid(ParseError),
}

impl LookupResult {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }

    pub fn record(&self) -> Option<&GeoRecord> {
        match self {
            LookupResult::Found(record) => Some(record.as_ref()),
            _ => None,
        }
    }
}

/// Stateless lookup front-end over a shared, swappable index.
#[derive(Debug)]
pub struct LookupService {
    index: ArcSwap<RangeIndex>,
}

impl LookupService {
    pub fn new(index: RangeIndex) -> Self {
        Self {
            index: ArcSwap::from_pointee(index),
        }
    }

    /// Resolve `ip` against the current index.
    ///
    /// # Examples
    /// ```
    /// use ip_geo_lookup::{GeoRecord, LookupResult, LookupService, OverlapPolicy, RangeIndex};
    ///
    /// let index = RangeIndex::from_ranges(
    ///     [(16_777_216, 16_777_471, GeoRecord::new("United States", "US"))],
    ///     OverlapPolicy::Reject,
    /// )
    /// .unwrap();
    /// let service = LookupService::new(index);
    ///
    /// assert!(service.lookup("1.0.0.100").is_found());
    /// assert_eq!(service.lookup("192.168.1.1"), LookupResult::NotFound);
    /// assert!(matches!(service.lookup("invalid.ip"), LookupResult::Invalid(_)));
    /// ```
    pub fn lookup(&self, ip: &str) -> LookupResult {
        let address = match parse_ipv4(ip) {
            Ok(address) => address,
            Err(err) => {
                debug!(kind = %err.kind(), "rejected address");
                return LookupResult::Invalid(err);
            }
        };

        match self.index.load().lookup(address) {
            Some(record) => LookupResult::Found(Arc::clone(record)),
            None => LookupResult::NotFound,
        }
    }

    /// The index currently being served.
    pub fn snapshot(&self) -> Arc<RangeIndex> {
        self.index.load_full()
    }

    /// Publish `index`, returning the one it replaced.
    pub fn replace(&self, index: RangeIndex) -> Arc<RangeIndex> {
        let ranges = index.len();
        let previous = self.index.swap(Arc::new(index));
        info!(ranges, previous_ranges = previous.len(), "range index replaced");
        previous
    }

    /// Load a CSV dataset and publish it.
    ///
    /// The new index is built fully before the swap; if loading fails the
    /// index currently being served is left untouched.
    pub fn reload_from_csv<P: AsRef<Path>>(&self, path: P, options: &LoadOptions) -> Result<LoadReport> {
        let (index, report) = loader::load_csv(path, options)?;
        self.replace(index);
        Ok(report)
    }
}

impl Default for LookupService {
    fn default() -> Self {
        Self::new(RangeIndex::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ParseErrorKind;
    use crate::database::OverlapPolicy;
    use std::io::Write;

    fn service() -> LookupService {
        let index = RangeIndex::from_ranges(
            [
                (16_777_216, 16_777_471, GeoRecord::new("United States", "US").with_city("Los Angeles")),
                (16_777_472, 16_778_239, GeoRecord::new("China", "CN").with_city("Fuzhou")),
            ],
            OverlapPolicy::Reject,
        )
        .unwrap();
        LookupService::new(index)
    }

    #[test]
    fn test_found() {
        let result = service().lookup("1.0.0.100");
        let record = result.record().expect("1.0.0.100 should be found");
        assert_eq!(record.country_code, "US");
        assert_eq!(record.city.as_deref(), Some("Los Angeles"));
    }

    #[test]
    fn test_not_found() {
        assert_eq!(service().lookup("192.168.1.1"), LookupResult::NotFound);
        assert_eq!(service().lookup("1.0.4.0"), LookupResult::NotFound);
    }

    #[test]
    fn test_invalid_passes_reason_through() {
        let svc = service();
        for (input, kind) in [
            ("", ParseErrorKind::MissingInput),
            ("invalid.ip", ParseErrorKind::MalformedFormat),
            ("256.256.256.256", ParseErrorKind::OctetOutOfRange),
            ("1.2.3", ParseErrorKind::WrongOctetCount),
        ] {
            match svc.lookup(input) {
                LookupResult::Invalid(err) => assert_eq!(err.kind(), kind, "{input:?}"),
                other => panic!("{input:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn test_repeated_lookups_are_identical() {
        let svc = service();
        let first = svc.lookup("1.0.1.50");
        for _ in 0..100 {
            assert_eq!(svc.lookup("1.0.1.50"), first);
        }
    }

    #[test]
    fn test_replace_swaps_index() {
        let svc = service();
        let before = svc.snapshot();

        let replacement = RangeIndex::from_ranges(
            [(3_232_235_776, 3_232_236_031, GeoRecord::new("Private", "ZZ"))],
            OverlapPolicy::Reject,
        )
        .unwrap();
        let previous = svc.replace(replacement);

        assert_eq!(previous.len(), 2);
        assert!(svc.lookup("192.168.1.1").is_found());
        assert_eq!(svc.lookup("1.0.0.100"), LookupResult::NotFound);
        // Old snapshot still answers from the old data.
        assert!(before.lookup(16_777_316).is_some());
    }

    #[test]
    fn test_failed_reload_keeps_current_index() {
        let svc = service();
        let dir = tempfile::tempdir().unwrap();

        assert!(svc.reload_from_csv(dir.path().join("missing.csv"), &LoadOptions::default()).is_err());
        assert!(svc.lookup("1.0.0.100").is_found());
    }

    #[test]
    fn test_reload_from_csv() {
        let svc = service();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ip_from,ip_to,country_code,country_name,region_name,city_name").unwrap();
        writeln!(file, "134744072,134744072,US,United States,California,Mountain View").unwrap();

        let report = svc.reload_from_csv(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(report.rows_read, 1);
        assert_eq!(svc.lookup("8.8.8.8").record().unwrap().city.as_deref(), Some("Mountain View"));
        assert_eq!(svc.lookup("1.0.0.100"), LookupResult::NotFound);
    }

    #[test]
    fn test_default_is_empty() {
        assert_eq!(LookupService::default().lookup("8.8.8.8"), LookupResult::NotFound);
    }
}
