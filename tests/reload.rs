//! Reloads under concurrent lookups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use ip_geo_lookup::{GeoRecord, LookupResult, LookupService, OverlapPolicy, RangeIndex};

/// Every range in a generation carries the same country code.
fn generation(code: &str, ranges: u32) -> RangeIndex {
    let triples = (0..ranges).map(|i| {
        let start = i * 1_000;
        (start, start + 999, GeoRecord::new(format!("Country {code}"), code))
    });
    RangeIndex::from_ranges(triples, OverlapPolicy::Reject).unwrap()
}

#[test]
fn test_lookups_see_whole_snapshots_during_reload() {
    let service = Arc::new(LookupService::new(generation("AA", 500)));
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut checked = 0u64;
                loop {
                    let snapshot = service.snapshot();
                    let first = snapshot.lookup(0).unwrap().country_code.clone();
                    let last = snapshot.lookup(499_999).unwrap().country_code.clone();
                    assert_eq!(first, last, "snapshot mixed two generations");
                    assert_eq!(snapshot.len(), 500);

                    match service.lookup("0.0.1.0") {
                        LookupResult::Found(record) => {
                            assert!(record.country_code == "AA" || record.country_code == "BB")
                        }
                        other => panic!("lookup during reload returned {other:?}"),
                    }
                    checked += 1;
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                }
                checked
            })
        })
        .collect();

    for i in 0..200 {
        let code = if i % 2 == 0 { "BB" } else { "AA" };
        service.replace(generation(code, 500));
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        let checked = reader.join().expect("reader thread panicked");
        assert!(checked > 0);
    }
}

#[test]
fn test_old_snapshot_outlives_replace() {
    let service = LookupService::new(generation("AA", 10));
    let old = service.snapshot();

    service.replace(generation("BB", 10));

    assert_eq!(old.lookup(5).unwrap().country_code, "AA");
    assert_eq!(service.snapshot().lookup(5).unwrap().country_code, "BB");
}
