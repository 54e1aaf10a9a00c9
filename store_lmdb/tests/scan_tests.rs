use std::collections::BTreeMap;

use proptest::prelude::*;

use mapkeeper_store::{
    collect_scan, MapBackend, OrderedMap, RetryPolicy, ScanLimits, ScanOrder, ScanRange,
    ScanStatus,
};
use mapkeeper_store_lmdb::{EnvironmentConfig, LmdbBackend, LmdbStore};

fn temp_backend() -> (tempfile::TempDir, LmdbBackend) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = EnvironmentConfig::new(dir.path().join("data"));
    config.map_size = 32 * 1024 * 1024;
    let backend = LmdbBackend::open(config, RetryPolicy::default()).expect("open backend");
    (dir, backend)
}

/// key0..key9 with values val0..val9.
fn ten_keys(backend: &LmdbBackend) -> LmdbStore {
    let map = backend.create_map("scan").unwrap();
    for i in 0..10 {
        map.insert(format!("key{i}").as_bytes(), format!("val{i}").as_bytes())
            .unwrap();
    }
    map
}

fn keys_of(map: &LmdbStore, range: ScanRange, limits: ScanLimits) -> (Vec<String>, ScanStatus) {
    let outcome = collect_scan(map.scan(&range).unwrap(), limits).unwrap();
    let keys = outcome
        .records
        .iter()
        .map(|r| String::from_utf8(r.key.clone()).unwrap())
        .collect();
    (keys, outcome.status)
}

fn expect(keys: &[u8]) -> Vec<String> {
    keys.iter().map(|i| format!("key{i}")).collect()
}

#[test]
fn full_ascending_scan_returns_every_pair() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let outcome = collect_scan(
        map.scan(&ScanRange::full(ScanOrder::Ascending)).unwrap(),
        ScanLimits::unlimited(),
    )
    .unwrap();
    assert_eq!(outcome.status, ScanStatus::Ended);
    assert_eq!(outcome.records.len(), 10);
    for (i, record) in outcome.records.iter().enumerate() {
        assert_eq!(record.key, format!("key{i}").into_bytes());
        assert_eq!(record.value, format!("val{i}").into_bytes());
    }
}

#[test]
fn excluding_an_empty_start_changes_nothing() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Ascending, "", false, "key5", true);
    let (keys, status) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[0, 1, 2, 3, 4, 5]));
    assert_eq!(status, ScanStatus::Ended);
}

#[test]
fn empty_start_ascending_stops_at_end() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Ascending, "", true, "key3", false);
    let (keys, status) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[0, 1, 2]));
    assert_eq!(status, ScanStatus::Ended);
}

#[test]
fn empty_start_descending_from_end_key() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Descending, "", true, "key5", true);
    let (keys, _) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[5, 4, 3, 2, 1, 0]));

    let range = ScanRange::new(ScanOrder::Descending, "", false, "", true);
    let (keys, status) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[9, 8, 7, 6, 5, 4, 3, 2, 1, 0]));
    assert_eq!(status, ScanStatus::Ended);
}

#[test]
fn single_record_unbounded_both_ways() {
    let (_dir, backend) = temp_backend();
    let map = backend.create_map("one").unwrap();
    map.insert(b"only", b"v").unwrap();
    for order in [ScanOrder::Ascending, ScanOrder::Descending] {
        let outcome = collect_scan(
            map.scan(&ScanRange::new(order, "", true, "", true)).unwrap(),
            ScanLimits::unlimited(),
        )
        .unwrap();
        assert_eq!(outcome.status, ScanStatus::Ended);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].key, b"only");
    }
}

#[test]
fn ascending_inclusive_start_exclusive_end() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Ascending, "key2", true, "key7", false);
    let (keys, _) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[2, 3, 4, 5, 6]));
}

#[test]
fn ascending_exclusive_start_skips_the_start_key() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Ascending, "key2", false, "key4", true);
    let (keys, _) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[3, 4]));
}

#[test]
fn descending_exclusive_start_unbounded_end() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Descending, "key3", false, "", true);
    let (keys, status) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[9, 8, 7, 6, 5, 4]));
    assert_eq!(status, ScanStatus::Ended);
}

#[test]
fn record_limit_reports_limit_reached() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Ascending, "key4", true, "", true);
    let (keys, status) = keys_of(&map, range, ScanLimits::new(3, 0));
    assert_eq!(keys, expect(&[4, 5, 6]));
    assert_eq!(status, ScanStatus::LimitReached);
}

#[test]
fn byte_limit_reports_limit_reached() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    // Each record is 8 bytes, so 16 bytes covers two of them.
    let range = ScanRange::new(ScanOrder::Descending, "key4", true, "key9", false);
    let (keys, status) = keys_of(&map, range, ScanLimits::new(0, 16));
    assert_eq!(keys, expect(&[8, 7]));
    assert_eq!(status, ScanStatus::LimitReached);
}

#[test]
fn descending_end_past_last_key_starts_at_last_key() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Descending, "key7", true, "zzz", true);
    let (keys, _) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[9, 8, 7]));
}

#[test]
fn descending_end_between_keys_filters_the_overshoot() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    // "key5a" sorts between key5 and key6; the cursor lands on key6 first.
    let range = ScanRange::new(ScanOrder::Descending, "key3", true, "key5a", true);
    let (keys, _) = keys_of(&map, range, ScanLimits::unlimited());
    assert_eq!(keys, expect(&[5, 4, 3]));
}

#[test]
fn inverted_bounds_yield_nothing() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    for order in [ScanOrder::Ascending, ScanOrder::Descending] {
        let range = ScanRange::new(order, "key7", true, "key3", true);
        let (keys, status) = keys_of(&map, range, ScanLimits::unlimited());
        assert!(keys.is_empty());
        assert_eq!(status, ScanStatus::Ended);
    }
}

#[test]
fn empty_map_scans_end_immediately() {
    let (_dir, backend) = temp_backend();
    let map = backend.create_map("empty").unwrap();
    for order in [ScanOrder::Ascending, ScanOrder::Descending] {
        let mut scan = map.scan(&ScanRange::full(order)).unwrap();
        assert!(scan.is_exhausted());
        assert!(scan.next().is_none());
    }
}

#[test]
fn exhausted_scanner_stays_ended() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let range = ScanRange::new(ScanOrder::Ascending, "key8", true, "", true);
    let mut scan = map.scan(&range).unwrap();
    assert!(scan.next().is_some());
    assert!(scan.next().is_some());
    assert!(scan.next().is_none());
    assert!(scan.is_exhausted());
    assert!(scan.next().is_none());
    assert!(scan.next().is_none());
}

#[test]
fn scan_reads_a_consistent_snapshot() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let mut scan = map.scan(&ScanRange::full(ScanOrder::Ascending)).unwrap();
    let first = scan.next().unwrap().unwrap();
    assert_eq!(first.key, b"key0");

    map.remove(b"key5").unwrap();
    map.insert(b"key55", b"late").unwrap();

    let rest: Vec<_> = scan.map(|r| r.unwrap().key).collect();
    assert_eq!(rest.len(), 9);
    assert!(rest.contains(&b"key5".to_vec()));
    assert!(!rest.contains(&b"key55".to_vec()));
}

#[test]
fn scan_through_trait_object() {
    let (_dir, backend) = temp_backend();
    let map = ten_keys(&backend);
    let map: &dyn OrderedMap = &map;
    let range = ScanRange::new(ScanOrder::Descending, "key0", true, "key2", true);
    let keys: Vec<_> = map
        .scan(&range)
        .unwrap()
        .map(|r| r.unwrap().key)
        .collect();
    assert_eq!(keys, vec![b"key2".to_vec(), b"key1".to_vec(), b"key0".to_vec()]);
}

// ---------------------------------------------------------------------------
// Model check against an in-memory ordered map
// ---------------------------------------------------------------------------

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 1..4)
}

/// Empty bounds get their own branch so unbounded scans show up often.
fn bound_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        1 => Just(Vec::new()),
        2 => prop::collection::vec(0u8..4, 1..4),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Scans return exactly the stored keys inside the bounds, strictly
    /// ordered in the requested direction.
    #[test]
    fn scan_matches_model(
        keys in prop::collection::btree_set(key_strategy(), 0..24),
        start in bound_strategy(),
        start_included in any::<bool>(),
        end in bound_strategy(),
        end_included in any::<bool>(),
        descending in any::<bool>(),
    ) {
        let (_dir, backend) = temp_backend();
        let map = backend.create_map("model").unwrap();
        let mut model = BTreeMap::new();
        for key in &keys {
            let value = key.iter().rev().copied().collect::<Vec<u8>>();
            map.insert(key, &value).unwrap();
            model.insert(key.clone(), value);
        }

        let order = if descending { ScanOrder::Descending } else { ScanOrder::Ascending };
        let range = ScanRange::new(order, start, start_included, end, end_included);

        let mut expected: Vec<(Vec<u8>, Vec<u8>)> = model
            .into_iter()
            .filter(|(k, _)| range.contains(k))
            .collect();
        if descending {
            expected.reverse();
        }

        let actual: Vec<(Vec<u8>, Vec<u8>)> = map
            .scan(&range)
            .unwrap()
            .map(|r| r.map(|r| (r.key, r.value)).unwrap())
            .collect();
        prop_assert_eq!(actual, expected);
    }
}
