//! The map service running on the LMDB backend, end to end.

use std::sync::Arc;
use std::thread;

use mapkeeper_rpc::{MapService, ResponseCode};
use mapkeeper_store::{RetryPolicy, ScanLimits, ScanOrder, ScanRange};
use mapkeeper_store_lmdb::{EnvironmentConfig, LmdbBackend};

fn temp_service() -> (tempfile::TempDir, Arc<MapService<LmdbBackend>>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = EnvironmentConfig::new(dir.path().join("data"));
    config.map_size = 64 * 1024 * 1024;
    let backend = LmdbBackend::open(config, RetryPolicy::default()).expect("open backend");
    let service = MapService::new(Arc::new(backend));
    service.load().expect("load");
    (dir, Arc::new(service))
}

#[test]
fn sample_client_session_on_lmdb() {
    let (_dir, svc) = temp_service();
    assert_eq!(svc.ping(), ResponseCode::Success);
    assert_eq!(svc.add_map("db1"), ResponseCode::Success);
    assert_eq!(svc.add_map("db1"), ResponseCode::MapExists);

    assert_eq!(svc.insert("db1", b"k1", b"v1"), ResponseCode::Success);
    assert_eq!(svc.insert("db1", b"k1", b"v1"), ResponseCode::RecordExists);
    assert_eq!(svc.get("db1", b"k1").value, Some(b"v1".to_vec()));
    assert_eq!(svc.update("db1", b"k1", b"v2"), ResponseCode::Success);
    assert_eq!(svc.get("db1", b"k1").value, Some(b"v2".to_vec()));
    assert_eq!(svc.remove("db1", b"k1"), ResponseCode::Success);
    assert_eq!(svc.get("db1", b"k1").code, ResponseCode::RecordNotFound);

    for i in 0..10 {
        let key = format!("key{i}");
        let value = format!("val{i}");
        assert_eq!(
            svc.insert("db1", key.as_bytes(), value.as_bytes()),
            ResponseCode::Success
        );
    }
    let range = ScanRange::new(ScanOrder::Descending, "key4", true, "key9", false);
    let limited = svc.scan("db1", &range, ScanLimits::new(0, 16));
    assert_eq!(limited.code, ResponseCode::Success);
    assert_eq!(limited.records.len(), 2);
    assert_eq!(limited.records[0].key, b"key8");

    let all = svc.scan("db1", &range, ScanLimits::unlimited());
    assert_eq!(all.code, ResponseCode::ScanEnded);
    assert_eq!(all.records.len(), 5);

    assert_eq!(svc.drop_map("db1"), ResponseCode::Success);
    assert_eq!(svc.list_maps().1, Vec::<String>::new());
}

#[test]
fn concurrent_writers_and_scanners() {
    let (_dir, svc) = temp_service();
    svc.add_map("shared");

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{t}-{i:03}");
                    assert_eq!(
                        svc.insert("shared", key.as_bytes(), b"x"),
                        ResponseCode::Success
                    );
                }
            })
        })
        .collect();
    let scanner = {
        let svc = Arc::clone(&svc);
        thread::spawn(move || {
            for _ in 0..20 {
                let result = svc.scan(
                    "shared",
                    &ScanRange::full(ScanOrder::Ascending),
                    ScanLimits::unlimited(),
                );
                assert_eq!(result.code, ResponseCode::ScanEnded);
                assert!(result.records.windows(2).all(|w| w[0].key < w[1].key));
            }
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    scanner.join().unwrap();

    let all = svc.scan(
        "shared",
        &ScanRange::full(ScanOrder::Ascending),
        ScanLimits::unlimited(),
    );
    assert_eq!(all.records.len(), 200);
}
