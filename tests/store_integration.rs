use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;

use berrykv::{Config, GetError, RecordError, Store};
use tempfile::tempdir;

fn quiet_config() -> Config {
    // Long enough that the background workers never fire mid-test.
    Config {
        max_segment_size: 200 * 1024 * 1024,
        rotation_period: Duration::from_secs(3600),
        merge_period: Duration::from_secs(3600),
    }
}

#[test]
fn crc_detects_single_byte_corruption_in_the_value_region() {
    let dir = tempdir().unwrap();
    let store = Store::with_config(dir.path(), quiet_config()).unwrap();
    store.set("k", "a value worth protecting").unwrap();
    store.close().unwrap();

    let segment_path = dir.path().join("berry_0.db");
    let mut file = OpenOptions::new().write(true).open(&segment_path).unwrap();
    // Flip a byte well inside the value region (past the 16-byte
    // header and the one-byte key).
    file.seek(SeekFrom::Start(20)).unwrap();
    file.write_all(&[0xFF]).unwrap();
    drop(file);

    let store = Store::with_config(dir.path(), quiet_config()).unwrap();
    match store.get("k") {
        Err(GetError::SegmentError(_)) => {}
        other => panic!("expected a segment error surfacing the CRC mismatch, got {other:?}"),
    }
}

#[test]
fn record_round_trips_exactly() {
    use berrykv::Record;

    let r = Record::new("a-key", "a-value", 1_700_000_000);
    let encoded = r.encode();
    let decoded = Record::decode(&encoded).unwrap();
    assert_eq!(decoded.encode(), encoded);
}

#[test]
fn illegal_entry_is_reported_for_truncated_records() {
    use berrykv::Record;

    let encoded = Record::new("k", "v", 0).encode();
    let truncated = &encoded[..encoded.len() - 1];
    assert!(matches!(
        Record::decode(truncated),
        Err(RecordError::IllegalEntry { .. })
    ));
}

#[test]
fn merge_preserves_the_live_set_observed_before_it_ran() {
    let dir = tempdir().unwrap();
    let config = Config {
        max_segment_size: 8,
        rotation_period: Duration::from_millis(15),
        merge_period: Duration::from_millis(30),
    };
    let store = Store::with_config(dir.path(), config).unwrap();

    for i in 0..40 {
        store.set(&format!("key-{i}"), &format!("value-{i}")).unwrap();
    }
    store.set("key-3", "overwritten").unwrap();
    store.del("key-5").unwrap();

    std::thread::sleep(Duration::from_millis(300));

    for i in 0..40 {
        let key = format!("key-{i}");
        if i == 5 {
            assert!(matches!(store.get(&key), Err(GetError::KeyNotFound)));
        } else if i == 3 {
            assert_eq!(store.get(&key).unwrap(), "overwritten");
        } else {
            assert_eq!(store.get(&key).unwrap(), format!("value-{i}"));
        }
    }

    let segment_files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("db"))
        .collect();
    assert_eq!(segment_files.len(), 1);
    assert_eq!(segment_files[0].file_name().unwrap(), "berry_0.db");
}

#[test]
fn rotation_keeps_exactly_one_active_segment_among_several() {
    let dir = tempdir().unwrap();
    let config = Config {
        max_segment_size: 16,
        rotation_period: Duration::from_millis(15),
        merge_period: Duration::from_secs(3600),
    };
    let store = Store::with_config(dir.path(), config).unwrap();

    for i in 0..60 {
        store.set(&format!("k{i}"), "0123456789").unwrap();
    }
    std::thread::sleep(Duration::from_millis(300));

    for i in 0..60 {
        assert_eq!(store.get(&format!("k{i}")).unwrap(), "0123456789");
    }

    let segment_files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("db"))
        .collect();
    assert!(segment_files.len() > 1);
}
