//! On-disk recovery and lifecycle tests for the recoverable store.

use speck_store::{CsvSampleStore, DataSampleStore, SqliteSampleStore};
use speck_types::{DataSample, SaveResult, UploadStatus};

fn sample_at(secs: i64) -> DataSample {
    DataSample::builder()
        .sample_time_utc_secs(secs)
        .raw_particle_count(40)
        .particle_count(12.5)
        .temperature(71.3)
        .humidity(41.0)
        .download_time_utc_millis(secs * 1000 + 250)
        .build()
}

#[test]
fn crash_recovery_reclaims_inflight_samples() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("samples.db");

    // First process: save five samples and claim them all, then "crash"
    // (drop without shutdown)
    {
        let store = SqliteSampleStore::open(&db_path).unwrap();
        for secs in 1..=5 {
            assert_eq!(store.save(&sample_at(secs)), SaveResult::Success);
        }
        let claimed = store.samples_to_upload(10).unwrap();
        assert_eq!(claimed.len(), 5);
    }

    // Second process: startup recovery makes every sample claimable again
    let store = SqliteSampleStore::open(&db_path).unwrap();
    assert_eq!(store.reset_uploading_samples().unwrap(), 5);

    let reclaimed = store.samples_to_upload(10).unwrap();
    let timestamps: Vec<i64> = reclaimed.timestamps().collect();
    assert_eq!(timestamps, vec![1, 2, 3, 4, 5]);
}

#[test]
fn upload_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("samples.db");

    {
        let store = SqliteSampleStore::open(&db_path).unwrap();
        for secs in [100, 200, 300] {
            store.save(&sample_at(secs));
        }
        let set = store.samples_to_upload(2).unwrap();
        store.mark_uploaded(&set, 400_000).unwrap();
        store.shutdown().unwrap();
    }

    let store = SqliteSampleStore::open(&db_path).unwrap();
    // Nothing was left in progress
    assert_eq!(store.reset_uploading_samples().unwrap(), 0);
    assert_eq!(
        store.count_with_status(UploadStatus::Success).unwrap(),
        2
    );

    // Uploaded samples stay terminal across the restart
    let pending = store.samples_to_upload(10).unwrap();
    let timestamps: Vec<i64> = pending.timestamps().collect();
    assert_eq!(timestamps, vec![300]);

    let uploaded = store.get_sample(100).unwrap().unwrap();
    assert_eq!(uploaded.upload_status, UploadStatus::Success);
    assert_eq!(uploaded.upload_time_utc_millis, Some(400_000));
}

#[test]
fn claim_fail_reclaim_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("samples.db");
    let store = SqliteSampleStore::open(&db_path).unwrap();

    for secs in [100, 200, 300] {
        store.save(&sample_at(secs));
    }

    // Claim two; the third stays pending
    let set = store.samples_to_upload(2).unwrap();
    let claimed: Vec<i64> = set.timestamps().collect();
    assert_eq!(claimed, vec![100, 200]);
    assert_eq!(
        store.get_sample(300).unwrap().unwrap().upload_status,
        UploadStatus::NotAttempted
    );

    // Failing the pair returns it; the next claim sees all three in order
    store.mark_failed(&set).unwrap();
    let all = store.samples_to_upload(10).unwrap();
    let timestamps: Vec<i64> = all.timestamps().collect();
    assert_eq!(timestamps, vec![100, 200, 300]);
}

#[test]
fn saved_sample_round_trips_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("samples.db");
    let store = SqliteSampleStore::open(&db_path).unwrap();

    let sample = DataSample::builder()
        .sample_time_utc_secs(1_392_853_434)
        .raw_particle_count(1234)
        .particle_count(0.25)
        .temperature(-4.5)
        .humidity(99.5)
        .download_time_utc_millis(1_392_853_500_123)
        .build();
    assert_eq!(store.save(&sample), SaveResult::Success);

    let stored = store.get_sample(1_392_853_434).unwrap().unwrap();
    assert_eq!(stored.sample, sample);
}

#[test]
fn csv_archive_imports_into_recoverable_store() {
    let dir = tempfile::tempdir().unwrap();

    // Archive a few samples through the degraded CSV store
    let archive = CsvSampleStore::open(dir.path()).unwrap();
    for secs in [100, 200, 300] {
        assert_eq!(archive.save(&sample_at(secs)), SaveResult::Success);
    }
    let csv_path = archive.path().to_path_buf();
    archive.shutdown().unwrap();

    // Import them into the recoverable store and claim them back in order
    let store = SqliteSampleStore::open(dir.path().join("samples.db")).unwrap();
    let outcome = store.import_csv(&csv_path).unwrap();
    assert_eq!(outcome.imported, 3);
    assert_eq!(outcome.duplicates, 0);
    assert_eq!(outcome.failed, 0);

    let set = store.samples_to_upload(10).unwrap();
    let timestamps: Vec<i64> = set.timestamps().collect();
    assert_eq!(timestamps, vec![100, 200, 300]);
    assert_eq!(set.iter().next().unwrap(), &sample_at(100));
}
