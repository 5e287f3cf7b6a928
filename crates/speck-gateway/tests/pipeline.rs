//! End-to-end pipeline tests wiring mock devices, a real store, and a mock
//! uploader through the gateway manager.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use speck_core::{
    ConnectivityEvent, ConnectivityManager, ConnectivityOptions, MockScanner, MockSpeck,
    RetryPolicy, SpeckDevice,
};
use speck_gateway::{Category, DataSampleManager, ManagerOptions, MockUploader, SampleUploader};
use speck_store::{DataSampleStore, SqliteSampleStore};
use speck_types::{DataSample, UploadStatus};

fn sample_at(secs: i64) -> DataSample {
    DataSample::builder()
        .sample_time_utc_secs(secs)
        .raw_particle_count(8)
        .particle_count(2.1)
        .temperature(71.6)
        .humidity(38.0)
        .build()
}

fn fast_options() -> ManagerOptions {
    ManagerOptions {
        upload_interval: Duration::from_millis(50),
        upload_batch_size: 100,
        download_idle_delay: Duration::from_millis(20),
        delete_retry: RetryPolicy::quick(),
    }
}

async fn wait_until<F, Fut>(what: &str, condition: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// A duplicate among downloaded samples counts as a failed save but the
/// fresh samples still land.
#[tokio::test]
async fn duplicate_download_counts_as_failed_save() {
    let store = Arc::new(SqliteSampleStore::open_in_memory().unwrap());
    // Sample 200 was already stored by an earlier run
    store.save(&sample_at(200));

    let uploader = Arc::new(MockUploader::new());
    let manager = DataSampleManager::new(
        Arc::clone(&store) as Arc<dyn DataSampleStore>,
        uploader as Arc<dyn SampleUploader>,
        fast_options(),
    )
    .unwrap();

    let device = Arc::new(MockSpeck::new("rerun"));
    device.connect();
    device
        .load_samples([sample_at(100), sample_at(200), sample_at(300)])
        .await;

    manager
        .spawn_download_loop(Arc::clone(&device) as Arc<dyn SpeckDevice>)
        .await;
    wait_until("device drained", || {
        let device = Arc::clone(&device);
        async move { device.pending_samples().await == 0 }
    })
    .await;

    assert_eq!(store.count_samples().unwrap(), 3);

    let stats = manager.stats();
    assert_eq!(stats.get(Category::SavesRequested), 3);
    assert_eq!(stats.get(Category::SavesSuccessful), 2);
    assert_eq!(stats.get(Category::SavesFailed), 1);

    manager.shutdown().await.unwrap();
}

/// A batch that fails to upload is released, re-claimed on the next tick,
/// and eventually succeeds, with the failure burned into each sample's
/// failure count.
#[tokio::test]
async fn failed_batch_is_released_and_retried() {
    let store = Arc::new(SqliteSampleStore::open_in_memory().unwrap());
    for secs in [100, 200, 300] {
        store.save(&sample_at(secs));
    }

    let uploader = Arc::new(MockUploader::new());
    uploader.set_transient_failures(2);

    let manager = DataSampleManager::new(
        Arc::clone(&store) as Arc<dyn DataSampleStore>,
        Arc::clone(&uploader) as Arc<dyn SampleUploader>,
        fast_options(),
    )
    .unwrap();

    manager.start().await.unwrap();
    wait_until("batch upload", || {
        let uploader = Arc::clone(&uploader);
        async move { uploader.batch_count().await >= 1 }
    })
    .await;

    assert_eq!(uploader.upload_count(), 3);
    assert_eq!(uploader.uploaded_timestamps().await, vec![100, 200, 300]);
    assert_eq!(store.count_with_status(UploadStatus::Success).unwrap(), 3);

    for secs in [100, 200, 300] {
        let stored = store.get_sample(secs).unwrap().unwrap();
        assert_eq!(stored.failure_count, 2);
        assert!(stored.upload_time_utc_millis.is_some());
    }

    manager.shutdown().await.unwrap();
}

/// Stat events per category arrive in the same order the counters moved,
/// and the last event carries the final counter value.
#[tokio::test]
async fn stat_events_track_counters_in_order() {
    let store = Arc::new(SqliteSampleStore::open_in_memory().unwrap());
    for secs in [100, 200] {
        store.save(&sample_at(secs));
    }

    let uploader = Arc::new(MockUploader::new());
    uploader.set_transient_failures(1);

    let manager = DataSampleManager::new(
        Arc::clone(&store) as Arc<dyn DataSampleStore>,
        Arc::clone(&uploader) as Arc<dyn SampleUploader>,
        fast_options(),
    )
    .unwrap();

    let stats = manager.stats();
    let mut events = stats.subscribe();

    manager.start().await.unwrap();
    wait_until("batch upload", || {
        let uploader = Arc::clone(&uploader);
        async move { uploader.batch_count().await >= 1 }
    })
    .await;
    manager.shutdown().await.unwrap();

    let mut last_per_category = std::collections::HashMap::new();
    while let Ok(event) = events.try_recv() {
        let previous = last_per_category.insert(event.category, event.value);
        if let Some(previous) = previous {
            assert!(
                event.value > previous,
                "{} went backwards: {} then {}",
                event.category,
                previous,
                event.value
            );
        }
    }

    for category in [
        Category::SampleUploadsRequested,
        Category::SampleUploadsSuccessful,
        Category::SampleUploadsFailed,
    ] {
        assert_eq!(last_per_category.get(&category), Some(&stats.get(category)));
    }
}

/// Full path: device found by the connectivity loop, drained into the
/// store, uploaded to the endpoint, and deleted off the device.
#[tokio::test]
async fn device_to_endpoint_round_trip() {
    let store = Arc::new(SqliteSampleStore::open_in_memory().unwrap());
    let uploader = Arc::new(MockUploader::new());
    let manager = Arc::new(
        DataSampleManager::new(
            Arc::clone(&store) as Arc<dyn DataSampleStore>,
            Arc::clone(&uploader) as Arc<dyn SampleUploader>,
            fast_options(),
        )
        .unwrap(),
    );
    manager.start().await.unwrap();

    let device = Arc::new(MockSpeck::new("end-to-end"));
    device
        .load_samples([sample_at(10), sample_at(20), sample_at(30)])
        .await;

    let scanner = Arc::new(MockScanner::new(Arc::clone(&device)));
    scanner.set_transient_failures(1);
    let connectivity = Arc::new(
        ConnectivityManager::new(
            scanner,
            ConnectivityOptions {
                retry: RetryPolicy::fixed_delay(Duration::from_millis(10)),
                ping_interval: Duration::from_millis(50),
            },
        )
        .unwrap(),
    );

    let mut events = connectivity.subscribe();
    connectivity.connect().await;

    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("event channel closed");
        if let ConnectivityEvent::Connected { config, .. } = event {
            assert_eq!(config.id, "end-to-end");
            break;
        }
    }

    let connected = connectivity.device().await.expect("device should be held");
    manager.spawn_download_loop(connected).await;

    wait_until("samples uploaded", || {
        let uploader = Arc::clone(&uploader);
        async move { uploader.uploaded_timestamps().await.len() == 3 }
    })
    .await;

    assert_eq!(uploader.uploaded_timestamps().await, vec![10, 20, 30]);
    assert_eq!(device.pending_samples().await, 0);
    assert_eq!(store.count_with_status(UploadStatus::Success).unwrap(), 3);

    let stats = manager.stats();
    assert_eq!(stats.get(Category::DownloadsSuccessful), 3);
    assert_eq!(stats.get(Category::SavesSuccessful), 3);
    assert_eq!(stats.get(Category::SampleUploadsSuccessful), 3);

    connectivity.disconnect().await;
    manager.shutdown().await.unwrap();
}

/// Samples survive a crash between download and upload: a new manager over
/// the same database finishes the job.
#[tokio::test]
async fn upload_resumes_after_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("samples.db");

    {
        let store = Arc::new(SqliteSampleStore::open(&db_path).unwrap());
        for secs in [100, 200] {
            store.save(&sample_at(secs));
        }
        // Claim as an in-flight upload would, then drop everything without
        // a clean shutdown
        let claimed = store.samples_to_upload(10).unwrap();
        assert_eq!(claimed.len(), 2);
    }

    let store = Arc::new(SqliteSampleStore::open(&db_path).unwrap());
    let uploader = Arc::new(MockUploader::new());
    let manager = DataSampleManager::new(
        Arc::clone(&store) as Arc<dyn DataSampleStore>,
        Arc::clone(&uploader) as Arc<dyn SampleUploader>,
        fast_options(),
    )
    .unwrap();

    manager.start().await.unwrap();
    wait_until("recovered upload", || {
        let uploader = Arc::clone(&uploader);
        async move { uploader.batch_count().await >= 1 }
    })
    .await;

    assert_eq!(uploader.uploaded_timestamps().await, vec![100, 200]);
    assert_eq!(store.count_with_status(UploadStatus::Success).unwrap(), 2);

    manager.shutdown().await.unwrap();
}
