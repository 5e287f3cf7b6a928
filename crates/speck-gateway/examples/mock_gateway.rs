//! Run the full gateway pipeline against a mock device.
//!
//! Run with: `cargo run -p speck-gateway --example mock_gateway`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use speck_core::{
    ConnectivityEvent, ConnectivityManager, ConnectivityOptions, MockScanner, MockSpeck,
    RetryPolicy,
};
use speck_gateway::{DataSampleManager, ManagerOptions, SampleUploader, UploadError};
use speck_store::SqliteSampleStore;
use speck_types::{DataSample, DataSampleSet};
use time::OffsetDateTime;

/// Stands in for the remote datastore endpoint: logs each batch and accepts it.
struct LoggingUploader;

#[async_trait]
impl SampleUploader for LoggingUploader {
    async fn upload(&self, samples: &DataSampleSet) -> Result<(), UploadError> {
        info!("Uploading batch of {} samples to the endpoint", samples.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Recoverable store, kept in memory for the demo
    let store = Arc::new(SqliteSampleStore::open_in_memory()?);
    let manager = Arc::new(DataSampleManager::new(
        store,
        Arc::new(LoggingUploader),
        ManagerOptions {
            upload_interval: Duration::from_millis(500),
            ..ManagerOptions::default()
        },
    )?);

    // Print pipeline statistics as they change
    let mut stat_events = manager.stats().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = stat_events.recv().await {
            info!("[stats] {} = {}", event.category, event.value);
        }
    });

    manager.start().await?;

    // A mock Speck with a few minutes of recorded samples, found on the
    // third scan attempt
    let device = Arc::new(MockSpeck::new("DEMO-01"));
    let now = OffsetDateTime::now_utc().unix_timestamp();
    device
        .load_samples((0..5i64).map(|i| {
            DataSample::builder()
                .sample_time_utc_secs(now - 60 * (5 - i))
                .raw_particle_count(40 + i as u32)
                .particle_count(12.5 + i as f32)
                .temperature(68.0)
                .humidity(41.0)
                .build()
        }))
        .await;

    let scanner = Arc::new(MockScanner::new(Arc::clone(&device)));
    scanner.set_transient_failures(2);

    let connectivity = Arc::new(ConnectivityManager::new(
        scanner,
        ConnectivityOptions {
            retry: RetryPolicy::fixed_delay(Duration::from_millis(200)),
            ping_interval: Duration::from_secs(1),
        },
    )?);

    let mut events = connectivity.subscribe();
    connectivity.connect().await;

    // Hand the device to the download pipeline once the scan loop finds it
    while let Ok(event) = events.recv().await {
        match event {
            ConnectivityEvent::ScanFailed { attempt } => {
                info!("Still scanning (attempt {})", attempt);
            }
            ConnectivityEvent::Connected { config, port } => {
                info!("Found {} on {}", config, port);
                if let Some(device) = connectivity.device().await {
                    manager.spawn_download_loop(device).await;
                }
                break;
            }
            ConnectivityEvent::ConnectionLost => {}
            // ConnectivityEvent is #[non_exhaustive]
            _ => {}
        }
    }

    // Let the pipeline drain the device and push a couple of batches
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stats = manager.stats();
    info!("Final counters:");
    for event in stats.snapshot() {
        info!("  {:<30} {}", event.category.label(), event.value);
    }

    connectivity.disconnect().await;
    manager.shutdown().await?;
    Ok(())
}
