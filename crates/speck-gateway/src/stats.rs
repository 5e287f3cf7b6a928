//! Statistics tracking for gateway activity.
//!
//! [`Statistics`] keeps one increment-only counter per [`Category`] and
//! broadcasts a [`StatisticEvent`] on every change. The counter update and
//! the event send happen under one lock, so the event stream for a single
//! category always matches the order of its counter values; no ordering is
//! promised across categories.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Categories of tracked gateway activity.
///
/// `Requested` categories count attempts: a download request that finds the
/// device drained resolves as neither successful nor failed, so
/// `DownloadsRequested` can exceed the sum of its outcomes. Saves and sample
/// uploads resolve every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Sample reads attempted against the device.
    DownloadsRequested,
    /// Samples obtained from the device.
    DownloadsSuccessful,
    /// Sample reads that failed.
    DownloadsFailed,
    /// Samples handed to the store.
    SavesRequested,
    /// Samples persisted.
    SavesSuccessful,
    /// Samples the store did not persist (I/O failure or duplicate).
    SavesFailed,
    /// Archive file uploads attempted.
    FileUploadsRequested,
    /// Archive file uploads completed.
    FileUploadsSuccessful,
    /// Archive file uploads that failed.
    FileUploadsFailed,
    /// Samples claimed for upload.
    SampleUploadsRequested,
    /// Samples uploaded and acknowledged.
    SampleUploadsSuccessful,
    /// Samples whose upload attempt failed.
    SampleUploadsFailed,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 12;

    /// Every category, in display order.
    pub const ALL: [Category; Self::COUNT] = [
        Category::DownloadsRequested,
        Category::DownloadsSuccessful,
        Category::DownloadsFailed,
        Category::SavesRequested,
        Category::SavesSuccessful,
        Category::SavesFailed,
        Category::FileUploadsRequested,
        Category::FileUploadsSuccessful,
        Category::FileUploadsFailed,
        Category::SampleUploadsRequested,
        Category::SampleUploadsSuccessful,
        Category::SampleUploadsFailed,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Category::DownloadsRequested => "Downloads requested",
            Category::DownloadsSuccessful => "Downloads successful",
            Category::DownloadsFailed => "Downloads failed",
            Category::SavesRequested => "Saves requested",
            Category::SavesSuccessful => "Saves successful",
            Category::SavesFailed => "Saves failed",
            Category::FileUploadsRequested => "File uploads requested",
            Category::FileUploadsSuccessful => "File uploads successful",
            Category::FileUploadsFailed => "File uploads failed",
            Category::SampleUploadsRequested => "Sample uploads requested",
            Category::SampleUploadsSuccessful => "Sample uploads successful",
            Category::SampleUploadsFailed => "Sample uploads failed",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Broadcast notification for one counter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticEvent {
    /// Which counter changed.
    pub category: Category,
    /// The counter's new value.
    pub value: u64,
}

/// Thread-safe activity counters with change notification.
///
/// Counters only grow, except through [`reset`](Self::reset). Listeners
/// subscribe to a broadcast channel; a send never blocks the mutator, and
/// slow listeners lose old events rather than stalling counting.
pub struct Statistics {
    counters: Mutex<[u64; Category::COUNT]>,
    events: broadcast::Sender<StatisticEvent>,
}

impl Statistics {
    /// Create a statistics tracker with the default event buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Create a statistics tracker with the given event buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            counters: Mutex::new([0; Category::COUNT]),
            events,
        }
    }

    /// Subscribe to counter-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatisticEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, [u64; Category::COUNT]> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Increment a counter by one and return its new value.
    pub fn increment(&self, category: Category) -> u64 {
        self.add(category, 1)
    }

    /// Increase a counter and return its new value.
    pub fn add(&self, category: Category, delta: u64) -> u64 {
        let mut counters = self.lock();
        counters[category.index()] += delta;
        let value = counters[category.index()];
        // Ignore error if no receivers
        let _ = self.events.send(StatisticEvent { category, value });
        value
    }

    /// Current value of one counter.
    pub fn get(&self, category: Category) -> u64 {
        self.lock()[category.index()]
    }

    /// Current value of every counter, in [`Category::ALL`] order.
    pub fn snapshot(&self) -> Vec<StatisticEvent> {
        let counters = self.lock();
        Category::ALL
            .iter()
            .map(|&category| StatisticEvent {
                category,
                value: counters[category.index()],
            })
            .collect()
    }

    /// Zero every counter, notifying listeners of each change.
    ///
    /// Meant for explicit user action; the gateway never resets counters on
    /// its own.
    pub fn reset(&self) {
        let mut counters = self.lock();
        for category in Category::ALL {
            counters[category.index()] = 0;
            let _ = self.events.send(StatisticEvent { category, value: 0 });
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}
