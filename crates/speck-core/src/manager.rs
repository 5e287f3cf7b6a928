//! Background connectivity management.
//!
//! [`ConnectivityManager`] owns the scan/connect/ping lifecycle for one
//! Speck device: it discovers the device through a [`DeviceScanner`], retries
//! on a backoff schedule while the device is absent, watches liveness with
//! periodic pings once connected, and reports every transition through a
//! broadcast event stream.
//!
//! The whole loop runs on a background task. `connect()` returns
//! immediately; `disconnect()` cancels the task, waits for it to finish, and
//! tears the device down, so no event is delivered after it returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{ConnectivityEvent, EventDispatcher, EventReceiver};
use crate::retry::RetryPolicy;
use crate::traits::{DeviceScanner, SpeckDevice};

/// Connection state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No loop running, or the loop has stopped.
    Disconnected,
    /// The loop is scanning for a device.
    Scanning,
    /// A device is connected and being pinged.
    Connected,
}

/// Options for the connectivity loop.
#[derive(Debug, Clone)]
pub struct ConnectivityOptions {
    /// Retry policy for scan-and-connect attempts. The default retries
    /// forever; a bounded policy makes the loop give up once spent.
    pub retry: RetryPolicy,
    /// Interval between liveness pings while connected.
    pub ping_interval: Duration,
}

impl Default for ConnectivityOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            ping_interval: Duration::from_secs(5),
        }
    }
}

impl ConnectivityOptions {
    /// Check the options for nonsensical settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the retry policy is invalid or
    /// the ping interval is zero.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        if self.ping_interval.is_zero() {
            return Err(Error::invalid_config("ping_interval must be non-zero"));
        }
        Ok(())
    }
}

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives device discovery, connection, and liveness for one Speck device.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use speck_core::{ConnectivityManager, ConnectivityOptions, MockScanner, MockSpeck};
///
/// # async fn example() -> Result<(), speck_core::Error> {
/// let device = Arc::new(MockSpeck::new("speck-1"));
/// let scanner = Arc::new(MockScanner::new(device));
/// let manager = Arc::new(ConnectivityManager::new(scanner, ConnectivityOptions::default())?);
///
/// let mut events = manager.subscribe();
/// manager.connect().await;
///
/// let event = events.recv().await;
/// println!("first event: {:?}", event);
///
/// manager.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct ConnectivityManager {
    scanner: Arc<dyn DeviceScanner>,
    options: ConnectivityOptions,
    events: EventDispatcher,
    state: RwLock<ConnectionState>,
    device: RwLock<Option<Arc<dyn SpeckDevice>>>,
    session: Mutex<Option<Session>>,
}

impl ConnectivityManager {
    /// Create a manager for the given scanner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the options fail validation.
    pub fn new(scanner: Arc<dyn DeviceScanner>, options: ConnectivityOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            scanner,
            options,
            events: EventDispatcher::default(),
            state: RwLock::new(ConnectionState::Disconnected),
            device: RwLock::new(None),
            session: Mutex::new(None),
        })
    }

    /// Subscribe to connectivity events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Whether a device is currently connected.
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// The connected device, if any.
    pub async fn device(&self) -> Option<Arc<dyn SpeckDevice>> {
        self.device.read().await.clone()
    }

    /// Start the background scan-and-connect loop.
    ///
    /// Returns immediately; progress is reported through
    /// [`subscribe`](Self::subscribe). Calling this while a loop is already
    /// running is a no-op.
    pub async fn connect(self: &Arc<Self>) {
        let mut session = self.session.lock().await;
        if session.is_some() {
            debug!("Connectivity loop already running");
            return;
        }

        let cancel = CancellationToken::new();
        let manager = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            manager.run(token).await;
        });
        *session = Some(Session { cancel, handle });
    }

    /// Stop the loop and disconnect any held device.
    ///
    /// Cancels the background task and waits for it to finish; once this
    /// returns, no further event will be delivered and the manager is
    /// `Disconnected`.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.cancel.cancel();
            let _ = session.handle.await;
        }

        let device = self.device.write().await.take();
        if let Some(device) = device {
            let _ = device.disconnect().await;
        }
        *self.state.write().await = ConnectionState::Disconnected;
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            *self.state.write().await = ConnectionState::Scanning;

            let Some(device) = self.scan_until_connected(&cancel).await else {
                break;
            };

            // A disconnect that raced the successful scan wins: tear the
            // device down and emit nothing.
            {
                let mut slot = self.device.write().await;
                if cancel.is_cancelled() {
                    let _ = device.disconnect().await;
                    break;
                }
                *slot = Some(Arc::clone(&device));
            }
            *self.state.write().await = ConnectionState::Connected;

            info!(
                "Connected to Speck {} on {}",
                device.config().id,
                device.port_name()
            );
            self.events.send(ConnectivityEvent::Connected {
                config: device.config().clone(),
                port: device.port_name().to_string(),
            });

            let lost = self.ping_until_lost(&device, &cancel).await;

            self.device.write().await.take();
            let _ = device.disconnect().await;

            if !lost {
                break;
            }
            warn!("Lost connection to Speck {}", device.config().id);
            self.events.send(ConnectivityEvent::ConnectionLost);
        }

        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Scan until a device connects, the policy is spent, or the session is
    /// cancelled. Returns `None` in the latter two cases.
    async fn scan_until_connected(
        &self,
        cancel: &CancellationToken,
    ) -> Option<Arc<dyn SpeckDevice>> {
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return None,
                result = self.scanner.scan_and_connect() => result,
            };

            match result {
                Ok(device) => {
                    debug!("Scan succeeded after {} failed attempts", attempt);
                    return Some(device);
                }
                Err(e) => {
                    attempt += 1;
                    debug!("Scan attempt {} failed: {}", attempt, e);
                    self.events.send(ConnectivityEvent::ScanFailed { attempt });

                    if self.options.retry.attempts_exhausted(attempt) {
                        warn!("Giving up scanning after {} attempts", attempt);
                        return None;
                    }

                    let delay = self.options.retry.delay_for_attempt(attempt - 1);
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Ping the device until it stops answering or the session is
    /// cancelled. Returns whether the connection was lost.
    async fn ping_until_lost(
        &self,
        device: &Arc<dyn SpeckDevice>,
        cancel: &CancellationToken,
    ) -> bool {
        let mut ticker = tokio::time::interval(self.options.ping_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return false,
                result = device.ping() => result,
            };

            match result {
                Ok(()) => debug!("Ping ok"),
                Err(e) => {
                    warn!("Ping failed: {}", e);
                    return true;
                }
            }
        }
    }
}
