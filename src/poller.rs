//! A background poller thread that periodically refreshes the configuration.

use std::sync::{mpsc::RecvTimeoutError, Arc, Condvar, Mutex};
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::error::{Error, Result};

/// Parameters of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerThreadConfig {
    /// Base delay between successful refreshes.
    pub interval: Duration,
    /// Upper bound of the uniformly random addition to each delay.
    pub jitter: Duration,
}

impl PollerThreadConfig {
    /// Default base interval between refreshes.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
    /// Default jitter applied to each delay.
    pub const DEFAULT_POLL_JITTER: Duration = Duration::from_secs(30);
}

impl Default for PollerThreadConfig {
    fn default() -> PollerThreadConfig {
        PollerThreadConfig {
            interval: PollerThreadConfig::DEFAULT_POLL_INTERVAL,
            jitter: PollerThreadConfig::DEFAULT_POLL_JITTER,
        }
    }
}

/// The poller stops after this many consecutive refresh failures.
const MAX_CONSECUTIVE_FAILURES: u32 = 7;

/// A configuration poller thread.
///
/// The thread invokes the refresh callback once immediately on start (one interval later for
/// [`PollerThread::start_delayed`]), then on a jittered interval. Refresh failures back off
/// exponentially from the base interval; a success resets the backoff. Cancellation is
/// cooperative: an in-flight refresh runs to completion.
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::Sender<()>,

    /// Holds `None` if configuration hasn't been fetched yet. Holds `Some(Ok(()))` if
    /// configuration has been fetched successfully. Holds `Some(Err(...))` if there was an error
    /// fetching the first configuration.
    result: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl PollerThread {
    /// Start the poller thread. `callback` performs one refresh (fetch + install) per
    /// invocation.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the poller thread failed to start.
    pub(crate) fn start(
        config: PollerThreadConfig,
        callback: impl FnMut() -> Result<()> + Send + 'static,
    ) -> std::io::Result<PollerThread> {
        PollerThread::start_inner(config, /* immediate: */ true, callback)
    }

    /// Like [`PollerThread::start`], but the first refresh happens after one interval instead of
    /// immediately. For callers that have just fetched a configuration themselves.
    pub(crate) fn start_delayed(
        config: PollerThreadConfig,
        callback: impl FnMut() -> Result<()> + Send + 'static,
    ) -> std::io::Result<PollerThread> {
        PollerThread::start_inner(config, /* immediate: */ false, callback)
    }

    fn start_inner(
        config: PollerThreadConfig,
        immediate: bool,
        mut callback: impl FnMut() -> Result<()> + Send + 'static,
    ) -> std::io::Result<PollerThread> {
        let (stop_sender, stop_receiver) = std::sync::mpsc::channel::<()>();

        let result = Arc::new((Mutex::new(None), Condvar::new()));

        let join_handle = {
            // Cloning Arc for move into thread
            let result = Arc::clone(&result);
            let update_result = move |value| {
                *result.0.lock().unwrap() = Some(value);
                result.1.notify_all();
            };

            std::thread::Builder::new()
                .name("eppo-poller".to_owned())
                .spawn(move || {
                    let mut consecutive_failures: u32 = 0;
                    // Delay before the next refresh. `None` skips straight to the first refresh.
                    let mut delay = if immediate {
                        None
                    } else {
                        Some(jitter(config.interval, config.jitter))
                    };
                    loop {
                        if let Some(delay) = delay {
                            match stop_receiver.recv_timeout(delay) {
                                Err(RecvTimeoutError::Timeout) => {
                                    // Timed out. Proceed to fetch a new configuration.
                                }
                                Ok(()) => {
                                    log::debug!(target: "eppo",
                                                "poller thread received stop command");
                                    // The other end asked us to stop the poller thread.
                                    return;
                                }
                                Err(RecvTimeoutError::Disconnected) => {
                                    // When the other end of channel disconnects, calls to
                                    // .recv_timeout() return immediately. Use normal thread
                                    // sleep in this case.
                                    std::thread::sleep(delay);
                                }
                            }
                        }

                        log::debug!(target: "eppo", "refreshing configuration");
                        delay = Some(match callback() {
                            Ok(()) => {
                                consecutive_failures = 0;
                                update_result(Ok(()));
                                jitter(config.interval, config.jitter)
                            }
                            Err(err @ (Error::Unauthorized | Error::InvalidBaseUrl(_))) => {
                                // Unrecoverable errors
                                update_result(Err(err));
                                return;
                            }
                            Err(err) => {
                                consecutive_failures += 1;
                                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                                    log::warn!(target: "eppo",
                                               consecutive_failures;
                                               "giving up configuration polling: {err}");
                                    update_result(Err(Error::PollerGaveUp));
                                    return;
                                }
                                log::debug!(target: "eppo",
                                            consecutive_failures;
                                            "failed to refresh configuration: {err}");
                                let backoff = config
                                    .interval
                                    .saturating_mul(2u32.saturating_pow(consecutive_failures));
                                jitter(backoff, config.jitter)
                            }
                        });
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            result,
        })
    }

    /// Waits for the first configuration refresh to resolve.
    ///
    /// # Errors
    ///
    /// This method can fail with the following errors:
    ///
    /// - [`Error::PollerThreadPanicked`]
    /// - [`Error::PollerGaveUp`]
    /// - [`Error::Unauthorized`]
    /// - [`Error::InvalidBaseUrl`]
    pub fn wait_for_configuration(&self) -> Result<()> {
        let mut lock = self
            .result
            .0
            .lock()
            .map_err(|_| Error::PollerThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => {
                    // The poller has already fetched the configuration. Return Ok(()) or a
                    // possible error.
                    return result.clone();
                }
                None => {
                    // Block waiting for configuration to get fetched.
                    lock = self
                        .result
                        .1
                        .wait(lock)
                        .map_err(|_| Error::PollerThreadPanicked)?;
                }
            }
        }
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop and is safe to call multiple
    /// times.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited). Ignoring it as there's
        // nothing useful we can do—thread is already stopped.
        let _ = self.stop_sender.send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// If you don't need to wait for the thread to exit, use [`PollerThread::stop`] instead.
    pub fn shutdown(self) -> Result<()> {
        // Send stop signal in case it wasn't sent before.
        self.stop();

        // Error means that the thread has panicked and there's nothing useful we can do in that
        // case.
        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Apply a random jitter to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        interval
    } else {
        interval + thread_rng().gen_range(Duration::ZERO..jitter)
    }
}
