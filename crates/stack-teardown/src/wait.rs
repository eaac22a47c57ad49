//! Polling with exponential backoff and cancellation support.
//!
//! Used after a delete is accepted, for kinds whose removal keeps side
//! effects alive for a while (a mount target's network interface, an
//! instance's attachments) that would otherwise block the next group.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for polling with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }
}

impl WaitConfig {
    /// Default polling cadence with a specific overall timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Why a wait ended without the condition becoming true
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timed out waiting for {resource} after {elapsed:?} ({attempts} checks)")]
    Timeout {
        resource: String,
        elapsed: Duration,
        attempts: u32,
    },
    #[error("wait for {0} cancelled")]
    Cancelled(String),
    #[error("check for {resource} failed: {source}")]
    Check {
        resource: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Poll `check` until it returns `Ok(true)`.
///
/// The first check runs immediately; later checks back off exponentially
/// with jitter. Cancellation interrupts the sleep between checks.
///
/// # Returns
/// * `Ok(())` - condition met
/// * `Err` - timeout, cancelled, or the check itself failed
pub async fn wait_for_resource<F, Fut>(
    config: WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource_name: &str,
) -> Result<(), WaitError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = tokio::time::Instant::now();
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(WaitError::Cancelled(resource_name.to_string()));
        }

        if start.elapsed() >= config.timeout {
            return Err(WaitError::Timeout {
                resource: resource_name.to_string(),
                elapsed: start.elapsed(),
                attempts,
            });
        }

        attempts += 1;
        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Condition met");
                return Ok(());
            }
            Ok(false) => {
                let delay = delays.next().unwrap_or(config.max_delay);
                debug!(
                    resource = %resource_name,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Not yet, polling again"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = async {
                        match cancel {
                            Some(token) => token.cancelled().await,
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        return Err(WaitError::Cancelled(resource_name.to_string()));
                    }
                }
            }
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Check failed");
                return Err(WaitError::Check {
                    resource: resource_name.to_string(),
                    source: e,
                });
            }
        }
    }
}
