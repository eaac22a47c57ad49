//! Idempotent single-resource deletion
//!
//! A delete either succeeds, finds the resource already gone, or fails with a
//! reason. "Already gone" is success: running the same teardown twice must
//! be harmless. Eventual-consistency errors (throttling, dependents still
//! detaching) are retried with exponential backoff; everything else fails
//! immediately.

use crate::wait::{WaitConfig, wait_for_resource};
use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use stack_teardown_common::defaults::{
    BACKOFF_MAX_FACTOR, DEFAULT_MAX_ATTEMPTS, DISCOVERY_RETRY_BASE_DELAY,
    DISTRIBUTION_PROPAGATION_NOTE, default_drain_timeout, default_retry_base_delay,
};
use stack_teardown_common::{
    CloudResourceApi, ProviderError, ResourceDescriptor, ResourceKind, Selector,
};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of attempting to remove one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// The provider accepted the delete (or, for two-phase kinds, the disable)
    Deleted,
    /// The resource did not exist
    AlreadyAbsent,
    /// The delete failed for good
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Human-readable rendering for `kind`
    pub fn describe_for(&self, kind: ResourceKind) -> String {
        match self {
            Outcome::Deleted if kind.is_two_phase() => {
                format!(
                    "disable accepted (deletion completes after provider propagation, \
                     {DISTRIBUTION_PROPAGATION_NOTE})"
                )
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Deleted => f.write_str("deleted"),
            Outcome::AlreadyAbsent => f.write_str("already absent"),
            Outcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Backoff parameters for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Deleter tuning
#[derive(Debug, Clone)]
pub struct DeleterConfig {
    /// Total attempts per resource, including the first
    pub max_attempts: u32,
    /// Replaces every kind's default base delay
    pub base_delay: Option<Duration>,
    /// Replaces the drain timeout of kinds that drain
    pub drain_timeout: Option<Duration>,
    /// Skip drain waits entirely
    pub skip_drain: bool,
}

impl Default for DeleterConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: None,
            drain_timeout: None,
            skip_drain: false,
        }
    }
}

impl DeleterConfig {
    /// Retry without sleeping and skip drains (for fakes and tests)
    pub fn without_delays(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Some(Duration::ZERO),
            drain_timeout: None,
            skip_drain: true,
        }
    }

    pub fn retry_policy(&self, kind: ResourceKind) -> RetryPolicy {
        self.policy_with_base(
            self.base_delay
                .unwrap_or_else(|| default_retry_base_delay(kind)),
        )
    }

    /// Backoff for throttled discovery calls
    pub fn discovery_retry_policy(&self) -> RetryPolicy {
        self.policy_with_base(self.base_delay.unwrap_or(DISCOVERY_RETRY_BASE_DELAY))
    }

    fn policy_with_base(&self, base_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay,
            max_delay: base_delay * BACKOFF_MAX_FACTOR,
        }
    }

    pub fn drain_timeout(&self, kind: ResourceKind) -> Option<Duration> {
        if self.skip_drain {
            return None;
        }
        default_drain_timeout(kind).map(|default| self.drain_timeout.unwrap_or(default))
    }
}

/// Deletes single resources through a [`CloudResourceApi`]
pub struct IdempotentDeleter<'a, A> {
    api: &'a A,
    config: DeleterConfig,
    cancel: Option<CancellationToken>,
}

impl<'a, A: CloudResourceApi> IdempotentDeleter<'a, A> {
    pub fn new(api: &'a A, config: DeleterConfig) -> Self {
        Self {
            api,
            config,
            cancel: None,
        }
    }

    /// Cut drain waits short when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Delete (or disable) one resource.
    ///
    /// Never returns an error: every provider failure ends up in the outcome.
    pub async fn delete(&self, descriptor: &ResourceDescriptor) -> Outcome {
        let kind = descriptor.kind;
        let id = descriptor.id.as_str();
        let policy = self.config.retry_policy(kind);
        let mut attempts = 0u32;

        let result = (|| {
            attempts += 1;
            self.issue(kind, id)
        })
        .retry(policy.backoff())
        .when(ProviderError::is_retryable)
        .notify(|e, dur| {
            warn!(
                kind = %kind,
                id = %id,
                error = %e,
                retry_in = ?dur,
                "Delete not accepted yet, retrying..."
            );
        })
        .await;

        match result {
            Ok(()) => {
                if kind.is_two_phase() {
                    info!(
                        kind = %kind,
                        id = %id,
                        "Disable accepted, removal {DISTRIBUTION_PROPAGATION_NOTE}"
                    );
                } else {
                    info!(kind = %kind, id = %id, "Deleted");
                    self.drain(descriptor).await;
                }
                Outcome::Deleted
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = %kind, id = %id, "Already absent");
                Outcome::AlreadyAbsent
            }
            Err(e) => {
                let reason = if e.is_retryable() {
                    format!("{e} (gave up after {attempts} attempts)")
                } else {
                    e.to_string()
                };
                warn!(kind = %kind, id = %id, reason = %reason, "Delete failed");
                Outcome::Failed(reason)
            }
        }
    }

    async fn issue(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        if kind.is_two_phase() {
            self.api.disable(kind, id).await
        } else {
            self.api.delete(kind, id).await
        }
    }

    /// Wait for an accepted delete to finish draining.
    ///
    /// A drain that times out or fails is only logged: the delete itself was
    /// accepted, and dependents that still block will be retried.
    async fn drain(&self, descriptor: &ResourceDescriptor) {
        let Some(timeout) = self.config.drain_timeout(descriptor.kind) else {
            return;
        };

        let api = self.api;
        let kind = descriptor.kind;
        let id = descriptor.id.as_str();
        let selector = Selector::by_ids([id]);
        let selector = &selector;
        let label = format!("{kind} {id}");

        let result = wait_for_resource(
            WaitConfig::with_timeout(timeout),
            self.cancel.as_ref(),
            move || async move {
                match api.describe(kind, selector).await {
                    Ok(found) => Ok(found
                        .iter()
                        .filter(|r| r.id == id)
                        .all(ResourceDescriptor::is_terminal)),
                    Err(e) if e.is_not_found() => Ok(true),
                    Err(e) => Err(anyhow::Error::new(e)),
                }
            },
            &label,
        )
        .await;

        if let Err(e) = result {
            warn!(kind = %kind, id = %id, error = %e, "Resource still draining, continuing");
        }
    }
}
