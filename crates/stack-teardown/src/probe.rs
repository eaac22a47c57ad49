//! Resource discovery
//!
//! Finds the live resources of each kind that match a selector. Resources
//! already in a terminal state are dropped here so the plan only ever holds
//! things that still need deleting. Throttled listings are retried with the
//! deleter's backoff before a kind is given up on.

use crate::deleter::{DeleterConfig, RetryPolicy};
use backon::Retryable;
use futures::stream::{self, StreamExt};
use stack_teardown_common::{
    CloudResourceApi, ProviderError, ResourceDescriptor, ResourceKind, Selector,
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Discovery of one kind failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to discover {kind} resources: {source}")]
pub struct ProbeError {
    pub kind: ResourceKind,
    #[source]
    pub source: ProviderError,
}

/// Everything found by [`ResourceProbe::discover_all`]
#[derive(Debug, Default)]
pub struct Discovery {
    /// Live resources per kind (kinds with nothing found are absent)
    pub found: BTreeMap<ResourceKind, Vec<ResourceDescriptor>>,
    /// Kinds that could not be listed, treated as empty
    pub errors: Vec<ProbeError>,
}

impl Discovery {
    pub fn resource_count(&self) -> usize {
        self.found.values().map(Vec::len).sum()
    }
}

/// Lists live resources through a [`CloudResourceApi`]
pub struct ResourceProbe<'a, A> {
    api: &'a A,
    retry: RetryPolicy,
}

impl<'a, A: CloudResourceApi> ResourceProbe<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            retry: DeleterConfig::default().discovery_retry_policy(),
        }
    }

    /// Backoff for retryable listing errors
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Live resources of one kind matching `selector`.
    ///
    /// The result is deduplicated by id and sorted, so repeated discovery
    /// of the same state yields the same list.
    pub async fn discover(
        &self,
        kind: ResourceKind,
        selector: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProbeError> {
        let listed = (|| self.api.describe(kind, selector))
            .retry(self.retry.backoff())
            .when(ProviderError::is_retryable)
            .notify(|e, dur| {
                warn!(
                    kind = %kind,
                    error = %e,
                    retry_in = ?dur,
                    "Listing not accepted yet, retrying..."
                );
            })
            .await;
        let listed = match listed {
            Ok(listed) => listed,
            // Explicit ids that no longer exist
            Err(e) if e.is_not_found() => Vec::new(),
            Err(source) => return Err(ProbeError { kind, source }),
        };

        let mut seen = HashSet::new();
        let mut live: Vec<ResourceDescriptor> = listed
            .into_iter()
            .filter(|d| d.kind == kind && !d.is_terminal())
            .filter(|d| seen.insert(d.id.clone()))
            .collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(kind = %kind, count = live.len(), "Discovered resources");
        Ok(live)
    }

    /// Discover every kind in `kinds`, at most `concurrency` at a time.
    ///
    /// A kind whose listing fails is logged and treated as empty; the rest
    /// of the run proceeds best-effort.
    pub async fn discover_all(
        &self,
        kinds: &[ResourceKind],
        selector: &Selector,
        concurrency: usize,
    ) -> Discovery {
        let results: Vec<_> = stream::iter(kinds.iter().copied())
            .map(|kind| async move { (kind, self.discover(kind, selector).await) })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut discovery = Discovery::default();
        for (kind, result) in results {
            match result {
                Ok(found) if found.is_empty() => {}
                Ok(found) => {
                    discovery.found.insert(kind, found);
                }
                Err(e) => {
                    warn!(kind = %e.kind, error = %e.source, "Discovery failed, skipping kind");
                    discovery.errors.push(e);
                }
            }
        }
        discovery
    }
}
