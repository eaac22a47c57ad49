//! Default tuning values
//!
//! Retry and drain durations were tuned against observed provider
//! propagation delays. They are operational defaults, overridable from the
//! command line, not correctness constants.

use crate::ResourceKind;
use std::time::Duration;

/// Region used when neither `--region` nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Concurrent discovery calls
pub const DEFAULT_PROBE_CONCURRENCY: usize = 6;

/// Concurrent deletions within one plan group
pub const DEFAULT_DELETE_CONCURRENCY: usize = 4;

/// Delete attempts per resource, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base retry delay for throttled discovery calls
pub const DISCOVERY_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Upper bound of the exponential backoff, as a multiple of the base delay
pub const BACKOFF_MAX_FACTOR: u32 = 4;

/// The exact input that confirms an interactive teardown
pub const CONFIRM_TOKEN: &str = "yes";

/// Typical time before a disabled distribution can be removed
pub const DISTRIBUTION_PROPAGATION_NOTE: &str = "typically 15-20 minutes";

/// Base retry delay for a kind's eventual-consistency conflicts
pub fn default_retry_base_delay(kind: ResourceKind) -> Duration {
    match kind {
        // ENI detachment after mount target removal is the slowest race
        ResourceKind::MountTarget => Duration::from_secs(30),
        ResourceKind::Filesystem
        | ResourceKind::AccessPoint
        | ResourceKind::LoadBalancer
        | ResourceKind::TargetGroup => Duration::from_secs(15),
        _ => Duration::from_secs(10),
    }
}

/// How long to wait for an accepted delete to finish draining before the
/// dependent group may start. `None` means the delete is synchronous enough.
pub fn default_drain_timeout(kind: ResourceKind) -> Option<Duration> {
    match kind {
        ResourceKind::MountTarget => Some(Duration::from_secs(30)),
        ResourceKind::Instance => Some(Duration::from_secs(300)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_targets_wait_longest() {
        let mt = default_retry_base_delay(ResourceKind::MountTarget);
        for kind in ResourceKind::ALL {
            assert!(default_retry_base_delay(kind) <= mt);
        }
    }

    #[test]
    fn test_only_draining_kinds_have_timeouts() {
        let draining: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(|k| default_drain_timeout(*k).is_some())
            .collect();
        assert_eq!(
            draining,
            vec![ResourceKind::Instance, ResourceKind::MountTarget]
        );
    }
}
