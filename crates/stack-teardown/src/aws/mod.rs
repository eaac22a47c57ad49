//! AWS implementation of the provider seam
//!
//! One module per service family, each listing and deleting its kinds:
//! - ec2: instances, security groups, key pairs, spot requests
//! - efs: filesystems, mount targets, access points
//! - elb: load balancers, target groups
//! - cloudfront: distributions (disabled, not deleted)
//! - monitoring: CloudWatch alarms and log groups
//! - iam: roles, instance profiles, policy attachments
//!
//! [`AwsCloudApi`] dispatches [`CloudResourceApi`](stack_teardown_common::CloudResourceApi)
//! calls to them by kind.

pub mod api;
pub mod cloudfront;
pub mod context;
pub mod ec2;
pub mod efs;
pub mod elb;
pub mod error;
pub mod iam;
pub mod monitoring;

pub use api::AwsCloudApi;
pub use context::{AwsContext, FromAwsContext};
pub use error::{ClassifyExt, classify_sdk_error};

use stack_teardown_common::{ProviderError, ResourceDescriptor, ResourceKind, Selector};
use std::collections::HashMap;

/// Client-side selection for list APIs that cannot filter server-side.
///
/// `ids` are every identifier the resource is known by (id, ARN), the
/// primary one first; a name pattern falls back to the primary id when
/// the resource has no name.
pub(crate) fn is_selected(
    selector: &Selector,
    ids: &[&str],
    name: Option<&str>,
    tags: &HashMap<String, String>,
) -> bool {
    match selector {
        Selector::ByTagValue { .. } => tags.iter().any(|(k, v)| selector.matches_tag(k, v)),
        Selector::ByNamePattern { .. } => {
            let fallback = ids.first().copied().unwrap_or_default();
            selector.matches_name(name.unwrap_or(fallback))
        }
        Selector::ByExplicitIds { .. } => ids.iter().any(|id| selector.lists_id(id)),
    }
}

/// Whether matching needs each resource's tags fetched
pub(crate) fn needs_tags(selector: &Selector) -> bool {
    matches!(selector, Selector::ByTagValue { .. })
}

/// Trailing resource id of an ARN (`arn:...:file-system/fs-1` → `fs-1`);
/// anything that is not an ARN is returned unchanged.
pub(crate) fn arn_resource_id(id: &str) -> &str {
    if id.starts_with("arn:") {
        id.rsplit(['/', ':']).next().unwrap_or(id)
    } else {
        id
    }
}

pub(crate) fn named(descriptor: ResourceDescriptor, name: Option<String>) -> ResourceDescriptor {
    match name {
        Some(name) if !name.is_empty() => descriptor.with_name(name),
        _ => descriptor,
    }
}

/// A kind routed to a service module that does not own it
pub(crate) fn unsupported(kind: ResourceKind, service: &str) -> ProviderError {
    ProviderError::Other {
        code: None,
        message: format!("{kind} is not a {service} resource"),
    }
}
