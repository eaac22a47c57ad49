//! Cloud resource kinds and their registration sequence
//!
//! Every kind the teardown understands is declared exactly once here. The
//! declaration order doubles as the registration sequence: it breaks ties
//! between kinds that have no dependency relationship, so plans (and dry-run
//! output) are stable from one run to the next.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classes of cloud resource that belong to a stack
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Spot instance request (cancel before its instance is terminated)
    SpotRequest,
    /// Compute instance
    Instance,
    /// Filesystem mount target (one per subnet, owns an ENI)
    MountTarget,
    /// Filesystem access point
    AccessPoint,
    /// Shared filesystem
    Filesystem,
    /// Load balancer target group
    TargetGroup,
    /// Load balancer
    LoadBalancer,
    /// CDN distribution (disabled, never deleted directly)
    CloudFrontDistribution,
    /// Metric alarm
    Alarm,
    /// Log group
    LogGroup,
    /// Managed or inline policy attached to a role
    PolicyAttachment,
    /// IAM role
    Role,
    /// IAM instance profile
    InstanceProfile,
    /// Security group (instances and ENIs must be gone first)
    SecurityGroup,
    /// SSH key pair
    KeyPair,
}

impl ResourceKind {
    /// Every kind, in registration sequence.
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::SpotRequest,
        ResourceKind::Instance,
        ResourceKind::MountTarget,
        ResourceKind::AccessPoint,
        ResourceKind::Filesystem,
        ResourceKind::TargetGroup,
        ResourceKind::LoadBalancer,
        ResourceKind::CloudFrontDistribution,
        ResourceKind::Alarm,
        ResourceKind::LogGroup,
        ResourceKind::PolicyAttachment,
        ResourceKind::Role,
        ResourceKind::InstanceProfile,
        ResourceKind::SecurityGroup,
        ResourceKind::KeyPair,
    ];

    /// Stable identifier used in logs, JSON output and CLI parsing
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::SpotRequest => "spot-request",
            ResourceKind::Instance => "instance",
            ResourceKind::MountTarget => "mount-target",
            ResourceKind::AccessPoint => "access-point",
            ResourceKind::Filesystem => "filesystem",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::CloudFrontDistribution => "cloudfront-distribution",
            ResourceKind::Alarm => "alarm",
            ResourceKind::LogGroup => "log-group",
            ResourceKind::PolicyAttachment => "policy-attachment",
            ResourceKind::Role => "role",
            ResourceKind::InstanceProfile => "instance-profile",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::KeyPair => "key-pair",
        }
    }

    /// Position in the registration sequence
    pub fn registration_index(self) -> usize {
        self as usize
    }

    /// Whether "deleting" this kind is really a disable whose physical
    /// removal happens later on the provider side.
    pub fn is_two_phase(self) -> bool {
        matches!(self, ResourceKind::CloudFrontDistribution)
    }

    /// The CLI inclusion family this kind belongs to
    pub fn family(self) -> KindFamily {
        match self {
            ResourceKind::SpotRequest | ResourceKind::Instance | ResourceKind::KeyPair => {
                KindFamily::Instances
            }
            ResourceKind::MountTarget | ResourceKind::AccessPoint | ResourceKind::Filesystem => {
                KindFamily::Efs
            }
            ResourceKind::PolicyAttachment | ResourceKind::Role | ResourceKind::InstanceProfile => {
                KindFamily::Iam
            }
            ResourceKind::SecurityGroup
            | ResourceKind::LoadBalancer
            | ResourceKind::TargetGroup
            | ResourceKind::CloudFrontDistribution => KindFamily::Network,
            ResourceKind::Alarm | ResourceKind::LogGroup => KindFamily::Monitoring,
        }
    }

    /// Whether an explicit identifier has the shape of this kind's ids.
    ///
    /// Used to route a mixed id list to the right kinds without asking the
    /// provider to look up ids it would reject as malformed. IAM resources
    /// are only recognized by ARN, since bare role and profile names are
    /// indistinguishable (and frequently identical).
    pub fn recognizes_id(self, id: &str) -> bool {
        match self {
            ResourceKind::SpotRequest => id.starts_with("sir-"),
            ResourceKind::Instance => id.starts_with("i-"),
            ResourceKind::MountTarget => id.starts_with("fsmt-"),
            ResourceKind::AccessPoint => id.starts_with("fsap-") || id.contains(":access-point/"),
            ResourceKind::Filesystem => id.starts_with("fs-") || id.contains(":file-system/"),
            ResourceKind::TargetGroup => id.contains(":targetgroup/"),
            ResourceKind::LoadBalancer => id.contains(":loadbalancer/"),
            ResourceKind::CloudFrontDistribution => {
                id.contains(":distribution/") || is_distribution_id(id)
            }
            ResourceKind::Alarm => id.contains(":alarm:"),
            ResourceKind::LogGroup => id.contains(":log-group:") || id.starts_with('/'),
            ResourceKind::PolicyAttachment => id.contains(crate::PolicyAttachmentId::SEPARATOR),
            ResourceKind::Role => id.starts_with("arn:") && id.contains(":role/"),
            ResourceKind::InstanceProfile => {
                id.starts_with("arn:") && id.contains(":instance-profile/")
            }
            ResourceKind::SecurityGroup => id.starts_with("sg-"),
            ResourceKind::KeyPair => id.starts_with("key-"),
        }
    }

    /// Whether a provider-reported state means the resource is already gone
    pub fn is_terminal_state(self, state: &str) -> bool {
        match self {
            ResourceKind::Instance => state == "terminated",
            ResourceKind::SpotRequest => matches!(state, "cancelled" | "closed"),
            // A disabled distribution has finished its part of the teardown
            ResourceKind::CloudFrontDistribution => matches!(state, "disabled" | "deleted"),
            _ => state == "deleted",
        }
    }
}

/// Distribution ids are 13-14 uppercase alphanumerics starting with `E`
fn is_distribution_id(id: &str) -> bool {
    (13..=14).contains(&id.len())
        && id.starts_with('E')
        && id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names no [`ResourceKind`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown resource kind: {0}")]
pub struct UnknownKindError(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKindError(s.to_string()))
    }
}

/// Groups of kinds selected together by the CLI inclusion flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindFamily {
    Instances,
    Efs,
    Iam,
    Network,
    Monitoring,
}

impl KindFamily {
    /// Kinds in this family, in registration sequence
    pub fn kinds(self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|k| k.family() == self)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_index_matches_all() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.registration_index(), i, "{kind} out of place");
        }
    }

    #[test]
    fn test_as_str_roundtrips_through_from_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_kind_is_a_typed_error() {
        let err = "bucket".parse::<ResourceKind>().unwrap_err();
        assert_eq!(err, UnknownKindError("bucket".into()));
        assert_eq!(err.to_string(), "unknown resource kind: bucket");
    }

    #[test]
    fn test_registration_order_puts_shared_network_last() {
        let index = ResourceKind::registration_index;
        assert!(index(ResourceKind::Instance) < index(ResourceKind::MountTarget));
        assert!(index(ResourceKind::MountTarget) < index(ResourceKind::Filesystem));
        assert!(index(ResourceKind::Filesystem) < index(ResourceKind::SecurityGroup));
        assert_eq!(ResourceKind::ALL[ResourceKind::ALL.len() - 2], ResourceKind::SecurityGroup);
    }

    #[test]
    fn test_only_distributions_are_two_phase() {
        let two_phase: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(|k| k.is_two_phase())
            .collect();
        assert_eq!(two_phase, vec![ResourceKind::CloudFrontDistribution]);
    }

    #[test]
    fn test_every_kind_has_exactly_one_family() {
        let families = [
            KindFamily::Instances,
            KindFamily::Efs,
            KindFamily::Iam,
            KindFamily::Network,
            KindFamily::Monitoring,
        ];
        let total: usize = families.iter().map(|f| f.kinds().len()).sum();
        assert_eq!(total, ResourceKind::ALL.len());
        assert_eq!(
            KindFamily::Efs.kinds(),
            vec![
                ResourceKind::MountTarget,
                ResourceKind::AccessPoint,
                ResourceKind::Filesystem
            ]
        );
    }

    #[test]
    fn test_filesystem_ids_do_not_capture_children() {
        assert!(ResourceKind::Filesystem.recognizes_id("fs-0123abcd"));
        assert!(!ResourceKind::Filesystem.recognizes_id("fsmt-0123abcd"));
        assert!(!ResourceKind::Filesystem.recognizes_id("fsap-0123abcd"));
        assert!(ResourceKind::MountTarget.recognizes_id("fsmt-0123abcd"));
        assert!(ResourceKind::AccessPoint.recognizes_id("fsap-0123abcd"));
    }

    #[test]
    fn test_arn_shaped_ids() {
        let tg = "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/n8n/abc";
        let lb = "arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/demo/abc";
        assert!(ResourceKind::TargetGroup.recognizes_id(tg));
        assert!(!ResourceKind::LoadBalancer.recognizes_id(tg));
        assert!(ResourceKind::LoadBalancer.recognizes_id(lb));

        let role = "arn:aws:iam::123456789012:role/demo-1-role";
        assert!(ResourceKind::Role.recognizes_id(role));
        assert!(!ResourceKind::InstanceProfile.recognizes_id(role));
        assert!(!ResourceKind::Role.recognizes_id("demo-1-role"));
    }

    #[test]
    fn test_distribution_id_shape() {
        assert!(ResourceKind::CloudFrontDistribution.recognizes_id("E2QWRUHAPOMQZL"));
        assert!(!ResourceKind::CloudFrontDistribution.recognizes_id("e2qwruhapomqzl"));
        assert!(!ResourceKind::CloudFrontDistribution.recognizes_id("i-0123456789abcdef0"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(ResourceKind::Instance.is_terminal_state("terminated"));
        assert!(!ResourceKind::Instance.is_terminal_state("shutting-down"));
        assert!(ResourceKind::SpotRequest.is_terminal_state("cancelled"));
        assert!(ResourceKind::MountTarget.is_terminal_state("deleted"));
        assert!(!ResourceKind::MountTarget.is_terminal_state("deleting"));
        assert!(ResourceKind::CloudFrontDistribution.is_terminal_state("disabled"));
        assert!(!ResourceKind::CloudFrontDistribution.is_terminal_state("Deployed"));
    }
}
