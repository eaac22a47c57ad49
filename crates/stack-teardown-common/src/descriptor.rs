//! Discovered resource descriptors

use crate::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single resource as reported by the provider at discovery time.
///
/// Descriptors are produced fresh on every discovery and never cached
/// across runs. `parent_id` is the only ownership link the model knows:
/// a mount target's parent is its filesystem, a policy attachment's parent
/// is its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub state: String,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: None,
            parent_id: None,
            state: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Whether the provider already reports this resource as gone
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal_state(&self.state)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if name != &self.id => write!(f, "{} {} ({})", self.kind, self.id, name),
            _ => write!(f, "{} {}", self.kind, self.id),
        }
    }
}

/// The policy half of a [`PolicyAttachmentId`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRef {
    /// Managed policy, attached by ARN
    Managed(String),
    /// Inline policy embedded in the role, by name
    Inline(String),
}

/// Identifier of a policy attachment: `<role>#<policy-arn>` for managed
/// policies, `<role>#inline:<name>` for inline ones.
///
/// The same managed policy is commonly attached to many roles, so the
/// role name is part of the id to keep ids unique within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyAttachmentId {
    pub role: String,
    pub policy: PolicyRef,
}

impl PolicyAttachmentId {
    pub const SEPARATOR: char = '#';
    const INLINE_PREFIX: &'static str = "inline:";

    pub fn managed(role: impl Into<String>, policy_arn: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            policy: PolicyRef::Managed(policy_arn.into()),
        }
    }

    pub fn inline(role: impl Into<String>, policy_name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            policy: PolicyRef::Inline(policy_name.into()),
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        let (role, policy) = id.split_once(Self::SEPARATOR)?;
        if role.is_empty() || policy.is_empty() {
            return None;
        }
        let policy = match policy.strip_prefix(Self::INLINE_PREFIX) {
            Some(name) => PolicyRef::Inline(name.to_string()),
            None => PolicyRef::Managed(policy.to_string()),
        };
        Some(Self {
            role: role.to_string(),
            policy,
        })
    }

    /// Short policy name for display
    pub fn policy_name(&self) -> &str {
        match &self.policy {
            PolicyRef::Managed(arn) => arn.rsplit('/').next().unwrap_or(arn),
            PolicyRef::Inline(name) => name,
        }
    }
}

impl fmt::Display for PolicyAttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.policy {
            PolicyRef::Managed(arn) => write!(f, "{}{}{}", self.role, Self::SEPARATOR, arn),
            PolicyRef::Inline(name) => write!(
                f,
                "{}{}{}{}",
                self.role,
                Self::SEPARATOR,
                Self::INLINE_PREFIX,
                name
            ),
        }
    }
}
