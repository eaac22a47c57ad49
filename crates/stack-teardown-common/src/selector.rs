//! Operator-supplied criteria for finding a stack's resources

use crate::ResourceKind;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// How a selector matches resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorMode {
    ByTagValue,
    ByNamePattern,
    ByExplicitIds,
}

/// Criterion used to discover the resources of one stack.
///
/// A selector resolves independently per kind; each kind applies its own
/// tag or naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Selector {
    /// Resources carrying tag `key` with exactly `value`
    ByTagValue { key: String, value: String },
    /// Resources whose name contains `pattern` (case-sensitive substring).
    ///
    /// Deliberately loose and able to over-match (`demo` also matches
    /// `demo-2`); kept as the legacy fallback, tags are preferred.
    ByNamePattern { pattern: String },
    /// Resources with exactly these ids
    ByExplicitIds { ids: Vec<String> },
}

/// Invalid selector input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("tag key must not be empty")]
    EmptyTagKey,
    #[error("selector value must not be empty")]
    EmptyValue,
    #[error("no resource ids given")]
    NoIds,
}

impl Selector {
    pub fn by_tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Selector::ByTagValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn by_name(pattern: impl Into<String>) -> Self {
        Selector::ByNamePattern {
            pattern: pattern.into(),
        }
    }

    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selector::ByExplicitIds {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn mode(&self) -> SelectorMode {
        match self {
            Selector::ByTagValue { .. } => SelectorMode::ByTagValue,
            Selector::ByNamePattern { .. } => SelectorMode::ByNamePattern,
            Selector::ByExplicitIds { .. } => SelectorMode::ByExplicitIds,
        }
    }

    /// Reject selectors that would match nothing or everything
    pub fn validate(&self) -> Result<(), SelectorError> {
        match self {
            Selector::ByTagValue { key, value } => {
                if key.trim().is_empty() {
                    return Err(SelectorError::EmptyTagKey);
                }
                if value.trim().is_empty() {
                    return Err(SelectorError::EmptyValue);
                }
            }
            Selector::ByNamePattern { pattern } => {
                if pattern.trim().is_empty() {
                    return Err(SelectorError::EmptyValue);
                }
            }
            Selector::ByExplicitIds { ids } => {
                if ids.iter().all(|id| id.trim().is_empty()) {
                    return Err(SelectorError::NoIds);
                }
            }
        }
        Ok(())
    }

    /// Substring match for [`Selector::ByNamePattern`]; always false otherwise
    pub fn matches_name(&self, name: &str) -> bool {
        match self {
            Selector::ByNamePattern { pattern } => name.contains(pattern.as_str()),
            _ => false,
        }
    }

    /// Tag match for [`Selector::ByTagValue`]; always false otherwise
    pub fn matches_tag(&self, tag_key: &str, tag_value: &str) -> bool {
        match self {
            Selector::ByTagValue { key, value } => key == tag_key && value == tag_value,
            _ => false,
        }
    }

    /// Explicit ids that have the shape of `kind`'s identifiers
    pub fn ids_for(&self, kind: ResourceKind) -> Vec<&str> {
        match self {
            Selector::ByExplicitIds { ids } => ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| kind.recognizes_id(id))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `id` was listed explicitly
    pub fn lists_id(&self, id: &str) -> bool {
        match self {
            Selector::ByExplicitIds { ids } => ids.iter().any(|i| i.trim() == id),
            _ => false,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::ByTagValue { key, value } => write!(f, "tag {key}={value}"),
            Selector::ByNamePattern { pattern } => write!(f, "name contains '{pattern}'"),
            Selector::ByExplicitIds { ids } => write!(f, "ids [{}]", ids.join(", ")),
        }
    }
}
