//! Provider error classification
//!
//! Every failure reported by a [`CloudResourceApi`](crate::CloudResourceApi)
//! is one of these categories. The deleter and the probe decide what to do
//! (skip, retry, record, give up) from the category alone, never from the
//! message text.

use thiserror::Error;

/// Categorized provider failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Resource does not exist (idempotent success for deletes)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded (retryable with backoff)
    #[error("request throttled")]
    Throttled,

    /// Resource still has dependents or is in use (retryable; typical
    /// right after its dependents were deleted)
    #[error("dependency violation: {0}")]
    InUse(String),

    /// Resource is in a state that cannot be deleted
    #[error("resource in non-deletable state: {0}")]
    InvalidState(String),

    /// Caller lacks permission
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The request never reached the provider or got no usable response
    #[error("transport failure: {0}")]
    Transport(String),

    /// Anything else the provider reported
    #[error("provider error{}: {message}", code_suffix(.code))]
    Other {
        code: Option<String>,
        message: String,
    },
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" {c}")).unwrap_or_default()
}

impl ProviderError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    /// Check if this is an eventual-consistency condition worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Throttled | ProviderError::InUse(_))
    }
}

/// Known error codes for "not found" conditions
pub const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidGroup.NotFound",
    "InvalidGroupId.NotFound",
    "InvalidKeyPair.NotFound",
    "InvalidSpotInstanceRequestID.NotFound",
    "FileSystemNotFound",
    "MountTargetNotFound",
    "AccessPointNotFound",
    "LoadBalancerNotFound",
    "TargetGroupNotFound",
    "NoSuchDistribution",
    "ResourceNotFound",
    "ResourceNotFoundException",
    "NoSuchEntity",
];

/// Known error codes for throttling/rate limiting
pub const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Known error codes for "still in use" conditions
pub const IN_USE_CODES: &[&str] = &[
    "DependencyViolation",
    "FileSystemInUse",
    "ResourceInUse",
    "DeleteConflict",
    "IncorrectState",
    "DistributionNotDisabled",
    "OperationAbortedException",
];

/// Known error codes for permanently non-deletable states
pub const INVALID_STATE_CODES: &[&str] = &[
    "IncorrectFileSystemLifeCycleState",
    "IncorrectMountTargetState",
    "OperationNotPermitted",
    "UnmodifiableEntity",
    "InvalidIfMatchVersion",
];

/// Known error codes for authorization failures
pub const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthFailure",
    "InvalidClientTokenId",
    "ExpiredToken",
];

/// Classify a provider error from its code and message.
///
/// A missing code means the request failed before the provider answered
/// (DNS, TLS, timeout, credentials resolution) and is reported as
/// [`ProviderError::Transport`].
pub fn classify_provider_error(code: Option<&str>, message: Option<&str>) -> ProviderError {
    let message = message.unwrap_or("unknown error").to_string();

    match code {
        None => ProviderError::Transport(message),
        Some(c) if NOT_FOUND_CODES.contains(&c) => ProviderError::NotFound(message),
        Some(c) if THROTTLING_CODES.contains(&c) => ProviderError::Throttled,
        Some(c) if IN_USE_CODES.contains(&c) => ProviderError::InUse(message),
        Some(c) if INVALID_STATE_CODES.contains(&c) => ProviderError::InvalidState(message),
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => ProviderError::AccessDenied(message),
        // EC2 reports some missing resources as malformed ids
        Some(c) if c.ends_with(".NotFound") => ProviderError::NotFound(message),
        Some(c) => ProviderError::Other {
            code: Some(c.to_string()),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_provider_error(Some(*code), Some("gone"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_provider_error(Some(*code), Some("slow down"));
            assert_eq!(err, ProviderError::Throttled);
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
        }
    }

    #[test]
    fn in_use_codes_are_retryable() {
        for code in IN_USE_CODES {
            let err = classify_provider_error(Some(*code), Some("ENI attached"));
            assert!(matches!(err, ProviderError::InUse(_)));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
        }
    }

    #[test]
    fn terminal_codes_are_not_retryable() {
        for code in INVALID_STATE_CODES.iter().chain(ACCESS_DENIED_CODES) {
            let err = classify_provider_error(Some(*code), Some("no"));
            assert!(!err.is_retryable(), "Expected terminal for code: {code}");
            assert!(!err.is_not_found());
        }
    }

    #[test]
    fn generic_not_found_suffix() {
        let err = classify_provider_error(Some("InvalidVpcID.NotFound"), Some("x"));
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_code_is_transport() {
        let err = classify_provider_error(None, Some("dispatch failure"));
        assert_eq!(err, ProviderError::Transport("dispatch failure".into()));
    }

    #[test]
    fn unknown_code_keeps_code_in_message() {
        let err = classify_provider_error(Some("SomeNewError"), Some("details"));
        assert_eq!(err.to_string(), "provider error SomeNewError: details");
        let err = ProviderError::Other {
            code: None,
            message: "details".into(),
        };
        assert_eq!(err.to_string(), "provider error: details");
    }
}
