//! AWS SDK error classification
//!
//! Maps SDK errors onto [`ProviderError`] using the `.code()` and
//! `.message()` error metadata instead of string matching on Debug output.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use stack_teardown_common::{ProviderError, classify_provider_error};

/// Classify any SDK error.
///
/// Errors without a code never got a modeled response from the service
/// (dispatch, timeout, credentials) and keep their full source chain in
/// the transport message.
pub fn classify_sdk_error<E>(err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match err.code() {
        Some(code) => classify_provider_error(Some(code), err.message()),
        None => ProviderError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

/// `.classify()?` on SDK results
pub trait ClassifyExt<T> {
    fn classify(self) -> Result<T, ProviderError>;
}

impl<T, E> ClassifyExt<T> for Result<T, E>
where
    E: ProvideErrorMetadata + std::error::Error,
{
    fn classify(self) -> Result<T, ProviderError> {
        self.map_err(classify_sdk_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::error::{ErrorMetadata, SdkError};

    fn meta(code: &str, message: &str) -> ErrorMetadata {
        ErrorMetadata::builder().code(code).message(message).build()
    }

    #[test]
    fn test_coded_errors_use_tables() {
        assert!(classify_sdk_error(meta("InvalidGroup.NotFound", "gone")).is_not_found());
        assert_eq!(
            classify_sdk_error(meta("DependencyViolation", "has ENI")),
            ProviderError::InUse("has ENI".into())
        );
        assert_eq!(
            classify_sdk_error(meta("RequestLimitExceeded", "slow down")),
            ProviderError::Throttled
        );
    }

    #[test]
    fn test_uncoded_error_is_transport() {
        let err = SdkError::<ErrorMetadata, ()>::timeout_error("connect timed out");
        match classify_sdk_error(err) {
            ProviderError::Transport(msg) => assert!(msg.contains("connect timed out")),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_ext() {
        let ok: Result<u8, ErrorMetadata> = Ok(1);
        assert_eq!(ok.classify(), Ok(1));

        let err: Result<u8, ErrorMetadata> = Err(meta("AccessDenied", "nope"));
        assert_eq!(err.classify(), Err(ProviderError::AccessDenied("nope".into())));
    }
}
