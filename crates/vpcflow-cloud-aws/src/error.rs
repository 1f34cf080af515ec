//! AWS error classification
//!
//! SDK errors are mapped onto [`ProviderError`] by their error code, using
//! the message only where CloudFormation reports distinct conditions under the
//! generic `ValidationError` code.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use vpcflow_cloud::ProviderError;

/// Known EC2 error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidVpcID.NotFound",
    "InvalidVpcPeeringConnectionID.NotFound",
    "InvalidVpcPeeringConnectionId.NotFound",
    "InvalidRouteTableID.NotFound",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
];

/// Code EC2 returns when a route for the destination is already present
pub const ROUTE_ALREADY_EXISTS: &str = "RouteAlreadyExists";

const VALIDATION_ERROR: &str = "ValidationError";

/// Classify an AWS error by code and message
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> ProviderError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ProviderError::NotFound(message),
        Some(c) if THROTTLING_CODES.contains(&c) => ProviderError::Throttled(message),
        Some(VALIDATION_ERROR) if message.contains("does not exist") => {
            ProviderError::NotFound(message)
        }
        Some(VALIDATION_ERROR)
            if message.contains("can not be updated") || message.contains("cannot be updated") =>
        {
            ProviderError::Conflict(message)
        }
        _ => ProviderError::Api {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Whether an update was refused because the template and parameters match
pub fn is_no_updates(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some(VALIDATION_ERROR)
        && message.is_some_and(|m| m.contains("No updates are to be performed"))
}

/// Classify an SDK error, treating transport timeouts separately
pub(crate) fn from_sdk_error<E, R>(err: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => ProviderError::Timeout(DisplayErrorContext(err).to_string()),
        SdkError::ServiceError(_) => classify_aws_error(err.code(), err.message()),
        _ => ProviderError::Api {
            code: None,
            message: DisplayErrorContext(err).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stack_is_not_found() {
        let err = classify_aws_error(
            Some("ValidationError"),
            Some("Stack with id us-east-1-core does not exist"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_peering_is_not_found() {
        let err = classify_aws_error(
            Some("InvalidVpcPeeringConnectionID.NotFound"),
            Some("The vpcPeeringConnection ID 'pcx-123' does not exist"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_throttling() {
        for code in ["Throttling", "RequestLimitExceeded"] {
            let err = classify_aws_error(Some(code), Some("Rate exceeded"));
            assert!(matches!(err, ProviderError::Throttled(_)));
        }
    }

    #[test]
    fn test_stack_in_progress_is_conflict() {
        let err = classify_aws_error(
            Some("ValidationError"),
            Some("Stack:arn:aws:cloudformation:us-east-1:1:stack/s/1 is in UPDATE_IN_PROGRESS state and can not be updated."),
        );
        assert!(matches!(err, ProviderError::Conflict(_)));
    }

    #[test]
    fn test_other_validation_errors_keep_code() {
        let err = classify_aws_error(Some("ValidationError"), Some("Template format error"));
        assert_eq!(
            err,
            ProviderError::Api {
                code: Some("ValidationError".to_string()),
                message: "Template format error".to_string(),
            }
        );
    }

    #[test]
    fn test_no_updates_detection() {
        assert!(is_no_updates(
            Some("ValidationError"),
            Some("No updates are to be performed.")
        ));
        assert!(!is_no_updates(Some("ValidationError"), Some("Template format error")));
        assert!(!is_no_updates(None, Some("No updates are to be performed.")));
    }

    #[test]
    fn test_missing_message() {
        let err = classify_aws_error(None, None);
        assert_eq!(
            err,
            ProviderError::Api {
                code: None,
                message: "Unknown error".to_string(),
            }
        );
    }
}
