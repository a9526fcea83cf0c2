//! Rendering of AWS SDK failures.
//!
//! Failures are described with the service error code from
//! `ProvideErrorMetadata` rather than the SDK's `Debug` output, so the reason
//! stored in an outcome stays short and stable:
//! `"<operation> failed: <code>: <message>"`.

use std::fmt::Display;

use aws_sdk_s3::error::ProvideErrorMetadata;
use tracing::warn;

/// Error codes that mean the caller is being rate limited.
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
    "ProvisionedThroughputExceededException",
];

/// Format a failure reason from an error's code and message.
///
/// `fallback` is used when the error carries neither, which is the case for
/// dispatch and timeout failures that never reached the service.
pub fn failure_reason(
    operation: &str,
    code: Option<&str>,
    message: Option<&str>,
    fallback: impl Display,
) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!("{operation} failed: {code}: {message}"),
        (Some(code), None) => format!("{operation} failed: {code}"),
        (None, Some(message)) => format!("{operation} failed: {message}"),
        (None, None) => format!("{operation} failed: {fallback}"),
    }
}

/// [`failure_reason`] for any SDK error. Throttled calls are also logged at WARN.
pub fn describe<E>(operation: &str, err: &E) -> String
where
    E: ProvideErrorMetadata + Display,
{
    if is_throttling(err.code()) {
        warn!(operation, code = ?err.code(), "AWS throttled the call; resubmit later");
    }
    failure_reason(operation, err.code(), err.message(), err)
}

pub fn is_throttling(code: Option<&str>) -> bool {
    code.is_some_and(|c| THROTTLING_CODES.contains(&c))
}
