use thiserror::Error;

use crate::model::ContentKind;

/// Device location failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the content endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Errors surfaced to location and collection state for the UI.
///
/// None of these are retried automatically; the UI offers a manual retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("location permission denied")]
    LocationPermissionDenied,
    #[error("location request timed out")]
    LocationTimeout,
    #[error("location is not available")]
    LocationUnavailable,
    #[error("fetching {kind}s failed: {reason}")]
    FetchFailed { kind: ContentKind, reason: String },
    #[error("creating {kind} failed: {reason}")]
    CreateFailed { kind: ContentKind, reason: String },
}

impl From<LocationError> for FeedError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => FeedError::LocationPermissionDenied,
            LocationError::Timeout => FeedError::LocationTimeout,
            LocationError::Unavailable(_) => FeedError::LocationUnavailable,
        }
    }
}
