//! Device location acquisition.
//!
//! A single [`LocationAcquisition`] per session tracks the status of the most
//! recent request. It never triggers fetches itself; the fetch coordinator
//! observes the state and reacts to the transition into `Resolved`.

use std::future::Future;
use std::time::Duration;

use foundation::{Coordinate, SeqNo, Sequence};
use tracing::{debug, info, warn};

use crate::error::{FeedError, LocationError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LocationStatus {
    #[default]
    Idle,
    Resolving,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationState {
    pub status: LocationStatus,
    /// Last resolved coordinate. Kept while a re-request is in flight or after it fails.
    pub coordinate: Option<Coordinate>,
    pub error: Option<FeedError>,
}

impl LocationState {
    /// The coordinate, but only while the status is `Resolved`.
    pub fn resolved(&self) -> Option<Coordinate> {
        match self.status {
            LocationStatus::Resolved => self.coordinate,
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Source of the device position.
pub trait LocationProvider: Send + Sync {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<Coordinate, LocationError>> + Send;
}

/// Provider that answers every query with the same result, optionally after a delay.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    result: Result<Coordinate, LocationError>,
    delay: Duration,
}

impl FixedLocationProvider {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            result: Ok(coordinate),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(error: LocationError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl LocationProvider for FixedLocationProvider {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinate, LocationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Queries `provider`, failing with [`LocationError::Timeout`] once `options.timeout` elapses.
pub async fn query_position<P: LocationProvider + ?Sized>(
    provider: &P,
    options: PositionOptions,
) -> Result<Coordinate, LocationError> {
    match tokio::time::timeout(options.timeout, provider.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Token for one outstanding location request.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocationRequest {
    pub seq: SeqNo,
    pub options: PositionOptions,
}

#[derive(Debug, Default)]
pub struct LocationAcquisition {
    state: LocationState,
    options: PositionOptions,
    seq: Sequence,
    pending: Option<SeqNo>,
}

impl LocationAcquisition {
    pub fn new(options: PositionOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &LocationState {
        &self.state
    }

    /// Moves to `Resolving` and returns the request to run.
    ///
    /// Returns `None` while a request is already resolving.
    pub fn begin_request(&mut self) -> Option<LocationRequest> {
        if self.state.status == LocationStatus::Resolving {
            debug!("location request already in flight");
            return None;
        }
        let seq = self.seq.next();
        self.pending = Some(seq);
        self.state.status = LocationStatus::Resolving;
        self.state.error = None;
        Some(LocationRequest {
            seq,
            options: self.options,
        })
    }

    /// Applies the outcome of `request`. Outcomes of unknown requests are ignored.
    pub fn complete(
        &mut self,
        request: LocationRequest,
        result: Result<Coordinate, LocationError>,
    ) -> &LocationState {
        if self.pending != Some(request.seq) {
            debug!(seq = request.seq.get(), "ignoring stale location result");
            return &self.state;
        }
        self.pending = None;
        match result {
            Ok(coordinate) => {
                info!(lat = coordinate.lat, lng = coordinate.lng, "location resolved");
                self.state.status = LocationStatus::Resolved;
                self.state.coordinate = Some(coordinate);
                self.state.error = None;
            }
            Err(err) => {
                warn!(error = %err, "location request failed");
                self.state.status = LocationStatus::Failed;
                self.state.error = Some(FeedError::from(err));
            }
        }
        &self.state
    }

    /// Runs a full request against `provider`. A no-op while already resolving.
    pub async fn request_location<P: LocationProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> &LocationState {
        let Some(request) = self.begin_request() else {
            return &self.state;
        };
        let result = query_position(provider, request.options).await;
        self.complete(request, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverProvider;

    impl LocationProvider for NeverProvider {
        async fn current_position(
            &self,
            _options: PositionOptions,
        ) -> Result<Coordinate, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn resolves_from_idle() {
        let mut loc = LocationAcquisition::new(PositionOptions::default());
        assert_eq!(loc.state().status, LocationStatus::Idle);
        let provider = FixedLocationProvider::new(Coordinate::new(35.0, 139.0));
        let state = loc.request_location(&provider).await;
        assert_eq!(state.status, LocationStatus::Resolved);
        assert_eq!(state.resolved(), Some(Coordinate::new(35.0, 139.0)));
    }

    #[test]
    fn begin_is_idempotent_while_resolving() {
        let mut loc = LocationAcquisition::default();
        assert!(loc.begin_request().is_some());
        assert!(loc.begin_request().is_none());
        assert_eq!(loc.state().status, LocationStatus::Resolving);
    }

    #[test]
    fn failure_keeps_last_coordinate_but_not_resolved() {
        let mut loc = LocationAcquisition::default();
        let first = loc.begin_request().unwrap();
        loc.complete(first, Ok(Coordinate::new(1.0, 2.0)));
        let second = loc.begin_request().unwrap();
        assert_eq!(loc.state().resolved(), None);
        let state = loc.complete(second, Err(LocationError::PermissionDenied));
        assert_eq!(state.status, LocationStatus::Failed);
        assert_eq!(state.coordinate, Some(Coordinate::new(1.0, 2.0)));
        assert_eq!(state.error_message().as_deref(), Some("location permission denied"));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut loc = LocationAcquisition::default();
        let first = loc.begin_request().unwrap();
        loc.complete(first, Err(LocationError::Timeout));
        let second = loc.begin_request().unwrap();
        loc.complete(first, Ok(Coordinate::new(9.0, 9.0)));
        assert_eq!(loc.state().status, LocationStatus::Resolving);
        loc.complete(second, Ok(Coordinate::new(1.0, 1.0)));
        assert_eq!(loc.state().resolved(), Some(Coordinate::new(1.0, 1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out_without_retry() {
        let mut loc = LocationAcquisition::new(PositionOptions {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
        });
        let state = loc.request_location(&NeverProvider).await;
        assert_eq!(state.status, LocationStatus::Failed);
        assert_eq!(state.error, Some(FeedError::LocationTimeout));
    }

    #[tokio::test]
    async fn provider_errors_map_onto_feed_errors() {
        let mut loc = LocationAcquisition::default();
        let provider = FixedLocationProvider::failing(LocationError::Unavailable("no fix".into()));
        let state = loc.request_location(&provider).await;
        assert_eq!(state.error, Some(FeedError::LocationUnavailable));

        let provider = FixedLocationProvider::failing(LocationError::PermissionDenied);
        let state = loc.request_location(&provider).await;
        assert_eq!(state.error, Some(FeedError::LocationPermissionDenied));
    }
}
