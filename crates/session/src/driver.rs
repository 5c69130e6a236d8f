//! Single-task session driver.
//!
//! Everything runs on the task that calls [`MapSession::step`]: location and
//! network requests are futures polled from one `FuturesUnordered`, and their
//! completions are applied to state one at a time between suspension points.
//! Nothing is shared across threads, so no state lives behind a lock.

use std::sync::Arc;
use std::time::Duration;

use feed::{
    ApiError, ContentFetchCoordinator, ContentItem, ContentKind, ContentStore, CreateOutcome,
    CreateTicket, FeedApi, FeedConfig, FetchOutcome, FetchTicket, LocationAcquisition,
    LocationError, LocationProvider, LocationRequest, LocationState, LocationStatus,
    query_position,
};
use foundation::{Coordinate, Time};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use markers::{
    CategoryFilter, EventClass, MapEvent, MapScene, MapSurface, PopupConfig, RestoreSummary,
    ViewportEventRouter,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::command::{SessionCommand, SessionHandle};

enum Completion {
    Location(LocationRequest, Result<Coordinate, LocationError>),
    Fetch(FetchTicket, Result<Vec<ContentItem>, ApiError>),
    Create(CreateTicket, Result<ContentItem, ApiError>),
}

/// What one [`MapSession::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Location(LocationStatus),
    Fetched { kind: ContentKind, outcome: FetchOutcome },
    Created { kind: ContentKind, ok: bool },
    Command,
    MapEvent(EventClass),
    Restored(RestoreSummary),
    Shutdown,
}

pub struct MapSession<A, P, S: MapSurface> {
    api: Arc<A>,
    provider: Arc<P>,
    location: LocationAcquisition,
    coordinator: ContentFetchCoordinator,
    scene: MapScene<S>,
    router: ViewportEventRouter,
    filter: CategoryFilter,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedReceiver<MapEvent>,
    handle: SessionHandle,
    start: Instant,
}

impl<A, P, S> MapSession<A, P, S>
where
    A: FeedApi + 'static,
    P: LocationProvider + 'static,
    S: MapSurface,
{
    pub fn new(api: A, provider: P, surface: S, config: &FeedConfig, popups: PopupConfig) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let mut scene = MapScene::new(surface, popups);
        scene.ease_to(config.fallback_center);
        Self {
            api: Arc::new(api),
            provider: Arc::new(provider),
            location: LocationAcquisition::new(config.position_options()),
            coordinator: ContentFetchCoordinator::new(config.radius()),
            scene,
            router: ViewportEventRouter::new(),
            filter: CategoryFilter::All,
            in_flight: FuturesUnordered::new(),
            commands,
            events,
            handle: SessionHandle {
                commands: commands_tx,
                events: events_tx,
            },
            start: Instant::now(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn location(&self) -> &LocationState {
        self.location.state()
    }

    pub fn store(&self) -> &ContentStore {
        self.coordinator.store()
    }

    pub fn scene(&self) -> &MapScene<S> {
        &self.scene
    }

    /// Direct access to the surface side, e.g. to apply user clicks on overlays.
    pub fn scene_mut(&mut self) -> &mut MapScene<S> {
        &mut self.scene
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Session time, in the timebase the overlay settle deadline uses.
    pub fn now(&self) -> Time {
        Time(self.start.elapsed().as_secs_f64())
    }

    /// Waits for the next completion, command, map event or settle deadline and applies it.
    pub async fn step(&mut self) -> StepOutcome {
        let deadline = self.scene.restore_deadline();
        let wake = deadline
            .map(|t| self.start + Duration::from_secs_f64(t.0.max(0.0)))
            .unwrap_or_else(Instant::now);

        tokio::select! {
            biased;
            Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                self.on_completion(completion)
            }
            Some(command) = self.commands.recv() => self.on_command(command),
            Some(event) = self.events.recv() => {
                let now = self.now();
                let class = self
                    .router
                    .route(event, now, &mut self.scene, self.coordinator.store(), &self.filter);
                StepOutcome::MapEvent(class)
            }
            _ = sleep_until(wake), if deadline.is_some() => {
                // The timer can fire a hair before the float deadline.
                let now = match deadline {
                    Some(d) if self.now() < d => d,
                    _ => self.now(),
                };
                let summary = match self.scene.poll(now) {
                    Some(summary) => summary,
                    None => self.scene.restore_now(),
                };
                StepOutcome::Restored(summary)
            }
        }
    }

    /// Steps until [`SessionCommand::Shutdown`].
    pub async fn run(&mut self) {
        info!("map session started");
        while self.step().await != StepOutcome::Shutdown {}
        info!("map session stopped");
    }

    /// Steps while anything is queued, in flight or waiting to settle.
    pub async fn run_until_idle(&mut self) -> Vec<StepOutcome> {
        let mut outcomes = Vec::new();
        while self.has_pending() {
            let outcome = self.step().await;
            let stop = outcome == StepOutcome::Shutdown;
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    }

    fn has_pending(&self) -> bool {
        !self.in_flight.is_empty()
            || !self.commands.is_empty()
            || !self.events.is_empty()
            || self.scene.restore_deadline().is_some()
    }

    fn on_command(&mut self, command: SessionCommand) -> StepOutcome {
        match command {
            SessionCommand::RequestLocation => {
                if let Some(request) = self.location.begin_request() {
                    self.coordinator.observe_location(self.location.state());
                    let provider = Arc::clone(&self.provider);
                    self.in_flight.push(
                        async move {
                            let result = query_position(&*provider, request.options).await;
                            Completion::Location(request, result)
                        }
                        .boxed(),
                    );
                }
            }
            SessionCommand::Refresh(kind) => {
                let tickets = self.coordinator.refresh(kind, self.location.state());
                self.spawn_fetches(tickets);
            }
            SessionCommand::Create(draft) => {
                let ticket = self.coordinator.begin_create(&draft);
                let api = Arc::clone(&self.api);
                self.in_flight.push(
                    async move {
                        let result = api.create(draft).await;
                        Completion::Create(ticket, result)
                    }
                    .boxed(),
                );
            }
            SessionCommand::SetFilter(filter) => {
                debug!(?filter, "category filter changed");
                self.filter = filter;
                self.scene.reconcile_all(self.coordinator.store(), &self.filter);
            }
            SessionCommand::Shutdown => return StepOutcome::Shutdown,
        }
        StepOutcome::Command
    }

    fn on_completion(&mut self, completion: Completion) -> StepOutcome {
        match completion {
            Completion::Location(request, result) => {
                let state = self.location.complete(request, result).clone();
                if let Some(center) = state.resolved() {
                    self.scene.ease_to(center);
                    self.scene.reconcile_location(Some(center));
                }
                let tickets = self.coordinator.observe_location(&state);
                self.spawn_fetches(tickets);
                StepOutcome::Location(state.status)
            }
            Completion::Fetch(ticket, result) => {
                let outcome = self.coordinator.complete_fetch(ticket, result);
                if let FetchOutcome::Applied { .. } = outcome {
                    self.scene
                        .reconcile_kind(self.coordinator.collection(ticket.kind), &self.filter);
                }
                StepOutcome::Fetched {
                    kind: ticket.kind,
                    outcome,
                }
            }
            Completion::Create(ticket, result) => {
                let ok = match self.coordinator.complete_create(ticket, result) {
                    CreateOutcome::Created(_) => {
                        let refetch =
                            self.coordinator.begin_fetch(ticket.kind, self.location.state());
                        if let Ok(fetch) = refetch {
                            self.spawn_fetches(vec![fetch]);
                        }
                        true
                    }
                    CreateOutcome::Failed => false,
                };
                StepOutcome::Created {
                    kind: ticket.kind,
                    ok,
                }
            }
        }
    }

    fn spawn_fetches(&mut self, tickets: Vec<FetchTicket>) {
        for ticket in tickets {
            let api = Arc::clone(&self.api);
            self.in_flight.push(
                async move {
                    let result = api.fetch_around(ticket.kind, ticket.query).await;
                    Completion::Fetch(ticket, result)
                }
                .boxed(),
            );
        }
    }
}
