//! Per-kind fetch and create tracking.
//!
//! Every fetch is issued a [`SeqNo`] from one session-wide [`Sequence`].
//! A completion is applied only if its sequence number is newer than the
//! last one applied for that kind, so a slow stale response can never
//! overwrite a newer one regardless of completion order.

use foundation::{SeqNo, Sequence};
use tracing::{debug, info, warn};

use crate::api::FeedApi;
use crate::collection::{ContentCollection, ContentStore};
use crate::error::{ApiError, FeedError};
use crate::location::{LocationState, LocationStatus};
use crate::model::{ContentDraft, ContentItem, ContentKind};
use crate::protocol::AroundQuery;

/// An issued fetch. Hand it back to [`ContentFetchCoordinator::complete_fetch`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FetchTicket {
    pub kind: ContentKind,
    pub seq: SeqNo,
    pub query: AroundQuery,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { count: usize },
    Failed,
    /// A newer fetch for the same kind already completed.
    Superseded,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CreateTicket {
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(ContentItem),
    Failed,
}

#[derive(Debug, Default, Clone, Copy)]
struct KindTrack {
    issued: SeqNo,
    settled: SeqNo,
    creates_in_flight: u32,
}

#[derive(Debug)]
pub struct ContentFetchCoordinator {
    store: ContentStore,
    seq: Sequence,
    tracks: [KindTrack; 3],
    radius: Option<f64>,
    last_status: LocationStatus,
}

impl ContentFetchCoordinator {
    pub fn new(radius: Option<f64>) -> Self {
        Self {
            store: ContentStore::new(),
            seq: Sequence::new(),
            tracks: [KindTrack::default(); 3],
            radius,
            last_status: LocationStatus::Idle,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn collection(&self, kind: ContentKind) -> &ContentCollection {
        self.store.collection(kind)
    }

    pub fn collection_mut(&mut self, kind: ContentKind) -> &mut ContentCollection {
        self.store.collection_mut(kind)
    }

    /// Fetches every kind when `state` has just entered `Resolved`.
    pub fn observe_location(&mut self, state: &LocationState) -> Vec<FetchTicket> {
        let entered = state.status == LocationStatus::Resolved
            && self.last_status != LocationStatus::Resolved;
        self.last_status = state.status;
        if !entered {
            return Vec::new();
        }
        info!("location resolved, fetching all content kinds");
        ContentKind::ALL
            .into_iter()
            .filter_map(|kind| self.begin_fetch(kind, state).ok())
            .collect()
    }

    /// Issues fetches for `kind`, or for every kind when `None`.
    pub fn refresh(
        &mut self,
        kind: Option<ContentKind>,
        state: &LocationState,
    ) -> Vec<FetchTicket> {
        let kinds: Vec<ContentKind> = match kind {
            Some(kind) => vec![kind],
            None => ContentKind::ALL.to_vec(),
        };
        kinds
            .into_iter()
            .filter_map(|kind| self.begin_fetch(kind, state).ok())
            .collect()
    }

    /// Starts a fetch for `kind` around the resolved location.
    ///
    /// Fails fast with [`FeedError::LocationUnavailable`], recorded on the
    /// collection, when the location is not resolved.
    pub fn begin_fetch(
        &mut self,
        kind: ContentKind,
        state: &LocationState,
    ) -> Result<FetchTicket, FeedError> {
        let Some(center) = state.resolved() else {
            debug!(%kind, "fetch skipped, location not resolved");
            let err = FeedError::LocationUnavailable;
            self.store.collection_mut(kind).errors.fetch = Some(err.clone());
            return Err(err);
        };
        let seq = self.seq.next();
        self.tracks[kind.index()].issued = seq;
        let collection = self.store.collection_mut(kind);
        collection.loading.fetch = true;
        collection.errors.fetch = None;
        let query = AroundQuery::new(center, self.radius);
        debug!(%kind, seq = seq.get(), "fetch issued");
        Ok(FetchTicket { kind, seq, query })
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<ContentItem>, ApiError>,
    ) -> FetchOutcome {
        let kind = ticket.kind;
        let track = &mut self.tracks[kind.index()];
        if ticket.seq <= track.settled {
            debug!(
                %kind,
                seq = ticket.seq.get(),
                settled = track.settled.get(),
                "dropping superseded fetch result"
            );
            return FetchOutcome::Superseded;
        }
        track.settled = ticket.seq;
        let latest = ticket.seq == track.issued;

        let collection = self.store.collection_mut(kind);
        if latest {
            collection.loading.fetch = false;
        }
        match result {
            Ok(items) => {
                let count = items.len();
                collection.replace_items(items);
                collection.errors.fetch = None;
                debug!(%kind, count, "fetch applied");
                FetchOutcome::Applied { count }
            }
            Err(err) => {
                warn!(%kind, error = %err, "fetch failed");
                collection.errors.fetch = Some(FeedError::FetchFailed {
                    kind,
                    reason: err.to_string(),
                });
                FetchOutcome::Failed
            }
        }
    }

    /// Fetches `kind` and applies the result.
    pub async fn fetch_around<A: FeedApi + ?Sized>(
        &mut self,
        api: &A,
        kind: ContentKind,
        location: &LocationState,
    ) -> Result<FetchOutcome, FeedError> {
        let ticket = self.begin_fetch(kind, location)?;
        let result = api.fetch_around(kind, ticket.query).await;
        Ok(self.complete_fetch(ticket, result))
    }

    pub fn begin_create(&mut self, draft: &ContentDraft) -> CreateTicket {
        let kind = draft.kind();
        self.tracks[kind.index()].creates_in_flight += 1;
        let collection = self.store.collection_mut(kind);
        collection.loading.create = true;
        collection.errors.create = None;
        CreateTicket { kind }
    }

    /// Records the outcome of a create. The item is never inserted locally;
    /// callers refetch the kind on success.
    pub fn complete_create(
        &mut self,
        ticket: CreateTicket,
        result: Result<ContentItem, ApiError>,
    ) -> CreateOutcome {
        let kind = ticket.kind;
        let track = &mut self.tracks[kind.index()];
        track.creates_in_flight = track.creates_in_flight.saturating_sub(1);
        let idle = track.creates_in_flight == 0;
        let collection = self.store.collection_mut(kind);
        if idle {
            collection.loading.create = false;
        }
        match result {
            Ok(item) => {
                info!(%kind, id = %item.id, "created");
                CreateOutcome::Created(item)
            }
            Err(err) => {
                warn!(%kind, error = %err, "create failed");
                collection.errors.create = Some(FeedError::CreateFailed {
                    kind,
                    reason: err.to_string(),
                });
                CreateOutcome::Failed
            }
        }
    }

    /// Publishes `draft`, then refetches its kind so local state matches the server.
    pub async fn create<A: FeedApi + ?Sized>(
        &mut self,
        api: &A,
        draft: ContentDraft,
        location: &LocationState,
    ) -> Result<ContentItem, FeedError> {
        let ticket = self.begin_create(&draft);
        let result = api.create(draft).await;
        match self.complete_create(ticket, result) {
            CreateOutcome::Created(item) => {
                if let Err(err) = self.fetch_around(api, ticket.kind, location).await {
                    debug!(kind = %ticket.kind, error = %err, "post-create refresh skipped");
                }
                Ok(item)
            }
            CreateOutcome::Failed => Err(self
                .collection(ticket.kind)
                .errors()
                .create
                .clone()
                .unwrap_or(FeedError::CreateFailed {
                    kind: ticket.kind,
                    reason: "unknown".into(),
                })),
        }
    }
}
