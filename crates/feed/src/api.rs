use std::future::Future;

use crate::error::ApiError;
use crate::model::{ContentDraft, ContentItem, ContentKind};
use crate::protocol::AroundQuery;

/// Request/response contract of the content backend.
///
/// The backend performs the "around a point" geo filter and returns a
/// bounded list; the client never filters by distance itself.
pub trait FeedApi: Send + Sync {
    fn fetch_around(
        &self,
        kind: ContentKind,
        query: AroundQuery,
    ) -> impl Future<Output = Result<Vec<ContentItem>, ApiError>> + Send;

    /// Publishes `draft` and returns the stored item.
    fn create(
        &self,
        draft: ContentDraft,
    ) -> impl Future<Output = Result<ContentItem, ApiError>> + Send;
}
