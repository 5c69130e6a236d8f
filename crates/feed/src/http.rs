use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::api::FeedApi;
use crate::config::FeedConfig;
use crate::error::ApiError;
use crate::model::{ContentDraft, ContentItem, ContentKind};
use crate::protocol::{AroundQuery, CreatePayload, decode_item, decode_items, error_message};

/// [`FeedApi`] over the REST backend.
#[derive(Debug, Clone)]
pub struct HttpFeedApi {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFeedApi {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            token: None,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let mut api = Self::new(http, config.base_url.clone());
        api.token = config.bearer_token.clone();
        Ok(api)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, kind: ContentKind) -> String {
        format!("{}/{}", self.base_url, kind.path())
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn body(resp: Response) -> Result<Vec<u8>, ApiError> {
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if !status.is_success() {
            let message = error_message(status.as_u16(), &bytes);
            warn!(status = status.as_u16(), %message, "content endpoint returned an error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(bytes.to_vec())
    }
}

impl FeedApi for HttpFeedApi {
    async fn fetch_around(
        &self,
        kind: ContentKind,
        query: AroundQuery,
    ) -> Result<Vec<ContentItem>, ApiError> {
        let url = self.endpoint(kind);
        debug!(%url, lat = query.lat, lng = query.lng, "fetching content");
        let resp = self
            .authorize(self.http.get(&url).query(&query))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let body = Self::body(resp).await?;
        decode_items(kind, &body)
    }

    async fn create(&self, draft: ContentDraft) -> Result<ContentItem, ApiError> {
        let kind = draft.kind();
        let url = self.endpoint(kind);
        debug!(%url, "creating content");
        let resp = self
            .authorize(self.http.post(&url).json(&CreatePayload::from(&draft)))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let body = Self::body(resp).await?;
        decode_item(kind, &body)
    }
}
