//! Wire format of the content endpoints.
//!
//! - `GET /<kind>?lat=..&lng=..[&radius=..]` returns a JSON array of items
//! - `POST /<kind>` takes a [`CreatePayload`] and returns the created item
//!
//! The Go backend serialises struct fields by name (`ID`, `User_id`,
//! `Coordinate{Lat,Lng}`, `CreatedAt`, ...) while the other endpoints use
//! lowercase keys. The decoder accepts both spellings.

use chrono::{DateTime, Datelike, Utc};
use foundation::Coordinate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::{Category, ContentDraft, ContentExtra, ContentItem, ContentKind, ItemId};

/// Query string of an "around a point" fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AroundQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl AroundQuery {
    pub fn new(center: Coordinate, radius: Option<f64>) -> Self {
        Self {
            lat: center.lat,
            lng: center.lng,
            radius,
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(alias = "ID", alias = "Id")]
    id: ItemId,
    #[serde(default, alias = "User_id", alias = "UserID", alias = "author_id")]
    user_id: Option<String>,
    #[serde(default, alias = "Coordinate")]
    coordinate: Option<Coordinate>,
    #[serde(
        default,
        alias = "CreatedAt",
        alias = "Created_at",
        alias = "created_time"
    )]
    created_at: Option<String>,
    #[serde(default, alias = "Content")]
    content: Option<String>,
    #[serde(default, alias = "Category")]
    category: Option<String>,
    #[serde(default = "default_true", alias = "Valid")]
    valid: bool,
    #[serde(default, alias = "Like", alias = "like_count")]
    like: i64,
    #[serde(default, alias = "Tags")]
    tags: Option<Vec<String>>,
    #[serde(default, alias = "Parent")]
    parent: Option<ItemId>,
}

impl WireItem {
    fn into_item(self, kind: ContentKind) -> ContentItem {
        let extra = match kind {
            ContentKind::Post => ContentExtra::Post {
                parent: self.parent,
            },
            ContentKind::Thread => ContentExtra::Thread,
            ContentKind::Event => ContentExtra::Event,
        };
        ContentItem {
            id: self.id,
            author_id: self.user_id.unwrap_or_default(),
            // Missing coordinates decode to the (0,0) placeholder, which is never pinned.
            coordinate: self.coordinate.unwrap_or(Coordinate::new(0.0, 0.0)),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            content: self.content.unwrap_or_default(),
            category: self.category.as_deref().and_then(Category::parse),
            like_count: self.like.clamp(0, u32::MAX as i64) as u32,
            tags: self.tags.unwrap_or_default(),
            valid: self.valid,
            extra,
        }
    }
}

/// Parses an RFC 3339 timestamp, treating Go's zero time as absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
    let utc = parsed.with_timezone(&Utc);
    if utc.year() <= 1 {
        return None;
    }
    Some(utc)
}

/// Decodes a fetch response. `null` is treated as an empty list.
pub fn decode_items(kind: ContentKind, body: &[u8]) -> Result<Vec<ContentItem>, ApiError> {
    let wire: Option<Vec<WireItem>> =
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(wire
        .unwrap_or_default()
        .into_iter()
        .map(|w| w.into_item(kind))
        .collect())
}

pub fn decode_item(kind: ContentKind, body: &[u8]) -> Result<ContentItem, ApiError> {
    let wire: WireItem =
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(wire.into_item(kind))
}

/// Body of `POST /<kind>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePayload<'a> {
    pub coordinate: Coordinate,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
    pub tags: &'a [String],
    pub valid: bool,
    pub like: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<&'a ItemId>,
}

impl<'a> From<&'a ContentDraft> for CreatePayload<'a> {
    fn from(draft: &'a ContentDraft) -> Self {
        let parent = match &draft.extra {
            ContentExtra::Post { parent } => parent.as_ref(),
            _ => None,
        };
        Self {
            coordinate: draft.coordinate,
            content: draft.content.as_str(),
            category: draft.category.map(Category::as_str),
            tags: &draft.tags,
            valid: true,
            like: 0,
            parent,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extracts the human-readable message of an error response.
pub fn error_message(status: u16, body: &[u8]) -> String {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"))
}
