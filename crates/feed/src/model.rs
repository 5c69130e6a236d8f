use std::fmt;

use chrono::{DateTime, Utc};
use foundation::Coordinate;
use serde::{Deserialize, Serialize};

/// The three independently fetched collections.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Thread,
    Event,
}

impl ContentKind {
    /// Registration order. Reconciliation walks kinds in this order.
    pub const ALL: [ContentKind; 3] = [ContentKind::Post, ContentKind::Thread, ContentKind::Event];

    pub fn index(self) -> usize {
        match self {
            ContentKind::Post => 0,
            ContentKind::Thread => 1,
            ContentKind::Event => 2,
        }
    }

    /// Path segment of the collection endpoint.
    pub fn path(self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::Thread => "threads",
            ContentKind::Event => "events",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Thread => "thread",
            ContentKind::Event => "event",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item id, unique within its kind's collection.
///
/// The backend sends integer ids on some endpoints and strings on others;
/// both decode to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        ItemId(n.to_string())
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(u64),
    Str(String),
}

impl From<RawId> for ItemId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Num(n) => ItemId(n.to_string()),
            RawId::Str(s) => ItemId(s),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Entertainment,
    Community,
    Information,
    Disaster,
    Food,
    Event,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Entertainment,
        Category::Community,
        Category::Information,
        Category::Disaster,
        Category::Food,
        Category::Event,
        Category::Other,
    ];

    /// Lenient parse of a wire category.
    ///
    /// Empty input is "no category"; anything unrecognised is `Other`.
    pub fn parse(raw: &str) -> Option<Category> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parsed = match trimmed.to_ascii_lowercase().as_str() {
            "entertainment" => Category::Entertainment,
            "community" => Category::Community,
            "information" => Category::Information,
            "disaster" => Category::Disaster,
            "food" => Category::Food,
            "event" => Category::Event,
            _ => Category::Other,
        };
        Some(parsed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Entertainment => "entertainment",
            Category::Community => "community",
            Category::Information => "information",
            Category::Disaster => "disaster",
            Category::Food => "food",
            Category::Event => "event",
            Category::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Entertainment => "Entertainment",
            Category::Community => "Community",
            Category::Information => "Information",
            Category::Disaster => "Disaster",
            Category::Food => "Food",
            Category::Event => "Event",
            Category::Other => "Other",
        }
    }
}

/// Kind-specific fields. The variant is the item's discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentExtra {
    Post { parent: Option<ItemId> },
    Thread,
    Event,
}

impl ContentExtra {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentExtra::Post { .. } => ContentKind::Post,
            ContentExtra::Thread => ContentKind::Thread,
            ContentExtra::Event => ContentKind::Event,
        }
    }

    /// Empty extras for `kind`.
    pub fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Post => ContentExtra::Post { parent: None },
            ContentKind::Thread => ContentExtra::Thread,
            ContentKind::Event => ContentExtra::Event,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: ItemId,
    pub author_id: String,
    pub coordinate: Coordinate,
    /// `None` when the backend sent no timestamp or Go's zero time.
    pub created_at: Option<DateTime<Utc>>,
    pub content: String,
    pub category: Option<Category>,
    pub like_count: u32,
    pub tags: Vec<String>,
    /// Soft-delete flag; `false` items are kept in the collection but never pinned.
    pub valid: bool,
    pub extra: ContentExtra,
}

impl ContentItem {
    pub fn kind(&self) -> ContentKind {
        self.extra.kind()
    }

    /// The item's category, falling back to its first tag.
    ///
    /// Threads historically carried their category only as `tags[0]`.
    pub fn effective_category(&self) -> Option<Category> {
        self.category
            .or_else(|| self.tags.first().and_then(|t| Category::parse(t)))
    }
}

/// A new item to publish. The server assigns id, author and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDraft {
    pub coordinate: Coordinate,
    pub content: String,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub extra: ContentExtra,
}

impl ContentDraft {
    pub fn new(kind: ContentKind, coordinate: Coordinate, content: impl Into<String>) -> Self {
        Self {
            coordinate,
            content: content.into(),
            category: None,
            tags: Vec::new(),
            extra: ContentExtra::for_kind(kind),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.extra.kind()
    }
}
