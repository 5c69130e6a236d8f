use crate::error::FeedError;
use crate::model::{ContentItem, ContentKind};

/// In-flight flags for the two operations a collection supports.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct OpFlags {
    pub fetch: bool,
    pub create: bool,
}

/// Last error of each operation, kept until the next attempt succeeds or is cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpErrors {
    pub fetch: Option<FeedError>,
    pub create: Option<FeedError>,
}

/// Items of one content kind as last returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentCollection {
    kind: ContentKind,
    pub(crate) items: Vec<ContentItem>,
    pub(crate) loading: OpFlags,
    pub(crate) errors: OpErrors,
    revision: u64,
}

impl ContentCollection {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            loading: OpFlags::default(),
            errors: OpErrors::default(),
            revision: 0,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn loading(&self) -> OpFlags {
        self.loading
    }

    pub fn errors(&self) -> &OpErrors {
        &self.errors
    }

    /// Bumped on every wholesale replacement of `items`.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn clear_errors(&mut self) {
        self.errors = OpErrors::default();
    }

    /// Replaces the items wholesale. There is no partial merge.
    pub fn replace_items(&mut self, items: Vec<ContentItem>) {
        self.items = items;
        self.revision += 1;
    }
}

/// One collection per content kind, created empty at session start.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentStore {
    collections: [ContentCollection; 3],
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore {
    pub fn new() -> Self {
        Self {
            collections: ContentKind::ALL.map(ContentCollection::new),
        }
    }

    pub fn collection(&self, kind: ContentKind) -> &ContentCollection {
        &self.collections[kind.index()]
    }

    pub fn collection_mut(&mut self, kind: ContentKind) -> &mut ContentCollection {
        &mut self.collections[kind.index()]
    }

    /// Collections in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ContentCollection> {
        self.collections.iter()
    }
}
