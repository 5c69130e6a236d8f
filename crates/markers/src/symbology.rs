use chrono::{DateTime, TimeDelta, Utc};
use feed::{Category, ContentItem, ContentKind};
use serde::Serialize;

const HEADLINE_CHARS: usize = 50;

/// Events younger than this get the larger pin.
const NEW_EVENT_MINUTES: i64 = 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRole {
    Content(ContentKind),
    Location,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    /// `#rrggbb`.
    pub color: &'static str,
    pub scale: f32,
    pub role: MarkerRole,
}

impl MarkerStyle {
    pub const fn new(color: &'static str, scale: f32, role: MarkerRole) -> Self {
        Self { color, scale, role }
    }

    pub fn for_item(item: &ContentItem, now: DateTime<Utc>) -> Self {
        let kind = item.kind();
        let role = MarkerRole::Content(kind);
        match kind {
            ContentKind::Thread => Self::new("#ffd700", 0.6, role),
            ContentKind::Post => Self::new(category_color(item.effective_category()), 0.5, role),
            ContentKind::Event => {
                // Uncategorised events are still drawn as events.
                let category = item.effective_category().unwrap_or(Category::Event);
                let scale = if is_new(item, now) { 1.0 } else { 0.8 };
                Self::new(category_color(Some(category)), scale, role)
            }
        }
    }

    /// The current-location pin. Larger than content pins and always red.
    pub const fn location() -> Self {
        Self::new("#ff0000", 1.2, MarkerRole::Location)
    }
}

fn is_new(item: &ContentItem, now: DateTime<Utc>) -> bool {
    item.created_at
        .is_some_and(|at| now.signed_duration_since(at) < TimeDelta::minutes(NEW_EVENT_MINUTES))
}

pub fn category_color(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::Entertainment) => "#ff6b6b",
        Some(Category::Community) => "#4ecdc4",
        Some(Category::Information) => "#45b7d1",
        Some(Category::Disaster) => "#ff4757",
        Some(Category::Food) => "#feca57",
        Some(Category::Event) => "#96ceb4",
        Some(Category::Other) | None => "#95a5a6",
    }
}

/// What the info overlay of a content anchor shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlaySummary {
    pub kind: ContentKind,
    pub headline: String,
    pub category_label: Option<&'static str>,
    pub like_count: u32,
    pub tags: Vec<String>,
    pub created_label: String,
}

impl OverlaySummary {
    pub fn for_item(item: &ContentItem) -> Self {
        let created_label = match item.created_at {
            Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
            None => "unknown date".to_string(),
        };
        Self {
            kind: item.kind(),
            headline: headline(&item.content),
            category_label: item.effective_category().map(Category::label),
            like_count: item.like_count,
            tags: item.tags.clone(),
            created_label,
        }
    }
}

fn headline(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= HEADLINE_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(HEADLINE_CHARS).collect();
    out.push_str("...");
    out
}
