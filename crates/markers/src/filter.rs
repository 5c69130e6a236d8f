use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use feed::{Category, ContentItem, ContentKind};
use foundation::Coordinate;

/// Category selection applied before items become anchors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(BTreeSet<Category>),
}

impl CategoryFilter {
    pub fn only(categories: impl IntoIterator<Item = Category>) -> Self {
        CategoryFilter::Only(categories.into_iter().collect())
    }

    /// Items without an effective category only pass `All`.
    pub fn allows(&self, item: &ContentItem) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(set) => item
                .effective_category()
                .is_some_and(|c| set.contains(&c)),
        }
    }
}

/// Placement inputs that come from the session rather than from the item.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PinContext {
    /// Where events without a coordinate of their own are pinned.
    pub current_location: Option<Coordinate>,
    pub now: DateTime<Utc>,
}

impl PinContext {
    pub fn new(current_location: Option<Coordinate>) -> Self {
        Self::at(current_location, Utc::now())
    }

    pub fn at(current_location: Option<Coordinate>, now: DateTime<Utc>) -> Self {
        Self {
            current_location,
            now,
        }
    }
}

/// Where `item` goes on the map.
///
/// An event created before its coordinate was known stands in at the
/// viewer's current location. Other kinds without a usable coordinate have
/// no pin.
pub fn pin_coordinate(item: &ContentItem, pins: &PinContext) -> Option<Coordinate> {
    if item.coordinate.is_usable() {
        return Some(item.coordinate);
    }
    match item.kind() {
        ContentKind::Event => pins.current_location.filter(Coordinate::is_usable),
        ContentKind::Post | ContentKind::Thread => None,
    }
}

/// Why an item is not pinned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exclusion {
    SoftDeleted,
    NoCoordinate,
    Filtered,
}

/// `None` if `item` should have an anchor under `filter`.
pub fn exclusion(
    item: &ContentItem,
    filter: &CategoryFilter,
    pins: &PinContext,
) -> Option<Exclusion> {
    if !item.valid {
        return Some(Exclusion::SoftDeleted);
    }
    if pin_coordinate(item, pins).is_none() {
        return Some(Exclusion::NoCoordinate);
    }
    if !filter.allows(item) {
        return Some(Exclusion::Filtered);
    }
    None
}

#[cfg(test)]
mod tests {
    use feed::{ContentExtra, ItemId};

    use super::*;

    fn unplaced() -> PinContext {
        PinContext::at(None, Utc::now())
    }

    fn item(category: Option<Category>, tags: &[&str]) -> ContentItem {
        ContentItem {
            id: ItemId::from(1),
            author_id: String::new(),
            coordinate: Coordinate::new(35.0, 139.0),
            created_at: None,
            content: String::new(),
            category,
            like_count: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            valid: true,
            extra: ContentExtra::Thread,
        }
    }

    #[test]
    fn only_matches_effective_category() {
        let filter = CategoryFilter::only([Category::Food]);
        assert!(filter.allows(&item(Some(Category::Food), &[])));
        assert!(filter.allows(&item(None, &["food"])));
        assert!(!filter.allows(&item(None, &[])));
        assert!(CategoryFilter::All.allows(&item(None, &[])));
    }

    #[test]
    fn exclusion_order() {
        let all = CategoryFilter::All;
        let mut it = item(Some(Category::Food), &[]);
        assert_eq!(exclusion(&it, &all, &unplaced()), None);
        it.coordinate = Coordinate::new(0.0, 0.0);
        assert_eq!(exclusion(&it, &all, &unplaced()), Some(Exclusion::NoCoordinate));
        it.valid = false;
        assert_eq!(exclusion(&it, &all, &unplaced()), Some(Exclusion::SoftDeleted));
        let ok = item(Some(Category::Food), &[]);
        assert_eq!(
            exclusion(&ok, &CategoryFilter::only([Category::Disaster]), &unplaced()),
            Some(Exclusion::Filtered)
        );
    }

    #[test]
    fn unplaced_event_falls_back_to_current_location() {
        let here = Coordinate::new(35.0, 139.0);
        let pins = PinContext::at(Some(here), Utc::now());
        let mut event = item(None, &[]);
        event.extra = ContentExtra::for_kind(ContentKind::Event);
        event.coordinate = Coordinate::new(0.0, 0.0);
        assert_eq!(pin_coordinate(&event, &pins), Some(here));
        assert_eq!(exclusion(&event, &CategoryFilter::All, &pins), None);
        assert_eq!(pin_coordinate(&event, &unplaced()), None);

        let mut post = event.clone();
        post.extra = ContentExtra::for_kind(ContentKind::Post);
        assert_eq!(
            exclusion(&post, &CategoryFilter::All, &pins),
            Some(Exclusion::NoCoordinate)
        );
    }

    #[test]
    fn own_coordinate_wins_over_fallback() {
        let pins = PinContext::at(Some(Coordinate::new(1.0, 1.0)), Utc::now());
        let mut event = item(None, &[]);
        event.extra = ContentExtra::for_kind(ContentKind::Event);
        assert_eq!(pin_coordinate(&event, &pins), Some(Coordinate::new(35.0, 139.0)));
    }
}
