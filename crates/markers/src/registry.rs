//! Live anchors on the map surface.
//!
//! Anchors are owned by an [`Arena`] and addressed by generational
//! [`AnchorHandle`]s, indexed per content kind by item id. After every
//! `reconcile(kind, ..)` the live anchors of that kind correspond 1:1 to the
//! pinnable items of the collection.

use std::collections::{BTreeMap, BTreeSet};

use feed::{ContentItem, ContentKind, ItemId};
use foundation::{Arena, Coordinate, Handle};
use serde::Serialize;
use tracing::{debug, info};

use crate::filter::{CategoryFilter, PinContext, exclusion, pin_coordinate};
use crate::surface::{
    AnchorKey, AnchorOp, AnchorOperationFailed, AnchorTarget, MapSurface, MarkerSpec,
    SurfaceError, SurfaceInstance, SurfaceMarkerId,
};
use crate::symbology::{MarkerStyle, OverlaySummary};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorHandle(Handle);

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    target: AnchorTarget,
    marker: SurfaceMarkerId,
    spec: MarkerSpec,
}

impl Anchor {
    pub fn target(&self) -> &AnchorTarget {
        &self.target
    }

    pub fn marker(&self) -> SurfaceMarkerId {
        self.marker
    }

    pub fn spec(&self) -> &MarkerSpec {
        &self.spec
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub removed: usize,
    pub updated: usize,
    /// Changed anchors that could not be updated in place.
    pub recreated: usize,
    pub unchanged: usize,
    /// Items that are soft-deleted, unplaceable or filtered out.
    pub excluded: usize,
    pub failed: usize,
}

pub fn marker_spec(item: &ContentItem, pins: &PinContext) -> MarkerSpec {
    MarkerSpec {
        coordinate: pin_coordinate(item, pins).unwrap_or(item.coordinate),
        style: MarkerStyle::for_item(item, pins.now),
        overlay: Some(OverlaySummary::for_item(item)),
    }
}

/// Opens or closes the overlay of `marker`. Returns whether a toggle was needed.
pub(crate) fn apply_overlay<S: MapSurface + ?Sized>(
    surface: &mut S,
    marker: SurfaceMarkerId,
    open: bool,
) -> Result<bool, (AnchorOp, SurfaceError)> {
    let current = surface
        .is_overlay_open(marker)
        .map_err(|e| (AnchorOp::Query, e))?;
    if current == open {
        return Ok(false);
    }
    surface
        .toggle_overlay(marker)
        .map_err(|e| (AnchorOp::Toggle, e))?;
    Ok(true)
}

#[derive(Debug, Default)]
pub struct MarkerRegistry {
    anchors: Arena<Anchor>,
    by_kind: [BTreeMap<ItemId, AnchorHandle>; 3],
    location: Option<AnchorHandle>,
    instance: Option<SurfaceInstance>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the live anchors of `kind` in line with `items` under `filter`.
    ///
    /// New anchors open their overlay. Anchors whose rendering did not change
    /// are not touched, so their overlay state survives.
    pub fn reconcile<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        kind: ContentKind,
        items: &[ContentItem],
        filter: &CategoryFilter,
        pins: &PinContext,
    ) -> ReconcileSummary {
        self.sync_instance(surface);
        let mut summary = ReconcileSummary::default();

        let mut wanted = BTreeSet::new();
        let mut target = Vec::with_capacity(items.len());
        for item in items {
            if let Some(reason) = exclusion(item, filter, pins) {
                debug!(%kind, id = %item.id, ?reason, "item not pinned");
                summary.excluded += 1;
                continue;
            }
            if !wanted.insert(item.id.clone()) {
                debug!(%kind, id = %item.id, "duplicate item id ignored");
                continue;
            }
            target.push((item.id.clone(), marker_spec(item, pins)));
        }

        let idx = kind.index();
        let vanished: Vec<ItemId> = self.by_kind[idx]
            .keys()
            .filter(|id| !wanted.contains(*id))
            .cloned()
            .collect();
        for id in vanished {
            if let Some(handle) = self.by_kind[idx].remove(&id) {
                if !self.destroy(surface, handle) {
                    summary.failed += 1;
                }
                summary.removed += 1;
            }
        }

        for (id, spec) in target {
            let existing = self.by_kind[idx].get(&id).copied();
            match existing {
                Some(handle) => self.refresh(surface, kind, id, handle, spec, &mut summary),
                None => {
                    let key = AnchorKey::new(kind, id.clone());
                    match self.create(surface, AnchorTarget::Item(key), spec, true) {
                        Ok(handle) => {
                            self.by_kind[idx].insert(id, handle);
                            summary.created += 1;
                        }
                        Err(err) => {
                            err.log();
                            summary.failed += 1;
                        }
                    }
                }
            }
        }

        debug!(%kind, ?summary, "reconciled");
        summary
    }

    /// Replaces the current-location anchor. `None` or an unusable coordinate removes it.
    pub fn reconcile_current_location<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        coordinate: Option<Coordinate>,
    ) -> Option<SurfaceMarkerId> {
        self.sync_instance(surface);
        if let Some(handle) = self.location.take() {
            self.destroy(surface, handle);
        }
        let coordinate = coordinate.filter(Coordinate::is_usable)?;
        let spec = MarkerSpec {
            coordinate,
            style: MarkerStyle::location(),
            overlay: None,
        };
        match self.create(surface, AnchorTarget::CurrentLocation, spec, false) {
            Ok(handle) => {
                self.location = Some(handle);
                self.location_anchor()
            }
            Err(err) => {
                err.log();
                None
            }
        }
    }

    /// Destroys every anchor, content and location alike. Returns how many were released.
    pub fn clear_all<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        let forgotten = self.sync_instance(surface);
        let drained = self.anchors.drain();
        let count = drained.len();
        for (_, anchor) in drained {
            if let Err(err) = surface.remove_marker(anchor.marker) {
                AnchorOperationFailed::new(anchor.target, AnchorOp::Remove, err).log();
            }
        }
        for index in &mut self.by_kind {
            index.clear();
        }
        self.location = None;
        debug!(count, forgotten, "cleared all anchors");
        count + forgotten
    }

    pub fn live_count(&self, kind: ContentKind) -> usize {
        self.by_kind[kind.index()].len()
    }

    /// Content and location anchors together.
    pub fn total_live(&self) -> usize {
        self.anchors.len()
    }

    pub fn location_anchor(&self) -> Option<SurfaceMarkerId> {
        self.location
            .and_then(|h| self.anchors.get(h.0))
            .map(|a| a.marker)
    }

    /// Content anchors in registration order of kinds, then by item id.
    pub fn anchors(&self) -> impl Iterator<Item = (AnchorKey, SurfaceMarkerId)> + '_ {
        ContentKind::ALL.into_iter().flat_map(move |kind| {
            self.by_kind[kind.index()]
                .iter()
                .filter_map(move |(id, handle)| {
                    self.anchors
                        .get(handle.0)
                        .map(|a| (AnchorKey::new(kind, id.clone()), a.marker))
                })
        })
    }

    pub fn handle_of(&self, key: &AnchorKey) -> Option<AnchorHandle> {
        self.by_kind[key.kind.index()].get(&key.id).copied()
    }

    pub fn anchor(&self, handle: AnchorHandle) -> Option<&Anchor> {
        self.anchors.get(handle.0)
    }

    pub fn marker_of(&self, key: &AnchorKey) -> Option<SurfaceMarkerId> {
        self.handle_of(key)
            .and_then(|h| self.anchor(h))
            .map(|a| a.marker)
    }

    pub fn key_of(&self, marker: SurfaceMarkerId) -> Option<AnchorKey> {
        self.anchors
            .iter()
            .find(|(_, a)| a.marker == marker)
            .and_then(|(_, a)| match &a.target {
                AnchorTarget::Item(key) => Some(key.clone()),
                AnchorTarget::CurrentLocation => None,
            })
    }

    pub fn instance(&self) -> Option<SurfaceInstance> {
        self.instance
    }

    /// Forgets anchors created on a previous surface instance; they died with it.
    fn sync_instance<S: MapSurface + ?Sized>(&mut self, surface: &S) -> usize {
        let current = surface.instance();
        let previous = self.instance.replace(current);
        match previous {
            Some(prev) if prev != current => {
                let forgotten = self.anchors.drain().len();
                for index in &mut self.by_kind {
                    index.clear();
                }
                self.location = None;
                info!(forgotten, "map surface was rebuilt, dropping stale anchors");
                forgotten
            }
            _ => 0,
        }
    }

    fn create<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        target: AnchorTarget,
        spec: MarkerSpec,
        open: bool,
    ) -> Result<AnchorHandle, AnchorOperationFailed> {
        let marker = surface
            .add_marker(&spec)
            .map_err(|e| AnchorOperationFailed::new(target.clone(), AnchorOp::Create, e))?;
        if spec.overlay.is_some() {
            if let Err((op, err)) = apply_overlay(surface, marker, open) {
                AnchorOperationFailed::new(target.clone(), op, err).log();
            }
        }
        let handle = self.anchors.insert(Anchor {
            target,
            marker,
            spec,
        });
        Ok(AnchorHandle(handle))
    }

    /// Removes the anchor from the arena and the surface.
    ///
    /// Returns `false` if the surface call failed.
    fn destroy<S: MapSurface + ?Sized>(&mut self, surface: &mut S, handle: AnchorHandle) -> bool {
        let Some(anchor) = self.anchors.remove(handle.0) else {
            return true;
        };
        match surface.remove_marker(anchor.marker) {
            Ok(()) => true,
            Err(err) => {
                AnchorOperationFailed::new(anchor.target, AnchorOp::Remove, err).log();
                false
            }
        }
    }

    fn refresh<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        kind: ContentKind,
        id: ItemId,
        handle: AnchorHandle,
        spec: MarkerSpec,
        summary: &mut ReconcileSummary,
    ) {
        let Some(anchor) = self.anchors.get_mut(handle.0) else {
            self.by_kind[kind.index()].remove(&id);
            return;
        };
        if anchor.spec == spec {
            summary.unchanged += 1;
            return;
        }
        let err = match surface.update_marker(anchor.marker, &spec) {
            Ok(()) => {
                anchor.spec = spec;
                summary.updated += 1;
                return;
            }
            Err(err) => err,
        };
        AnchorOperationFailed::new(anchor.target.clone(), AnchorOp::Update, err).log();

        // Recreate, carrying over whether the user had the overlay open.
        let was_open = surface.is_overlay_open(anchor.marker).unwrap_or(true);
        let target = anchor.target.clone();
        self.by_kind[kind.index()].remove(&id);
        self.destroy(surface, handle);
        match self.create(surface, target, spec, was_open) {
            Ok(handle) => {
                self.by_kind[kind.index()].insert(id, handle);
                summary.recreated += 1;
            }
            Err(err) => {
                err.log();
                summary.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};
    use feed::{Category, ContentExtra};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::headless::HeadlessSurface;

    fn item(kind: ContentKind, id: u64, content: &str) -> ContentItem {
        ContentItem {
            id: ItemId::from(id),
            author_id: "u".into(),
            coordinate: Coordinate::new(35.0 + id as f64 * 0.001, 139.0),
            created_at: None,
            content: content.into(),
            category: Some(Category::Community),
            like_count: 0,
            tags: Vec::new(),
            valid: true,
            extra: ContentExtra::for_kind(kind),
        }
    }

    fn pins() -> PinContext {
        PinContext::at(None, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn sync(
        registry: &mut MarkerRegistry,
        surface: &mut HeadlessSurface,
        kind: ContentKind,
        items: &[ContentItem],
    ) -> ReconcileSummary {
        registry.reconcile(surface, kind, items, &CategoryFilter::All, &pins())
    }

    fn posts(ids: &[u64]) -> Vec<ContentItem> {
        ids.iter().map(|id| item(ContentKind::Post, *id, "p")).collect()
    }

    fn live_ids(registry: &MarkerRegistry, kind: ContentKind) -> Vec<String> {
        registry
            .anchors()
            .filter(|(key, _)| key.kind == kind)
            .map(|(key, _)| key.id.to_string())
            .collect()
    }

    #[test]
    fn new_anchors_are_created_open() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &posts(&[1, 2, 3]));
        assert_eq!(summary.created, 3);
        assert_eq!(registry.live_count(ContentKind::Post), 3);
        assert_eq!(surface.open_count(), 3);
    }

    #[test]
    fn unchanged_anchors_are_left_alone() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let items = posts(&[1, 2]);
        sync(&mut registry, &mut surface, ContentKind::Post, &items);
        let closed = registry
            .marker_of(&AnchorKey::new(ContentKind::Post, ItemId::from(1)))
            .unwrap();
        surface.set_overlay_open(closed, false);
        let before = surface.ops();

        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &items);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(surface.ops(), before);
        assert_eq!(surface.marker(closed).map(|m| m.overlay_open), Some(false));
    }

    #[test]
    fn vanished_items_lose_their_anchor() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        sync(&mut registry, &mut surface, ContentKind::Post, &posts(&[1, 2, 3]));
        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &posts(&[2]));
        assert_eq!(summary.removed, 2);
        assert_eq!(live_ids(&registry, ContentKind::Post), vec!["2".to_string()]);
        assert_eq!(surface.len(), 1);
    }

    #[test]
    fn changed_item_updates_in_place() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        sync(&mut registry, &mut surface, ContentKind::Event, &[item(ContentKind::Event, 1, "a")]);
        let key = AnchorKey::new(ContentKind::Event, ItemId::from(1));
        let marker = registry.marker_of(&key).unwrap();

        let changed = [item(ContentKind::Event, 1, "b")];
        let summary = sync(&mut registry, &mut surface, ContentKind::Event, &changed);
        assert_eq!(summary.updated, 1);
        assert_eq!(registry.marker_of(&key), Some(marker));
        let headline = surface
            .marker(marker)
            .and_then(|m| m.spec.overlay.as_ref())
            .map(|o| o.headline.clone());
        assert_eq!(headline.as_deref(), Some("b"));
    }

    #[test]
    fn rejected_update_recreates_and_keeps_closed_overlay() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        sync(&mut registry, &mut surface, ContentKind::Event, &[item(ContentKind::Event, 1, "a")]);
        let key = AnchorKey::new(ContentKind::Event, ItemId::from(1));
        let old = registry.marker_of(&key).unwrap();
        surface.set_overlay_open(old, false);
        surface.reject_updates(true);

        let changed = [item(ContentKind::Event, 1, "b")];
        let summary = sync(&mut registry, &mut surface, ContentKind::Event, &changed);
        assert_eq!(summary.recreated, 1);
        let new = registry.marker_of(&key).unwrap();
        assert_ne!(new, old);
        assert_eq!(surface.len(), 1);
        assert_eq!(surface.marker(new).map(|m| m.overlay_open), Some(false));
    }

    #[test]
    fn filter_and_validity_shape_the_target_set() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let mut items = posts(&[1, 2, 3]);
        items[0].valid = false;
        items[1].coordinate = Coordinate::new(0.0, 0.0);
        items[2].category = Some(Category::Food);

        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &items);
        assert_eq!((summary.created, summary.excluded), (1, 2));

        let only_disaster = CategoryFilter::only([Category::Disaster]);
        let summary =
            registry.reconcile(&mut surface, ContentKind::Post, &items, &only_disaster, &pins());
        assert_eq!(summary.removed, 1);
        assert_eq!(registry.live_count(ContentKind::Post), 0);
    }

    #[test]
    fn failed_create_is_retried_next_pass() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        surface.fail_next_adds(1);
        let items = posts(&[1, 2]);
        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &items);
        assert_eq!((summary.created, summary.failed), (1, 1));
        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &items);
        assert_eq!((summary.created, summary.unchanged), (1, 1));
        assert_eq!(registry.live_count(ContentKind::Post), 2);
    }

    #[test]
    fn duplicate_ids_get_one_anchor() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        sync(&mut registry, &mut surface, ContentKind::Post, &posts(&[4, 4]));
        assert_eq!(registry.live_count(ContentKind::Post), 1);
    }

    #[test]
    fn location_anchor_is_unique_and_distinct() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let first =
            registry.reconcile_current_location(&mut surface, Some(Coordinate::new(35.0, 139.0)));
        let second =
            registry.reconcile_current_location(&mut surface, Some(Coordinate::new(35.1, 139.0)));
        assert!(first.is_some() && second.is_some());
        assert_ne!(first, second);
        assert_eq!(surface.len(), 1);
        let marker = surface.marker(second.unwrap()).unwrap();
        assert_eq!(marker.spec.style, MarkerStyle::location());
        assert_eq!(registry.key_of(marker.id), None);
        assert_eq!(registry.reconcile_current_location(&mut surface, None), None);
        assert!(surface.is_empty());
    }

    #[test]
    fn clear_all_leaves_nothing_alive() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        sync(&mut registry, &mut surface, ContentKind::Post, &posts(&[1, 2]));
        let threads = [item(ContentKind::Thread, 1, "t")];
        sync(&mut registry, &mut surface, ContentKind::Thread, &threads);
        registry.reconcile_current_location(&mut surface, Some(Coordinate::new(35.0, 139.0)));

        assert_eq!(registry.clear_all(&mut surface), 4);
        for kind in ContentKind::ALL {
            assert_eq!(registry.live_count(kind), 0);
        }
        assert_eq!(registry.location_anchor(), None);
        assert_eq!(registry.total_live(), 0);
        assert!(surface.is_empty());
    }

    #[test]
    fn anchors_never_outlive_their_surface() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let items = posts(&[1, 2]);
        sync(&mut registry, &mut surface, ContentKind::Post, &items);
        surface.rebuild();

        let summary = sync(&mut registry, &mut surface, ContentKind::Post, &items);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.removed, 0);
        assert_eq!(registry.instance(), Some(surface.instance()));
        assert_eq!(surface.len(), 2);
    }

    #[test]
    fn key_of_maps_marker_back_to_item() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let threads = [item(ContentKind::Thread, 7, "t")];
        sync(&mut registry, &mut surface, ContentKind::Thread, &threads);
        let (key, marker) = registry.anchors().next().unwrap();
        assert_eq!(registry.key_of(marker), Some(key.clone()));
        assert_eq!(key, AnchorKey::new(ContentKind::Thread, ItemId::from(7)));
    }

    #[test]
    fn unplaced_event_is_pinned_at_current_location() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let here = Coordinate::new(35.0, 139.0);
        let now = pins().now;
        let mut event = item(ContentKind::Event, 1, "just now");
        event.coordinate = Coordinate::new(0.0, 0.0);
        event.category = None;
        event.created_at = Some(now - TimeDelta::seconds(30));

        let summary = registry.reconcile(
            &mut surface,
            ContentKind::Event,
            std::slice::from_ref(&event),
            &CategoryFilter::All,
            &PinContext::at(Some(here), now),
        );
        assert_eq!((summary.created, summary.excluded), (1, 0));
        let marker = registry
            .marker_of(&AnchorKey::new(ContentKind::Event, ItemId::from(1)))
            .unwrap();
        let spec = &surface.marker(marker).unwrap().spec;
        assert_eq!(spec.coordinate, here);
        assert_eq!((spec.style.color, spec.style.scale), ("#96ceb4", 1.0));

        // Without a location there is nowhere to put it.
        let summary = sync(&mut registry, &mut surface, ContentKind::Event, &[event]);
        assert_eq!((summary.removed, summary.excluded), (1, 1));
        assert!(surface.is_empty());
    }

    #[test]
    fn event_pin_shrinks_once_it_is_no_longer_new() {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        let created = pins().now;
        let mut event = item(ContentKind::Event, 1, "e");
        event.created_at = Some(created);
        let events = [event];
        let at = |minutes| PinContext::at(None, created + TimeDelta::minutes(minutes));

        let all = CategoryFilter::All;
        registry.reconcile(&mut surface, ContentKind::Event, &events, &all, &at(1));
        let summary = registry.reconcile(&mut surface, ContentKind::Event, &events, &all, &at(10));
        assert_eq!(summary.updated, 1);
        let (_, marker) = registry.anchors().next().unwrap();
        assert_eq!(surface.marker(marker).map(|m| m.spec.style.scale), Some(0.8));
    }
}
