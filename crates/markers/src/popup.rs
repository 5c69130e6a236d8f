//! Overlay open/closed state across map disruptions.
//!
//! ```text
//! Idle --capture--> Disrupting --settle--> Settling{deadline} --poll--> Restoring --> Idle
//!                        ^                       |
//!                        +-------capture---------+
//! ```
//!
//! The snapshot is keyed by `(kind, item id)` so it survives anchors being
//! recreated in a different order. It is consumed by exactly one restore.

use std::collections::BTreeMap;

use foundation::Time;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::MarkerRegistry;
use crate::surface::{AnchorKey, AnchorOp, AnchorOperationFailed, AnchorTarget, MapSurface};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Delay between the terminal disruption event and the restore pass,
    /// giving the surface time to finish its own re-layout.
    pub settle_delay_s: f64,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            settle_delay_s: 0.3,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum PopupPhase {
    #[default]
    Idle,
    Disrupting,
    Settling {
        deadline: Time,
    },
    Restoring,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupSnapshot {
    entries: BTreeMap<AnchorKey, bool>,
}

impl PopupSnapshot {
    pub fn get(&self, key: &AnchorKey) -> Option<bool> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnchorKey, bool)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub opened: usize,
    pub closed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct PopupStateManager {
    config: PopupConfig,
    phase: PopupPhase,
    snapshot: PopupSnapshot,
}

impl PopupStateManager {
    pub fn new(config: PopupConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> PopupPhase {
        self.phase
    }

    pub fn snapshot(&self) -> &PopupSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> PopupConfig {
        self.config
    }

    /// Pending restore deadline, if settling.
    pub fn deadline(&self) -> Option<Time> {
        match self.phase {
            PopupPhase::Settling { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Records whether each live anchor's overlay is open.
    ///
    /// Starting from `Idle` the snapshot is fresh. A capture that overlaps a
    /// pending restore keeps the values recorded before the first disruption
    /// and only adds anchors it has not seen. Returns the snapshot size.
    pub fn capture<S: MapSurface + ?Sized>(
        &mut self,
        surface: &S,
        registry: &MarkerRegistry,
    ) -> usize {
        if matches!(self.phase, PopupPhase::Idle | PopupPhase::Restoring) {
            self.snapshot = PopupSnapshot::default();
        }
        for (key, marker) in registry.anchors() {
            if self.snapshot.entries.contains_key(&key) {
                continue;
            }
            match surface.is_overlay_open(marker) {
                Ok(open) => {
                    self.snapshot.entries.insert(key, open);
                }
                Err(err) => {
                    AnchorOperationFailed::new(AnchorTarget::Item(key), AnchorOp::Query, err).log();
                }
            }
        }
        self.phase = PopupPhase::Disrupting;
        debug!(entries = self.snapshot.len(), "captured overlay state");
        self.snapshot.len()
    }

    /// A terminal disruption event arrived. Restores once `now + settle_delay_s`
    /// passes; a later call pushes the deadline out.
    pub fn settle(&mut self, now: Time) -> Time {
        let deadline = now.after(self.config.settle_delay_s);
        self.phase = PopupPhase::Settling { deadline };
        deadline
    }

    /// Runs the restore if the settle deadline has passed.
    pub fn poll<S: MapSurface + ?Sized>(
        &mut self,
        now: Time,
        surface: &mut S,
        registry: &MarkerRegistry,
    ) -> Option<RestoreSummary> {
        match self.phase {
            PopupPhase::Settling { deadline } if now >= deadline => {
                Some(self.restore(surface, registry))
            }
            _ => None,
        }
    }

    /// Reapplies the snapshot to every live anchor, then clears it.
    ///
    /// Anchors without an entry are opened. A failure on one anchor is logged
    /// and the rest are still restored.
    pub fn restore<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        registry: &MarkerRegistry,
    ) -> RestoreSummary {
        self.phase = PopupPhase::Restoring;
        let mut summary = RestoreSummary::default();
        for (key, marker) in registry.anchors() {
            let desired = self.snapshot.get(&key).unwrap_or(true);
            let current = match surface.is_overlay_open(marker) {
                Ok(open) => open,
                Err(err) => {
                    AnchorOperationFailed::new(AnchorTarget::Item(key), AnchorOp::Query, err).log();
                    summary.failed += 1;
                    continue;
                }
            };
            if current == desired {
                summary.unchanged += 1;
                continue;
            }
            match surface.toggle_overlay(marker) {
                Ok(true) => summary.opened += 1,
                Ok(false) => summary.closed += 1,
                Err(err) => {
                    let target = AnchorTarget::Item(key);
                    AnchorOperationFailed::new(target, AnchorOp::Toggle, err).log();
                    summary.failed += 1;
                }
            }
        }
        self.snapshot = PopupSnapshot::default();
        self.phase = PopupPhase::Idle;
        debug!(?summary, "restored overlay state");
        summary
    }
}

#[cfg(test)]
mod tests {
    use feed::{Category, ContentExtra, ContentItem, ContentKind, ItemId};
    use foundation::Coordinate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::filter::{CategoryFilter, PinContext};
    use crate::headless::HeadlessSurface;
    use crate::surface::SurfaceMarkerId;

    fn posts(ids: &[u64]) -> Vec<ContentItem> {
        ids.iter()
            .map(|id| ContentItem {
                id: ItemId::from(*id),
                author_id: "u".into(),
                coordinate: Coordinate::new(35.0, 139.0 + *id as f64 * 0.001),
                created_at: None,
                content: format!("post {id}"),
                category: Some(Category::Information),
                like_count: 0,
                tags: Vec::new(),
                valid: true,
                extra: ContentExtra::Post { parent: None },
            })
            .collect()
    }

    fn marker(registry: &MarkerRegistry, id: u64) -> SurfaceMarkerId {
        registry
            .marker_of(&AnchorKey::new(ContentKind::Post, ItemId::from(id)))
            .unwrap()
    }

    fn pin_posts(registry: &mut MarkerRegistry, surface: &mut HeadlessSurface, ids: &[u64]) {
        let pins = PinContext::new(None);
        registry.reconcile(surface, ContentKind::Post, &posts(ids), &CategoryFilter::All, &pins);
    }

    fn setup(ids: &[u64]) -> (HeadlessSurface, MarkerRegistry) {
        let mut surface = HeadlessSurface::new();
        let mut registry = MarkerRegistry::new();
        pin_posts(&mut registry, &mut surface, ids);
        (surface, registry)
    }

    #[test]
    fn restore_reapplies_snapshot_after_rebuild() {
        let (mut surface, mut registry) = setup(&[1, 2, 3]);
        surface.set_overlay_open(marker(&registry, 2), false);
        let mut popups = PopupStateManager::new(PopupConfig::default());
        assert_eq!(popups.capture(&surface, &registry), 3);

        surface.rebuild();
        pin_posts(&mut registry, &mut surface, &[1, 2, 3]);
        assert_eq!(surface.open_count(), 3);

        let deadline = popups.settle(Time(1.0));
        assert_eq!(deadline, Time(1.3));
        assert_eq!(popups.poll(Time(1.2), &mut surface, &registry), None);
        let summary = popups.poll(Time(1.3), &mut surface, &registry).unwrap();
        assert_eq!(summary, RestoreSummary { opened: 0, closed: 1, unchanged: 2, failed: 0 });
        assert_eq!(surface.marker(marker(&registry, 2)).map(|m| m.overlay_open), Some(false));
        assert_eq!(popups.phase(), PopupPhase::Idle);
        assert!(popups.snapshot().is_empty());
    }

    #[test]
    fn anchors_without_entry_default_open() {
        let (mut surface, mut registry) = setup(&[1]);
        let mut popups = PopupStateManager::default();
        popups.capture(&surface, &registry);
        pin_posts(&mut registry, &mut surface, &[1, 2]);
        surface.close_all_overlays();
        let summary = popups.restore(&mut surface, &registry);
        assert_eq!(summary.opened, 2);
        assert_eq!(surface.open_count(), 2);
    }

    #[test]
    fn one_stale_anchor_does_not_abort_restore() {
        let (mut surface, registry) = setup(&[1, 2, 3]);
        let mut popups = PopupStateManager::default();
        popups.capture(&surface, &registry);
        surface.close_all_overlays();
        surface.break_marker(marker(&registry, 2));
        let summary = popups.restore(&mut surface, &registry);
        assert_eq!(summary.opened, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn overlapping_capture_keeps_first_values() {
        let (mut surface, registry) = setup(&[1, 2]);
        surface.set_overlay_open(marker(&registry, 1), false);
        let mut popups = PopupStateManager::default();
        popups.capture(&surface, &registry);
        popups.settle(Time(0.0));

        // The surface reopened everything before the second disruption began.
        surface.set_overlay_open(marker(&registry, 1), true);
        popups.capture(&surface, &registry);
        let key = AnchorKey::new(ContentKind::Post, ItemId::from(1));
        assert_eq!(popups.snapshot().get(&key), Some(false));
        assert_eq!(popups.phase(), PopupPhase::Disrupting);
        assert_eq!(popups.deadline(), None);
    }

    #[test]
    fn settle_debounces() {
        let mut popups = PopupStateManager::default();
        popups.settle(Time(0.0));
        popups.settle(Time(0.2));
        assert_eq!(popups.deadline(), Some(Time(0.5)));
    }

    #[test]
    fn fresh_capture_after_restore() {
        let (mut surface, registry) = setup(&[1]);
        surface.set_overlay_open(marker(&registry, 1), false);
        let mut popups = PopupStateManager::default();
        popups.capture(&surface, &registry);
        popups.restore(&mut surface, &registry);

        surface.set_overlay_open(marker(&registry, 1), true);
        popups.capture(&surface, &registry);
        let key = AnchorKey::new(ContentKind::Post, ItemId::from(1));
        assert_eq!(popups.snapshot().get(&key), Some(true));
    }
}
