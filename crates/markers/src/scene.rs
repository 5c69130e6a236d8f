use feed::{ContentCollection, ContentKind, ContentStore};
use foundation::{Coordinate, Time};
use serde::Serialize;

use crate::filter::{CategoryFilter, PinContext};
use crate::popup::{PopupConfig, PopupStateManager, RestoreSummary};
use crate::registry::{MarkerRegistry, ReconcileSummary};
use crate::surface::{MapSurface, SurfaceMarkerId};

/// Per-kind results of one full reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SceneSummary {
    pub kinds: [ReconcileSummary; 3],
}

impl SceneSummary {
    pub fn get(&self, kind: ContentKind) -> &ReconcileSummary {
        &self.kinds[kind.index()]
    }
}

/// A map surface together with the anchors and overlay state placed on it.
#[derive(Debug)]
pub struct MapScene<S: MapSurface> {
    surface: S,
    registry: MarkerRegistry,
    popups: PopupStateManager,
    location: Option<Coordinate>,
}

impl<S: MapSurface> MapScene<S> {
    pub fn new(surface: S, popups: PopupConfig) -> Self {
        Self {
            surface,
            registry: MarkerRegistry::new(),
            popups: PopupStateManager::new(popups),
            location: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn popups(&self) -> &PopupStateManager {
        &self.popups
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Events without a coordinate are pinned at the last reported location.
    pub fn reconcile_kind(
        &mut self,
        collection: &ContentCollection,
        filter: &CategoryFilter,
    ) -> ReconcileSummary {
        let pins = PinContext::new(self.location);
        self.reconcile_with(collection, filter, &pins)
    }

    /// Reconciles every kind in registration order.
    ///
    /// A location anchor lost to a surface rebuild is put back first.
    pub fn reconcile_all(&mut self, store: &ContentStore, filter: &CategoryFilter) -> SceneSummary {
        let rebuilt = self.registry.instance() != Some(self.surface.instance());
        if self.location.is_some() && (rebuilt || self.registry.location_anchor().is_none()) {
            self.reconcile_location(self.location);
        }
        let pins = PinContext::new(self.location);
        let mut summary = SceneSummary::default();
        for collection in store.iter() {
            summary.kinds[collection.kind().index()] =
                self.reconcile_with(collection, filter, &pins);
        }
        summary
    }

    fn reconcile_with(
        &mut self,
        collection: &ContentCollection,
        filter: &CategoryFilter,
        pins: &PinContext,
    ) -> ReconcileSummary {
        let (kind, items) = (collection.kind(), collection.items());
        self.registry.reconcile(&mut self.surface, kind, items, filter, pins)
    }

    pub fn reconcile_location(
        &mut self,
        coordinate: Option<Coordinate>,
    ) -> Option<SurfaceMarkerId> {
        self.location = coordinate;
        self.registry
            .reconcile_current_location(&mut self.surface, coordinate)
    }

    pub fn clear_all(&mut self) -> usize {
        self.registry.clear_all(&mut self.surface)
    }

    pub fn ease_to(&mut self, center: Coordinate) {
        self.surface.ease_to(center);
    }

    pub fn capture(&mut self) -> usize {
        self.popups.capture(&self.surface, &self.registry)
    }

    pub fn settle(&mut self, now: Time) -> Time {
        self.popups.settle(now)
    }

    pub fn restore_deadline(&self) -> Option<Time> {
        self.popups.deadline()
    }

    pub fn poll(&mut self, now: Time) -> Option<RestoreSummary> {
        self.popups.poll(now, &mut self.surface, &self.registry)
    }

    pub fn restore_now(&mut self) -> RestoreSummary {
        self.popups.restore(&mut self.surface, &self.registry)
    }
}
