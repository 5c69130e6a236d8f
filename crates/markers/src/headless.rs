use std::collections::{BTreeMap, BTreeSet};

use foundation::Coordinate;
use serde::Serialize;

use crate::surface::{MapSurface, MarkerSpec, SurfaceError, SurfaceInstance, SurfaceMarkerId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlessMarker {
    pub id: SurfaceMarkerId,
    pub spec: MarkerSpec,
    pub overlay_open: bool,
}

/// Count of mutating calls, for asserting that a pass did no redundant work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceOps {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
    pub toggles: usize,
}

/// In-memory [`MapSurface`].
///
/// Backs the probe binary and the tests. Rebuilds, silent overlay resets and
/// per-marker failures can be injected to reproduce what a real map does
/// during style swaps.
#[derive(Debug)]
pub struct HeadlessSurface {
    instance: SurfaceInstance,
    next_marker: u64,
    markers: BTreeMap<SurfaceMarkerId, HeadlessMarker>,
    center: Option<Coordinate>,
    ops: SurfaceOps,
    fail_adds: usize,
    reject_updates: bool,
    broken: BTreeSet<SurfaceMarkerId>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            instance: SurfaceInstance(1),
            next_marker: 1,
            markers: BTreeMap::new(),
            center: None,
            ops: SurfaceOps::default(),
            fail_adds: 0,
            reject_updates: false,
            broken: BTreeSet::new(),
        }
    }

    /// Tears the surface down and starts a new instance. Every marker is lost.
    pub fn rebuild(&mut self) -> SurfaceInstance {
        self.instance = SurfaceInstance(self.instance.0 + 1);
        self.markers.clear();
        self.broken.clear();
        self.instance
    }

    /// What a style reload does to overlays the application did not close.
    pub fn close_all_overlays(&mut self) {
        for marker in self.markers.values_mut() {
            marker.overlay_open = false;
        }
    }

    /// A user click on the overlay's close button or on the pin.
    pub fn set_overlay_open(&mut self, id: SurfaceMarkerId, open: bool) -> bool {
        match self.markers.get_mut(&id) {
            Some(marker) => {
                marker.overlay_open = open;
                true
            }
            None => false,
        }
    }

    pub fn fail_next_adds(&mut self, count: usize) {
        self.fail_adds = count;
    }

    pub fn reject_updates(&mut self, reject: bool) {
        self.reject_updates = reject;
    }

    /// Makes overlay queries and toggles on `id` fail as if its handle went stale.
    pub fn break_marker(&mut self, id: SurfaceMarkerId) {
        self.broken.insert(id);
    }

    pub fn markers(&self) -> impl Iterator<Item = &HeadlessMarker> {
        self.markers.values()
    }

    pub fn marker(&self, id: SurfaceMarkerId) -> Option<&HeadlessMarker> {
        self.markers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.markers.values().filter(|m| m.overlay_open).count()
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.center
    }

    pub fn ops(&self) -> SurfaceOps {
        self.ops
    }

    fn live(&self, id: SurfaceMarkerId) -> Result<&HeadlessMarker, SurfaceError> {
        if self.broken.contains(&id) {
            return Err(SurfaceError::StaleMarker(id));
        }
        self.markers.get(&id).ok_or(SurfaceError::StaleMarker(id))
    }
}

impl MapSurface for HeadlessSurface {
    fn instance(&self) -> SurfaceInstance {
        self.instance
    }

    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<SurfaceMarkerId, SurfaceError> {
        if self.fail_adds > 0 {
            self.fail_adds -= 1;
            return Err(SurfaceError::Rejected("add refused".into()));
        }
        self.ops.adds += 1;
        let id = SurfaceMarkerId(self.next_marker);
        self.next_marker += 1;
        self.markers.insert(
            id,
            HeadlessMarker {
                id,
                spec: spec.clone(),
                overlay_open: false,
            },
        );
        Ok(id)
    }

    fn update_marker(
        &mut self,
        id: SurfaceMarkerId,
        spec: &MarkerSpec,
    ) -> Result<(), SurfaceError> {
        if self.reject_updates {
            return Err(SurfaceError::Rejected("update refused".into()));
        }
        let marker = self.markers.get_mut(&id).ok_or(SurfaceError::StaleMarker(id))?;
        marker.spec = spec.clone();
        if spec.overlay.is_none() {
            marker.overlay_open = false;
        }
        self.ops.updates += 1;
        Ok(())
    }

    fn remove_marker(&mut self, id: SurfaceMarkerId) -> Result<(), SurfaceError> {
        self.broken.remove(&id);
        self.markers.remove(&id).ok_or(SurfaceError::StaleMarker(id))?;
        self.ops.removes += 1;
        Ok(())
    }

    fn is_overlay_open(&self, id: SurfaceMarkerId) -> Result<bool, SurfaceError> {
        Ok(self.live(id)?.overlay_open)
    }

    fn toggle_overlay(&mut self, id: SurfaceMarkerId) -> Result<bool, SurfaceError> {
        if self.live(id)?.spec.overlay.is_none() {
            return Err(SurfaceError::Rejected(format!("{id} has no overlay")));
        }
        let marker = self.markers.get_mut(&id).ok_or(SurfaceError::StaleMarker(id))?;
        marker.overlay_open = !marker.overlay_open;
        self.ops.toggles += 1;
        Ok(marker.overlay_open)
    }

    fn ease_to(&mut self, center: Coordinate) {
        self.center = Some(center);
    }
}
