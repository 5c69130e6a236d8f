use std::fmt;

use feed::{ContentKind, ItemId};
use foundation::Coordinate;
use serde::Serialize;
use thiserror::Error;

use crate::symbology::{MarkerStyle, OverlaySummary};

/// Marker id assigned by the map surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SurfaceMarkerId(pub u64);

impl fmt::Display for SurfaceMarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// Identity of one rendering surface. Changes whenever the surface is rebuilt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SurfaceInstance(pub u64);

/// Everything the surface needs to draw one pin and its overlay.
///
/// Two equal specs render identically, so the registry uses the spec as the
/// change fingerprint of an anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub coordinate: Coordinate,
    pub style: MarkerStyle,
    /// `None` for pins without an info overlay.
    pub overlay: Option<OverlaySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("{0} no longer exists on the surface")]
    StaleMarker(SurfaceMarkerId),
    #[error("surface rejected the operation: {0}")]
    Rejected(String),
}

/// The interactive map the anchors live on.
///
/// Overlays of newly added markers start closed; the registry opens them.
pub trait MapSurface {
    fn instance(&self) -> SurfaceInstance;
    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<SurfaceMarkerId, SurfaceError>;
    fn update_marker(&mut self, id: SurfaceMarkerId, spec: &MarkerSpec) -> Result<(), SurfaceError>;
    fn remove_marker(&mut self, id: SurfaceMarkerId) -> Result<(), SurfaceError>;
    fn is_overlay_open(&self, id: SurfaceMarkerId) -> Result<bool, SurfaceError>;
    /// Flips the overlay and returns its new state.
    fn toggle_overlay(&mut self, id: SurfaceMarkerId) -> Result<bool, SurfaceError>;
    fn ease_to(&mut self, center: Coordinate);
}

/// Stable identity of a content anchor across surface rebuilds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AnchorKey {
    pub kind: ContentKind,
    pub id: ItemId,
}

impl AnchorKey {
    pub fn new(kind: ContentKind, id: ItemId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for AnchorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorTarget {
    Item(AnchorKey),
    CurrentLocation,
}

impl fmt::Display for AnchorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorTarget::Item(key) => key.fmt(f),
            AnchorTarget::CurrentLocation => f.write_str("current-location"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnchorOp {
    Create,
    Update,
    Remove,
    Query,
    Toggle,
}

impl fmt::Display for AnchorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnchorOp::Create => "create",
            AnchorOp::Update => "update",
            AnchorOp::Remove => "remove",
            AnchorOp::Query => "query",
            AnchorOp::Toggle => "toggle",
        })
    }
}

/// A single anchor operation failed. Never fatal: logged, then the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} of anchor {target} failed: {source}")]
pub struct AnchorOperationFailed {
    pub target: AnchorTarget,
    pub op: AnchorOp,
    pub source: SurfaceError,
}

impl AnchorOperationFailed {
    pub fn new(target: AnchorTarget, op: AnchorOp, source: SurfaceError) -> Self {
        Self { target, op, source }
    }

    pub(crate) fn log(self) {
        tracing::warn!(
            anchor = %self.target,
            op = %self.op,
            error = %self.source,
            "anchor operation failed"
        );
    }
}
