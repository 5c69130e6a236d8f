use feed::ContentStore;
use foundation::Time;
use tracing::{debug, info};

use crate::filter::CategoryFilter;
use crate::scene::MapScene;
use crate::surface::MapSurface;

/// Lifecycle notifications emitted by the map surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapEvent {
    /// The style is about to be replaced; every anchor dies with it.
    StyleLoadStart,
    StyleLoadEnd,
    ZoomStart,
    ZoomEnd,
    /// The first style of a fresh surface finished loading.
    Load,
    Render,
    Idle,
    SourceData,
    StyleData,
    Unknown,
}

impl MapEvent {
    pub fn from_type(name: &str) -> Self {
        match name {
            "styledataloading" => MapEvent::StyleLoadStart,
            "style.load" => MapEvent::StyleLoadEnd,
            "zoomstart" => MapEvent::ZoomStart,
            "zoomend" => MapEvent::ZoomEnd,
            "load" => MapEvent::Load,
            "render" => MapEvent::Render,
            "idle" => MapEvent::Idle,
            "sourcedata" => MapEvent::SourceData,
            "styledata" => MapEvent::StyleData,
            _ => MapEvent::Unknown,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventClass {
    DisruptionStart,
    /// `rebuild` is set when the surface swapped its style and every anchor must be recreated.
    DisruptionEnd { rebuild: bool },
    Noise,
}

/// Drives registry and overlay passes from classified map events.
#[derive(Debug, Default)]
pub struct ViewportEventRouter {
    noise: u64,
    disruptions: u64,
}

impl ViewportEventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(event: MapEvent) -> EventClass {
        match event {
            MapEvent::StyleLoadStart | MapEvent::ZoomStart => EventClass::DisruptionStart,
            MapEvent::StyleLoadEnd => EventClass::DisruptionEnd { rebuild: true },
            MapEvent::ZoomEnd | MapEvent::Load => EventClass::DisruptionEnd { rebuild: false },
            MapEvent::Render
            | MapEvent::Idle
            | MapEvent::SourceData
            | MapEvent::StyleData
            | MapEvent::Unknown => EventClass::Noise,
        }
    }

    /// Routes one event.
    ///
    /// A start captures overlay state. An end reconciles every kind, after
    /// clearing all anchors on a style swap, and schedules the restore
    /// `settle_delay_s` after `now`. Noise is only counted.
    pub fn route<S: MapSurface>(
        &mut self,
        event: MapEvent,
        now: Time,
        scene: &mut MapScene<S>,
        store: &ContentStore,
        filter: &CategoryFilter,
    ) -> EventClass {
        let class = Self::classify(event);
        match class {
            EventClass::Noise => {
                self.noise += 1;
            }
            EventClass::DisruptionStart => {
                self.disruptions += 1;
                let captured = scene.capture();
                debug!(?event, captured, "disruption started");
            }
            EventClass::DisruptionEnd { rebuild } => {
                if rebuild {
                    let cleared = scene.clear_all();
                    info!(cleared, "style reloaded, rebuilding anchors");
                }
                let summary = scene.reconcile_all(store, filter);
                let deadline = scene.settle(now);
                debug!(?event, ?summary, restore_at = deadline.0, "disruption ended");
            }
        }
        class
    }

    pub fn noise_dropped(&self) -> u64 {
        self.noise
    }

    pub fn disruptions(&self) -> u64 {
        self.disruptions
    }
}
