use std::process::ExitCode;

use clap::Parser;
use feed::{
    Category, ContentKind, FeedConfig, FixedLocationProvider, HttpFeedApi, LocationStatus,
};
use foundation::Coordinate;
use markers::{CategoryFilter, HeadlessMarker, HeadlessSurface, PopupConfig};
use serde::Serialize;
use session::MapSession;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fetches the feed around a point and reports what the map would pin.
#[derive(Debug, Parser)]
#[command(name = "feed-probe")]
struct Args {
    /// Latitude to query around. Defaults to the configured fallback centre.
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
    /// Overrides FEED_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,
    /// Search radius in degrees. Overrides FEED_RADIUS_DEG.
    #[arg(long)]
    radius: Option<f64>,
    /// Only pin items of this category. Repeatable.
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Include every pin in the report.
    #[arg(long)]
    markers: bool,
}

#[derive(Debug, Serialize)]
struct CollectionReport {
    kind: ContentKind,
    items: usize,
    pinned: usize,
    fetch_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    status: &'static str,
    location: Option<Coordinate>,
    location_error: Option<String>,
    center: Option<Coordinate>,
    collections: Vec<CollectionReport>,
    open_overlays: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    markers: Vec<HeadlessMarker>,
}

fn status_label(status: LocationStatus) -> &'static str {
    match status {
        LocationStatus::Idle => "idle",
        LocationStatus::Resolving => "resolving",
        LocationStatus::Resolved => "resolved",
        LocationStatus::Failed => "failed",
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = FeedConfig::from_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(radius) = args.radius {
        config.radius_deg = radius;
    }
    let center = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
        _ => config.fallback_center,
    };

    let api = match HttpFeedApi::from_config(&config) {
        Ok(api) => api,
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    info!(base_url = %config.base_url, lat = center.lat, lng = center.lng, "probing feed");
    let mut session = MapSession::new(
        api,
        FixedLocationProvider::new(center),
        HeadlessSurface::new(),
        &config,
        PopupConfig::default(),
    );
    let handle = session.handle();
    if !args.categories.is_empty() {
        let categories = args.categories.iter().filter_map(|c| Category::parse(c));
        let filter = CategoryFilter::only(categories);
        if let Err(err) = handle.set_filter(filter) {
            error!(error = %err, "session rejected filter");
            return ExitCode::FAILURE;
        }
    }
    if let Err(err) = handle.request_location() {
        error!(error = %err, "session rejected location request");
        return ExitCode::FAILURE;
    }
    session.run_until_idle().await;

    let location = session.location();
    let registry = session.scene().registry();
    let surface = session.scene().surface();
    let collections = session
        .store()
        .iter()
        .map(|c| CollectionReport {
            kind: c.kind(),
            items: c.items().len(),
            pinned: registry.live_count(c.kind()),
            fetch_error: c.errors().fetch.as_ref().map(ToString::to_string),
        })
        .collect();
    let report = ProbeReport {
        status: status_label(location.status),
        location: location.resolved(),
        location_error: location.error_message(),
        center: surface.center(),
        collections,
        open_overlays: surface.open_count(),
        markers: if args.markers {
            surface.markers().cloned().collect()
        } else {
            Vec::new()
        },
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            error!(error = %err, "failed to encode report");
            return ExitCode::FAILURE;
        }
    }

    let failed = session
        .store()
        .iter()
        .any(|c| c.errors().fetch.is_some());
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
