//! mirrorsense daemon.
//!
//! Logs go to stderr; stdout carries one JSON object per fan-out event for
//! the host process.

use anyhow::{Context, Result};
use clap::Parser;
use mirrorsense_application::{
    build_widget, spawn_fetcher, widgets::EventForwarder, HttpPersonalDataSource, MirrorConfig,
    PresenceHub, SOURCE_MEMO_TTL,
};
use mirrorsense_bus::{BusConfig, FanoutBus};
use mirrorsense_events::JsonLinesEventBus;
use mirrorsense_presence::{FileStatusSource, HttpStatusSource, MemoizedSource, SharedSource};
use mirrorsense_profiles::{ProfileStore, ProfileWatcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,mirrorsense=debug";
const FORWARDER_ID: &str = "stdout";

#[derive(Debug, Parser)]
#[command(name = "mirrord", version, about = "Presence tracking and personalization for a smart mirror")]
struct Args {
    /// Config file (default: <config dir>/mirrorsense/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// tracing filter, overrides RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,

    /// Status file written by the face detector
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Profile table
    #[arg(long)]
    profiles_file: Option<PathBuf>,
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn status_source(config: &MirrorConfig) -> SharedSource {
    match (&config.status_endpoint, config.memoize_source) {
        (Some(endpoint), true) => Arc::new(MemoizedSource::new(HttpStatusSource::new(endpoint), SOURCE_MEMO_TTL)),
        (Some(endpoint), false) => Arc::new(HttpStatusSource::new(endpoint)),
        (None, true) => Arc::new(MemoizedSource::new(
            FileStatusSource::new(&config.status_file),
            SOURCE_MEMO_TTL,
        )),
        (None, false) => Arc::new(FileStatusSource::new(&config.status_file)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_filter.as_deref());

    let config_path = match args.config {
        Some(path) => path,
        None => MirrorConfig::default_path().context("no config directory on this platform")?,
    };
    let mut config = MirrorConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(status_file) = args.status_file {
        config.status_file = status_file;
    }
    if let Some(profiles_file) = args.profiles_file {
        config.profiles_file = profiles_file;
    }

    let status = match &config.status_endpoint {
        Some(endpoint) => endpoint.clone(),
        None => config.status_file.display().to_string(),
    };
    tracing::info!(
        status = %status,
        profiles = %config.profiles_file.display(),
        widgets = config.widgets.len(),
        "Starting mirrord"
    );

    let profiles = Arc::new(ProfileStore::open(&config.profiles_file));
    let _watcher = if config.watch_profiles {
        match ProfileWatcher::new(profiles.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Profile hot-reload disabled");
                None
            }
        }
    } else {
        None
    };

    let bus = FanoutBus::with_config(BusConfig {
        mailbox_capacity: config.mailbox_capacity,
    });
    let mut hub = PresenceHub::with_bus(status_source(&config), profiles, bus.clone());

    hub.join(Box::new(EventForwarder::new(
        FORWARDER_ID,
        Arc::new(JsonLinesEventBus::stdout()),
    )))
    .context("registering stdout forwarder")?;
    for (index, widget) in config.widgets.iter().enumerate() {
        hub.join(build_widget(widget, index))
            .with_context(|| format!("registering widget {}", widget.id(index)))?;
    }

    let cancel = CancellationToken::new();
    let fetcher = config
        .personal_api
        .as_ref()
        .filter(|api| api.enabled)
        .map(|api| {
            spawn_fetcher(
                Arc::new(HttpPersonalDataSource::new(&api.url)),
                bus.clone(),
                api.refresh_interval(),
                cancel.child_token(),
            )
        });

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("Shutting down");

    cancel.cancel();
    if let Some(fetcher) = fetcher {
        if let Err(e) = fetcher.await {
            tracing::error!(error = %e, "Personal data fetcher failed");
        }
    }
    hub.shutdown().await;

    let stats = bus.stats().snapshot();
    tracing::info!(
        published = stats.published,
        delivered = stats.delivered,
        dropped = stats.dropped,
        "mirrord stopped"
    );
    Ok(())
}
