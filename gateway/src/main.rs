//! Tourist Safety Gateway
//!
//! Serves the tourist-facing and dashboard HTTP API and runs the periodic
//! anomaly scan.
//!
//! Usage:
//!   safety-gateway --port 5000 --zones data/zones/seed_zones.json \
//!                  --detection statistical --cron-secret hunter2

use anyhow::{Context, Result};
use clap::Parser;
use safety_engine::{DetectionKind, EngineConfig, MemoryStore, PanicPolicy, SafetyService, ScorePolicy};
use safety_zones::{loader, ZoneIndex};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;
mod scan_loop;
mod sessions;

use routes::AppState;
use sessions::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "safety-gateway", about = "Tourist safety scoring and anomaly detection gateway")]
struct Args {
    /// Listen port
    #[arg(long, env = "SAFETY_GATEWAY_PORT", default_value_t = 5000)]
    port: u16,

    /// Zone definitions (JSON); built-in seed zones when omitted
    #[arg(long, env = "SAFETY_ZONES_PATH")]
    zones: Option<PathBuf>,

    /// Seconds between background anomaly scans
    #[arg(long, env = "SAFETY_SCAN_INTERVAL_SECS", default_value_t = scan_loop::DEFAULT_SCAN_INTERVAL_SECS)]
    scan_interval_secs: u64,

    /// Run scans only through the cron endpoint
    #[arg(long, env = "SAFETY_DISABLE_SCANNER")]
    disable_scanner: bool,

    /// threshold | statistical
    #[arg(long, env = "SAFETY_DETECTION", default_value = "threshold")]
    detection: DetectionKind,

    #[arg(long, env = "SAFETY_WARNING_SECS", default_value_t = safety_engine::config::WARNING_INACTIVITY_SECS)]
    warning_secs: i64,

    #[arg(long, env = "SAFETY_CRITICAL_SECS", default_value_t = safety_engine::config::CRITICAL_INACTIVITY_SECS)]
    critical_secs: i64,

    /// Fraction of active tourists the statistical detector may flag
    #[arg(long, env = "SAFETY_CONTAMINATION", default_value_t = safety_engine::config::DEFAULT_CONTAMINATION)]
    contamination: f64,

    /// snap-recover | smoothing
    #[arg(long, env = "SAFETY_SCORE_POLICY", default_value = "snap-recover")]
    score_policy: ScorePolicy,

    /// flat-penalty | hard-reset
    #[arg(long, env = "SAFETY_PANIC_POLICY", default_value = "flat-penalty")]
    panic_policy: PanicPolicy,

    #[arg(long, env = "SAFETY_DEDUP_WINDOW_SECS", default_value_t = safety_engine::config::DEDUP_WINDOW_SECS)]
    dedup_window_secs: i64,

    /// Shared secret for POST /api/v1/cron/scan; endpoint disabled when unset
    #[arg(long, env = "SAFETY_CRON_SECRET")]
    cron_secret: Option<String>,

    #[arg(long, env = "SAFETY_SESSION_TTL_SECS", default_value_t = sessions::DEFAULT_SESSION_TTL_SECS)]
    session_ttl_secs: i64,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            score_policy: self.score_policy,
            panic_policy: self.panic_policy,
            detection: self.detection,
            warning_inactivity_secs: self.warning_secs,
            critical_inactivity_secs: self.critical_secs,
            contamination: self.contamination,
            dedup_window_secs: self.dedup_window_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "safety_gateway=debug,safety_engine=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let zones = match &args.zones {
        Some(path) => loader::load_zones(path)
            .with_context(|| format!("loading zones from {}", path.display()))?,
        None => ZoneIndex::with_seed_zones(),
    };
    tracing::info!("   Loaded {} safety zones", zones.len());

    let store = Arc::new(MemoryStore::new(&zones));
    let service = Arc::new(SafetyService::new(store, args.engine_config()).context("engine configuration")?);
    let sessions = Arc::new(SessionStore::from_ttl_secs(args.session_ttl_secs)?);

    if args.disable_scanner {
        tracing::warn!("   Background scanner disabled, use the cron endpoint");
    } else {
        scan_loop::start_background_scan(
            service.clone(),
            sessions.clone(),
            Duration::from_secs(args.scan_interval_secs.max(1)),
        );
        tracing::info!("   Anomaly scan every {}s", args.scan_interval_secs.max(1));
    }

    let state = AppState {
        service,
        sessions,
        cron_secret: args.cron_secret.as_deref().map(Arc::from),
    };

    let app = routes::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Safety Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
