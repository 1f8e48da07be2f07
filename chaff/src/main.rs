// chaff/src/main.rs
//
// chaff: cover-traffic noise daemon.
//
// Runs continuously on a home server, emitting synthetic browsing, search
// and DNS activity whose timing is statistically indistinguishable from a
// human's. The point is not to hide traffic but to drown it: every log an
// ISP or broker keeps about this network gains a plausible-noise floor.
//
// Usage:
//   chaff                               # defaults, medium intensity
//   chaff --config /data/options.json   # JSON options file
//   CHAFF_INTENSITY=paranoid chaff      # env overrides

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::{watch, Semaphore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod controls;
mod engine;
mod pattern;
mod persist;
mod scheduler;
mod stats;

use config::Config;
use controls::Controls;
use engine::browse::BrowseEngine;
use engine::dns::DnsEngine;
use engine::registry::EngineRegistry;
use engine::search::SearchEngine;
use pattern::obsession::ObsessionTracker;
use pattern::timing::{PoissonTimer, SessionConfig};
use persist::DriftState;
use scheduler::Scheduler;
use stats::RunStats;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "chaff",
    about   = "Cover-traffic noise daemon",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, help = "JSON options file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "chaff_state.json",
          help = "Timing state file (persists the weekly drift seed)")]
    state: PathBuf,

    #[arg(long, help = "Override the control surface port")]
    port: Option<u16>,
}

fn print_banner() {
    println!();
    println!("  \x1b[1mchaff {}\x1b[0m — cover-traffic noise daemon", env!("CARGO_PKG_VERSION"));
    println!("  \x1b[90mmaking passive surveillance expensive and unreliable\x1b[0m");
    println!();
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("chaff=info".parse()?))
        .compact().init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;
    let port = cli.port.unwrap_or(cfg.api_port);

    print_banner();

    let controls = Arc::new(Controls::new(cfg.intensity));
    let drift    = DriftState::load_or_init(&cli.state);
    let limiter  = Arc::new(Semaphore::new(cfg.max_concurrent_sessions));
    let client   = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(20))
        .build()?;

    // All producers register; the config flags only set their initial
    // enablement, so the dashboard can flip any of them later.
    let registry = Arc::new(EngineRegistry::new());
    registry.register(Arc::new(SearchEngine::new(
        client.clone(), limiter.clone(), controls.clone(), cfg.enable_search_noise,
    )));
    registry.register(Arc::new(BrowseEngine::new(
        client.clone(), limiter.clone(), controls.clone(), cfg.enable_browse_noise,
    )));
    registry.register(Arc::new(DnsEngine::new(limiter.clone(), cfg.enable_dns_noise)));

    let stats = Arc::new(RunStats::new());
    let session_cfg = SessionConfig {
        mean_duration_minutes: cfg.session_length_mean,
        obsession_probability: cfg.obsession_probability,
        ..SessionConfig::default()
    };
    let obsession = ObsessionTracker::new(
        session_cfg.obsession_probability,
        session_cfg.obsession_duration_hours,
    );
    let timer = PoissonTimer::new(controls.clone(), session_cfg, drift.drift_seed);

    let sched = Scheduler::new(
        registry.clone(), stats.clone(), timer, obsession, drift, cli.state.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sched_handle = tokio::spawn(sched.run(shutdown_rx.clone()));

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let app_state = api::AppState {
        registry,
        stats,
        controls,
        config: Arc::new(cfg),
    };
    api::serve(app_state, port, shutdown_rx).await?;

    sched_handle.await?;
    info!("goodbye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c     => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
