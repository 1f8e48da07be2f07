// chaff/src/scheduler.rs
//
// Session scheduler: the single long-running task that decides *when* the
// next event happens, *what kind* it is, and hands it to a producer.
//
// Lifecycle, repeated forever:
//   1. wait out an inter-session gap
//   2. open a session: reset the chain, sample a planned duration, roll
//      the obsession dice over the producers' topic pool
//   3. walk the chain, dispatching each state to the registry, sleeping
//      dwell + a fraction of Poisson jitter between steps
//   4. close the session when the chain absorbs or the planned duration
//      runs out, whichever gate fires first
//
// Producer failures never reach this loop (the dispatch boundary absorbs
// them). Anything else that goes wrong here is logged and answered with a
// 30-second pause. A shutdown signal wins over every suspension.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::engine::registry::EngineRegistry;
use crate::pattern::chain::{ChainState, SessionChain};
use crate::pattern::obsession::ObsessionTracker;
use crate::pattern::timing::{epoch_now, epoch_now_secs, PoissonTimer};
use crate::persist::DriftState;
use crate::stats::RunStats;

/// Obsession pool when no registered producer contributes topics.
const FALLBACK_TOPICS: &[&str] = &[
    "hiking gear", "machine learning", "sourdough baking",
    "home automation", "vintage cameras", "electric vehicles",
    "cryptocurrency", "gardening", "3d printing",
    "immigration law", "cybersecurity", "astronomy",
];

/// Pause after an internal scheduler error before resuming the loop.
const ERROR_BACKOFF: Duration = Duration::from_secs(30);

pub struct Scheduler {
    registry:   Arc<EngineRegistry>,
    stats:      Arc<RunStats>,
    timer:      PoissonTimer,
    chain:      SessionChain,
    obsession:  ObsessionTracker,
    state:      DriftState,
    state_path: PathBuf,
}

impl Scheduler {
    pub fn new(
        registry: Arc<EngineRegistry>,
        stats: Arc<RunStats>,
        timer: PoissonTimer,
        obsession: ObsessionTracker,
        state: DriftState,
        state_path: PathBuf,
    ) -> Self {
        Self {
            registry,
            stats,
            timer,
            chain: SessionChain::new(),
            obsession,
            state,
            state_path,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler running");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let gap = self.timer.next_inter_session_gap(epoch_now_secs());
            info!(gap_s = format!("{gap:.0}"), "next session scheduled");
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(Duration::from_secs_f64(gap)) => {}
            }
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.run_session(&mut shutdown).await {
                error!("scheduler loop error: {e:#}");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(ERROR_BACKOFF) => {}
                }
            }
        }
        if let Err(e) = self.state.save(&self.state_path) {
            warn!("failed to persist timing state: {e:#}");
        }
        info!("scheduler stopped");
    }

    async fn run_session(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        self.chain.reset();
        let planned_s = self.timer.next_session_duration();
        let started = Instant::now();
        let session_no = self.stats.begin_session();

        let mut topics = self.registry.topics();
        if topics.is_empty() {
            topics = FALLBACK_TOPICS.iter().map(|t| t.to_string()).collect();
        }
        let topic = self.obsession.maybe_start(&topics);

        info!(
            session = session_no,
            planned_s = format!("{planned_s:.0}"),
            "session started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            // Either ending gate may fire first: the planned duration here,
            // or chain absorption below.
            if started.elapsed().as_secs_f64() >= planned_s {
                debug!("planned duration reached, ending session");
                break;
            }

            let state = self.chain.step();
            if state == ChainState::Leaving {
                break;
            }

            self.registry.dispatch(state, topic.as_deref()).await;
            self.stats.record_event();

            let dwell = self.chain.state_duration();
            let jitter = self.timer.next_event_delay(epoch_now_secs());
            // TODO: calibrate the 0.3 blend factor against captured browsing traces
            let wait = dwell + 0.3 * jitter;
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(Duration::from_secs_f64(wait)) => {}
            }
        }

        self.stats.end_session();
        self.state.last_session_end = epoch_now();
        self.state.save(&self.state_path)?;
        info!(
            session = session_no,
            steps = self.chain.steps_taken(),
            actual_s = format!("{:.0}", started.elapsed().as_secs_f64()),
            "session ended"
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::Controls;
    use crate::engine::testing::RecordingEngine;
    use crate::engine::TrafficEngine;
    use crate::pattern::timing::{Intensity, SessionConfig};

    struct Fixture {
        registry: Arc<EngineRegistry>,
        stats:    Arc<RunStats>,
        controls: Arc<Controls>,
        dir:      tempfile::TempDir,
    }

    impl Fixture {
        fn new(intensity: Intensity) -> Self {
            Self {
                registry: Arc::new(EngineRegistry::new()),
                stats:    Arc::new(RunStats::new()),
                controls: Arc::new(Controls::new(intensity)),
                dir:      tempfile::tempdir().unwrap(),
            }
        }

        fn scheduler(&self, obsession_probability: f64, obsession_hours: (f64, f64)) -> Scheduler {
            let timer = PoissonTimer::new(
                self.controls.clone(),
                SessionConfig::default(),
                42,
            );
            Scheduler::new(
                self.registry.clone(),
                self.stats.clone(),
                timer,
                ObsessionTracker::new(obsession_probability, obsession_hours),
                DriftState { drift_seed: 42, last_session_end: 0.0 },
                self.dir.path().join("state.json"),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_hours_produce_sessions_and_requests() {
        let fx = Fixture::new(Intensity::Medium);
        let search = Arc::new(RecordingEngine::new("search", true, false));
        let browse = Arc::new(RecordingEngine::new("browse", true, false));
        let dns    = Arc::new(RecordingEngine::new("dns", true, false));
        fx.registry.register(search.clone());
        fx.registry.register(browse.clone());
        fx.registry.register(dns.clone());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(fx.scheduler(0.05, (2.0, 48.0)).run(rx));

        // Six hours of virtual time; the paused clock auto-advances, nothing
        // actually sleeps.
        sleep(Duration::from_secs(6 * 3600)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(fx.stats.sessions_today() >= 1, "no session in six virtual hours");
        assert!(
            fx.stats.requests_today() >= 5,
            "only {} requests in six virtual hours",
            fx.stats.requests_today()
        );
        let errors: u64 = fx.registry.stats().iter().map(|s| s.errors).sum();
        assert_eq!(errors, 0);
        assert_eq!(fx.stats.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dns_only_setup_dispatches_idle_and_landing_only() {
        let fx = Fixture::new(Intensity::High);
        let dns = Arc::new(RecordingEngine::new("dns", true, false));
        fx.registry.register(dns.clone());

        let (_tx, mut rx) = watch::channel(false);
        let mut sched = fx.scheduler(0.0, (2.0, 48.0));
        for _ in 0..5 {
            sched.run_session(&mut rx).await.unwrap();
        }

        let calls = dns.calls.lock();
        for (action, _) in calls.iter() {
            assert!(
                action == "idle" || action == "landing",
                "dns engine saw unexpected action {action:?}"
            );
        }
        // Steps in other states advanced without any producer call.
        assert!(fx.stats.requests_today() as usize >= calls.len());
    }

    #[tokio::test(start_paused = true)]
    async fn obsession_topic_carries_across_sessions() {
        let fx = Fixture::new(Intensity::High);
        let search = Arc::new(RecordingEngine::new("search", true, false));
        let browse = Arc::new(RecordingEngine::new("browse", true, false));
        fx.registry.register(search.clone());
        fx.registry.register(browse.clone());

        let (_tx, mut rx) = watch::channel(false);
        let mut sched = fx.scheduler(1.0, (1.0, 1.0));
        for _ in 0..5 {
            sched.run_session(&mut rx).await.unwrap();
        }

        let mut seen: Vec<Option<String>> = Vec::new();
        for engine in [&search, &browse] {
            seen.extend(engine.calls.lock().iter().map(|(_, t)| t.clone()));
        }
        assert!(!seen.is_empty(), "no dispatches across five sessions");
        let first = seen[0].clone().expect("obsession topic missing");
        for topic in &seen {
            assert_eq!(topic.as_deref(), Some(first.as_str()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_gap_exits_without_a_session() {
        let fx = Fixture::new(Intensity::Low);
        fx.registry
            .register(Arc::new(RecordingEngine::new("browse", true, false)));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(fx.scheduler(0.0, (2.0, 48.0)).run(rx));

        // Let the scheduler reach its gap suspension, then cancel.
        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not exit promptly")
            .unwrap();

        assert_eq!(fx.stats.sessions_today(), 0);
        assert_eq!(fx.stats.requests_today(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_producer_is_contained() {
        let fx = Fixture::new(Intensity::High);
        let bad = Arc::new(RecordingEngine::new("browse", true, true));
        fx.registry.register(bad.clone());

        let (_tx, mut rx) = watch::channel(false);
        let mut sched = fx.scheduler(0.0, (2.0, 48.0));
        for _ in 0..10 {
            sched.run_session(&mut rx).await.unwrap();
            if bad.core().stats().errors > 0 {
                break;
            }
        }

        let stats = bad.core().stats();
        assert!(stats.errors > 0, "failing producer never dispatched");
        assert_eq!(stats.errors as usize, bad.calls.lock().len());
        assert_eq!(fx.stats.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_persists_last_end_time() {
        let fx = Fixture::new(Intensity::Medium);
        let (_tx, mut rx) = watch::channel(false);
        let mut sched = fx.scheduler(0.0, (2.0, 48.0));
        sched.run_session(&mut rx).await.unwrap();

        let saved = DriftState::load_or_init(&fx.dir.path().join("state.json"));
        assert_eq!(saved.drift_seed, 42);
        assert!(saved.last_session_end > 0.0);
    }
}
