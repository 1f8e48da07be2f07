// chaff/src/engine/registry.rs
//
// Named producer registry and the state→engine dispatch boundary.
//
// Dispatch resolves a chain state to a preference list and hands the action
// to the first registered-and-enabled producer on it. Producer failures are
// absorbed here (counted and logged, never propagated) so a flaky network
// can't take the scheduler down with it.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{ActivityEntry, EngineStats, TrafficEngine};
use crate::pattern::chain::ChainState;

/// Hard cap on merged activity returned to callers.
pub const ACTIVITY_QUERY_CAP: usize = 500;

/// Engine preference per chain state, first match wins.
fn preferences(state: ChainState) -> &'static [&'static str] {
    match state {
        ChainState::Reading   => &["browse", "search"],
        ChainState::Clicking  => &["browse", "search"],
        ChainState::Searching => &["search", "browse"],
        ChainState::Idle      => &["dns"],
        ChainState::Landing   => &["browse", "search", "dns"],
        ChainState::Leaving   => &[],
    }
}

pub struct EngineRegistry {
    engines: DashMap<&'static str, Arc<dyn TrafficEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self { engines: DashMap::new() }
    }

    pub fn register(&self, engine: Arc<dyn TrafficEngine>) {
        let name = engine.core().name();
        debug!(engine = name, "engine registered");
        self.engines.insert(name, engine);
    }

    /// Flip an engine's enable flag. Returns the new value, or `None` for an
    /// unknown name.
    pub fn toggle(&self, name: &str) -> Option<bool> {
        self.engines.get(name).map(|e| e.core().toggle())
    }

    /// Route one chain state to a producer. Returns the name of the engine
    /// that ran, or `None` when no preferred engine was both registered and
    /// enabled (the step is a no-op; the scheduler still advances).
    pub async fn dispatch(&self, state: ChainState, topic: Option<&str>) -> Option<&'static str> {
        for &name in preferences(state) {
            let engine = match self.engines.get(name) {
                Some(e) => Arc::clone(e.value()),
                None    => continue,
            };
            if !engine.core().enabled() {
                continue;
            }
            if let Err(e) = engine.execute(state.as_str(), topic).await {
                engine.core().record_error();
                warn!(engine = name, state = %state, "producer failed: {e:#}");
            }
            return Some(engine.core().name());
        }
        debug!(state = %state, "no eligible engine, skipping dispatch");
        None
    }

    /// Union of topics contributed by all registered producers.
    pub fn topics(&self) -> Vec<String> {
        self.engines
            .iter()
            .flat_map(|e| e.topics())
            .collect()
    }

    /// Every ring entry across engines, unordered. Used by the chart
    /// builder, which buckets rather than sorts.
    pub fn full_activity(&self) -> Vec<ActivityEntry> {
        self.engines
            .iter()
            .flat_map(|e| e.core().recent_activity(super::ACTIVITY_RING_CAP))
            .collect()
    }

    pub fn stats(&self) -> Vec<EngineStats> {
        let mut all: Vec<EngineStats> = self.engines.iter().map(|e| e.core().stats()).collect();
        all.sort_by_key(|s| s.name);
        all
    }

    /// Recent activity merged across engines, newest first, capped at
    /// `count` (itself capped at [`ACTIVITY_QUERY_CAP`]).
    pub fn recent_activity(&self, count: usize) -> Vec<ActivityEntry> {
        let count = count.min(ACTIVITY_QUERY_CAP);
        let mut merged: Vec<ActivityEntry> = self
            .engines
            .iter()
            .flat_map(|e| e.core().recent_activity(count))
            .collect();
        merged.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
        merged.truncate(count);
        merged
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
