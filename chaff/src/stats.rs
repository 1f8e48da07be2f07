// chaff/src/stats.rs
//
// Aggregate runtime statistics. Counters are independent atomics written by
// the scheduler and read by the control surface; a snapshot is a monotonic
// but not instantaneous view: it may miss the last update of an in-flight
// dispatch, which is fine for a dashboard.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Local, Timelike, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::engine::registry::EngineRegistry;
use crate::engine::EngineStats;
use crate::pattern::timing::epoch_now_secs;

pub struct RunStats {
    started:         Instant,
    sessions_today:  AtomicU64,
    requests_today:  AtomicU64,
    active_sessions: AtomicU64,
    last_event:      AtomicI64, // epoch seconds; 0 = never
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started:         Instant::now(),
            sessions_today:  AtomicU64::new(0),
            requests_today:  AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            last_event:      AtomicI64::new(0),
        }
    }

    /// Opens a session; returns its ordinal.
    pub fn begin_session(&self) -> u64 {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.sessions_today.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn end_session(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.requests_today.fetch_add(1, Ordering::Relaxed);
        self.last_event.store(epoch_now_secs(), Ordering::Relaxed);
    }

    pub fn sessions_today(&self) -> u64 {
        self.sessions_today.load(Ordering::Relaxed)
    }

    pub fn requests_today(&self) -> u64 {
        self.requests_today.load(Ordering::Relaxed)
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self, registry: &EngineRegistry) -> StatsSnapshot {
        let engines = registry.stats();
        let bytes: u64 = engines.iter().map(|e| e.bytes).sum();
        let last = self.last_event.load(Ordering::Relaxed);
        StatsSnapshot {
            sessions_today:  self.sessions_today(),
            requests_today:  self.requests_today(),
            bytes_today_mib: (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            uptime_seconds:  self.uptime_seconds(),
            active_sessions: self.active_sessions(),
            last_event_time: (last != 0).then_some(last),
            engines,
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub sessions_today:  u64,
    pub requests_today:  u64,
    pub bytes_today_mib: f64,
    pub uptime_seconds:  u64,
    pub active_sessions: u64,
    pub last_event_time: Option<i64>,
    pub engines:         Vec<EngineStats>,
}

// ── Activity chart ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct EngineChart {
    pub engine: String,
    /// Event counts bucketed by local hour of day, last 24 hours only.
    pub hours:  [u64; 24],
}

/// Per-engine hourly histograms over the last 24 hours, built from the
/// activity rings. Merge-and-bucket on query; the query path may allocate.
pub fn hourly_chart(registry: &EngineRegistry) -> Vec<EngineChart> {
    let cutoff = epoch_now_secs() as f64 - 86_400.0;
    let mut charts: Vec<EngineChart> = Vec::new();

    for entry in registry.full_activity() {
        if entry.timestamp < cutoff {
            continue;
        }
        let hour = DateTime::<Utc>::from_timestamp(entry.timestamp as i64, 0)
            .unwrap_or_else(Utc::now)
            .with_timezone(&Local)
            .hour() as usize;

        let idx = match charts.iter().position(|c| c.engine == entry.engine) {
            Some(i) => i,
            None => {
                charts.push(EngineChart { engine: entry.engine.to_string(), hours: [0; 24] });
                charts.len() - 1
            }
        };
        charts[idx].hours[hour] += 1;
    }

    charts.sort_by(|a, b| a.engine.cmp(&b.engine));
    charts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_counters_roundtrip() {
        let stats = RunStats::new();
        assert_eq!(stats.begin_session(), 1);
        assert_eq!(stats.begin_session(), 2);
        assert_eq!(stats.active_sessions(), 2);
        stats.end_session();
        stats.end_session();
        assert_eq!(stats.active_sessions(), 0);
        assert_eq!(stats.sessions_today(), 2);
    }

    #[test]
    fn snapshot_has_no_last_event_before_first() {
        let stats = RunStats::new();
        let registry = EngineRegistry::new();
        let snap = stats.snapshot(&registry);
        assert!(snap.last_event_time.is_none());
        assert_eq!(snap.requests_today, 0);
        stats.record_event();
        assert!(stats.snapshot(&registry).last_event_time.is_some());
    }
}
