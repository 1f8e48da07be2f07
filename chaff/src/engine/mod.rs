// chaff/src/engine/mod.rs
//
// Traffic producer contract and the bookkeeping shared by every producer:
// enable flag, counters, and the bounded recent-activity ring. The core
// never looks inside a producer; it sees one async action method plus
// these uniform stats.

pub mod browse;
pub mod dns;
pub mod registry;
pub mod search;
#[cfg(test)]
pub mod testing;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::pattern::timing::{epoch_now, epoch_now_secs};

/// Bounded per-producer activity ring; oldest entries drop on overflow.
pub const ACTIVITY_RING_CAP: usize = 200;

// ── Activity feed ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp: f64,
    pub engine:    &'static str,
    pub action:    String,
    pub detail:    String,
}

// ── Per-engine stats snapshot ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub name:     &'static str,
    pub enabled:  bool,
    pub requests: u64,
    pub bytes:    u64,
    pub errors:   u64,
    pub last_run: Option<i64>,
}

// ── Shared engine core ────────────────────────────────────────────────────────

/// Counters and the activity ring every producer embeds. All counter fields
/// are independent atomics; the ring is appended only from its owning
/// producer and snapshotted for readers.
pub struct EngineCore {
    name:     &'static str,
    enabled:  AtomicBool,
    requests: AtomicU64,
    bytes:    AtomicU64,
    errors:   AtomicU64,
    last_run: AtomicI64, // epoch seconds; 0 = never ran
    activity: Mutex<VecDeque<ActivityEntry>>,
}

impl EngineCore {
    pub fn new(name: &'static str, enabled: bool) -> Self {
        Self {
            name,
            enabled:  AtomicBool::new(enabled),
            requests: AtomicU64::new(0),
            bytes:    AtomicU64::new(0),
            errors:   AtomicU64::new(0),
            last_run: AtomicI64::new(0),
            activity: Mutex::new(VecDeque::with_capacity(ACTIVITY_RING_CAP)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip the enable flag; returns the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }

    /// Record one completed outbound request and the bytes it moved.
    pub fn record_request(&self, bytes: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.last_run.store(epoch_now_secs(), Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Append to the activity feed, evicting the oldest entry past capacity.
    pub fn log_activity(&self, action: &str, detail: impl Into<String>) {
        let detail = detail.into();
        info!(engine = self.name, action, "{detail}");
        let mut ring = self.activity.lock();
        if ring.len() >= ACTIVITY_RING_CAP {
            ring.pop_front();
        }
        ring.push_back(ActivityEntry {
            timestamp: epoch_now(),
            engine:    self.name,
            action:    action.to_string(),
            detail,
        });
    }

    /// Most-recent entries, newest last, at most `count`.
    pub fn recent_activity(&self, count: usize) -> Vec<ActivityEntry> {
        let ring = self.activity.lock();
        let skip = ring.len().saturating_sub(count);
        ring.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> EngineStats {
        let last = self.last_run.load(Ordering::Relaxed);
        EngineStats {
            name:     self.name,
            enabled:  self.enabled(),
            requests: self.requests.load(Ordering::Relaxed),
            bytes:    self.bytes.load(Ordering::Relaxed),
            errors:   self.errors.load(Ordering::Relaxed),
            last_run: (last != 0).then_some(last),
        }
    }
}

// ── Producer contract ─────────────────────────────────────────────────────────

/// A black-box traffic producer. `execute` performs at most one observable
/// outbound event (plus whatever internal follow-ups the producer chooses)
/// and reports transient failure by returning `Err`; the dispatch boundary
/// absorbs and counts it. Internal best-effort extras a producer swallows
/// itself are counted through its own [`EngineCore`].
#[async_trait]
pub trait TrafficEngine: Send + Sync {
    fn core(&self) -> &EngineCore;

    async fn execute(&self, action: &str, topic: Option<&str>) -> Result<()>;

    /// Topic strings this producer contributes to the obsession pool.
    fn topics(&self) -> Vec<String> {
        Vec::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
