// chaff/src/controls.rs
//
// Shared mutable scalars touched by both the control surface and the
// scheduler: the intensity level, its derived base rate λ₀, and the persona
// hints the producers read. Each field is an independent single-word atomic
// (λ₀ travels as f64 bits in an AtomicU64); no invariant spans them, so no
// wider lock is needed; the scheduler sees a store on its next load.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use crate::pattern::timing::Intensity;

// ── Persona hints ─────────────────────────────────────────────────────────────

/// Browser identity hints consumed by the HTTP producers. The viewport is a
/// hint only; producers that don't render simply echo it nowhere.
#[derive(Debug, Clone, Serialize)]
pub struct Persona {
    pub user_agent:      String,
    pub viewport_width:  u32,
    pub viewport_height: u32,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            viewport_width:  1920,
            viewport_height: 1080,
        }
    }
}

// ── Controls ──────────────────────────────────────────────────────────────────

pub struct Controls {
    intensity:   AtomicU8,
    lambda_bits: AtomicU64,
    persona:     RwLock<Persona>,
}

impl Controls {
    pub fn new(intensity: Intensity) -> Self {
        Self {
            intensity:   AtomicU8::new(intensity as u8),
            lambda_bits: AtomicU64::new(intensity.base_lambda().to_bits()),
            persona:     RwLock::new(Persona::default()),
        }
    }

    pub fn intensity(&self) -> Intensity {
        Intensity::from_u8(self.intensity.load(Ordering::Relaxed))
    }

    /// Replace the intensity and its derived λ₀. In-flight suspensions are
    /// untouched; the next sampler call sees the new rate.
    pub fn set_intensity(&self, level: Intensity) {
        self.intensity.store(level as u8, Ordering::Relaxed);
        self.lambda_bits
            .store(level.base_lambda().to_bits(), Ordering::Relaxed);
    }

    pub fn base_lambda(&self) -> f64 {
        f64::from_bits(self.lambda_bits.load(Ordering::Relaxed))
    }

    pub fn persona(&self) -> Persona {
        self.persona.read().clone()
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        let mut p = self.persona.write();
        p.viewport_width = width;
        p.viewport_height = height;
    }
}
