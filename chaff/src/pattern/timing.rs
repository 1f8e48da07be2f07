// chaff/src/pattern/timing.rs
//
// Poisson timing engine, the core of the noise generator.
//
// Everything an observer can measure about us is timing, so this is where
// the realism lives:
//   - exponential inter-arrivals (Poisson process: bursty, with quiet gaps)
//   - a rate parameter λ that tracks hour-of-day and weekday/weekend
//   - a slow weekly phase drift so the same hour differs across weeks
//     (defeats cross-week pattern matching)
//   - fresh ±20% jitter per draw to blur any instantaneous fingerprint
//
// λ is computed in events/minute and never allowed to reach zero: a rate
// of exactly zero would itself be a fingerprint, and breaks the Poisson
// inter-arrival math.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, LogNormal};
use serde::{Deserialize, Serialize};

use crate::controls::Controls;

// ── Intensity levels ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Intensity {
    Low      = 0,
    Medium   = 1,
    High     = 2,
    Paranoid = 3,
}

impl Intensity {
    /// Base Poisson rate λ₀ in events per minute.
    pub fn base_lambda(self) -> f64 {
        match self {
            Self::Low      => 0.3,  // ~18 events/hour
            Self::Medium   => 1.0,  // ~60 events/hour
            Self::High     => 2.5,  // ~150 events/hour
            Self::Paranoid => 5.0,  // ~300 events/hour
        }
    }

    /// Mean inter-session gap in minutes.
    pub fn mean_gap_minutes(self) -> f64 {
        match self {
            Self::Low      => 45.0,
            Self::Medium   => 20.0,
            Self::High     => 8.0,
            Self::Paranoid => 3.0,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Low,
            2 => Self::High,
            3 => Self::Paranoid,
            _ => Self::Medium,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low"      => Some(Self::Low),
            "medium"   => Some(Self::Medium),
            "high"     => Some(Self::High),
            "paranoid" => Some(Self::Paranoid),
            _          => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low      => "low",
            Self::Medium   => "medium",
            Self::High     => "high",
            Self::Paranoid => "paranoid",
        }
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Rate model constants ──────────────────────────────────────────────────────

/// Hourly activity weights, hour 00 through 23. Models a realistic human day:
/// low at night, peak mid-morning and evening, lunch dip. Non-zero at every
/// hour. Real humans do browse at 3am.
pub const DEFAULT_HOURLY_WEIGHTS: [f64; 24] = [
    0.05, 0.03, 0.02, 0.02, 0.03, 0.05, // 00-05 late night
    0.10, 0.25, 0.50, 0.80, 0.90, 0.85, // 06-11 wake up → peak morning
    0.60, 0.70, 0.80, 0.85, 0.75, 0.65, // 12-17 lunch dip → afternoon
    0.70, 0.80, 0.90, 0.75, 0.40, 0.15, // 18-23 evening peak → wind down
];

/// λ never drops below this (events/minute).
pub const LAMBDA_FLOOR: f64 = 0.005;

const MIN_EVENT_DELAY_S:  f64 = 2.0;
const MAX_EVENT_DELAY_S:  f64 = 3600.0;
const MIN_GAP_S:          f64 = 10.0;
const MAX_GAP_S:          f64 = 7200.0;

/// Spread of the log-normal session-duration distribution.
const DURATION_SIGMA: f64 = 0.8;

// ── Session configuration ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mean_duration_minutes:    f64,
    pub min_duration_minutes:     f64,
    pub max_duration_minutes:     f64,
    pub obsession_probability:    f64,
    pub obsession_duration_hours: (f64, f64),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mean_duration_minutes:    15.0,
            min_duration_minutes:     0.5,
            max_duration_minutes:     180.0,
            obsession_probability:    0.05,
            obsession_duration_hours: (2.0, 48.0),
        }
    }
}

// ── Epoch helpers ─────────────────────────────────────────────────────────────

pub fn epoch_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub fn epoch_now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Decompose an epoch timestamp in *local* time: (hour, minute, weekday),
/// weekday 0 = Monday. Hour-of-day is observer-local on purpose: the point
/// is to match the operator's day, not UTC's.
fn local_parts(ts: i64) -> (u32, u32, u32) {
    let dt = DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_else(Utc::now)
        .with_timezone(&Local);
    (dt.hour(), dt.minute(), dt.weekday().num_days_from_monday())
}

// ── Poisson timer ─────────────────────────────────────────────────────────────

/// Samples inter-event delays, session durations and inter-session gaps from
/// a time-varying Poisson model. λ₀ is read from the shared [`Controls`] on
/// every call, so intensity changes from the control surface take effect on
/// the next draw without any lock.
///
/// Each sampler owns its own RNG stream (seeded from one entropy source at
/// construction) so the outputs never correlate.
pub struct PoissonTimer {
    controls:       Arc<Controls>,
    hourly_weights: [f64; 24],
    session:        SessionConfig,
    drift_seed:     u32,
    rate_rng:       StdRng,
    delay_rng:      StdRng,
    duration_rng:   StdRng,
    gap_rng:        StdRng,
}

impl PoissonTimer {
    pub fn new(controls: Arc<Controls>, session: SessionConfig, drift_seed: u32) -> Self {
        let mut master = StdRng::from_entropy();
        let mut stream = || StdRng::from_rng(&mut master).expect("prng stream seeding");
        Self {
            controls,
            hourly_weights: DEFAULT_HOURLY_WEIGHTS,
            session,
            drift_seed,
            rate_rng:     stream(),
            delay_rng:    stream(),
            duration_rng: stream(),
            gap_rng:      stream(),
        }
    }

    /// Instantaneous rate λ(ts) in events per minute.
    ///
    /// λ = λ₀ · W(hour, minute) · weekend(w, h) · (1 + drift(ts)) · jitter,
    /// floored at [`LAMBDA_FLOOR`]. W interpolates the hourly weights across
    /// the minute so the rate has no hour-boundary discontinuity an observer
    /// could key on.
    pub fn current_lambda(&mut self, ts: i64) -> f64 {
        let (hour, minute, wday) = local_parts(ts);

        let w_now  = self.hourly_weights[hour as usize];
        let w_next = self.hourly_weights[(hour as usize + 1) % 24];
        let frac   = minute as f64 / 60.0;
        let weight = w_now * (1.0 - frac) + w_next * frac;

        // Weekends shift activity toward late morning and evening.
        let weekend = if wday >= 5 {
            0.9 + 0.2 * (std::f64::consts::PI * hour as f64 / 12.0).sin()
        } else {
            1.0
        };

        // Slow sinusoidal phase drift: the same hour on different weeks
        // produces different λ values.
        let weeks = ts as f64 / (7.0 * 86_400.0);
        let drift = 0.15 * (2.0 * std::f64::consts::PI * weeks + self.drift_seed as f64).sin();

        let jitter = 1.0 + self.rate_rng.gen_range(-0.20..0.20);

        let lam = self.controls.base_lambda() * weight * weekend * (1.0 + drift) * jitter;
        lam.max(LAMBDA_FLOOR)
    }

    /// Next inter-event delay in seconds: Exp(λ(ts)) in minutes, converted
    /// and clamped to [2 s, 1 h].
    pub fn next_event_delay(&mut self, ts: i64) -> f64 {
        let lam = self.current_lambda(ts);
        let exp = Exp::new(lam).expect("lambda above floor");
        let delay_s = exp.sample(&mut self.delay_rng) * 60.0;
        delay_s.clamp(MIN_EVENT_DELAY_S, MAX_EVENT_DELAY_S)
    }

    /// Session duration in seconds. Log-normal captures the heavy right tail
    /// of real session lengths: most are short, a few run long.
    pub fn next_session_duration(&mut self) -> f64 {
        let cfg = &self.session;
        let mu  = cfg.mean_duration_minutes.ln();
        let dist = LogNormal::new(mu, DURATION_SIGMA).expect("lognormal params");
        let minutes = dist
            .sample(&mut self.duration_rng)
            .clamp(cfg.min_duration_minutes, cfg.max_duration_minutes);
        minutes * 60.0
    }

    /// Gap between sessions in seconds. Mean scales inversely with intensity
    /// and stretches at night (3× on hours 00–05, 2× at 23).
    pub fn next_inter_session_gap(&mut self, ts: i64) -> f64 {
        let mean_minutes = self.controls.intensity().mean_gap_minutes();
        let (hour, _, _) = local_parts(ts);
        let night = match hour {
            0..=5 => 3.0,
            23    => 2.0,
            _     => 1.0,
        };
        let exp = Exp::new(1.0 / (mean_minutes * night)).expect("positive mean gap");
        let gap_s = exp.sample(&mut self.gap_rng) * 60.0;
        gap_s.clamp(MIN_GAP_S, MAX_GAP_S)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timer(intensity: Intensity) -> PoissonTimer {
        let controls = Arc::new(Controls::new(intensity));
        PoissonTimer::new(controls, SessionConfig::default(), 7)
    }

    /// Epoch timestamp for a *local* wall-clock instant, so the local-time
    /// decomposition in the rate model sees exactly these fields.
    fn local_ts(h: u32) -> i64 {
        Local
            .with_ymd_and_hms(2025, 1, 15, h, 0, 0)
            .unwrap()
            .timestamp()
    }

    #[test]
    fn event_delay_stays_in_bounds() {
        let mut t = timer(Intensity::Medium);
        let ts = epoch_now_secs();
        for _ in 0..100 {
            let d = t.next_event_delay(ts);
            assert!(d >= 2.0, "delay {d} below minimum");
            assert!(d <= 3600.0, "delay {d} above maximum");
        }
    }

    #[test]
    fn session_duration_stays_in_bounds() {
        let mut t = timer(Intensity::Medium);
        for _ in 0..100 {
            let d = t.next_session_duration();
            assert!(d >= 30.0);
            assert!(d <= 10_800.0);
        }
    }

    #[test]
    fn inter_session_gap_stays_in_bounds() {
        let mut t = timer(Intensity::Medium);
        let ts = epoch_now_secs();
        for _ in 0..100 {
            let g = t.next_inter_session_gap(ts);
            assert!(g >= 10.0);
            assert!(g <= 7200.0);
        }
    }

    #[test]
    fn lambda_never_below_floor() {
        let mut t = timer(Intensity::Low);
        for h in 0..24 {
            let lam = t.current_lambda(local_ts(h));
            assert!(lam >= LAMBDA_FLOOR, "lambda {lam} below floor at hour {h}");
        }
    }

    #[test]
    fn intensity_orders_mean_delay() {
        let ts = local_ts(10);
        let mean = |intensity| {
            let mut t = timer(intensity);
            (0..500).map(|_| t.next_event_delay(ts)).sum::<f64>() / 500.0
        };
        let low      = mean(Intensity::Low);
        let medium   = mean(Intensity::Medium);
        let high     = mean(Intensity::High);
        let paranoid = mean(Intensity::Paranoid);
        assert!(low > medium, "low {low} !> medium {medium}");
        assert!(medium > high, "medium {medium} !> high {high}");
        assert!(high > paranoid, "high {high} !> paranoid {paranoid}");
    }

    #[test]
    fn peak_hour_outpaces_trough() {
        let mut t = timer(Intensity::Medium);
        let peak: f64   = (0..100).map(|_| t.current_lambda(local_ts(10))).sum::<f64>() / 100.0;
        let trough: f64 = (0..100).map(|_| t.current_lambda(local_ts(3))).sum::<f64>() / 100.0;
        assert!(peak > trough, "peak {peak} !> trough {trough}");
    }

    #[test]
    fn intensity_change_shortens_gaps() {
        let controls = Arc::new(Controls::new(Intensity::Low));
        let mut t = PoissonTimer::new(controls.clone(), SessionConfig::default(), 1);
        let ts = local_ts(14);
        let before: f64 = (0..100).map(|_| t.next_inter_session_gap(ts)).sum::<f64>() / 100.0;
        controls.set_intensity(Intensity::High);
        let after: f64 = (0..100).map(|_| t.next_inter_session_gap(ts)).sum::<f64>() / 100.0;
        assert!(after < before, "high-intensity mean gap {after} !< low {before}");
    }

    #[test]
    fn intensity_roundtrip() {
        for s in ["low", "medium", "high", "paranoid"] {
            assert_eq!(Intensity::parse(s).unwrap().as_str(), s);
        }
        assert!(Intensity::parse("extreme").is_none());
    }
}
