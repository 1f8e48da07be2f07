// chaff/src/pattern/chain.rs
//
// Markov chain for intra-session page transitions.
//
// A session is a walk over six states; the transition matrix is tuned so
// the walk reads like a person: land, read, click around, search again,
// drift off. A fatigue term grows the leaving probability with every step,
// which both matches real attention spans and guarantees absorption: no
// session runs forever on chain dynamics alone.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Beta;

// ── States ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Landing,
    Reading,
    Clicking,
    Searching,
    Idle,
    Leaving,
}

pub const STATES: [ChainState; 6] = [
    ChainState::Landing,
    ChainState::Reading,
    ChainState::Clicking,
    ChainState::Searching,
    ChainState::Idle,
    ChainState::Leaving,
];

impl ChainState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landing   => "landing",
            Self::Reading   => "reading",
            Self::Clicking  => "clicking",
            Self::Searching => "searching",
            Self::Idle      => "idle",
            Self::Leaving   => "leaving",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Landing   => 0,
            Self::Reading   => 1,
            Self::Clicking  => 2,
            Self::Searching => 3,
            Self::Idle      => 4,
            Self::Leaving   => 5,
        }
    }

    /// Dwell-time band in seconds, shaped below by Beta(2,5).
    fn dwell_band(self) -> (f64, f64) {
        match self {
            Self::Landing   => (2.0, 5.0),    // page load
            Self::Reading   => (8.0, 120.0),  // actually reading
            Self::Clicking  => (0.5, 3.0),    // click + load
            Self::Searching => (3.0, 15.0),   // type query + submit
            Self::Idle      => (5.0, 60.0),   // tabbed away
            Self::Leaving   => (0.0, 0.0),
        }
    }
}

impl std::fmt::Display for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Transition matrix ─────────────────────────────────────────────────────────

// Rows = from, cols = to, state order as in STATES. The landing column is
// zero everywhere (initial state, unreachable afterwards); the leaving row
// is absorbing.
const BASE_TRANSITIONS: [[f64; 6]; 6] = [
    // landing →
    [0.00, 0.60, 0.20, 0.10, 0.05, 0.05],
    // reading →
    [0.00, 0.15, 0.40, 0.15, 0.15, 0.15],
    // clicking →
    [0.00, 0.55, 0.15, 0.10, 0.10, 0.10],
    // searching →
    [0.00, 0.50, 0.25, 0.05, 0.10, 0.10],
    // idle →
    [0.00, 0.30, 0.15, 0.10, 0.10, 0.35],
    // leaving → absorbing
    [0.00, 0.00, 0.00, 0.00, 0.00, 1.00],
];

/// Per-step fatigue added to the leaving entry, capped at 0.4.
const FATIGUE_PER_STEP: f64 = 0.03;
const FATIGUE_CAP: f64 = 0.4;

// ── Session chain ─────────────────────────────────────────────────────────────

pub struct SessionChain {
    state:      ChainState,
    steps:      u32,
    rng:        StdRng,
    dwell_beta: Beta<f64>,
}

impl SessionChain {
    pub fn new() -> Self {
        Self {
            state:      ChainState::Landing,
            steps:      0,
            rng:        StdRng::from_entropy(),
            dwell_beta: Beta::new(2.0, 5.0).expect("beta params"),
        }
    }

    /// Start a new session.
    pub fn reset(&mut self) {
        self.state = ChainState::Landing;
        self.steps = 0;
    }

    pub fn current_state(&self) -> ChainState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ChainState::Leaving
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps
    }

    /// Advance one step; returns the new state.
    pub fn step(&mut self) -> ChainState {
        let mut probs = BASE_TRANSITIONS[self.state.index()];

        let fatigue = (self.steps as f64 * FATIGUE_PER_STEP).min(FATIGUE_CAP);
        probs[ChainState::Leaving.index()] += fatigue;
        let total: f64 = probs.iter().sum();
        for p in &mut probs {
            *p /= total;
        }

        let dist = WeightedIndex::new(probs).expect("transition row sums to 1");
        self.state = STATES[dist.sample(&mut self.rng)];
        self.steps += 1;
        self.state
    }

    /// How long to dwell in the current state, in seconds. Beta(2,5) scaled
    /// to the state's band clusters draws near the lower bound, which is how
    /// real dwell times distribute.
    pub fn state_duration(&mut self) -> f64 {
        let (lo, hi) = self.state.dwell_band();
        if hi == 0.0 {
            return 0.0;
        }
        lo + (hi - lo) * self.dwell_beta.sample(&mut self.rng)
    }
}

impl Default for SessionChain {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_landing() {
        let chain = SessionChain::new();
        assert_eq!(chain.current_state(), ChainState::Landing);
        assert!(!chain.is_done());
    }

    #[test]
    fn reset_returns_to_landing() {
        let mut chain = SessionChain::new();
        chain.step();
        chain.step();
        chain.reset();
        assert_eq!(chain.current_state(), ChainState::Landing);
        assert_eq!(chain.steps_taken(), 0);
    }

    #[test]
    fn every_chain_reaches_leaving_within_200_steps() {
        let mut chain = SessionChain::new();
        for trial in 0..10_000 {
            chain.reset();
            let mut absorbed = false;
            for _ in 0..200 {
                chain.step();
                if chain.is_done() {
                    absorbed = true;
                    break;
                }
            }
            assert!(absorbed, "trial {trial} did not absorb in 200 steps");
        }
    }

    #[test]
    fn landing_is_unreachable_after_start() {
        let mut chain = SessionChain::new();
        for _ in 0..1000 {
            chain.reset();
            while !chain.is_done() {
                assert_ne!(chain.step(), ChainState::Landing);
            }
        }
    }

    #[test]
    fn fatigue_makes_early_exit_less_likely_than_late() {
        let mut chain = SessionChain::new();
        let absorbed_by = |chain: &mut SessionChain, k: u32| -> u32 {
            let mut n = 0;
            for _ in 0..2000 {
                chain.reset();
                for _ in 0..k {
                    if chain.is_done() {
                        break;
                    }
                    chain.step();
                }
                if chain.is_done() {
                    n += 1;
                }
            }
            n
        };
        let f3  = absorbed_by(&mut chain, 3);
        let f20 = absorbed_by(&mut chain, 20);
        assert!(
            f20 > f3 + 200,
            "absorption by step 20 ({f20}/2000) not meaningfully above step 3 ({f3}/2000)"
        );
    }

    #[test]
    fn leaving_dwell_is_zero() {
        let mut chain = SessionChain::new();
        while !chain.is_done() {
            chain.step();
        }
        assert_eq!(chain.state_duration(), 0.0);
    }

    #[test]
    fn dwell_stays_in_band() {
        let mut chain = SessionChain::new();
        for _ in 0..200 {
            chain.reset();
            while !chain.is_done() {
                let (lo, hi) = chain.current_state().dwell_band();
                let d = chain.state_duration();
                assert!(d >= lo && d <= hi, "dwell {d} outside [{lo}, {hi}]");
                chain.step();
            }
        }
    }
}
