// chaff/src/pattern/obsession.rs
//
// Obsession tracking: multi-day topical fixations.
//
// Real users fall down rabbit holes: one topic keeps coming back across
// many sessions for hours or days. A uniform random topic per session would
// never produce that signal, so we model it explicitly: a single active
// topic with an expiry deadline, rolled at session start.

use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::info;

use super::timing::epoch_now;

pub struct ObsessionTracker {
    probability:          f64,
    duration_range_hours: (f64, f64),
    active_topic:         Option<String>,
    end_epoch:            Option<f64>,
    rng:                  StdRng,
}

impl ObsessionTracker {
    pub fn new(probability: f64, duration_range_hours: (f64, f64)) -> Self {
        Self {
            probability,
            duration_range_hours,
            active_topic: None,
            end_epoch: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// True while a fixation is live. Querying past the deadline clears both
    /// fields, so an expired obsession heals itself on the next look.
    pub fn is_active(&mut self) -> bool {
        match (&self.active_topic, self.end_epoch) {
            (Some(_), Some(end)) if epoch_now() < end => true,
            (Some(_), _) => {
                self.active_topic = None;
                self.end_epoch = None;
                false
            }
            _ => false,
        }
    }

    /// Roll the dice on starting a fixation. Returns the active topic if one
    /// is already live, the freshly chosen topic on a successful roll, and
    /// nothing otherwise.
    pub fn maybe_start(&mut self, available_topics: &[String]) -> Option<String> {
        if self.is_active() {
            return self.active_topic.clone();
        }
        if available_topics.is_empty() || self.rng.gen::<f64>() >= self.probability {
            return None;
        }

        let topic = available_topics
            .choose(&mut self.rng)
            .cloned()
            .expect("topic list is non-empty");
        let (lo, hi) = self.duration_range_hours;
        let hours = self.rng.gen_range(lo..=hi);
        self.end_epoch = Some(epoch_now() + hours * 3600.0);
        self.active_topic = Some(topic.clone());
        info!(topic = %topic, hours = format!("{hours:.1}"), "obsession started");
        Some(topic)
    }

    pub fn topic(&mut self) -> Option<String> {
        if self.is_active() {
            self.active_topic.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Vec<String> {
        vec!["topic_a".into(), "topic_b".into()]
    }

    #[test]
    fn inactive_by_default() {
        let mut t = ObsessionTracker::new(0.0, (1.0, 2.0));
        assert!(!t.is_active());
        assert!(t.topic().is_none());
    }

    #[test]
    fn zero_probability_never_starts() {
        let mut t = ObsessionTracker::new(0.0, (1.0, 2.0));
        for _ in 0..1000 {
            assert!(t.maybe_start(&topics()).is_none());
        }
    }

    #[test]
    fn unit_probability_starts_immediately() {
        let mut t = ObsessionTracker::new(1.0, (1.0, 2.0));
        let topic = t.maybe_start(&topics()).expect("should start");
        assert!(t.is_active());
        assert!(topics().contains(&topic));
        assert_eq!(t.topic().as_deref(), Some(topic.as_str()));
    }

    #[test]
    fn active_topic_survives_repeated_rolls() {
        let mut t = ObsessionTracker::new(1.0, (1.0, 1.0));
        let first = t.maybe_start(&topics()).unwrap();
        for _ in 0..3 {
            assert_eq!(t.maybe_start(&topics()).as_deref(), Some(first.as_str()));
        }
    }

    #[test]
    fn expired_obsession_clears_itself() {
        let mut t = ObsessionTracker::new(1.0, (1.0, 1.0));
        t.maybe_start(&topics()).unwrap();
        t.end_epoch = Some(epoch_now() - 1.0);
        assert!(!t.is_active());
        assert!(t.topic().is_none());
    }

    #[test]
    fn empty_topic_list_never_starts() {
        let mut t = ObsessionTracker::new(1.0, (1.0, 1.0));
        assert!(t.maybe_start(&[]).is_none());
    }
}
