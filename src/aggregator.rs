// src/aggregator.rs
//
// Temporal violation aggregation. A missing-PPE label must persist for a
// sustained share of the sliding window before it counts as a violation;
// repeated alerts for the same person and label are rate-limited by a
// cooldown. The aggregator is pure bookkeeping: it returns fired events
// and leaves dispatch to the caller, so a failed alert can never corrupt
// window state.

use crate::types::{AggregatorConfig, TrackId, ViolationEvent};
use crate::vocabulary::ViolationVocabulary;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub struct ViolationAggregator {
    config: AggregatorConfig,
    vocabulary: ViolationVocabulary,
    frame_counter: u64,
    /// Per-frame track ids, kept in lock-step with `class_labels`.
    track_ids: VecDeque<Vec<TrackId>>,
    class_labels: VecDeque<Vec<String>>,
    primed: bool,
    /// track id -> label -> last fire timestamp. Never pruned; grows with
    /// the number of distinct offenders seen over the process lifetime.
    last_fired: HashMap<TrackId, HashMap<String, f64>>,
}

impl ViolationAggregator {
    pub fn new(config: AggregatorConfig, vocabulary: ViolationVocabulary) -> Self {
        Self {
            config,
            vocabulary,
            frame_counter: 0,
            track_ids: VecDeque::new(),
            class_labels: VecDeque::new(),
            primed: false,
            last_fired: HashMap::new(),
        }
    }

    /// Process one frame observation against the wall clock.
    pub fn observe(
        &mut self,
        track_ids: Vec<TrackId>,
        class_labels: Vec<String>,
    ) -> Vec<ViolationEvent> {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.observe_at(track_ids, class_labels, now_secs)
    }

    /// Process one frame observation at an explicit timestamp.
    ///
    /// The two sequences pair by position. On a length mismatch the extra
    /// entries are ignored, same as positional pairing in the upstream
    /// pipeline.
    pub fn observe_at(
        &mut self,
        track_ids: Vec<TrackId>,
        class_labels: Vec<String>,
        now_secs: f64,
    ) -> Vec<ViolationEvent> {
        if track_ids.len() != class_labels.len() {
            warn!(
                "Observation has {} track id(s) but {} label(s); pairing by position",
                track_ids.len(),
                class_labels.len()
            );
        }

        self.track_ids.push_back(track_ids);
        self.class_labels.push_back(class_labels);
        self.frame_counter += 1;

        // One-shot transition on exact equality. Later frames stay primed
        // through the flag, not by re-checking the counter.
        if self.frame_counter == self.config.begin_threshold {
            self.primed = true;
            debug!("Window primed at frame {}", self.frame_counter);
        }

        if !self.primed {
            return Vec::new();
        }

        let fired = self.evaluate_window(now_secs);

        // One frame in, one frame out once evaluation has begun.
        self.track_ids.pop_front();
        self.class_labels.pop_front();

        fired
    }

    /// Re-scan the whole buffered window, tally votes per
    /// (track id, violation label), and apply fire-or-suppress to every
    /// pair that reaches the count threshold.
    fn evaluate_window(&mut self, now_secs: f64) -> Vec<ViolationEvent> {
        let required =
            (self.config.frames_percent_trig * self.config.frames_threshold as f64) as usize;

        // Transient vote table, rebuilt every frame. BTreeMap keeps the
        // per-call event order deterministic.
        let mut votes: BTreeMap<TrackId, BTreeMap<&str, usize>> = BTreeMap::new();
        for (frame_ids, frame_labels) in self.track_ids.iter().zip(self.class_labels.iter()) {
            for (track_id, label) in frame_ids.iter().zip(frame_labels.iter()) {
                if self.vocabulary.contains(label) {
                    *votes
                        .entry(*track_id)
                        .or_default()
                        .entry(label.as_str())
                        .or_insert(0) += 1;
                }
            }
        }

        let mut fired = Vec::new();
        for (track_id, label_counts) in &votes {
            for (label, count) in label_counts {
                if *count < required {
                    continue;
                }
                let Some(violation_id) = self.vocabulary.violation_id(label) else {
                    continue;
                };

                let history = self.last_fired.entry(*track_id).or_default();
                let fire = match history.entry((*label).to_string()) {
                    Entry::Vacant(slot) => {
                        slot.insert(now_secs);
                        true
                    }
                    Entry::Occupied(mut slot) => {
                        let last = slot.get_mut();
                        if now_secs - *last >= self.config.time_betw_trigs {
                            *last = now_secs;
                            true
                        } else {
                            false
                        }
                    }
                };

                if fire {
                    fired.push(ViolationEvent {
                        track_id: *track_id,
                        label: (*label).to_string(),
                        violation_id,
                        fired_at: now_secs,
                    });
                }
            }
        }

        fired
    }

    /// Restore the freshly-constructed state. Called on end-of-stream.
    pub fn reset(&mut self) {
        self.frame_counter = 0;
        self.track_ids.clear();
        self.class_labels.clear();
        self.primed = false;
        self.last_fired.clear();
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Number of frame observations currently buffered.
    pub fn window_len(&self) -> usize {
        self.track_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(
        frames_threshold: usize,
        begin_threshold: u64,
        frames_percent_trig: f64,
        time_betw_trigs: f64,
    ) -> ViolationAggregator {
        ViolationAggregator::new(
            AggregatorConfig {
                frames_threshold,
                begin_threshold,
                frames_percent_trig,
                time_betw_trigs,
            },
            ViolationVocabulary::default(),
        )
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fire_then_cooldown_then_refire() {
        // Worked scenario: window depth 2, priming at 2, count threshold
        // floor(0.5 * 2) = 1, cooldown 60s.
        let mut agg = aggregator(2, 2, 0.5, 60.0);

        // Frame 1: accumulating only.
        let events = agg.observe_at(vec![1], labels(&["no helmet"]), 0.0);
        assert!(events.is_empty());
        assert!(!agg.is_primed());
        assert_eq!(agg.frame_count(), 1);

        // Frame 2: primes and fires once for (track 1, "no helmet").
        let events = agg.observe_at(vec![1], labels(&["no helmet"]), 1.0);
        assert!(agg.is_primed());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].track_id, 1);
        assert_eq!(events[0].label, "no helmet");
        assert_eq!(events[0].violation_id, 5);

        // Frame 3 within the cooldown: suppressed.
        let events = agg.observe_at(vec![1], labels(&["no helmet"]), 2.0);
        assert!(events.is_empty());

        // Frame 4 after the cooldown elapses: fires again.
        let events = agg.observe_at(vec![1], labels(&["no helmet"]), 62.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].violation_id, 5);
    }

    #[test]
    fn test_window_stays_bounded_after_priming() {
        let mut agg = aggregator(3, 3, 1.0, 60.0);

        for i in 0..20u64 {
            agg.observe_at(vec![1], labels(&["all ppe"]), i as f64);
            assert!(agg.window_len() <= 3, "window grew past its depth");
        }
        assert_eq!(agg.window_len(), 3);
    }

    #[test]
    fn test_priming_is_one_shot_and_sticky() {
        let mut agg = aggregator(3, 3, 0.5, 60.0);

        agg.observe_at(vec![1], labels(&["no vest"]), 0.0);
        assert!(!agg.is_primed());
        agg.observe_at(vec![1], labels(&["no vest"]), 1.0);
        assert!(!agg.is_primed());
        agg.observe_at(vec![1], labels(&["no vest"]), 2.0);
        assert!(agg.is_primed());

        // Stays primed on every later frame.
        for i in 3..10u64 {
            agg.observe_at(vec![], vec![], i as f64);
            assert!(agg.is_primed());
        }
    }

    #[test]
    fn test_sub_threshold_votes_fire_nothing() {
        // Count threshold is floor(1.0 * 4) = 4; the label alternates so no
        // (track, label) pair ever reaches 4 votes in the window.
        let mut agg = aggregator(4, 4, 1.0, 60.0);

        for i in 0..30u64 {
            let label = if i % 2 == 0 { "no helmet" } else { "no mask" };
            let events = agg.observe_at(vec![7], labels(&[label]), i as f64);
            assert!(events.is_empty());
        }
    }

    #[test]
    fn test_non_violation_labels_never_fire() {
        let mut agg = aggregator(2, 2, 0.5, 60.0);

        for i in 0..10u64 {
            let events = agg.observe_at(vec![1, 2], labels(&["all ppe", "helmet"]), i as f64);
            assert!(events.is_empty());
        }
    }

    #[test]
    fn test_cooldown_refreshes_last_fire_stamp() {
        let mut agg = aggregator(2, 2, 0.5, 60.0);

        agg.observe_at(vec![1], labels(&["no vest"]), 0.0);
        let events = agg.observe_at(vec![1], labels(&["no vest"]), 0.0);
        assert_eq!(events.len(), 1); // fired at t=0

        // Fires at t=61, refreshing the stamp to 61.
        let events = agg.observe_at(vec![1], labels(&["no vest"]), 61.0);
        assert_eq!(events.len(), 1);

        // t=100 is 39s after the refreshed stamp: suppressed.
        let events = agg.observe_at(vec![1], labels(&["no vest"]), 100.0);
        assert!(events.is_empty());

        // t=121 is 60s after the refreshed stamp: fires.
        let events = agg.observe_at(vec![1], labels(&["no vest"]), 121.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_tracks_and_labels_fire_independently() {
        let mut agg = aggregator(2, 2, 0.5, 60.0);

        agg.observe_at(vec![2, 5], labels(&["no helmet", "no mask"]), 0.0);
        let events = agg.observe_at(vec![2, 5], labels(&["no helmet", "no mask"]), 1.0);

        assert_eq!(events.len(), 2);
        // Deterministic order: ascending track id.
        assert_eq!(events[0].track_id, 2);
        assert_eq!(events[0].violation_id, 5);
        assert_eq!(events[1].track_id, 5);
        assert_eq!(events[1].violation_id, 7);
    }

    #[test]
    fn test_mismatched_lengths_truncate_to_shorter() {
        let mut agg = aggregator(2, 2, 0.5, 60.0);

        // Track 9 has no paired label on either frame; only track 4 counts.
        agg.observe_at(vec![4, 9], labels(&["no mask"]), 0.0);
        let events = agg.observe_at(vec![4, 9], labels(&["no mask"]), 1.0);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].track_id, 4);
    }

    #[test]
    fn test_reset_restores_fresh_behavior() {
        let mut agg = aggregator(2, 2, 0.5, 60.0);

        agg.observe_at(vec![1], labels(&["no helmet"]), 0.0);
        let events = agg.observe_at(vec![1], labels(&["no helmet"]), 1.0);
        assert_eq!(events.len(), 1);

        agg.reset();
        assert_eq!(agg.frame_count(), 0);
        assert!(!agg.is_primed());
        assert_eq!(agg.window_len(), 0);

        // Same sequence seconds later: fires again despite the earlier
        // cooldown stamp, because reset cleared the history.
        agg.observe_at(vec![1], labels(&["no helmet"]), 2.0);
        let events = agg.observe_at(vec![1], labels(&["no helmet"]), 3.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].violation_id, 5);
    }

    #[test]
    fn test_empty_frames_keep_the_window_moving() {
        let mut agg = aggregator(3, 3, 0.5, 60.0);

        agg.observe_at(vec![1], labels(&["no ppe"]), 0.0);
        agg.observe_at(vec![], vec![], 1.0);
        // floor(0.5 * 3) = 1, so the single vote from frame 1 qualifies
        // once the window primes.
        let events = agg.observe_at(vec![], vec![], 2.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].violation_id, 0);
    }
}
