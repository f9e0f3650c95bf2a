//! The participant side of a session: whoever sees stimuli and answers them.
//!
//! Interactive front ends implement [`Participant`] on top of their input
//! device. [`SimulatedParticipant`] answers on its own and drives a
//! [`ManualClock`], which is what `srtt-sim` and the engine tests use.

use crate::common::{ResponseCode, SequenceId};
use crate::components::pair::SequencePair;
use crate::components::selector::Stimulus;
use crate::engine::SessionSummary;
use crate::time::ManualClock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Receives stimuli and produces responses.
///
/// Returning `false` or `None` from any method ends the session early; the
/// trials answered so far stay in the log.
pub trait Participant {
    /// Blocks until the participant is ready. `pair` is only meant for debug
    /// views.
    fn wait_for_begin(&mut self, pair: &SequencePair) -> anyhow::Result<bool>;

    /// Shows `stimulus` and waits for the answer.
    fn respond(&mut self, stimulus: &Stimulus) -> anyhow::Result<Option<ResponseCode>>;

    /// Blocks during the pause after `completed_block` (zero-based) of `blocks`.
    fn wait_for_continue(&mut self, completed_block: usize, blocks: usize)
        -> anyhow::Result<bool>;

    /// Called once when the session ends, finished or not.
    fn finished(&mut self, _summary: &SessionSummary) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A scripted participant with a simple reaction time model.
///
/// Reaction times are `base + U(0, jitter)`. Trials driven by the regular
/// sequence get faster as the session goes on, up to `regular_speedup` after
/// `learning_trials` answers, which mimics implicit sequence learning.
pub struct SimulatedParticipant {
    clock: Arc<ManualClock>,
    rng: StdRng,
    locations: usize,
    accuracy: f64,
    base: Duration,
    jitter: Duration,
    regular_speedup: Duration,
    learning_trials: usize,
    pause: Duration,
    quit_after: Option<usize>,
    answered: usize,
}

impl SimulatedParticipant {
    pub fn new(clock: Arc<ManualClock>, seed: u64) -> Self {
        Self {
            clock,
            rng: StdRng::seed_from_u64(seed),
            locations: 4,
            accuracy: 0.95,
            base: Duration::from_millis(420),
            jitter: Duration::from_millis(160),
            regular_speedup: Duration::from_millis(60),
            learning_trials: 400,
            pause: Duration::from_secs(5),
            quit_after: None,
            answered: 0,
        }
    }

    pub fn with_locations(mut self, locations: usize) -> Self {
        self.locations = locations.max(1);
        self
    }

    /// Probability of pressing the key of the shown location.
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy.clamp(0.0, 1.0);
        self
    }

    /// Stops answering after `trials` responses.
    pub fn quit_after(mut self, trials: usize) -> Self {
        self.quit_after = Some(trials);
        self
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    fn reaction_time(&mut self, sequence: SequenceId) -> Duration {
        let jitter_us = self.jitter.as_micros() as u64;
        let mut rt = self.base + Duration::from_micros(self.rng.gen_range(0..=jitter_us));
        if sequence == SequenceId::Regular && self.learning_trials > 0 {
            let learned =
                self.answered.min(self.learning_trials) as f64 / self.learning_trials as f64;
            rt = rt.saturating_sub(self.regular_speedup.mul_f64(learned));
        }
        rt
    }

    fn pick_response(&mut self, stimulus: &Stimulus) -> ResponseCode {
        if self.locations < 2 || self.rng.gen_bool(self.accuracy) {
            return ResponseCode(stimulus.location.0);
        }
        // Any other key, uniformly.
        let shown = stimulus.location.index();
        let mut other = self.rng.gen_range(0..self.locations - 1);
        if other >= shown {
            other += 1;
        }
        ResponseCode(other as u8)
    }
}

impl Participant for SimulatedParticipant {
    fn wait_for_begin(&mut self, _pair: &SequencePair) -> anyhow::Result<bool> {
        self.clock.advance(self.pause);
        Ok(true)
    }

    fn respond(&mut self, stimulus: &Stimulus) -> anyhow::Result<Option<ResponseCode>> {
        if self.quit_after.is_some_and(|limit| self.answered >= limit) {
            return Ok(None);
        }
        let rt = self.reaction_time(stimulus.sequence);
        self.clock.advance(rt);
        self.answered += 1;
        Ok(Some(self.pick_response(stimulus)))
    }

    fn wait_for_continue(
        &mut self,
        _completed_block: usize,
        _blocks: usize,
    ) -> anyhow::Result<bool> {
        self.clock.advance(self.pause);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Location;
    use crate::time::Clock;

    fn stimulus(location: u8, sequence: SequenceId) -> Stimulus {
        Stimulus {
            block: 0,
            trial: 0,
            location: Location(location),
            previous: None,
            sequence,
        }
    }

    #[test]
    fn perfect_participant_presses_the_shown_key() {
        let clock = Arc::new(ManualClock::new());
        let mut participant = SimulatedParticipant::new(clock.clone(), 1).with_accuracy(1.0);
        for location in 0..4 {
            let answer = participant
                .respond(&stimulus(location, SequenceId::Irregular))
                .unwrap();
            assert_eq!(answer, Some(ResponseCode(location)));
        }
        // 4 answers of 420-580 ms each.
        let elapsed = clock.now_micros();
        assert!((1_680_000..=2_320_000).contains(&elapsed), "elapsed={elapsed}");
    }

    #[test]
    fn wrong_answers_stay_in_range_and_differ_from_shown() {
        let clock = Arc::new(ManualClock::new());
        let mut participant = SimulatedParticipant::new(clock, 2).with_accuracy(0.0);
        for _ in 0..100 {
            let answer = participant
                .respond(&stimulus(2, SequenceId::Regular))
                .unwrap()
                .unwrap();
            assert_ne!(answer, ResponseCode(2));
            assert!(answer.0 < 4);
        }
    }

    #[test]
    fn quits_after_the_limit() {
        let clock = Arc::new(ManualClock::new());
        let mut participant = SimulatedParticipant::new(clock, 3).quit_after(2);
        let s = stimulus(0, SequenceId::Regular);
        assert!(participant.respond(&s).unwrap().is_some());
        assert!(participant.respond(&s).unwrap().is_some());
        assert!(participant.respond(&s).unwrap().is_none());
        assert_eq!(participant.answered(), 2);
    }
}
