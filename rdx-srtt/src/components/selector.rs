//! The per-trial state machine.
//!
//! The stimulus shown on a trial is always computed one step ahead: at
//! construction for the first trial, and at the end of each answered trial for
//! the next one. Answering a trial logs what was shown together with what each
//! sequence predicted, shifts the shown location into the context, flips the
//! weighted coin for the next active sequence and looks up the next stimulus.

use crate::common::{Location, ResponseCode, SequenceId};
use crate::components::matcher::predict;
use crate::components::pair::SequencePair;
use crate::components::window::ContextWindow;
use crate::error::SrttError;
use rand::Rng;
use std::fmt;
use tracing::{trace, warn};

/// Where the task stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for the participant's "begin" signal.
    NotStarted,
    /// Showing trial `trial` of block `block`, both zero-based.
    Running { block: usize, trial: usize },
    /// Between blocks; `completed_block` has just ended.
    Paused { completed_block: usize },
    /// The last trial of the last block has been answered.
    Finished,
    /// The answered trial's context has no successor in one of the
    /// sequences. The session cannot go on.
    Halted,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::NotStarted => f.write_str("not started"),
            TaskState::Running { block, trial } => {
                write!(f, "running block {block}, trial {trial}")
            }
            TaskState::Paused { completed_block } => {
                write!(f, "paused after block {completed_block}")
            }
            TaskState::Finished => f.write_str("finished"),
            TaskState::Halted => f.write_str("halted"),
        }
    }
}

/// Block structure and sequence probability of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub trials_per_block: usize,
    pub blocks: usize,
    /// Probability that a trial follows the regular sequence.
    pub p_regular: f64,
}

impl Schedule {
    pub fn total_trials(&self) -> usize {
        self.trials_per_block * self.blocks
    }

    pub(crate) fn check(&self) -> Result<(), SrttError> {
        if self.trials_per_block == 0 || self.blocks == 0 {
            return Err(SrttError::InvalidParameters(
                "a session needs at least one block of at least one trial".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.p_regular) {
            return Err(SrttError::InvalidParameters(format!(
                "p_regular must lie in [0, 1], got {}",
                self.p_regular
            )));
        }
        Ok(())
    }
}

/// What the renderer needs for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stimulus {
    pub block: usize,
    pub trial: usize,
    /// The location to highlight.
    pub location: Location,
    /// The location highlighted on the previous trial, if any.
    pub previous: Option<Location>,
    /// The sequence the location was drawn from. Only debug views show it.
    pub sequence: SequenceId,
}

/// One answered trial, as written to the emission log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionRecord {
    pub block: usize,
    pub trial: usize,
    /// Microseconds from stimulus onset to the response.
    pub reaction_time_us: u64,
    /// Microseconds from the start of the task to the response.
    pub since_start_us: u64,
    pub response: ResponseCode,
    /// What the regular sequence predicted for this trial.
    pub regular_prediction: Location,
    /// What the irregular sequence predicted for this trial.
    pub irregular_prediction: Location,
    pub shown: Location,
    pub sequence: SequenceId,
}

impl fmt::Display for EmissionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{};{};{};{}",
            self.block,
            self.trial,
            self.reaction_time_us,
            self.since_start_us,
            self.response,
            self.regular_prediction,
            self.irregular_prediction,
            self.shown,
            self.sequence.code()
        )
    }
}

/// Mutable per-trial state, owned by the selector.
#[derive(Debug, Clone)]
struct SessionState {
    context: ContextWindow,
    active: SequenceId,
    shown: Location,
    previous: Option<Location>,
    regular_prediction: Location,
    irregular_prediction: Location,
    task_started_us: u64,
    onset_us: Option<u64>,
    trials_completed: usize,
}

/// Drives the trials of one session over a validated [`SequencePair`].
pub struct TrialSelector<R: Rng> {
    pair: SequencePair,
    schedule: Schedule,
    rng: R,
    state: TaskState,
    session: SessionState,
    halt_reason: Option<SrttError>,
}

impl<R: Rng> TrialSelector<R> {
    /// Prepares the first trial.
    ///
    /// The context is seeded from a uniformly drawn offset of the regular
    /// sequence and the first active sequence comes from the weighted coin.
    pub fn new(pair: SequencePair, schedule: Schedule, mut rng: R) -> Result<Self, SrttError> {
        schedule.check()?;
        let offset = rng.gen_range(0..pair.len());
        let context = ContextWindow::seeded(pair.regular(), offset);
        let active = draw_sequence(&mut rng, schedule.p_regular);
        let (regular_prediction, irregular_prediction) = predictions(&pair, &context)?;
        let shown = pick(active, regular_prediction, irregular_prediction);
        trace!(offset, context = ?context.as_slice(), %shown, %active, "session seeded");

        Ok(Self {
            pair,
            schedule,
            rng,
            state: TaskState::NotStarted,
            session: SessionState {
                context,
                active,
                shown,
                previous: None,
                regular_prediction,
                irregular_prediction,
                task_started_us: 0,
                onset_us: None,
                trials_completed: 0,
            },
            halt_reason: None,
        })
    }

    /// Starts the task at `now_us`.
    pub fn begin(&mut self, now_us: u64) -> Result<(), SrttError> {
        match self.state {
            TaskState::NotStarted => {
                self.session.task_started_us = now_us;
                self.state = TaskState::Running { block: 0, trial: 0 };
                Ok(())
            }
            state => Err(SrttError::InvalidTransition {
                action: "begin",
                state,
            }),
        }
    }

    /// Records that the current stimulus appeared at `onset_us` and returns it.
    ///
    /// Presenting the same trial again keeps the first onset.
    pub fn present(&mut self, onset_us: u64) -> Result<Stimulus, SrttError> {
        let TaskState::Running { block, trial } = self.state else {
            return Err(SrttError::InvalidTransition {
                action: "present a stimulus",
                state: self.state,
            });
        };
        self.session.onset_us.get_or_insert(onset_us);
        Ok(Stimulus {
            block,
            trial,
            location: self.session.shown,
            previous: self.session.previous,
            sequence: self.session.active,
        })
    }

    /// Answers the current trial with `response`, received at `at_us`.
    ///
    /// The record of the answered trial is always returned. If the next
    /// stimulus cannot be looked up, the selector moves to
    /// [`TaskState::Halted`] and the cause is available from
    /// [`TrialSelector::take_halt_reason`].
    pub fn advance(
        &mut self,
        response: ResponseCode,
        at_us: u64,
    ) -> Result<EmissionRecord, SrttError> {
        let TaskState::Running { block, trial } = self.state else {
            return Err(SrttError::InvalidTransition {
                action: "advance",
                state: self.state,
            });
        };
        let onset = self
            .session
            .onset_us
            .ok_or(SrttError::StimulusNotPresented { block, trial })?;

        let record = EmissionRecord {
            block,
            trial,
            reaction_time_us: elapsed(onset, at_us)?,
            since_start_us: elapsed(self.session.task_started_us, at_us)?,
            response,
            regular_prediction: self.session.regular_prediction,
            irregular_prediction: self.session.irregular_prediction,
            shown: self.session.shown,
            sequence: self.session.active,
        };

        self.session.onset_us = None;
        self.session.trials_completed += 1;

        let mut context = self.session.context.clone();
        context.shift_append(self.session.shown);
        let (regular_prediction, irregular_prediction) = match predictions(&self.pair, &context) {
            Ok(found) => found,
            Err(err) => {
                warn!(%record, %err, "no next stimulus, halting the session");
                self.state = TaskState::Halted;
                self.halt_reason = Some(err);
                return Ok(record);
            }
        };
        let active = draw_sequence(&mut self.rng, self.schedule.p_regular);

        self.session.previous = Some(self.session.shown);
        self.session.shown = pick(active, regular_prediction, irregular_prediction);
        self.session.context = context;
        self.session.active = active;
        self.session.regular_prediction = regular_prediction;
        self.session.irregular_prediction = irregular_prediction;

        self.state = if trial + 1 < self.schedule.trials_per_block {
            TaskState::Running {
                block,
                trial: trial + 1,
            }
        } else if block + 1 < self.schedule.blocks {
            TaskState::Paused {
                completed_block: block,
            }
        } else {
            TaskState::Finished
        };
        trace!(%record, next = %self.session.shown, state = %self.state, "trial answered");
        Ok(record)
    }

    /// Leaves a pause and starts the next block.
    pub fn resume(&mut self) -> Result<(), SrttError> {
        match self.state {
            TaskState::Paused { completed_block } => {
                self.session.onset_us = None;
                self.state = TaskState::Running {
                    block: completed_block + 1,
                    trial: 0,
                };
                Ok(())
            }
            state => Err(SrttError::InvalidTransition {
                action: "resume",
                state,
            }),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Why the selector halted, if it did. Returns the cause only once.
    pub fn take_halt_reason(&mut self) -> Option<SrttError> {
        self.halt_reason.take()
    }

    pub fn pair(&self) -> &SequencePair {
        &self.pair
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn context(&self) -> &[Location] {
        self.session.context.as_slice()
    }

    /// The location of the upcoming (or currently shown) stimulus.
    pub fn shown(&self) -> Location {
        self.session.shown
    }

    pub fn previous(&self) -> Option<Location> {
        self.session.previous
    }

    pub fn active(&self) -> SequenceId {
        self.session.active
    }

    /// The regular and irregular predictions for the upcoming trial.
    pub fn predictions(&self) -> (Location, Location) {
        (
            self.session.regular_prediction,
            self.session.irregular_prediction,
        )
    }

    pub fn trials_completed(&self) -> usize {
        self.session.trials_completed
    }
}

fn draw_sequence<R: Rng + ?Sized>(rng: &mut R, p_regular: f64) -> SequenceId {
    if rng.gen_bool(p_regular) {
        SequenceId::Regular
    } else {
        SequenceId::Irregular
    }
}

fn predictions(
    pair: &SequencePair,
    context: &ContextWindow,
) -> Result<(Location, Location), SrttError> {
    let lookup = |id| {
        predict(context.as_slice(), pair, id).ok_or_else(|| SrttError::UnmappedContext {
            context: context.as_slice().to_vec(),
            sequence: id,
        })
    };
    Ok((lookup(SequenceId::Regular)?, lookup(SequenceId::Irregular)?))
}

fn pick(active: SequenceId, regular: Location, irregular: Location) -> Location {
    match active {
        SequenceId::Regular => regular,
        SequenceId::Irregular => irregular,
    }
}

fn elapsed(since: u64, at: u64) -> Result<u64, SrttError> {
    at.checked_sub(since).ok_or(SrttError::ClockWentBackwards {
        earlier: since,
        later: at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::sequence::CyclicSequence;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reference_pair() -> SequencePair {
        let regular =
            CyclicSequence::from_digits(&[0, 1, 0, 3, 2, 1, 3, 0, 2, 3, 1, 2], 4, 2).unwrap();
        let irregular =
            CyclicSequence::from_digits(&[2, 0, 3, 1, 0, 2, 1, 2, 3, 0, 1, 3], 4, 2).unwrap();
        SequencePair::new(regular, irregular).unwrap()
    }

    fn selector(trials_per_block: usize, blocks: usize) -> TrialSelector<StdRng> {
        let schedule = Schedule {
            trials_per_block,
            blocks,
            p_regular: 0.85,
        };
        TrialSelector::new(reference_pair(), schedule, StdRng::seed_from_u64(21)).unwrap()
    }

    #[test]
    fn advance_before_begin_is_rejected() {
        let mut selector = selector(2, 2);
        assert!(matches!(
            selector.advance(ResponseCode(0), 10),
            Err(SrttError::InvalidTransition {
                action: "advance",
                state: TaskState::NotStarted
            })
        ));
    }

    #[test]
    fn advance_requires_a_presented_stimulus() {
        let mut selector = selector(2, 2);
        selector.begin(0).unwrap();
        assert!(matches!(
            selector.advance(ResponseCode(0), 10),
            Err(SrttError::StimulusNotPresented { block: 0, trial: 0 })
        ));
    }

    #[test]
    fn record_carries_both_latencies() {
        let mut selector = selector(2, 2);
        selector.begin(1_000).unwrap();
        selector.present(1_500).unwrap();
        // A second presentation of the same trial keeps the first onset.
        selector.present(1_700).unwrap();
        let record = selector.advance(ResponseCode(3), 2_000).unwrap();
        assert_eq!(record.reaction_time_us, 500);
        assert_eq!(record.since_start_us, 1_000);
        assert_eq!(record.response, ResponseCode(3));
        assert_eq!(record.block, 0);
        assert_eq!(record.trial, 0);
    }

    #[test]
    fn clock_going_backwards_is_an_error() {
        let mut selector = selector(2, 2);
        selector.begin(1_000).unwrap();
        selector.present(1_500).unwrap();
        assert!(matches!(
            selector.advance(ResponseCode(0), 1_200),
            Err(SrttError::ClockWentBackwards {
                earlier: 1_500,
                later: 1_200
            })
        ));
    }

    #[test]
    fn shown_location_follows_the_active_sequence() {
        let mut selector = selector(50, 1);
        selector.begin(0).unwrap();
        let mut previous = None;
        for t in 0..50u64 {
            let stimulus = selector.present(t * 10).unwrap();
            assert_eq!(stimulus.previous, previous);
            let record = selector.advance(ResponseCode(0), t * 10 + 5).unwrap();
            let expected = match record.sequence {
                SequenceId::Regular => record.regular_prediction,
                SequenceId::Irregular => record.irregular_prediction,
            };
            assert_eq!(record.shown, expected);
            assert_eq!(record.shown, stimulus.location);
            assert_eq!(selector.context().last(), Some(&record.shown));
            previous = Some(record.shown);
        }
        assert_eq!(selector.state(), TaskState::Finished);
    }

    #[test]
    fn pauses_between_blocks_and_finishes_after_the_last() {
        let mut selector = selector(2, 2);
        selector.begin(0).unwrap();
        for _ in 0..2 {
            selector.present(0).unwrap();
            selector.advance(ResponseCode(1), 1).unwrap();
        }
        assert_eq!(selector.state(), TaskState::Paused { completed_block: 0 });
        assert!(selector.present(2).is_err());
        selector.resume().unwrap();
        assert_eq!(selector.state(), TaskState::Running { block: 1, trial: 0 });
        for _ in 0..2 {
            selector.present(3).unwrap();
            selector.advance(ResponseCode(1), 4).unwrap();
        }
        assert_eq!(selector.state(), TaskState::Finished);
        assert_eq!(selector.trials_completed(), 4);
        assert!(selector.resume().is_err());
        assert!(selector.begin(5).is_err());
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        let schedule = Schedule {
            trials_per_block: 10,
            blocks: 1,
            p_regular: 1.5,
        };
        assert!(TrialSelector::new(reference_pair(), schedule, StdRng::seed_from_u64(1)).is_err());
    }

    /// Valid and collision-free, but neither sequence covers every ordered
    /// pair of locations.
    fn partial_pair() -> SequencePair {
        SequencePair::new(
            CyclicSequence::from_digits(&[0, 1, 2, 3], 4, 2).unwrap(),
            CyclicSequence::from_digits(&[0, 2, 1, 3], 4, 2).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn unmapped_context_is_fatal() {
        let schedule = Schedule {
            trials_per_block: 10,
            blocks: 1,
            p_regular: 0.5,
        };
        match TrialSelector::new(partial_pair(), schedule, StdRng::seed_from_u64(1)) {
            Err(SrttError::UnmappedContext { context, sequence }) => {
                assert_eq!(context, vec![Location(1), Location(2)]);
                assert_eq!(sequence, SequenceId::Irregular);
            }
            other => panic!("expected an unmapped context, got {:?}", other.err()),
        }
    }

    #[test]
    fn halting_keeps_the_answered_trial() {
        let schedule = Schedule {
            trials_per_block: 10,
            blocks: 1,
            p_regular: 0.5,
        };
        let mut halted = 0;
        for seed in 0..64 {
            // Only the window "30" is shared, so every other start fails at once.
            let Ok(mut selector) =
                TrialSelector::new(partial_pair(), schedule, StdRng::seed_from_u64(seed))
            else {
                continue;
            };
            assert_eq!(selector.context(), &[Location(3), Location(0)]);
            selector.begin(0).unwrap();
            let stimulus = selector.present(10).unwrap();
            let record = selector.advance(ResponseCode(0), 20).unwrap();
            assert_eq!(record.shown, stimulus.location);
            assert_eq!(record.reaction_time_us, 10);
            assert_eq!(selector.state(), TaskState::Halted);
            assert_eq!(selector.trials_completed(), 1);
            assert!(matches!(
                selector.take_halt_reason(),
                Some(SrttError::UnmappedContext { .. })
            ));
            assert!(selector.take_halt_reason().is_none());
            assert!(matches!(
                selector.present(30),
                Err(SrttError::InvalidTransition {
                    state: TaskState::Halted,
                    ..
                })
            ));
            halted += 1;
        }
        assert!(halted > 0, "no seed started on the shared window");
    }

    #[test]
    fn record_line_uses_semicolons() {
        let record = EmissionRecord {
            block: 1,
            trial: 7,
            reaction_time_us: 412_345,
            since_start_us: 98_000_000,
            response: ResponseCode(2),
            regular_prediction: Location(2),
            irregular_prediction: Location(0),
            shown: Location(0),
            sequence: SequenceId::Irregular,
        };
        assert_eq!(record.to_string(), "1;7;412345;98000000;2;2;0;0;1");
    }
}
