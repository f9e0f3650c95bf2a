//! The session engine that ties sequences, participant, clock and log together.

use crate::components::pair::SequencePair;
use crate::components::selector::{TaskState, TrialSelector};
use crate::config::SrttConfig;
use crate::error::SrttError;
use crate::events::SessionEvent;
use crate::logfile::EmissionLog;
use crate::participant::Participant;
use crate::time::{Clock, MonotonicClock};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

const CHANNEL_CAPACITY: usize = 4096;

/// Identifies the participant and where their results go.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub participant_id: u32,
    pub log_path: Option<PathBuf>,
}

/// Outcome of one session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub participant_id: u32,
    pub log_path: Option<PathBuf>,
    /// Answered trials, all of which are in the log.
    pub trials: usize,
    /// Whether the last trial of the last block was answered.
    pub finished: bool,
    pub regular: String,
    pub irregular: String,
}

/// The main SRTT engine.
///
/// It owns the configuration and the clock and runs one session at a time on
/// the calling task. All per-trial state lives in the `TrialSelector` created
/// for that session; observers only see cloned `SessionEvent`s.
pub struct SrttEngine<C: Clock = MonotonicClock> {
    config: Arc<SrttConfig>,
    clock: C,
    event_sender: broadcast::Sender<SessionEvent>,
}

impl SrttEngine<MonotonicClock> {
    /// Creates an engine timed by the system monotonic clock.
    pub fn new(config: SrttConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> SrttEngine<C> {
    /// Creates an engine with the given clock after validating `config`.
    pub fn with_clock(config: SrttConfig, clock: C) -> anyhow::Result<Self> {
        config.validate().context("invalid SRTT configuration")?;
        let (event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            clock,
            event_sender,
        })
    }

    pub fn config(&self) -> &SrttConfig {
        &self.config
    }

    /// Subscribes to the `SessionEvent` stream.
    pub fn subscribe_session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// A fresh rng for one session: seeded from the config when a seed is set.
    pub fn session_rng(&self) -> StdRng {
        match self.config.session.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Produces the session's sequence pair.
    ///
    /// Generated or taken from the configuration; with `randomize_roles` a fair
    /// coin decides which of the two is regular.
    pub fn prepare<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SequencePair, SrttError> {
        let pair = if self.config.sequences.auto_generate {
            let builder = self.config.builder()?;
            SequencePair::generate(&builder, rng, self.config.pair_policy())?
        } else {
            self.config.configured_pair()?
        };
        if self.config.sequences.randomize_roles && rng.gen_bool(0.5) {
            Ok(pair.swap_roles())
        } else {
            Ok(pair)
        }
    }

    /// Runs a full session and writes its result file into `log_dir`.
    pub async fn run<P: Participant>(
        &self,
        participant: &mut P,
        log_dir: &Path,
    ) -> anyhow::Result<SessionSummary> {
        let mut rng = self.session_rng();
        let pair = self
            .prepare(&mut rng)
            .context("failed to prepare the sequence pair")?;
        let participant_id = rng.gen_range(0..999_999);
        let (mut log, log_path) = EmissionLog::create_in(log_dir, participant_id, &pair)
            .with_context(|| format!("failed to open a result file in {}", log_dir.display()))?;
        info!(participant_id, path = %log_path.display(), "writing results");

        let info = SessionInfo {
            participant_id,
            log_path: Some(log_path),
        };
        self.run_with_log(participant, &mut log, pair, rng, info)
            .await
    }

    /// Runs a session against an already opened log.
    pub async fn run_with_log<P: Participant, W: Write, R: Rng>(
        &self,
        participant: &mut P,
        log: &mut EmissionLog<W>,
        pair: SequencePair,
        rng: R,
        info: SessionInfo,
    ) -> anyhow::Result<SessionSummary> {
        let mut summary = SessionSummary {
            participant_id: info.participant_id,
            log_path: info.log_path.clone(),
            trials: 0,
            finished: false,
            regular: pair.regular().digits(),
            irregular: pair.irregular().digits(),
        };
        self.emit(SessionEvent::SequencesReady {
            regular: summary.regular.clone(),
            irregular: summary.irregular.clone(),
        });

        let schedule = self.config.schedule();
        let soa = self.config.soa();
        let mut selector = TrialSelector::new(pair, schedule, rng)?;

        if !participant.wait_for_begin(selector.pair())? {
            return self.abort(participant, summary);
        }
        selector.begin(self.clock.now_micros())?;
        info!(
            participant_id = info.participant_id,
            blocks = schedule.blocks,
            trials_per_block = schedule.trials_per_block,
            "session started"
        );
        self.emit(SessionEvent::SessionStarted {
            participant_id: info.participant_id,
            log_path: info.log_path,
        });

        loop {
            match selector.state() {
                TaskState::Running { .. } => {
                    let stimulus = selector.present(self.clock.now_micros())?;
                    self.emit(SessionEvent::StimulusShown {
                        block: stimulus.block,
                        trial: stimulus.trial,
                        location: stimulus.location,
                        sequence: stimulus.sequence,
                    });
                    let Some(response) = participant.respond(&stimulus)? else {
                        return self.abort(participant, summary);
                    };
                    let record = selector.advance(response, self.clock.now_micros())?;
                    log.write_record(&record)
                        .context("failed to write an emission record")?;
                    summary.trials += 1;
                    self.emit(SessionEvent::TrialCompleted(record));
                    if !soa.is_zero() {
                        tokio::time::sleep(soa).await;
                    }
                }
                TaskState::Paused { completed_block } => {
                    info!(completed_block, "block finished, pausing");
                    self.emit(SessionEvent::BlockPaused { completed_block });
                    if !participant.wait_for_continue(completed_block, schedule.blocks)? {
                        return self.abort(participant, summary);
                    }
                    selector.resume()?;
                    self.emit(SessionEvent::BlockResumed {
                        block: completed_block + 1,
                    });
                }
                TaskState::Finished => break,
                TaskState::Halted => {
                    warn!(trials = summary.trials, "session halted");
                    self.emit(SessionEvent::SessionAborted {
                        trials: summary.trials,
                    });
                    let reason = selector
                        .take_halt_reason()
                        .context("session halted without a reason")?;
                    return Err(anyhow::Error::new(reason).context("session halted"));
                }
                TaskState::NotStarted => {
                    anyhow::bail!("session fell back to the not-started state")
                }
            }
        }

        summary.finished = true;
        info!(trials = summary.trials, "session finished");
        self.emit(SessionEvent::SessionFinished {
            trials: summary.trials,
        });
        participant.finished(&summary)?;
        Ok(summary)
    }

    fn abort<P: Participant>(
        &self,
        participant: &mut P,
        summary: SessionSummary,
    ) -> anyhow::Result<SessionSummary> {
        warn!(trials = summary.trials, "session aborted by the participant");
        self.emit(SessionEvent::SessionAborted {
            trials: summary.trials,
        });
        participant.finished(&summary)?;
        Ok(summary)
    }

    fn emit(&self, event: SessionEvent) {
        self.event_sender.send(event).ok();
    }
}
