use anyhow::Result;
use clap::Parser;
use srtt::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Runs an SRTT session with a simulated participant and writes its result file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for sequence construction and trial selection
    #[arg(long)]
    seed: Option<u64>,

    /// Seed for the simulated participant
    #[arg(long, default_value_t = 1)]
    participant_seed: u64,

    /// Number of blocks (overrides config)
    #[arg(long)]
    blocks: Option<usize>,

    /// Trials per block (overrides config)
    #[arg(long)]
    trials: Option<usize>,

    /// Probability that the simulated participant presses the right key
    #[arg(long, default_value_t = 0.95)]
    accuracy: f64,

    /// Directory for the result file (overrides config)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Keep the real stimulus onset asynchrony between trials
    #[arg(long, default_value_t = false)]
    realtime: bool,
}

/// Mean reaction times per sequence, gathered from the event stream.
#[derive(Debug, Default)]
struct LatencyStats {
    regular_us: u64,
    regular_trials: u64,
    irregular_us: u64,
    irregular_trials: u64,
    correct: u64,
}

impl LatencyStats {
    fn record(&mut self, record: &EmissionRecord) {
        match record.sequence {
            SequenceId::Regular => {
                self.regular_us += record.reaction_time_us;
                self.regular_trials += 1;
            }
            SequenceId::Irregular => {
                self.irregular_us += record.reaction_time_us;
                self.irregular_trials += 1;
            }
        }
        if record.response.0 == record.shown.0 {
            self.correct += 1;
        }
    }

    fn mean_ms(total_us: u64, trials: u64) -> f64 {
        if trials == 0 {
            0.0
        } else {
            total_us as f64 / trials as f64 / 1000.0
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load the configuration and apply command-line overrides.
    let args = Args::parse();
    let mut config = SrttConfig::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.session.seed = Some(seed);
    }
    if let Some(blocks) = args.blocks {
        config.task.blocks = blocks;
    }
    if let Some(trials) = args.trials {
        config.task.trials_per_block = trials;
    }
    if !args.realtime {
        config.task.soa_ms = 0;
    }
    let out_dir = args.out_dir.unwrap_or_else(|| config.session.log_dir.clone());
    let locations = config.task.locations;

    // 3. Create the engine on a clock the simulated participant advances.
    let clock = Arc::new(ManualClock::new());
    let engine = SrttEngine::with_clock(config, clock.clone())?;

    // 4. Listen to the event stream.
    let listener = spawn_event_listener(&engine);

    // 5. Run the session.
    let mut participant = SimulatedParticipant::new(clock, args.participant_seed)
        .with_locations(locations)
        .with_accuracy(args.accuracy);
    let summary = engine.run(&mut participant, &out_dir).await?;

    // Dropping the engine closes the event stream and lets the listener finish.
    drop(engine);
    let stats = listener.await?;

    info!(
        participant_id = summary.participant_id,
        trials = summary.trials,
        regular = %summary.regular,
        irregular = %summary.irregular,
        "simulation complete"
    );
    info!(
        mean_regular_ms = LatencyStats::mean_ms(stats.regular_us, stats.regular_trials),
        mean_irregular_ms = LatencyStats::mean_ms(stats.irregular_us, stats.irregular_trials),
        correct = stats.correct,
        "reaction times"
    );
    if let Some(path) = summary.log_path {
        println!("{}", path.display());
    }
    Ok(())
}

/// Spawns a task that logs lifecycle events and aggregates reaction times.
fn spawn_event_listener<C: Clock>(engine: &SrttEngine<C>) -> JoinHandle<LatencyStats> {
    let mut events = engine.subscribe_session_events();
    tokio::spawn(async move {
        let mut stats = LatencyStats::default();
        loop {
            match events.recv().await {
                Ok(SessionEvent::TrialCompleted(record)) => stats.record(&record),
                Ok(SessionEvent::StimulusShown { .. }) => {}
                Ok(other) => info!("[SESSION] => {:?}", other),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event listener fell behind, statistics are partial")
                }
                Err(RecvError::Closed) => break,
            }
        }
        stats
    })
}
