use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use srtt::prelude::*;
use srtt::{ENGINE_NAME, VERSION as LIB_VERSION};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs an interactive SRTT session in the terminal.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show the sequences and mark irregular trials
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Directory for the result file (overrides config)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Seed for sequence construction and trial selection
    #[arg(long)]
    seed: Option<u64>,
}

/// Colors response keys as they are typed: bound keys green, anything else red.
#[derive(Completer, Helper, Hinter, Validator)]
struct KeyHighlighter {
    keys: Vec<char>,
}

impl Highlighter for KeyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut chars = line.chars();
        match chars.next() {
            Some(first) if self.keys.iter().any(|k| k.eq_ignore_ascii_case(&first)) => {
                let key = first.to_string().green().bold();
                Cow::Owned(format!("{}{}", key, chars.as_str().red()))
            }
            Some(_) => Cow::Owned(line.red().to_string()),
            None => Cow::Borrowed(line),
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    let rule = "-".repeat(72);
    println!("{}", ENGINE_NAME.cyan().bold());
    println!("{}", rule.dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    "
        .dimmed()
    );
    println!("{}", rule.dimmed());
}

/// A participant sitting at the terminal.
///
/// Each trial is drawn as the prompt line, one slot per location, and the
/// first character of the entered line is the answer.
struct ShellParticipant {
    editor: Editor<KeyHighlighter, DefaultHistory>,
    config: SrttConfig,
    debug: bool,
}

impl ShellParticipant {
    fn new(config: SrttConfig, debug: bool) -> Result<Self> {
        let mut editor: Editor<KeyHighlighter, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(KeyHighlighter {
            keys: config.input.response_keys.clone(),
        }));
        Ok(Self {
            editor,
            config,
            debug,
        })
    }

    /// Reads a line; `None` means the participant wants out.
    fn read(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.eq_ignore_ascii_case("q") || trimmed.eq_ignore_ascii_case("exit") {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn board(&self, stimulus: &Stimulus) -> String {
        let irregular = self.debug && stimulus.sequence == SequenceId::Irregular;
        (0..self.config.task.locations)
            .map(|slot| {
                if slot == stimulus.location.index() {
                    if irregular {
                        "●".red().bold().to_string()
                    } else {
                        "●".bold().to_string()
                    }
                } else {
                    "_".dimmed().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("   ")
    }

    fn key_legend(&self) -> String {
        self.config
            .input
            .response_keys
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join("   ")
    }
}

impl Participant for ShellParticipant {
    fn wait_for_begin(&mut self, pair: &SequencePair) -> Result<bool> {
        println!();
        println!("A dot appears in one of the slots below. Press the key under it, then Enter.");
        println!("    {}", self.key_legend().yellow().bold());
        println!("Type 'q' to stop at any time.");
        if self.debug {
            println!("{} {}", "REG".dimmed(), pair.regular());
            println!("{} {}", "IRR".dimmed(), pair.irregular());
        }
        let prompt = format!("{}", "Press Enter to begin ".cyan().bold());
        Ok(self.read(&prompt)?.is_some())
    }

    fn respond(&mut self, stimulus: &Stimulus) -> Result<Option<ResponseCode>> {
        let prompt = format!("    {}  {} ", self.board(stimulus), ">".cyan().bold());
        loop {
            let Some(line) = self.read(&prompt)? else {
                return Ok(None);
            };
            let key = line.chars().next();
            if let Some(code) = key.and_then(|k| self.config.response_for_key(k)) {
                return Ok(Some(code));
            }
            println!("{}", format!("Use one of: {}", self.key_legend()).red());
        }
    }

    fn wait_for_continue(&mut self, completed_block: usize, blocks: usize) -> Result<bool> {
        println!(
            "\nBlock {} of {} done.",
            (completed_block + 1).to_string().bold(),
            blocks
        );
        let prompt = format!("{}", "Pause. Press Enter to continue ".cyan().bold());
        Ok(self.read(&prompt)?.is_some())
    }

    fn finished(&mut self, summary: &SessionSummary) -> Result<()> {
        if summary.finished {
            println!("\n{}", "The task is over. Thank you!".green().bold());
        } else {
            println!("\nStopped after {} trials.", summary.trials);
        }
        if let Some(path) = &summary.log_path {
            println!("Results: {}", path.display().to_string().dimmed());
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = SrttConfig::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.session.seed = Some(seed);
    }
    let out_dir = args.out_dir.unwrap_or_else(|| config.session.log_dir.clone());

    let mut participant = ShellParticipant::new(config.clone(), args.debug)?;
    let engine = SrttEngine::new(config)?;
    info!("Starting {} session...", ENGINE_NAME);

    let summary = engine.run(&mut participant, &out_dir).await?;
    info!(trials = summary.trials, finished = summary.finished, "session closed");
    Ok(())
}
