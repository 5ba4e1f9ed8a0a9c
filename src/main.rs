//! Classroom Engagement CLI
//!
//! Periodic engagement scoring over a shared emotion log.

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use clap::{Parser, Subcommand, ValueEnum};
use classroom_engagement::{
    config::Config,
    core::{local_now, run_cycle, run_periodic, stop_channel, CycleOutcome, StopHandle},
    observation::{format_timestamp, EngagementScoreSample, ObservationRecord},
    report::{samples_between, SessionReport},
    store::{AppendLog, CsvLog, MemoryLog},
    EngagementLevel, VERSION, WEIGHT_TABLE,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engagement")]
#[command(version = VERSION)]
#[command(about = "Rolling classroom engagement score from emotion observations", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding emotions.csv and engagement.csv
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the emotion log periodically until interrupted
    Run {
        /// Seconds between scoring cycles
        #[arg(long)]
        interval: Option<u64>,

        /// Width of the trailing window in seconds
        #[arg(long)]
        window: Option<u64>,
    },

    /// Run a single scoring cycle
    Score {
        /// Width of the trailing window in seconds
        #[arg(long)]
        window: Option<u64>,

        /// Print the score without appending it to the engagement log
        #[arg(long)]
        no_append: bool,
    },

    /// Summarize recorded emotions and engagement scores
    Report {
        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Only include scores from the last N minutes
        #[arg(long)]
        last: Option<u64>,
    },

    /// Create the data directory and both logs with header rows
    Init,

    /// Show configuration, optionally updating and saving it
    Config {
        /// Seconds between scoring cycles
        #[arg(long)]
        interval: Option<u64>,

        /// Width of the trailing window in seconds
        #[arg(long)]
        window: Option<u64>,

        /// Scores below this value raise a low-engagement alert
        #[arg(long)]
        alert_threshold: Option<f64>,

        /// Persist the resulting configuration to the config file
        #[arg(long)]
        save: bool,
    },

    /// Show the emotion weight table
    Weights,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(dir) = cli.data_dir {
        config.data_path = dir;
    }

    match cli.command {
        Commands::Run { interval, window } => {
            let config = config.with_overrides(interval, window, None)?;
            cmd_run(&config)
        }
        Commands::Score { window, no_append } => {
            let config = config.with_overrides(None, window, None)?;
            cmd_score(&config, no_append)
        }
        Commands::Report { format, last } => cmd_report(&config, format, last),
        Commands::Init => cmd_init(&config),
        Commands::Config {
            interval,
            window,
            alert_threshold,
            save,
        } => {
            let config = config.with_overrides(interval, window, alert_threshold)?;
            if save {
                match cli.config.as_ref() {
                    Some(path) => config.save_to(path),
                    None => config.save(),
                }
                .context("failed to save configuration")?;
                println!("Configuration saved.");
                println!();
            }
            cmd_config(&config, cli.config.as_ref())
        }
        Commands::Weights => {
            println!("{WEIGHT_TABLE}");
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {path:?}")),
        None => Config::load().context("failed to load configuration"),
    }
}

fn cmd_run(config: &Config) -> Result<()> {
    println!("Classroom Engagement Scorer v{VERSION}");
    println!();
    println!("  Emotion log:    {:?}", config.emotion_log_path());
    println!("  Engagement log: {:?}", config.engagement_log_path());
    println!("  Interval:       {}s", config.interval.as_secs());
    println!("  Window:         {}s", config.window.as_secs());
    println!("  Alert below:    {}", config.alert_threshold);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create data directory: {e}");
    }

    let source: CsvLog<ObservationRecord> = CsvLog::new(config.emotion_log_path());
    let mut sink: CsvLog<EngagementScoreSample> = CsvLog::new(config.engagement_log_path());
    if let Err(e) = sink.ensure_exists() {
        // Not fatal: every cycle retries the append.
        eprintln!("Warning: Could not create engagement log: {e}");
    }

    let (handle, signal) = stop_channel();
    ctrlc_handler(handle)?;

    let stats = run_periodic(
        &source,
        &mut sink,
        &config.scorer_settings(),
        &signal,
        local_now,
    );

    println!();
    println!("Engagement calculation stopped.");
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_score(config: &Config, no_append: bool) -> Result<()> {
    let source: CsvLog<ObservationRecord> = CsvLog::new(config.emotion_log_path());
    let now = local_now();
    let settings = config.scorer_settings();

    let outcome = if no_append {
        let mut dry_run: MemoryLog<EngagementScoreSample> = MemoryLog::new();
        run_cycle(&source, &mut dry_run, now, &settings)
    } else {
        let mut sink: CsvLog<EngagementScoreSample> = CsvLog::new(config.engagement_log_path());
        run_cycle(&source, &mut sink, now, &settings)
    };

    match outcome {
        CycleOutcome::Scored(sample) => {
            print_sample(&sample);
            Ok(())
        }
        CycleOutcome::EmptyWindow => {
            println!(
                "No observations in the last {}s; no score produced.",
                config.window.as_secs()
            );
            Ok(())
        }
        CycleOutcome::SourceFailed(e) => Err(e).context("could not read emotion log"),
        CycleOutcome::SinkFailed(sample, e) => {
            print_sample(&sample);
            Err(e).context("could not append to engagement log")
        }
    }
}

fn print_sample(sample: &EngagementScoreSample) {
    println!(
        "{} → Engagement Score: {:.2} ({})",
        format_timestamp(&sample.timestamp),
        sample.score,
        EngagementLevel::from_score(sample.score)
    );
}

fn cmd_report(config: &Config, format: ReportFormat, last: Option<u64>) -> Result<()> {
    let source: CsvLog<ObservationRecord> = CsvLog::new(config.emotion_log_path());
    let scores: CsvLog<EngagementScoreSample> = CsvLog::new(config.engagement_log_path());

    let observations = source.read_all().context("could not read emotion log")?;
    let mut samples = scores.read_all().context("could not read engagement log")?;

    if let Some(minutes) = last {
        let now = local_now();
        let minutes = i64::try_from(minutes).context("--last is too large")?;
        let start = ChronoDuration::try_minutes(minutes)
            .and_then(|span| now.checked_sub_signed(span))
            .context("--last is too large")?;
        samples = samples_between(&samples, start, now);
    }

    let report = SessionReport::build(&observations, &samples);
    match format {
        ReportFormat::Text => println!("{}", report.summary()),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn cmd_init(config: &Config) -> Result<()> {
    config
        .ensure_directories()
        .context("could not create data directory")?;

    let emotions: CsvLog<ObservationRecord> = CsvLog::new(config.emotion_log_path());
    let scores: CsvLog<EngagementScoreSample> = CsvLog::new(config.engagement_log_path());

    for (path, created) in [
        (emotions.path(), emotions.ensure_exists()?),
        (scores.path(), scores.ensure_exists()?),
    ] {
        if created {
            println!("Created {path:?}");
        } else {
            println!("Exists  {path:?}");
        }
    }
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&PathBuf>) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    match path {
        Some(path) => println!("Config file: {path:?}"),
        None => println!("Config file: {:?}", Config::config_path()),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(handle: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        handle.stop();
    })
    .context("Error setting Ctrl+C handler")
}
