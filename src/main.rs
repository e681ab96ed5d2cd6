//! Synheart Sleep Agent CLI
//!
//! REM-cued stimulus and day-mode reality checks.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synheart_sleep_agent::{
    collector::{spawn_replay, spawn_simulator, ChannelSensor},
    config::Config,
    core::Mode,
    host::{ConsoleUi, LogActuator},
    runtime::{Collaborators, Monitor},
    storage::{
        format_series, list_batches, load_series, prune_batches, JsonFileSink, SeriesKind,
        SERIES_PER_LINE,
    },
    transparency::{create_shared_log_with_persistence, TransparencyLog},
    DISCLAIMER, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-sleep")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "REM-cued stimulus and reality checks for lucid-dream training", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring
    Start {
        /// Feed synthetic readings instead of a wearable
        #[arg(long, conflicts_with = "replay")]
        simulate: bool,

        /// Seed for simulated readings and reality-check draws
        #[arg(long)]
        seed: Option<u64>,

        /// Replay a JSON-lines recording
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Force a mode regardless of the clock
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Show cumulative statistics
    Status,

    /// Show configuration
    Config,

    /// List stored measure files
    List {
        /// Night to list, as D_M_YYYY (e.g. 19_11_2020)
        #[arg(long)]
        date: Option<String>,

        /// Series to list (hr_avg, hr_var or acc_var)
        #[arg(long)]
        series: Option<String>,
    },

    /// Print a stored series
    Show {
        /// Measure file to print
        file: PathBuf,
    },

    /// Delete the stored measures of one night
    Prune {
        /// Night to delete, as D_M_YYYY
        #[arg(long)]
        date: String,
    },

    /// Display the usage notice
    Disclaimer,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Day,
    Night,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Day => Mode::Day,
            ModeArg::Night => Mode::Night,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            simulate,
            seed,
            replay,
            mode,
        } => cmd_start(simulate, seed, replay, mode),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
        Commands::List { date, series } => cmd_list(date, series),
        Commands::Show { file } => cmd_show(&file),
        Commands::Prune { date } => cmd_prune(&date),
        Commands::Disclaimer => {
            println!("{DISCLAIMER}");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_start(
    simulate: bool,
    seed: Option<u64>,
    replay: Option<PathBuf>,
    mode: Option<ModeArg>,
) -> anyhow::Result<()> {
    println!("Synheart Sleep Agent v{VERSION}");
    println!();

    let mut config = Config::load().context("loading configuration")?;
    if let Some(mode) = mode {
        config.mode_override = Some(mode.into());
    }
    config.validate().context("invalid configuration")?;
    config
        .ensure_directories()
        .context("creating data directories")?;

    let (mut producer, receiver) = match (simulate, replay) {
        (true, _) => spawn_simulator(config.timers.record, seed.unwrap_or(0)),
        (false, Some(path)) => spawn_replay(&path, config.timers.record)
            .with_context(|| format!("loading recording {}", path.display()))?,
        (false, None) => bail!(
            "no sensor source: pass --simulate or --replay <FILE> \
             (wearable drivers feed the library API directly)"
        ),
    };

    println!("Starting monitor...");
    println!("  Timezone: {}", config.timezone);
    println!(
        "  Day mode: {}:00 - {}:00",
        config.schedule.day_start_hour, config.schedule.night_start_hour
    );
    println!(
        "  Window: {} samples every {}s",
        config.window_size,
        config.timers.record.as_secs()
    );
    println!("  Measures: {:?}", config.measures_path());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let log = create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let io = Collaborators {
        sensor: Box::new(ChannelSensor::new(receiver)),
        sink: Box::new(JsonFileSink::new(config.measures_path())),
        actuator: Box::new(LogActuator::default()),
        ui: Box::new(ConsoleUi::default()),
        log: log.clone(),
    };
    let mut monitor = Monitor::new(&config, io, seed, Utc::now())?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl+C handler")?;

    // One cooperative thread for every timer.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(monitor.run(running));

    producer.stop();

    println!();
    println!("{}", log.summary());
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Synheart Sleep Agent Status");
    println!("===========================");
    println!();
    println!("Configuration:");
    println!("  Timezone: {}", config.timezone);
    println!(
        "  Day mode: {}:00 - {}:00",
        config.schedule.day_start_hour, config.schedule.night_start_hour
    );
    if let Some(mode) = config.mode_override {
        println!("  Mode override: {mode}");
    }
    println!(
        "  Thresholds: avg HR >= {}, HR variance <= {}, accel variance <= {}",
        config.thresholds.avg_heart_rate,
        config.thresholds.hr_variance,
        config.thresholds.accel_variance
    );
    println!(
        "  Night vibrations at most every {} min",
        config.vibration_interval.as_secs() / 60
    );
    match config.validate() {
        Ok(()) => println!("  Valid: yes"),
        Err(e) => println!("  Valid: no ({e})"),
    }
    println!();

    let stats_path = config.data_path.join("transparency.json");
    match TransparencyLog::open_persisted(stats_path.clone())
        .with_context(|| format!("reading {}", stats_path.display()))?
    {
        Some(log) => {
            let stats = log.stats();
            println!("Cumulative Statistics:");
            println!("  Samples recorded: {}", stats.samples_recorded);
            println!("  Ticks skipped: {}", stats.ticks_skipped);
            println!("  Windows emitted: {}", stats.windows_emitted);
            println!("  Batches stored: {}", stats.batches_flushed);
            println!("  Storage failures: {}", stats.flush_failures);
            println!("  Night vibrations: {}", stats.night_stimuli);
            println!("  Reality checks: {}", stats.day_stimuli);
        }
        None => println!("No previous session data found."),
    }

    let stored = list_batches(&config.measures_path(), None, None)?;
    println!();
    println!("Stored measure files: {}", stored.len());
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_list(date: Option<String>, series: Option<String>) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let suffix = match series.as_deref() {
        Some(name) => match SeriesKind::from_short(name) {
            Some(kind) => Some(kind.suffix()),
            None => bail!("unknown series '{name}' (expected hr_avg, hr_var or acc_var)"),
        },
        None => None,
    };

    let dir = config.measures_path();
    let files = list_batches(&dir, date.as_deref(), suffix)?;
    if files.is_empty() {
        println!("No measures found in {dir:?}");
        return Ok(());
    }

    for file in &files {
        if let Some(name) = file.file_name() {
            println!("{}", name.to_string_lossy());
        }
    }
    println!();
    println!("{} file(s)", files.len());
    Ok(())
}

fn cmd_show(file: &Path) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    // Bare names are looked up in the measures directory.
    let path = if file.exists() {
        file.to_path_buf()
    } else {
        config.measures_path().join(file)
    };

    let series = load_series(&path).with_context(|| format!("reading {}", path.display()))?;
    println!("{} ({} values)", path.display(), series.len());
    for line in format_series(&series, SERIES_PER_LINE) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_prune(date: &str) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let removed = prune_batches(&config.measures_path(), date)?;
    println!("Removed {} file(s) for {date}", removed.len());
    Ok(())
}
