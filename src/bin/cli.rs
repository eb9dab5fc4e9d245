//! Upgrade Watch CLI
//!
//! Watches booked flights for upgrade inventory and sends an alert when the
//! target fare class opens up.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use upgrade_watch::{
    error::Result,
    models::{Config, NotifierConfig},
    pipeline::{Pipeline, Scheduler, SchedulerExit},
    services::{
        FareClassifier, FlightSource, HttpFlightSource, Notifier, ReplayFlightSource, notifier,
    },
    storage::{JobStore, LocalStorage, ResultStorage},
};

/// Exit code for an interrupted run (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

/// Upgrade Watch - flight upgrade availability watcher
#[derive(Parser, Debug)]
#[command(
    name = "upgrade-watch",
    version,
    about = "Watches booked flights for upgrade seat availability",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Arguments for `run`, which is the default command
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the configured jobs until all are completed (default)
    Run(RunArgs),

    /// Validate the configuration file
    Validate,

    /// Show the jobs recorded in a snapshot
    Info {
        /// Snapshot to show (default: newest in the output directory)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Classify booking codes against the configured upgrade classes
    Classify {
        /// Booking codes such as PZ4 or RN0
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Replay a saved results file instead of searching live
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Minutes between passes
    #[arg(long)]
    interval: Option<u64>,

    /// Directory receiving result snapshots
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    #[command(flatten)]
    twilio: TwilioArgs,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(minutes) = self.interval {
            config.schedule.interval_minutes = minutes;
        }
        if let Some(dir) = self.output_dir {
            config.storage.output_dir = dir;
        }
        if self.replay.is_some() {
            config.storage.replay_file = self.replay;
        }
        self.twilio.apply(&mut config.notifier);
    }
}

/// SMS credentials, usually supplied through the environment.
#[derive(Args, Debug, Default)]
struct TwilioArgs {
    #[arg(long, env = "TWILIO_ACCOUNT_SID", hide_env_values = true)]
    account_sid: Option<String>,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Sender number
    #[arg(long, env = "TWILIO_FROM_NUMBER")]
    from_number: Option<String>,

    /// Recipient for jobs without their own address
    #[arg(long, env = "TWILIO_TO_NUMBER")]
    to_number: Option<String>,

    /// Receives a copy of every alert
    #[arg(long, env = "TWILIO_OWNER_NUMBER")]
    owner_number: Option<String>,
}

impl TwilioArgs {
    fn apply(self, config: &mut NotifierConfig) {
        let overrides = [
            (self.account_sid, &mut config.account_sid),
            (self.auth_token, &mut config.auth_token),
            (self.from_number, &mut config.from_number),
            (self.to_number, &mut config.default_recipient),
            (self.owner_number, &mut config.owner_recipient),
        ];
        for (value, slot) in overrides {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

/// Initialize logging; `RUST_LOG` wins over the given level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli {
        config: config_path,
        verbose,
        command,
        run,
    } = Cli::parse();

    // Logging is configured from the file, so load it before initializing
    let loaded = Config::load(&config_path);
    let level = match (&loaded, verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    let command = command.unwrap_or(Command::Run(run));
    let config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) if matches!(command, Command::Validate) => {
            log::error!("Config load failed from {}: {}", config_path.display(), e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            Config::default()
        }
    };

    match command {
        Command::Run(args) => run_watch(config, args).await,
        Command::Validate => Ok(validate(&config)),
        Command::Info { snapshot } => info(&config, snapshot.as_deref()).await,
        Command::Classify { codes } => classify(&config, &codes),
    }
}

async fn run_watch(mut config: Config, args: RunArgs) -> Result<ExitCode> {
    let once = args.once;
    args.apply(&mut config);
    config.validate()?;

    let storage = Arc::new(LocalStorage::new(&config.storage.output_dir));
    let mut store = JobStore::new(config.build_jobs(), storage)?;

    let source: Arc<dyn FlightSource> = match config.storage.replay_file.clone() {
        Some(path) => match store.load(&path).await {
            Ok(results) => {
                let replay = ReplayFlightSource::from_results(&results);
                log::info!(
                    "Replaying {} recorded routes from {}",
                    replay.route_count(),
                    path.display()
                );
                Arc::new(replay)
            }
            Err(e) => {
                log::warn!(
                    "Could not load saved results from {}: {}. Searching live.",
                    path.display(),
                    e
                );
                Arc::new(HttpFlightSource::new(config.source.clone())?)
            }
        },
        None => Arc::new(HttpFlightSource::new(config.source.clone())?),
    };

    let notifier: Arc<dyn Notifier> = Arc::from(notifier::from_config(&config.notifier)?);
    if !config.notifier.enabled {
        log::info!("SMS notifications disabled, alerts will only be logged");
    }

    let pipeline = Pipeline::from_config(&config, source, notifier)?;
    log::info!(
        "Watching {} jobs ({} pending)",
        store.len(),
        store.pending_count()
    );

    if once {
        let report = pipeline.run_pass(&mut store).await?;
        log::info!(
            "Pass complete: {} results, {} upgrades, {} pending",
            report.results.len(),
            report.evaluation.upgrades.len(),
            store.pending_count()
        );
        if let Some(snapshot) = &report.snapshot {
            log::info!(
                "Snapshot {} saved at {}",
                snapshot.location.display(),
                snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let scheduler = Scheduler::new(pipeline, config.schedule.interval());
    match scheduler.run(&mut store, shutdown_signal()).await {
        SchedulerExit::AllCompleted => Ok(ExitCode::SUCCESS),
        SchedulerExit::Shutdown => Ok(ExitCode::from(EXIT_INTERRUPTED)),
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn validate(config: &Config) -> ExitCode {
    log::info!("Validating configuration...");

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return ExitCode::FAILURE;
    }

    log::info!(
        "✓ Schedule: every {} min, search timeout {}s",
        config.schedule.interval_minutes,
        config.source.timeout_secs
    );
    log::info!(
        "✓ Upgrade classes: {}",
        config.classifier.upgrade_classes.join(", ")
    );
    log::info!(
        "✓ Notifications: {}",
        if config.notifier.enabled {
            "SMS"
        } else {
            "log only"
        }
    );
    for (index, job) in config.build_jobs().iter().enumerate() {
        log::info!(
            "✓ Job #{}: {} -> {} ({})",
            index + 1,
            job.itinerary,
            job.itinerary.target_class,
            job.id
        );
    }

    log::info!("All validations passed!");
    ExitCode::SUCCESS
}

async fn info(config: &Config, snapshot: Option<&Path>) -> Result<ExitCode> {
    let storage = LocalStorage::new(&config.storage.output_dir);
    log::info!("Output directory: {}", storage.root_dir().display());

    let location = match snapshot {
        Some(path) => path.to_path_buf(),
        None => match storage.latest_snapshot().await? {
            Some(path) => path,
            None => {
                log::info!("No snapshot found yet.");
                return Ok(ExitCode::SUCCESS);
            }
        },
    };

    let data = storage.read_snapshot(&location).await?;
    let jobs = data.restored_jobs();
    log::info!(
        "Snapshot: {} written {} ({} jobs, {} results)",
        location.display(),
        data.created_at.format("%Y-%m-%d %H:%M UTC"),
        jobs.len(),
        data.results.len()
    );

    for (index, job) in jobs.iter().enumerate() {
        let state = match job.completed_at {
            Some(at) => format!("completed {}", at.format("%Y-%m-%d %H:%M UTC")),
            None if job.completed => "completed".to_string(),
            None => "pending".to_string(),
        };
        let result = data.results.iter().find(|r| r.job.id == job.id);
        let outcome = match result.map(|r| (&r.flight, &r.error)) {
            Some((_, Some(failure))) => failure.to_string(),
            Some((Some(flight), None)) => format!(
                "found, {} booking codes",
                flight.booking_class_avail_list.len()
            ),
            Some((None, None)) => "no outcome".to_string(),
            None => "not searched in this pass".to_string(),
        };
        println!(
            "#{:<3} {}  {}  [{}]  {}",
            index + 1,
            job.itinerary,
            job.itinerary.target_class,
            state,
            outcome
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn classify(config: &Config, codes: &[String]) -> Result<ExitCode> {
    let classifier = FareClassifier::from_config(&config.classifier)?;
    let matches = classifier.classify_codes(codes);

    if matches.is_empty() {
        println!(
            "No upgrade availability (watching {})",
            classifier.classes().join(", ")
        );
        return Ok(ExitCode::SUCCESS);
    }
    for upgrade in matches {
        println!("{}: {} seat(s)", upgrade.fare_class, upgrade.quantity);
    }
    Ok(ExitCode::SUCCESS)
}
