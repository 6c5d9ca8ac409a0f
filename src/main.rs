use anyhow::Result;
use clap::{Parser, Subcommand};
use repcoach::{
    Credential, ExerciseKind, RepcoachConfig, RepcoachError, RepcoachOrchestrator,
    SessionOptions, SessionOutcome,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "repcoach")]
#[command(about = "Workout session client that counts reps with a remote pose analysis backend")]
#[command(version)]
#[command(long_about = "Repcoach takes snapshots from a capture source, sends them to a pose \
analysis backend, tracks good/bad/uncertain reps against a goal, speaks form feedback and \
stores finished workouts. History, personal bests and CSV export are read from the same backend.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "repcoach.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file, print the effective settings and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append logs to a file in addition to stderr")]
    log_file: Option<PathBuf>,

    /// Bearer token, overrides api.token
    #[arg(long, env = "REPCOACH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a workout session (default)
    Session {
        /// Exercise to track
        #[arg(short, long)]
        exercise: Option<ExerciseKind>,

        /// Number of good reps that ends the session
        #[arg(short, long)]
        goal: Option<u32>,

        /// Replay frames from this directory instead of the configured source
        #[arg(long, value_name = "DIR")]
        frames: Option<String>,

        /// Save the finished workout to the backend, even with zero reps.
        /// Not applied when the session is quit with `q`.
        #[arg(long)]
        save: bool,

        /// Disable keyboard controls and the live display
        #[arg(long)]
        no_keyboard: bool,
    },
    /// Show workout history and progress
    History {
        /// Only this exercise
        #[arg(short, long)]
        exercise: Option<ExerciseKind>,
    },
    /// Show personal bests
    Bests,
    /// Export workout history as CSV
    Export {
        /// Output file, overrides export.csv_path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config();
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting Repcoach v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match RepcoachConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(Command::Session {
        frames: Some(frames),
        ..
    }) = &args.command
    {
        config.capture.source = repcoach::config::CaptureSourceKind::Directory;
        config.capture.frames_path = frames.clone();
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        let effective = toml::to_string_pretty(&config.redacted()).map_err(RepcoachError::from)?;
        println!("✓ Configuration is valid\n");
        println!("{}", effective);
        return Ok(());
    }

    let credential = Credential::from_token(args.token.as_deref());
    let mut orchestrator = RepcoachOrchestrator::new(config.clone(), credential).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    let exit_code = match args.command {
        None => {
            run_session(&mut orchestrator, &config, None, None, false, true).await?
        }
        Some(Command::Session {
            exercise,
            goal,
            save,
            no_keyboard,
            ..
        }) => run_session(&mut orchestrator, &config, exercise, goal, save, !no_keyboard).await?,
        Some(Command::History { exercise }) => {
            let report = orchestrator.history_report(exercise).await?;
            print!("{}", report.render());
            0
        }
        Some(Command::Bests) => {
            let report = orchestrator.bests_report().await?;
            print!("{}", report.render());
            0
        }
        Some(Command::Export { output }) => {
            let (path, rows) = orchestrator.export_history(output.as_deref()).await?;
            println!("✓ Exported {} workouts to {}", rows, path.display());
            0
        }
    };

    info!("Repcoach exited with code: {}", exit_code);

    // process::exit skips destructors; flush the file writer first
    drop(log_guard);
    std::process::exit(exit_code);
}

async fn run_session(
    orchestrator: &mut RepcoachOrchestrator,
    config: &RepcoachConfig,
    exercise: Option<ExerciseKind>,
    goal: Option<u32>,
    save: bool,
    interactive: bool,
) -> Result<i32> {
    let options = SessionOptions {
        exercise: exercise.unwrap_or(config.session.exercise),
        rep_goal: goal.unwrap_or(config.session.rep_goal),
        save,
    };
    orchestrator.set_keyboard_enabled(interactive);

    let outcome = match orchestrator.run_session(options.clone()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Session failed: {}", e);
            eprintln!("✗ {}", e);
            orchestrator.shutdown().await?;
            return Ok(1);
        }
    };

    print_summary(&outcome, &options);

    let mut saved = outcome.saved;
    while !saved && orchestrator.has_unsaved_result().await && confirm_retry().await {
        match orchestrator.retry_save().await {
            Ok(_) => {
                println!("✓ Workout saved");
                saved = true;
            }
            Err(e) => {
                error!("Retrying save failed: {}", e);
                println!("✗ Workout not saved: {}", e);
            }
        }
    }

    let mut exit_code = orchestrator.shutdown().await?;
    if options.save && !saved && !outcome.quit_requested() {
        exit_code = 1;
    }
    Ok(exit_code)
}

/// Ask on the terminal whether to try saving again
async fn confirm_retry() -> bool {
    use std::io::{BufRead, IsTerminal, Write};

    if !std::io::stdin().is_terminal() {
        return false;
    }

    let answer = tokio::task::spawn_blocking(|| {
        print!("Retry saving? [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => matches!(line.trim(), "y" | "Y" | "yes"),
        _ => false,
    }
}

fn print_summary(outcome: &SessionOutcome, options: &SessionOptions) {
    let state = &outcome.state;
    println!();
    println!("{}", state.feedback);
    println!(
        "{}: {}/{} good reps ({} bad, {} uncertain) in {}s, average accuracy {}%",
        state.exercise.label(),
        state.counters.good,
        state.rep_goal,
        state.counters.bad,
        state.counters.uncertain,
        state.duration_seconds(),
        state.average_accuracy()
    );
    if outcome.new_record {
        println!("🏆 New personal best!");
    }
    if options.save {
        if outcome.saved {
            println!("✓ Workout saved");
        } else if !outcome.quit_requested() {
            println!("✗ Workout not saved, see log for details");
        }
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repcoach={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# Repcoach Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every key can also be set through the environment, e.g. REPCOACH__API__TOKEN");
    println!();

    let default_config = r#"[api]
# Base URL of the analysis backend
base_url = "http://localhost:5000"
# Per-request timeout in milliseconds
timeout_ms = 5000
# Bearer token issued by the login provider (or pass --token)
# token = "..."

[session]
# Capture/analyze period in milliseconds
tick_interval_ms = 200
# Default exercise: squat, pushup, bicep_curl, lunge, jumping_jack
exercise = "squat"
# Default rep goal
rep_goal = 10

[capture]
# Capture source: "directory" or "synthetic"
source = "synthetic"
# Frame directory for the directory source (JPEG/PNG, replayed in name order)
frames_path = "./frames"
# Start over from the first frame when the directory runs out
loop_frames = true

[speech]
# Speak feedback aloud through an external TTS program
enabled = false
command = "espeak"
args = []

[export]
# IANA timezone for dates in history and CSV export
timezone = "UTC"
# Default CSV output path
csv_path = "workout_progress.csv"

[system]
# Event bus capacity
event_bus_capacity = 100
"#;

    println!("{}", default_config);
}
