use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use timelapsed::{config, daemon, paths, status, telemetry};

#[derive(Parser)]
#[command(name = "timelapsed", version, about = "Unattended timelapse capture daemon")]
struct Cli {
    /// Config file path; defaults to searching the well-known locations.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the capture loop in the foreground (the default).
    Run,
    /// Print the last status snapshot the daemon published.
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            if let Err(e) = daemon::run_daemon(cli.config) {
                tracing::error!("error: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Command::Status => print_status(cli.config),
    }
}

/// Logging must come up before the real config load so that load errors
/// are reported through it. This pre-read is deliberately lenient; the
/// daemon re-reports a broken config as a startup error.
fn init_tracing(cli: &Cli) {
    let logging = cli
        .config
        .clone()
        .or_else(paths::find_config)
        .and_then(|path| config::load(&path).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    telemetry::init(cli.verbose, &logging);
}

fn print_status(config_path: Option<PathBuf>) -> ExitCode {
    let config = match config_path.or_else(paths::find_config) {
        Some(path) => match config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => config::load_defaults(),
    };
    let path = paths::status_path(&config.storage.output_dir);
    match status::read_status(&path) {
        Some(snapshot) => {
            let rendered =
                serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string());
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        None => {
            eprintln!(
                "no status available at {} (is the daemon running?)",
                path.display()
            );
            ExitCode::FAILURE
        }
    }
}
