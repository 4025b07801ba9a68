use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use newsrelay::{Command, Config, RelayApp};

#[derive(Parser)]
#[command(name = "newsrelay")]
#[command(about = "Relay an RSS feed to a Telegram chat with delayed publication")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Store new feed entries for delayed publication
    Detect,
    /// Post stored entries whose publication time has passed
    Publish,
    /// Detect, then publish
    Run,
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Detect => Command::Detect,
            CliCommand::Publish => Command::Publish,
            CliCommand::Run => Command::Run,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = newsrelay::logging::init(&config.export_params) {
        eprintln!("Failed to initialize logging: {e}");
        newsrelay::logging::init_console_only(&config.export_params.log_level);
    }

    let app = match RelayApp::from_config(&config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = Command::from(cli.command);
    let result = app.run(command).await;
    app.reconciler().database().close().await;

    match result {
        Ok(report) => {
            info!("{:?} finished: {:?}", command, report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:?} failed: {}", command, e);
            ExitCode::FAILURE
        }
    }
}
