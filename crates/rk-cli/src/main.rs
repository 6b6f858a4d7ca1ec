use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rk_config::Configuration;
use rk_core::drivers::{SimMotorDriver, SimSonarDriver};
use rk_runtime::lifecycle::Reactor;
use rk_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "robotctl", about = "Robot coordination kernel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap and run the coordination kernel until a TerminateRequest
    /// (or SIGINT/SIGTERM) stops it.
    Run {
        /// Path to the robot.toml configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config_path = config
                .canonicalize()
                .with_context(|| format!("config path '{}'", config.display()))?;
            let conf = Configuration::load(&config_path)?;
            let base_dir = config_path.parent().expect("config path must have a parent directory");

            let _guard = init_tracing(&conf, base_dir)?;

            let reactor = Reactor::bootstrap(&conf, SimMotorDriver::new(), SimSonarDriver::new(1.0))?;

            let flag = reactor.shutdown_flag();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::Relaxed);
            })
            .context("failed to install SIGINT/SIGTERM handler")?;

            reactor.run();
        }
    }

    Ok(())
}
