use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use migrator_logging::{migrator_error, migrator_info};

mod cli;
mod commands;
mod config;

use cli::{Cli, Command};
use config::{MigratorConfig, StoragePaths};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            migrator_error!("{:#}", error);
            eprintln!("newsletter-migrator: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    load_dotenv(&cli)?;

    let paths = StoragePaths::from_lookup(&|key: &str| std::env::var(key).ok());
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    migrator_logging::initialize(level, Some(paths.log_dir.as_path()));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.resolved_command() {
        Command::Run(args) => {
            let config = MigratorConfig::from_env()?;
            migrator_info!("Starting batch of up to {} campaigns", args.batch_size);
            runtime.block_on(commands::run(&config, args))
        }
        Command::Pending => {
            let config = MigratorConfig::from_env()?;
            runtime.block_on(commands::pending(&config))
        }
        Command::History => commands::history(&paths),
    }
}

fn load_dotenv(cli: &Cli) -> anyhow::Result<()> {
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}
