use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use migrator_engine::DEFAULT_BATCH_SIZE;

/// Top-level CLI parser for the `newsletter-migrator` binary.
#[derive(Debug, Parser)]
#[command(
    name = "newsletter-migrator",
    version,
    about = "Migrate sent newsletter campaigns into Markdown drafts",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for the default `run` command
    #[command(flatten)]
    pub run: RunArgs,

    /// Load environment variables from this file instead of `./.env`
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Migrate the next batch of campaigns (default)
    Run(RunArgs),
    /// List sent campaigns and whether each one was exported
    Pending,
    /// List campaigns recorded in the ledger
    History,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct RunArgs {
    /// Number of new campaigns to migrate in this run
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,
}

impl Cli {
    /// The subcommand to execute; no subcommand means `run`.
    pub fn resolved_command(&self) -> Command {
        match &self.command {
            Some(Command::Run(args)) => Command::Run(*args),
            Some(Command::Pending) => Command::Pending,
            Some(Command::History) => Command::History,
            None => Command::Run(self.run),
        }
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{value}' is not a positive integer")),
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_runs_a_default_batch() {
        let cli = Cli::try_parse_from(["newsletter-migrator"]).expect("cli should parse");
        assert!(matches!(cli.resolved_command(), Command::Run(args) if args.batch_size == 5));
    }

    #[test]
    fn batch_size_is_accepted_with_or_without_run() {
        let top = Cli::try_parse_from(["newsletter-migrator", "--batch-size", "2"]).unwrap();
        assert!(matches!(top.resolved_command(), Command::Run(args) if args.batch_size == 2));

        let sub = Cli::try_parse_from(["newsletter-migrator", "run", "--batch-size", "9"]).unwrap();
        assert!(matches!(sub.resolved_command(), Command::Run(args) if args.batch_size == 9));
    }

    #[test]
    fn batch_size_must_be_positive() {
        assert!(Cli::try_parse_from(["newsletter-migrator", "--batch-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["newsletter-migrator", "run", "--batch-size", "x"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "newsletter-migrator",
            "history",
            "--env-file",
            "prod.env",
            "--verbose",
        ])
        .expect("cli should parse");
        assert!(cli.verbose);
        assert_eq!(cli.env_file.as_deref(), Some(std::path::Path::new("prod.env")));
        assert!(matches!(cli.resolved_command(), Command::History));
    }
}
