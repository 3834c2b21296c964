use automa_store::JobStatus;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "automa", version, about = "Run scripts as scheduled one-shot jobs")]
pub struct Cli {
    /// Config file (default: $AUTOMA_CONFIG, then ~/.automa/automa.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scheduler until Ctrl-C, restoring jobs left in `scheduled` state
    Serve,
    /// Manage scripts
    Script {
        #[command(subcommand)]
        action: ScriptCommand,
    },
    /// Manage jobs
    Job {
        #[command(subcommand)]
        action: JobCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScriptCommand {
    /// Register a script
    Add {
        name: String,
        path: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List registered scripts
    List,
    /// Delete a script; jobs that reference it fail when they next run
    Remove { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Create a job and wait for it to finish
    Submit {
        #[arg(long)]
        script_id: Option<i64>,
        /// Run time, RFC 3339 or naive UTC (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Only record the job; the next `serve` picks it up
        #[arg(long)]
        detach: bool,
    },
    /// List jobs
    List {
        #[arg(long)]
        status: Option<JobStatus>,
    },
    /// Show one job
    Show { id: i64 },
    /// Execute a job now, in this process
    Run { id: i64 },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_submit_with_time() {
        let cli = Cli::try_parse_from([
            "automa",
            "job",
            "submit",
            "--script-id",
            "3",
            "--at",
            "2030-01-01T00:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Command::Job {
                action: JobCommand::Submit { script_id, at, detach },
            } => {
                assert_eq!(script_id, Some(3));
                assert_eq!(at.as_deref(), Some("2030-01-01T00:00:00Z"));
                assert!(!detach);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_status_filter() {
        let cli = Cli::try_parse_from(["automa", "job", "list", "--status", "failed"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Job {
                action: JobCommand::List {
                    status: Some(JobStatus::Failed)
                }
            }
        ));
        assert!(Cli::try_parse_from(["automa", "job", "list", "--status", "done"]).is_err());
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["automa", "serve", "--config", "/etc/automa.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/automa.toml"));
    }
}
