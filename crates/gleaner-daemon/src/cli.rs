use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use gleaner_core::SortMode;

#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(about = "Scheduled, resumable collection jobs", long_about = None)]
pub struct Cli {
    /// Path to gleaner.toml (defaults to $GLEANER_CONFIG, then ~/.gleaner/gleaner.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Serve,
    /// Manage jobs
    #[command(subcommand)]
    Job(JobCommand),
    /// Show run history, newest first
    Runs(RunsArgs),
    /// Cron helpers
    #[command(subcommand)]
    Cron(CronCommand),
}

#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Create a job
    Add(JobAddArgs),
    /// List jobs
    List {
        /// Only jobs eligible for automatic triggering
        #[arg(long)]
        active: bool,
    },
    /// Show one job with its recent runs
    Show { id: String },
    /// Stop automatic triggering
    Pause { id: String },
    /// Re-enable automatic triggering
    Resume { id: String },
    /// Delete a job (its history is kept)
    Delete { id: String },
    /// Execute a job now, regardless of schedule or status
    Run { id: String },
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["query", "url"])))]
#[command(group(ArgGroup::new("when").required(true).args(["cron", "at"])))]
pub struct JobAddArgs {
    pub name: String,

    /// Search query; operators for language, age and filters are appended
    #[arg(long)]
    pub query: Option<String>,

    /// Collect from this URL as-is
    #[arg(long)]
    pub url: Option<String>,

    /// Five-field cron expression (weekday 0 = Monday)
    #[arg(long)]
    pub cron: Option<String>,

    /// Local date and time for a one-shot run, e.g. "2026-07-01 09:30"
    #[arg(long)]
    pub at: Option<String>,

    /// IANA timezone for the schedule (defaults to scheduler.default_timezone)
    #[arg(long)]
    pub tz: Option<String>,

    #[arg(long, default_value_t = 3000, conflicts_with = "unbounded")]
    pub max_items: u32,

    /// No count limit
    #[arg(long)]
    pub unbounded: bool,

    /// Only items newer than this many minutes (wins over --max-age-days)
    #[arg(long)]
    pub max_age_minutes: Option<u32>,

    #[arg(long)]
    pub max_age_days: Option<u32>,

    #[arg(long, value_enum, default_value_t = SortArg::Latest)]
    pub sort: SortArg,

    #[arg(long)]
    pub no_reposts: bool,

    #[arg(long)]
    pub no_replies: bool,

    #[arg(long)]
    pub no_quotes: bool,

    /// Language code, e.g. "pt"
    #[arg(long)]
    pub lang: Option<String>,

    /// Notification recipient (repeatable)
    #[arg(long = "notify")]
    pub notify: Vec<String>,

    /// Export format (repeatable)
    #[arg(long = "format", default_value = "json")]
    pub formats: Vec<String>,

    /// Collect and export but never notify
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Latest,
    Top,
}

impl From<SortArg> for SortMode {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Latest => SortMode::Latest,
            SortArg::Top => SortMode::Top,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct RunsArgs {
    /// Only runs of this job
    #[arg(long)]
    pub job: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Subcommand, Debug)]
pub enum CronCommand {
    /// Validate an expression
    Check { expr: String },
    /// List ready-made expressions
    Examples,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn job_add_parses_repeatable_flags() {
        let cli = Cli::try_parse_from([
            "gleaner", "job", "add", "digest", "--query", "rust", "--cron", "0 7 * * *",
            "--notify", "a@x.io", "--notify", "b@x.io", "--format", "json", "--sort", "top",
        ])
        .unwrap();
        let Commands::Job(JobCommand::Add(args)) = cli.command else {
            panic!("expected job add");
        };
        assert_eq!(args.notify, ["a@x.io", "b@x.io"]);
        assert_eq!(args.formats, ["json"]);
        assert_eq!(args.sort, SortArg::Top);
        assert_eq!(args.max_items, 3000);
    }

    #[test]
    fn job_add_requires_target_and_schedule() {
        assert!(Cli::try_parse_from(["gleaner", "job", "add", "x", "--cron", "* * * * *"]).is_err());
        assert!(Cli::try_parse_from(["gleaner", "job", "add", "x", "--query", "q"]).is_err());
        assert!(Cli::try_parse_from([
            "gleaner", "job", "add", "x", "--query", "q", "--url", "https://x.com", "--cron",
            "* * * * *",
        ])
        .is_err());
    }
}
