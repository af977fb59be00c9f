use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory of the local JSON stores (overrides `STAGEWATCH_DATA_DIR`).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory of the `<series>.csv` sheets (overrides `STAGEWATCH_SHEETS_DIR`).
    #[arg(long, global = true)]
    pub sheets_dir: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the twice-daily scheduler until interrupted.
    Run(RunArgs),
    /// Build and deliver one status batch now.
    Check(CheckArgs),
    Status {
        #[command(subcommand)]
        command: StatusCommand,
    },
    /// Leave a series out of every status query.
    Pause(SeriesArgs),
    Unpause(SeriesArgs),
    /// Mark a series as managed alone; it is left out like a paused one.
    Solo(SeriesArgs),
    Unsolo(SeriesArgs),
    /// List paused and solo series.
    Exclusions,
    Calendar {
        #[command(subcommand)]
        command: CalendarCommand,
    },
    Deadline {
        #[command(subcommand)]
        command: DeadlineCommand,
    },
    Alias {
        #[command(subcommand)]
        command: AliasCommand,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Print batches to stdout instead of delivering them.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Print the batch to stdout instead of delivering it.
    #[arg(long)]
    pub dry_run: bool,

    /// Append the weekly summary.
    #[arg(long)]
    pub weekly: bool,

    /// Report as of this date (YYYY-MM-DD or DD/MM/YYYY; default: today).
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    /// Series name or alias.
    pub series: String,
}

#[derive(Debug, Args)]
pub struct DateArgs {
    /// YYYY-MM-DD or DD/MM/YYYY (default: today).
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Args)]
pub struct LookaheadArgs {
    /// Days ahead of today (default: configured lookahead).
    #[arg(long)]
    pub days: Option<u64>,

    #[command(flatten)]
    pub from: DateArgs,
}

#[derive(Debug, Subcommand)]
pub enum StatusCommand {
    /// Series whose blocking chapter has no RAW yet.
    RawPending,
    /// RAW gaps of the series publishing N days from now.
    RawLookahead(LookaheadArgs),
    /// Missing assignees of the series publishing N days from now.
    Assignments(LookaheadArgs),
    /// First chapter that only needs publishing.
    Ready,
    /// Blocking chapter and stage flags of one series.
    Series(SeriesArgs),
    /// Weekly summary counts.
    Summary(DateArgs),
}

#[derive(Debug, Subcommand)]
pub enum CalendarCommand {
    /// Replace the publishing rule of a series.
    Set {
        /// Series name or alias.
        series: String,
        /// Weekdays (`monday`, `sat`, `miércoles`) or days of month (`4 14 24`).
        #[arg(required = true, num_args = 1..)]
        days: Vec<String>,
    },
    Remove(SeriesArgs),
    List,
    /// Series publishing on a date.
    On(DateArgs),
}

#[derive(Debug, Subcommand)]
pub enum DeadlineCommand {
    Set {
        /// Series name or alias.
        series: String,
        chapter: String,
        person: String,
        /// YYYY-MM-DD or DD/MM/YYYY.
        due: String,
    },
    Remove {
        /// Series name or alias.
        series: String,
        chapter: String,
    },
    List,
    /// Deadlines already past.
    Overdue(DateArgs),
}

#[derive(Debug, Subcommand)]
pub enum AliasCommand {
    Add { short: String, canonical: String },
    Remove { short: String },
    List,
    Resolve { name: String },
}
