use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use stagewatch::cli::{Cli, Command};
use stagewatch::commands::{self, Context};
use stagewatch::config::Config;
use stagewatch::scheduler::{Clock as _, SystemClock};
use stagewatch::{logging, service};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        logging::VERBOSE_FILTER
    } else {
        logging::DEFAULT_FILTER
    };
    logging::init(filter).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let mut config = Config::from_env().context("load config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.sheets_dir {
        config.sheets_dir = dir;
    }

    match cli.command {
        Command::Run(args) => service::run(&config, args).await.context("run"),
        Command::Check(args) => service::check(&config, args).await.context("check"),
        command => {
            let ctx = Context {
                aggregator: config.aggregator(),
                today: config.gate.civil_date(SystemClock.now_utc()),
                lookahead: config.lookahead,
            };
            let output = commands::execute(&ctx, command).await?;
            println!("{output}");
            Ok(())
        }
    }
}
