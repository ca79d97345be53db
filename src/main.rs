//! linetrace - line-level execution traces of JavaScript tests
//!
//! Runs selected mocha tests under the V8 inspector and prints, for every
//! line of the selected test bodies, the variables, exceptions and console
//! output it produced.

use std::path::PathBuf;

use clap::Parser;
use linetrace::commands::Commands;
use linetrace::common::{config::Config, logging};
use linetrace::{cli, Result};

#[derive(Parser)]
#[command(name = "linetrace", about = "Line-level execution tracer for mocha tests")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => {
            let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
            if let Some(path) = logging::init_cli(cli.verbose, log_file.as_deref()) {
                tracing::debug!(path = %path.display(), "Logging to file");
            }
            cli::dispatch(cli.command, config).await
        }
        Err(e) => {
            logging::init_cli(cli.verbose, None);
            Err(e)
        }
    };

    if let Err(e) = result {
        tracing::debug!(code = e.code(), "Command failed: {}", e);
        cli::print_error(&e);
        std::process::exit(1);
    }
}
