//! CLI command handling
//!
//! Runs a command and prints its result as JSON on stdout.

use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::commands::{Commands, InputArgs};
use crate::common::config::Config;
use crate::common::error::ErrorReport;
use crate::common::{Error, Result};
use crate::extract::{Matcher, Selection};
use crate::orchestrator::Orchestrator;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    let orchestrator = Orchestrator::new(config);

    match command {
        Commands::Pattern {
            script,
            pattern,
            input,
        } => {
            let func = func_matcher(&input, orchestrator.config())?;
            let test = Matcher::parse(&pattern)?;
            let buffer = read_buffer(&input).await?;

            let trace = orchestrator
                .run_by_pattern(&script, buffer.as_deref(), &func, &test)
                .await?;
            print_json(&trace)
        }

        Commands::Line {
            script,
            line,
            input,
        } => {
            let func = func_matcher(&input, orchestrator.config())?;
            let buffer = read_buffer(&input).await?;

            let trace = orchestrator
                .run_by_line(&script, buffer.as_deref(), &func, line)
                .await?;
            print_json(&trace)
        }

        Commands::Extract {
            script,
            pattern,
            line,
            input,
        } => {
            let func = func_matcher(&input, orchestrator.config())?;
            let selection = match (pattern, line) {
                (_, Some(line)) => Selection::Line(line),
                (Some(pattern), None) => Selection::Matching(Matcher::parse(&pattern)?),
                (None, None) => {
                    return Err(Error::Internal("either --pattern or --line is required".to_string()))
                }
            };
            let buffer = read_buffer(&input).await?;

            let result = orchestrator.extract(&script, buffer.as_deref(), &func, &selection)?;
            print_json(&result)
        }
    }
}

/// Print a failure the way results are printed, so callers parse one format
pub fn print_error(error: &Error) {
    let report = ErrorReport::from(error);
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(_) => println!("{{\"code\":\"{}\",\"message\":{:?}}}", report.code, report.message),
    }
}

fn func_matcher(input: &InputArgs, config: &Config) -> Result<Matcher> {
    match &input.func {
        Some(func) => Matcher::parse(func),
        None => Matcher::parse(&config.defaults.function),
    }
}

async fn read_buffer(input: &InputArgs) -> Result<Option<String>> {
    if !input.stdin {
        return Ok(None);
    }
    let mut buffer = String::new();
    tokio::io::stdin().read_to_string(&mut buffer).await?;
    Ok(Some(buffer))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
