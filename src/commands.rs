//! CLI command definitions
//!
//! Defines the clap commands for the linetrace CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Trace every test whose title matches a name or /regex/
    #[command(alias = "p")]
    Pattern {
        /// Test script to run
        script: PathBuf,

        /// Test title, or /regex/ to match several
        pattern: String,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Trace the test enclosing a line
    #[command(alias = "l")]
    Line {
        /// Test script to run
        script: PathBuf,

        /// 1-based line inside (or on) the test
        line: usize,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the breakpoint lines a trace would use, without running anything
    Extract {
        /// Test script to read
        script: PathBuf,

        /// Test title, or /regex/ to match several
        #[arg(long, conflicts_with = "line", required_unless_present = "line")]
        pattern: Option<String>,

        /// 1-based line inside (or on) the test
        #[arg(long)]
        line: Option<usize>,

        #[command(flatten)]
        input: InputArgs,
    },
}

/// How the script and its tests are read
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Test registration function, or /regex/ (default from config, normally `it`)
    #[arg(long)]
    pub func: Option<String>,

    /// Read the script's current contents from stdin instead of the file
    #[arg(long)]
    pub stdin: bool,
}
