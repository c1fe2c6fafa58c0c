//! CLI command definitions and handlers

mod analyze;
mod init;
mod predict;
mod train;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{load_config_file, load_project_config, ProjectConfig};

/// Parse and validate a probability threshold (0.0-1.0)
fn parse_threshold(s: &str) -> Result<f64, String> {
    let t: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if (0.0..=1.0).contains(&t) {
        Ok(t)
    } else {
        Err("threshold must be between 0 and 1".to_string())
    }
}

/// SafeRefactor - learned-risk refactoring for Python
#[derive(Parser, Debug)]
#[command(name = "saferefactor")]
#[command(
    version,
    about = "Detect mechanically-improvable Python patterns, propose rewrites, and gate them with a learned regression-risk model",
    after_help = "\
Examples:
  saferefactor analyze src/                     Report rewrite candidates
  saferefactor analyze src/ --diff              Show accepted rewrites as a patch
  saferefactor analyze src/ --apply             Apply accepted rewrites in place
  saferefactor train --data examples.jsonl      Train the risk model
  saferefactor predict --before a.py --after b.py
  saferefactor init                             Write an example saferefactor.toml"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Config file (default: saferefactor.toml in the analysed directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective log filter directive.
    pub fn log_filter(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.clone()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find patterns, propose rewrites and gate them with the risk model
    #[command(after_help = "\
Without a trained model candidates are reported but never applied.

Examples:
  saferefactor analyze .                         Analyze current directory
  saferefactor analyze app.py --format json      JSON output for scripting
  saferefactor analyze . --threshold 0.1         Stricter gating
  saferefactor analyze . --output refactored/    Write every file, rewritten or not, to a directory")]
    Analyze {
        /// File or directory to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Write every analysed file (refactored or original) under this directory
        #[arg(long, short = 'o', conflicts_with = "apply")]
        output: Option<PathBuf>,

        /// Rewrite files in place with the accepted candidates
        #[arg(long)]
        apply: bool,

        /// Print accepted rewrites as a unified diff (text format only)
        #[arg(long)]
        diff: bool,

        /// Model file (default: from config, then the per-user data directory)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Accept when predicted error probability is at or below this
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,

        /// Report candidates without loading a model
        #[arg(long, conflicts_with = "model")]
        no_gate: bool,
    },

    /// Train the risk model from labeled before/after examples
    Train {
        /// JSON Lines or .csv dataset (default: per-user training_data.jsonl)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Where to save the model (default: from config, then the per-user data directory)
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// Random seed for splitting, cross-validation and forest growth
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the predicted error probability for one before/after pair
    Predict {
        /// File holding the original snippet
        #[arg(long)]
        before: PathBuf,

        /// File holding the rewritten snippet
        #[arg(long)]
        after: PathBuf,

        /// Model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Threshold used to print the accept/reject verdict
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
    },

    /// Write an example saferefactor.toml
    Init {
        /// Directory to write into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// `--config` when given, otherwise saferefactor.toml under `root`.
fn resolve_config(explicit: Option<&Path>, root: &Path) -> ProjectConfig {
    match explicit {
        Some(path) => load_config_file(path),
        None => load_project_config(root),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Analyze {
            ref path,
            ref format,
            ref output,
            apply,
            diff,
            ref model,
            threshold,
            no_gate,
        } => analyze::run(analyze::AnalyzeArgs {
            path,
            config: config_path,
            format: format.parse()?,
            output: output.as_deref(),
            apply,
            diff,
            model: model.as_deref(),
            threshold,
            no_gate,
        }),

        Commands::Train {
            ref data,
            ref model_out,
            seed,
        } => train::run(
            config_path,
            data.as_deref(),
            model_out.as_deref(),
            seed,
        ),

        Commands::Predict {
            ref before,
            ref after,
            ref model,
            threshold,
        } => predict::run(config_path, before, after, model.as_deref(), threshold),

        Commands::Init { ref path, force } => init::run(path, force),
    }
}
