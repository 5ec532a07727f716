//! CLI argument parsing definitions

use clap::{Parser, Subcommand, ValueEnum};
use hsm_load_config::{LogLevel, Preset};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ramp virtual users against the service and evaluate thresholds
    Run(RunArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Replace the ramp profile and thresholds with a built-in preset
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<Preset>,

    /// Base URL of the encryption service
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Authorization context sent with every request
    #[arg(long, value_name = "STRING")]
    pub context: Option<String>,

    /// Write the JSON result to this path
    #[arg(long, value_name = "PATH", conflicts_with = "no_summary_json")]
    pub summary_json: Option<PathBuf>,

    /// Do not write a JSON result
    #[arg(long)]
    pub no_summary_json: bool,

    /// Disable colors in the text summary
    #[arg(long)]
    pub no_color: bool,

    /// Seed payload selection and pacing for reproducible runs
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Preset to base the sample on
        #[arg(long, value_name = "PRESET")]
        preset: Option<Preset>,

        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration after presets and environment
    Show {
        /// Preset to apply before showing
        #[arg(long, value_name = "PRESET")]
        preset: Option<Preset>,

        /// Output format
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}
