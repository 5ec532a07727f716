use anyhow::{Context, Result};
use clap::Parser;
use hsm_load_config::{ConfigLoader, HsmLoadConfig, Preset};
use hsm_load_core::TestResult;
use hsm_load_logging::init_logging;
use hsm_load_runtime::{LoadTest, ShutdownCoordinator};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

mod cli;
mod summary;

use cli::{Cli, Commands, ConfigCommands, OutputFormat, RunArgs};
use summary::TextSummary;

/// Load configuration from file or the environment
fn load_config(config_path: Option<&PathBuf>, preset: Option<Preset>) -> Result<HsmLoadConfig> {
    let loader = ConfigLoader::new().preset(preset);

    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_run_overrides(config: &mut HsmLoadConfig, args: &RunArgs) -> Result<()> {
    if let Some(base_url) = &args.base_url {
        config.target.base_url = base_url.clone();
    }
    if let Some(context) = &args.context {
        config.target.context = context.clone();
    }
    if let Some(path) = &args.summary_json {
        config.output.summary_json = Some(path.clone());
    }
    if args.no_summary_json {
        config.output.summary_json = None;
    }
    if args.no_color {
        config.output.colors = false;
    }

    config
        .validate_all()
        .context("Invalid command-line override")?;
    Ok(())
}

async fn run_command(mut config: HsmLoadConfig, args: &RunArgs) -> Result<ExitCode> {
    apply_run_overrides(&mut config, args)?;

    let mut test = LoadTest::from_config(&config).context("Failed to set up load test")?;
    if let Some(seed) = args.seed {
        test = test.with_seed(seed);
    }

    info!(
        "Load testing {} with context {:?}",
        config.target.base_url, config.target.context
    );

    let shutdown = ShutdownCoordinator::new();
    let ctrl_c = shutdown.listen_for_ctrl_c();
    let result = test.run(&shutdown).await;
    ctrl_c.abort();

    if report_result(&result, &config) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Print and persist the result, returning whether every threshold passed
///
/// Output problems are logged; only the verdict decides the exit code.
fn report_result(result: &TestResult, config: &HsmLoadConfig) -> bool {
    if config.output.text_summary {
        println!("{}", TextSummary::new(result, config.output.colors));
    }

    if let Some(path) = &config.output.summary_json {
        match summary::write_json(result, path) {
            Ok(()) => info!("Results written to {:?}", path),
            Err(e) => error!("Could not write JSON summary: {:#}", e),
        }
    }

    if !result.passed() {
        let failed = result.verdict.failures().count();
        warn!("{} of {} thresholds failed", failed, result.verdict.outcomes.len());
    }
    result.passed()
}

/// Handle configuration validation
fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    let config = load_config(Some(&config_file.to_path_buf()), None)?;
    let profile = config.scenario.ramp_profile()?;
    let thresholds = config.thresholds.threshold_set()?;
    println!("✅ Configuration file is valid");
    println!(
        "   {} stages over {:?}, peak {} users, {} thresholds",
        profile.stages().len(),
        profile.total_duration(),
        profile.peak(),
        thresholds.len()
    );
    Ok(())
}

/// Handle configuration generation
fn handle_config_generate(preset: Option<Preset>, output: &Path, force: bool) -> Result<()> {
    info!("Generating configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    let content = match preset {
        Some(preset) => {
            let mut config = HsmLoadConfig::default();
            preset.apply(&mut config);
            serde_yaml::to_string(&config).context("Failed to serialize configuration")?
        }
        None => HsmLoadConfig::generate_sample(),
    };

    fs::write(output, content).context("Failed to write configuration file")?;

    println!("✅ Configuration generated at: {:?}", output);
    println!(
        "🔧 Validate with: hsm-load config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Handle configuration display
fn handle_config_show(
    config_file: Option<&PathBuf>,
    preset: Option<Preset>,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_file, preset)?;

    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(&config).context("Failed to serialize to YAML")?,
        OutputFormat::Json => {
            serde_json::to_string_pretty(&config).context("Failed to serialize to JSON")?
        }
    };
    println!("{}", rendered);
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_ref(), args.preset)?;
            init_logging(&config.logging, cli.log_level)?;
            info!("hsm-load {} starting", env!("CARGO_PKG_VERSION"));
            run_command(config, args).await
        }
        Commands::Config { config_cmd } => {
            hsm_load_logging::init_simple_tracing(cli.log_level)?;
            match config_cmd {
                ConfigCommands::Validate { config_file } => handle_config_validate(config_file)?,
                ConfigCommands::Generate {
                    preset,
                    output,
                    force,
                } => handle_config_generate(*preset, output, *force)?,
                ConfigCommands::Show { preset, format } => {
                    handle_config_show(cli.config.as_ref(), *preset, *format)?
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
