use anyhow::{Context, Result};
use clap::Parser;
use loadgate_config::{ConfigLoader, LoadgateConfig, LogLevel};
use loadgate_engine::{LoadTest, SchedulerState};
use loadgate_logging::{init_logging_from_config, init_simple_tracing};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::signal;
use tracing::{debug, error, info, warn};

mod cli;
mod summary;
use cli::{Cli, Commands, ConfigCommands};

/// Exit status when the run completed but a threshold failed
const EXIT_THRESHOLDS_FAILED: i32 = 99;

/// Load configuration from file or from defaults plus environment
fn load_config(config_path: Option<&PathBuf>) -> Result<LoadgateConfig> {
    ConfigLoader::new().load(config_path).context(match config_path {
        Some(path) => format!("Failed to load configuration from {:?}", path),
        None => "Failed to load configuration from environment".to_string(),
    })
}

/// Initialize logging from config, honouring a `--log-level` override
fn init_logging(config: &LoadgateConfig, log_level: Option<&str>) -> Result<()> {
    let mut logging = config.logging.clone();
    if let Some(level) = log_level {
        logging.level = LogLevel::from_str(level)
            .map_err(|_| anyhow::anyhow!("Invalid log level: {}", level))?;
    }
    init_logging_from_config(&logging)
}

/// Run the configured load test; returns the verdict
async fn run_command(config: LoadgateConfig, summary_export: Option<&PathBuf>) -> Result<bool> {
    let test = LoadTest::from_config(&config).context("Failed to prepare load test")?;
    info!(
        "Running {} with {} routes against {:?} target",
        test.run_id(),
        config.routes.len(),
        config.target
    );

    let cancel = test.cancellation_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, aborting run");
            cancel.cancel();
        }
    });

    let mut status = test.status();
    tokio::spawn(async move {
        let mut last = SchedulerState::NotStarted;
        while status.changed().await.is_ok() {
            let current = status.borrow().clone();
            if current.state != last {
                debug!(
                    "Scheduler {} at {:?}: {} active, {} retiring, target {}",
                    current.state, current.elapsed, current.active_vus, current.retiring_vus, current.target_vus
                );
                last = current.state;
            }
        }
    });

    let report = test.run().await;
    print!("{}", summary::render(&report));

    if let Some(path) = summary_export {
        write_summary(&report, path)?;
        println!("Summary written to {:?}", path);
    }

    Ok(report.passed)
}

fn write_summary(report: &loadgate_engine::RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create summary directory")?;
    }
    let json = report.to_json_pretty().context("Failed to serialize summary")?;
    fs::write(path, json).context(format!("Failed to write summary to {:?}", path))
}

/// Handle configuration validation
fn handle_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    // Assembling the engine also checks routes and thresholds
    let result = load_config(Some(config_file))
        .and_then(|config| LoadTest::from_config(&config).map_err(anyhow::Error::from));

    match result {
        Ok(test) => {
            println!("✅ Configuration file is valid ({} thresholds)", test.thresholds().len());
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, LoadgateConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("✅ Sample configuration generated at: {:?}", output);
    println!("🔧 Validate with: loadgate validate --config {:?}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Run {
            config,
            summary_export,
        }) => {
            let config = load_config(config.as_ref())?;
            init_logging(&config, cli.log_level.as_deref())?;
            info!("loadgate starting");

            if !run_command(config, summary_export.as_ref()).await? {
                std::process::exit(EXIT_THRESHOLDS_FAILED);
            }
            Ok(())
        }
        Some(Commands::Validate { config }) => {
            init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            handle_validate(config)
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Generate { output, force } => {
                init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
                handle_config_generate(output, *force)
            }
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}
