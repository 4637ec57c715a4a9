use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::{Commands, CommonArgs};
use planforge::config::Config;
use planforge::stages::{
    DomainStage, EvolveStage, InterfaceStage, ProblemsStage, StageSummary,
};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planforge")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("planforge.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Apply CLI overrides shared by every stage onto the loaded config.
fn merge_common(config: &mut Config, common: &CommonArgs) {
    if let Some(model) = &common.model {
        config.llm.model = model.clone();
    }
    if let Some(workers) = common.workers {
        config.pool.workers = workers;
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<StageSummary> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let mut config = config.clone();
    let summary = match &cli.command {
        Commands::Evolve {
            common,
            context_path,
            prompt_file,
            example_num,
        } => {
            merge_common(&mut config, common);
            let stage = EvolveStage {
                data_path: common.data_path.clone(),
                context_path: context_path.clone(),
                output_path: common.output_path.clone(),
                prompt_file: prompt_file.clone(),
                api_type: common.api_type,
                api_keys_file: common.api_keys_file.clone(),
                llm: config.llm.clone(),
                example_num: *example_num,
                workers: config.pool.workers,
                verbose: cli.is_verbose(),
            };
            stage.run().await?
        }
        Commands::Domain {
            common,
            prompt_file,
            max_correction,
            parser_cmd,
        } => {
            merge_common(&mut config, common);
            let stage = DomainStage {
                data_path: common.data_path.clone(),
                output_path: common.output_path.clone(),
                prompt_file: prompt_file.clone(),
                api_type: common.api_type,
                api_keys_file: common.api_keys_file.clone(),
                parser_cmd: parser_cmd.clone().unwrap_or(config.parser_cmd.clone()),
                llm: config.llm.clone(),
                max_correction: max_correction.unwrap_or(config.max_correction),
                workers: config.pool.workers,
                scratch_dir: config.pool.scratch_dir.clone(),
            };
            stage.run().await?
        }
        Commands::Interface {
            common,
            prompt_dir,
            max_correction,
            parser_cmd,
        } => {
            merge_common(&mut config, common);
            let stage = InterfaceStage {
                data_path: common.data_path.clone(),
                output_path: common.output_path.clone(),
                prompt_dir: prompt_dir.clone(),
                api_type: common.api_type,
                api_keys_file: common.api_keys_file.clone(),
                parser_cmd: parser_cmd.clone().unwrap_or(config.parser_cmd.clone()),
                llm: config.llm.clone(),
                max_correction: max_correction.unwrap_or(config.max_correction),
                workers: config.pool.workers,
                scratch_dir: config.pool.scratch_dir.clone(),
            };
            stage.run().await?
        }
        Commands::Problems {
            common,
            prompt_dir,
            prob_num,
        } => {
            merge_common(&mut config, common);
            let stage = ProblemsStage {
                data_path: common.data_path.clone(),
                output_path: common.output_path.clone(),
                prompt_dir: prompt_dir.clone(),
                api_type: common.api_type,
                api_keys_file: common.api_keys_file.clone(),
                llm: config.llm.clone(),
                prob_num: *prob_num,
                workers: config.pool.workers,
            };
            stage.run().await?
        }
    };
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the selected stage
    let summary = run_application(&cli, &config)
        .await
        .context("Application failed")?;

    if summary.failed == 0 {
        println!("{}", format!("Done: {summary}").green());
    } else {
        println!("{}", format!("Done: {summary}").yellow());
    }

    Ok(())
}
