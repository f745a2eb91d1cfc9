//! firmo - firmographics pipeline runner

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use firmo_common::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use firmo_pipeline::config::PipelineConfig;
use firmo_pipeline::orchestrator::{Dag, Orchestrator, Pipeline, RunSummary, TaskId, TaskState};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "firmo")]
#[command(author, version, about = "Firmographics ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trigger a full DAG run
    Run,

    /// Run a single task, ignoring its upstreams
    RunTask {
        /// Task id, e.g. extract_fortune
        task: TaskId,
    },

    /// List tasks in execution order
    Tasks,

    /// Load and validate configuration, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .format(log_format)
        .log_file_prefix("firmo")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Tasks => {
            let dag = Dag::firmographics();
            for task in dag.topological_order()? {
                let upstream: Vec<_> = dag.upstream(task).iter().map(|t| t.as_str()).collect();
                if upstream.is_empty() {
                    println!("{}", task);
                } else {
                    println!("{:<20} <- {}", task.as_str(), upstream.join(", "));
                }
            }
            Ok(ExitCode::SUCCESS)
        },
        Command::CheckConfig => {
            let config = PipelineConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            info!("Configuration is valid");
            Ok(ExitCode::SUCCESS)
        },
        Command::Run => {
            let pipeline = build_pipeline().await?;
            let summary = Orchestrator::new()
                .run(&Dag::firmographics(), &pipeline)
                .await?;
            print_summary(&summary);

            if summary.succeeded() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        },
        Command::RunTask { task } => {
            let pipeline = build_pipeline().await?;
            let report = Orchestrator::new().run_task(&pipeline, task).await;

            match report.state {
                TaskState::Succeeded => {
                    info!(%task, "Task complete");
                    Ok(ExitCode::SUCCESS)
                },
                TaskState::Failed(message) => {
                    error!(%task, "{}", message);
                    Ok(ExitCode::FAILURE)
                },
                TaskState::UpstreamFailed => Ok(ExitCode::FAILURE),
            }
        },
    }
}

async fn build_pipeline() -> Result<Pipeline> {
    let config = PipelineConfig::load().context("Invalid configuration")?;
    info!(
        bucket = %config.storage.bucket,
        prefix = %config.landing.prefix,
        "Pipeline configured"
    );
    Pipeline::from_config(config).await
}

fn print_summary(summary: &RunSummary) {
    println!("run {} ({})", summary.run_id, summary.dag);
    for report in &summary.tasks {
        let duration = report
            .duration_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:<16} {:>10}",
            report.task.as_str(),
            report.state.as_str(),
            duration
        );
        if let TaskState::Failed(message) = &report.state {
            println!("    {}", message);
        }
    }
}
