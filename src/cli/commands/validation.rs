//! Validation command implementation
//!
//! Runs a full validation of the pipeline over a time window of source data.

use super::exit_code_for;
use crate::adapters::compose::DockerComposeRunner;
use crate::adapters::glowroot::GlowrootCredentials;
use crate::adapters::rabbitmq::{BrokerSettings, RabbitMqManagementClient};
use crate::config::load_global_config;
use crate::core::validation::{
    BackgroundOutcome, RunTimings, SourceSelection, ValidationReport, ValidationRunner,
};
use crate::domain::{EmapError, TimeWindow};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the validation command
#[derive(Args, Debug)]
pub struct ValidationArgs {
    /// Date at which to start parsing messages, e.g. "7 days ago" or 2024-01-01
    #[arg(default_value = "7 days ago")]
    pub start_date: String,

    /// Date at which to stop parsing messages, e.g. "today"
    #[arg(default_value = "today")]
    pub end_date: String,

    /// Run the validation
    #[arg(short, long)]
    pub run: bool,

    /// Only use the HL7 source for ingestion
    #[arg(long, conflicts_with = "only_hoover")]
    pub only_hl7: bool,

    /// Only use hoover for ingestion
    #[arg(long)]
    pub only_hoover: bool,
}

impl ValidationArgs {
    /// Execute the validation command
    pub async fn execute(
        &self,
        config_path: &str,
        main_dir: &Path,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        if !self.run {
            eprintln!("Please run --help for options: pass --run to start a validation run");
            return Ok(2);
        }

        let runner = match self.build_runner(config_path, main_dir) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to prepare validation run");
                eprintln!("❌ {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🚀 Starting validation run");
        println!("  Sources: {:?}", runner.sources());
        println!("  Environment files: {}", runner.env_dir_path().display());
        println!("  Logs: {}_*.txt", runner.log_file_prefix());
        println!();

        let outcome = match run_until_shutdown(&runner, shutdown_signal).await {
            Some(outcome) => outcome,
            None => {
                println!();
                println!("⚠️  Validation run interrupted. Environment files restored.");
                return Ok(130);
            }
        };

        match outcome {
            Ok(report) => Ok(print_report(&report)),
            Err(e) => {
                tracing::error!(error = %e, "Validation run failed");
                eprintln!("❌ Validation run failed: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }

    fn build_runner(&self, config_path: &str, main_dir: &Path) -> Result<ValidationRunner, EmapError> {
        let config = load_global_config(config_path)?;
        let settings = config.validation_settings()?;

        let sources = SourceSelection::from_flags(
            self.only_hl7 || settings.use_only_hl7source,
            self.only_hoover || settings.use_only_hoover,
        )?;
        let time_window = TimeWindow::new(&self.start_date, &self.end_date)?;

        let executor = Arc::new(DockerComposeRunner::new(main_dir, &config, false)?);
        let monitor = Arc::new(RabbitMqManagementClient::new(BrokerSettings::from_config(
            &config, &settings,
        )?)?);

        Ok(ValidationRunner::new(
            executor,
            monitor,
            time_window,
            main_dir,
            GlowrootCredentials::from_config(&config),
        )
        .with_sources(sources)
        .with_timings(RunTimings::from(&settings)))
    }
}

/// Runs the validation until it finishes or a shutdown is signalled
///
/// Returns `None` when interrupted, after the stack has been stopped.
async fn run_until_shutdown(
    runner: &ValidationRunner,
    mut shutdown: watch::Receiver<bool>,
) -> Option<Result<ValidationReport, EmapError>> {
    tokio::select! {
        result = runner.run(true) => return Some(result),
        Ok(_) = shutdown.wait_for(|stop| *stop) => {}
    }

    tracing::info!("Validation run interrupted by user signal");
    if let Err(e) = runner.stop_after_interrupt().await {
        tracing::error!(error = %e, "Failed to stop containers after interrupt");
        eprintln!("❌ Failed to stop containers: {e}; stop them with `emap docker down`");
    }
    None
}

fn print_report(report: &ValidationReport) -> i32 {
    println!();
    println!("📊 Validation Summary:");
    println!(
        "  Stages: {}",
        report
            .stages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    println!("  Queues drained: {}", report.drained);
    match &report.core_start {
        Some(BackgroundOutcome::Started) => println!("  Core start: started"),
        Some(BackgroundOutcome::Failed(reason)) => println!("  Core start: failed ({reason})"),
        Some(BackgroundOutcome::Aborted) => println!("  Core start: aborted"),
        None => println!("  Core start: not scheduled"),
    }
    for path in &report.log_files {
        println!("  Log: {}", path.display());
    }
    println!();

    if !report.ingestion_failures.is_empty() {
        println!("⚠️  Ingestion failures:");
        for failure in &report.ingestion_failures {
            println!("  - {}: {}", failure.service, failure.reason);
        }
        println!();
    }

    if report.is_success() {
        println!("✅ Validation run completed successfully!");
        0
    } else {
        println!("⚠️  Validation run completed with failures");
        1
    }
}
