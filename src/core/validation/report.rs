//! Validation run stages and outcome report

use std::fmt;
use std::path::PathBuf;

/// States a validation run moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writing the time window into the environment files
    InjectingTimeWindow,
    /// Stopping the full stack
    TearingDown,
    /// Configuring the Glowroot admin user
    ConfiguringAuth,
    /// Starting Glowroot and scheduling the core processor
    StartingCoreServices,
    /// Running the HL7 source to completion
    RunningHl7Source,
    /// Running hoover to completion
    RunningHoover,
    /// Waiting for the broker queues to empty
    DrainingQueue,
    /// Saving container logs
    CapturingLogs,
    /// Full stack stopped
    TornDown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::InjectingTimeWindow => "injecting-time-window",
            Stage::TearingDown => "tearing-down",
            Stage::ConfiguringAuth => "configuring-auth",
            Stage::StartingCoreServices => "starting-core-services",
            Stage::RunningHl7Source => "running-ingestion (hl7)",
            Stage::RunningHoover => "running-ingestion (hoover)",
            Stage::DrainingQueue => "draining-queue",
            Stage::CapturingLogs => "capturing-logs",
            Stage::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

/// Outcome of the delayed background start of the core processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundOutcome {
    /// The start command succeeded
    Started,
    /// The start command failed or the task panicked
    Failed(String),
    /// The run reached teardown before the delay elapsed
    Aborted,
}

/// An ingestion service that did not finish cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionFailure {
    /// Compose service name
    pub service: String,
    /// Failure description
    pub reason: String,
}

/// What happened during a validation run
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Stages entered, in order
    pub stages: Vec<Stage>,
    /// Ingestion services that failed
    pub ingestion_failures: Vec<IngestionFailure>,
    /// Outcome of the background core start, if it was scheduled
    pub core_start: Option<BackgroundOutcome>,
    /// Log files written
    pub log_files: Vec<PathBuf>,
    /// Whether the broker queues were seen empty
    pub drained: bool,
}

impl ValidationReport {
    /// Records entry into a stage
    pub(crate) fn enter(&mut self, stage: Stage) {
        tracing::info!(stage = %stage, "Validation stage");
        self.stages.push(stage);
    }

    /// Whether the run drained the queues with every ingestion service and
    /// the core start succeeding
    ///
    /// A core start that never ran (aborted at teardown) is not a success.
    pub fn is_success(&self) -> bool {
        self.drained
            && self.ingestion_failures.is_empty()
            && matches!(self.core_start, None | Some(BackgroundOutcome::Started))
    }
}
