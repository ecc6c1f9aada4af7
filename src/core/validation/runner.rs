//! Validation run orchestrator
//!
//! Drives a full rebuild of an EMAP instance over a time window: the time
//! window is written into the environment files, the stack is restarted,
//! the ingestion sources are run to completion, and the run waits for the
//! broker to drain before saving logs and stopping everything. The
//! environment files are restored to their original contents afterwards.

use super::report::{BackgroundOutcome, IngestionFailure, Stage, ValidationReport};
use crate::adapters::compose::{CommandExecutor, ComposeCommand};
use crate::adapters::glowroot::{setup_glowroot_password, GlowrootCredentials, GLOWROOT_SERVICE};
use crate::adapters::rabbitmq::QueueMonitor;
use crate::config::env_file::{EnvironmentFile, ENV_FILE_SUFFIX};
use crate::config::global::{IDS_END_KEY, IDS_START_KEY};
use crate::config::ValidationSettings;
use crate::core::snapshot::EnvironmentSnapshot;
use crate::domain::{EmapError, Result, TimeWindow};
use chrono::{Local, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// HL7 ingestion source service
pub const HL7_SOURCE: &str = "hl7source";

/// Document harvesting ingestion source service
pub const HOOVER: &str = "hoover";

/// Core processor service
pub const CORE_SERVICE: &str = "emapstar";

/// Message broker service
pub const BROKER_SERVICE: &str = "rabbitmq";

/// Environment file directory under the main directory
pub const ENV_DIR_NAME: &str = "config";

const HOOVER_START_KEY: &str = "HOOVER_DATE_FROM";
const HOOVER_END_KEY: &str = "HOOVER_DATE_UNTIL";

/// Which ingestion sources a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSelection {
    /// HL7 source then hoover
    #[default]
    Both,
    /// HL7 source only
    Hl7Only,
    /// Hoover only
    HooverOnly,
}

impl SourceSelection {
    /// Builds the selection from the two "only" options
    ///
    /// # Errors
    ///
    /// Returns [`EmapError::InvalidOptions`] if both are set.
    pub fn from_flags(only_hl7source: bool, only_hoover: bool) -> Result<Self> {
        match (only_hl7source, only_hoover) {
            (true, true) => Err(EmapError::InvalidOptions(
                "Cannot run only hl7source and only hoover at the same time".to_string(),
            )),
            (true, false) => Ok(SourceSelection::Hl7Only),
            (false, true) => Ok(SourceSelection::HooverOnly),
            (false, false) => Ok(SourceSelection::Both),
        }
    }

    /// Whether the HL7 source runs
    pub fn runs_hl7source(&self) -> bool {
        !matches!(self, SourceSelection::HooverOnly)
    }

    /// Whether hoover runs
    pub fn runs_hoover(&self) -> bool {
        !matches!(self, SourceSelection::Hl7Only)
    }
}

/// Timing parameters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTimings {
    /// Delay before the core processor is started in the background
    pub core_start_delay: Duration,
    /// Upper bound on the drain wait
    pub drain_timeout: Duration,
    /// Interval between queue depth checks
    pub poll_interval: Duration,
}

impl From<&ValidationSettings> for RunTimings {
    fn from(settings: &ValidationSettings) -> Self {
        Self {
            core_start_delay: settings.core_start_delay(),
            drain_timeout: settings.drain_timeout(),
            poll_interval: settings.poll_interval(),
        }
    }
}

impl Default for RunTimings {
    fn default() -> Self {
        Self::from(&ValidationSettings::default())
    }
}

/// Orchestrates a validation run
///
/// The environment directory must not be used by anything else while a run
/// is in progress.
pub struct ValidationRunner {
    executor: Arc<dyn CommandExecutor>,
    monitor: Arc<dyn QueueMonitor>,
    time_window: TimeWindow,
    env_dir: PathBuf,
    log_dir: PathBuf,
    sources: SourceSelection,
    timings: RunTimings,
    glowroot: GlowrootCredentials,
    run_date: NaiveDate,
}

impl ValidationRunner {
    /// Creates a runner for the instance rooted at `main_dir`
    ///
    /// Environment files are read from `<main_dir>/config`; logs are written
    /// to `main_dir`.
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        monitor: Arc<dyn QueueMonitor>,
        time_window: TimeWindow,
        main_dir: &Path,
        glowroot: GlowrootCredentials,
    ) -> Self {
        Self {
            executor,
            monitor,
            time_window,
            env_dir: main_dir.join(ENV_DIR_NAME),
            log_dir: main_dir.to_path_buf(),
            sources: SourceSelection::default(),
            timings: RunTimings::default(),
            glowroot,
            run_date: Local::now().date_naive(),
        }
    }

    /// Sets the ingestion sources
    pub fn with_sources(mut self, sources: SourceSelection) -> Self {
        self.sources = sources;
        self
    }

    /// Sets the timing parameters
    pub fn with_timings(mut self, timings: RunTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Sets the directory receiving captured logs
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Sets the date used in log file names
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    /// Directory holding the `*-config-envs` files
    pub fn env_dir_path(&self) -> &Path {
        &self.env_dir
    }

    /// Selected ingestion sources
    pub fn sources(&self) -> SourceSelection {
        self.sources
    }

    /// Prefix of every captured log file, e.g. `rebuild_log_2024-01-15`
    pub fn log_file_prefix(&self) -> String {
        format!("rebuild_log_{}", self.run_date)
    }

    /// Log file for a service
    pub fn log_path(&self, service: &str) -> PathBuf {
        self.log_dir
            .join(format!("{}_{service}.txt", self.log_file_prefix()))
    }

    /// Runs the full validation sequence
    ///
    /// Logs are saved and the stack is stopped whatever happens after the
    /// environment snapshot is taken, and the environment files are restored
    /// before returning.
    ///
    /// # Errors
    ///
    /// - [`EmapError::NotConfirmed`] if `confirmed` is false; nothing is run
    /// - [`EmapError::DrainTimeout`] if the queues never empty
    /// - any failure of the teardown, start-up or file handling
    ///
    /// A failing ingestion service is not an error; it is listed in the
    /// returned report.
    pub async fn run(&self, confirmed: bool) -> Result<ValidationReport> {
        if !confirmed {
            return Err(EmapError::NotConfirmed(
                "pass --run to start a validation run".to_string(),
            ));
        }

        tracing::info!(
            window = %self.time_window,
            sources = ?self.sources,
            env_dir = %self.env_dir.display(),
            "Starting validation run"
        );

        let snapshot = EnvironmentSnapshot::capture(&self.env_dir)?;
        let outcome = self.run_in_snapshot().await;
        let restored = snapshot.restore();

        let report = outcome?;
        restored?;

        tracing::info!(
            success = report.is_success(),
            ingestion_failures = report.ingestion_failures.len(),
            "Validation run finished"
        );
        Ok(report)
    }

    async fn run_in_snapshot(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        let mut core_start = None;

        let mut result = self.start_pipeline(&mut report, &mut core_start).await;
        if result.is_ok() {
            result = self
                .wait_for_queue_to_empty(&mut report, core_start.as_ref())
                .await;
        }
        if let Err(e) = &result {
            tracing::error!(error = %e, "Validation run failed, saving logs and stopping");
        }

        if let Some(mut start) = core_start {
            report.core_start = Some(settle_core_start(&mut start).await);
        }

        let teardown = self.save_logs_and_stop(&mut report).await;
        result?;
        teardown?;
        Ok(report)
    }

    /// Writes the time window into every environment file in the directory
    ///
    /// Returns the number of files rewritten.
    pub fn set_time_window_in_envs(&self) -> Result<usize> {
        let mut names: Vec<String> = fs::read_dir(&self.env_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.') && name.ends_with(ENV_FILE_SUFFIX))
            .collect();
        names.sort();

        let start = self.time_window.start_stamp();
        let end = self.time_window.end_stamp();

        for name in &names {
            let mut file = EnvironmentFile::read(&self.env_dir.join(name))?;
            file.replace_value_of(IDS_START_KEY, &start);
            file.replace_value_of(IDS_END_KEY, &end);
            file.replace_value_of(HOOVER_START_KEY, &start);
            file.replace_value_of(HOOVER_END_KEY, &end);
            file.write(&self.env_dir)?;
        }

        tracing::info!(files = names.len(), start = %start, end = %end, "Set time window in environment files");
        Ok(names.len())
    }

    async fn start_pipeline(
        &self,
        report: &mut ValidationReport,
        core_start: &mut Option<CoreStart>,
    ) -> Result<()> {
        report.enter(Stage::InjectingTimeWindow);
        self.set_time_window_in_envs()?;

        report.enter(Stage::TearingDown);
        self.executor.execute(&ComposeCommand::Down, None).await?;

        report.enter(Stage::ConfiguringAuth);
        setup_glowroot_password(self.executor.as_ref(), &self.glowroot).await?;

        report.enter(Stage::StartingCoreServices);
        self.executor
            .execute(&ComposeCommand::up_detached([GLOWROOT_SERVICE]), None)
            .await?;
        self.executor.execute(&ComposeCommand::Ps, None).await?;

        // The core processor fails if its queues do not exist yet, but starting
        // it after the sources deadlocks once they fill the queue, so it is
        // started a fixed delay after the sources.
        *core_start = Some(self.spawn_delayed_core_start());

        if self.sources.runs_hl7source() {
            self.run_ingestion(HL7_SOURCE, Stage::RunningHl7Source, report)
                .await;
        }
        if self.sources.runs_hoover() {
            self.run_ingestion(HOOVER, Stage::RunningHoover, report).await;
        }

        self.executor.execute(&ComposeCommand::Ps, None).await?;
        Ok(())
    }

    fn spawn_delayed_core_start(&self) -> CoreStart {
        let executor = Arc::clone(&self.executor);
        let delay = self.timings.core_start_delay;

        tracing::info!(
            service = CORE_SERVICE,
            delay_secs = delay.as_secs(),
            "Scheduling delayed start"
        );

        CoreStart(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result = executor
                .execute(&ComposeCommand::up_detached([CORE_SERVICE]), None)
                .await;
            match &result {
                Ok(()) => tracing::info!(service = CORE_SERVICE, "Started in background"),
                Err(e) => tracing::error!(service = CORE_SERVICE, error = %e, "Background start failed"),
            }
            result
        }))
    }

    async fn run_ingestion(&self, service: &str, stage: Stage, report: &mut ValidationReport) {
        report.enter(stage);

        let log_path = self.log_path(service);
        let command = ComposeCommand::UpUntilExit {
            service: service.to_string(),
        };

        match self.executor.execute(&command, Some(&log_path)).await {
            Ok(()) => {
                tracing::info!(service, log = %log_path.display(), "Ingestion finished");
            }
            Err(e) => {
                let failure = EmapError::Ingestion {
                    service: service.to_string(),
                    reason: e.to_string(),
                };
                tracing::error!(service, log = %log_path.display(), error = %failure, "Ingestion failed");
                report.ingestion_failures.push(IngestionFailure {
                    service: service.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        report.log_files.push(log_path);
    }

    /// Polls the broker until its queues are empty
    ///
    /// Empty queues only count once the core processor start has completed;
    /// before that nothing has consumed from them.
    async fn wait_for_queue_to_empty(
        &self,
        report: &mut ValidationReport,
        core_start: Option<&CoreStart>,
    ) -> Result<()> {
        report.enter(Stage::DrainingQueue);

        let timeout = self.timings.drain_timeout;
        let started = Instant::now();

        loop {
            match self.monitor.pending_messages().await {
                Ok(0) if core_start.map_or(true, CoreStart::is_finished) => {
                    tracing::info!(
                        waited_secs = started.elapsed().as_secs(),
                        "Broker queues are empty"
                    );
                    report.drained = true;
                    return Ok(());
                }
                Ok(0) => tracing::info!(
                    service = CORE_SERVICE,
                    "Broker queues are empty but the core processor has not started yet"
                ),
                Ok(pending) => tracing::info!(pending, "Waiting for broker queues to drain"),
                Err(e) => tracing::warn!(error = %e, "Failed to poll broker queues"),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                break;
            }
            tokio::time::sleep(self.timings.poll_interval.min(timeout - elapsed)).await;
        }

        Err(EmapError::DrainTimeout {
            timeout_secs: timeout.as_secs(),
        })
    }

    async fn save_logs_and_stop(&self, report: &mut ValidationReport) -> Result<()> {
        report.enter(Stage::CapturingLogs);
        self.status_check().await;

        for service in [CORE_SERVICE, BROKER_SERVICE] {
            let path = self.log_path(service);
            let command = ComposeCommand::Logs {
                service: service.to_string(),
            };
            match self.executor.execute(&command, Some(&path)).await {
                Ok(()) => report.log_files.push(path),
                Err(e) => tracing::warn!(service, error = %e, "Failed to save logs"),
            }
        }

        let down = self.executor.execute(&ComposeCommand::Down, None).await;
        report.enter(Stage::TornDown);
        self.status_check().await;
        down
    }

    /// Saves logs and stops the stack after a run was interrupted
    ///
    /// An interrupted [`run`](Self::run) restores the environment files when
    /// dropped but leaves the containers as they were.
    pub async fn stop_after_interrupt(&self) -> Result<()> {
        tracing::warn!("Stopping containers after interrupted validation run");
        let mut report = ValidationReport::default();
        self.save_logs_and_stop(&mut report).await
    }

    async fn status_check(&self) {
        if let Err(e) = self.executor.execute(&ComposeCommand::Ps, None).await {
            tracing::warn!(error = %e, "Status check failed");
        }
    }
}

/// Background core processor start, aborted when dropped
struct CoreStart(JoinHandle<Result<()>>);

impl CoreStart {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for CoreStart {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn settle_core_start(start: &mut CoreStart) -> BackgroundOutcome {
    // Let a task that is ready to finish do so before inspecting it
    tokio::task::yield_now().await;

    if !start.is_finished() {
        start.0.abort();
        tracing::warn!(service = CORE_SERVICE, "Delayed start still pending at teardown, aborted");
        return BackgroundOutcome::Aborted;
    }

    match (&mut start.0).await {
        Ok(Ok(())) => BackgroundOutcome::Started,
        Ok(Err(e)) => BackgroundOutcome::Failed(e.to_string()),
        Err(e) => BackgroundOutcome::Failed(format!("background task did not complete: {e}")),
    }
}
