//! Integration tests for validation run orchestration
//!
//! Runs are driven against a recording command executor and a scripted
//! queue monitor, so no containers or broker are needed.

use async_trait::async_trait;
use chrono::NaiveDate;
use emap_runner::adapters::compose::{CommandExecutor, ComposeCommand};
use emap_runner::adapters::glowroot::{GlowrootCredentials, GLOWROOT_SERVICE};
use emap_runner::adapters::rabbitmq::QueueMonitor;
use emap_runner::core::validation::{
    BackgroundOutcome, RunTimings, SourceSelection, Stage, ValidationRunner,
};
use emap_runner::domain::{EmapError, Result, TimeWindow};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const HOOVER_ENVS: &str = "# hoover\nHOOVER_DATE_FROM=2020-01-01T00:00:00.00Z\nHOOVER_DATE_UNTIL=2020-02-01T00:00:00.00Z\nUDS_SCHEMA=star\n";
const CORE_ENVS: &str = "IDS_CFG_DEFAULT_START_DATETIME=\nIDS_CFG_END_DATETIME=\r\nUNRELATED=1";

type FailWhen = Box<dyn Fn(&ComposeCommand) -> bool + Send + Sync>;

struct RecordingExecutor {
    commands: Mutex<Vec<ComposeCommand>>,
    env_file: PathBuf,
    env_seen_during_run: Mutex<Option<String>>,
    fail_when: FailWhen,
}

impl RecordingExecutor {
    fn new(env_dir: &Path) -> Self {
        Self::failing(env_dir, Box::new(|_| false))
    }

    fn failing(env_dir: &Path, fail_when: FailWhen) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            env_file: env_dir.join("hoover-config-envs"),
            env_seen_during_run: Mutex::new(None),
            fail_when,
        }
    }

    fn commands(&self) -> Vec<ComposeCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands issued by the run itself, without the background core start
    fn foreground_commands(&self) -> Vec<ComposeCommand> {
        self.commands()
            .into_iter()
            .filter(|c| *c != core_start())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, command: &ComposeCommand, output: Option<&Path>) -> Result<()> {
        self.commands.lock().unwrap().push(command.clone());

        let mut seen = self.env_seen_during_run.lock().unwrap();
        if seen.is_none() {
            *seen = fs::read_to_string(&self.env_file).ok();
        }

        if let Some(path) = output {
            fs::write(path, format!("output of {command}\n"))?;
        }

        if (self.fail_when)(command) {
            return Err(EmapError::Command {
                command: command.to_string(),
                exit_code: Some(1),
            });
        }
        Ok(())
    }
}

struct ScriptedMonitor {
    responses: Mutex<VecDeque<Result<u64>>>,
    fallback: u64,
}

impl ScriptedMonitor {
    fn new(responses: Vec<Result<u64>>, fallback: u64) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback,
        }
    }
}

#[async_trait]
impl QueueMonitor for ScriptedMonitor {
    async fn pending_messages(&self) -> Result<u64> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.fallback))
    }
}

fn core_start() -> ComposeCommand {
    ComposeCommand::up_detached(["emapstar"])
}

fn until_exit(service: &str) -> ComposeCommand {
    ComposeCommand::UpUntilExit {
        service: service.to_string(),
    }
}

fn logs(service: &str) -> ComposeCommand {
    ComposeCommand::Logs {
        service: service.to_string(),
    }
}

struct Instance {
    main_dir: TempDir,
}

impl Instance {
    fn new() -> Self {
        let main_dir = TempDir::new().unwrap();
        let env_dir = main_dir.path().join("config");
        fs::create_dir(&env_dir).unwrap();
        fs::write(env_dir.join("hoover-config-envs"), HOOVER_ENVS).unwrap();
        fs::write(env_dir.join("core-config-envs"), CORE_ENVS).unwrap();
        fs::write(env_dir.join("README"), "HOOVER_DATE_FROM=untouched\n").unwrap();
        Self { main_dir }
    }

    fn env_dir(&self) -> PathBuf {
        self.main_dir.path().join("config")
    }

    fn assert_env_restored(&self) {
        let env_dir = self.env_dir();
        assert_eq!(fs::read_to_string(env_dir.join("hoover-config-envs")).unwrap(), HOOVER_ENVS);
        assert_eq!(fs::read_to_string(env_dir.join("core-config-envs")).unwrap(), CORE_ENVS);
        assert_eq!(
            fs::read_to_string(env_dir.join("README")).unwrap(),
            "HOOVER_DATE_FROM=untouched\n"
        );
    }

    fn runner(
        &self,
        executor: Arc<RecordingExecutor>,
        monitor: ScriptedMonitor,
        timings: RunTimings,
    ) -> ValidationRunner {
        let window = TimeWindow::relative_to(
            "7 days ago",
            "today",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
        .unwrap();

        ValidationRunner::new(
            executor,
            Arc::new(monitor),
            window,
            self.main_dir.path(),
            GlowrootCredentials::new("admin", "glowroot-pw".to_string()),
        )
        .with_run_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        .with_timings(timings)
    }
}

fn fast_timings() -> RunTimings {
    RunTimings {
        core_start_delay: Duration::ZERO,
        drain_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn test_full_run_command_sequence() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));
    let monitor = ScriptedMonitor::new(
        vec![Ok(12), Err(EmapError::Broker("connection refused".to_string())), Ok(0)],
        0,
    );

    let report = instance
        .runner(executor.clone(), monitor, fast_timings())
        .run(true)
        .await
        .unwrap();

    let foreground = executor.foreground_commands();
    assert_eq!(foreground[0], ComposeCommand::Down);
    assert!(matches!(&foreground[1], ComposeCommand::Run { service, .. } if service == GLOWROOT_SERVICE));
    assert_eq!(
        foreground[2..],
        [
            ComposeCommand::up_detached([GLOWROOT_SERVICE]),
            ComposeCommand::Ps,
            until_exit("hl7source"),
            until_exit("hoover"),
            ComposeCommand::Ps,
            ComposeCommand::Ps,
            logs("emapstar"),
            logs("rabbitmq"),
            ComposeCommand::Down,
            ComposeCommand::Ps,
        ]
    );

    // The core start is issued exactly once, after glowroot is up
    let all = executor.commands();
    let core_positions: Vec<_> = all
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == core_start())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(core_positions.len(), 1);
    assert!(core_positions[0] > 3);

    assert_eq!(
        report.stages,
        [
            Stage::InjectingTimeWindow,
            Stage::TearingDown,
            Stage::ConfiguringAuth,
            Stage::StartingCoreServices,
            Stage::RunningHl7Source,
            Stage::RunningHoover,
            Stage::DrainingQueue,
            Stage::CapturingLogs,
            Stage::TornDown,
        ]
    );
    assert!(report.drained);
    assert_eq!(report.core_start, Some(BackgroundOutcome::Started));
    assert!(report.is_success());

    let log_names: Vec<_> = report
        .log_files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        log_names,
        [
            "rebuild_log_2024-01-15_hl7source.txt",
            "rebuild_log_2024-01-15_hoover.txt",
            "rebuild_log_2024-01-15_emapstar.txt",
            "rebuild_log_2024-01-15_rabbitmq.txt",
        ]
    );
    assert!(report.log_files.iter().all(|p| p.is_file()));

    instance.assert_env_restored();
}

#[tokio::test]
async fn test_time_window_injected_during_run() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));

    instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), fast_timings())
        .run(true)
        .await
        .unwrap();

    let seen = executor.env_seen_during_run.lock().unwrap().clone().unwrap();
    assert_eq!(
        seen,
        "# hoover\nHOOVER_DATE_FROM=2024-01-08T00:00:00.00Z\nHOOVER_DATE_UNTIL=2024-01-15T00:00:00.00Z\nUDS_SCHEMA=star\n"
    );
    instance.assert_env_restored();
}

#[tokio::test]
async fn test_only_hoover() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));

    let report = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), fast_timings())
        .with_sources(SourceSelection::HooverOnly)
        .run(true)
        .await
        .unwrap();

    let commands = executor.commands();
    assert!(!commands.contains(&until_exit("hl7source")));
    assert!(commands.contains(&until_exit("hoover")));
    assert!(!report.stages.contains(&Stage::RunningHl7Source));
    assert!(report.stages.contains(&Stage::RunningHoover));
}

#[tokio::test]
async fn test_ingestion_failure_is_recorded_and_run_continues() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::failing(
        &instance.env_dir(),
        Box::new(|c| *c == until_exit("hl7source")),
    ));

    let report = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), fast_timings())
        .run(true)
        .await
        .unwrap();

    assert_eq!(report.ingestion_failures.len(), 1);
    assert_eq!(report.ingestion_failures[0].service, "hl7source");
    assert!(executor.commands().contains(&until_exit("hoover")));
    assert!(report.drained);
    assert!(!report.is_success());
    instance.assert_env_restored();
}

#[tokio::test]
async fn test_drain_timeout_still_saves_logs_and_stops() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));
    let timings = RunTimings {
        drain_timeout: Duration::from_millis(30),
        ..fast_timings()
    };

    let err = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 3), timings)
        .run(true)
        .await
        .unwrap_err();

    assert!(matches!(err, EmapError::DrainTimeout { .. }));
    let foreground = executor.foreground_commands();
    assert_eq!(
        foreground[foreground.len() - 4..],
        [logs("emapstar"), logs("rabbitmq"), ComposeCommand::Down, ComposeCommand::Ps]
    );
    instance.assert_env_restored();
}

#[tokio::test]
async fn test_failure_before_ingestion_still_tears_down() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::failing(
        &instance.env_dir(),
        Box::new(|c| matches!(c, ComposeCommand::Run { .. })),
    ));

    let err = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), fast_timings())
        .run(true)
        .await
        .unwrap_err();

    assert!(matches!(err, EmapError::Command { .. }));
    let commands = executor.commands();
    assert!(!commands.contains(&core_start()));
    assert!(!commands.contains(&until_exit("hl7source")));
    assert!(commands.contains(&logs("emapstar")));
    assert_eq!(commands.iter().filter(|c| **c == ComposeCommand::Down).count(), 2);
    instance.assert_env_restored();
}

#[tokio::test]
async fn test_empty_queues_wait_for_delayed_core_start() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));
    let timings = RunTimings {
        core_start_delay: Duration::from_millis(40),
        ..fast_timings()
    };

    // Queues are empty from the first poll; the drain must still wait for emapstar
    let report = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), timings)
        .with_sources(SourceSelection::HooverOnly)
        .run(true)
        .await
        .unwrap();

    assert!(report.drained);
    assert_eq!(report.core_start, Some(BackgroundOutcome::Started));
    assert!(report.is_success());

    let commands = executor.commands();
    let core_position = commands.iter().position(|c| *c == core_start()).unwrap();
    let logs_position = commands.iter().position(|c| *c == logs("emapstar")).unwrap();
    assert!(core_position < logs_position);
    instance.assert_env_restored();
}

#[tokio::test]
async fn test_pending_core_start_is_aborted_at_teardown() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));
    let timings = RunTimings {
        core_start_delay: Duration::from_secs(3600),
        drain_timeout: Duration::from_millis(50),
        ..fast_timings()
    };

    let err = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), timings)
        .run(true)
        .await
        .unwrap_err();

    // Empty queues are not a drain while emapstar has never been started
    assert!(matches!(err, EmapError::DrainTimeout { .. }));
    assert!(!executor.commands().contains(&core_start()));
    assert!(executor.commands().ends_with(&[ComposeCommand::Down, ComposeCommand::Ps]));
    instance.assert_env_restored();
}

#[tokio::test]
async fn test_failed_core_start_is_reported() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::failing(
        &instance.env_dir(),
        Box::new(|c| *c == core_start()),
    ));
    let monitor = ScriptedMonitor::new(vec![Ok(1)], 0);

    let report = instance
        .runner(executor, monitor, fast_timings())
        .run(true)
        .await
        .unwrap();

    assert!(matches!(report.core_start, Some(BackgroundOutcome::Failed(_))));
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_unconfirmed_run_does_nothing() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));

    let err = instance
        .runner(executor.clone(), ScriptedMonitor::new(vec![], 0), fast_timings())
        .run(false)
        .await
        .unwrap_err();

    assert!(matches!(err, EmapError::NotConfirmed(_)));
    assert!(executor.commands().is_empty());
    assert!(executor.env_seen_during_run.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_run_restores_environment() {
    let instance = Instance::new();
    let executor = Arc::new(RecordingExecutor::new(&instance.env_dir()));
    let timings = RunTimings {
        drain_timeout: Duration::from_secs(3600),
        ..fast_timings()
    };
    let runner = instance.runner(executor.clone(), ScriptedMonitor::new(vec![], 7), timings);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(true);
    });

    let interrupted = tokio::select! {
        _ = runner.run(true) => false,
        Ok(_) = shutdown_rx.wait_for(|stop| *stop) => true,
    };

    assert!(interrupted);
    assert!(executor.commands().contains(&until_exit("hoover")));
    instance.assert_env_restored();

    runner.stop_after_interrupt().await.unwrap();
    assert!(executor
        .foreground_commands()
        .ends_with(&[logs("emapstar"), logs("rabbitmq"), ComposeCommand::Down, ComposeCommand::Ps]));
}
