//! Container runtime commands
//!
//! Every container operation goes through a [`CommandExecutor`] so the
//! orchestration logic can be driven against a real `docker compose`
//! installation or a recording executor in tests.

use crate::config::GlobalConfiguration;
use crate::domain::{EmapError, Result};
use async_trait::async_trait;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Compose file expected at the root of each repository
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// Compose file with the fake Epic (clarity/caboodle) services
pub const FAKE_SERVICES_COMPOSE_FILE: &str = "docker-compose.fake_services.yml";

/// Compose sub-commands used by the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeCommand {
    /// `down`
    Down,
    /// `up [-d] <services...>`
    Up { services: Vec<String>, detached: bool },
    /// `up --exit-code-from <service> <service>`
    UpUntilExit { service: String },
    /// `ps`
    Ps,
    /// `logs <service>`
    Logs { service: String },
    /// `run --rm <service> <args...>`
    Run { service: String, args: Vec<String> },
    /// Arbitrary arguments passed straight through
    Raw(Vec<String>),
}

impl ComposeCommand {
    /// `up -d` for the given services
    pub fn up_detached<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ComposeCommand::Up {
            services: services.into_iter().map(Into::into).collect(),
            detached: true,
        }
    }

    /// Arguments following the base compose command
    pub fn args(&self) -> Vec<String> {
        match self {
            ComposeCommand::Down => vec!["down".to_string()],
            ComposeCommand::Up { services, detached } => {
                let mut args = vec!["up".to_string()];
                if *detached {
                    args.push("-d".to_string());
                }
                args.extend(services.iter().cloned());
                args
            }
            ComposeCommand::UpUntilExit { service } => vec![
                "up".to_string(),
                "--exit-code-from".to_string(),
                service.clone(),
                service.clone(),
            ],
            ComposeCommand::Ps => vec!["ps".to_string()],
            ComposeCommand::Logs { service } => vec!["logs".to_string(), service.clone()],
            ComposeCommand::Run { service, args } => {
                let mut out = vec!["run".to_string(), "--rm".to_string(), service.clone()];
                out.extend(args.iter().cloned());
                out
            }
            ComposeCommand::Raw(args) => args.clone(),
        }
    }

    /// Whether this command brings services up
    pub fn is_up(&self) -> bool {
        match self {
            ComposeCommand::Up { .. } | ComposeCommand::UpUntilExit { .. } => true,
            ComposeCommand::Raw(args) => args.iter().any(|a| a == "up"),
            _ => false,
        }
    }
}

impl fmt::Display for ComposeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Credentials are passed to `run`; keep them out of logs
            ComposeCommand::Run { service, .. } => write!(f, "run --rm {service} ..."),
            other => f.write_str(&other.args().join(" ")),
        }
    }
}

/// Executes compose commands
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command` to completion
    ///
    /// With `output`, stdout and stderr are both written to that file.
    ///
    /// # Errors
    ///
    /// Returns [`EmapError::Command`] if the process cannot be started or
    /// exits non-zero.
    async fn execute(&self, command: &ComposeCommand, output: Option<&Path>) -> Result<()>;
}

/// `docker compose` over the compose files of every checked-out repository
#[derive(Debug, Clone)]
pub struct DockerComposeRunner {
    program: String,
    base_args: Vec<String>,
    working_dir: PathBuf,
}

impl DockerComposeRunner {
    /// Creates a runner for the EMAP instance rooted at `main_dir`
    ///
    /// The project name comes from `global.EMAP_PROJECT_NAME` when set.
    pub fn new(main_dir: &Path, config: &GlobalConfiguration, use_fake_epic: bool) -> Result<Self> {
        let mut compose_files = Vec::new();
        for repo in config.resolve_repositories("master")? {
            let repo_dir = repo.path_in(main_dir);
            let file = repo_dir.join(COMPOSE_FILE);
            if file.exists() {
                compose_files.push(file);
            }

            let fake = repo_dir.join(FAKE_SERVICES_COMPOSE_FILE);
            if use_fake_epic && fake.exists() {
                compose_files.push(fake);
            }
        }

        if compose_files.is_empty() {
            tracing::warn!(
                main_dir = %main_dir.display(),
                "No compose files found in any repository"
            );
        }

        let mut base_args = vec!["compose".to_string()];
        if let Ok(project) = config.resolve_in("global", "EMAP_PROJECT_NAME") {
            base_args.push("-p".to_string());
            base_args.push(project);
        }
        for file in compose_files {
            base_args.push("-f".to_string());
            base_args.push(file.to_string_lossy().to_string());
        }

        Ok(Self {
            program: "docker".to_string(),
            base_args,
            working_dir: main_dir.to_path_buf(),
        })
    }

    /// Base command line, e.g. `docker compose -p emap -f emap/docker-compose.yml`
    pub fn base_command(&self) -> Vec<String> {
        let mut command = vec![self.program.clone()];
        command.extend(self.base_args.iter().cloned());
        command
    }
}

#[async_trait]
impl CommandExecutor for DockerComposeRunner {
    async fn execute(&self, command: &ComposeCommand, output: Option<&Path>) -> Result<()> {
        let rendered = format!("{} {}", self.base_command().join(" "), command);
        tracing::info!(command = %rendered, output = ?output, "Running compose command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(command.args())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null());

        if let Some(path) = output {
            let file = File::create(path).map_err(|e| {
                EmapError::Io(format!("Failed to create log file {}: {e}", path.display()))
            })?;
            cmd.stdout(Stdio::from(file.try_clone()?));
            cmd.stderr(Stdio::from(file));
        }

        let status = cmd.status().await.map_err(|e| {
            tracing::error!(command = %rendered, error = %e, "Failed to spawn compose command");
            EmapError::Command {
                command: rendered.clone(),
                exit_code: None,
            }
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(EmapError::Command {
                command: rendered,
                exit_code: status.code(),
            })
        }
    }
}
