//! Docker command implementation
//!
//! Passes arbitrary `docker compose` arguments through to the compose files
//! of every checked-out repository.

use super::exit_code_for;
use crate::adapters::compose::{CommandExecutor, ComposeCommand, DockerComposeRunner};
use crate::adapters::glowroot::{setup_glowroot_password, GlowrootCredentials};
use crate::config::load_global_config;
use clap::Args;
use std::path::Path;

/// Arguments for the docker command
///
/// Options must precede the compose arguments; everything from the first
/// compose argument on is passed through unchanged.
#[derive(Args, Debug)]
pub struct DockerArgs {
    /// Include services for fake clarity and caboodle servers
    #[arg(long)]
    pub fake_epic: bool,

    /// Arguments to pass to docker compose, e.g. up -d, ps, down
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub docker_compose_args: Vec<String>,
}

impl DockerArgs {
    /// The compose command these arguments describe
    pub fn compose_command(&self) -> ComposeCommand {
        ComposeCommand::Raw(self.docker_compose_args.clone())
    }

    /// Execute the docker command
    pub async fn execute(&self, config_path: &str, main_dir: &Path) -> anyhow::Result<i32> {
        let config = match load_global_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration file: {e}");
                return Ok(2);
            }
        };

        let runner = match DockerComposeRunner::new(main_dir, &config, self.fake_epic) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let command = self.compose_command();

        if command.is_up() {
            let credentials = GlowrootCredentials::from_config(&config);
            if let Err(e) = setup_glowroot_password(&runner, &credentials).await {
                tracing::error!(error = %e, "Glowroot admin setup failed");
                eprintln!("❌ Failed to configure Glowroot: {e}");
                return Ok(exit_code_for(&e));
            }
            if credentials.generated {
                println!(
                    "🔑 Generated a Glowroot password for '{}'; set glowroot.GLOWROOT_PASSWORD to choose one",
                    credentials.username
                );
            }
        }

        match runner.execute(&command, None).await {
            Ok(()) => Ok(0),
            Err(e) => {
                eprintln!("❌ {e}");
                Ok(exit_code_for(&e))
            }
        }
    }
}
