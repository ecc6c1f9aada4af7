//! Glowroot central admin credential bootstrap

use super::compose::{CommandExecutor, ComposeCommand};
use crate::config::{secret_string, GlobalConfiguration, SecretString};
use crate::domain::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::ExposeSecret;

/// Compose service running Glowroot central
pub const GLOWROOT_SERVICE: &str = "glowroot-central";

const DEFAULT_USERNAME: &str = "admin";
const GENERATED_PASSWORD_LEN: usize = 24;

/// Admin credentials for Glowroot central
#[derive(Debug, Clone)]
pub struct GlowrootCredentials {
    /// Admin user name
    pub username: String,
    /// Admin password
    pub password: SecretString,
    /// Whether the password was generated rather than configured
    pub generated: bool,
}

impl GlowrootCredentials {
    /// Credentials from the `glowroot` section, generating a password if none is set
    pub fn from_config(config: &GlobalConfiguration) -> Self {
        let username = config
            .resolve_in("glowroot", "GLOWROOT_USERNAME")
            .unwrap_or_else(|_| DEFAULT_USERNAME.to_string());

        match config.resolve_in("glowroot", "GLOWROOT_PASSWORD") {
            Ok(password) if !password.is_empty() => Self::new(username, password),
            _ => Self::generate(username),
        }
    }

    /// Explicit credentials
    pub fn new(username: impl Into<String>, password: String) -> Self {
        Self {
            username: username.into(),
            password: secret_string(password),
            generated: false,
        }
    }

    /// Credentials with a random alphanumeric password
    pub fn generate(username: impl Into<String>) -> Self {
        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_PASSWORD_LEN)
            .map(char::from)
            .collect();

        Self {
            username: username.into(),
            password: secret_string(password),
            generated: true,
        }
    }

    /// Command that creates the admin user inside Glowroot central
    pub fn setup_command(&self) -> ComposeCommand {
        ComposeCommand::Run {
            service: GLOWROOT_SERVICE.to_string(),
            args: vec![
                "java".to_string(),
                "-jar".to_string(),
                "glowroot-central.jar".to_string(),
                "setup-admin-user".to_string(),
                self.username.clone(),
                self.password.expose_secret().as_str().to_string(),
            ],
        }
    }
}

/// Configures the Glowroot admin user
pub async fn setup_glowroot_password(
    executor: &dyn CommandExecutor,
    credentials: &GlowrootCredentials,
) -> Result<()> {
    executor.execute(&credentials.setup_command(), None).await?;

    tracing::info!(
        username = %credentials.username,
        generated = credentials.generated,
        "Configured Glowroot admin user"
    );
    Ok(())
}
