//! RabbitMQ queue depth via the management HTTP API

use crate::config::{secret_string, GlobalConfiguration, SecretString, ValidationSettings};
use crate::domain::{EmapError, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const DEFAULT_ADMIN_PORT: u16 = 15672;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reports how many messages are still waiting on the broker
#[async_trait]
pub trait QueueMonitor: Send + Sync {
    /// Total number of messages on the monitored queues
    async fn pending_messages(&self) -> Result<u64>;
}

/// Connection settings for the management API
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Management API base URL, e.g. `http://localhost:15672/`
    pub base_url: Url,
    /// Virtual host whose queues are inspected
    pub vhost: String,
    /// Management user
    pub username: String,
    /// Management password
    pub password: SecretString,
    /// Queues to sum; empty means every queue on the vhost
    pub queues: Vec<String>,
}

impl BrokerSettings {
    /// Reads broker settings from the `rabbitmq` section and validation settings
    ///
    /// Uses `RABBITMQ_ADMIN_PORT` (default 15672), `RABBITMQ_USERNAME` and
    /// `RABBITMQ_PASSWORD`.
    pub fn from_config(config: &GlobalConfiguration, settings: &ValidationSettings) -> Result<Self> {
        let port = match config.resolve_in("rabbitmq", "RABBITMQ_ADMIN_PORT") {
            Ok(port) => port.parse::<u16>().map_err(|_| {
                EmapError::Configuration(format!("Invalid RABBITMQ_ADMIN_PORT: {port}"))
            })?,
            Err(_) => DEFAULT_ADMIN_PORT,
        };

        let base_url = Url::parse(&format!("http://{}:{}/", settings.broker_host, port))
            .map_err(|e| EmapError::Configuration(format!("Invalid broker address: {e}")))?;

        Ok(Self {
            base_url,
            vhost: settings.broker_vhost.clone(),
            username: config.resolve_in("rabbitmq", "RABBITMQ_USERNAME")?,
            password: secret_string(config.resolve_in("rabbitmq", "RABBITMQ_PASSWORD")?),
            queues: settings.queues.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueueInfo {
    name: String,
    #[serde(default)]
    messages: u64,
}

/// Queue monitor backed by the RabbitMQ management API
pub struct RabbitMqManagementClient {
    http_client: reqwest::Client,
    endpoint: Url,
    username: String,
    password: SecretString,
    queues: Vec<String>,
}

impl RabbitMqManagementClient {
    /// Creates a client for `GET /api/queues/<vhost>`
    pub fn new(settings: BrokerSettings) -> Result<Self> {
        let mut endpoint = settings.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| EmapError::Configuration("Broker URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "queues", settings.vhost.as_str()]);

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmapError::Broker(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint,
            username: settings.username,
            password: settings.password,
            queues: settings.queues,
        })
    }

    /// URL polled for queue depths
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl QueueMonitor for RabbitMqManagementClient {
    async fn pending_messages(&self) -> Result<u64> {
        let response = self
            .http_client
            .get(self.endpoint.clone())
            .basic_auth(&self.username, Some(self.password.expose_secret().as_str()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmapError::Broker(format!(
                "Management API returned {status} for {}",
                self.endpoint
            )));
        }

        let queues: Vec<QueueInfo> = response.json().await?;

        let total = queues
            .iter()
            .filter(|q| self.queues.is_empty() || self.queues.contains(&q.name))
            .map(|q| q.messages)
            .sum();

        tracing::debug!(
            queues_seen = queues.len(),
            pending = total,
            "Polled broker queue depth"
        );
        Ok(total)
    }
}
