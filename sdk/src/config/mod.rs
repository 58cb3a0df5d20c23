//! Configuration for the REST client and job workers
//!
//! Polling settings come with presets for common workloads; worker and
//! client configurations validate on construction.

use std::time::Duration;

/// Default REST address of a local engine
pub const DEFAULT_REST_ADDRESS: &str = "http://localhost:8080";

/// Worker name reported to the engine when none is configured
pub const DEFAULT_WORKER_NAME: &str = "camunda-rust-worker";

/// Connection settings for [`CamundaRestClient`](crate::client::CamundaRestClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST API, without the `/v2` prefix
    pub rest_address: String,
    /// Tenant applied to requests that do not name one
    pub tenant_id: Option<String>,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rest_address: DEFAULT_REST_ADDRESS.to_string(),
            tenant_id: None,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("camunda-rust-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given REST address
    pub fn new(rest_address: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            rest_address: rest_address.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rest_address.starts_with("http://") || self.rest_address.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue(format!(
                "rest_address must be an http(s) URL, got '{}'",
                self.rest_address
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// Reads `ZEEBE_REST_ADDRESS`, `CAMUNDA_TENANT_ID` and
    /// `CAMUNDA_REST_REQUEST_TIMEOUT_MS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(address) = lookup("ZEEBE_REST_ADDRESS").filter(|v| !v.is_empty()) {
            config.rest_address = address;
        }
        config.tenant_id = lookup("CAMUNDA_TENANT_ID").filter(|v| !v.is_empty());
        if let Some(ms) = lookup("CAMUNDA_REST_REQUEST_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "CAMUNDA_REST_REQUEST_TIMEOUT_MS must be milliseconds, got '{ms}'"
                ))
            })?;
            config.request_timeout = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Polling and capacity settings for a job worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Maximum number of jobs handled concurrently
    pub max_jobs_to_activate: usize,
    /// Interval between activation requests
    pub poll_interval: Duration,
    /// How long an activated job stays locked to this worker
    pub job_timeout: Duration,
    /// Long-poll timeout of one activation request
    pub request_timeout: Duration,
    /// How often `stop()` checks whether active jobs have drained
    pub drain_check_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl PollingConfig {
    /// Default configuration suitable for most use cases
    pub const DEFAULT: Self = Self {
        max_jobs_to_activate: 32,
        poll_interval: Duration::from_millis(300),
        job_timeout: Duration::from_secs(60),
        request_timeout: Duration::from_secs(10),
        drain_check_interval: Duration::from_millis(500),
    };

    /// High-throughput configuration for heavy job workloads
    pub const HIGH_THROUGHPUT: Self = Self {
        max_jobs_to_activate: 128,
        poll_interval: Duration::from_millis(100),
        job_timeout: Duration::from_secs(60),
        request_timeout: Duration::from_secs(10),
        drain_check_interval: Duration::from_millis(500),
    };

    /// Low-resource configuration for constrained environments
    pub const LOW_RESOURCE: Self = Self {
        max_jobs_to_activate: 4,
        poll_interval: Duration::from_secs(1),
        job_timeout: Duration::from_secs(120),
        request_timeout: Duration::from_secs(10),
        drain_check_interval: Duration::from_millis(500),
    };

    /// Create a new configuration with validation
    pub fn new(
        max_jobs_to_activate: usize,
        poll_interval: Duration,
        job_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            max_jobs_to_activate,
            poll_interval,
            job_timeout,
            request_timeout,
            drain_check_interval: Self::DEFAULT.drain_check_interval,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_jobs_to_activate == 0 {
            return Err(ConfigError::InvalidValue(
                "max_jobs_to_activate must be positive".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "poll_interval must be positive".to_string(),
            ));
        }
        if self.job_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "job_timeout must be positive".to_string(),
            ));
        }
        if self.drain_check_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "drain_check_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration of one [`JobWorker`](crate::worker::JobWorker)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobWorkerConfig {
    /// Job type to activate
    pub task_type: String,
    /// Worker name reported to the engine
    pub worker_name: String,
    pub polling: PollingConfig,
    /// Variables to fetch; `None` fetches all
    pub fetch_variables: Option<Vec<String>>,
    /// Tenants to activate jobs for; `None` uses the client default
    pub tenant_ids: Option<Vec<String>>,
    /// Start polling as soon as the worker is created
    pub auto_start: bool,
}

impl JobWorkerConfig {
    /// Create a configuration for `task_type` with default polling
    pub fn new(task_type: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            task_type: task_type.into(),
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            polling: PollingConfig::DEFAULT,
            fetch_variables: None,
            tenant_ids: None,
            auto_start: true,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_max_jobs_to_activate(mut self, max: usize) -> Self {
        self.polling.max_jobs_to_activate = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.polling.poll_interval = interval;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.polling.job_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.polling.request_timeout = timeout;
        self
    }

    pub fn with_drain_check_interval(mut self, interval: Duration) -> Self {
        self.polling.drain_check_interval = interval;
        self
    }

    pub fn with_fetch_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_variables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tenant_ids<I, S>(mut self, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenant_ids = Some(tenants.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_type.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "task_type must not be empty".to_string(),
            ));
        }
        if self.worker_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "worker_name must not be empty".to_string(),
            ));
        }
        self.polling.validate()
    }
}

/// Configuration error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
