use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18650;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Cadence of the due-task polling loop.
pub const DEFAULT_TICK_SECS: u64 = 60;
/// Hard wall-clock deadline for dry-run (`/test`) executions.
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 120;

/// Top-level config (clockwork.toml + CLOCKWORK_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockworkConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for ClockworkConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Master key for API access. `None` disables auth (local development).
    #[serde(default)]
    pub master_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            master_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-task polls.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Worker pool size for script execution. 0 means "number of CPUs".
    #[serde(default)]
    pub workers: usize,
    /// Dry-run execution deadline in seconds.
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            workers: 0,
            test_timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
        }
    }
}

impl SchedulerConfig {
    /// Resolved worker count: configured value, or one per available core.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

impl ClockworkConfig {
    /// Load config: explicit path > CLOCKWORK_CONFIG env > ~/.clockwork/clockwork.toml.
    /// Env vars (CLOCKWORK_GATEWAY_PORT, …) override file values.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ClockworkConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CLOCKWORK_").split("_"))
            .extract()
            .map_err(|e| crate::error::ClockworkError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.clockwork/clockwork.toml", home)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.clockwork/clockwork.db", home)
}

fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}

fn default_test_timeout_secs() -> u64 {
    DEFAULT_TEST_TIMEOUT_SECS
}
