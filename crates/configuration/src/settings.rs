use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
///
/// Every leaf has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The folder the config files were read from. Relative S3 profile paths
    /// are resolved against it.
    #[serde(skip)]
    pub config_folder: PathBuf,
    /// Enables verbose statement logging on the database clients.
    pub is_debug: bool,
    pub clickhouse: ClickHouseConfig,
    pub postgresql: PostgresqlConfig,
    pub logger: LoggerConfig,
    pub telegram: TelegramConfig,
    pub rabbitmq: RabbitMqConfig,
    pub s3: S3Config,
    pub s3_manager: S3ManagerConfig,
}

/// Connection, pool and migration settings for the ClickHouse analytics database.
///
/// The client talks to the HTTP interface, hence the default port 8123. HTTP
/// connections have no lifetime or open-count cap, so only the idle settings
/// of the pool are configurable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Drop every migrated table before creating it again.
    pub is_need_to_recreate: bool,
    pub auto_migrate: bool,
    /// Seconds an idle keep-alive connection is kept.
    pub conn_max_idle_time: u64,
    pub max_idle_conns: u32,
    /// Upper bound in seconds for any single round trip.
    pub timeout: u64,
}

/// Connection, pool and migration settings for the PostgreSQL database.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub is_need_to_recreate: bool,
    pub auto_migrate: bool,
    /// Seconds.
    pub conn_max_lifetime: u64,
    /// Seconds.
    pub conn_max_idle_time: u64,
    pub max_open_conns: u32,
    pub timeout: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub console: ConsoleLoggerConfig,
    pub file: FileLoggerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleLoggerConfig {
    pub is_enabled: bool,
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileLoggerConfig {
    pub is_enabled: bool,
    pub level: String,
    /// Relative paths are resolved against the working directory.
    pub path: PathBuf,
    pub rotation: RotationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub is_enabled: bool,
    pub period: RotationPeriod,
    /// How many rotated files to keep; 0 keeps all of them.
    pub max_files: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    /// Bot API base URL, overridable for self-hosted API servers.
    pub api_url: String,
    /// User ids allowed to run admin-only commands.
    pub admins: Vec<i64>,
    /// Upper bound in seconds for ordinary Bot API calls.
    pub timeout: u64,
    pub long_poller: LongPollerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LongPollerConfig {
    /// Seconds the Bot API may hold a `getUpdates` call open.
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RabbitMqConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Empty selects the broker's default virtual host.
    pub vhost: String,
}

/// Where the S3 client finds its shared AWS profile files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Paths relative to the config folder.
    pub config_paths: Vec<PathBuf>,
    /// Paths relative to the config folder.
    pub credentials_paths: Vec<PathBuf>,
    /// Overrides the region of the profile files.
    pub region: Option<String>,
    /// For S3-compatible services such as MinIO.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3ManagerConfig {
    /// Upper bound in seconds for each S3 request.
    pub timeout: u64,
    /// Bucket used when a listing does not name one.
    pub bucket: String,
    /// Page size used when a listing does not set one.
    pub max_keys: i32,
}

// --- Default Implementations ---

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: "default".to_string(),
            password: String::new(),
            database: "default".to_string(),
            is_need_to_recreate: false,
            auto_migrate: false,
            conn_max_idle_time: 60,
            max_idle_conns: 10,
            timeout: 10,
        }
    }
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "lucky-gamer".to_string(),
            is_need_to_recreate: false,
            auto_migrate: false,
            conn_max_lifetime: 60,
            conn_max_idle_time: 60,
            max_open_conns: 10,
            timeout: 10,
        }
    }
}

impl Default for ConsoleLoggerConfig {
    fn default() -> Self {
        Self {
            is_enabled: false,
            level: "info".to_string(),
        }
    }
}

impl Default for FileLoggerConfig {
    fn default() -> Self {
        Self {
            is_enabled: false,
            level: "info".to_string(),
            path: PathBuf::from("tmp/log/app.log"),
            rotation: RotationConfig::default(),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            is_enabled: false,
            period: RotationPeriod::Daily,
            max_files: 10,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            admins: Vec::new(),
            timeout: 10,
            long_poller: LongPollerConfig::default(),
        }
    }
}

impl Default for LongPollerConfig {
    fn default() -> Self {
        Self { timeout: 10 }
    }
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: String::new(),
        }
    }
}

impl Default for S3ManagerConfig {
    fn default() -> Self {
        Self {
            timeout: 10,
            bucket: String::new(),
            max_keys: 1000,
        }
    }
}

// --- Derived values ---

impl ClickHouseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl PostgresqlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl S3ManagerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl S3Config {
    /// Profile config files, resolved against `config_folder`.
    pub fn resolved_config_paths(&self, config_folder: &std::path::Path) -> Vec<PathBuf> {
        self.config_paths.iter().map(|p| config_folder.join(p)).collect()
    }

    /// Profile credential files, resolved against `config_folder`.
    pub fn resolved_credentials_paths(&self, config_folder: &std::path::Path) -> Vec<PathBuf> {
        self.credentials_paths
            .iter()
            .map(|p| config_folder.join(p))
            .collect()
    }
}

impl Config {
    /// Rejects settings that cannot work no matter what the network looks like.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ports = [
            ("clickhouse.port", self.clickhouse.port),
            ("postgresql.port", self.postgresql.port),
            ("rabbitmq.port", self.rabbitmq.port),
        ];
        for (key, port) in ports {
            if port == 0 {
                return Err(ConfigError::ValidationError(format!("{key} must be greater than 0")));
            }
        }

        if self.s3_manager.max_keys <= 0 {
            return Err(ConfigError::ValidationError(
                "s3_manager.max_keys must be greater than 0".to_string(),
            ));
        }

        if self.postgresql.max_open_conns == 0 {
            return Err(ConfigError::ValidationError(
                "postgresql.max_open_conns must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Operator-facing messages for every enabled destructive migration flag,
    /// in a fixed order.
    pub fn destructive_alerts(&self) -> Vec<&'static str> {
        let alerts = [
            (
                self.clickhouse.is_need_to_recreate,
                "Enable recreation of clickhouse - TABLES WILL BE DELETED THAT CREATED",
            ),
            (
                self.clickhouse.auto_migrate,
                "Enable auto migrate of clickhouse - TABLE WILL BE ALTERED AUTOMATICALLY",
            ),
            (
                self.postgresql.is_need_to_recreate,
                "Enable recreation of postgresql - TABLES WILL BE DELETED THAT CREATED",
            ),
            (
                self.postgresql.auto_migrate,
                "Enable auto migrate of postgresql - TABLE WILL BE ALTERED AUTOMATICALLY",
            ),
        ];

        alerts
            .into_iter()
            .filter_map(|(enabled, message)| enabled.then_some(message))
            .collect()
    }

    /// Key/value view of the effective settings with secrets masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        fn mask(secret: &str) -> String {
            if secret.is_empty() { String::new() } else { "****".to_string() }
        }

        vec![
            ("config_folder", self.config_folder.display().to_string()),
            ("is_debug", self.is_debug.to_string()),
            (
                "clickhouse",
                format!(
                    "{}@{}:{}/{} (password {})",
                    self.clickhouse.user,
                    self.clickhouse.host,
                    self.clickhouse.port,
                    self.clickhouse.database,
                    mask(&self.clickhouse.password)
                ),
            ),
            (
                "clickhouse.migrations",
                format!(
                    "auto_migrate={} recreate={}",
                    self.clickhouse.auto_migrate, self.clickhouse.is_need_to_recreate
                ),
            ),
            (
                "postgresql",
                format!(
                    "{}@{}:{}/{} (password {})",
                    self.postgresql.user,
                    self.postgresql.host,
                    self.postgresql.port,
                    self.postgresql.database,
                    mask(&self.postgresql.password)
                ),
            ),
            (
                "postgresql.migrations",
                format!(
                    "auto_migrate={} recreate={}",
                    self.postgresql.auto_migrate, self.postgresql.is_need_to_recreate
                ),
            ),
            (
                "rabbitmq",
                format!("{}@{}:{}", self.rabbitmq.user, self.rabbitmq.host, self.rabbitmq.port),
            ),
            ("telegram.token", mask(&self.telegram.token)),
            ("telegram.admins", format!("{:?}", self.telegram.admins)),
            (
                "s3_manager",
                format!(
                    "bucket={} max_keys={} timeout={}s",
                    self.s3_manager.bucket, self.s3_manager.max_keys, self.s3_manager.timeout
                ),
            ),
            (
                "logger",
                format!(
                    "console={} ({}) file={} ({})",
                    self.logger.console.is_enabled,
                    self.logger.console.level,
                    self.logger.file.is_enabled,
                    self.logger.file.path.display()
                ),
            ),
        ]
    }
}
