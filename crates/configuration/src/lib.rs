//! Settings tree, layered configuration loader and logger setup.
//!
//! Everything the process needs to know before touching the network lives here.

use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::{LoggerGuard, init_logger};
pub use settings::{
    ClickHouseConfig, Config, ConsoleLoggerConfig, FileLoggerConfig, LoggerConfig,
    LongPollerConfig, PostgresqlConfig, RabbitMqConfig, RotationConfig, RotationPeriod, S3Config,
    S3ManagerConfig, TelegramConfig,
};

/// The file every deployment must provide.
pub const MAIN_CONFIG_FILE: &str = "main.toml";
/// Optional per-machine overrides, layered on top of [`MAIN_CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "main-local.toml";
/// Prefix of environment overrides, e.g. `LAUNCHPAD__POSTGRESQL__HOST`.
pub const ENV_PREFIX: &str = "LAUNCHPAD";

/// Loads the application configuration from `folder`.
///
/// Sources, lowest precedence first: built-in defaults, `main.toml`,
/// `main-local.toml`, then `LAUNCHPAD__SECTION__KEY` environment variables.
/// The result is validated before it is returned.
pub fn load_config(folder: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let folder = folder.as_ref();

    let builder = config::Config::builder()
        .add_source(config::File::from(folder.join(MAIN_CONFIG_FILE)).required(true))
        .add_source(config::File::from(folder.join(LOCAL_CONFIG_FILE)).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("telegram.admins"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let mut config = builder.try_deserialize::<Config>()?;
    config.config_folder = folder.to_path_buf();
    config.validate()?;

    tracing::debug!(folder = %folder.display(), "Configuration loaded");

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn folder_with(main: &str, local: Option<&str>) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MAIN_CONFIG_FILE), main).unwrap();
        if let Some(local) = local {
            fs::write(dir.path().join(LOCAL_CONFIG_FILE), local).unwrap();
        }
        dir
    }

    #[test]
    fn empty_main_file_yields_defaults() {
        let dir = folder_with("", None);
        let config = load_config(dir.path()).unwrap();

        assert_eq!(config.config_folder, dir.path());
        assert!(!config.is_debug);
        assert_eq!(config.clickhouse.port, 8123);
        assert_eq!(config.clickhouse.user, "default");
        assert_eq!(config.postgresql.port, 5432);
        assert_eq!(config.postgresql.database, "lucky-gamer");
        assert_eq!(config.postgresql.max_open_conns, 10);
        assert_eq!(config.rabbitmq.user, "guest");
        assert_eq!(config.telegram.long_poller.timeout, 10);
        assert_eq!(config.s3_manager.max_keys, 1000);
        assert_eq!(config.logger.file.rotation.period, RotationPeriod::Daily);
        assert!(config.destructive_alerts().is_empty());
    }

    #[test]
    fn local_file_overrides_main_file() {
        let main = r#"
            is_debug = true

            [postgresql]
            host = "db.internal"
            user = "app"

            [s3_manager]
            bucket = "assets"
        "#;
        let local = r#"
            [postgresql]
            host = "127.0.0.1"
        "#;
        let dir = folder_with(main, Some(local));
        let config = load_config(dir.path()).unwrap();

        assert!(config.is_debug);
        assert_eq!(config.postgresql.host, "127.0.0.1");
        // Keys the local file leaves alone keep the main file's value.
        assert_eq!(config.postgresql.user, "app");
        assert_eq!(config.postgresql.password, "postgres");
        assert_eq!(config.s3_manager.bucket, "assets");
    }

    #[test]
    fn missing_main_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn malformed_value_is_a_load_error() {
        let dir = folder_with("[postgresql]\nport = \"not a port\"\n", None);
        assert!(matches!(load_config(dir.path()), Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn zero_port_fails_validation() {
        let dir = folder_with("[rabbitmq]\nport = 0\n", None);
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("rabbitmq.port")));
    }

    #[test]
    fn destructive_alerts_keep_a_fixed_order() {
        let main = r#"
            [postgresql]
            auto_migrate = true
            is_need_to_recreate = true

            [clickhouse]
            auto_migrate = true
        "#;
        let dir = folder_with(main, None);
        let config = load_config(dir.path()).unwrap();

        assert_eq!(
            config.destructive_alerts(),
            [
                "Enable auto migrate of clickhouse - TABLE WILL BE ALTERED AUTOMATICALLY",
                "Enable recreation of postgresql - TABLES WILL BE DELETED THAT CREATED",
                "Enable auto migrate of postgresql - TABLE WILL BE ALTERED AUTOMATICALLY",
            ]
        );
    }

    #[test]
    fn summary_masks_secrets() {
        let main = r#"
            [postgresql]
            password = "hunter2"

            [telegram]
            token = "123:abc"
        "#;
        let dir = folder_with(main, None);
        let config = load_config(dir.path()).unwrap();

        let rendered: String = config
            .summary()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("123:abc"));
        assert!(rendered.contains("telegram.token=****"));
    }

    #[test]
    fn s3_profile_paths_resolve_against_the_config_folder() {
        let dir = folder_with("[s3]\nconfig_paths = [\"aws/config\"]\n", None);
        let config = load_config(dir.path()).unwrap();

        assert_eq!(
            config.s3.resolved_config_paths(&config.config_folder),
            [dir.path().join("aws/config")]
        );
        assert!(config.s3.resolved_credentials_paths(&config.config_folder).is_empty());
    }
}
