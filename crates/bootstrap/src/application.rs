use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use configuration::{Config, init_logger, load_config};
use core_types::{ContextResult, ErrorContext, WrapErr};
use database::{ClickHouse, Postgresql};
use managers::{ChatBotManager, S3Manager, StatManager, UserAccountManager};
use queue::RabbitMq;
use storage::{ObjectStore, S3};
use telegram::TelegramBot;

use crate::alerts;
use crate::teardown::{Release, Startup};

/// Root of every error path produced during startup.
pub const ROOT_CONTEXT: &str = "Application";

/// Inputs of [`initialize_application`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Folder holding `main.toml` and the optional `main-local.toml`.
    pub config_folder: PathBuf,
    /// How long the CHECK CONFIG countdown runs. Zero skips it.
    pub countdown: Duration,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            config_folder: PathBuf::from("config"),
            countdown: Duration::ZERO,
        }
    }
}

/// Every client and manager of a started application.
pub struct Application {
    pub config: Arc<Config>,
    pub clickhouse: Arc<ClickHouse>,
    pub postgresql: Arc<Postgresql>,
    pub rabbitmq: Arc<RabbitMq>,
    pub s3: Arc<S3>,
    pub telegram: Arc<TelegramBot>,
    pub stat_manager: Arc<StatManager>,
    pub user_account_manager: Arc<UserAccountManager>,
    pub chat_bot_manager: Arc<ChatBotManager>,
    pub s3_manager: Arc<S3Manager>,
}

/// Builds the application in dependency order.
///
/// On failure, everything acquired so far has already been released in
/// reverse order and the error of the failing step is returned. On success
/// the returned [`Release`] is the only way to tear the application down.
pub async fn initialize_application(options: InitOptions) -> ContextResult<(Application, Release)> {
    let mut startup = Startup::new();
    let application = build(&options, &mut startup).await?;

    tracing::info!(resources = startup.pending(), "Application initialized");
    Ok((application, startup.finish()))
}

async fn build(options: &InitOptions, startup: &mut Startup) -> ContextResult<Application> {
    let ctx = ErrorContext::new(ROOT_CONTEXT);

    let config = startup
        .attempt("Config", async {
            load_config(&options.config_folder).wrap_err(&ctx.method("LoadConfig"))
        })
        .await?;
    let config = Arc::new(config);

    alerts::announce(&config, options.countdown).await;

    let logger = startup
        .attempt("Logger", async {
            init_logger(&config.logger).wrap_err(&ctx.method("InitLogger"))
        })
        .await?;
    startup.defer("Logger", move || async move {
        logger.flush();
        Ok(())
    });
    tracing::info!(config_folder = %config.config_folder.display(), "Configuration loaded");

    let clickhouse = startup
        .attempt(
            "ClickHouse",
            ClickHouse::connect(config.clickhouse.clone(), config.is_debug, &ctx),
        )
        .await?;
    let clickhouse = Arc::new(clickhouse);
    let handle = Arc::clone(&clickhouse);
    startup.defer("ClickHouse", move || async move {
        handle.close().await;
        Ok(())
    });

    let postgresql = startup
        .attempt(
            "Postgresql",
            Postgresql::connect(config.postgresql.clone(), config.is_debug, &ctx),
        )
        .await?;
    let postgresql = Arc::new(postgresql);
    let handle = Arc::clone(&postgresql);
    startup.defer("Postgresql", move || async move {
        handle.close().await;
        Ok(())
    });

    assemble(&ctx, startup, config, clickhouse, postgresql).await
}

/// Builds everything that sits on top of the two databases.
async fn assemble(
    ctx: &ErrorContext,
    startup: &mut Startup,
    config: Arc<Config>,
    clickhouse: Arc<ClickHouse>,
    postgresql: Arc<Postgresql>,
) -> ContextResult<Application> {
    let rabbitmq = Arc::new(RabbitMq::new(config.rabbitmq.clone(), ctx));
    let handle = Arc::clone(&rabbitmq);
    startup.defer("RabbitMQ", move || async move {
        handle.close().await;
        Ok(())
    });

    let s3 = Arc::new(S3::new(config.s3.clone(), &config.config_folder, ctx));
    let handle = Arc::clone(&s3);
    startup.defer("S3", move || async move {
        handle.close().await;
        Ok(())
    });

    let telegram = Arc::new(TelegramBot::new(config.telegram.clone(), ctx));
    let handle = Arc::clone(&telegram);
    startup.defer("Telegram", move || async move {
        handle.close().await;
        Ok(())
    });

    let stat_manager = startup
        .attempt("StatManager", StatManager::new(Arc::clone(&clickhouse), ctx))
        .await?;

    let user_account_manager = startup
        .attempt(
            "UserAccountManager",
            UserAccountManager::new(Arc::clone(&postgresql), ctx),
        )
        .await?;

    let chat_bot_manager = startup
        .attempt("ChatBotManager", ChatBotManager::start(&telegram, ctx))
        .await?;
    let chat_bot_manager = Arc::new(chat_bot_manager);
    let handle = Arc::clone(&chat_bot_manager);
    startup.defer("ChatBotManager", move || async move {
        handle.stop().await;
        Ok(())
    });

    let store: Arc<dyn ObjectStore> = s3.clone();
    let s3_manager = startup
        .attempt(
            "S3Manager",
            S3Manager::new(store, config.s3_manager.clone(), ctx),
        )
        .await?;

    Ok(Application {
        config,
        clickhouse,
        postgresql,
        rabbitmq,
        s3,
        telegram,
        stat_manager: Arc::new(stat_manager),
        user_account_manager: Arc::new(user_account_manager),
        chat_bot_manager,
        s3_manager: Arc::new(s3_manager),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::ConfigError;
    use database::DbError;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options_for(dir: &tempfile::TempDir) -> InitOptions {
        InitOptions {
            config_folder: dir.path().to_path_buf(),
            countdown: Duration::ZERO,
        }
    }

    fn write_main(dir: &tempfile::TempDir, analytics_port: u16, telegram_url: &str) {
        let main = format!(
            r#"
[clickhouse]
host = "127.0.0.1"
port = {analytics_port}
timeout = 2

[postgresql]
host = "127.0.0.1"
port = 1
timeout = 1

[telegram]
token = "9:x"
api_url = "{telegram_url}"
"#
        );
        std::fs::write(dir.path().join("main.toml"), main).unwrap();
    }

    #[tokio::test]
    async fn unreachable_relational_database_rolls_back_what_was_acquired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("SELECT 1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        write_main(&dir, server.address().port(), &server.uri());

        let mut startup = Startup::new();
        let err = build(&options_for(&dir), &mut startup).await.err().unwrap();

        assert!(err.to_string().contains("Application.Postgresql.GetConnection"));
        assert!(matches!(err.find::<DbError>(), Some(DbError::ConnectionError(_))));
        assert_eq!(startup.released(), ["ClickHouse", "Logger"]);
        assert_eq!(startup.pending(), 0);

        // Only the analytics ping went out; the bot was never created.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests.iter().all(|r| !r.url.path().contains("getMe")));
    }

    #[tokio::test]
    async fn unreachable_analytics_releases_only_the_logger() {
        let dir = tempfile::tempdir().unwrap();
        write_main(&dir, 1, "http://127.0.0.1:1");

        let mut startup = Startup::new();
        let err = build(&options_for(&dir), &mut startup).await.err().unwrap();

        assert!(err.to_string().starts_with("NewClickHouse: Application.ClickHouse.GetConnection: "));
        assert_eq!(startup.released(), ["Logger"]);
    }

    #[tokio::test]
    async fn configuration_errors_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let err = initialize_application(options_for(&dir)).await.err().unwrap();

        assert_eq!(err.path(), "Application.LoadConfig");
        assert!(matches!(err.find::<ConfigError>(), Some(ConfigError::LoadError(_))));
    }

    async fn count_requests(server: &MockServer, suffix: &str) -> usize {
        let requests = server.received_requests().await.unwrap_or_default();
        requests.iter().filter(|r| r.url.path().ends_with(suffix)).count()
    }

    #[tokio::test]
    async fn failing_object_storage_stops_the_running_poller() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot9:x/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true, "result": {"id": 9, "is_bot": true, "first_name": "Bot"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot9:x/getUpdates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": []}))
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>denied</Message></Error>",
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("credentials"),
            "[default]\naws_access_key_id = test\naws_secret_access_key = test\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.config_folder = dir.path().to_path_buf();
        config.telegram.token = "9:x".to_string();
        config.telegram.api_url = server.uri();
        config.telegram.timeout = 2;
        config.telegram.long_poller.timeout = 0;
        config.s3.credentials_paths = vec![PathBuf::from("credentials")];
        config.s3.region = Some("us-east-1".to_string());
        config.s3.endpoint_url = Some(server.uri());
        config.s3.force_path_style = true;
        config.s3_manager.timeout = 2;

        // Stand-ins for the steps before assembly; neither database is contacted
        // because auto-migration is off.
        let ctx = ErrorContext::new(ROOT_CONTEXT);
        let clickhouse = Arc::new(ClickHouse::new(config.clickhouse.clone(), false, &ctx));
        let postgresql = Arc::new(Postgresql::new(config.postgresql.clone(), false, &ctx));
        let mut startup = Startup::new();
        startup.defer("Logger", || async { Ok(()) });
        let handle = Arc::clone(&clickhouse);
        startup.defer("ClickHouse", move || async move {
            handle.close().await;
            Ok(())
        });
        let handle = Arc::clone(&postgresql);
        startup.defer("Postgresql", move || async move {
            handle.close().await;
            Ok(())
        });

        let err = assemble(&ctx, &mut startup, Arc::new(config), clickhouse, postgresql)
            .await
            .err()
            .unwrap();

        assert!(err.to_string().starts_with("NewS3Manager: Application.S3.ListBuckets: "));
        assert_eq!(
            startup.released(),
            ["ChatBotManager", "Telegram", "S3", "RabbitMQ", "Postgresql", "ClickHouse", "Logger"]
        );

        let settled = count_requests(&server, "/getUpdates").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count_requests(&server, "/getUpdates").await, settled);
    }
}
