use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use configuration::PostgresqlConfig;
use core_types::{ContextResult, ErrorContext, TableSchema, WrapErr};
use sqlx::{ConnectOptions, PgPool};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use tokio::sync::OnceCell;

use crate::error::DbError;
use crate::migration::{Dialect, MigrationPolicy, MigrationTarget, plan_plain, run_migration};

/// Owns the PostgreSQL pool. The pool is opened on first use and cached.
#[derive(Debug)]
pub struct Postgresql {
    config: PostgresqlConfig,
    is_debug: bool,
    ctx: ErrorContext,
    pool: OnceCell<PgPool>,
    closed: AtomicBool,
}

impl Postgresql {
    /// Stores the settings only; nothing is opened yet.
    pub fn new(config: PostgresqlConfig, is_debug: bool, ctx: &ErrorContext) -> Self {
        Self {
            config,
            is_debug,
            ctx: ctx.append("Postgresql"),
            pool: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates the client and opens its pool right away.
    pub async fn connect(
        config: PostgresqlConfig,
        is_debug: bool,
        ctx: &ErrorContext,
    ) -> ContextResult<Self> {
        let ew = ErrorContext::function("NewPostgresql");

        let postgresql = Self::new(config, is_debug, ctx);
        postgresql.get_connection().await.wrap_err(&ew)?;

        Ok(postgresql)
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    pub fn config(&self) -> &PostgresqlConfig {
        &self.config
    }

    /// The connection URL with the password masked, safe to log.
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}?sslmode=disable",
            self.config.user, self.config.host, self.config.port, self.config.database
        )
    }

    fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .ssl_mode(PgSslMode::Disable);

        // Statements are logged at debug level by default.
        if self.is_debug {
            options
        } else {
            options.disable_statement_logging()
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.config.max_open_conns)
            .max_lifetime(Duration::from_secs(self.config.conn_max_lifetime))
            .idle_timeout(Duration::from_secs(self.config.conn_max_idle_time))
            .acquire_timeout(self.config.timeout())
    }

    /// Returns the cached pool, opening it first if needed.
    ///
    /// A failed open is not cached, so a later call tries again.
    pub async fn get_connection(&self) -> ContextResult<PgPool> {
        let ew = self.ctx.method("GetConnection");

        if self.closed.load(Ordering::Acquire) {
            return Err(ew.wrap(DbError::Closed));
        }

        let pool = self
            .pool
            .get_or_try_init(|| async {
                tracing::info!(dsn = %self.connection_string(), "Opening PostgreSQL pool");
                self.pool_options()
                    .connect_with(self.connect_options())
                    .await
                    .map_err(DbError::ConnectionError)
            })
            .await
            .wrap_err(&ew)?;

        Ok(pool.clone())
    }

    /// Creates or alters the tables of `tables` when auto-migration is enabled.
    pub async fn migrate(&self, tables: &[TableSchema]) -> ContextResult<()> {
        let ew = self.ctx.method("Migrate");
        let policy = MigrationPolicy {
            auto_migrate: self.config.auto_migrate,
            recreate: self.config.is_need_to_recreate,
        };

        if !policy.auto_migrate {
            tracing::info!(component = "Postgresql", "AutoMigrate is disabled");
            return Ok(());
        }

        let plan = plan_plain(tables);
        let pool = self.get_connection().await.wrap_err(&ew)?;

        run_migration(&PgMigrationTarget { pool }, policy, &plan)
            .await
            .wrap_err(&ew)
    }

    /// Closes the pool. Closing a client that never connected is a no-op.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);

        if let Some(pool) = self.pool.get() {
            pool.close().await;
            tracing::info!(component = "Postgresql", "Connection pool closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct PgMigrationTarget {
    pool: PgPool,
}

#[async_trait]
impl MigrationTarget for PgMigrationTarget {
    async fn drop_table(&self, table: &TableSchema) -> Result<(), DbError> {
        sqlx::query(&Dialect::Postgres.drop_table_sql(table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_or_alter(&self, table: &TableSchema, options: &str) -> Result<(), DbError> {
        sqlx::query(&Dialect::Postgres.create_table_sql(table, options))
            .execute(&self.pool)
            .await?;

        for statement in Dialect::Postgres.add_columns_sql(table) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }

        Ok(())
    }
}
