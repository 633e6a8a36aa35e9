use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use configuration::ClickHouseConfig;
use core_types::{ContextResult, ErrorContext, TableSchema, WrapErr};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::migration::{Dialect, MigrationPolicy, MigrationTarget, plan_merge_tree, run_migration};

/// An open HTTP session against one ClickHouse database.
#[derive(Debug, Clone)]
pub struct ClickHouseSession {
    http: reqwest::Client,
    url: String,
    database: String,
    user: String,
    password: String,
    timeout: Duration,
    is_debug: bool,
}

impl ClickHouseSession {
    /// Runs one statement and returns the raw response body.
    pub async fn execute(&self, sql: &str) -> Result<String, DbError> {
        if self.is_debug {
            tracing::debug!(sql, "ClickHouse statement");
        }

        let request = self
            .http
            .post(&self.url)
            .query(&[("database", self.database.as_str())])
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(sql.to_string());

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| DbError::Timeout(self.timeout))??;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DbError::StatusError {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(body)
    }

    /// Inserts `rows` into `table` in one `JSONEachRow` request.
    pub async fn insert_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), DbError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut sql = format!(
            "INSERT INTO {} FORMAT JSONEachRow\n",
            Dialect::ClickHouse.quote(table)
        );
        for row in rows {
            sql.push_str(&serde_json::to_string(row)?);
            sql.push('\n');
        }

        self.execute(&sql).await.map(|_| ())
    }
}

/// Owns the ClickHouse HTTP session. The session is opened on first use and
/// cached until [`ClickHouse::close`] drops it.
#[derive(Debug)]
pub struct ClickHouse {
    config: ClickHouseConfig,
    is_debug: bool,
    ctx: ErrorContext,
    session: RwLock<Option<ClickHouseSession>>,
    closed: AtomicBool,
}

impl ClickHouse {
    pub fn new(config: ClickHouseConfig, is_debug: bool, ctx: &ErrorContext) -> Self {
        Self {
            config,
            is_debug,
            ctx: ctx.append("ClickHouse"),
            session: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates the client and opens its session right away.
    pub async fn connect(
        config: ClickHouseConfig,
        is_debug: bool,
        ctx: &ErrorContext,
    ) -> ContextResult<Self> {
        let ew = ErrorContext::function("NewClickHouse");

        let clickhouse = Self::new(config, is_debug, ctx);
        clickhouse.get_connection().await.wrap_err(&ew)?;

        Ok(clickhouse)
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    pub fn connection_string(&self) -> String {
        let host = if self.config.host.contains(':') {
            format!("[{}]", self.config.host)
        } else {
            self.config.host.clone()
        };
        format!(
            "http://{}:{}/?database={}&user={}",
            host, self.config.port, self.config.database, self.config.user
        )
    }

    async fn open(&self) -> Result<ClickHouseSession, DbError> {
        let dsn = self.connection_string();
        tracing::info!(dsn = %dsn, "Opening ClickHouse session");

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .pool_idle_timeout(Duration::from_secs(self.config.conn_max_idle_time))
            .pool_max_idle_per_host(self.config.max_idle_conns as usize)
            .build()?;

        let (base, _) = dsn.split_once('?').unwrap_or((dsn.as_str(), ""));
        let session = ClickHouseSession {
            http,
            url: base.to_string(),
            database: self.config.database.clone(),
            user: self.config.user.clone(),
            password: self.config.password.clone(),
            timeout: self.config.timeout(),
            is_debug: self.is_debug,
        };

        // HTTP is connectionless; a round trip is the only proof the server is there.
        session.execute("SELECT 1").await?;

        Ok(session)
    }

    /// Returns the cached session, opening and validating it first if needed.
    pub async fn get_connection(&self) -> ContextResult<ClickHouseSession> {
        let ew = self.ctx.method("GetConnection");

        if self.closed.load(Ordering::Acquire) {
            return Err(ew.wrap(DbError::Closed));
        }

        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        let mut slot = self.session.write().await;
        // Re-checked under the write lock; close may have won the race.
        if self.closed.load(Ordering::Acquire) {
            return Err(ew.wrap(DbError::Closed));
        }
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let session = self.open().await.wrap_err(&ew)?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Whether a session is currently cached.
    pub async fn is_open(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Creates or alters MergeTree tables whose keys come from schema tags.
    pub async fn migrate(&self, tables: &[TableSchema]) -> ContextResult<()> {
        let ew = self.ctx.method("Migrate");
        let policy = MigrationPolicy {
            auto_migrate: self.config.auto_migrate,
            recreate: self.config.is_need_to_recreate,
        };

        if !policy.auto_migrate {
            tracing::info!(component = "ClickHouse", "AutoMigrate is disabled");
            return Ok(());
        }

        let plan = plan_merge_tree(tables).wrap_err(&ew)?;
        let session = self.get_connection().await.wrap_err(&ew)?;

        run_migration(&session, policy, &plan).await.wrap_err(&ew)
    }

    /// Inserts rows through the cached session.
    pub async fn insert<T: Serialize>(&self, table: &str, rows: &[T]) -> ContextResult<()> {
        let ew = self.ctx.method("Insert");
        let session = self.get_connection().await.wrap_err(&ew)?;
        session.insert_rows(table, rows).await.wrap_err(&ew)
    }

    /// Drops the cached session and its HTTP client. Sessions already handed
    /// out keep working until their holders drop them.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if self.session.write().await.take().is_some() {
            tracing::info!(component = "ClickHouse", "Session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MigrationTarget for ClickHouseSession {
    async fn drop_table(&self, table: &TableSchema) -> Result<(), DbError> {
        self.execute(&Dialect::ClickHouse.drop_table_sql(table))
            .await
            .map(|_| ())
    }

    async fn create_or_alter(&self, table: &TableSchema, options: &str) -> Result<(), DbError> {
        self.execute(&Dialect::ClickHouse.create_table_sql(table, options))
            .await?;

        for statement in Dialect::ClickHouse.add_columns_sql(table) {
            self.execute(&statement).await?;
        }

        Ok(())
    }
}
