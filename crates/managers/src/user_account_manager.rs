use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_types::{ColumnSchema, ContextResult, ErrorContext, TableModel, TableSchema, WrapErr};
use database::{DbError, Postgresql};

use crate::error::ManagerError;

pub const USER_ACCOUNTS_TABLE: &str = "user_accounts";

/// A registered user. Soft-deleted rows keep their `deleted_at` stamp.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserAccount {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub nickname: String,
}

impl TableModel for UserAccount {
    fn table_schema() -> TableSchema {
        TableSchema::new(USER_ACCOUNTS_TABLE)
            .column(ColumnSchema::new("ID", "BIGSERIAL PRIMARY KEY"))
            .column(ColumnSchema::new("CreatedAt", "TIMESTAMPTZ NOT NULL DEFAULT now()"))
            .column(ColumnSchema::new("UpdatedAt", "TIMESTAMPTZ NOT NULL DEFAULT now()"))
            .column(ColumnSchema::new("DeletedAt", "TIMESTAMPTZ"))
            .column(ColumnSchema::new("Nickname", "TEXT NOT NULL DEFAULT ''"))
    }
}

/// Manages user accounts in the relational database.
pub struct UserAccountManager {
    postgresql: Arc<Postgresql>,
    ctx: ErrorContext,
}

impl UserAccountManager {
    /// Creates the manager and migrates its table.
    pub async fn new(postgresql: Arc<Postgresql>, ctx: &ErrorContext) -> ContextResult<Self> {
        let ew = ErrorContext::function("NewUserAccountManager");

        let manager = Self {
            postgresql,
            ctx: ctx.append("UserAccountManager"),
        };
        manager.prepare().await.wrap_err(&ew)?;

        Ok(manager)
    }

    async fn prepare(&self) -> ContextResult<()> {
        let ew = self.ctx.method("Prepare");
        self.postgresql
            .migrate(&[UserAccount::table_schema()])
            .await
            .wrap_err(&ew)
    }

    pub async fn create_account(&self, nickname: &str) -> ContextResult<UserAccount> {
        let ew = self.ctx.method("CreateAccount");

        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(ew.wrap(ManagerError::InvalidInput(
                "nickname".to_string(),
                "must not be empty".to_string(),
            )));
        }

        let pool = self.postgresql.get_connection().await.wrap_err(&ew)?;
        let account = sqlx::query_as::<_, UserAccount>(
            "INSERT INTO user_accounts (nickname) VALUES ($1) \
             RETURNING id, created_at, updated_at, deleted_at, nickname",
        )
        .bind(nickname)
        .fetch_one(&pool)
        .await
        .map_err(DbError::from)
        .wrap_err(&ew)?;

        tracing::info!(account_id = account.id, "User account created");
        Ok(account)
    }

    /// Looks up a live (not soft-deleted) account.
    pub async fn find_account(&self, id: i64) -> ContextResult<UserAccount> {
        let ew = self.ctx.method("FindAccount");

        let pool = self.postgresql.get_connection().await.wrap_err(&ew)?;
        sqlx::query_as::<_, UserAccount>(
            "SELECT id, created_at, updated_at, deleted_at, nickname \
             FROM user_accounts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(DbError::from)
        .wrap_err(&ew)?
        .ok_or_else(|| {
            ew.wrap(ManagerError::NotFound {
                entity: "UserAccount",
                id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::PostgresqlConfig;
    use database::Dialect;

    #[test]
    fn user_accounts_table_uses_snake_case_columns() {
        let sql = Dialect::Postgres.create_table_sql(&UserAccount::table_schema(), "");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"user_accounts\" (\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(sql.contains("\"deleted_at\" TIMESTAMPTZ,"));
        assert!(sql.ends_with("\"nickname\" TEXT NOT NULL DEFAULT '')"));
    }

    fn offline_postgresql() -> Arc<Postgresql> {
        let config = PostgresqlConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout: 1,
            ..PostgresqlConfig::default()
        };
        Arc::new(Postgresql::new(config, false, &ErrorContext::new("Application")))
    }

    #[tokio::test]
    async fn construction_without_auto_migrate_stays_offline() {
        let manager = UserAccountManager::new(offline_postgresql(), &ErrorContext::new("Application"))
            .await
            .unwrap();

        let err = manager.create_account("   ").await.unwrap_err();
        assert_eq!(err.path(), "Application.UserAccountManager.CreateAccount");
        assert!(matches!(
            err.find::<ManagerError>(),
            Some(ManagerError::InvalidInput(field, _)) if field == "nickname"
        ));
    }

    #[tokio::test]
    async fn lookups_surface_the_connection_path() {
        let manager = UserAccountManager::new(offline_postgresql(), &ErrorContext::new("Application"))
            .await
            .unwrap();

        let err = manager.find_account(1).await.unwrap_err();
        assert!(
            err.to_string()
                .contains("Application.UserAccountManager.FindAccount: Application.Postgresql.GetConnection")
        );
    }
}
