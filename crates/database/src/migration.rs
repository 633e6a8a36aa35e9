use async_trait::async_trait;
use core_types::TableSchema;

use crate::ddl::DdlOptions;
use crate::error::DbError;

/// The two migration switches of a database section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationPolicy {
    pub auto_migrate: bool,
    /// Drop each table before creating it again.
    pub recreate: bool,
}

/// One table of a migration plan with its pre-rendered table options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    pub table: TableSchema,
    pub options: String,
}

impl MigrationStep {
    pub fn plain(table: &TableSchema) -> Self {
        Self {
            table: table.clone(),
            options: String::new(),
        }
    }

    /// A MergeTree step whose key clauses come from the table's schema tags.
    pub fn merge_tree(table: &TableSchema) -> Result<Self, DbError> {
        Ok(Self {
            table: table.clone(),
            options: DdlOptions::for_table(table)?.render(),
        })
    }
}

/// Builds the MergeTree plan for every table. Fails before anything runs.
pub fn plan_merge_tree(tables: &[TableSchema]) -> Result<Vec<MigrationStep>, DbError> {
    tables.iter().map(MigrationStep::merge_tree).collect()
}

pub fn plan_plain(tables: &[TableSchema]) -> Vec<MigrationStep> {
    tables.iter().map(MigrationStep::plain).collect()
}

/// A database the migration policy can drive.
#[async_trait]
pub trait MigrationTarget: Send + Sync {
    async fn drop_table(&self, table: &TableSchema) -> Result<(), DbError>;

    /// Creates the table if missing, then adds any missing columns.
    async fn create_or_alter(&self, table: &TableSchema, options: &str) -> Result<(), DbError>;
}

/// Applies `plan` to `target` according to `policy`.
///
/// Disabled auto-migration is a successful no-op. The first failing table
/// aborts the batch; earlier tables stay migrated.
pub async fn run_migration<T>(
    target: &T,
    policy: MigrationPolicy,
    plan: &[MigrationStep],
) -> Result<(), DbError>
where
    T: MigrationTarget + ?Sized,
{
    if !policy.auto_migrate {
        tracing::info!("AutoMigrate is disabled");
        return Ok(());
    }

    for step in plan {
        tracing::info!(table = %step.table.name, recreate = policy.recreate, "Migrating table");

        if policy.recreate {
            target.drop_table(&step.table).await.inspect_err(|e| {
                tracing::error!(table = %step.table.name, error = %e, "Failed to drop table");
            })?;
        }

        target
            .create_or_alter(&step.table, &step.options)
            .await
            .inspect_err(|e| {
                tracing::error!(table = %step.table.name, error = %e, "Failed to migrate table");
            })?;
    }

    Ok(())
}

/// Identifier quoting and statement shapes of the supported databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    ClickHouse,
}

impl Dialect {
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::ClickHouse => format!("`{}`", ident.replace('`', "\\`")),
        }
    }

    pub fn drop_table_sql(self, table: &TableSchema) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(&table.name))
    }

    pub fn create_table_sql(self, table: &TableSchema, options: &str) -> String {
        let columns = table
            .columns
            .iter()
            .map(|c| format!("{} {}", self.quote(&c.resolved_name()), c.sql_type))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote(&table.name),
            columns
        );
        if !options.is_empty() {
            sql.push('\n');
            sql.push_str(options);
        }
        sql
    }

    /// One `ADD COLUMN IF NOT EXISTS` per column, so tables created by an
    /// older model pick up new fields.
    pub fn add_columns_sql(self, table: &TableSchema) -> Vec<String> {
        table
            .columns
            .iter()
            .map(|c| {
                format!(
                    "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
                    self.quote(&table.name),
                    self.quote(&c.resolved_name()),
                    c.sql_type
                )
            })
            .collect()
    }
}
