use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_types::{ColumnSchema, ContextResult, ErrorContext, TableModel, TableSchema, WrapErr};
use database::ClickHouse;
use serde::Serialize;

use crate::error::ManagerError;

pub const APPLICATION_STATS_TABLE: &str = "application_stats";

/// One application event, stored in ClickHouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationStats {
    pub event_name: String,
    pub event_date_time: DateTime<Utc>,
    pub event_message: String,
}

impl TableModel for ApplicationStats {
    fn table_schema() -> TableSchema {
        TableSchema::new(APPLICATION_STATS_TABLE)
            .column(ColumnSchema::new("EventName", "String").tag("order_by=1;primary_key=1"))
            .column(ColumnSchema::new("EventDate", "Date").tag("order_by=2;primary_key=2"))
            .column(ColumnSchema::new("EventDateTime", "DateTime").tag("order_by=3"))
            .column(ColumnSchema::new("EventMessage", "String").tag("order_by=4"))
    }
}

/// The wire shape of [`ApplicationStats`] for `JSONEachRow` inserts.
#[derive(Debug, Serialize)]
struct ApplicationStatsRow<'a> {
    event_name: &'a str,
    event_date: String,
    event_date_time: String,
    event_message: &'a str,
}

impl<'a> From<&'a ApplicationStats> for ApplicationStatsRow<'a> {
    fn from(stats: &'a ApplicationStats) -> Self {
        Self {
            event_name: &stats.event_name,
            event_date: stats.event_date_time.format("%Y-%m-%d").to_string(),
            event_date_time: stats.event_date_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            event_message: &stats.event_message,
        }
    }
}

/// Records application events in the analytics database.
pub struct StatManager {
    clickhouse: Arc<ClickHouse>,
    ctx: ErrorContext,
}

impl StatManager {
    /// Creates the manager and migrates its table.
    pub async fn new(clickhouse: Arc<ClickHouse>, ctx: &ErrorContext) -> ContextResult<Self> {
        let ew = ErrorContext::function("NewStatManager");

        let manager = Self {
            clickhouse,
            ctx: ctx.append("StatManager"),
        };
        manager.prepare().await.wrap_err(&ew)?;

        Ok(manager)
    }

    async fn prepare(&self) -> ContextResult<()> {
        let ew = self.ctx.method("Prepare");
        self.clickhouse
            .migrate(&[ApplicationStats::table_schema()])
            .await
            .wrap_err(&ew)
    }

    /// Stores one event.
    pub async fn add(
        &self,
        event_name: &str,
        event_date_time: DateTime<Utc>,
        event_message: &str,
    ) -> ContextResult<()> {
        let ew = self.ctx.method("Add");

        if event_name.trim().is_empty() {
            return Err(ew.wrap(ManagerError::InvalidInput(
                "event_name".to_string(),
                "must not be empty".to_string(),
            )));
        }

        let stats = ApplicationStats {
            event_name: event_name.to_string(),
            event_date_time,
            event_message: event_message.to_string(),
        };
        self.clickhouse
            .insert(APPLICATION_STATS_TABLE, &[ApplicationStatsRow::from(&stats)])
            .await
            .wrap_err(&ew)
    }

    /// Stores one event stamped with the current time.
    pub async fn add_simple(&self, event_name: &str, event_message: &str) -> ContextResult<()> {
        self.add(event_name, Utc::now(), event_message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use configuration::ClickHouseConfig;
    use database::DdlOptions;
    use wiremock::matchers::{body_string, body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn stats_table_keys_follow_the_schema_tags() {
        let options = DdlOptions::for_table(&ApplicationStats::table_schema()).unwrap();
        assert_eq!(
            options.render(),
            "ENGINE MergeTree\nPRIMARY KEY (event_name, event_date)\nORDER BY (event_name, event_date, event_date_time, event_message)"
        );
    }

    async fn clickhouse_for(server: &MockServer) -> Arc<ClickHouse> {
        Mock::given(method("POST"))
            .and(body_string("SELECT 1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1\n"))
            .mount(server)
            .await;

        let config = ClickHouseConfig {
            host: server.address().ip().to_string(),
            port: server.address().port(),
            timeout: 2,
            ..ClickHouseConfig::default()
        };
        Arc::new(ClickHouse::new(config, false, &ErrorContext::new("Application")))
    }

    #[tokio::test]
    async fn add_inserts_one_json_row() {
        let server = MockServer::start().await;
        let clickhouse = clickhouse_for(&server).await;
        Mock::given(method("POST"))
            .and(body_string_contains("INSERT INTO `application_stats` FORMAT JSONEachRow\n"))
            .and(body_string_contains(
                r#"{"event_name":"login","event_date":"2024-03-05","event_date_time":"2024-03-05 07:08:09","event_message":"ok"}"#,
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // Auto-migration is off by default, so construction only stores the client.
        let manager = StatManager::new(clickhouse, &ErrorContext::new("Application"))
            .await
            .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        manager.add("login", at, "ok").await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn empty_event_name_is_rejected() {
        let server = MockServer::start().await;
        let clickhouse = clickhouse_for(&server).await;
        let manager = StatManager::new(clickhouse, &ErrorContext::new("Application"))
            .await
            .unwrap();

        let err = manager.add_simple("  ", "ignored").await.unwrap_err();
        assert_eq!(err.path(), "Application.StatManager.Add");
        assert!(err.is::<ManagerError>());
    }
}
