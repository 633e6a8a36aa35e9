use crate::error::CoreError;

/// One column of a persisted model, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    /// The model's field name, e.g. `EventDateTime` or `event_date_time`.
    pub field_name: String,
    /// Explicit column name; falls back to [`snake_case`] of `field_name`.
    pub column_name: Option<String>,
    /// Backend column type, e.g. `String`, `DateTime`, `BIGSERIAL PRIMARY KEY`.
    pub sql_type: String,
    /// Raw schema tag, `key1=value1;key2=value2`.
    pub schema_tag: Option<String>,
}

impl ColumnSchema {
    pub fn new(field_name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            column_name: None,
            sql_type: sql_type.into(),
            schema_tag: None,
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.schema_tag = Some(tag.into());
        self
    }

    /// The name the column has in the database.
    pub fn resolved_name(&self) -> String {
        self.column_name
            .clone()
            .unwrap_or_else(|| snake_case(&self.field_name))
    }
}

/// The abstract description of one table: its name and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }
}

/// Implemented by every model the migrators can create tables for.
pub trait TableModel {
    fn table_schema() -> TableSchema;
}

/// A single `key=value` entry of a schema tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTag {
    pub name: String,
    pub value: String,
}

/// A tagged column, as consumed by the DDL generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub field_name: String,
    pub column_name: String,
    pub tags: Vec<SchemaTag>,
}

/// Splits a raw schema tag into its entries.
///
/// Empty entries (a trailing `;`) are skipped; an entry with no `=` is an error.
pub fn parse_schema_tag(column: &str, raw: &str) -> Result<Vec<SchemaTag>, CoreError> {
    raw.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(name, value)| SchemaTag {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .ok_or_else(|| CoreError::MalformedSchemaTag {
                    column: column.to_string(),
                    entry: entry.to_string(),
                })
        })
        .collect()
}

/// Extracts the tagged columns of `table`, keeping declaration order.
pub fn describe_schema(table: &TableSchema) -> Result<Vec<SchemaField>, CoreError> {
    let mut fields = Vec::new();

    for column in &table.columns {
        let Some(raw) = column.schema_tag.as_deref() else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }

        let column_name = column.resolved_name();
        let tags = parse_schema_tag(&column_name, raw)?;

        fields.push(SchemaField {
            field_name: column.field_name.clone(),
            column_name,
            tags,
        });
    }

    Ok(fields)
}

/// Default column naming strategy: `EventDateTime` → `event_date_time`, `UserID` → `user_id`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_table() -> TableSchema {
        TableSchema::new("application_stats")
            .column(ColumnSchema::new("EventName", "String").tag("order_by=1;primary_key=1"))
            .column(ColumnSchema::new("Untagged", "String"))
            .column(ColumnSchema::new("EventDate", "Date").tag("order_by=2;primary_key=2"))
            .column(ColumnSchema::new("Message", "String").column("msg").tag("order_by=3"))
    }

    #[test]
    fn snake_case_follows_the_naming_strategy() {
        assert_eq!(snake_case("EventDateTime"), "event_date_time");
        assert_eq!(snake_case("ID"), "id");
        assert_eq!(snake_case("UserID"), "user_id");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn describe_keeps_only_tagged_columns_in_declaration_order() {
        let fields = describe_schema(&stats_table()).unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.column_name.as_str()).collect();
        assert_eq!(names, ["event_name", "event_date", "msg"]);
        assert_eq!(fields[0].tags.len(), 2);
        assert_eq!(
            fields[0].tags[1],
            SchemaTag {
                name: "primary_key".into(),
                value: "1".into()
            }
        );
    }

    #[test]
    fn trailing_separator_is_ignored() {
        let tags = parse_schema_tag("c", "order_by=1;").unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn entry_without_equals_is_rejected() {
        let table = TableSchema::new("t").column(ColumnSchema::new("Name", "String").tag("order_by"));
        let err = describe_schema(&table).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedSchemaTag { ref column, ref entry } if column == "name" && entry == "order_by"
        ));
    }
}
