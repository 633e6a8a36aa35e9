use std::collections::BTreeMap;

use core_types::{SchemaField, TableSchema, describe_schema};

use crate::error::DbError;

const PRIMARY_KEY_TAG: &str = "primary_key";
const ORDER_BY_TAG: &str = "order_by";

/// The key clauses of a MergeTree table, derived from the columns' schema tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlOptions {
    pub primary_key: Vec<String>,
    pub order_by: Vec<String>,
}

impl DdlOptions {
    /// Collects `primary_key` and `order_by` positions from tagged fields.
    ///
    /// Positions are ordered as strings. A repeated position keeps the column
    /// declared last. Unknown tag names are ignored.
    pub fn from_fields(fields: &[SchemaField]) -> Self {
        let mut primary_key = BTreeMap::new();
        let mut order_by = BTreeMap::new();

        for field in fields {
            for tag in &field.tags {
                match tag.name.as_str() {
                    PRIMARY_KEY_TAG => {
                        primary_key.insert(tag.value.clone(), field.column_name.clone());
                    }
                    ORDER_BY_TAG => {
                        order_by.insert(tag.value.clone(), field.column_name.clone());
                    }
                    _ => {}
                }
            }
        }

        for (clause, positions) in [(PRIMARY_KEY_TAG, &primary_key), (ORDER_BY_TAG, &order_by)] {
            if !is_numerically_ordered(positions.keys()) {
                tracing::warn!(
                    clause,
                    positions = ?positions.keys().collect::<Vec<_>>(),
                    "Schema positions sort differently as text than as numbers; text order is used"
                );
            }
        }

        Self {
            primary_key: primary_key.into_values().collect(),
            order_by: order_by.into_values().collect(),
        }
    }

    /// Derives the options for one table.
    pub fn for_table(table: &TableSchema) -> Result<Self, DbError> {
        let fields = describe_schema(table)?;
        Ok(Self::from_fields(&fields))
    }

    /// Renders the text appended to `CREATE TABLE ... (...)`.
    pub fn render(&self) -> String {
        let mut lines = vec!["ENGINE MergeTree".to_string()];
        if !self.primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("ORDER BY ({})", self.order_by.join(", ")));
        }
        lines.join("\n")
    }
}

/// Builds the rendered table options straight from a schema description.
pub fn build_table_options(fields: &[SchemaField]) -> String {
    DdlOptions::from_fields(fields).render()
}

/// `true` when every key is an integer and text order matches numeric order,
/// or when a key is not an integer at all (nothing to compare against).
fn is_numerically_ordered<'a>(keys: impl Iterator<Item = &'a String>) -> bool {
    let mut previous: Option<i64> = None;
    for key in keys {
        let Ok(current) = key.parse::<i64>() else {
            return true;
        };
        if previous.is_some_and(|p| p > current) {
            return false;
        }
        previous = Some(current);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{ColumnSchema, CoreError};

    fn field(column: &str, tags: &[(&str, &str)]) -> SchemaField {
        SchemaField {
            field_name: column.to_string(),
            column_name: column.to_string(),
            tags: tags
                .iter()
                .map(|(name, value)| core_types::SchemaTag {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn positions_decide_column_order_not_declaration_order() {
        let fields = [
            field("col2", &[("order_by", "2")]),
            field("col1", &[("order_by", "1")]),
            field("colpk1", &[("primary_key", "1")]),
        ];
        let options = DdlOptions::from_fields(&fields);

        assert_eq!(options.order_by, ["col1", "col2"]);
        assert_eq!(options.primary_key, ["colpk1"]);
        assert_eq!(
            options.render(),
            "ENGINE MergeTree\nPRIMARY KEY (colpk1)\nORDER BY (col1, col2)"
        );
    }

    #[test]
    fn empty_clauses_are_omitted() {
        assert_eq!(build_table_options(&[]), "ENGINE MergeTree");

        let only_order = [field("a", &[("order_by", "1")])];
        assert_eq!(build_table_options(&only_order), "ENGINE MergeTree\nORDER BY (a)");
    }

    #[test]
    fn repeated_position_keeps_the_last_column() {
        let fields = [
            field("first", &[("order_by", "1")]),
            field("second", &[("order_by", "1")]),
        ];
        assert_eq!(DdlOptions::from_fields(&fields).order_by, ["second"]);
    }

    #[test]
    fn positions_are_compared_as_text() {
        let fields = [
            field("two", &[("order_by", "2")]),
            field("ten", &[("order_by", "10")]),
        ];
        assert_eq!(DdlOptions::from_fields(&fields).order_by, ["ten", "two"]);
        assert!(!is_numerically_ordered(["10".to_string(), "2".to_string()].iter()));
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let fields = [field("a", &[("codec", "ZSTD"), ("order_by", "1")])];
        let options = DdlOptions::from_fields(&fields);
        assert!(options.primary_key.is_empty());
        assert_eq!(options.order_by, ["a"]);
    }

    #[test]
    fn malformed_tag_is_a_schema_error() {
        let table = TableSchema::new("events")
            .column(ColumnSchema::new("EventName", "String").tag("order_by"));
        let err = DdlOptions::for_table(&table).unwrap_err();
        assert!(matches!(
            err,
            DbError::SchemaError(CoreError::MalformedSchemaTag { .. })
        ));
    }
}
