//! # Launchpad Core Types
//!
//! Leaf crate shared by every other crate in the workspace. It owns no
//! resources and performs no I/O.
//!
//! - `ErrorContext` / `ContextError`: the dotted call-path naming used to
//!   prefix every error with the operation that produced it.
//! - `TableSchema` / `TableModel`: the abstract description a persisted model
//!   exposes to the migrators, plus the schema-tag parsing built on it.

pub mod context;
pub mod error;
pub mod schema;

// Re-export the core types to provide a clean public API.
pub use context::{BoxError, ContextError, ContextResult, ErrorContext, MethodWrapper, WrapErr};
pub use error::CoreError;
pub use schema::{
    ColumnSchema, SchemaField, SchemaTag, TableModel, TableSchema, describe_schema, parse_schema_tag,
    snake_case,
};

/// Returns `value` unless it is the type's empty value, in which case `fallback`.
///
/// Used wherever an optional override falls back to a configured default.
pub fn first_non_empty<T: Default + PartialEq>(value: T, fallback: T) -> T {
    if value == T::default() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::first_non_empty;

    #[test]
    fn first_non_empty_prefers_the_override() {
        assert_eq!(first_non_empty(String::from("media"), String::from("default")), "media");
        assert_eq!(first_non_empty(String::new(), String::from("default")), "default");
        assert_eq!(first_non_empty(0_i32, 1000), 1000);
    }
}
