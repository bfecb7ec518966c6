//! SQL dialect implementations.
//!
//! A dialect knows how to quote identifiers and values and how to spell each
//! statement and `ALTER TABLE` clause the comparison engine emits. Generated
//! scripts are only valid against servers speaking the same dialect.

mod mysql;

pub use mysql::MySqlDialect;

use crate::row::Value;
use crate::schema::{Column, Index};

/// Where a column lands in the table after an `ADD`/`MODIFY COLUMN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPosition<'a> {
    /// First column of the table.
    First,
    /// Right after the named column.
    After(&'a str),
}

impl<'a> ColumnPosition<'a> {
    /// Position of the column at `index` in `columns`.
    #[must_use]
    pub fn of(columns: &'a [Column], index: usize) -> Self {
        index
            .checked_sub(1)
            .and_then(|prev| columns.get(prev))
            .map_or(Self::First, |prev| Self::After(&prev.field))
    }
}

/// Trait for database-specific SQL generation.
pub trait SqlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Escapes the body of a string literal, without surrounding quotes.
    fn escape_string(&self, text: &str) -> String;

    /// Renders binary content that is not valid text.
    fn binary_literal(&self, bytes: &[u8]) -> String;

    /// Returns true if `default` is a current-timestamp keyword that must
    /// not be quoted.
    fn is_timestamp_keyword(&self, default: &str) -> bool;

    /// Renders a value as a literal.
    fn quote_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Text(text) => format!("'{}'", self.escape_string(text)),
            Value::Bytes(bytes) => self.binary_literal(bytes),
        }
    }

    /// Renders a column definition, without the column name.
    fn column_definition(&self, column: &Column) -> String;

    /// Renders the parenthesized column list of an index.
    fn index_columns(&self, index: &Index) -> String;

    /// `DROP TABLE`.
    fn drop_table_sql(&self, table: &str) -> String;

    /// `TRUNCATE TABLE`.
    fn truncate_table_sql(&self, table: &str) -> String;

    /// Combines clauses into a single `ALTER TABLE` statement.
    fn alter_table_sql(&self, table: &str, clauses: &[String]) -> String;

    /// `ADD COLUMN` clause.
    fn add_column_clause(&self, column: &Column, position: ColumnPosition<'_>) -> String;

    /// `MODIFY COLUMN` clause.
    fn modify_column_clause(&self, column: &Column, position: ColumnPosition<'_>) -> String;

    /// `DROP COLUMN` clause.
    fn drop_column_clause(&self, field: &str) -> String;

    /// Clause dropping `index`, which may be the primary key.
    fn drop_index_clause(&self, index: &Index) -> String;

    /// Clause adding `index`, which may be the primary key.
    fn add_index_clause(&self, index: &Index) -> String;

    /// Table option clause changing the storage engine.
    fn engine_clause(&self, engine: &str) -> String;

    /// Table option clause changing the table comment.
    fn table_comment_clause(&self, comment: &str) -> String;

    /// Multi-row `INSERT`. Without `fields` the rows must cover every column
    /// in table order.
    fn insert_sql(&self, table: &str, fields: Option<&[String]>, rows: &[Vec<Value>]) -> String;

    /// `UPDATE` of the `set` fields on the row matching `key`.
    fn update_sql(&self, table: &str, set: &[(&str, &Value)], key: &[(&str, &Value)]) -> String;

    /// `DELETE` of the row matching `key`.
    fn delete_sql(&self, table: &str, key: &[(&str, &Value)]) -> String;
}
