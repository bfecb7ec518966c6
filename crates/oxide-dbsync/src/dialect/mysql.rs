//! MySQL dialect.
//!
//! Follows the quoting rules of `mysql_real_escape_string` and the
//! `ALTER TABLE` syntax shared by MySQL and MariaDB.

use std::fmt::Write as _;

use crate::row::Value;
use crate::schema::{Column, Index};

use super::{ColumnPosition, SqlDialect};

/// Marker MySQL 8 adds to `Extra` for expression defaults. It is not valid DDL.
const DEFAULT_GENERATED: &str = "DEFAULT_GENERATED";

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn column_clause(&self, verb: &str, column: &Column, position: ColumnPosition<'_>) -> String {
        let position = match position {
            ColumnPosition::First => "FIRST".to_string(),
            ColumnPosition::After(prev) => format!("AFTER {}", self.quote_identifier(prev)),
        };
        format!(
            "{verb} COLUMN {} {} {position}",
            self.quote_identifier(&column.field),
            self.column_definition(column)
        )
    }

    fn key_condition(&self, key: &[(&str, &Value)]) -> String {
        key.iter()
            .map(|(field, value)| {
                format!("{}={}", self.quote_identifier(field), self.quote_value(value))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn escape_string(&self, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '\0' => escaped.push_str("\\0"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\\' => escaped.push_str("\\\\"),
                '\'' => escaped.push_str("\\'"),
                '"' => escaped.push_str("\\\""),
                '\x1a' => escaped.push_str("\\Z"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        let mut literal = String::with_capacity(2 + bytes.len() * 2);
        literal.push_str("0x");
        for byte in bytes {
            let _ = write!(literal, "{byte:02X}");
        }
        literal
    }

    fn is_timestamp_keyword(&self, default: &str) -> bool {
        let upper = default.trim().to_ascii_uppercase();
        upper == "CURRENT_TIMESTAMP"
            || (upper.starts_with("CURRENT_TIMESTAMP(") && upper.ends_with(')'))
    }

    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![column.column_type.clone()];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = &column.default {
            if self.is_timestamp_keyword(default) {
                parts.push(format!("DEFAULT {default}"));
            } else {
                parts.push(format!("DEFAULT '{}'", self.escape_string(default)));
            }
        }

        let extra = column
            .extra
            .split_whitespace()
            .filter(|word| !word.eq_ignore_ascii_case(DEFAULT_GENERATED))
            .collect::<Vec<_>>()
            .join(" ");
        if !extra.is_empty() {
            parts.push(extra);
        }

        if !column.comment.is_empty() {
            parts.push(format!("COMMENT '{}'", self.escape_string(&column.comment)));
        }

        parts.join(" ")
    }

    fn index_columns(&self, index: &Index) -> String {
        let columns: Vec<String> = index
            .entries
            .iter()
            .map(|entry| {
                let mut column = self.quote_identifier(&entry.column_name);
                if let Some(len) = entry.sub_part {
                    let _ = write!(column, "({len})");
                }
                column
            })
            .collect();
        format!("({})", columns.join(", "))
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    fn truncate_table_sql(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.quote_identifier(table))
    }

    fn alter_table_sql(&self, table: &str, clauses: &[String]) -> String {
        format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        )
    }

    fn add_column_clause(&self, column: &Column, position: ColumnPosition<'_>) -> String {
        self.column_clause("ADD", column, position)
    }

    fn modify_column_clause(&self, column: &Column, position: ColumnPosition<'_>) -> String {
        self.column_clause("MODIFY", column, position)
    }

    fn drop_column_clause(&self, field: &str) -> String {
        format!("DROP COLUMN {}", self.quote_identifier(field))
    }

    fn drop_index_clause(&self, index: &Index) -> String {
        if index.is_primary() {
            "DROP PRIMARY KEY".to_string()
        } else {
            format!("DROP INDEX {}", self.quote_identifier(&index.name))
        }
    }

    fn add_index_clause(&self, index: &Index) -> String {
        let mut definition = vec!["ADD".to_string()];
        let columns = self.index_columns(index);
        let name = self.quote_identifier(&index.name);

        match index.first() {
            _ if index.is_primary() => definition.push(format!("PRIMARY KEY {columns}")),
            Some(first) if matches!(first.index_type.as_str(), "FULLTEXT" | "SPATIAL") => {
                definition.push(format!("{} INDEX {name} {columns}", first.index_type));
            }
            Some(first) if !first.non_unique => definition.push(format!(
                "UNIQUE KEY {name} USING {} {columns}",
                first.index_type
            )),
            Some(first) => {
                definition.push(format!("INDEX {name} USING {} {columns}", first.index_type));
            }
            None => definition.push(format!("INDEX {name} {columns}")),
        }

        if let Some(first) = index.first().filter(|e| !e.index_comment.is_empty()) {
            definition.push(format!(
                "COMMENT '{}'",
                self.escape_string(&first.index_comment)
            ));
        }

        definition.join(" ")
    }

    fn engine_clause(&self, engine: &str) -> String {
        format!("ENGINE={engine}")
    }

    fn table_comment_clause(&self, comment: &str) -> String {
        format!("COMMENT='{}'", self.escape_string(comment))
    }

    fn insert_sql(&self, table: &str, fields: Option<&[String]>, rows: &[Vec<Value>]) -> String {
        let mut sql = format!("INSERT INTO {}", self.quote_identifier(table));
        if let Some(fields) = fields {
            let quoted: Vec<String> = fields.iter().map(|f| self.quote_identifier(f)).collect();
            let _ = write!(sql, " ({})", quoted.join(","));
        }
        sql.push_str(" VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            let values: Vec<String> = row.iter().map(|v| self.quote_value(v)).collect();
            let _ = write!(sql, "({})", values.join(","));
        }
        sql
    }

    fn update_sql(&self, table: &str, set: &[(&str, &Value)], key: &[(&str, &Value)]) -> String {
        let assignments: Vec<String> = set
            .iter()
            .map(|(field, value)| {
                format!("{}={}", self.quote_identifier(field), self.quote_value(value))
            })
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.quote_identifier(table),
            assignments.join(", "),
            self.key_condition(key)
        )
    }

    fn delete_sql(&self, table: &str, key: &[(&str, &Value)]) -> String {
        format!(
            "DELETE FROM {} WHERE {}",
            self.quote_identifier(table),
            self.key_condition(key)
        )
    }
}
