//! Table differ.
//!
//! Compares the metadata of one table on both sides and produces the DDL that
//! turns the target's definition into the source's: `DROP TABLE` when only the
//! target has it, a `CREATE TABLE` request when only the source has it, and a
//! single `ALTER TABLE` covering column, index and table option drift
//! otherwise.
//!
//! Columns are compared positionally against a working copy of the target
//! column list. A column found at another position is swapped into place in
//! the working copy and redefined with `MODIFY COLUMN ... AFTER <previous
//! source column>`, so later clauses of the same statement reference columns
//! placed by earlier ones.

use tracing::debug;

use crate::dialect::{ColumnPosition, SqlDialect};
use crate::schema::{Column, Table};

/// One column clause of an `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    /// Remove a column the source does not have.
    Drop {
        /// Column name.
        field: String,
    },
    /// Add a column the target does not have.
    Add {
        /// Source definition.
        column: Column,
        /// Column it follows, `None` for first.
        after: Option<String>,
    },
    /// Redefine and/or relocate an existing column.
    Modify {
        /// Source definition.
        column: Column,
        /// Column it follows, `None` for first.
        after: Option<String>,
    },
}

impl ColumnChange {
    /// Renders the clause.
    #[must_use]
    pub fn to_sql<D: SqlDialect>(&self, dialect: &D) -> String {
        match self {
            Self::Drop { field } => dialect.drop_column_clause(field),
            Self::Add { column, after } => {
                dialect.add_column_clause(column, position_after(after.as_deref()))
            }
            Self::Modify { column, after } => {
                dialect.modify_column_clause(column, position_after(after.as_deref()))
            }
        }
    }
}

fn position_after(after: Option<&str>) -> ColumnPosition<'_> {
    after.map_or(ColumnPosition::First, ColumnPosition::After)
}

/// Schema changes for a table present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlterDiff {
    /// Clauses in emission order.
    pub clauses: Vec<String>,
    /// True when the primary key was dropped or added, so rows can no longer
    /// be matched by identity key.
    pub identity_invalidated: bool,
}

impl AlterDiff {
    /// Returns true if the table definitions already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Combines the clauses into one statement, `None` if there are none.
    #[must_use]
    pub fn statement<D: SqlDialect>(&self, dialect: &D, table: &str) -> Option<String> {
        (!self.clauses.is_empty()).then(|| dialect.alter_table_sql(table, &self.clauses))
    }
}

/// What has to happen to a table's definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    /// Only the target has the table.
    Drop(String),
    /// Only the source has the table; its `CREATE TABLE` must be replayed.
    Create,
    /// Both sides have the table.
    Alter(AlterDiff),
}

/// Compares table definitions.
#[derive(Debug, Clone, Default)]
pub struct TableDiffer<D: SqlDialect> {
    dialect: D,
}

impl<D: SqlDialect> TableDiffer<D> {
    /// Creates a differ emitting SQL in `dialect`.
    #[must_use]
    pub const fn new(dialect: D) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Compares one table pair.
    ///
    /// The target's index map is consumed while diffing: indexes that are
    /// dropped are removed from it. Pass a table owned by the caller.
    /// Returns `None` when neither side has a table.
    pub fn diff(&self, source: Option<&Table>, target: Option<&mut Table>) -> Option<TableChange> {
        match (source, target) {
            (None, None) => None,
            (None, Some(target)) => Some(TableChange::Drop(
                self.dialect.drop_table_sql(&target.name),
            )),
            (Some(_), None) => Some(TableChange::Create),
            (Some(source), Some(target)) => Some(TableChange::Alter(self.diff_alter(source, target))),
        }
    }

    /// Computes the `ALTER TABLE` clauses for a table present on both sides.
    pub fn diff_alter(&self, source: &Table, target: &mut Table) -> AlterDiff {
        let mut diff = AlterDiff::default();

        diff.clauses.extend(
            self.diff_columns(&source.columns, &target.columns)
                .iter()
                .map(|change| change.to_sql(&self.dialect)),
        );
        self.diff_indexes(source, target, &mut diff);

        if source.engine != target.engine {
            diff.clauses.push(self.dialect.engine_clause(&source.engine));
        }
        if source.comment != target.comment {
            diff.clauses
                .push(self.dialect.table_comment_clause(&source.comment));
        }

        if !diff.is_empty() {
            debug!(
                table = %source.name,
                clauses = diff.clauses.len(),
                identity_invalidated = diff.identity_invalidated,
                "Table definition differs"
            );
        }
        diff
    }

    /// Computes the column clauses turning `target` into `source`.
    #[must_use]
    pub fn diff_columns(&self, source: &[Column], target: &[Column]) -> Vec<ColumnChange> {
        let mut changes = Vec::new();
        let in_source = |field: &str| source.iter().any(|c| c.field == field);

        let mut working: Vec<Column> = Vec::with_capacity(source.len());
        for column in target {
            if in_source(&column.field) {
                working.push(column.clone());
            } else {
                changes.push(ColumnChange::Drop {
                    field: column.field.clone(),
                });
            }
        }

        for (i, column) in source.iter().enumerate() {
            let after = match ColumnPosition::of(source, i) {
                ColumnPosition::After(prev) => Some(prev.to_string()),
                ColumnPosition::First => None,
            };

            let change = match working.iter().position(|c| c.field == column.field) {
                None => {
                    working.insert(i.min(working.len()), column.clone());
                    ColumnChange::Add {
                        column: column.clone(),
                        after,
                    }
                }
                Some(j) if j == i => {
                    if working[j].same_definition(column) {
                        continue;
                    }
                    ColumnChange::Modify {
                        column: column.clone(),
                        after,
                    }
                }
                Some(j) => {
                    working.swap(i, j);
                    ColumnChange::Modify {
                        column: column.clone(),
                        after,
                    }
                }
            };
            changes.push(change);
        }

        changes
    }

    /// Appends the index clauses, removing dropped indexes from `target`.
    fn diff_indexes(&self, source: &Table, target: &mut Table, diff: &mut AlterDiff) {
        let obsolete: Vec<String> = target
            .indexes
            .keys()
            .filter(|name| !source.indexes.contains_key(*name))
            .cloned()
            .collect();
        for name in obsolete {
            if let Some(index) = target.indexes.remove(&name) {
                diff.identity_invalidated |= index.is_primary();
                diff.clauses.push(self.dialect.drop_index_clause(&index));
            }
        }

        for (name, index) in &source.indexes {
            if target.indexes.get(name).is_some_and(|t| t != index) {
                if let Some(stale) = target.indexes.remove(name) {
                    diff.identity_invalidated |= stale.is_primary();
                    diff.clauses.push(self.dialect.drop_index_clause(&stale));
                }
            }
            if !target.indexes.contains_key(name) {
                diff.identity_invalidated |= index.is_primary();
                diff.clauses.push(self.dialect.add_index_clause(index));
            }
        }
    }
}
