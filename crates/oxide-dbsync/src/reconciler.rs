//! Row reconciler.
//!
//! Produces the DML that makes the target's rows equal to the source's. Rows
//! are matched by primary key: the source side is read into memory first, then
//! the target is streamed once against it. Tables whose rows cannot be matched
//! (no primary key, a primary key that changed, or a table that does not exist
//! on the target yet) are dumped in full instead.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::provider::RowSource;
use crate::row::{IdentityKey, Projection, Row, Value};
use crate::schema::Table;

/// Row statements for one table, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowChanges {
    /// `TRUNCATE TABLE` preceding a full dump.
    pub truncate: Option<String>,
    /// `DELETE` statements for target-only rows.
    pub delete: Vec<String>,
    /// `UPDATE` statements for rows whose fields differ.
    pub update: Vec<String>,
    /// One multi-row `INSERT` for source-only rows.
    pub insert: Option<String>,
}

impl RowChanges {
    /// Returns true if the rows already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.truncate.is_none()
            && self.delete.is_empty()
            && self.update.is_empty()
            && self.insert.is_none()
    }
}

/// Compares table contents.
#[derive(Debug, Clone, Default)]
pub struct RowReconciler<D: SqlDialect> {
    dialect: D,
}

impl<D: SqlDialect> RowReconciler<D> {
    /// Creates a reconciler emitting SQL in `dialect`.
    #[must_use]
    pub const fn new(dialect: D) -> Self {
        Self { dialect }
    }

    /// Copies every source row, optionally emptying the target table first.
    ///
    /// Rows are rendered with every column in source order. No `INSERT` is
    /// produced when the source table is empty.
    ///
    /// # Errors
    ///
    /// Fails when the source read fails.
    pub async fn dump<S: RowSource>(
        &self,
        source: &mut S,
        table: &Table,
        truncate: bool,
    ) -> Result<RowChanges> {
        let fields = table.field_names();
        let mut rows = Vec::new();
        source
            .scan_rows(&table.name, &fields, |values| {
                rows.push(values);
                Ok(())
            })
            .await?;
        debug!(table = %table.name, rows = rows.len(), truncate, "Dumping table");

        Ok(RowChanges {
            truncate: truncate.then(|| self.dialect.truncate_table_sql(&table.name)),
            insert: (!rows.is_empty()).then(|| self.dialect.insert_sql(&table.name, None, &rows)),
            ..RowChanges::default()
        })
    }

    /// Compares the rows of a table present on both sides.
    ///
    /// `source_table` and `target_table` are the definitions the reads are
    /// projected from. Keyless tables are compared as multisets and dumped
    /// when they differ.
    ///
    /// # Errors
    ///
    /// Fails when either read fails.
    pub async fn reconcile<S: RowSource, T: RowSource>(
        &self,
        source: &mut S,
        source_table: &Table,
        target: &mut T,
        target_table: &Table,
    ) -> Result<RowChanges> {
        if source_table.primary_key.is_empty() {
            return self.reconcile_keyless(source, source_table, target, target_table).await;
        }

        let name = source_table.name.as_str();
        let key_fields = &source_table.primary_key;
        let (source_fields, target_fields) = projections(source_table, target_table);
        let source_projection = Arc::new(Projection::new(source_fields));
        let target_projection = Arc::new(Projection::new(target_fields));

        // Source rows by identity key, kept in read order.
        let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
        let mut pending: Vec<Option<Row>> = Vec::new();
        source
            .scan_rows(name, source_projection.fields(), |values| {
                let row = Row::new(Arc::clone(&source_projection), values, key_fields);
                match positions.entry(row.key().clone()) {
                    Entry::Occupied(slot) => pending[*slot.get()] = Some(row),
                    Entry::Vacant(slot) => {
                        slot.insert(pending.len());
                        pending.push(Some(row));
                    }
                }
                Ok(())
            })
            .await?;
        let source_rows = pending.len();

        let mut changes = RowChanges::default();
        target
            .scan_rows(name, target_projection.fields(), |values| {
                let row = Row::new(Arc::clone(&target_projection), values, key_fields);
                let key = key_condition(key_fields, row.key());
                let Some(i) = positions.remove(row.key()) else {
                    changes.delete.push(self.dialect.delete_sql(name, &key));
                    return Ok(());
                };
                if let Some(wanted) = pending[i].take() {
                    let set: Vec<(&str, &Value)> = wanted
                        .projection()
                        .fields()
                        .iter()
                        .zip(wanted.values())
                        .filter(|(field, value)| row.get(field) != *value)
                        .map(|(field, value)| (field.as_str(), value))
                        .collect();
                    if !set.is_empty() {
                        changes.update.push(self.dialect.update_sql(name, &set, &key));
                    }
                }
                Ok(())
            })
            .await?;

        let inserts: Vec<Vec<Value>> = pending.into_iter().flatten().map(Row::into_values).collect();
        if !inserts.is_empty() {
            changes.insert = Some(self.dialect.insert_sql(
                name,
                Some(source_projection.fields()),
                &inserts,
            ));
        }

        debug!(
            table = name,
            source_rows,
            deletes = changes.delete.len(),
            updates = changes.update.len(),
            inserts = inserts.len(),
            "Reconciled rows"
        );
        Ok(changes)
    }

    async fn reconcile_keyless<S: RowSource, T: RowSource>(
        &self,
        source: &mut S,
        source_table: &Table,
        target: &mut T,
        target_table: &Table,
    ) -> Result<RowChanges> {
        let name = source_table.name.as_str();
        let fields = source_table.field_names();

        let mut rows: Vec<Vec<Value>> = Vec::new();
        source
            .scan_rows(name, &fields, |values| {
                rows.push(values);
                Ok(())
            })
            .await?;

        // Rows can only match when both sides project the same columns.
        let mut differs = fields != target_table.field_names();
        if !differs {
            let mut counts: HashMap<&[Value], i64> = HashMap::new();
            for row in &rows {
                *counts.entry(row.as_slice()).or_default() += 1;
            }
            target
                .scan_rows(name, &fields, |values| {
                    let Some(count) = counts.get_mut(values.as_slice()) else {
                        differs = true;
                        return Ok(());
                    };
                    *count -= 1;
                    Ok(())
                })
                .await?;
            differs |= counts.values().any(|&count| count != 0);
        }

        debug!(table = name, rows = rows.len(), differs, "Compared keyless table");
        if !differs {
            return Ok(RowChanges::default());
        }
        Ok(RowChanges {
            truncate: Some(self.dialect.truncate_table_sql(name)),
            insert: (!rows.is_empty()).then(|| self.dialect.insert_sql(name, None, &rows)),
            ..RowChanges::default()
        })
    }
}

/// Field lists for the source and target reads.
///
/// When the column lists differ, the source reads every field sorted by name
/// and the target reads the sorted fields both sides share.
fn projections(source: &Table, target: &Table) -> (Vec<String>, Vec<String>) {
    let source_fields = source.field_names();
    let target_fields = target.field_names();
    if source_fields == target_fields {
        return (source_fields, target_fields);
    }

    let mut shared: Vec<String> = target_fields
        .into_iter()
        .filter(|f| source.has_column(f))
        .collect();
    shared.sort();
    let mut all = source_fields;
    all.sort();
    (all, shared)
}

fn key_condition<'a>(fields: &'a [String], key: &'a IdentityKey) -> Vec<(&'a str, &'a Value)> {
    fields.iter().map(String::as_str).zip(key.iter()).collect()
}
