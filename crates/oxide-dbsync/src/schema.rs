//! Schema snapshot types.
//!
//! A [`Snapshot`] is the point-in-time metadata of one database: every table
//! with its ordered columns, its indexes and its primary key. Snapshots are
//! loaded once per side and deep-cloned for every worker, so a worker may
//! mutate its own copy while diffing without affecting anyone else.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::provider::SchemaProvider;

/// Name MySQL gives to the primary key index.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

/// A column as reported by `SHOW FULL COLUMNS`.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub field: String,
    /// Declared type, e.g. `varchar(255)` or `int(10) unsigned`.
    pub column_type: String,
    /// Collation; informational only.
    pub collation: Option<String>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Key flag (`PRI`, `UNI`, `MUL` or empty); informational only.
    pub key: String,
    /// Default value, `None` when the column has no default.
    pub default: Option<String>,
    /// Extra attributes such as `auto_increment`.
    pub extra: String,
    /// Column comment.
    pub comment: String,
}

impl Column {
    /// Creates a nullable column with no default, extra or comment.
    #[must_use]
    pub fn new(field: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            column_type: column_type.into(),
            collation: None,
            nullable: true,
            key: String::new(),
            default: None,
            extra: String::new(),
            comment: String::new(),
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the extra attributes.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Sets the comment. Carriage returns are removed.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into().replace('\r', "");
        self
    }

    /// Returns true when both columns render to the same definition.
    ///
    /// Collation, privileges and the key flag are not compared.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.column_type == other.column_type
            && self.nullable == other.nullable
            && self.default == other.default
            && self.extra == other.extra
            && self.comment == other.comment
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.same_definition(other)
    }
}

impl Eq for Column {}

/// One column's participation in an index, as reported by `SHOW INDEX`.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Index name.
    pub key_name: String,
    /// Participating column.
    pub column_name: String,
    /// Whether the index allows duplicates.
    pub non_unique: bool,
    /// 1-based position of the column inside the index.
    pub seq_in_index: u32,
    /// Prefix length for partially indexed string columns.
    pub sub_part: Option<u32>,
    /// Index method: `BTREE`, `HASH`, `FULLTEXT`, ...
    pub index_type: String,
    /// Index-level comment.
    pub index_comment: String,
    /// Number of distinct values; never compared.
    pub cardinality: Option<u64>,
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key_name == other.key_name
            && self.column_name == other.column_name
            && self.non_unique == other.non_unique
            && self.seq_in_index == other.seq_in_index
            && self.sub_part == other.sub_part
            && self.index_type == other.index_type
            && self.index_comment == other.index_comment
    }
}

impl Eq for IndexEntry {}

/// An index: one entry per participating column, in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name (`PRIMARY` for the primary key).
    pub name: String,
    /// Participating columns in `seq_in_index` order.
    pub entries: Vec<IndexEntry>,
}

impl Index {
    fn build(name: &str, columns: &[&str], non_unique: bool) -> Self {
        let entries = columns
            .iter()
            .enumerate()
            .map(|(i, column)| IndexEntry {
                key_name: name.to_string(),
                column_name: (*column).to_string(),
                non_unique,
                seq_in_index: u32::try_from(i + 1).unwrap_or(u32::MAX),
                sub_part: None,
                index_type: "BTREE".to_string(),
                index_comment: String::new(),
                cardinality: None,
            })
            .collect();
        Self {
            name: name.to_string(),
            entries,
        }
    }

    /// Creates a primary key over `columns`.
    #[must_use]
    pub fn primary(columns: &[&str]) -> Self {
        Self::build(PRIMARY_KEY_NAME, columns, false)
    }

    /// Creates a unique BTREE index.
    #[must_use]
    pub fn unique(name: &str, columns: &[&str]) -> Self {
        Self::build(name, columns, false)
    }

    /// Creates a non-unique BTREE index.
    #[must_use]
    pub fn non_unique(name: &str, columns: &[&str]) -> Self {
        Self::build(name, columns, true)
    }

    /// Sets the index method on every entry.
    #[must_use]
    pub fn using(mut self, index_type: &str) -> Self {
        for entry in &mut self.entries {
            entry.index_type = index_type.to_string();
        }
        self
    }

    /// Sets the index comment on every entry.
    #[must_use]
    pub fn comment(mut self, comment: &str) -> Self {
        for entry in &mut self.entries {
            entry.index_comment = comment.to_string();
        }
        self
    }

    /// Returns true for the primary key.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY_KEY_NAME
    }

    /// The first entry carries the index-wide attributes.
    #[must_use]
    pub fn first(&self) -> Option<&IndexEntry> {
        self.entries.first()
    }

    /// Participating column names, in index order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.column_name.as_str())
    }
}

/// A table's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Storage engine.
    pub engine: String,
    /// Table comment.
    pub comment: String,
    /// Approximate row count reported by the server.
    pub rows: u64,
    /// Columns in physical order.
    pub columns: Vec<Column>,
    /// Indexes by name.
    pub indexes: BTreeMap<String, Index>,
    /// Primary key fields, empty when the table has no primary key.
    pub primary_key: Vec<String>,
}

impl Table {
    /// Creates an empty InnoDB table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: "InnoDB".to_string(),
            comment: String::new(),
            rows: 0,
            columns: Vec::new(),
            indexes: BTreeMap::new(),
            primary_key: Vec::new(),
        }
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Sets the table comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index; a `PRIMARY` index also defines the primary key.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        if index.is_primary() {
            self.primary_key = index.column_names().map(str::to_string).collect();
        }
        self.indexes.insert(index.name.clone(), index);
        self
    }

    /// Records one `SHOW INDEX` row.
    ///
    /// Entries must arrive in `seq_in_index` order, which is how the server
    /// reports them.
    pub fn push_index_entry(&mut self, entry: IndexEntry) {
        if entry.key_name == PRIMARY_KEY_NAME {
            self.primary_key.push(entry.column_name.clone());
        }
        self.indexes
            .entry(entry.key_name.clone())
            .or_insert_with(|| Index {
                name: entry.key_name.clone(),
                entries: Vec::new(),
            })
            .entries
            .push(entry);
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Returns true if a column with this name exists.
    #[must_use]
    pub fn has_column(&self, field: &str) -> bool {
        self.get_column(field).is_some()
    }

    /// Column names in physical order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field.clone()).collect()
    }
}

/// All tables of one database.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Schema (database) name.
    pub schema: String,
    /// Tables by name.
    pub tables: BTreeMap<String, Table>,
    server_version: Option<String>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Self::default()
        }
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Reads every table's metadata through `provider`.
    ///
    /// # Errors
    ///
    /// Fails on the first metadata query that fails.
    pub async fn load<P: SchemaProvider>(schema: &str, provider: &mut P) -> Result<Self> {
        let mut snapshot = Self::new(schema);
        for name in provider.list_tables().await? {
            let table = provider.describe_table(&name).await?;
            tracing::debug!(schema, table = %table.name, columns = table.columns.len(), "Found table");
            snapshot.tables.insert(table.name.clone(), table);
        }
        Ok(snapshot)
    }

    /// Returns the server version, querying it on first use only.
    ///
    /// # Errors
    ///
    /// Fails when the version query fails.
    pub async fn server_version<P: SchemaProvider>(&mut self, provider: &mut P) -> Result<&str> {
        if self.server_version.is_none() {
            self.server_version = Some(provider.server_version().await?);
        }
        Ok(self.server_version.as_deref().unwrap_or_default())
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Returns table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
