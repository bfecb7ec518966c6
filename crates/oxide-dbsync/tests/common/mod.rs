#![allow(dead_code)]

//! In-memory databases standing in for MySQL servers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use oxide_dbsync::prelude::*;

/// Host name the fake connector refuses to connect to.
pub const UNREACHABLE_HOST: &str = "unreachable";

/// A table definition with its rows, stored in column order.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub table: Table,
    pub rows: Vec<Vec<Value>>,
}

/// One fake database.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    pub version: String,
    pub tables: BTreeMap<String, MemoryTable>,
    /// Reading rows of this table fails.
    pub fail_on: Option<String>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            version: "8.0.36".to_string(),
            ..Self::default()
        }
    }

    /// Adds a table with text rows; `"NULL"` is stored as SQL NULL.
    pub fn with_table(mut self, table: Table, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| match *v {
                        "NULL" => Value::Null,
                        text => Value::from(text),
                    })
                    .collect()
            })
            .collect();
        self.tables
            .insert(table.name.clone(), MemoryTable { table, rows });
        self
    }

    pub fn fail_on(mut self, table: &str) -> Self {
        self.fail_on = Some(table.to_string());
        self
    }
}

/// Connects to one of two fake databases depending on the side.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    source: Arc<MemoryDatabase>,
    target: Arc<MemoryDatabase>,
    connections: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(source: MemoryDatabase, target: MemoryDatabase) -> Self {
        Self {
            source: Arc::new(source),
            target: Arc::new(target),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of connections opened so far.
    pub fn connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connections)
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, side: Side, params: &ConnectionParams) -> Result<MemoryConnection> {
        if params.host == UNREACHABLE_HOST {
            return Err(SyncError::Connection {
                side,
                source: sqlx::Error::PoolTimedOut,
            });
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        let db = match side {
            Side::Source => Arc::clone(&self.source),
            Side::Target => Arc::clone(&self.target),
        };
        Ok(MemoryConnection { db })
    }
}

/// A connection to a fake database.
pub struct MemoryConnection {
    db: Arc<MemoryDatabase>,
}

impl MemoryConnection {
    fn get(&self, name: &str) -> Result<&MemoryTable> {
        self.db
            .tables
            .get(name)
            .ok_or_else(|| SyncError::introspection(name, sqlx::Error::RowNotFound))
    }
}

impl SchemaProvider for MemoryConnection {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self.db.tables.keys().cloned().collect())
    }

    async fn describe_table(&mut self, name: &str) -> Result<Table> {
        let mut table = self.get(name)?.table.clone();
        table.rows = self.get(name)?.rows.len() as u64;
        Ok(table)
    }

    async fn show_create_table(&mut self, name: &str) -> Result<String> {
        let table = &self.get(name)?.table;
        let dialect = MySqlDialect::new();
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                format!(
                    "{} {}",
                    dialect.quote_identifier(&c.field),
                    dialect.column_definition(c)
                )
            })
            .collect();
        Ok(format!(
            "CREATE TABLE {} ({}) ENGINE={}",
            dialect.quote_identifier(&table.name),
            columns.join(", "),
            table.engine
        ))
    }

    async fn server_version(&mut self) -> Result<String> {
        Ok(self.db.version.clone())
    }
}

impl RowSource for MemoryConnection {
    async fn scan_rows<F>(&mut self, table: &str, fields: &[String], mut visit: F) -> Result<()>
    where
        F: FnMut(Vec<Value>) -> Result<()> + Send,
    {
        if self.db.fail_on.as_deref() == Some(table) {
            return Err(SyncError::introspection(table, sqlx::Error::PoolClosed));
        }
        let stored = self.get(table)?;
        let positions: Vec<usize> = fields
            .iter()
            .map(|f| {
                stored
                    .table
                    .columns
                    .iter()
                    .position(|c| &c.field == f)
                    .ok_or_else(|| {
                        SyncError::introspection(
                            table,
                            sqlx::Error::ColumnNotFound(f.clone()),
                        )
                    })
            })
            .collect::<Result<_>>()?;
        for row in &stored.rows {
            visit(positions.iter().map(|&i| row[i].clone()).collect())?;
        }
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// `users (id PK, name, email)`.
pub fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", "int(11)").not_null())
        .column(Column::new("name", "varchar(64)"))
        .column(Column::new("email", "varchar(255)"))
        .index(Index::primary(&["id"]))
}

/// `<name> (id PK, v)`.
pub fn simple(name: &str) -> Table {
    Table::new(name)
        .column(Column::new("id", "int(11)").not_null())
        .column(Column::new("v", "varchar(16)"))
        .index(Index::primary(&["id"]))
}

pub fn options() -> CompareOptions {
    CompareOptions::new(
        ConnectionParams::new("source-db", "shop"),
        ConnectionParams::new("target-db", "shop"),
    )
}

/// Runs a comparison between two fake databases.
pub async fn compare(
    source: MemoryDatabase,
    target: MemoryDatabase,
    options: CompareOptions,
) -> Result<String> {
    Dispatcher::new(MemoryConnector::new(source, target), options)
        .run()
        .await
}

/// Splits a script into its table blocks, keyed by table name.
pub fn blocks(script: &str) -> BTreeMap<String, Vec<String>> {
    let mut blocks = BTreeMap::new();
    for chunk in script.split("/* SYNC TABLE : `").skip(1) {
        let (name, rest) = chunk
            .split_once("` */\n")
            .unwrap_or_else(|| panic!("malformed block: {chunk}"));
        let body = rest.split("\n\n").next().unwrap_or_default();
        let statements = body.lines().map(str::to_string).collect();
        assert!(
            blocks.insert(name.to_string(), statements).is_none(),
            "table {name} has more than one block"
        );
    }
    blocks
}
