//! MySQL connections built on `sqlx`.
//!
//! Every query goes through the text protocol (`raw_sql`), so each value
//! arrives in the server's canonical string form regardless of column type.
//! That is the form rows are compared and rendered in.

use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{ConnectOptions, Row};
use tracing::debug;

use crate::config::ConnectionParams;
use crate::dialect::{MySqlDialect, SqlDialect};
use crate::error::{Result, Side, SyncError};
use crate::row::Value;
use crate::schema::{Column, IndexEntry, Table};

use super::{Connector, RowSource, SchemaProvider};

/// Opens [`MySqlClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    /// Creates a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for MySqlConnector {
    type Connection = MySqlClient;

    async fn connect(&self, side: Side, params: &ConnectionParams) -> Result<MySqlClient> {
        debug!(%side, server = %params, "Connecting");
        let options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .password(&params.password)
            .database(&params.schema)
            .charset("utf8mb4")
            .timezone(None::<String>)
            .disable_statement_logging();

        let conn = options
            .connect()
            .await
            .map_err(|source| SyncError::Connection { side, source })?;

        Ok(MySqlClient {
            conn,
            schema: params.schema.clone(),
            dialect: MySqlDialect::new(),
        })
    }
}

/// One MySQL connection, owned by a single worker.
pub struct MySqlClient {
    conn: sqlx::MySqlConnection,
    schema: String,
    dialect: MySqlDialect,
}

impl MySqlClient {
    async fn fetch_all(&mut self, sql: &str) -> std::result::Result<Vec<MySqlRow>, sqlx::Error> {
        debug!(sql, "Executing SQL");
        sqlx::raw_sql(sql)
            .fetch(&mut self.conn)
            .try_collect::<Vec<_>>()
            .await
    }

    async fn fetch_table(&mut self, table: &str, sql: &str) -> Result<Vec<MySqlRow>> {
        self.fetch_all(sql)
            .await
            .map_err(|e| SyncError::introspection(table, e))
    }

    fn literal(&self, text: &str) -> String {
        format!("'{}'", self.dialect.escape_string(text))
    }
}

fn text_at<I>(row: &MySqlRow, index: I) -> std::result::Result<Option<String>, sqlx::Error>
where
    I: sqlx::ColumnIndex<MySqlRow>,
{
    let bytes: Option<Vec<u8>> = row.try_get_unchecked(index)?;
    Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

fn column_from_row(row: &MySqlRow) -> std::result::Result<Column, sqlx::Error> {
    let mut column = Column::new(
        text_at(row, "Field")?.unwrap_or_default(),
        text_at(row, "Type")?.unwrap_or_default(),
    )
    .extra(text_at(row, "Extra")?.unwrap_or_default())
    .comment(text_at(row, "Comment")?.unwrap_or_default());
    column.collation = text_at(row, "Collation")?;
    column.nullable = text_at(row, "Null")?.as_deref() == Some("YES");
    column.key = text_at(row, "Key")?.unwrap_or_default();
    column.default = text_at(row, "Default")?;
    Ok(column)
}

fn index_entry_from_row(row: &MySqlRow) -> std::result::Result<IndexEntry, sqlx::Error> {
    let number = |name: &str| -> std::result::Result<Option<u64>, sqlx::Error> {
        Ok(text_at(row, name)?.and_then(|s| s.trim().parse().ok()))
    };
    Ok(IndexEntry {
        key_name: text_at(row, "Key_name")?.unwrap_or_default(),
        column_name: text_at(row, "Column_name")?.unwrap_or_default(),
        non_unique: number("Non_unique")?.unwrap_or(1) != 0,
        seq_in_index: number("Seq_in_index")?
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        sub_part: number("Sub_part")?.and_then(|n| u32::try_from(n).ok()),
        index_type: text_at(row, "Index_type")?.unwrap_or_default(),
        index_comment: text_at(row, "Index_comment")?.unwrap_or_default(),
        cardinality: number("Cardinality")?,
    })
}

impl SchemaProvider for MySqlClient {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        debug!(schema = %self.schema, "Listing tables");
        let sql = format!(
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = {} AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
            self.literal(&self.schema)
        );
        let schema = self.schema.clone();
        let rows = self.fetch_table(&schema, &sql).await?;
        rows.iter()
            .map(|row| {
                text_at(row, 0usize)
                    .map(Option::unwrap_or_default)
                    .map_err(|e| SyncError::introspection(&schema, e))
            })
            .collect()
    }

    async fn describe_table(&mut self, name: &str) -> Result<Table> {
        let quoted = self.dialect.quote_identifier(name);

        let status_sql = format!("SHOW TABLE STATUS WHERE Name = {}", self.literal(name));
        let status = self.fetch_table(name, &status_sql).await?;
        let Some(status) = status.first() else {
            return Err(SyncError::introspection(name, sqlx::Error::RowNotFound));
        };
        let read = |e| SyncError::introspection(name, e);
        let mut table = Table::new(name)
            .engine(text_at(status, "Engine").map_err(read)?.unwrap_or_default())
            .comment(text_at(status, "Comment").map_err(read)?.unwrap_or_default());
        table.rows = text_at(status, "Rows")
            .map_err(read)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let columns = self
            .fetch_table(name, &format!("SHOW FULL COLUMNS FROM {quoted}"))
            .await?;
        for row in &columns {
            table.columns.push(column_from_row(row).map_err(read)?);
        }

        let indexes = self
            .fetch_table(name, &format!("SHOW INDEX FROM {quoted}"))
            .await?;
        for row in &indexes {
            table.push_index_entry(index_entry_from_row(row).map_err(read)?);
        }

        Ok(table)
    }

    async fn show_create_table(&mut self, name: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", self.dialect.quote_identifier(name));
        let rows = self.fetch_table(name, &sql).await?;
        let row = rows
            .first()
            .ok_or_else(|| SyncError::introspection(name, sqlx::Error::RowNotFound))?;
        let definition = text_at(row, 1usize)
            .map_err(|e| SyncError::introspection(name, e))?
            .unwrap_or_default();
        Ok(definition.replace('\n', ""))
    }

    async fn server_version(&mut self) -> Result<String> {
        let rows = self.fetch_all("SELECT VERSION()").await?;
        Ok(rows
            .first()
            .map(|row| text_at(row, 0usize))
            .transpose()?
            .flatten()
            .unwrap_or_default())
    }
}

impl RowSource for MySqlClient {
    async fn scan_rows<F>(&mut self, table: &str, fields: &[String], mut visit: F) -> Result<()>
    where
        F: FnMut(Vec<Value>) -> Result<()> + Send,
    {
        if fields.is_empty() {
            return Ok(());
        }
        let columns: Vec<String> = fields
            .iter()
            .map(|f| self.dialect.quote_identifier(f))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}",
            columns.join(","),
            self.dialect.quote_identifier(table)
        );
        debug!(sql, "Streaming rows");

        let mut rows = sqlx::raw_sql(&sql).fetch(&mut self.conn);
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| SyncError::introspection(table, e))?
        {
            let values = (0..row.len())
                .map(|i| {
                    row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
                        .map(Value::from_bytes)
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SyncError::introspection(table, e))?;
            visit(values)?;
        }
        Ok(())
    }
}
