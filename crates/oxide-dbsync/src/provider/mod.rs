//! Connections to the compared databases.
//!
//! The comparison engine only talks to a database through these traits: a
//! [`Connector`] opens connections, a [`SchemaProvider`] answers metadata
//! questions and a [`RowSource`] streams table contents. Connections are never
//! shared between workers; every worker opens its own pair.

mod mysql;

pub use mysql::{MySqlClient, MySqlConnector};

use std::future::Future;

use crate::config::ConnectionParams;
use crate::error::{Result, Side};
use crate::row::Value;
use crate::schema::Table;

/// Metadata queries against one database.
pub trait SchemaProvider: Send {
    /// Lists the base tables of the schema (views excluded).
    fn list_tables(&mut self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Reads the columns, indexes, engine, comment and primary key of a table.
    fn describe_table(&mut self, name: &str) -> impl Future<Output = Result<Table>> + Send;

    /// Returns the `CREATE TABLE` statement the server reports for a table.
    fn show_create_table(&mut self, name: &str) -> impl Future<Output = Result<String>> + Send;

    /// Returns the server version string.
    fn server_version(&mut self) -> impl Future<Output = Result<String>> + Send;
}

/// Forward-only reads of table contents.
pub trait RowSource: Send {
    /// Reads every row of `table`, restricted to `fields` in that order, and
    /// hands each one to `visit` as it arrives.
    ///
    /// Each call re-issues the read from the beginning. An error returned by
    /// `visit` stops the read and is propagated.
    fn scan_rows<F>(
        &mut self,
        table: &str,
        fields: &[String],
        visit: F,
    ) -> impl Future<Output = Result<()>> + Send
    where
        F: FnMut(Vec<Value>) -> Result<()> + Send;
}

/// Opens connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced.
    type Connection: SchemaProvider + RowSource + 'static;

    /// Connects to the database described by `params`.
    fn connect(
        &self,
        side: Side,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}
