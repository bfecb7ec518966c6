//! MySQL database comparison and synchronization scripts.
//!
//! `oxide-dbsync` compares a *source* and a *target* MySQL database and
//! produces one SQL script that, run against the target, makes it match the
//! source:
//! - Tables only the source has are created, tables only the target has are
//!   dropped
//! - Column, index, engine and comment drift is fixed with one `ALTER TABLE`
//!   per table
//! - Rows are reconciled by primary key with `INSERT`, `UPDATE` and `DELETE`
//!
//! The script is never executed by this crate.
//!
//! # Architecture
//!
//! - **Provider** - Connections answering metadata queries and streaming rows
//! - **Snapshot** - Point-in-time metadata of one database
//! - **Differ** - Turns two table definitions into DDL
//! - **Reconciler** - Turns two row streams into DML
//! - **Dispatcher** - Runs both over every table on a pool of workers
//! - **Dialect** - MySQL-specific quoting and statement syntax
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_dbsync::prelude::*;
//!
//! let options = CompareOptions::new(
//!     ConnectionParams::new("db1.internal", "shop").credentials("reader", "secret"),
//!     ConnectionParams::new("db2.internal", "shop").credentials("reader", "secret"),
//! )
//! .concurrency(8)
//! .blacklist(TableFilter::parse("audit_.*")?);
//!
//! let script = oxide_dbsync::compare(options).await?;
//! print!("{script}");
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Compare schema and rows, write the script to stdout
//! oxide-dbsync --source-host db1 --source-schema shop \
//!     --target-host db2 --target-schema shop
//!
//! # Compare schema only, for two tables, into a file
//! oxide-dbsync --source-schema shop --target-schema shop_copy \
//!     --no-data --whitelist "users,orders" --output sync.sql
//! ```

pub mod block;
pub mod config;
pub mod dialect;
pub mod differ;
pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod reconciler;
pub mod row;
pub mod schema;
pub mod script;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::block::OutputBlock;
    pub use crate::config::{CompareOptions, ConnectionParams, TableFilter};
    pub use crate::dialect::{ColumnPosition, MySqlDialect, SqlDialect};
    pub use crate::differ::{AlterDiff, ColumnChange, TableChange, TableDiffer};
    pub use crate::dispatcher::{Dispatcher, WorkItem};
    pub use crate::error::{Result, Side, SyncError};
    pub use crate::provider::{Connector, MySqlClient, MySqlConnector, RowSource, SchemaProvider};
    pub use crate::reconciler::{RowChanges, RowReconciler};
    pub use crate::row::{IdentityKey, Projection, Row, Value};
    pub use crate::schema::{Column, Index, IndexEntry, Snapshot, Table};
}

/// Compares two MySQL databases and returns the synchronization script.
///
/// Returns an empty string when the target already matches the source.
///
/// # Errors
///
/// Fails on invalid options, on a connection failure and on the first query
/// that fails while a table is compared.
pub async fn compare(options: config::CompareOptions) -> error::Result<String> {
    dispatcher::Dispatcher::new(provider::MySqlConnector::new(), options)
        .run()
        .await
}
