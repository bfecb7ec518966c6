//! Worker pool running the comparison.
//!
//! The dispatcher loads one snapshot per side, turns the union of table names
//! into a fixed queue of [`WorkItem`]s and spawns a pool of workers on a
//! [`JoinSet`]. Every worker opens its own connection pair, works on its own
//! clones of the snapshots and pulls items until the queue is empty. Finished
//! table blocks are appended to one shared buffer, under a lock held only for
//! the append.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::block::OutputBlock;
use crate::config::CompareOptions;
use crate::dialect::{MySqlDialect, SqlDialect};
use crate::differ::{TableChange, TableDiffer};
use crate::error::{Result, Side, SyncError};
use crate::provider::{Connector, RowSource, SchemaProvider};
use crate::reconciler::RowReconciler;
use crate::schema::Snapshot;
use crate::script;

/// One table pair to compare. At least one side is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Table name on the source, if it exists there.
    pub source: Option<String>,
    /// Table name on the target, if it exists there.
    pub target: Option<String>,
}

impl WorkItem {
    /// Name of the table, preferring the source side.
    #[must_use]
    pub fn name(&self) -> &str {
        self.source
            .as_deref()
            .or(self.target.as_deref())
            .unwrap_or_default()
    }
}

/// Pairs the tables of both snapshots by name, in name order.
///
/// A pair is skipped when any of its present names fails the whitelist.
#[must_use]
pub fn plan(source: &Snapshot, target: &Snapshot, options: &CompareOptions) -> Vec<WorkItem> {
    let names: BTreeSet<&str> = source.table_names().chain(target.table_names()).collect();
    names
        .into_iter()
        .map(|name| WorkItem {
            source: source.get_table(name).map(|t| t.name.clone()),
            target: target.get_table(name).map(|t| t.name.clone()),
        })
        .filter(|item| {
            let keep = [&item.source, &item.target]
                .into_iter()
                .flatten()
                .all(|name| options.is_whitelisted(name));
            if !keep {
                debug!(table = item.name(), "Skipping table outside the whitelist");
            }
            keep
        })
        .collect()
}

/// Runs a comparison across a pool of workers.
pub struct Dispatcher<C: Connector> {
    connector: Arc<C>,
    options: Arc<CompareOptions>,
}

impl<C: Connector> Dispatcher<C> {
    /// Creates a dispatcher opening connections through `connector`.
    #[must_use]
    pub fn new(connector: C, options: CompareOptions) -> Self {
        Self {
            connector: Arc::new(connector),
            options: Arc::new(options),
        }
    }

    /// Compares both databases and returns the synchronization script, or an
    /// empty string when they already match.
    ///
    /// # Errors
    ///
    /// Fails on invalid options before connecting. Once workers run, the first
    /// failing worker aborts the others and its error is returned.
    pub async fn run(&self) -> Result<String> {
        self.options.validate()?;
        let (source, target) = self.load_snapshots().await?;

        let items = plan(&source, &target, &self.options);
        let workers = self.options.concurrency.max(1).min(items.len());
        info!(
            tables = items.len(),
            workers,
            no_data = self.options.no_data,
            "Comparing databases"
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(items)));
        let buffer = Arc::new(Mutex::new(String::new()));

        let mut tasks = JoinSet::new();
        for id in 0..workers {
            let connector = Arc::clone(&self.connector);
            let options = Arc::clone(&self.options);
            let snapshots = (source.clone(), target.clone());
            let queue = Arc::clone(&queue);
            let buffer = Arc::clone(&buffer);
            tasks.spawn(async move {
                let mut worker = Worker::connect(id, &*connector, options, snapshots).await?;
                worker.run(&queue, &buffer).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(err) => {
                    tasks.abort_all();
                    return Err(SyncError::Worker(err.to_string()));
                }
            }
        }

        let blocks = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
        if blocks.is_empty() {
            info!("No difference between source and target");
        }
        Ok(script::assemble(&blocks))
    }

    async fn load_snapshots(&self) -> Result<(Snapshot, Snapshot)> {
        let mut snapshots = Vec::with_capacity(2);
        for (side, params) in [
            (Side::Source, &self.options.source),
            (Side::Target, &self.options.target),
        ] {
            let mut conn = self.connector.connect(side, params).await?;
            let mut snapshot = Snapshot::load(&params.schema, &mut conn).await?;
            let version = snapshot.server_version(&mut conn).await?;
            info!(%side, server = %params, version, "Loaded schema");
            snapshots.push(snapshot);
        }
        let target = snapshots.pop().unwrap_or_default();
        let source = snapshots.pop().unwrap_or_default();
        Ok((source, target))
    }
}

/// One member of the pool: a connection pair and private snapshot copies.
struct Worker<Conn> {
    id: usize,
    options: Arc<CompareOptions>,
    source_conn: Conn,
    target_conn: Conn,
    source: Snapshot,
    target: Snapshot,
    differ: TableDiffer<MySqlDialect>,
    reconciler: RowReconciler<MySqlDialect>,
}

impl<Conn: SchemaProvider + RowSource> Worker<Conn> {
    async fn connect<C>(
        id: usize,
        connector: &C,
        options: Arc<CompareOptions>,
        (source, target): (Snapshot, Snapshot),
    ) -> Result<Self>
    where
        C: Connector<Connection = Conn>,
    {
        let source_conn = connector.connect(Side::Source, &options.source).await?;
        let target_conn = connector.connect(Side::Target, &options.target).await?;
        let differ = TableDiffer::new(MySqlDialect::new());
        debug!(worker = id, dialect = differ.dialect().name(), "Worker connected");
        Ok(Self {
            id,
            options,
            source_conn,
            target_conn,
            source,
            target,
            differ,
            reconciler: RowReconciler::new(MySqlDialect::new()),
        })
    }

    async fn run(&mut self, queue: &Mutex<VecDeque<WorkItem>>, buffer: &Mutex<String>) -> Result<()> {
        let mut processed = 0usize;
        loop {
            let item = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some(item) = item else {
                break;
            };

            let block = self.process(&item).await?;
            processed += 1;
            if block.is_empty() {
                continue;
            }
            let rendered = block.render();
            buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_str(&rendered);
        }
        debug!(worker = self.id, processed, "Worker finished");
        Ok(())
    }

    async fn process(&mut self, item: &WorkItem) -> Result<OutputBlock> {
        let name = item.name();
        let mut block = OutputBlock::new(name);

        let source = item.source.as_deref().and_then(|n| self.source.tables.get(n));
        let mut target = item.target.as_deref().and_then(|n| self.target.tables.get_mut(n));
        let Some(change) = self.differ.diff(source, target.as_deref_mut()) else {
            return Ok(block);
        };
        let sync_data = self.options.syncs_data(name);
        debug!(worker = self.id, table = name, sync_data, "Comparing table");

        match (change, source) {
            (TableChange::Drop(sql), _) => block.drop = Some(sql),
            (TableChange::Create, Some(source)) => {
                block.create = Some(self.source_conn.show_create_table(&source.name).await?);
                if sync_data {
                    block.rows(self.reconciler.dump(&mut self.source_conn, source, false).await?);
                }
            }
            (TableChange::Alter(diff), Some(source)) => {
                block.alter = diff.statement(self.differ.dialect(), name);
                if sync_data {
                    let changes = match target.as_deref() {
                        Some(target) if !diff.identity_invalidated => {
                            self.reconciler
                                .reconcile(&mut self.source_conn, source, &mut self.target_conn, target)
                                .await?
                        }
                        _ => self.reconciler.dump(&mut self.source_conn, source, true).await?,
                    };
                    block.rows(changes);
                }
            }
            (_, None) => {}
        }
        Ok(block)
    }
}
