//! End-to-end comparisons through the worker pool.
//!
//! Both databases are in-memory fakes, so every run exercises snapshot
//! loading, planning, the differ, the reconciler and script assembly without a
//! server.

mod common;

use std::sync::atomic::Ordering;

use common::*;
use oxide_dbsync::error::{CONFIGURATION_EXIT_CODE, FAILURE_EXIT_CODE};
use oxide_dbsync::prelude::*;

fn statements(script: &str, table: &str) -> Vec<String> {
    blocks(script).remove(table).unwrap_or_default()
}

// =============================================================================
// Whole-table changes
// =============================================================================

#[tokio::test]
async fn test_identical_databases_produce_empty_script() {
    let db = MemoryDatabase::new().with_table(users(), &[&["1", "ann", "ann@example.com"]]);
    let script = compare(db.clone(), db, options()).await.unwrap();
    assert_eq!(script, "");
}

#[tokio::test]
async fn test_empty_databases_produce_empty_script() {
    let script = compare(MemoryDatabase::new(), MemoryDatabase::new(), options())
        .await
        .unwrap();
    assert_eq!(script, "");
}

#[tokio::test]
async fn test_source_only_table_is_created_and_dumped() {
    let source = MemoryDatabase::new().with_table(simple("tags"), &[&["1", "a"], &["2", "b"]]);
    let script = compare(source, MemoryDatabase::new(), options()).await.unwrap();

    assert!(script.starts_with("/*!40101 SET NAMES utf8 */;"));
    assert_eq!(
        statements(&script, "tags"),
        vec![
            "CREATE TABLE `tags` (`id` int(11) NOT NULL, `v` varchar(16)) ENGINE=InnoDB;",
            "INSERT INTO `tags` VALUES ('1','a'),('2','b');",
        ]
    );
}

#[tokio::test]
async fn test_source_only_empty_table_has_no_insert() {
    let source = MemoryDatabase::new().with_table(simple("tags"), &[]);
    let script = compare(source, MemoryDatabase::new(), options()).await.unwrap();
    let block = statements(&script, "tags");
    assert_eq!(block.len(), 1);
    assert!(block[0].starts_with("CREATE TABLE `tags`"));
}

#[tokio::test]
async fn test_target_only_table_is_dropped() {
    let target = MemoryDatabase::new().with_table(simple("legacy"), &[&["1", "a"]]);
    let script = compare(MemoryDatabase::new(), target, options()).await.unwrap();
    assert_eq!(blocks(&script).len(), 1);
    assert_eq!(statements(&script, "legacy"), vec!["DROP TABLE `legacy`;"]);
}

// =============================================================================
// Row reconciliation
// =============================================================================

#[tokio::test]
async fn test_rows_round_trip() {
    let source = MemoryDatabase::new().with_table(simple("t"), &[&["1", "a"], &["2", "b"]]);
    let target = MemoryDatabase::new().with_table(simple("t"), &[&["1", "a"], &["3", "c"]]);
    let script = compare(source, target, options()).await.unwrap();
    assert_eq!(
        statements(&script, "t"),
        vec![
            "DELETE FROM `t` WHERE `id`='3';",
            "INSERT INTO `t` (`id`,`v`) VALUES ('2','b');",
        ]
    );
}

#[tokio::test]
async fn test_changed_field_is_updated() {
    let source = MemoryDatabase::new().with_table(simple("t"), &[&["1", "z"]]);
    let target = MemoryDatabase::new().with_table(simple("t"), &[&["1", "a"]]);
    let script = compare(source, target, options()).await.unwrap();
    assert_eq!(
        statements(&script, "t"),
        vec!["UPDATE `t` SET `v`='z' WHERE `id`='1';"]
    );
}

#[tokio::test]
async fn test_schema_and_rows_in_one_block() {
    let mut extended = users();
    extended
        .columns
        .push(Column::new("age", "int(11)").default_value("0"));
    let source = MemoryDatabase::new().with_table(extended, &[&["1", "ann", "a@x", "30"]]);
    let target = MemoryDatabase::new().with_table(users(), &[&["1", "ann", "a@x"]]);
    let script = compare(source, target, options()).await.unwrap();
    assert_eq!(
        statements(&script, "users"),
        vec![
            "ALTER TABLE `users` ADD COLUMN `age` int(11) DEFAULT '0' AFTER `email`;",
            "UPDATE `users` SET `age`='30' WHERE `id`='1';",
        ]
    );
}

#[tokio::test]
async fn test_primary_key_change_forces_full_dump() {
    let source = MemoryDatabase::new().with_table(simple("t"), &[&["1", "a"], &["2", "b"]]);
    let mut rekeyed = simple("t");
    rekeyed.indexes.clear();
    rekeyed = rekeyed.index(Index::primary(&["v"]));
    let target = MemoryDatabase::new().with_table(rekeyed, &[&["1", "a"], &["3", "c"]]);

    let script = compare(source, target, options()).await.unwrap();
    assert_eq!(
        statements(&script, "t"),
        vec![
            "TRUNCATE TABLE `t`;",
            "ALTER TABLE `t` DROP PRIMARY KEY, ADD PRIMARY KEY (`id`);",
            "INSERT INTO `t` VALUES ('1','a'),('2','b');",
        ]
    );
}

#[tokio::test]
async fn test_keyless_table_is_dumped_when_rows_differ() {
    let mut log = simple("log");
    log.indexes.clear();
    log.primary_key.clear();
    let source = MemoryDatabase::new().with_table(log.clone(), &[&["1", "a"], &["1", "a"]]);
    let target = MemoryDatabase::new().with_table(log, &[&["1", "a"]]);
    let script = compare(source, target, options()).await.unwrap();
    assert_eq!(
        statements(&script, "log"),
        vec![
            "TRUNCATE TABLE `log`;",
            "INSERT INTO `log` VALUES ('1','a'),('1','a');",
        ]
    );
}

// =============================================================================
// Filters
// =============================================================================

#[tokio::test]
async fn test_whitelist_skips_other_tables() {
    let source = MemoryDatabase::new()
        .with_table(simple("a"), &[&["1", "x"]])
        .with_table(simple("b"), &[&["1", "x"]]);
    let opts = options().whitelist(TableFilter::parse("b").unwrap());
    let script = compare(source, MemoryDatabase::new(), opts).await.unwrap();
    let blocks = blocks(&script);
    assert_eq!(blocks.keys().collect::<Vec<_>>(), vec!["b"]);
}

#[tokio::test]
async fn test_blacklist_compares_schema_only() {
    let mut source_audit = simple("audit");
    source_audit = source_audit.engine("MyISAM");
    let source = MemoryDatabase::new()
        .with_table(source_audit, &[&["1", "new"]])
        .with_table(simple("t"), &[&["1", "new"]]);
    let target = MemoryDatabase::new()
        .with_table(simple("audit"), &[&["1", "old"]])
        .with_table(simple("t"), &[&["1", "old"]]);
    let opts = options().blacklist(TableFilter::parse("aud.*").unwrap());

    let script = compare(source, target, opts).await.unwrap();
    assert_eq!(
        statements(&script, "audit"),
        vec!["ALTER TABLE `audit` ENGINE=MyISAM;"]
    );
    assert_eq!(
        statements(&script, "t"),
        vec!["UPDATE `t` SET `v`='new' WHERE `id`='1';"]
    );
}

#[tokio::test]
async fn test_no_data_skips_rows() {
    let source = MemoryDatabase::new().with_table(simple("t"), &[&["1", "a"]]);
    let script = compare(source.clone(), MemoryDatabase::new(), options().no_data(true))
        .await
        .unwrap();
    let block = statements(&script, "t");
    assert_eq!(block.len(), 1);
    assert!(block[0].starts_with("CREATE TABLE"));

    let target = MemoryDatabase::new().with_table(simple("t"), &[&["2", "b"]]);
    let script = compare(source, target, options().no_data(true)).await.unwrap();
    assert_eq!(script, "");
}

// =============================================================================
// Worker pool
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocks_stay_whole_with_many_workers() {
    let mut source = MemoryDatabase::new();
    let mut target = MemoryDatabase::new();
    for i in 0..40 {
        let name = format!("t{i:02}");
        let rows: Vec<Vec<String>> = (0..20)
            .map(|id| vec![id.to_string(), format!("{name}-{id}")])
            .collect();
        let rows: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        source = source.with_table(simple(&name), &rows);
        target = target.with_table(simple(&name), &rows[..10]);
    }

    let connector = MemoryConnector::new(source, target);
    let connections = connector.connections();
    let script = Dispatcher::new(connector, options().concurrency(8))
        .run()
        .await
        .unwrap();

    let blocks = blocks(&script);
    assert_eq!(blocks.len(), 40);
    for (name, statements) in &blocks {
        assert_eq!(statements.len(), 1, "{name}: {statements:?}");
        let insert = &statements[0];
        assert!(insert.starts_with(&format!("INSERT INTO `{name}` (`id`,`v`) VALUES ('10',")));
        assert_eq!(insert.matches(&format!("'{name}-")).count(), 10);
    }
    // One pair for loading the snapshots, one pair per worker.
    assert_eq!(connections.load(Ordering::SeqCst), 2 + 2 * 8);
}

#[tokio::test]
async fn test_workers_are_capped_by_table_count() {
    let source = MemoryDatabase::new().with_table(simple("only"), &[]);
    let connector = MemoryConnector::new(source, MemoryDatabase::new());
    let connections = connector.connections();
    Dispatcher::new(connector, options().concurrency(16))
        .run()
        .await
        .unwrap();
    assert_eq!(connections.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_zero_concurrency_runs_one_worker() {
    let source = MemoryDatabase::new()
        .with_table(simple("a"), &[])
        .with_table(simple("b"), &[]);
    let connector = MemoryConnector::new(source, MemoryDatabase::new());
    let connections = connector.connections();
    let script = Dispatcher::new(connector, options().concurrency(0))
        .run()
        .await
        .unwrap();
    assert_eq!(blocks(&script).len(), 2);
    assert_eq!(connections.load(Ordering::SeqCst), 4);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_configuration_error_is_raised_before_connecting() {
    let mut opts = options();
    opts.source.schema = String::new();
    let connector = MemoryConnector::new(MemoryDatabase::new(), MemoryDatabase::new());
    let connections = connector.connections();

    let err = Dispatcher::new(connector, opts).run().await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert_eq!(err.exit_code(), CONFIGURATION_EXIT_CODE);
    assert_eq!(connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connection_error() {
    let mut opts = options();
    opts.target.host = UNREACHABLE_HOST.to_string();
    let err = compare(MemoryDatabase::new(), MemoryDatabase::new(), opts)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Connection {
            side: Side::Target,
            ..
        }
    ));
    assert_eq!(err.exit_code(), FAILURE_EXIT_CODE);
}

#[tokio::test]
async fn test_read_error_fails_the_run() {
    let source = MemoryDatabase::new()
        .with_table(simple("ok"), &[&["1", "a"]])
        .with_table(simple("broken"), &[&["1", "a"]])
        .fail_on("broken");
    let target = MemoryDatabase::new()
        .with_table(simple("ok"), &[])
        .with_table(simple("broken"), &[]);

    let err = compare(source, target, options().concurrency(2))
        .await
        .unwrap_err();
    match err {
        SyncError::Introspection { table, .. } => assert_eq!(table, "broken"),
        other => panic!("Expected introspection error, got {other:?}"),
    }
}
