//! oxide-dbsync CLI
//!
//! Compares two MySQL databases and writes the script that synchronizes the
//! target with the source.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_dbsync::config::{DEFAULT_CONCURRENCY, DEFAULT_PORT};
use oxide_dbsync::error::FAILURE_EXIT_CODE;
use oxide_dbsync::prelude::*;

/// Compare two MySQL databases and generate a synchronization script.
#[derive(Parser)]
#[command(name = "oxide-dbsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source server host.
    #[arg(long, env = "DBSYNC_SOURCE_HOST", default_value = "localhost")]
    source_host: String,

    /// Source server port.
    #[arg(long, env = "DBSYNC_SOURCE_PORT", default_value_t = DEFAULT_PORT)]
    source_port: u16,

    /// Source user name.
    #[arg(long, env = "DBSYNC_SOURCE_USER", default_value = "root")]
    source_user: String,

    /// Source password.
    #[arg(long, env = "DBSYNC_SOURCE_PASSWORD", default_value = "", hide_env_values = true)]
    source_password: String,

    /// Source schema.
    #[arg(long, env = "DBSYNC_SOURCE_SCHEMA", default_value = "")]
    source_schema: String,

    /// Target server host.
    #[arg(long, env = "DBSYNC_TARGET_HOST", default_value = "localhost")]
    target_host: String,

    /// Target server port.
    #[arg(long, env = "DBSYNC_TARGET_PORT", default_value_t = DEFAULT_PORT)]
    target_port: u16,

    /// Target user name.
    #[arg(long, env = "DBSYNC_TARGET_USER", default_value = "root")]
    target_user: String,

    /// Target password.
    #[arg(long, env = "DBSYNC_TARGET_PASSWORD", default_value = "", hide_env_values = true)]
    target_password: String,

    /// Target schema.
    #[arg(long, env = "DBSYNC_TARGET_SCHEMA", default_value = "")]
    target_schema: String,

    /// Number of tables compared in parallel.
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Only compare these tables (comma-separated patterns).
    #[arg(short, long, default_value = "")]
    whitelist: String,

    /// Compare these tables' schema only (comma-separated patterns).
    #[arg(short, long, default_value = "")]
    blacklist: String,

    /// Compare schema only, never rows.
    #[arg(long)]
    no_data: bool,

    /// Output file (`-` for stdout).
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Result<CompareOptions> {
        let source = ConnectionParams::new(&self.source_host, &self.source_schema)
            .port(self.source_port)
            .credentials(&self.source_user, &self.source_password);
        let target = ConnectionParams::new(&self.target_host, &self.target_schema)
            .port(self.target_port)
            .credentials(&self.target_user, &self.target_password);

        let options = CompareOptions::new(source, target)
            .no_data(self.no_data)
            .concurrency(self.concurrency)
            .whitelist(TableFilter::parse(&self.whitelist)?)
            .blacklist(TableFilter::parse(&self.blacklist)?);
        options.validate()?;

        if options.no_data && options.blacklist.is_some() {
            warn!("--blacklist has no effect together with --no-data");
        }
        Ok(options)
    }
}

fn write_output(path: &Path, script: &str) -> Result<()> {
    if path.as_os_str() == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(script.as_bytes())?;
        stdout.flush()?;
    } else {
        std::fs::write(path, script)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let options = cli.options()?;
    let script = oxide_dbsync::compare(options).await?;
    write_output(&cli.output, &script)
        .with_context(|| format!("cannot write {}", cli.output.display()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("cannot install logger: {err}");
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let code = err
                .downcast_ref::<SyncError>()
                .map_or(FAILURE_EXIT_CODE, SyncError::exit_code);
            ExitCode::from(code)
        }
    }
}
