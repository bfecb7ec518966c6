//! Comparison options.
//!
//! These are built by the CLI (or by library callers) and validated before any
//! connection is attempted.

use std::fmt;

use regex::Regex;

use crate::error::{Result, SyncError};

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default MySQL port.
pub const DEFAULT_PORT: u16 = 3306;

/// How to reach one database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// User name.
    pub username: String,
    /// Password, empty for none.
    pub password: String,
    /// Schema (database) to compare.
    pub schema: String,
}

impl ConnectionParams {
    /// Creates parameters for `schema` on `host` with the default port.
    #[must_use]
    pub fn new(host: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            schema: schema.into(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }
}

// Keep the password out of logs.
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.username, self.host, self.port, self.schema)
    }
}

/// A list of table name patterns.
///
/// Each entry is a regular expression that must match the whole table name,
/// so plain names match only themselves.
#[derive(Debug, Clone)]
pub struct TableFilter {
    patterns: Vec<Regex>,
}

impl TableFilter {
    /// Parses a comma-separated list. Whitespace around commas is ignored.
    ///
    /// Returns `None` for an empty list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an entry that is not a valid regular
    /// expression.
    pub fn parse(list: &str) -> Result<Option<Self>> {
        let entries: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect();
        if entries.is_empty() {
            return Ok(None);
        }

        let patterns = entries
            .into_iter()
            .map(|entry| {
                Regex::new(&format!("^(?:{entry})$")).map_err(|err| {
                    SyncError::Configuration(format!("invalid table pattern '{entry}': {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self { patterns }))
    }

    /// Returns true if any pattern matches `table`.
    #[must_use]
    pub fn matches(&self, table: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(table))
    }
}

/// Everything a comparison run needs.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Database the target converges towards.
    pub source: ConnectionParams,
    /// Database the script is meant for.
    pub target: ConnectionParams,
    /// Compare schema only, never rows.
    pub no_data: bool,
    /// Number of workers, each with its own connection pair. Zero is treated
    /// as one.
    pub concurrency: usize,
    /// Only tables matching this filter are compared.
    pub whitelist: Option<TableFilter>,
    /// Tables matching this filter are compared schema-only.
    pub blacklist: Option<TableFilter>,
}

impl CompareOptions {
    /// Creates options comparing `source` with `target`, rows included.
    #[must_use]
    pub fn new(source: ConnectionParams, target: ConnectionParams) -> Self {
        Self {
            source,
            target,
            no_data: false,
            concurrency: DEFAULT_CONCURRENCY,
            whitelist: None,
            blacklist: None,
        }
    }

    /// Skips all row comparison.
    #[must_use]
    pub const fn no_data(mut self, no_data: bool) -> Self {
        self.no_data = no_data;
        self
    }

    /// Sets the number of workers.
    #[must_use]
    pub const fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the whitelist.
    #[must_use]
    pub fn whitelist(mut self, filter: Option<TableFilter>) -> Self {
        self.whitelist = filter;
        self
    }

    /// Sets the blacklist.
    #[must_use]
    pub fn blacklist(mut self, filter: Option<TableFilter>) -> Self {
        self.blacklist = filter;
        self
    }

    /// Checks the options before connecting.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a missing schema or host, or a zero
    /// port.
    pub fn validate(&self) -> Result<()> {
        for (side, params) in [("source", &self.source), ("target", &self.target)] {
            if params.schema.trim().is_empty() {
                return Err(SyncError::Configuration(format!(
                    "{side} schema is not specified"
                )));
            }
            if params.host.trim().is_empty() {
                return Err(SyncError::Configuration(format!(
                    "{side} host is not specified"
                )));
            }
            if params.port == 0 {
                return Err(SyncError::Configuration(format!("{side} port must not be 0")));
            }
        }
        Ok(())
    }

    /// Returns true if `table` passes the whitelist.
    #[must_use]
    pub fn is_whitelisted(&self, table: &str) -> bool {
        self.whitelist.as_ref().is_none_or(|f| f.matches(table))
    }

    /// Returns true if rows of `table` should be compared.
    #[must_use]
    pub fn syncs_data(&self, table: &str) -> bool {
        !self.no_data && !self.blacklist.as_ref().is_some_and(|f| f.matches(table))
    }
}
