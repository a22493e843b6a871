//! SQLite-backed store executing declarative requests.
//!
//! The store owns the only connection to the database and exposes a single
//! [`Store::execute`] entry point that accepts a typed [`Request`]. Callers
//! describe the rows they want (or want changed) and never see SQL; porting
//! to another backend means reimplementing this module only.
//!
//! Mutations accumulate in an open transaction until [`Store::commit`]; a
//! store opened read-only refuses every mutation request.

use std::path::Path;

use color_eyre::{
    Result,
    eyre::{Context, bail},
};
use derive_more::{Debug, Display};
use itertools::Itertools as _;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use tracing::{debug, instrument};

use crate::hash::WriteVisitor;

/// The logical tables of the store.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum Table {
    /// `(hash, location)` — every place a fingerprint was observed.
    #[display("hash_index")]
    HashIndex,
    /// `(parent_hash, child_key, child_hash)` — the content graph edges.
    #[display("hash_graph")]
    HashGraph,
    /// `(hash, data)` — canonical serializations of primitive leaves.
    #[display("hash_to_data")]
    HashToData,
    /// `(doc_name, root_hash)` — the splicer's named document roots.
    #[display("reconstructed_docs")]
    ReconstructedDocs,
    /// Full-text index derived from `hash_to_data`.
    #[display("data_search_idx")]
    DataSearchIdx,
}

/// The columns usable in requests.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum Column {
    #[display("hash")]
    Hash,
    #[display("location")]
    Location,
    #[display("parent_hash")]
    ParentHash,
    #[display("child_key")]
    ChildKey,
    #[display("child_hash")]
    ChildHash,
    #[display("data")]
    Data,
    #[display("doc_name")]
    DocName,
    #[display("root_hash")]
    RootHash,
}

/// A projected column, optionally deduplicated.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Select {
    Column(Column),
    Distinct(Column),
}

/// Comparison applied by a [`Filter`]. Values are always bound as parameters.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Op {
    Eq(String),
    Like(String),
    /// Membership test; an empty list matches nothing.
    In(Vec<String>),
}

/// A `where` clause: one column compared against caller-supplied values.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Filter {
    pub column: Column,
    pub op: Op,
}

/// A row projection request.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Query {
    pub table: Table,
    pub select: Vec<Select>,
    pub filter: Option<Filter>,
    pub order_by: Option<Column>,
    pub limit: Option<usize>,
}

impl Query {
    /// Project `select` from `table` with no filter.
    pub fn new(table: Table, select: impl IntoIterator<Item = Select>) -> Self {
        Self {
            table,
            select: select.into_iter().collect(),
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    /// Restrict the query to rows where `column` matches `op`.
    pub fn filter(mut self, column: Column, op: Op) -> Self {
        self.filter = Some(Filter { column, op });
        self
    }

    /// Sort the returned rows by `column`, ascending.
    pub fn order_by(mut self, column: Column) -> Self {
        self.order_by = Some(column);
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A bulk insert of homogeneous rows.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Insert {
    pub table: Table,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    /// Silently drop rows that collide with an existing key.
    pub ignore: bool,
}

/// A row deletion; unconditional when `filter` is `None`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Delete {
    pub table: Table,
    pub filter: Option<Filter>,
}

/// A declarative request against the store.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Request {
    Query(Query),
    Insert(Insert),
    Delete(Delete),
    /// Rebuild the full-text index from the primitives table.
    RebuildFts(Table),
}

impl Request {
    fn is_mutation(&self) -> bool {
        !matches!(self, Request::Query(_))
    }
}

/// What a request produced: projected rows or an affected-row count.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Outcome {
    Rows(Vec<Vec<String>>),
    Affected(usize),
}

impl Outcome {
    /// The projected rows; errors if the request was a mutation.
    pub fn into_rows(self) -> Result<Vec<Vec<String>>> {
        match self {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => bail!("request did not return rows"),
        }
    }

    /// The affected-row count; errors if the request was a query.
    pub fn affected(self) -> Result<usize> {
        match self {
            Outcome::Affected(count) => Ok(count),
            Outcome::Rows(_) => bail!("request did not return an affected count"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Mode {
    ReadWrite,
    ReadOnly,
}

/// SQLite-backed store for the content graph.
#[derive(Debug)]
pub struct Store {
    #[debug("<connection>")]
    conn: Connection,
    mode: Mode,
}

impl Store {
    /// Open or create a store at the given path, read-write.
    ///
    /// The schema is created if missing and a transaction is opened; nothing
    /// written through [`Store::execute`] is durable until [`Store::commit`].
    #[instrument(name = "Store::open", skip(path))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {parent:?}"))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open store at {path:?}"))?;
        let store = Self {
            conn,
            mode: Mode::ReadWrite,
        };
        store.init_schema()?;
        store.begin()?;
        Ok(store)
    }

    /// Open an existing store read-only. Mutation requests are refused.
    #[instrument(name = "Store::open_read_only", skip(path))]
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("open store read-only at {path:?}"))?;
        Ok(Self {
            conn,
            mode: Mode::ReadOnly,
        })
    }

    /// Create an in-memory store, read-write. Used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        let store = Self {
            conn,
            mode: Mode::ReadWrite,
        };
        store.init_schema()?;
        store.begin()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS hash_index (
                    hash TEXT NOT NULL,
                    location TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_hash_index_hash
                ON hash_index(hash);
                CREATE INDEX IF NOT EXISTS idx_hash_index_location
                ON hash_index(location);

                CREATE TABLE IF NOT EXISTS hash_graph (
                    parent_hash TEXT NOT NULL,
                    child_key TEXT NOT NULL,
                    child_hash TEXT NOT NULL,
                    UNIQUE (parent_hash, child_key)
                );
                CREATE INDEX IF NOT EXISTS idx_hash_graph_child
                ON hash_graph(child_hash);

                CREATE TABLE IF NOT EXISTS hash_to_data (
                    hash TEXT PRIMARY KEY,
                    data TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reconstructed_docs (
                    doc_name TEXT PRIMARY KEY,
                    root_hash TEXT NOT NULL UNIQUE
                );

                CREATE VIRTUAL TABLE IF NOT EXISTS data_search_idx USING fts5(
                    hash UNINDEXED,
                    data,
                    content='hash_to_data',
                    content_rowid='rowid'
                );
                "#,
            )
            .context("initialize store schema")?;
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN DEFERRED")
            .context("begin transaction")
    }

    /// Durably record every mutation executed since the last commit.
    #[instrument(name = "Store::commit", skip(self))]
    pub fn commit(&self) -> Result<()> {
        if self.mode == Mode::ReadOnly {
            bail!("store is open read-only; nothing to commit");
        }
        self.conn
            .execute_batch("COMMIT")
            .context("commit transaction")?;
        self.begin()
    }

    /// Execute a declarative request, returning rows or an affected count.
    #[instrument(name = "Store::execute", skip(self, request))]
    pub fn execute(&self, request: Request) -> Result<Outcome> {
        if self.mode == Mode::ReadOnly && request.is_mutation() {
            bail!("store is open read-only; refusing {request:?}");
        }
        match request {
            Request::Query(query) => self.run_query(query),
            Request::Insert(insert) => self.run_insert(insert),
            Request::Delete(delete) => self.run_delete(delete),
            Request::RebuildFts(table) => self.run_rebuild_fts(table),
        }
    }

    fn run_query(&self, query: Query) -> Result<Outcome> {
        if query.select.is_empty() {
            bail!("query on {} selects no columns", query.table);
        }
        let select = query
            .select
            .iter()
            .map(|select| match select {
                Select::Column(column) => column.to_string(),
                Select::Distinct(column) => format!("DISTINCT {column}"),
            })
            .join(", ");

        let mut sql = format!("SELECT {select} FROM {}", query.table);
        let mut params = Vec::new();
        if let Some(filter) = &query.filter {
            let clause = filter.to_sql(&mut params);
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if let Some(column) = query.order_by {
            sql.push_str(&format!(" ORDER BY {column}"));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        debug!(%sql, params = params.len(), "query");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare {sql:?}"))?;
        let columns = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|index| row.get::<_, String>(index))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .with_context(|| format!("execute {sql:?}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read rows")?;
        Ok(Outcome::Rows(rows))
    }

    fn run_insert(&self, insert: Insert) -> Result<Outcome> {
        if insert.columns.is_empty() {
            bail!("insert into {} names no columns", insert.table);
        }
        let columns = insert.columns.iter().join(", ");
        let placeholders = insert.columns.iter().map(|_| "?").join(", ");
        let sql = format!(
            "INSERT {}INTO {} ({columns}) VALUES ({placeholders})",
            if insert.ignore { "OR IGNORE " } else { "" },
            insert.table,
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare {sql:?}"))?;
        let mut affected = 0;
        for row in &insert.rows {
            if row.len() != insert.columns.len() {
                bail!(
                    "insert into {} expects {} values per row, got {}",
                    insert.table,
                    insert.columns.len(),
                    row.len()
                );
            }
            affected += stmt
                .execute(params_from_iter(row.iter()))
                .with_context(|| format!("execute {sql:?}"))?;
        }
        debug!(table = %insert.table, rows = insert.rows.len(), affected, "insert");
        Ok(Outcome::Affected(affected))
    }

    fn run_delete(&self, delete: Delete) -> Result<Outcome> {
        let mut sql = format!("DELETE FROM {}", delete.table);
        let mut params = Vec::new();
        if let Some(filter) = &delete.filter {
            let clause = filter.to_sql(&mut params);
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        let affected = self
            .conn
            .execute(&sql, params_from_iter(params.iter()))
            .with_context(|| format!("execute {sql:?}"))?;
        debug!(table = %delete.table, affected, "delete");
        Ok(Outcome::Affected(affected))
    }

    fn run_rebuild_fts(&self, table: Table) -> Result<Outcome> {
        if table != Table::DataSearchIdx {
            bail!("{table} is not a full-text index");
        }
        // External-content FTS5 table; this re-reads hash_to_data wholesale.
        self.conn
            .execute(
                "INSERT INTO data_search_idx(data_search_idx) VALUES('rebuild')",
                [],
            )
            .context("rebuild full-text index")?;
        Ok(Outcome::Affected(0))
    }

    /// Truncate the four primary relations ahead of a full re-ingest.
    #[instrument(name = "Store::clear_primary", skip(self))]
    pub fn clear_primary(&self) -> Result<()> {
        for table in [
            Table::HashIndex,
            Table::HashGraph,
            Table::HashToData,
            Table::ReconstructedDocs,
        ] {
            self.execute(Request::Delete(Delete {
                table,
                filter: None,
            }))?
            .affected()?;
        }
        Ok(())
    }

    /// Bulk-insert the batches collected by a write visitor, then rebuild the
    /// full-text index. Graph and data rows deduplicate on their keys since
    /// identical subtrees across files repeat both.
    #[instrument(name = "Store::save_ingest", skip(self, visitor))]
    pub fn save_ingest(&self, visitor: &WriteVisitor) -> Result<()> {
        self.execute(Request::Insert(Insert {
            table: Table::HashIndex,
            columns: vec![Column::Hash, Column::Location],
            rows: visitor
                .index_rows
                .iter()
                .map(|(hash, location)| vec![hash.as_str().to_string(), location.clone()])
                .collect(),
            ignore: false,
        }))?;
        self.execute(Request::Insert(Insert {
            table: Table::HashGraph,
            columns: vec![Column::ParentHash, Column::ChildKey, Column::ChildHash],
            rows: visitor
                .graph_rows
                .iter()
                .map(|(parent, key, child)| {
                    vec![
                        parent.as_str().to_string(),
                        key.clone(),
                        child.as_str().to_string(),
                    ]
                })
                .collect(),
            ignore: true,
        }))?;
        self.execute(Request::Insert(Insert {
            table: Table::HashToData,
            columns: vec![Column::Hash, Column::Data],
            rows: visitor
                .data_rows
                .iter()
                .map(|(hash, data)| vec![hash.as_str().to_string(), data.clone()])
                .collect(),
            ignore: true,
        }))?;
        self.execute(Request::RebuildFts(Table::DataSearchIdx))?;
        Ok(())
    }

    /// Run a full-text query over primitive leaves, joined back to every
    /// location each matched leaf appeared at. Rows are `(data, location)`
    /// ordered by location. An invalid match expression surfaces as an error.
    #[instrument(name = "Store::search_data", skip(self))]
    pub fn search_data(&self, query: &str) -> Result<Vec<(String, String)>> {
        let sql = r#"
            SELECT s.data, i.location
            FROM data_search_idx s
            JOIN hash_index i ON s.hash = i.hash
            WHERE data_search_idx MATCH ?
            ORDER BY i.location
        "#;
        let mut stmt = self.conn.prepare(sql).context("prepare search query")?;
        let rows = stmt
            .query_map([query], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("execute search query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read search rows")?;
        Ok(rows)
    }
}

impl Filter {
    /// Render the clause, pushing bound values onto `params`.
    fn to_sql(&self, params: &mut Vec<String>) -> String {
        match &self.op {
            Op::Eq(value) => {
                params.push(value.clone());
                format!("{} = ?", self.column)
            }
            Op::Like(value) => {
                params.push(value.clone());
                format!("{} LIKE ?", self.column)
            }
            // Empty membership matches nothing instead of erroring.
            Op::In(values) if values.is_empty() => "1 = 0".to_string(),
            Op::In(values) => {
                let placeholders = values.iter().map(|_| "?").join(", ");
                params.extend(values.iter().cloned());
                format!("{} IN ({placeholders})", self.column)
            }
        }
    }
}
