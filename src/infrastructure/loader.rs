//! Dataset Loader
//!
//! Builds a backing store from a raw snapshot the first time it is needed,
//! or opens the store built by an earlier run.
//!
//! Building is an exclusive, single-writer phase: the store is written to a
//! `.building` sibling and renamed into place only once complete, so no
//! reader ever sees a half-built store. After that a store is read-only;
//! refreshing it means a full rebuild from a new snapshot.

use crate::adapters::outbound::range_index_file::{self, side_file_path};
use crate::adapters::outbound::snapshot_reader::{self, SnapshotFormat};
use crate::adapters::outbound::{SortedRangeStore, SqliteExactStore, SqliteFullTextStore};
use crate::domain::ports::BackingStore;
use crate::domain::value_objects::Schema;
use crate::error::{GeoError, Result};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Page cache size, in pages, for opened stores.
const CACHE_SIZE_PAGES: i64 = 500_000;

/// Memory-map window for opened stores.
const MMAP_SIZE_BYTES: i64 = 500_000_000;

/// How a dataset is matched once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    FullText,
    SortedRange,
}

/// Everything needed to open or build one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub snapshot_path: PathBuf,
    pub store_path: PathBuf,
    pub schema: Schema,
    pub format: SnapshotFormat,
    pub strategy: MatchStrategy,
    /// Discard any existing store and rebuild from the snapshot.
    pub rebuild: bool,
}

impl DatasetSpec {
    pub fn new(
        snapshot_path: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
        schema: Schema,
        strategy: MatchStrategy,
    ) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            store_path: store_path.into(),
            schema,
            format: SnapshotFormat::default(),
            strategy,
            rebuild: false,
        }
    }

    /// Set the snapshot layout.
    pub fn format(mut self, format: SnapshotFormat) -> Self {
        self.format = format;
        self
    }

    /// Force a rebuild on the next open.
    pub fn rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    fn needs_build(&self) -> bool {
        self.rebuild || !self.store_path.is_file()
    }
}

/// Open or build the store described by `spec`, selecting the backing store
/// variant from its strategy.
pub fn open_or_build(spec: &DatasetSpec) -> Result<Box<dyn BackingStore>> {
    Ok(match spec.strategy {
        MatchStrategy::Exact => Box::new(open_exact(spec)?),
        MatchStrategy::FullText => Box::new(open_full_text(spec)?),
        MatchStrategy::SortedRange => Box::new(open_sorted_range(spec)?),
    })
}

/// Open or build an exact-match store.
pub fn open_exact(spec: &DatasetSpec) -> Result<SqliteExactStore> {
    let conn = prepare(spec, TableKind::Regular)?;
    Ok(SqliteExactStore::new(conn, spec.schema.clone()))
}

/// Open or build a full-text store.
///
/// Fails with `CapabilityUnavailable` before touching any file when the
/// linked SQLite lacks FTS5.
pub fn open_full_text(spec: &DatasetSpec) -> Result<SqliteFullTextStore> {
    open_full_text_checked(spec, fts5_available()?)
}

fn open_full_text_checked(spec: &DatasetSpec, fts5: bool) -> Result<SqliteFullTextStore> {
    require_fts5(fts5)?;
    let conn = prepare(spec, TableKind::FullText)?;
    Ok(SqliteFullTextStore::new(conn, spec.schema.clone()))
}

/// Open or build a sorted-range store and its range index side file.
pub fn open_sorted_range(spec: &DatasetSpec) -> Result<SortedRangeStore> {
    if spec.schema.range().is_none() {
        return Err(GeoError::load_failure(
            &spec.store_path,
            "schema declares no range column",
        ));
    }
    let conn = prepare(spec, TableKind::Regular)?;
    let bounds = load_bounds(spec, &conn)?;
    let table = SqliteExactStore::new(conn, spec.schema.clone());
    tracing::info!(ranges = bounds.len(), "sorted range index ready");
    Ok(SortedRangeStore::new(table, bounds))
}

/// Whether the linked SQLite was compiled with FTS5.
pub fn fts5_available() -> Result<bool> {
    let conn = Connection::open_in_memory()?;
    let used: i64 = conn.query_row("SELECT sqlite_compileoption_used('ENABLE_FTS5')", [], |row| {
        row.get(0)
    })?;
    Ok(used == 1)
}

fn require_fts5(available: bool) -> Result<()> {
    if available {
        return Ok(());
    }
    tracing::error!(
        "FTS5 extension not available in SQLite {}",
        rusqlite::version()
    );
    Err(GeoError::CapabilityUnavailable(format!(
        "FTS5 full-text search is not compiled into SQLite {}",
        rusqlite::version()
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Regular,
    FullText,
}

/// Build the store if needed, then open it for reading.
fn prepare(spec: &DatasetSpec, kind: TableKind) -> Result<Connection> {
    spec.schema.validate()?;
    if spec.needs_build() {
        build(spec, kind)?;
    }
    open_existing(spec, kind)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_stale(store_path: &Path) -> Result<()> {
    let stale = [
        store_path.to_path_buf(),
        sibling(store_path, "-wal"),
        sibling(store_path, "-shm"),
        sibling(store_path, ".building"),
        side_file_path(store_path),
    ];
    for path in &stale {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::warn!("removed stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn build(spec: &DatasetSpec, kind: TableKind) -> Result<()> {
    tracing::warn!(
        "building store {} from snapshot {}",
        spec.store_path.display(),
        spec.snapshot_path.display()
    );

    if !spec.snapshot_path.is_file() {
        return Err(GeoError::load_failure(
            &spec.snapshot_path,
            "snapshot file not found",
        ));
    }
    remove_stale(&spec.store_path)?;

    let building = sibling(&spec.store_path, ".building");
    let published = write_store(spec, kind, &building).and_then(|built| {
        std::fs::rename(&building, &spec.store_path)?;
        Ok(built)
    });
    let (rows, bounds) = match published {
        Ok(built) => built,
        Err(e) => {
            discard_partial(&building);
            return Err(e);
        }
    };

    if let Some(bounds) = bounds {
        range_index_file::write(&side_file_path(&spec.store_path), &bounds)?;
    }

    tracing::info!(
        rows,
        "store {} created",
        spec.store_path.display()
    );
    Ok(())
}

fn discard_partial(building: &Path) {
    match std::fs::remove_file(building) {
        Ok(()) => tracing::warn!("discarded partial store {}", building.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("cannot remove partial store {}: {}", building.display(), e),
    }
}

/// Write and commit the whole table to `building`, returning the row count
/// and, for range schemas, the validated bounds.
fn write_store(
    spec: &DatasetSpec,
    kind: TableKind,
    building: &Path,
) -> Result<(usize, Option<Vec<u32>>)> {
    let schema = &spec.schema;
    let mut conn = Connection::open(building)?;
    conn.pragma_update(None, "synchronous", "OFF")?;

    let tx = conn.transaction()?;
    tx.execute_batch(&create_table_sql(schema, kind))?;

    let rows = match &spec.format {
        SnapshotFormat::Delimited { .. } => {
            let placeholders: Vec<String> =
                (1..=schema.columns().len()).map(|i| format!("?{}", i)).collect();
            let insert = format!(
                "INSERT INTO \"{}\" VALUES ({})",
                schema.table(),
                placeholders.join(", ")
            );
            let mut stmt = tx.prepare(&insert)?;
            snapshot_reader::read_rows(&spec.snapshot_path, schema, &spec.format, |values| {
                stmt.execute(params_from_iter(values.iter()))?;
                Ok(())
            })?
        }
        SnapshotFormat::SqlScript { .. } => {
            let script = snapshot_reader::read_script(&spec.snapshot_path, &spec.format)?;
            tx.execute_batch(&script)?;
            row_count(&tx, schema)?
        }
    };

    if kind == TableKind::Regular {
        ensure_indices(&tx, schema)?;
    }

    // Validate before publishing so a bad range table never reaches readers.
    let bounds = match schema.range() {
        Some(_) => Some(derive_bounds(&tx, schema, &spec.store_path)?),
        None => None,
    };

    tx.commit()?;
    conn.close().map_err(|(_, e)| GeoError::Storage(e))?;
    Ok((rows, bounds))
}

fn create_table_sql(schema: &Schema, kind: TableKind) -> String {
    match kind {
        TableKind::Regular => {
            let columns: Vec<String> = schema
                .columns()
                .iter()
                .map(|c| format!("\"{}\" {}", c.name, c.kind.sql_type()))
                .collect();
            format!("CREATE TABLE \"{}\" ({});", schema.table(), columns.join(", "))
        }
        TableKind::FullText => {
            let columns: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
            format!(
                "CREATE VIRTUAL TABLE {} USING fts5({});",
                schema.table(),
                columns.join(", ")
            )
        }
    }
}

fn row_count(conn: &Connection, schema: &Schema) -> Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT count(*) FROM \"{}\"", schema.table()),
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Open a built store and switch it to the read-optimized persistence mode.
fn open_existing(spec: &DatasetSpec, kind: TableKind) -> Result<Connection> {
    let path = &spec.store_path;
    let corrupt = |e: rusqlite::Error| GeoError::load_failure(path, format!("store unreadable: {}", e));

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags).map_err(corrupt)?;

    apply_read_tuning(&conn).map_err(corrupt)?;

    let tables: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [spec.schema.table()],
            |row| row.get(0),
        )
        .map_err(corrupt)?;
    if tables == 0 {
        return Err(GeoError::load_failure(
            path,
            format!("store has no table {}", spec.schema.table()),
        ));
    }

    if kind == TableKind::Regular {
        ensure_indices(&conn, &spec.schema)?;
    }

    tracing::info!("store {} opened", path.display());
    Ok(conn)
}

/// WAL journal, large page cache and memory map, no fsync.
///
/// The store is read-only after load, so a crash cannot lose committed data.
fn apply_read_tuning(conn: &Connection) -> rusqlite::Result<()> {
    pragma(conn, "PRAGMA journal_mode = WAL")?;
    pragma(conn, &format!("PRAGMA cache_size = {}", CACHE_SIZE_PAGES))?;
    pragma(conn, &format!("PRAGMA mmap_size = {}", MMAP_SIZE_BYTES))?;
    pragma(conn, "PRAGMA synchronous = OFF")?;
    Ok(())
}

// Some pragmas report their new value as a row; step once and discard it.
fn pragma(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    rows.next()?;
    Ok(())
}

fn index_name(schema: &Schema, column: &str) -> String {
    format!("idx_{}_{}", schema.table(), column)
}

/// Create any declared index that does not exist yet.
fn ensure_indices(conn: &Connection, schema: &Schema) -> Result<()> {
    let existing: HashSet<String> = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index'")?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    for column in schema.indexed() {
        let name = index_name(schema, column);
        if existing.contains(&name) {
            tracing::debug!("index {} already exists", name);
            continue;
        }
        tracing::info!("creating index {} for column {}", name, column);
        conn.execute(
            &format!(
                "CREATE INDEX \"{}\" ON \"{}\"(\"{}\")",
                name,
                schema.table(),
                column
            ),
            [],
        )?;
    }
    Ok(())
}

/// Read the range column in storage order and check it can back a binary
/// search: every bound present, within u32, non-decreasing, and row
/// positions contiguous.
fn derive_bounds(conn: &Connection, schema: &Schema, store_path: &Path) -> Result<Vec<u32>> {
    let Some(range) = schema.range() else {
        return Err(GeoError::load_failure(store_path, "schema declares no range column"));
    };
    let table = schema.table();

    let (count, max_rowid): (i64, i64) = conn.query_row(
        &format!("SELECT count(*), coalesce(max(rowid), 0) FROM \"{}\"", table),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    if count != max_rowid {
        return Err(GeoError::load_failure(
            store_path,
            format!("{} rows but max rowid {}; positions are not contiguous", count, max_rowid),
        ));
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT \"{}\" FROM \"{}\" ORDER BY rowid",
        range, table
    ))?;
    let raw = stmt
        .query_map([], |row| row.get::<_, Option<i64>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut bounds = Vec::with_capacity(raw.len());
    for (position, value) in raw.into_iter().enumerate() {
        let bound = value.and_then(|v| u32::try_from(v).ok()).ok_or_else(|| {
            GeoError::load_failure(
                store_path,
                format!("row {} has no valid {} bound", position + 1, range),
            )
        })?;
        bounds.push(bound);
    }

    range_index_file::verify_sorted(&bounds)
        .map_err(|e| GeoError::load_failure(store_path, e.to_string()))?;
    Ok(bounds)
}

/// Load the side file, rederiving it from the store when it is missing,
/// unreadable or out of step with the table.
fn load_bounds(spec: &DatasetSpec, conn: &Connection) -> Result<Vec<u32>> {
    let side = side_file_path(&spec.store_path);
    let rows = row_count(conn, &spec.schema)?;

    if side.is_file() {
        match range_index_file::read(&side) {
            Ok(bounds) if bounds.len() == rows => {
                tracing::info!("range index file {} loaded", side.display());
                return Ok(bounds);
            }
            Ok(bounds) => tracing::warn!(
                "range index file has {} bounds but store has {} rows, rederiving",
                bounds.len(),
                rows
            ),
            Err(e) => tracing::warn!("{}, rederiving", e),
        }
    } else {
        tracing::info!("creating range index file {}", side.display());
    }

    let bounds = derive_bounds(conn, &spec.schema, &spec.store_path)?;
    range_index_file::write(&side, &bounds)?;
    Ok(bounds)
}
