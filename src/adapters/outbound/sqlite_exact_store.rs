//! SQLite Exact-Match Store
//!
//! Implements BackingStore with exact equality predicates over a regular
//! SQLite table. Used for country-level data, where the dataset is small and
//! the queried columns are indexed.

use crate::adapters::outbound::sqlite_rows::{column_list, quote, read_record};
use crate::domain::entities::ReferenceRecord;
use crate::domain::ports::BackingStore;
use crate::domain::value_objects::{Criteria, QueryValue, Schema};
use crate::error::{GeoError, Result};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

/// Exact-match backing store.
///
/// The connection sits behind a mutex so the store can be shared between
/// threads; lookups only read.
pub struct SqliteExactStore {
    conn: Mutex<Connection>,
    schema: Schema,
}

impl SqliteExactStore {
    /// Wrap an opened store connection. The table must match `schema`.
    pub(crate) fn new(conn: Connection, schema: Schema) -> Self {
        Self {
            conn: Mutex::new(conn),
            schema,
        }
    }

    /// Build the `WHERE` clause and its parameters for `criteria`.
    fn where_clause<'a>(&self, criteria: &'a Criteria) -> Result<(String, Vec<&'a QueryValue>)> {
        let mut terms = Vec::with_capacity(criteria.predicates().len());
        let mut params = Vec::with_capacity(criteria.predicates().len());

        for (idx, predicate) in criteria.predicates().iter().enumerate() {
            let column = predicate.column.as_deref().ok_or_else(|| {
                GeoError::InvalidQueryShape("exact match needs a column".to_string())
            })?;
            if !self.schema.has_column(column) {
                return Err(GeoError::InvalidQueryShape(format!(
                    "unknown column {} in {}",
                    column,
                    self.schema.table()
                )));
            }
            terms.push(format!("{} = ?{}", quote(column), idx + 1));
            params.push(&predicate.value);
        }

        if terms.is_empty() {
            return Err(GeoError::InvalidQueryShape("empty criteria".to_string()));
        }

        let joiner = format!(" {} ", criteria.combinator().as_sql());
        Ok((terms.join(&joiner), params))
    }

    /// Fetch the row at zero-based storage `position`.
    ///
    /// Tables are written once in snapshot order, so rowid is position + 1.
    pub fn fetch_at(&self, position: usize) -> Result<Option<ReferenceRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE rowid = ?1",
            column_list(&self.schema),
            quote(self.schema.table())
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let record = stmt
            .query_row([position as i64 + 1], |row| read_record(row, &self.schema))
            .optional()?;
        Ok(record)
    }

    /// Number of rows in the store.
    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT count(*) FROM {}", quote(self.schema.table()));
        let count: i64 = self.conn.lock().query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl BackingStore for SqliteExactStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn lookup(&self, criteria: &Criteria) -> Result<Vec<ReferenceRecord>> {
        let (clause, params) = self.where_clause(criteria)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY rowid",
            column_list(&self.schema),
            quote(self.schema.table()),
            clause
        );
        tracing::debug!("exact lookup: {}", sql);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| read_record(row, &self.schema))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}
