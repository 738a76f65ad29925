//! SQLite Full-Text Store
//!
//! Implements BackingStore with FTS5 token matching. Used for postal-code
//! data, where place and administrative names repeat across levels and
//! callers query by name tokens rather than exact values.
//!
//! See: https://www.sqlite.org/fts5.html#full_text_query_syntax

use crate::adapters::outbound::sqlite_rows::{column_list, read_record};
use crate::domain::entities::ReferenceRecord;
use crate::domain::ports::BackingStore;
use crate::domain::value_objects::{Criteria, Predicate, Schema};
use crate::error::{GeoError, Result};
use parking_lot::Mutex;
use rusqlite::Connection;

/// Full-text backing store over an FTS5 virtual table.
///
/// Matching is case-insensitive (unicode61 tokenizer).
pub struct SqliteFullTextStore {
    conn: Mutex<Connection>,
    schema: Schema,
}

impl SqliteFullTextStore {
    /// Wrap an opened store connection. The table must be an FTS5 table
    /// with the columns of `schema`.
    pub(crate) fn new(conn: Connection, schema: Schema) -> Self {
        Self {
            conn: Mutex::new(conn),
            schema,
        }
    }

    /// Build the FTS5 match expression for `criteria`.
    ///
    /// Each value becomes a quoted phrase, filtered to its column when the
    /// column is known. A lone predicate on an unknown column matches any
    /// column.
    pub fn match_expression(&self, criteria: &Criteria) -> Result<String> {
        let single = criteria.predicates().len() == 1;
        let mut terms = Vec::with_capacity(criteria.predicates().len());

        for predicate in criteria.predicates() {
            terms.push(self.term(predicate, single)?);
        }

        if terms.is_empty() {
            return Err(GeoError::InvalidQueryShape("empty criteria".to_string()));
        }

        Ok(terms.join(&format!(" {} ", criteria.combinator().as_sql())))
    }

    fn term(&self, predicate: &Predicate, single: bool) -> Result<String> {
        let value = predicate.value.as_text();
        if value.trim().is_empty() {
            return Err(GeoError::InvalidQueryShape("empty match value".to_string()));
        }
        let phrase = format!("\"{}\"", value.replace('"', "\"\""));

        match predicate.column.as_deref() {
            Some(column) if self.schema.has_column(column) => {
                Ok(format!("{} : {}", column, phrase))
            }
            Some(column) if !single => Err(GeoError::InvalidQueryShape(format!(
                "unknown column {} in {}",
                column,
                self.schema.table()
            ))),
            _ => Ok(phrase),
        }
    }
}

impl BackingStore for SqliteFullTextStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn lookup(&self, criteria: &Criteria) -> Result<Vec<ReferenceRecord>> {
        let expression = self.match_expression(criteria)?;
        let table = self.schema.table();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} MATCH ?1 ORDER BY rowid",
            column_list(&self.schema),
            table,
            table
        );
        tracing::debug!("full-text lookup: {} MATCH {}", table, expression);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([&expression], |row| read_record(row, &self.schema))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::FieldValue;
    use crate::domain::value_objects::Combinator;

    fn store() -> SqliteFullTextStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE VIRTUAL TABLE geoinfo USING fts5(country_code, zip_code, place_name, admin_name1, admin_code1, admin_name2, admin_code2, admin_name3, admin_code3, latitude, longitude, accuracy);
             INSERT INTO geoinfo VALUES ('ES', '28001', 'MADRID', 'MADRID', 'MD', 'MADRID', 'M', 'MADRID', '28079', '40.4165', '-3.7026', '4');
             INSERT INTO geoinfo VALUES ('ES', '28850', 'TORREJON DE ARDOZ', 'MADRID', 'MD', 'MADRID', 'M', 'TORREJON DE ARDOZ', '28148', '40.4554', '-3.4697', '4');
             INSERT INTO geoinfo VALUES ('US', '79536', 'MADRID', 'TEXAS', 'TX', 'MITCHELL', '335', '', '', '32.3', '-100.6', '4');",
        )
        .unwrap();
        SqliteFullTextStore::new(conn, Schema::zip())
    }

    // ===== Match Expression Tests =====

    #[test]
    fn test_expression_column_filters() {
        let criteria =
            Criteria::fields(vec!["place_name", "country_code"], vec!["MADRID", "ES"]).unwrap();
        assert_eq!(
            store().match_expression(&criteria).unwrap(),
            "place_name : \"MADRID\" AND country_code : \"ES\""
        );
    }

    #[test]
    fn test_expression_escapes_quotes() {
        let criteria = Criteria::field("place_name", "O\"HARE");
        assert_eq!(
            store().match_expression(&criteria).unwrap(),
            "place_name : \"O\"\"HARE\""
        );
    }

    #[test]
    fn test_expression_unknown_single_column_is_unqualified() {
        let criteria = Criteria::field("anything", "MADRID");
        assert_eq!(store().match_expression(&criteria).unwrap(), "\"MADRID\"");
    }

    #[test]
    fn test_expression_unknown_column_in_list_rejected() {
        let criteria = Criteria::fields(vec!["place_name", "nope"], vec!["A", "B"]).unwrap();
        assert!(store().match_expression(&criteria).is_err());
    }

    // ===== Lookup Tests =====

    #[test]
    fn test_lookup_multi_field() {
        let criteria = Criteria::fields(
            vec!["place_name", "admin_name1", "country_code"],
            vec!["MADRID", "MADRID", "ES"],
        )
        .unwrap();
        let rows = store().lookup(&criteria).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("zip_code"), Some(&FieldValue::from("28001")));
        assert_eq!(rows[0].get("latitude"), Some(&FieldValue::Real(40.4165)));
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let rows = store().lookup(&Criteria::field("place_name", "madrid")).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_lookup_unqualified() {
        let rows = store().lookup(&Criteria::any("TEXAS")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("country_code"), Some(&FieldValue::from("US")));
    }

    #[test]
    fn test_lookup_or_combinator() {
        let criteria = Criteria::fields(vec!["admin_name1", "admin_name1"], vec!["TEXAS", "MADRID"])
            .unwrap()
            .with_combinator(Combinator::Or);
        assert_eq!(store().lookup(&criteria).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_text_field_reads_null() {
        let rows = store().lookup(&Criteria::field("zip_code", "79536")).unwrap();
        assert_eq!(rows[0].get("admin_name3"), Some(&FieldValue::Null));
    }
}
