//! SQLite row conversion shared by every store variant.

use crate::adapters::outbound::snapshot_reader::coerce_field;
use crate::domain::entities::{FieldValue, ReferenceRecord};
use crate::domain::value_objects::{FieldType, QueryValue, Schema};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Row, ToSql};

impl ToSql for QueryValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            QueryValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            QueryValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            QueryValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
        })
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
        })
    }
}

/// Quote an identifier for SQL. Schema validation already restricts names
/// to `[A-Za-z0-9_]`.
pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

/// Comma-separated, quoted column list in schema order.
pub(crate) fn column_list(schema: &Schema) -> String {
    schema
        .columns()
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a row selected with `column_list` into a record.
///
/// Stored values are coerced to the declared column type. Full-text tables
/// keep everything as text, so numerics are parsed back here; anything that
/// does not fit the declared type reads as absent.
pub(crate) fn read_record(row: &Row<'_>, schema: &Schema) -> rusqlite::Result<ReferenceRecord> {
    let mut record = ReferenceRecord::new();
    for (idx, column) in schema.columns().iter().enumerate() {
        let value = from_sql(row.get_ref(idx)?, column.kind);
        record.insert(column.name.clone(), value);
    }
    Ok(record)
}

fn from_sql(value: ValueRef<'_>, kind: FieldType) -> FieldValue {
    match (value, kind) {
        (ValueRef::Null, _) | (ValueRef::Blob(_), _) => FieldValue::Null,
        (ValueRef::Integer(i), FieldType::Integer) => FieldValue::Integer(i),
        (ValueRef::Integer(i), FieldType::Real) => FieldValue::Real(i as f64),
        (ValueRef::Integer(i), FieldType::Text) => FieldValue::Text(i.to_string()),
        (ValueRef::Real(f), FieldType::Real) => FieldValue::Real(f),
        (ValueRef::Real(f), FieldType::Integer) if f.fract() == 0.0 => {
            FieldValue::Integer(f as i64)
        }
        (ValueRef::Real(_), FieldType::Integer) => FieldValue::Null,
        (ValueRef::Real(f), FieldType::Text) => FieldValue::Text(f.to_string()),
        (ValueRef::Text(bytes), kind) => match std::str::from_utf8(bytes) {
            Ok(s) => coerce_field(s, kind).unwrap_or(FieldValue::Null),
            Err(_) => FieldValue::Null,
        },
    }
}
