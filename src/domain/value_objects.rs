//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Column holding the latitude of a reference record.
pub const LATITUDE: &str = "latitude";
/// Column holding the longitude of a reference record.
pub const LONGITUDE: &str = "longitude";

/// Declared type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Real,
}

impl FieldType {
    /// SQLite column type used when creating the store table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }
}

/// One column of a reference dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: FieldType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Real)
    }
}

/// Fixed layout of one reference dataset.
///
/// Column order is the order of fields in the snapshot file. Every schema
/// carries `latitude` and `longitude` as `Real` columns; those, plus any
/// extra internal columns, are stripped from resolver output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    table: String,
    columns: Vec<ColumnSpec>,
    index_columns: Vec<String>,
    internal_columns: Vec<String>,
    range_column: Option<String>,
}

impl Schema {
    /// Create a schema for `table` with the given columns in snapshot order.
    pub fn new(table: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table: table.into(),
            columns,
            index_columns: Vec::new(),
            internal_columns: Vec::new(),
            range_column: None,
        }
    }

    /// Columns that get a secondary index in exact-match stores.
    pub fn index_columns(mut self, columns: &[&str]) -> Self {
        self.index_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Extra columns removed from resolver output (coordinates are always removed).
    pub fn internal_columns(mut self, columns: &[&str]) -> Self {
        self.internal_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Integer column holding range upper bounds (sorted-range datasets).
    pub fn range_column(mut self, column: &str) -> Self {
        self.range_column = Some(column.to_string());
        self
    }

    /// Country-level dataset: one row per country.
    pub fn country() -> Self {
        Self::new(
            "countries",
            vec![
                ColumnSpec::real(LATITUDE),
                ColumnSpec::real(LONGITUDE),
                ColumnSpec::text("country_code"),
                ColumnSpec::text("country_name"),
            ],
        )
        .index_columns(&["country_code", "country_name"])
    }

    /// ZIP-level dataset (GeoNames postal codes), matched by full text.
    pub fn zip() -> Self {
        Self::new(
            "geoinfo",
            vec![
                ColumnSpec::text("country_code"),
                ColumnSpec::text("zip_code"),
                ColumnSpec::text("place_name"),
                ColumnSpec::text("admin_name1"),
                ColumnSpec::text("admin_code1"),
                ColumnSpec::text("admin_name2"),
                ColumnSpec::text("admin_code2"),
                ColumnSpec::text("admin_name3"),
                ColumnSpec::text("admin_code3"),
                ColumnSpec::real(LATITUDE),
                ColumnSpec::real(LONGITUDE),
                ColumnSpec::real("accuracy"),
            ],
        )
    }

    /// IP-range dataset (IP2Location DB9 layout).
    pub fn ip() -> Self {
        Self::new(
            "ip2location",
            vec![
                ColumnSpec::integer("ip_from"),
                ColumnSpec::integer("ip_to"),
                ColumnSpec::text("country_code"),
                ColumnSpec::text("country_name"),
                ColumnSpec::text("region_name"),
                ColumnSpec::text("place_name"),
                ColumnSpec::real(LATITUDE),
                ColumnSpec::real(LONGITUDE),
                ColumnSpec::text("zip_code"),
            ],
        )
        .index_columns(&["ip_to", "ip_from"])
        .internal_columns(&["ip_from", "ip_to"])
        .range_column("ip_to")
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn indexed(&self) -> &[String] {
        &self.index_columns
    }

    pub fn range(&self) -> Option<&str> {
        self.range_column.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Whether `name` is stripped from resolver output.
    pub fn is_internal(&self, name: &str) -> bool {
        name == LATITUDE || name == LONGITUDE || self.internal_columns.iter().any(|c| c == name)
    }

    /// Check identifiers and cross references.
    ///
    /// Column names are interpolated into SQL, so only `[A-Za-z0-9_]`
    /// identifiers not starting with a digit are accepted.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.table) {
            return Err(schema_error(format!("invalid table name {:?}", self.table)));
        }
        if self.columns.is_empty() {
            return Err(schema_error("schema has no columns".to_string()));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(schema_error(format!("invalid column name {:?}", column.name)));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(schema_error(format!("duplicate column {}", column.name)));
            }
        }

        for coord in [LATITUDE, LONGITUDE] {
            match self.column(coord) {
                Some(c) if c.kind == FieldType::Real => {}
                _ => return Err(schema_error(format!("{} must be a Real column", coord))),
            }
        }

        for name in self.index_columns.iter().chain(&self.internal_columns) {
            if !self.has_column(name) {
                return Err(schema_error(format!("unknown column {}", name)));
            }
        }

        if let Some(range) = &self.range_column {
            match self.column(range) {
                Some(c) if c.kind == FieldType::Integer => {}
                _ => {
                    return Err(schema_error(format!(
                        "range column {} must be an Integer column",
                        range
                    )))
                }
            }
        }

        Ok(())
    }
}

fn schema_error(reason: String) -> GeoError {
    GeoError::InvalidSchema(reason)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Logic joining multiple field predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    /// Keyword used in both SQL `WHERE` clauses and FTS5 match expressions.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Combinator {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(GeoError::InvalidQueryShape(format!(
                "unknown combinator {:?}",
                other
            ))),
        }
    }
}

/// A value supplied in a query.
///
/// Values are pre-normalized by the caller: exact-match datasets store
/// upper-case names, so `"MX"` matches and `"mx"` does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl QueryValue {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Real(f) => f.to_string(),
        }
    }
}

// Reals compare by bit pattern so keys stay usable in hash maps.
impl PartialEq for QueryValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for QueryValue {}

impl Hash for QueryValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Text(s) => s.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Real(f) => f.to_bits().hash(state),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for QueryValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for QueryValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for QueryValue {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for QueryValue {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

/// One `column = value` condition. A missing column means "any column".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub column: Option<String>,
    pub value: QueryValue,
}

/// Column name that triggers the point lookup on sorted-range datasets.
pub const IP_COLUMN: &str = "ip";

/// Resolution criteria.
///
/// Both calling conventions, `(column, value)` and `([columns], [values])`,
/// produce the same criteria, so they share a cache slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
    combinator: Combinator,
}

impl Criteria {
    /// Single `column = value` criteria.
    pub fn field(column: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        Self {
            predicates: vec![Predicate {
                column: Some(column.into()),
                value: value.into(),
            }],
            combinator: Combinator::And,
        }
    }

    /// Unqualified criteria matching any column (full-text datasets).
    pub fn any(value: impl Into<QueryValue>) -> Self {
        Self {
            predicates: vec![Predicate {
                column: None,
                value: value.into(),
            }],
            combinator: Combinator::And,
        }
    }

    /// Point lookup on a sorted-range dataset.
    pub fn ip(address: impl Into<QueryValue>) -> Self {
        Self::field(IP_COLUMN, address)
    }

    /// Parallel column/value lists. Lengths must match and be non-zero.
    pub fn fields<C, V>(
        columns: impl IntoIterator<Item = C>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self>
    where
        C: Into<String>,
        V: Into<QueryValue>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let values: Vec<QueryValue> = values.into_iter().map(Into::into).collect();

        if columns.len() != values.len() {
            return Err(GeoError::InvalidQueryShape(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        if columns.is_empty() {
            return Err(GeoError::InvalidQueryShape("empty criteria".to_string()));
        }

        let predicates = columns
            .into_iter()
            .zip(values)
            .map(|(column, value)| Predicate {
                column: Some(column),
                value,
            })
            .collect();

        Ok(Self {
            predicates,
            combinator: Combinator::And,
        })
    }

    /// Criteria from already-built predicates, qualified or not.
    pub fn from_predicates(predicates: Vec<Predicate>) -> Result<Self> {
        if predicates.is_empty() {
            return Err(GeoError::InvalidQueryShape("empty criteria".to_string()));
        }
        Ok(Self {
            predicates,
            combinator: Combinator::And,
        })
    }

    /// Set how multiple predicates combine.
    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// The single predicate, when there is exactly one.
    pub fn single(&self) -> Option<&Predicate> {
        match self.predicates.as_slice() {
            [p] => Some(p),
            _ => None,
        }
    }

    /// Normalized cache key.
    pub fn key(&self) -> QueryKey {
        QueryKey::from(self)
    }
}

/// Strongly-typed result cache key.
///
/// The combinator of a single-predicate query has no effect, so it is
/// normalized to `AND`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    predicates: Vec<Predicate>,
    combinator: Combinator,
}

impl From<&Criteria> for QueryKey {
    fn from(criteria: &Criteria) -> Self {
        let combinator = if criteria.predicates.len() > 1 {
            criteria.combinator
        } else {
            Combinator::And
        };
        Self {
            predicates: criteria.predicates.clone(),
            combinator,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| match &p.column {
                Some(c) => format!("{}={}", c, p.value.as_text()),
                None => p.value.as_text(),
            })
            .collect();
        write!(f, "{}", parts.join(&format!(" {} ", self.combinator)))
    }
}
