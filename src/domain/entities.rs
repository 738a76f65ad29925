//! Domain Entities - Core business objects
//!
//! These entities represent the records flowing through resolution: rows of
//! a reference dataset and the shaped records handed back to callers.
//! They have no storage dependencies.

use crate::domain::value_objects::{LATITUDE, LONGITUDE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A typed field value. `Null` marks an absent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; absent values never take part in numeric comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// `lat,lon`, the string form accepted by search engines as a geo point.
impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// One row of a reference dataset, keyed by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ReferenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) {
        self.fields.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, FieldValue> {
        self.fields
    }

    /// The row's coordinate, when both latitude and longitude are present.
    pub fn coordinate(&self) -> Option<GeoPoint> {
        let lat = self.get(LATITUDE)?.as_f64()?;
        let lon = self.get(LONGITUDE)?.as_f64()?;
        Some(GeoPoint::new(lat, lon))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for ReferenceRecord {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A resolver's output.
///
/// Fields of the primary match minus internal columns, plus `location`
/// (coordinate of the first match) and `representative_point` (aggregate
/// over all matches, equal to `location` for a single match).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
    pub location: Option<GeoPoint>,
    pub representative_point: Option<GeoPoint>,
}

impl ResultRecord {
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }
}

/// Outcome of `resolve`. `NotFound` is a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Arc<ResultRecord>),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn record(&self) -> Option<&ResultRecord> {
        match self {
            Self::Found(r) => Some(r),
            Self::NotFound => None,
        }
    }

    pub fn into_option(self) -> Option<Arc<ResultRecord>> {
        match self {
            Self::Found(r) => Some(r),
            Self::NotFound => None,
        }
    }
}
