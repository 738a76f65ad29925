//! Snapshot Reader
//!
//! Streams a raw dataset snapshot and coerces every field to its declared
//! type. Supports delimited text and pre-built SQL scripts, either of them
//! optionally gzip compressed.

use crate::domain::entities::FieldValue;
use crate::domain::value_objects::{FieldType, Schema};
use crate::error::{GeoError, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Raw values treated as absent without a warning.
const MISSING_VALUES: &[&str] = &[
    "", "NULL", "null", "NaN", "-NaN", "nan", "-nan", "N/A", "n/a", "#N/A", "#N/A N/A", "#NA",
    "-1.#IND", "1.#IND", "-1.#QNAN", "1.#QNAN",
];

/// Compression of a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Gzip when the file name ends in `.gz`.
    #[default]
    Infer,
    Gzip,
    None,
}

impl Compression {
    fn is_gzip(&self, path: &Path) -> bool {
        match self {
            Self::Gzip => true,
            Self::None => false,
            Self::Infer => path.extension().is_some_and(|ext| ext == "gz"),
        }
    }
}

/// Layout of a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// One record per line, fields in schema order.
    ///
    /// With `quoting` off a `"` is ordinary field text.
    Delimited {
        separator: u8,
        has_header: bool,
        quoting: bool,
        compression: Compression,
    },
    /// SQL statements populating the store table, run verbatim.
    SqlScript { compression: Compression },
}

impl SnapshotFormat {
    /// Headerless, quote-aware delimited text with the given separator.
    pub fn delimited(separator: u8) -> Self {
        Self::Delimited {
            separator,
            has_header: false,
            quoting: true,
            compression: Compression::Infer,
        }
    }

    pub fn csv() -> Self {
        Self::delimited(b',')
    }

    /// Tab separated text without quoting.
    pub fn tsv() -> Self {
        Self::Delimited {
            separator: b'\t',
            has_header: false,
            quoting: false,
            compression: Compression::Infer,
        }
    }

    pub fn sql_script() -> Self {
        Self::SqlScript {
            compression: Compression::Infer,
        }
    }

    /// Skip the first line of a delimited snapshot.
    pub fn with_header(mut self) -> Self {
        if let Self::Delimited { has_header, .. } = &mut self {
            *has_header = true;
        }
        self
    }

    pub fn with_compression(mut self, value: Compression) -> Self {
        match &mut self {
            Self::Delimited { compression, .. } | Self::SqlScript { compression } => {
                *compression = value
            }
        }
        self
    }
}

impl Default for SnapshotFormat {
    fn default() -> Self {
        Self::csv()
    }
}

/// Open a snapshot, transparently decompressing it.
fn open(path: &Path, compression: Compression) -> Result<Box<dyn Read>> {
    if !path.is_file() {
        return Err(GeoError::load_failure(path, "snapshot file not found"));
    }
    let file = File::open(path)
        .map_err(|e| GeoError::load_failure(path, format!("cannot open snapshot: {}", e)))?;

    if compression.is_gzip(path) {
        tracing::debug!(path = %path.display(), "reading gzip compressed snapshot");
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Stream a delimited snapshot, handing each coerced row to `sink`.
///
/// Fields are matched to schema columns by position. Malformed fields,
/// including bytes that are not UTF-8, are logged and become `Null`; short rows are padded with `Null`, extra fields
/// are dropped. Returns the number of rows delivered.
pub fn read_rows<F>(path: &Path, schema: &Schema, format: &SnapshotFormat, mut sink: F) -> Result<usize>
where
    F: FnMut(Vec<FieldValue>) -> Result<()>,
{
    let SnapshotFormat::Delimited {
        separator,
        has_header,
        quoting,
        compression,
    } = format
    else {
        return Err(GeoError::load_failure(path, "snapshot is not delimited text"));
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(*separator)
        .has_headers(*has_header)
        .quoting(*quoting)
        .flexible(true)
        .from_reader(open(path, *compression)?);

    let columns = schema.columns();
    let mut count = 0;

    for (idx, result) in reader.byte_records().enumerate() {
        let row_num = idx + 1 + usize::from(*has_header);
        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => {
                return Err(GeoError::load_failure(path, format!("read error: {}", e)));
            }
            Err(e) => {
                tracing::warn!("skipping unreadable row {} in {}: {}", row_num, path.display(), e);
                continue;
            }
        };

        if record.len() != columns.len() {
            tracing::warn!(
                "row {} has {} fields, expected {}",
                row_num,
                record.len(),
                columns.len()
            );
        }

        let mut values = Vec::with_capacity(columns.len());
        for (pos, column) in columns.iter().enumerate() {
            let bytes = record.get(pos).unwrap_or(&[]);
            let coerced = std::str::from_utf8(bytes)
                .ok()
                .and_then(|raw| coerce_field(raw, column.kind));
            let value = match coerced {
                Some(v) => v,
                None => {
                    let err = GeoError::MalformedField {
                        row: row_num,
                        column: column.name.clone(),
                        value: String::from_utf8_lossy(bytes).into_owned(),
                    };
                    tracing::warn!("{}, stored as absent", err);
                    FieldValue::Null
                }
            };
            values.push(value);
        }

        sink(values)?;
        count += 1;
    }

    Ok(count)
}

/// Read a SQL script snapshot into memory.
pub fn read_script(path: &Path, format: &SnapshotFormat) -> Result<String> {
    let SnapshotFormat::SqlScript { compression } = format else {
        return Err(GeoError::load_failure(path, "snapshot is not a SQL script"));
    };
    let mut script = String::new();
    open(path, *compression)?
        .read_to_string(&mut script)
        .map_err(|e| GeoError::load_failure(path, format!("read error: {}", e)))?;
    Ok(script)
}

/// Coerce a raw field to `kind`.
///
/// Missing-value markers become `Null`. Returns `None` when the value is
/// present but does not parse as the declared numeric type (including
/// non-finite reals).
pub(crate) fn coerce_field(raw: &str, kind: FieldType) -> Option<FieldValue> {
    if MISSING_VALUES.contains(&raw) {
        return Some(FieldValue::Null);
    }
    match kind {
        FieldType::Text => Some(FieldValue::Text(raw.to_string())),
        FieldType::Integer => raw.trim().parse::<i64>().ok().map(FieldValue::Integer),
        FieldType::Real => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(FieldValue::Real),
    }
}
