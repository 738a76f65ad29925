//! Range Index Side File
//!
//! Persists the sorted array of range upper bounds next to the store so that
//! later opens skip rederiving it.

use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout of the side file.
#[derive(Debug, Serialize, Deserialize)]
struct RangeIndexFile {
    version: u32,
    row_count: u64,
    checksum: u32,
    bounds: Vec<u32>,
}

/// Side file path for a store: `<store_path>.ranges.bin`.
pub fn side_file_path(store_path: &Path) -> PathBuf {
    let mut name = store_path.as_os_str().to_owned();
    name.push(".ranges.bin");
    PathBuf::from(name)
}

fn checksum(bounds: &[u32]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for bound in bounds {
        hasher.update(&bound.to_le_bytes());
    }
    hasher.finalize()
}

/// Check that bounds are sorted ascending (non-decreasing).
pub fn verify_sorted(bounds: &[u32]) -> Result<()> {
    match bounds.windows(2).position(|w| w[0] > w[1]) {
        Some(pos) => Err(GeoError::RangeIndex(format!(
            "range bounds not sorted at position {}: {} > {}",
            pos + 1,
            bounds[pos],
            bounds[pos + 1]
        ))),
        None => Ok(()),
    }
}

/// Write bounds to `path`, replacing any existing file.
pub fn write(path: &Path, bounds: &[u32]) -> Result<()> {
    let file = RangeIndexFile {
        version: FORMAT_VERSION,
        row_count: bounds.len() as u64,
        checksum: checksum(bounds),
        bounds: bounds.to_vec(),
    };

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &file)
        .map_err(|e| GeoError::RangeIndex(format!("encode {}: {}", path.display(), e)))?;
    writer.flush()?;

    tracing::info!(path = %path.display(), bounds = bounds.len(), "range index written");
    Ok(())
}

/// Read bounds from `path`, checking version, length and checksum.
pub fn read(path: &Path) -> Result<Vec<u32>> {
    let reader = BufReader::new(File::open(path)?);
    let file: RangeIndexFile = bincode::deserialize_from(reader)
        .map_err(|e| GeoError::RangeIndex(format!("decode {}: {}", path.display(), e)))?;

    if file.version != FORMAT_VERSION {
        return Err(GeoError::RangeIndex(format!(
            "unsupported version {}",
            file.version
        )));
    }
    if file.row_count != file.bounds.len() as u64 {
        return Err(GeoError::RangeIndex(format!(
            "row count {} does not match {} bounds",
            file.row_count,
            file.bounds.len()
        )));
    }
    if file.checksum != checksum(&file.bounds) {
        return Err(GeoError::RangeIndex("checksum mismatch".to_string()));
    }
    verify_sorted(&file.bounds)?;

    Ok(file.bounds)
}
