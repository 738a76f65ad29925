use crate::adapters::outbound::SnapshotFormat;
use crate::domain::value_objects::Schema;
use crate::infrastructure::loader::{DatasetSpec, MatchStrategy};
use anyhow::bail;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One of the three reference datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Country,
    Zip,
    Ip,
}

impl FromStr for DatasetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "country" => Ok(Self::Country),
            "zip" => Ok(Self::Zip),
            "ip" => Ok(Self::Ip),
            other => bail!("unknown dataset {:?} (expected country, zip or ip)", other),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Country => write!(f, "country"),
            Self::Zip => write!(f, "zip"),
            Self::Ip => write!(f, "ip"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the built stores and side files.
    pub db_dir: PathBuf,
    pub country_snapshot: PathBuf,
    pub zip_snapshot: PathBuf,
    pub ip_snapshot: PathBuf,
    /// Field separator for delimited country and IP snapshots.
    pub separator: u8,
    pub rebuild: bool,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        let db_dir = PathBuf::from("db");
        Self {
            country_snapshot: db_dir.join("countries.csv"),
            zip_snapshot: db_dir.join("allCountries.csv.gz"),
            ip_snapshot: db_dir.join("IP2LOCATION-LITE-DB9.CSV.gz"),
            db_dir,
            separator: b',',
            rebuild: false,
            debug: false,
        }
    }
}

impl Config {
    /// Store file for a dataset, inside `db_dir`.
    pub fn store_path(&self, kind: DatasetKind) -> PathBuf {
        let name = match kind {
            DatasetKind::Country => "countries.db",
            DatasetKind::Zip => "zip.db",
            DatasetKind::Ip => "ip.db",
        };
        self.db_dir.join(name)
    }

    /// Loader input for a dataset.
    ///
    /// Postal-code snapshots are GeoNames tab-separated text, or a SQL
    /// script when the file name contains `.sql`.
    pub fn dataset_spec(&self, kind: DatasetKind) -> DatasetSpec {
        let store = self.store_path(kind);
        let spec = match kind {
            DatasetKind::Country => DatasetSpec::new(
                &self.country_snapshot,
                store,
                Schema::country(),
                MatchStrategy::Exact,
            )
            .format(SnapshotFormat::delimited(self.separator)),
            DatasetKind::Zip => {
                let is_script = self
                    .zip_snapshot
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().contains(".sql"));
                let format = if is_script {
                    SnapshotFormat::sql_script()
                } else {
                    SnapshotFormat::tsv()
                };
                DatasetSpec::new(&self.zip_snapshot, store, Schema::zip(), MatchStrategy::FullText)
                    .format(format)
            }
            DatasetKind::Ip => DatasetSpec::new(
                &self.ip_snapshot,
                store,
                Schema::ip(),
                MatchStrategy::SortedRange,
            )
            .format(SnapshotFormat::delimited(self.separator)),
        };
        spec.rebuild(self.rebuild)
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Build a `Config` from any variable source.
pub fn load_config_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let db_dir = PathBuf::from(var("GEOLOOKUP_DB_DIR").unwrap_or_else(|| "db".to_string()));

    let country_snapshot = var("GEOLOOKUP_COUNTRY_SNAPSHOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| db_dir.join("countries.csv"));

    let zip_snapshot = var("GEOLOOKUP_ZIP_SNAPSHOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| db_dir.join("allCountries.csv.gz"));

    let ip_snapshot = var("GEOLOOKUP_IP_SNAPSHOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| db_dir.join("IP2LOCATION-LITE-DB9.CSV.gz"));

    let separator = match var("GEOLOOKUP_SEPARATOR") {
        None => b',',
        Some(s) if s == "\\t" => b'\t',
        Some(s) => match s.as_bytes() {
            [byte] => *byte,
            _ => bail!("GEOLOOKUP_SEPARATOR must be a single byte, got {:?}", s),
        },
    };

    let rebuild = var("GEOLOOKUP_REBUILD")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    let debug = var("DEBUG").is_some();

    Ok(Config {
        db_dir,
        country_snapshot,
        zip_snapshot,
        ip_snapshot,
        separator,
        rebuild,
        debug,
    })
}
