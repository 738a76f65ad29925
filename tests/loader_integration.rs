//! Integration tests for the Dataset Loader
//!
//! Builds stores from snapshot files on disk and reopens them.

use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use geolookup::adapters::outbound::range_index_file::side_file_path;
use geolookup::config::{load_config_from, DatasetKind};
use geolookup::{CountryResolver, DatasetSpec, GeoError, IpResolver, MatchStrategy, Schema};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const COUNTRIES: &str = "\
23.634501,-102.552784,MX,MEXICO
40.463667,-3.74922,ES,SPAIN
37.09024,-95.712891,US,UNITED STATES
";

const IPS: &str = "\
\"0\",\"16777215\",\"-\",\"-\",\"-\",\"-\",\"0\",\"0\",\"-\"
\"16777216\",\"16777471\",\"AU\",\"AUSTRALIA\",\"QUEENSLAND\",\"BRISBANE\",\"-27.46794\",\"153.02809\",\"4000\"
\"16777472\",\"16778239\",\"CN\",\"CHINA\",\"FUJIAN\",\"FUZHOU\",\"26.06139\",\"119.30611\",\"350004\"
";

fn country_spec(dir: &Path, body: &str) -> DatasetSpec {
    let snapshot = dir.join("countries.csv");
    std::fs::write(&snapshot, body).unwrap();
    DatasetSpec::new(snapshot, dir.join("countries.db"), Schema::country(), MatchStrategy::Exact)
}

fn gzip(path: &Path, body: &str) {
    let mut encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), GzLevel::default());
    encoder.write_all(body.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// Test that reopening a built store leaves it byte-identical
#[test]
fn test_open_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let spec = country_spec(dir.path(), COUNTRIES);

    drop(CountryResolver::open(&spec).unwrap());
    let after_first = std::fs::read(&spec.store_path).unwrap();

    drop(CountryResolver::open(&spec).unwrap());
    let after_second = std::fs::read(&spec.store_path).unwrap();

    drop(CountryResolver::open(&spec).unwrap());
    let after_third = std::fs::read(&spec.store_path).unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(after_second, after_third);
}

/// Test that reopening a range store leaves store and side file unchanged
#[test]
fn test_range_store_open_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("ip.csv.gz");
    gzip(&snapshot, IPS);
    let spec = DatasetSpec::new(
        snapshot,
        dir.path().join("ip.db"),
        Schema::ip(),
        MatchStrategy::SortedRange,
    );
    let side = side_file_path(&spec.store_path);

    drop(IpResolver::open(&spec).unwrap());
    let store_bytes = std::fs::read(&spec.store_path).unwrap();
    let side_bytes = std::fs::read(&side).unwrap();

    let resolver = IpResolver::open(&spec).unwrap();

    assert_eq!(std::fs::read(&spec.store_path).unwrap(), store_bytes);
    assert_eq!(std::fs::read(&side).unwrap(), side_bytes);
    assert_eq!(resolver.store().len(), 3);
}

/// Test that a missing snapshot is a fatal load failure
#[test]
fn test_missing_snapshot_fails() {
    let dir = TempDir::new().unwrap();
    let spec = DatasetSpec::new(
        dir.path().join("nope.csv"),
        dir.path().join("countries.db"),
        Schema::country(),
        MatchStrategy::Exact,
    );

    let err = CountryResolver::open(&spec).err().unwrap();

    assert!(matches!(err, GeoError::LoadFailure { .. }));
    assert!(err.is_fatal());
    assert!(!spec.store_path.exists());
}

/// Test that a malformed coordinate is stored as absent and the row kept
#[test]
fn test_malformed_field_stored_as_absent() {
    let dir = TempDir::new().unwrap();
    let spec = country_spec(dir.path(), "not-a-number,-102.552784,MX,MEXICO\n");

    let resolver = CountryResolver::open(&spec).unwrap();
    let resolution = resolver.resolve_field("country_code", "MX");
    let record = resolution.record().unwrap();

    assert_eq!(record.get("country_name").and_then(|v| v.as_str()), Some("MEXICO"));
    assert_eq!(record.location, None);
    assert_eq!(record.representative_point, None);
}

/// Test that rebuild picks up a new snapshot
#[test]
fn test_rebuild_flag_refreshes_store() {
    let dir = TempDir::new().unwrap();
    let spec = country_spec(dir.path(), COUNTRIES);
    drop(CountryResolver::open(&spec).unwrap());

    std::fs::write(&spec.snapshot_path, "46.227638,2.213749,FR,FRANCE\n").unwrap();

    let stale = CountryResolver::open(&spec).unwrap();
    assert!(!stale.resolve_field("country_code", "FR").is_found());
    drop(stale);

    let fresh = CountryResolver::open(&spec.clone().rebuild(true)).unwrap();
    assert!(fresh.resolve_field("country_code", "FR").is_found());
    assert!(!fresh.resolve_field("country_code", "MX").is_found());
}

/// Test that config-driven dataset specs open end to end
#[test]
fn test_config_dataset_spec_builds() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("countries.csv"), "23.634501;-102.552784;MX;MEXICO\n").unwrap();
    let db_dir = dir.path().to_string_lossy().to_string();

    let cfg = load_config_from(|key| match key {
        "GEOLOOKUP_DB_DIR" => Some(db_dir.clone()),
        "GEOLOOKUP_SEPARATOR" => Some(";".to_string()),
        _ => None,
    })
    .unwrap();

    let resolver = CountryResolver::open(&cfg.dataset_spec(DatasetKind::Country)).unwrap();

    assert!(resolver.resolve_field("country_name", "MEXICO").is_found());
    assert!(dir.path().join("countries.db").is_file());
}
