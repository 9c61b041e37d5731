use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use peptide_unify::activity::OrganismGrouping;
use peptide_unify::config::{Config, ConfigLoader, DEFAULT_PREFIX};
use peptide_unify::error::UnifyError;

#[test]
fn parse_full_config() {
    let raw = r#"{
        "schema_version": 1,
        "engine": {
            "default_prefix": "dbaasps",
            "comment_marker": "%",
            "organism_grouping": "species",
            "activity_measures": ["MIC"],
            "empty_marker": "NA"
        },
        "fetch": {"timeout_secs": 5, "max_retries": 1, "n_terminus": " C16 "},
        "inputs": {"physchem": "data/physchem.csv", "output": "out/unified.csv"}
    }"#;
    let config: Config = serde_json::from_str(raw).unwrap();
    let resolved = ConfigLoader::resolve_config(config).unwrap();

    assert_eq!(resolved.engine.default_prefix.as_deref(), Some("dbaasps"));
    assert_eq!(resolved.engine.comment_marker, "%");
    assert_eq!(resolved.engine.organism_grouping, OrganismGrouping::Species);
    assert_eq!(resolved.engine.empty_marker, "NA");
    assert_eq!(resolved.fetch.timeout, Duration::from_secs(5));
    assert_eq!(resolved.fetch.max_retries, 1);
    assert_eq!(resolved.fetch.n_terminus.as_deref(), Some("C16"));
    assert_eq!(
        resolved.inputs.physchem.as_ref().map(|p| p.as_str()),
        Some("data/physchem.csv")
    );
    assert_eq!(resolved.inputs.activity, None);
}

#[test]
fn defaults_when_sections_missing() {
    let config: Config = serde_json::from_str("{}").unwrap();
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.engine.default_prefix.as_deref(), Some(DEFAULT_PREFIX));
    assert_eq!(resolved.engine.molecular_weight_column, "Molecular Weight");
    assert_eq!(resolved.fetch.max_retries, 3);
}

#[test]
fn api_url_requires_placeholder() {
    let config: Config =
        serde_json::from_str(r#"{"fetch": {"api_url": "https://example.org/peptides"}}"#).unwrap();
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, UnifyError::ConfigParse(_));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, UnifyError::ConfigRead(_));
}

#[test]
fn reads_config_with_bom() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("peptide-unify.json");
    fs::write(&path, "\u{feff}{\"engine\": {\"default_prefix\": null}}").unwrap();
    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.engine.default_prefix, None);
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ engine: ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, UnifyError::ConfigParse(_));
}
