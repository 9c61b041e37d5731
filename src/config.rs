use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::activity::OrganismGrouping;
use crate::error::UnifyError;
use crate::self_assembly::DEFAULT_COMMENT_MARKER;

pub const DEFAULT_CONFIG_FILE: &str = "peptide-unify.json";
pub const DEFAULT_PREFIX: &str = "DBAASPS";
pub const DEFAULT_API_URL: &str = "https://dbaasp.org/peptides/{id}";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub inputs: InputPaths,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EngineSection {
    // `null` turns the default prefix off; absent keeps the built-in one.
    #[serde(default, deserialize_with = "explicit_option")]
    pub default_prefix: Option<Option<String>>,
    #[serde(default)]
    pub comment_marker: Option<String>,
    #[serde(default)]
    pub molecular_weight_column: Option<String>,
    #[serde(default)]
    pub organism_grouping: Option<OrganismGrouping>,
    #[serde(default)]
    pub activity_measures: Option<Vec<String>>,
    #[serde(default)]
    pub empty_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FetchSection {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub n_terminus: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputPaths {
    #[serde(default)]
    pub physchem: Option<Utf8PathBuf>,
    #[serde(default)]
    pub activity: Option<Utf8PathBuf>,
    #[serde(default)]
    pub lipophilicity: Option<Utf8PathBuf>,
    #[serde(default)]
    pub self_assembly: Option<Utf8PathBuf>,
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
    #[serde(default)]
    pub report: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub default_prefix: Option<String>,
    pub comment_marker: String,
    pub molecular_weight_column: String,
    pub organism_grouping: OrganismGrouping,
    pub activity_measures: Vec<String>,
    pub empty_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_prefix: Some(DEFAULT_PREFIX.to_string()),
            comment_marker: DEFAULT_COMMENT_MARKER.to_string(),
            molecular_weight_column: "Molecular Weight".to_string(),
            organism_grouping: OrganismGrouping::default(),
            activity_measures: Vec::new(),
            empty_marker: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn keeps_measure(&self, measure: Option<&str>) -> bool {
        if self.activity_measures.is_empty() {
            return true;
        }
        measure.is_some_and(|measure| {
            self.activity_measures
                .iter()
                .any(|kept| kept.trim().eq_ignore_ascii_case(measure.trim()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub n_terminus: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(20),
            max_retries: 3,
            n_terminus: None,
        }
    }
}

impl FetchConfig {
    pub fn peptide_url(&self, id: u64) -> String {
        self.api_url.replace("{id}", &id.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub engine: EngineConfig,
    pub fetch: FetchConfig,
    pub inputs: InputPaths,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, UnifyError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no config file, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| UnifyError::ConfigRead(config_path.clone()))?;
        let content = content.trim_start_matches('\u{feff}');
        let config: Config = serde_json::from_str(content)
            .map_err(|err| UnifyError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, UnifyError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let defaults = EngineConfig::default();
        let section = config.engine;

        let comment_marker = section
            .comment_marker
            .map(|marker| marker.trim().to_string())
            .unwrap_or(defaults.comment_marker);
        let engine = EngineConfig {
            default_prefix: section.default_prefix.unwrap_or(defaults.default_prefix),
            comment_marker,
            molecular_weight_column: section
                .molecular_weight_column
                .unwrap_or(defaults.molecular_weight_column),
            organism_grouping: section
                .organism_grouping
                .unwrap_or(defaults.organism_grouping),
            activity_measures: section.activity_measures.unwrap_or_default(),
            empty_marker: section.empty_marker.unwrap_or(defaults.empty_marker),
        };

        let fetch_defaults = FetchConfig::default();
        let api_url = config.fetch.api_url.unwrap_or(fetch_defaults.api_url);
        if !api_url.contains("{id}") {
            return Err(UnifyError::ConfigParse(format!(
                "fetch.api_url must contain an {{id}} placeholder: {api_url}"
            )));
        }
        let fetch = FetchConfig {
            api_url,
            timeout: config
                .fetch
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(fetch_defaults.timeout),
            max_retries: config.fetch.max_retries.unwrap_or(fetch_defaults.max_retries),
            n_terminus: config
                .fetch
                .n_terminus
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        };

        Ok(ResolvedConfig {
            schema_version,
            engine,
            fetch,
            inputs: config.inputs,
        })
    }
}

fn explicit_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.engine, EngineConfig::default());
        assert_eq!(resolved.fetch.timeout, Duration::from_secs(20));
        assert_eq!(resolved.fetch.peptide_url(51), "https://dbaasp.org/peptides/51");
    }

    #[test]
    fn null_prefix_disables_default() {
        let config: Config =
            serde_json::from_str(r#"{"engine": {"default_prefix": null}}"#).unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.engine.default_prefix, None);
    }

    #[test]
    fn measure_filter_is_case_insensitive() {
        let engine = EngineConfig {
            activity_measures: vec!["MIC".to_string()],
            ..EngineConfig::default()
        };
        assert!(engine.keeps_measure(Some("mic")));
        assert!(!engine.keeps_measure(Some("IC50")));
        assert!(!engine.keeps_measure(None));
        assert!(EngineConfig::default().keeps_measure(None));
    }
}
