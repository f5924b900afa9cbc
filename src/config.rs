//! Runtime settings, layered from an optional `cohort.toml` under
//! `COHORT_*` environment overrides (double underscore for nesting, e.g.
//! `COHORT_LANGUAGE_SERVICE__MODEL`).

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default)]
    pub language_service: LanguageServiceSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageServiceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    // falls back to OPENAI_API_KEY at startup when unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LanguageServiceSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_data_path() -> String {
    "data/students.csv".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    pub fn load() -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name("cohort").required(false))
            .add_source(config::Environment::with_prefix("COHORT").separator("__"))
            .build()?;
        Ok(raw.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_everything_but_the_api_key() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.listen, "0.0.0.0:8000");
        assert_eq!(settings.language_service.timeout_secs, 30);
        assert!(settings.language_service.api_key.is_none());
    }
}
