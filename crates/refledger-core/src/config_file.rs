use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub storage: Option<StorageConfig>,
    pub tuning: Option<TuningConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub openai_key: Option<String>,
    pub openai_model: Option<String>,
    pub s2_api_key: Option<String>,
    pub ai_search_key: Option<String>,
    pub openalex_mailto: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningConfig {
    pub model_timeout_secs: Option<u64>,
    pub lookup_timeout_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/refledger/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("refledger").join("config.toml"))
}

/// Records and job snapshots live here unless overridden:
/// `<data_dir>/refledger`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("refledger"))
        .unwrap_or_else(|| PathBuf::from(".refledger"))
}

/// Load config by cascading CWD `.refledger.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".refledger.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            openai_key: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.openai_key.clone())
                .or_else(|| base.api_keys.as_ref().and_then(|a| a.openai_key.clone())),
            openai_model: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.openai_model.clone())
                .or_else(|| base.api_keys.as_ref().and_then(|a| a.openai_model.clone())),
            s2_api_key: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.s2_api_key.clone())
                .or_else(|| base.api_keys.as_ref().and_then(|a| a.s2_api_key.clone())),
            ai_search_key: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.ai_search_key.clone())
                .or_else(|| base.api_keys.as_ref().and_then(|a| a.ai_search_key.clone())),
            openalex_mailto: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.openalex_mailto.clone())
                .or_else(|| {
                    base.api_keys
                        .as_ref()
                        .and_then(|a| a.openalex_mailto.clone())
                }),
        }),
        storage: Some(StorageConfig {
            data_dir: overlay
                .storage
                .as_ref()
                .and_then(|s| s.data_dir.clone())
                .or_else(|| base.storage.as_ref().and_then(|s| s.data_dir.clone())),
        }),
        tuning: Some(TuningConfig {
            model_timeout_secs: overlay
                .tuning
                .as_ref()
                .and_then(|t| t.model_timeout_secs)
                .or_else(|| base.tuning.as_ref().and_then(|t| t.model_timeout_secs)),
            lookup_timeout_secs: overlay
                .tuning
                .as_ref()
                .and_then(|t| t.lookup_timeout_secs)
                .or_else(|| base.tuning.as_ref().and_then(|t| t.lookup_timeout_secs)),
        }),
    }
}
