//! Application configuration
//!
//! A single `AppConfig` is loaded once per process from
//! `<config_dir>/crypto-vat/config.json`, overlaid with environment variables
//! and then passed by reference to the commands that need it.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Marker used by freshly generated config files for keys the user still has to fill in.
pub const PLACEHOLDER_MARKER: &str = "CONFIG_REQUIRED";

const APP_DIR_NAME: &str = "crypto-vat";
const CONFIG_FILE_NAME: &str = "config.json";

/// API credentials for the market data providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeys {
    /// Optional CoinGecko demo ("CG-...") or pro key
    pub coingecko: Option<String>,
    pub coinmarketcap: Option<String>,
    pub livecoinwatch: Option<String>,
    pub coinranking: Option<String>,
}

impl ApiKeys {
    pub fn coingecko(&self) -> Option<&str> {
        usable_key(self.coingecko.as_deref())
    }

    pub fn coinmarketcap(&self) -> Option<&str> {
        usable_key(self.coinmarketcap.as_deref())
    }

    pub fn livecoinwatch(&self) -> Option<&str> {
        usable_key(self.livecoinwatch.as_deref())
    }

    pub fn coinranking(&self) -> Option<&str> {
        usable_key(self.coinranking.as_deref())
    }
}

/// A key counts as configured only when it is non-empty and not a placeholder.
pub fn usable_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty() && !k.contains(PLACEHOLDER_MARKER))
}

/// Tuning knobs for the provider fetch pool and HTTP layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchSettings {
    /// Maximum number of providers fetched at the same time
    pub workers: usize,
    /// Wall-clock budget per provider (all of its pages together)
    pub source_timeout_secs: u64,
    /// Timeout of a single HTTP request
    pub request_timeout_secs: u64,
    /// Retries for 429/5xx responses and transport errors
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay_ms: u64,
    /// Pause between paged requests to the same provider
    pub page_delay_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            source_timeout_secs: 60,
            request_timeout_secs: 15,
            max_retries: 3,
            retry_base_delay_ms: 500,
            page_delay_ms: 200,
        }
    }
}

/// Ratio thresholds used across verification and reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    /// Provider-side noise filter: keep only volume > factor × market cap
    pub source_prefilter: f64,
    /// Minimum ratio for a single-source large-cap token
    pub single_source_min_ratio: f64,
    /// Ratio a multi-source token has to exceed
    pub multi_source_min_ratio: f64,
    /// Market cap above which a token counts as large cap
    pub large_cap: f64,
    /// Minimum VTMR for rows shown in the cross-market report
    pub report_min_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            source_prefilter: 0.75,
            single_source_min_ratio: 0.50,
            multi_source_min_ratio: 0.75,
            large_cap: 1_000_000_000.0,
            report_min_ratio: 0.50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub api_keys: ApiKeys,
    /// Per-user working directories (uploads, spot reports) live below this path
    pub data_dir: PathBuf,
    /// Where finished cross-market reports are written
    pub report_dir: PathBuf,
    /// Coinalyze custom-metric view the futures PDF is printed from
    pub futures_url: Option<String>,
    pub fetch: FetchSettings,
    pub thresholds: Thresholds,
    /// Also render the cross-market report as PDF next to the HTML file
    pub write_pdf: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = default_base_dir();
        Self {
            api_keys: ApiKeys::default(),
            data_dir: base.join("data"),
            report_dir: base.join("reports"),
            futures_url: None,
            fetch: FetchSettings::default(),
            thresholds: Thresholds::default(),
            write_pdf: true,
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl AppConfig {
    /// Load from `path` (or the default location) and apply environment overrides.
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_stored(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// The persisted configuration only, without environment overrides
    pub fn load_stored(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        match path {
            Some(ref p) if p.exists() => Self::from_file(p),
            Some(ref p) => {
                log::debug!("Config: {} not found, using defaults", p.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Change one stored value and write the file back.
    ///
    /// Values that only exist in the environment stay out of the file.
    pub fn update_stored(path: &Path, key: &str, value: &str) -> Result<Self> {
        let mut stored = Self::load_stored(Some(path))?;
        stored.set_value(key, value)?;
        stored.save(path)?;
        Ok(stored)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Persist the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Config: saved to {}", path.display());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_str("COINGECKO_API_KEY") {
            self.api_keys.coingecko = Some(v);
        }
        if let Some(v) = env_str("CMC_API_KEY") {
            self.api_keys.coinmarketcap = Some(v);
        }
        if let Some(v) = env_str("LIVECOINWATCH_API_KEY") {
            self.api_keys.livecoinwatch = Some(v);
        }
        if let Some(v) = env_str("COINRANKING_API_KEY") {
            self.api_keys.coinranking = Some(v);
        }
        if let Some(v) = env_str("COINALYZE_VTMR_URL") {
            self.futures_url = Some(v);
        }
        if let Some(v) = env_str("CRYPTO_VAT_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_str("CRYPTO_VAT_REPORT_DIR") {
            self.report_dir = PathBuf::from(v);
        }
    }

    /// Set a single value by its CLI name (`config set <key> <value>`).
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match key.to_lowercase().as_str() {
            "coingecko" | "coingecko_api_key" => self.api_keys.coingecko = Some(value),
            "cmc" | "coinmarketcap" | "cmc_api_key" => self.api_keys.coinmarketcap = Some(value),
            "lcw" | "livecoinwatch" | "livecoinwatch_api_key" => {
                self.api_keys.livecoinwatch = Some(value)
            }
            "cr" | "coinranking" | "coinranking_api_key" => self.api_keys.coinranking = Some(value),
            "futures_url" | "vtmr_url" => self.futures_url = Some(value),
            "data_dir" => self.data_dir = PathBuf::from(value),
            "report_dir" => self.report_dir = PathBuf::from(value),
            "write_pdf" => {
                self.write_pdf = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
            }
            other => return Err(AppError::Config(format!("Unknown config key '{}'", other))),
        }
        Ok(())
    }

    /// The paid providers need a key; CoinGecko works without one.
    pub fn is_setup_complete(&self) -> bool {
        self.api_keys.coinmarketcap().is_some()
    }

    /// Copy of the config with all credentials masked, for `config show`.
    pub fn redacted(&self) -> Self {
        let mask = |k: &Option<String>| {
            k.as_ref().map(|v| match usable_key(Some(v)) {
                Some(key) if key.chars().count() > 4 => {
                    let tail: String = key.chars().skip(key.chars().count() - 4).collect();
                    format!("****{}", tail)
                }
                Some(_) => "****".to_string(),
                None => v.clone(),
            })
        };
        let mut copy = self.clone();
        copy.api_keys = ApiKeys {
            coingecko: mask(&self.api_keys.coingecko),
            coinmarketcap: mask(&self.api_keys.coinmarketcap),
            livecoinwatch: mask(&self.api_keys.livecoinwatch),
            coinranking: mask(&self.api_keys.coinranking),
        };
        copy
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_keys_are_unusable() {
        assert_eq!(usable_key(Some("CONFIG_REQUIRED_CMC")), None);
        assert_eq!(usable_key(Some("   ")), None);
        assert_eq!(usable_key(None), None);
        assert_eq!(usable_key(Some(" abc123 ")), Some("abc123"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"apiKeys": {"coinmarketcap": "key"}, "writePdf": false}"#).unwrap();
        assert_eq!(config.api_keys.coinmarketcap(), Some("key"));
        assert!(!config.write_pdf);
        assert_eq!(config.fetch.workers, 4);
        assert_eq!(config.thresholds.large_cap, 1_000_000_000.0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.set_value("cmc", "secret-key").unwrap();
        config.set_value("write_pdf", "no").unwrap();
        config.save(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api_keys.coinmarketcap.as_deref(), Some("secret-key"));
        assert!(!loaded.write_pdf);
    }

    #[test]
    fn test_set_unknown_key() {
        let mut config = AppConfig::default();
        assert!(config.set_value("nope", "x").is_err());
    }

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = AppConfig::default();
        config.api_keys.coinranking = Some("abcdef123456".to_string());
        config.api_keys.livecoinwatch = Some("CONFIG_REQUIRED_LCW".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.api_keys.coinranking.as_deref(), Some("****3456"));
        assert_eq!(redacted.api_keys.livecoinwatch.as_deref(), Some("CONFIG_REQUIRED_LCW"));
    }

    #[test]
    fn test_setup_complete_requires_cmc() {
        let mut config = AppConfig::default();
        assert!(!config.is_setup_complete());
        config.api_keys.coinmarketcap = Some("k".to_string());
        assert!(config.is_setup_complete());
    }

    #[test]
    fn test_update_keeps_env_secrets_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut initial = AppConfig::default();
        initial.set_value("lcw", "file-key").unwrap();
        initial.save(&path).unwrap();

        std::env::set_var("CMC_API_KEY", "env-only-secret");
        let runtime = AppConfig::load(Some(&path)).unwrap();
        let stored = AppConfig::update_stored(&path, "write_pdf", "no").unwrap();
        std::env::remove_var("CMC_API_KEY");

        assert_eq!(runtime.api_keys.coinmarketcap(), Some("env-only-secret"));
        assert_eq!(stored.api_keys.coinmarketcap, None);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("env-only-secret"));
        let reloaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.api_keys.livecoinwatch.as_deref(), Some("file-key"));
        assert!(!reloaded.write_pdf);
    }
}
