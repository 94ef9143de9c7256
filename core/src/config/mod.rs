use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TOOLCALL_DIR: &str = ".toolcall";

pub const DEFAULT_TERMINATION_TOKEN: &str = "stop";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Upstream credentials and endpoints for the built-in tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub http_timeout_secs: u64,
    pub disk_path: PathBuf,
    pub openweather_api_key: String,
    pub unsplash_access_key: String,
    pub polygon_api_key: String,
    pub opencage_api_key: String,
    pub newsapi_api_key: String,
    pub omdb_api_key: String,
    pub spoonacular_api_key: String,
    /// Per-tool base URL overrides, keyed by tool name.
    pub base_urls: BTreeMap<String, String>,
    /// Major cities reported alongside a country's weather.
    pub country_cities: BTreeMap<String, Vec<String>>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            disk_path: PathBuf::from("/"),
            openweather_api_key: String::new(),
            unsplash_access_key: String::new(),
            polygon_api_key: String::new(),
            opencage_api_key: String::new(),
            newsapi_api_key: String::new(),
            omdb_api_key: String::new(),
            spoonacular_api_key: String::new(),
            base_urls: BTreeMap::new(),
            country_cities: default_country_cities(),
        }
    }
}

impl ToolsConfig {
    pub fn base_url<'a>(&'a self, tool: &str, default: &'a str) -> &'a str {
        self.base_urls
            .get(tool)
            .map(|s| s.trim_end_matches('/'))
            .unwrap_or(default)
    }
}

fn default_country_cities() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, [&str; 5]); 3] = [
        ("Pakistan", ["Karachi", "Lahore", "Islamabad", "Quetta", "Peshawar"]),
        ("USA", ["New York", "Los Angeles", "Chicago", "Houston", "Phoenix"]),
        ("India", ["Mumbai", "Delhi", "Bangalore", "Kolkata", "Chennai"]),
    ];
    entries
        .into_iter()
        .map(|(country, cities)| {
            (
                country.to_string(),
                cities.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub termination_token: String,
    pub stream: StreamConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gemini-2.0-flash-exp".to_string(),
            temperature: 0.3,
            termination_token: DEFAULT_TERMINATION_TOKEN.to_string(),
            stream: StreamConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

pub fn get_toolcall_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(TOOLCALL_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_toolcall_dir().join("config.toml")
}

pub fn ensure_toolcall_dir() -> Result<PathBuf> {
    let dir = get_toolcall_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create toolcall directory at {}", dir.display()))?;
    }

    Ok(dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or("gemini")
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'toolcall onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_toolcall_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

/// First non-empty environment variable, falling back to the configured value.
pub fn resolve_key(env_vars: &[&str], config_key: &str) -> Option<String> {
    env_vars
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .or_else(|| (!config_key.is_empty()).then(|| config_key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_gemini_setup() {
        let config = Config::default();
        assert_eq!(config.provider_name(), "gemini");
        assert_eq!(config.termination_token, "stop");
        assert!(config.stream.enabled);
        assert_eq!(config.tools.disk_path, PathBuf::from("/"));
        assert_eq!(config.tools.country_cities["Pakistan"].len(), 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "provider = \"openai\"\nmodel = \"gpt-4o\"\n\n[tools]\nomdb_api_key = \"abc\"\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.provider_name(), "openai");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.tools.omdb_api_key, "abc");
        assert_eq!(config.tools.http_timeout_secs, 30);
        assert!(config.tools.country_cities.contains_key("India"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.termination_token = "halt".into();
        config
            .tools
            .base_urls
            .insert("get_weather".into(), "http://localhost:9000/".into());

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.termination_token, "halt");
        assert_eq!(
            loaded.tools.base_url("get_weather", "https://example.com"),
            "http://localhost:9000"
        );
        assert_eq!(
            loaded.tools.base_url("get_recipe", "https://example.com"),
            "https://example.com"
        );
    }

    #[test]
    fn missing_file_points_to_onboarding() {
        let tmp = TempDir::new().unwrap();
        let err = load_config_from(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("toolcall onboard"));
    }

    #[test]
    fn resolve_key_falls_back_to_config() {
        let key = resolve_key(&["TOOLCALL_TEST_UNSET_VAR_0F3A"], "from-config");
        assert_eq!(key.as_deref(), Some("from-config"));
        assert_eq!(resolve_key(&["TOOLCALL_TEST_UNSET_VAR_0F3A"], ""), None);
    }
}
