//! Configuration types for the IP risk engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Backend REST API settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Membership list cache settings.
    #[serde(default)]
    pub membership: MembershipConfig,

    /// Composite scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Backend REST API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Membership list cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MembershipConfig {
    /// How long a fetched list snapshot stays fresh, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Maximum entries fetched per list.
    #[serde(default = "default_page_limit")]
    pub list_page_limit: u32,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
            list_page_limit: default_page_limit(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_page_limit() -> u32 {
    1000
}

/// How the final composite score is combined from sub-scores.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompositeFormula {
    /// Max of the behavioral average/peak percentages (with threat-intel
    /// fallback). Matches the long-observed dashboard behavior.
    #[default]
    Max,
    /// Weighted blend: threat 0.40, behavioral 0.30, network 0.20, geo 0.10.
    Weighted,
}

/// Composite scoring settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    /// Composite combination formula.
    #[serde(default)]
    pub composite_formula: CompositeFormula,

    /// Country codes that add a geographic risk increment.
    #[serde(default = "default_high_risk_countries")]
    pub high_risk_countries: HashSet<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            composite_formula: CompositeFormula::default(),
            high_risk_countries: default_high_risk_countries(),
        }
    }
}

fn default_high_risk_countries() -> HashSet<String> {
    ["CN", "RU", "KP", "IR", "SY", "VN"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }

        if self.membership.list_page_limit == 0 {
            anyhow::bail!("membership.list_page_limit must be at least 1");
        }

        if self.membership.cache_ttl_seconds == 0 {
            anyhow::bail!("membership.cache_ttl_seconds must be at least 1");
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# IP Risk Engine Configuration

backend:
  base_url: "http://127.0.0.1:8080/api"
  timeout_ms: 5000               # Request timeout

membership:
  cache_ttl_seconds: 60          # List snapshot freshness window
  list_page_limit: 1000          # Max entries fetched per list

scoring:
  composite_formula: max         # max (observed behavior) or weighted
  high_risk_countries:
    - "CN"
    - "RU"
    - "KP"
    - "IR"
    - "SY"
    - "VN"
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.membership.cache_ttl_seconds, 60);
        assert_eq!(config.membership.list_page_limit, 1000);
        assert_eq!(config.scoring.composite_formula, CompositeFormula::Max);
        assert!(config.scoring.high_risk_countries.contains("KP"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
backend:
  base_url: "https://backend.internal/api"
  timeout_ms: 2000

membership:
  cache_ttl_seconds: 30

scoring:
  composite_formula: weighted
  high_risk_countries: ["XX"]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backend.base_url, "https://backend.internal/api");
        assert_eq!(config.backend.timeout_ms, 2000);
        assert_eq!(config.membership.cache_ttl_seconds, 30);
        assert_eq!(config.membership.list_page_limit, 1000);
        assert_eq!(config.scoring.composite_formula, CompositeFormula::Weighted);
        assert!(config.scoring.high_risk_countries.contains("XX"));
        assert!(!config.scoring.high_risk_countries.contains("CN"));
    }

    #[test]
    fn test_validate_empty_base_url() {
        let mut config = Config::default();
        config.backend.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_page_limit() {
        let mut config = Config::default();
        config.membership.list_page_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_BACKEND_URL", "https://example.test/api");
        let input = "base_url: \"${TEST_BACKEND_URL}\"";
        let result = expand_env_vars(input);
        assert_eq!(result, "base_url: \"https://example.test/api\"");
        std::env::remove_var("TEST_BACKEND_URL");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let input = "base_url: \"${NONEXISTENT_VAR_FOR_TEST}\"";
        assert_eq!(expand_env_vars(input), "base_url: \"\"");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(Config::example().as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.membership.cache_ttl_seconds, 60);
    }

    #[test]
    fn test_example_parses() {
        let config: Config = serde_yaml::from_str(&Config::example()).unwrap();
        assert!(config.validate().is_ok());
    }
}
