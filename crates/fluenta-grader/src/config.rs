//! Application configuration and grader factory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use fluenta_core::model::{CefrLevel, Skill, SkillConfig};
use fluenta_core::traits::Grader;

use crate::http::HttpGrader;
use crate::mock::MockGrader;

/// Configuration for a single grader backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraderConfig {
    Http {
        api_key: String,
        base_url: String,
    },
    Mock {
        #[serde(default = "default_mock_band")]
        band: f64,
    },
}

impl std::fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraderConfig::Http { api_key: _, base_url } => f
                .debug_struct("Http")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            GraderConfig::Mock { band } => {
                f.debug_struct("Mock").field("band", band).finish()
            }
        }
    }
}

fn default_mock_band() -> f64 {
    6.0
}

/// Top-level fluenta configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluentaConfig {
    /// Grader configurations keyed by name.
    #[serde(default)]
    pub graders: HashMap<String, GraderConfig>,
    /// Default grader to use.
    #[serde(default = "default_grader")]
    pub default_grader: String,
    /// Per-skill administration settings.
    #[serde(default)]
    pub skills: BTreeMap<Skill, SkillConfig>,
    /// Claimed starting level seeding the ability prior.
    #[serde(default)]
    pub initial_level: Option<CefrLevel>,
    /// Max retries on grader errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay between grader retries in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Directory of item bank TOML files.
    #[serde(default = "default_bank_dir")]
    pub bank_dir: PathBuf,
    /// Directory for persisted session snapshots.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

fn default_grader() -> String {
    "http".to_string()
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_bank_dir() -> PathBuf {
    PathBuf::from("./banks")
}
fn default_session_dir() -> PathBuf {
    PathBuf::from("./fluenta-sessions")
}

impl Default for FluentaConfig {
    fn default() -> Self {
        Self {
            graders: HashMap::new(),
            default_grader: default_grader(),
            skills: BTreeMap::new(),
            initial_level: None,
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            bank_dir: default_bank_dir(),
            session_dir: default_session_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_grader_config(config: &GraderConfig) -> GraderConfig {
    match config {
        GraderConfig::Http { api_key, base_url } => GraderConfig::Http {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_env_vars(base_url),
        },
        GraderConfig::Mock { band } => GraderConfig::Mock { band: *band },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `fluenta.toml` in the current directory
/// 2. `~/.config/fluenta/config.toml`
///
/// Environment variable override: `FLUENTA_GRADER_KEY`.
pub fn load_config() -> Result<FluentaConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<FluentaConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("fluenta.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<FluentaConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => FluentaConfig::default(),
    };

    // Apply env var overrides
    if let Ok(key) = std::env::var("FLUENTA_GRADER_KEY") {
        if let Some(GraderConfig::Http { api_key, .. }) = config.graders.get_mut("http") {
            *api_key = key;
        }
    }

    // Resolve env vars in all grader configs
    let resolved: HashMap<String, GraderConfig> = config
        .graders
        .iter()
        .map(|(k, v)| (k.clone(), resolve_grader_config(v)))
        .collect();
    config.graders = resolved;

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("fluenta"))
}

/// Create a grader instance from its configuration.
pub fn create_grader(config: &GraderConfig) -> Result<Box<dyn Grader>> {
    match config {
        GraderConfig::Http { api_key, base_url } => {
            Ok(Box::new(HttpGrader::new(api_key, base_url)))
        }
        GraderConfig::Mock { band } => Ok(Box::new(MockGrader::with_fixed_band(*band))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_FLUENTA_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_FLUENTA_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_FLUENTA_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_FLUENTA_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = FluentaConfig::default();
        assert_eq!(config.default_grader, "http");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.session_dir, PathBuf::from("./fluenta-sessions"));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_grader = "http"
initial_level = "B1"

[graders.http]
type = "http"
api_key = "${FLUENTA_GRADER_KEY}"
base_url = "https://grader.example.com"

[graders.mock]
type = "mock"
band = 7.0

[skills.reading]
se_target = 0.25
max_items = 25

[skills.reading.blueprint]
main_idea = 3
detail = 3
"#;
        let config: FluentaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.graders.len(), 2);
        assert!(matches!(
            config.graders.get("http"),
            Some(GraderConfig::Http { .. })
        ));
        assert_eq!(config.initial_level, Some(CefrLevel::B1));
        let reading = &config.skills[&Skill::Reading];
        assert_eq!(reading.se_target, 0.25);
        assert_eq!(reading.max_items, 25);
        assert_eq!(reading.blueprint["main_idea"], 3);
        // Unspecified fields keep their defaults.
        assert_eq!(reading.min_items, 10);
    }

    #[test]
    fn grader_key_override() {
        std::env::set_var("_FLUENTA_KEY_OVERRIDE_TEST", "1");
        let toml_str = r#"
[graders.http]
type = "http"
api_key = "from-file"
base_url = "https://grader.example.com"
"#;
        let mut config: FluentaConfig = toml::from_str(toml_str).unwrap();
        std::env::set_var("FLUENTA_GRADER_KEY", "from-env");
        if let Ok(key) = std::env::var("FLUENTA_GRADER_KEY") {
            if let Some(GraderConfig::Http { api_key, .. }) = config.graders.get_mut("http") {
                *api_key = key;
            }
        }
        match config.graders.get("http") {
            Some(GraderConfig::Http { api_key, .. }) => assert_eq!(api_key, "from-env"),
            _ => panic!("missing http grader"),
        }
        std::env::remove_var("FLUENTA_GRADER_KEY");
        std::env::remove_var("_FLUENTA_KEY_OVERRIDE_TEST");
    }

    #[test]
    fn debug_masks_api_key() {
        let config = GraderConfig::Http {
            api_key: "sk-secret".into(),
            base_url: "https://grader.example.com".into(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }
}
