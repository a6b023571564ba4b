use std::fs;
use std::path::Path;
use std::time::Duration;

use agent_api::AgentApiConfig;
use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const LOG_ENV_VAR: &str = "AGENT_STREAM_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Settings read from a `--config` JSON file. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
    pub timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Values given on the command line. They win over the file and the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
    pub timeout_sec: Option<u64>,
}

/// Layers file values and then command-line values over `base`.
pub fn resolve(
    base: AgentApiConfig,
    file: Option<&FileConfig>,
    overrides: &Overrides,
) -> Result<AgentApiConfig> {
    let mut config = base;

    let layers = file
        .map(|file| Overrides {
            base_url: file.base_url.clone(),
            model: file.model.clone(),
            max_iterations: file.max_iterations,
            timeout_sec: file.timeout_sec,
        })
        .into_iter()
        .chain(std::iter::once(overrides.clone()));

    for layer in layers {
        if let Some(base_url) = layer.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(model) = layer.model {
            config = config.with_model(model);
        }
        if let Some(max_iterations) = layer.max_iterations {
            if max_iterations == 0 {
                bail!("max_iterations must be a positive integer");
            }
            config = config.with_max_iterations(max_iterations);
        }
        if let Some(timeout_sec) = layer.timeout_sec {
            if timeout_sec == 0 {
                bail!("timeout_sec must be a positive integer");
            }
            config = config.with_timeout(Duration::from_secs(timeout_sec));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_wins_over_file_which_wins_over_base() {
        let base = AgentApiConfig::new("http://env:1").with_model("env-model");
        let file = FileConfig {
            base_url: Some("http://file:2".to_string()),
            model: Some("file-model".to_string()),
            max_iterations: Some(3),
            timeout_sec: None,
        };
        let overrides = Overrides {
            model: Some("flag-model".to_string()),
            ..Overrides::default()
        };

        let config = resolve(base, Some(&file), &overrides).expect("config");
        assert_eq!(config.base_url, "http://file:2");
        assert_eq!(config.model, "flag-model");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn zero_values_are_rejected() {
        let overrides = Overrides {
            timeout_sec: Some(0),
            ..Overrides::default()
        };
        let error = resolve(AgentApiConfig::default(), None, &overrides).expect_err("zero timeout");
        assert!(error.to_string().contains("timeout_sec"));
    }
}
