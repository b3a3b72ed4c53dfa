use crate::theme::Theme;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_HEADLESS: &str = "DSVIZ_HEADLESS";
pub const ENV_OUTPUT_DIR: &str = "DSVIZ_OUTPUT_DIR";
pub const ENV_CACHE_DIR: &str = "DSVIZ_CACHE_DIR";
pub const ENV_FORMAT: &str = "DSVIZ_FORMAT";

const DEFAULT_CACHE_DIR: &str = "/tmp/dsviz-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            other => Err(anyhow!("unknown output format '{}'", other)),
        }
    }
}

/// Process-wide settings, built once at start-up and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub headless: bool,
    pub output_dir: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub format: OutputFormat,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: false,
            output_dir: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            format: OutputFormat::Svg,
            theme: Theme::classic(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; absent or empty keys
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_HEADLESS) {
            config.headless = parse_flag(&value)
                .ok_or_else(|| anyhow!("{} must be a boolean, got '{}'", ENV_HEADLESS, value))?;
        }
        if let Some(value) = get(ENV_OUTPUT_DIR) {
            config.output_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_CACHE_DIR) {
            config.cache_dir = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_FORMAT) {
            config.format = value.parse()?;
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(!config.headless);
        assert!(config.output_dir.is_none());
        assert_eq!(config.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(config.format, OutputFormat::Svg);
    }

    #[test]
    fn reads_all_keys() {
        let config = Config::from_lookup(lookup(&[
            (ENV_HEADLESS, "1"),
            (ENV_OUTPUT_DIR, "/tmp/out"),
            (ENV_CACHE_DIR, "/tmp/cache"),
            (ENV_FORMAT, "PNG"),
        ]))
        .unwrap();
        assert!(config.headless);
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.format, OutputFormat::Png);
    }

    #[test]
    fn empty_values_fall_back() {
        let config = Config::from_lookup(lookup(&[(ENV_OUTPUT_DIR, "  ")])).unwrap();
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[(ENV_HEADLESS, "maybe")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_FORMAT, "gif")])).is_err());
    }
}
