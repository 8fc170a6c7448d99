use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::ledger::Endpoint;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub transport: TransportConfig,
  /// Directory for the log file (logs go to stderr if not set)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Disable to send every read to the transport
  pub enabled: bool,
  /// Topics holding reference data: never suppressed as stale and never
  /// swept by invalidation
  pub exempt_topics: BTreeSet<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      exempt_topics: BTreeSet::from([Endpoint::Employees.as_str().to_string()]),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
  /// Simulated latency range of the mock backend
  pub min_latency_ms: u64,
  pub max_latency_ms: u64,
}

impl Default for TransportConfig {
  fn default() -> Self {
    Self {
      min_latency_ms: 50,
      max_latency_ms: 400,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fetchgate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fetchgate/config.yaml
  ///
  /// Falls back to the defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("fetchgate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fetchgate").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    for topic in &config.cache.exempt_topics {
      topic.parse::<Endpoint>()?;
    }

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert!(config.cache.enabled);
    assert!(config.cache.exempt_topics.contains("employees"));
    assert_eq!(config.transport.min_latency_ms, 50);
    assert!(config.log_dir.is_none());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse("transport:\n  max_latency_ms: 900\n").unwrap();
    assert!(config.cache.enabled);
    assert_eq!(config.transport.min_latency_ms, 50);
    assert_eq!(config.transport.max_latency_ms, 900);
  }

  #[test]
  fn test_exempt_topics_override() {
    let config = Config::parse(
      "cache:\n  enabled: false\n  exempt_topics: [employees, paginatedTransactions]\n",
    )
    .unwrap();
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.exempt_topics.len(), 2);
  }

  #[test]
  fn test_unknown_exempt_topic_is_rejected() {
    assert!(Config::parse("cache:\n  exempt_topics: [payroll]\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path() {
    let result = Config::load(Some(Path::new("/definitely/not/here.yaml")));
    assert!(result.is_err());
  }
}
