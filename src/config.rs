use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cctray::{HistoryStore, Topology};

/// Configuration file structure for the CCTray status cache.
///
/// Holds the server settings, the location of the stage history and the
/// build topology to reconcile. Configuration files are loaded from the
/// current directory or a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Server settings used to build feed links
    #[serde(default)]
    pub server: ServerConfig,

    /// Stage history store settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Declared pipelines, stages and jobs
    #[serde(default)]
    pub topology: Topology,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Public base URL of the CI server
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HistoryConfig {
    /// History file path; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
        }
    }
}

fn default_site_url() -> String {
    "http://localhost:8153".to_string()
}

const CANDIDATES: [&str; 4] = ["cctray.toml", "cctray.json", "cctray.yaml", "cctray.yml"];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./cctray.toml
    /// 3. ./cctray.json
    /// 4. ./cctray.yaml
    /// 5. ./cctray.yml
    ///
    /// Returns default configuration if no path is given and no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::discover(Path::new(".")),
        }
    }

    fn discover(dir: &Path) -> Result<Self> {
        for candidate in &CANDIDATES {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // No config file found, return defaults
        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Opens the stage history store described by this configuration.
    pub fn history_store(&self) -> Result<HistoryStore> {
        let path = match &self.history.path {
            Some(path) => path.clone(),
            None => HistoryStore::default_path().context("Failed to locate history file")?,
        };

        Ok(HistoryStore::new(path, self.server.site_url.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.site_url, "http://localhost:8153");
        assert!(config.history.path.is_none());
        assert!(config.topology.pipelines.is_empty());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[server]
site-url = "https://ci.example.com"

[history]
path = "/tmp/cctray/history.json"

[[topology.pipelines]]
name = "pipeline1"

[[topology.pipelines.stages]]
name = "build"
jobs = [{ name = "compile" }, { name = "lint" }]

[[topology.pipelines.stages]]
name = "deploy"
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.server.site_url, "https://ci.example.com");
        assert_eq!(
            config.history.path,
            Some(PathBuf::from("/tmp/cctray/history.json"))
        );

        let pipeline = config.topology.pipeline("pipeline1").unwrap();
        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(pipeline.stages[0].jobs[1].name, "lint");
        assert!(pipeline.stages[1].jobs.is_empty());
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "topology": {
    "pipelines": [
      { "name": "p2", "stages": [{ "name": "s1", "jobs": [{ "name": "j1" }] }] },
      { "name": "p1", "stages": [] }
    ]
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.server.site_url, "http://localhost:8153");
        let names: Vec<_> = config
            .topology
            .pipelines
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["p2", "p1"]);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = r#"
server:
  site-url: https://yaml.example.com
topology:
  pipelines:
    - name: p1
      stages:
        - name: s1
          jobs:
            - name: j1
"#;
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.server.site_url, "https://yaml.example.com");
        assert_eq!(config.topology.pipelines[0].stages[0].jobs[0].name, "j1");
    }

    #[test]
    fn test_load_unknown_extension_falls_back() {
        let mut temp_file = NamedTempFile::with_suffix(".conf").unwrap();
        write!(temp_file, r#"{{ "server": {{ "site-url": "https://json.example.com" }} }}"#)
            .unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.server.site_url, "https://json.example.com");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("nonexistent-cctray.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_discover_candidates() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("cctray.yml"),
            "server:\n  site-url: https://found.example.com\n",
        )
        .unwrap();

        let config = Config::discover(temp_dir.path()).unwrap();
        assert_eq!(config.server.site_url, "https://found.example.com");
    }

    #[test]
    fn test_discover_without_candidates_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::discover(temp_dir.path()).unwrap();
        assert_eq!(config.server.site_url, "http://localhost:8153");
    }

    #[test]
    fn test_history_store_uses_configured_path() {
        let config = Config {
            history: HistoryConfig {
                path: Some(PathBuf::from("/var/lib/cctray/history.json")),
            },
            ..Config::default()
        };

        let store = config.history_store().unwrap();
        assert_eq!(store.path(), Path::new("/var/lib/cctray/history.json"));
    }
}
