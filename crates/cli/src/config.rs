use std::path::Path;

use anyhow::{Context, Result};
use orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "deployer.toml";
pub const DEFAULT_DB_NAME: &str = "deployer.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub database_url: String,
    pub space_id: String,
    pub orchestrator: OrchestratorConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_url: format!("sqlite:{DEFAULT_DB_NAME}"),
            space_id: "default".to_string(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl CliConfig {
    /// Defaults when `path` does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();

        let config = CliConfig::load(&dir.path().join(CONFIG_FILE)).await.unwrap();

        assert_eq!(config, CliConfig::default());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(
            &path,
            "space_id = \"prod\"\n\n[orchestrator]\npoll_interval_ms = 250\n",
        )
        .await
        .unwrap();

        let config = CliConfig::load(&path).await.unwrap();

        assert_eq!(config.space_id, "prod");
        assert_eq!(config.database_url, "sqlite:deployer.db");
        assert_eq!(config.orchestrator.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.orchestrator.max_retries, 3);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = CliConfig {
            space_id: "staging".to_string(),
            ..Default::default()
        };

        config.save(&path).await.unwrap();

        assert_eq!(CliConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, "space_id = [").await.unwrap();

        assert!(CliConfig::load(&path).await.is_err());
    }
}
