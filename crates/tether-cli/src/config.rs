use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tether_console::ConsoleConfig;
use tether_host::HostConfig;

/// Contents of the `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub console: ConsoleConfig,
    /// Host builtins are only installed when this section is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<HostConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.json");
        fs::write(
            &path,
            r#"{"console": {"banner": "hello"}, "host": {"bin_dir": "/boot"}}"#,
        )
        .unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.console.banner.as_deref(), Some("hello"));
        assert_eq!(config.console.prompt, ">>> ");
        let host = config.host.unwrap();
        assert_eq!(host.bin_dir, Path::new("/boot"));
        assert_eq!(host.nthreads, 1);
    }

    #[test]
    fn test_empty_config_has_no_host() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(config.host.is_none());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = AppConfig::load(Path::new("/nonexistent/tether.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tether.json"));
    }
}
