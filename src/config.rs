use anyhow::{Context, Result, bail};
use convergence::WaitConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path (~/.config/catalink)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("catalink"))
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Could not expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

// ============================================================================
// Config Schema
// ============================================================================

/// User configuration loaded from ~/.config/catalink/config.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalinkConfig {
    /// Where applied state is recorded
    pub state_file: String,

    /// JSON file backing the local catalog
    pub catalog_file: String,

    /// Parallel workers used by apply and destroy
    pub jobs: usize,

    /// Treat a change of source portfolio as an in-place re-associate
    pub associate_is_idempotent: bool,

    pub poll: PollSettings,

    pub local: LocalSettings,
}

/// How long and how often to poll asynchronous operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

/// Behavior of the local catalog backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Describe calls a new artifact stays in CREATING
    pub provisioning_polls: u32,
}

impl Default for CatalinkConfig {
    fn default() -> Self {
        Self {
            state_file: "~/.local/state/catalink/state.toml".to_string(),
            catalog_file: "~/.local/state/catalink/catalog.json".to_string(),
            jobs: 4,
            associate_is_idempotent: true,
            poll: PollSettings::default(),
            local: LocalSettings::default(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        let wait = WaitConfig::default();
        Self {
            interval_secs: wait.interval.as_secs(),
            timeout_secs: wait.timeout.as_secs(),
        }
    }
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            provisioning_polls: 2,
        }
    }
}

impl PollSettings {
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

impl CatalinkConfig {
    /// Load the config from an explicit path or ~/.config/catalink/config.toml
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_dir()?.join("config.toml"),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        expand_path(&self.state_file)
    }

    pub fn catalog_path(&self) -> Result<PathBuf> {
        expand_path(&self.catalog_file)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CatalinkConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, CatalinkConfig::default());
        assert_eq!(config.poll.wait_config(), WaitConfig::default());
        assert_eq!(config.jobs, 4);
        assert!(config.associate_is_idempotent);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
jobs = 8
associate_is_idempotent = false

[poll]
timeout_secs = 60
"#,
        )
        .unwrap();

        let config = CatalinkConfig::load_from(&path).unwrap();
        assert_eq!(config.jobs, 8);
        assert!(!config.associate_is_idempotent);
        assert_eq!(config.poll.interval_secs, 3);
        assert_eq!(config.poll.timeout_secs, 60);
        assert_eq!(config.local.provisioning_polls, 2);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = \"many\"").unwrap();
        assert!(CatalinkConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[poll]\ninterval_secs = 0\n").unwrap();

        let err = CatalinkConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("poll.interval_secs"));
    }

    #[test]
    fn test_paths_expand_tilde() {
        let config = CatalinkConfig::default();
        let state = config.state_path().unwrap();
        assert!(state.is_absolute());
        assert!(state.ends_with(".local/state/catalink/state.toml"));
    }
}
