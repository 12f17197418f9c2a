// Declarative commands: plan, apply, refresh, destroy
pub mod declarative;

// Adopting existing remote resources
pub mod import;

// State and local catalog inspection
pub mod catalog;
pub mod state;

use anyhow::Result;
use association::PlanOptions;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Context;
use crate::config::CatalinkConfig;
use crate::engine::Target;
use crate::remote::Clients;
use crate::remote::local::LocalCatalog;
use crate::state::CatalinkState;

/// Everything a command needs: config, state location and clients
pub struct Session {
    pub config: CatalinkConfig,
    pub state_path: PathBuf,
    pub catalog: Arc<LocalCatalog>,
    pub clients: Clients,
}

impl Session {
    /// Load the config selected on the command line
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = CatalinkConfig::load(ctx.config_path.as_deref())?;
        Self::with_config(config, ctx.state_path.clone())
    }

    /// Build a session from an already loaded config
    pub fn with_config(config: CatalinkConfig, state_path: Option<PathBuf>) -> Result<Self> {
        let state_path = match state_path {
            Some(path) => path,
            None => config.state_path()?,
        };
        let catalog = Arc::new(LocalCatalog::open(
            config.catalog_path()?,
            config.local.provisioning_polls,
        ));
        log::debug!(
            "State: {}, catalog: {}",
            state_path.display(),
            catalog.path().display()
        );

        Ok(Self {
            clients: Clients::from_backend(catalog.clone()),
            config,
            state_path,
            catalog,
        })
    }

    pub fn load_state(&self) -> Result<CatalinkState> {
        CatalinkState::load_from(&self.state_path)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            associate_is_idempotent: self.config.associate_is_idempotent,
        }
    }
}

/// Parse an optional `type` / `type.name` argument
pub fn target_of(target: Option<&str>) -> Result<Target> {
    match target {
        Some(target) => crate::engine::parse_target(target),
        None => Ok(Target::all()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_paths_follow_config() {
        let dir = TempDir::new().unwrap();
        let session = testing::session(&dir, 0);
        assert_eq!(session.state_path, dir.path().join("state.toml"));
        assert_eq!(session.catalog.path(), dir.path().join("catalog.json"));
        assert!(session.load_state().unwrap().is_empty());
    }

    #[test]
    fn test_state_override() {
        let dir = TempDir::new().unwrap();
        let other = dir.path().join("elsewhere.toml");
        let config = CatalinkConfig {
            catalog_file: dir.path().join("catalog.json").display().to_string(),
            ..CatalinkConfig::default()
        };
        let session = Session::with_config(config, Some(other.clone())).unwrap();
        assert_eq!(session.state_path, other);
    }

    #[test]
    fn test_target_of() {
        assert_eq!(target_of(None).unwrap(), Target::all());
        assert!(target_of(Some("artifact.v1")).is_ok());
        assert!(target_of(Some("nope")).is_err());
    }
}
