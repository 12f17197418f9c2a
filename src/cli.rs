use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalink")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Reconcile service catalog portfolio associations and provisioning artifacts",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/catalink/config.toml)
    #[arg(long, global = true, env = "CATALINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file, overriding the configured one
    #[arg(long, global = true, env = "CATALINK_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the catalog match the manifest
    Apply(ApplyArgs),

    /// Re-read recorded resources and update the state file
    Refresh(TargetArgs),

    /// Remove every recorded resource from the catalog
    Destroy(DestroyArgs),

    /// Adopt existing catalog resources into the state file
    #[command(subcommand)]
    Import(ImportCommand),

    /// Inspect the state file
    #[command(subcommand)]
    State(StateCommand),

    /// Manage the local catalog backend
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Declarative Commands
// ============================================================================

#[derive(Args, Clone)]
pub struct ManifestArgs {
    /// Manifest describing the desired catalog
    #[arg(short = 'f', long = "file", default_value = crate::schema::DEFAULT_MANIFEST)]
    pub manifest: PathBuf,
}

#[derive(Args, Clone)]
pub struct TargetArgs {
    /// Only act on a resource type or a single resource (e.g. association.web)
    pub target: Option<String>,
}

#[derive(Args, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Show what would change without applying
    #[arg(long)]
    pub dry_run: bool,

    /// Number of parallel jobs (default from config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Seconds to wait for an artifact to become available
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Stop waiting on other resources after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Clone)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

// ============================================================================
// Import Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ImportCommand {
    /// Import an association from its `<portfolio-id>_<product-id>` key
    Association {
        /// Resource name to record it under
        name: String,

        /// Import key, e.g. port-ig54mbjew7qru_prod-z2koxglqdw4n4
        key: String,
    },

    /// Import a provisioning artifact
    Artifact {
        /// Resource name to record it under
        name: String,

        /// Product the artifact belongs to
        product_id: String,

        /// Artifact id
        artifact_id: String,
    },
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// Show recorded resources
    Show(TargetArgs),
}

// ============================================================================
// Catalog Commands
// ============================================================================

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// Create a portfolio in the local catalog
    AddPortfolio {
        /// Display name
        name: String,
    },

    /// Create a product in the local catalog
    AddProduct {
        /// Display name
        name: String,
    },

    /// Show portfolios, products and artifacts in the local catalog
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "catalink",
            "-vv",
            "apply",
            "association.web",
            "--jobs",
            "2",
            "--timeout",
            "30",
            "--fail-fast",
            "--yes",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.target.target.as_deref(), Some("association.web"));
        assert_eq!(args.run.jobs, Some(2));
        assert_eq!(args.run.timeout, Some(30));
        assert!(args.run.fail_fast);
        assert!(args.run.yes);
        assert_eq!(args.manifest.manifest, PathBuf::from("catalink.toml"));
    }

    #[test]
    fn test_import_association() {
        let cli = Cli::parse_from([
            "catalink",
            "import",
            "association",
            "web",
            "port-ig54mbjew7qru_prod-z2koxglqdw4n4",
        ]);
        assert!(matches!(
            cli.command,
            Command::Import(ImportCommand::Association { .. })
        ));
    }
}
