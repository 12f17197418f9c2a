//! Declarative commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make the catalog match the manifest
//! - `refresh` - Re-read recorded resources into the state file
//! - `destroy` - Remove every recorded resource

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

use super::{Session, target_of};
use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, PlanArgs, RunArgs, TargetArgs};
use crate::engine::differ::{PlanCounts, compute_diffs, display_diff};
use crate::engine::executor::ExecuteSummary;
use crate::engine::{ExecuteOptions, Target, build_resources, execute, merge_outcomes};
use crate::schema::Manifest;
use crate::state::RecordChange;
use crate::ui;

// ============================================================================
// Plan
// ============================================================================

pub fn plan(ctx: &Context, args: PlanArgs) -> Result<()> {
    ui::header("Catalink Plan");

    let session = Session::open(ctx)?;
    let manifest = Manifest::load(&args.manifest.manifest)?;
    let target = target_of(args.target.target.as_deref())?;
    print_paths(ctx, &session, Some(&args.manifest.manifest));

    let counts = plan_manifest(&session, &manifest, &target)?;
    if counts.total() > 0 && !ctx.quiet {
        println!();
        ui::dim("Run `catalink apply` to make these changes");
    }
    Ok(())
}

fn plan_manifest(session: &Session, manifest: &Manifest, target: &Target) -> Result<PlanCounts> {
    let state = session.load_state()?;
    let resources = build_resources(manifest, &state, &session.clients, target)?;
    let diffs = compute_diffs(&resources, &session.plan_options())?;
    display_diff(&diffs);
    Ok(PlanCounts::from_diffs(&diffs))
}

// ============================================================================
// Apply / Destroy
// ============================================================================

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    ui::header("Applying Catalog Configuration");

    if args.run.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let session = Session::open(ctx)?;
    let manifest = Manifest::load(&args.manifest.manifest)?;
    let target = target_of(args.target.target.as_deref())?;
    print_paths(ctx, &session, Some(&args.manifest.manifest));

    let opts = execute_options(ctx, &session, &args.run);
    let summary = converge(&session, &manifest, &target, &opts)?;
    finish(&summary)
}

pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    ui::header("Destroying Recorded Resources");

    if args.run.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let session = Session::open(ctx)?;
    let target = target_of(args.target.target.as_deref())?;
    print_paths(ctx, &session, None);

    // An empty manifest plans every recorded resource for destruction
    let opts = execute_options(ctx, &session, &args.run);
    let summary = converge(&session, &Manifest::default(), &target, &opts)?;
    finish(&summary)
}

fn execute_options(ctx: &Context, session: &Session, run: &RunArgs) -> ExecuteOptions {
    let mut wait = session.config.poll.wait_config();
    if let Some(secs) = run.timeout {
        wait = wait.with_timeout(Duration::from_secs(secs));
    }

    ExecuteOptions {
        dry_run: run.dry_run,
        jobs: run.jobs.unwrap_or(session.config.jobs),
        yes: run.yes,
        fail_fast: run.fail_fast,
        show_progress: !ctx.quiet,
        wait,
        plan_options: session.plan_options(),
    }
}

/// Plan, apply and record the outcome of every targeted resource
fn converge(
    session: &Session,
    manifest: &Manifest,
    target: &Target,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    let mut state = session.load_state()?;
    let resources = build_resources(manifest, &state, &session.clients, target)?;

    if resources.is_empty() {
        println!();
        ui::info("No resources match");
        return Ok(ExecuteSummary::default());
    }

    let report = execute(&resources, opts)?;

    if !report.outcomes.is_empty() {
        merge_outcomes(&mut state, &report.outcomes);
        state
            .touch(&session.state_path)
            .context("Failed to record applied state")?;
    }

    Ok(report.summary)
}

fn finish(summary: &ExecuteSummary) -> Result<()> {
    if !summary.is_success() {
        bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Refresh
// ============================================================================

/// Result of re-reading recorded resources
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub checked: usize,
    pub removed: usize,
}

pub fn refresh(ctx: &Context, args: TargetArgs) -> Result<()> {
    ui::header("Refreshing State");

    let session = Session::open(ctx)?;
    let target = target_of(args.target.as_deref())?;
    print_paths(ctx, &session, None);

    let summary = refresh_state(&session, &target)?;

    println!();
    if summary.removed > 0 {
        ui::warn(&format!(
            "{} of {} recorded resource(s) no longer exist and were dropped from state",
            summary.removed, summary.checked
        ));
    } else {
        ui::success(&format!("{} recorded resource(s) up to date", summary.checked));
    }
    Ok(())
}

fn refresh_state(session: &Session, target: &Target) -> Result<RefreshSummary> {
    let mut state = session.load_state()?;
    let resources = build_resources(&Manifest::default(), &state, &session.clients, target)?;

    let mut summary = RefreshSummary::default();
    for resource in &resources {
        let address = resource.address();
        let change = resource
            .refresh()
            .with_context(|| format!("Failed to refresh {address}"))?;

        match &change {
            RecordChange::Remove => {
                summary.removed += 1;
                println!("  {} {} {}", "-".red(), address, "(gone)".dimmed());
            }
            _ => println!("  {} {}", "✓".green(), address),
        }
        summary.checked += 1;
        state.apply_change(resource.resource_type(), resource.name(), change);
    }

    state.touch(&session.state_path)?;
    Ok(summary)
}

fn print_paths(ctx: &Context, session: &Session, manifest: Option<&Path>) {
    if ctx.verbose == 0 {
        return;
    }
    if let Some(manifest) = manifest {
        ui::kv("Manifest", &manifest.display().to_string());
    }
    ui::kv("State", &session.state_path.display().to_string());
    ui::kv("Catalog", &session.catalog.path().display().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use crate::remote::{ArtifactSpec, ArtifactStatus, ArtifactType};
    use crate::schema::{ArtifactDecl, AssociationDecl};
    use crate::state::CatalinkState;
    use convergence::WaitConfig;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        session: Session,
        portfolio: String,
        product: String,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let session = testing::session(&dir, 0);
        let portfolio = session.catalog.add_portfolio("Engineering").unwrap();
        let product = session.catalog.add_product("Web Stack").unwrap();
        Fixture {
            portfolio: portfolio.id().to_string(),
            product: product.id().to_string(),
            session,
            _dir: dir,
        }
    }

    fn opts() -> ExecuteOptions {
        ExecuteOptions {
            yes: true,
            show_progress: false,
            wait: WaitConfig::new(Duration::from_millis(5), Duration::from_secs(2)),
            ..ExecuteOptions::default()
        }
    }

    fn manifest(fx: &Fixture) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.associations.insert(
            "web".into(),
            AssociationDecl {
                portfolio_id: fx.portfolio.clone(),
                product_id: fx.product.clone(),
                source_portfolio_id: None,
            },
        );
        manifest.artifacts.insert(
            "web-v1".into(),
            ArtifactDecl {
                product_id: fx.product.clone(),
                spec: ArtifactSpec {
                    name: "v1".into(),
                    description: "first".into(),
                    artifact_type: ArtifactType::CloudFormationTemplate,
                    template_url: "https://example.com/web.yaml".into(),
                    active: true,
                },
            },
        );
        manifest
    }

    fn state(fx: &Fixture) -> CatalinkState {
        fx.session.load_state().unwrap()
    }

    #[test]
    fn test_apply_records_then_converges() {
        let fx = fixture();
        let manifest = manifest(&fx);

        let summary = converge(&fx.session, &manifest, &Target::all(), &opts()).unwrap();
        assert_eq!(summary.created, 2);
        assert!(summary.is_success());

        let recorded = state(&fx);
        assert_eq!(recorded.associations["web"].product_id, fx.product);
        assert_eq!(recorded.artifacts["web-v1"].status, ArtifactStatus::Available);

        let catalog = fx.session.catalog.snapshot().unwrap();
        assert!(catalog.products[&fx.product].portfolios.contains(&fx.portfolio));

        // Second run has nothing to do
        let counts = plan_manifest(&fx.session, &manifest, &Target::all()).unwrap();
        assert_eq!(counts.total(), 0);
        let again = converge(&fx.session, &manifest, &Target::all(), &opts()).unwrap();
        assert_eq!(again.total_changes(), 0);
        assert_eq!(again.no_change, 2);
    }

    #[test]
    fn test_dry_run_leaves_state_untouched() {
        let fx = fixture();
        let opts = ExecuteOptions {
            dry_run: true,
            ..opts()
        };

        converge(&fx.session, &manifest(&fx), &Target::all(), &opts).unwrap();
        assert!(!fx.session.state_path.exists());
        assert!(fx.session.catalog.snapshot().unwrap().artifacts.is_empty());
    }

    #[test]
    fn test_target_limits_apply() {
        let fx = fixture();
        let target = crate::engine::parse_target("association").unwrap();

        let summary = converge(&fx.session, &manifest(&fx), &target, &opts()).unwrap();
        assert_eq!(summary.created, 1);
        assert!(state(&fx).artifacts.is_empty());
    }

    #[test]
    fn test_failed_artifact_is_reported_and_recorded() {
        let fx = fixture();
        let mut manifest = manifest(&fx);
        if let Some(decl) = manifest.artifacts.get_mut("web-v1") {
            decl.spec.template_url = "http://insecure.example.com/web.yaml".into();
        }

        let summary = converge(&fx.session, &manifest, &Target::all(), &opts()).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert!(finish(&summary).is_err());

        let recorded = state(&fx);
        assert_eq!(recorded.artifacts["web-v1"].status, ArtifactStatus::Failed);
    }

    #[test]
    fn test_destroy_removes_everything() {
        let fx = fixture();
        converge(&fx.session, &manifest(&fx), &Target::all(), &opts()).unwrap();

        let summary = converge(&fx.session, &Manifest::default(), &Target::all(), &opts()).unwrap();
        assert_eq!(summary.removed, 2);
        assert!(state(&fx).is_empty());

        let catalog = fx.session.catalog.snapshot().unwrap();
        assert!(catalog.artifacts.is_empty());
        assert!(catalog.products[&fx.product].portfolios.is_empty());
    }

    #[test]
    fn test_refresh_drops_resources_removed_out_of_band() {
        let fx = fixture();
        converge(&fx.session, &manifest(&fx), &Target::all(), &opts()).unwrap();

        let artifact = &state(&fx).artifacts["web-v1"];
        crate::remote::ArtifactClient::delete_artifact(
            fx.session.clients.artifacts.as_ref(),
            &artifact.handle(),
        )
        .unwrap();

        let summary = refresh_state(&fx.session, &Target::all()).unwrap();
        assert_eq!(
            summary,
            RefreshSummary {
                checked: 2,
                removed: 1,
            }
        );
        let recorded = state(&fx);
        assert!(recorded.artifacts.is_empty());
        assert!(recorded.associations.contains_key("web"));

        // The next apply recreates it
        let again = converge(&fx.session, &manifest(&fx), &Target::all(), &opts()).unwrap();
        assert_eq!(again.created, 1);
    }
}
