//! Execution engine - parallel apply with catalink's UI integration

use anyhow::{Context as AnyhowContext, Result};
use association::PlanOptions;
use colored::Colorize;
use convergence::{CancelToken, WaitConfig};
use indicatif::MultiProgress;
use rayon::prelude::*;
use std::io::IsTerminal;

use crate::progress;
use crate::resource::{ApplyContext, ApplyResult, Applied, Resource};
use crate::state::{CatalinkState, RecordChange, ResourceType};

use super::differ::{PlanCounts, compute_diffs, display_diff};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Stop in-flight waits after the first failure
    pub fail_fast: bool,
    /// Draw progress bars and spinners
    pub show_progress: bool,
    pub wait: WaitConfig,
    pub plan_options: PlanOptions,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            fail_fast: false,
            show_progress: true,
            wait: WaitConfig::default(),
            plan_options: PlanOptions::default(),
        }
    }
}

/// What happened to one resource
#[derive(Debug, Clone)]
pub struct Outcome {
    pub resource_type: ResourceType,
    pub name: String,
    pub address: String,
    pub result: ApplyResult,
    pub record: RecordChange,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub replaced: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match &outcome.result {
                ApplyResult::NoChange => summary.no_change += 1,
                ApplyResult::Created => summary.created += 1,
                ApplyResult::Replaced => summary.replaced += 1,
                ApplyResult::Modified => summary.modified += 1,
                ApplyResult::Removed => summary.removed += 1,
                ApplyResult::Failed { .. } => summary.failed += 1,
                ApplyResult::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn total_changes(&self) -> usize {
        self.created + self.replaced + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Everything an apply run produced
#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub outcomes: Vec<Outcome>,
}

/// Plan, confirm and apply `resources`
///
/// Record changes are returned, not written: the caller merges them into the
/// state once every worker has finished.
pub fn execute(resources: &[Box<dyn Resource>], opts: &ExecuteOptions) -> Result<ExecuteReport> {
    // 1. Compute and display the plan
    let diffs = compute_diffs(resources, &opts.plan_options)?;
    display_diff(&diffs);
    let counts = PlanCounts::from_diffs(&diffs);

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteReport::default());
    }

    // 2. Confirm (unless --yes or nothing changes)
    if counts.total() > 0 && !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteReport {
            summary: ExecuteSummary {
                skipped: counts.total(),
                ..Default::default()
            },
            outcomes: Vec::new(),
        });
    }

    // 3. Apply in parallel
    if counts.total() > 0 {
        println!();
        println!(
            "  {} Applying {} change(s) across {} resource(s)...",
            "→".cyan(),
            counts.total(),
            resources.len()
        );
    }
    let outcomes = execute_parallel(resources, opts)?;
    let summary = ExecuteSummary::from_outcomes(&outcomes);

    // 4. Summary
    print_summary(&summary, &outcomes);

    Ok(ExecuteReport { summary, outcomes })
}

/// Execute resources on a bounded worker pool
pub fn execute_parallel(resources: &[Box<dyn Resource>], opts: &ExecuteOptions) -> Result<Vec<Outcome>> {
    let multi = opts.show_progress.then(MultiProgress::new);
    let pb = match &multi {
        Some(multi) => multi.add(progress::bar(resources.len() as u64, "Applying")),
        None => progress::hidden(),
    };

    let ctx = ApplyContext {
        dry_run: false,
        plan_options: opts.plan_options,
        wait: opts.wait,
        cancel: CancelToken::new(),
        progress: multi,
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    let outcomes = pool.install(|| {
        resources
            .par_iter()
            .map(|resource| {
                let outcome = apply_one(resource.as_ref(), &ctx, opts.fail_fast);
                if outcome.result.is_failure() {
                    pb.println(format!("  {} {}", "✗".red(), outcome.address));
                }
                pb.set_message(format!("{} {}", outcome.result.symbol(), outcome.address));
                pb.inc(1);
                outcome
            })
            .collect::<Vec<_>>()
    });

    progress::finish_clear(&pb);
    Ok(outcomes)
}

fn apply_one(resource: &dyn Resource, ctx: &ApplyContext, fail_fast: bool) -> Outcome {
    let address = resource.address();

    let applied = if ctx.cancel.is_cancelled() {
        Applied::skipped("cancelled after an earlier failure")
    } else {
        match resource.apply(ctx) {
            Ok(applied) => applied,
            Err(e) => Applied {
                result: ApplyResult::Failed {
                    error: format!("{e:#}"),
                },
                record: RecordChange::Keep,
            },
        }
    };

    if let ApplyResult::Failed { error } = &applied.result {
        log::warn!("{address} failed: {error}");
        if fail_fast {
            log::debug!("Fail-fast: cancelling remaining work");
            ctx.cancel.cancel();
        }
    }

    Outcome {
        resource_type: resource.resource_type(),
        name: resource.name().to_string(),
        address,
        result: applied.result,
        record: applied.record,
    }
}

/// Fold worker outcomes into the state
pub fn merge_outcomes(state: &mut CatalinkState, outcomes: &[Outcome]) {
    for outcome in outcomes {
        state.apply_change(outcome.resource_type, &outcome.name, outcome.record.clone());
    }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    if !std::io::stdin().is_terminal() {
        println!(
            "  {} Not running interactively; pass --yes to apply",
            "⚠".yellow()
        );
        return Ok(false);
    }

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary, outcomes: &[Outcome]) {
    println!();
    if summary.is_success() {
        println!("  {} Catalog configuration applied!", "✓".green().bold());
    } else {
        println!(
            "  {} Catalog configuration applied with errors",
            "⚠".yellow().bold()
        );
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
        for outcome in outcomes {
            if let ApplyResult::Failed { error } = &outcome.result {
                println!("      {} {}: {}", "✗".red(), outcome.address, error);
            }
        }
    }
}
