//! Plan computation and display

use anyhow::Result;
use association::{Operation, PlanOptions};
use colored::{ColoredString, Colorize};

use crate::resource::{Resource, ResourceDiff};
use crate::state::ResourceType;

/// Plan every resource, including the ones that need no change
pub fn compute_diffs(
    resources: &[Box<dyn Resource>],
    options: &PlanOptions,
) -> Result<Vec<ResourceDiff>> {
    resources.iter().map(|r| r.plan(options)).collect()
}

/// Count of planned changes per operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanCounts {
    pub create: usize,
    pub replace: usize,
    pub update: usize,
    pub destroy: usize,
}

impl PlanCounts {
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut counts = Self::default();
        for diff in diffs {
            match diff.operation {
                Operation::Create => counts.create += 1,
                Operation::Replace => counts.replace += 1,
                Operation::InPlaceUpdate => counts.update += 1,
                Operation::Destroy => counts.destroy += 1,
                Operation::NoOp => {}
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.create + self.replace + self.update + self.destroy
    }
}

fn colored_symbol(operation: Operation) -> ColoredString {
    let symbol = operation.symbol();
    match operation {
        Operation::Create => symbol.green(),
        Operation::Destroy => symbol.red(),
        Operation::Replace => symbol.magenta(),
        Operation::InPlaceUpdate => symbol.yellow(),
        Operation::NoOp => symbol.dimmed(),
    }
}

fn section_title(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Association => "Associations (product ↔ portfolio)",
        ResourceType::Artifact => "Provisioning artifacts",
    }
}

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    let changes: Vec<&ResourceDiff> = diffs
        .iter()
        .filter(|d| d.operation.is_change() || d.note.is_some())
        .collect();

    if changes.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Catalog Plan".bold()
    );
    println!("│");

    for resource_type in ResourceType::ALL {
        let of_type: Vec<&&ResourceDiff> = changes
            .iter()
            .filter(|d| d.resource_type == resource_type)
            .collect();
        if of_type.is_empty() {
            continue;
        }
        println!("│ {}", section_title(resource_type).bold());

        for diff in of_type {
            let note = diff
                .note
                .as_ref()
                .map(|n| format!(" [{n}]").yellow().to_string())
                .unwrap_or_default();
            println!(
                "│   {} {:<32} {}{}",
                colored_symbol(diff.operation),
                diff.address,
                format!("({})", diff.operation).dimmed(),
                note
            );
            println!("│       {}", diff.description.dimmed());

            for change in &diff.changes {
                let forces = if change.forces_replace {
                    " # forces replacement".red().to_string()
                } else {
                    String::new()
                };
                println!(
                    "│       {}: {} → {}{}",
                    change.field,
                    change.from.as_deref().unwrap_or("(none)"),
                    change.to.as_deref().unwrap_or("(none)"),
                    forces
                );
            }
        }
        println!("│");
    }

    let counts = PlanCounts::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to replace, {} to update, {} to destroy",
        counts.create.to_string().green(),
        counts.replace.to_string().magenta(),
        counts.update.to_string().yellow(),
        counts.destroy.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(operation: Operation) -> ResourceDiff {
        ResourceDiff {
            address: "association.web".into(),
            resource_type: ResourceType::Association,
            description: String::new(),
            operation,
            changes: Vec::new(),
            note: None,
        }
    }

    #[test]
    fn test_plan_counts() {
        let diffs = [
            diff(Operation::Create),
            diff(Operation::Create),
            diff(Operation::Replace),
            diff(Operation::NoOp),
            diff(Operation::Destroy),
        ];
        let counts = PlanCounts::from_diffs(&diffs);
        assert_eq!(counts.create, 2);
        assert_eq!(counts.replace, 1);
        assert_eq!(counts.update, 0);
        assert_eq!(counts.destroy, 1);
        assert_eq!(counts.total(), 4);
    }
}
