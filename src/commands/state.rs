//! `catalink state` - inspect recorded resources

use anyhow::Result;
use colored::Colorize;

use super::{Session, target_of};
use crate::Context;
use crate::cli::StateCommand;
use crate::engine::Target;
use crate::state::{CatalinkState, ResourceType};
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::Show(args) => show(ctx, args.target.as_deref()),
    }
}

fn show(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let target = target_of(target)?;
    let state = session.load_state()?;

    ui::header("Catalink State");
    ui::kv("File", &session.state_path.display().to_string());
    ui::kv(
        "Last updated",
        &state.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    let rows = rows(&state, &target);
    if rows.is_empty() {
        println!();
        ui::dim("No recorded resources");
        return Ok(());
    }

    for resource_type in ResourceType::ALL {
        let of_type: Vec<&Row> = rows.iter().filter(|r| r.0 == resource_type).collect();
        if of_type.is_empty() {
            continue;
        }
        ui::section(&format!("{resource_type} ({})", of_type.len()));
        for (_, name, summary) in of_type {
            println!("  {} {:<24} {}", "•".cyan(), name, summary.dimmed());
        }
    }
    Ok(())
}

type Row = (ResourceType, String, String);

fn rows(state: &CatalinkState, target: &Target) -> Vec<Row> {
    ResourceType::ALL
        .into_iter()
        .flat_map(|resource_type| {
            state
                .names(resource_type)
                .into_iter()
                .filter(move |name| target.matches(resource_type, name))
                .filter_map(move |name| {
                    let record = state.get(resource_type, &name)?;
                    Some((resource_type, name, record.summary()))
                })
        })
        .collect()
}
