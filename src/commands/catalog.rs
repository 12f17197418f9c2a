//! `catalink catalog` - manage the local catalog backend

use anyhow::Result;
use colored::Colorize;

use super::Session;
use crate::Context;
use crate::cli::CatalogCommand;
use crate::remote::ArtifactStatus;
use crate::ui;

pub fn run(ctx: &Context, cmd: CatalogCommand) -> Result<()> {
    let session = Session::open(ctx)?;

    match cmd {
        CatalogCommand::AddPortfolio { name } => {
            let portfolio = session.catalog.add_portfolio(&name)?;
            ui::success(&format!("Created portfolio {name}"));
            ui::kv("id", portfolio.id());
            Ok(())
        }
        CatalogCommand::AddProduct { name } => {
            let product = session.catalog.add_product(&name)?;
            ui::success(&format!("Created product {name}"));
            ui::kv("id", product.id());
            Ok(())
        }
        CatalogCommand::Show => show(&session),
    }
}

fn show(session: &Session) -> Result<()> {
    let data = session.catalog.snapshot()?;

    ui::header("Local Catalog");
    ui::kv("File", &session.catalog.path().display().to_string());

    ui::section(&format!("Portfolios ({})", data.portfolios.len()));
    for (id, portfolio) in &data.portfolios {
        println!("  {} {:<20} {}", "•".cyan(), id, portfolio.name);
    }

    ui::section(&format!("Products ({})", data.products.len()));
    for (id, product) in &data.products {
        println!("  {} {:<20} {}", "•".cyan(), id, product.name);
        for portfolio in &product.portfolios {
            println!("      {} {}", "↔".dimmed(), portfolio);
        }
    }

    ui::section(&format!("Provisioning artifacts ({})", data.artifacts.len()));
    for (id, entry) in &data.artifacts {
        let status = match entry.status {
            ArtifactStatus::Available => entry.status.to_string().green(),
            ArtifactStatus::Creating => entry.status.to_string().yellow(),
            ArtifactStatus::Failed => entry.status.to_string().red(),
        };
        println!(
            "  {} {:<20} {} {} {}",
            "•".cyan(),
            id,
            entry.detail.name,
            format!("[{}]", entry.detail.product_id).dimmed(),
            status
        );
    }

    Ok(())
}
