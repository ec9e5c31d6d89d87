//! Provider catalog listing.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use crate::state::AppState;

/// List active providers in catalog order.
pub async fn list_providers(state: &AppState, json: bool) -> Result<()> {
    let providers = state.workflow.providers().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&providers)?);
        return Ok(());
    }

    if providers.is_empty() {
        println!();
        println!("  {} No providers available.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Challenge").fg(Color::White),
        Cell::new("Security Answer").fg(Color::White),
    ]);

    for provider in &providers {
        table.add_row(vec![
            Cell::new(&provider.id).fg(Color::Cyan),
            Cell::new(&provider.display_name),
            yes_no(provider.requires_challenge),
            yes_no(provider.requires_security_answer),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} provider{}",
        style(providers.len()).bold(),
        if providers.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

fn yes_no(flag: bool) -> Cell {
    if flag {
        Cell::new("required").fg(Color::Yellow)
    } else {
        Cell::new("-").fg(Color::DarkGrey)
    }
}
