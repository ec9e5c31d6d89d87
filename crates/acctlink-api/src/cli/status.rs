//! System status dashboard command.

use anyhow::Result;
use console::style;

use acctlink_types::error::ReviewError;

use crate::state::AppState;

/// Display the status dashboard: backend in use, review counts, config.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let backend = state.storage.current_backend().await;
    let stats = match state.review.stats().await {
        Ok(stats) => Some(stats),
        Err(ReviewError::Unavailable) => None,
        Err(e) => return Err(e.into()),
    };
    let config = &state.config;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "backend": backend,
            "persistent_configured": state.storage.has_persistent(),
            "review": stats,
            "config": &**config,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} acctlink v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Storage ──").dim());
    match backend {
        Some(backend) => println!("  Backend:  {}", style(backend).green()),
        None => println!("  Backend:  {}", style("unavailable").red()),
    }
    println!(
        "  Fallback: {}",
        if config.allow_fallback {
            style("allowed").dim()
        } else {
            style("disabled").yellow()
        }
    );
    println!();

    println!("  {}", style("── Review ──").dim());
    match stats {
        Some(stats) => {
            println!("  Pending:  {}", style(stats.pending).yellow());
            println!("  Approved: {}", style(stats.approved).green());
            println!("  Declined: {}", style(stats.declined).dim());
        }
        None => println!(
            "  {}",
            style("Unavailable without the persistent store").dim()
        ),
    }
    println!();

    println!("  {}", style("── Sessions ──").dim());
    println!("  Session TTL:   {}s", config.session_ttl_secs);
    println!("  Challenge TTL: {}s", config.challenge_ttl_secs);
    println!(
        "  Verification:  {}",
        serde_json::to_value(config.challenge_verification)?
            .as_str()
            .unwrap_or("none")
    );
    println!();

    println!("  {}", style("── System ──").dim());
    println!(
        "  Data dir: {}",
        style(state.data_dir.display()).dim()
    );
    println!();

    Ok(())
}
