//! Review queue CLI commands: list, show, approve, decline, stats,
//! challenges.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use acctlink_types::submission::{ReviewAction, ReviewStatus, Submission};

use crate::state::AppState;

/// Review queue subcommands.
#[derive(Subcommand)]
pub enum ReviewCommand {
    /// List submissions, pending first.
    #[command(alias = "ls")]
    List {
        /// Only show submissions with this status (pending, approved, declined).
        #[arg(long)]
        status: Option<ReviewStatus>,
    },

    /// Show one submission with its linked accounts.
    Show {
        /// Connection id.
        id: String,
    },

    /// Approve a pending submission.
    Approve {
        /// Connection id.
        id: String,

        /// Note recorded with the decision.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Decline a pending submission.
    Decline {
        /// Connection id.
        id: String,

        /// Note recorded with the decision.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Pending / approved / declined counts.
    Stats,

    /// Challenge codes issued and not yet collected.
    Challenges,
}

/// Handle a review subcommand.
pub async fn handle_review_command(cmd: ReviewCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ReviewCommand::List { status } => list_submissions(state, status, json).await,
        ReviewCommand::Show { id } => show_submission(state, &id, json).await,
        ReviewCommand::Approve { id, notes } => {
            decide(state, &id, ReviewAction::Approve, notes, json).await
        }
        ReviewCommand::Decline { id, notes } => {
            decide(state, &id, ReviewAction::Decline, notes, json).await
        }
        ReviewCommand::Stats => stats(state, json).await,
        ReviewCommand::Challenges => challenges(state, json).await,
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid connection id: '{raw}'"))
}

fn status_cell(status: ReviewStatus) -> Cell {
    match status {
        ReviewStatus::Pending => Cell::new("pending").fg(Color::Yellow),
        ReviewStatus::Approved => Cell::new("approved").fg(Color::Green),
        ReviewStatus::Declined => Cell::new("declined").fg(Color::DarkGrey),
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

async fn list_submissions(
    state: &AppState,
    status: Option<ReviewStatus>,
    json: bool,
) -> Result<()> {
    let submissions: Vec<Submission> = state
        .review
        .list_submissions()
        .await?
        .into_iter()
        .filter(|s| status.is_none_or(|wanted| s.review_status == wanted))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&submissions)?);
        return Ok(());
    }

    if submissions.is_empty() {
        println!();
        println!("  {} No submissions.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Connection").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Username").fg(Color::White),
        Cell::new("Code").fg(Color::White),
        Cell::new("Accounts").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Connected").fg(Color::White),
    ]);

    for submission in &submissions {
        table.add_row(vec![
            Cell::new(submission.id).fg(Color::Cyan),
            Cell::new(&submission.provider_name),
            Cell::new(&submission.username),
            Cell::new(submission.challenge_code.as_deref().unwrap_or("-")),
            Cell::new(submission.accounts.len()),
            status_cell(submission.review_status),
            Cell::new(submission.connected_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

async fn show_submission(state: &AppState, id: &str, json: bool) -> Result<()> {
    let submission = state.review.get(&parse_id(id)?).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&submission.provider_name).bold(),
        style(submission.id).dim()
    );
    println!();
    println!("  Owner:       {}", submission.owner_id);
    println!("  Username:    {}", submission.username);
    println!(
        "  Code:        {} (issued {})",
        submission.challenge_code.as_deref().unwrap_or("-"),
        submission.issued_code.as_deref().unwrap_or("-")
    );
    println!("  Connected:   {}", submission.connected_at.to_rfc3339());
    println!("  Status:      {}", style(submission.review_status).bold());
    if let Some(reviewed_at) = submission.reviewed_at {
        println!(
            "  Reviewed:    {} by {}",
            reviewed_at.to_rfc3339(),
            submission.reviewed_by.as_deref().unwrap_or("-")
        );
    }
    if let Some(notes) = &submission.review_notes {
        println!("  Notes:       {notes}");
    }
    println!();

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Account").fg(Color::White),
        Cell::new("Number").fg(Color::White),
        Cell::new("Balance").fg(Color::White),
    ]);
    for account in &submission.accounts {
        table.add_row(vec![
            Cell::new(&account.account_type),
            Cell::new(&account.masked_number),
            Cell::new(&account.balance),
        ]);
    }
    println!("{table}");
    println!();

    Ok(())
}

async fn decide(
    state: &AppState,
    id: &str,
    action: ReviewAction,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let submission = state.review.decide(&parse_id(id)?, action, notes).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }

    let mark = match submission.review_status {
        ReviewStatus::Approved => style("✓").green().bold(),
        _ => style("✗").red().bold(),
    };
    println!(
        "  {} {} {} ({})",
        mark,
        style(submission.review_status).bold(),
        style(submission.id).cyan(),
        submission.provider_name
    );
    Ok(())
}

async fn stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.review.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("  Pending:  {}", style(stats.pending).yellow());
    println!("  Approved: {}", style(stats.approved).green());
    println!("  Declined: {}", style(stats.declined).dim());
    println!("  Total:    {}", style(stats.total()).bold());
    println!();
    Ok(())
}

async fn challenges(state: &AppState, json: bool) -> Result<()> {
    let records = state.review.issued_challenges().await?;

    if json {
        let view: Vec<_> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "tokenPrefix": r.token.prefix(),
                    "code": r.code,
                    "destination": r.destination,
                    "issuedAt": r.issued_at,
                    "expiresAt": r.expires_at,
                    "attempts": r.attempts,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!("  {} No challenges outstanding.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Code").fg(Color::White),
        Cell::new("Destination").fg(Color::White),
        Cell::new("Expires").fg(Color::White),
        Cell::new("Attempts").fg(Color::White),
    ]);
    for record in &records {
        table.add_row(vec![
            Cell::new(format!("{}…", record.token.prefix())).fg(Color::DarkGrey),
            Cell::new(&record.code).fg(Color::Cyan),
            Cell::new(&record.destination),
            Cell::new(record.expires_at.format("%H:%M:%S")),
            Cell::new(record.attempts),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}
