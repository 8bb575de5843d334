use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use tokio::sync::broadcast;
use wager_core::{Bet, BetDraft, BetEngine, BetStatus, Result, SqliteBetStore};

#[derive(Subcommand)]
pub enum BetCommands {
    /// Create a new bet invitation
    Create {
        /// Short title for the bet
        title: String,
        /// Counterparty email
        #[arg(short, long)]
        participant: String,
        /// What the bet is about
        #[arg(long, default_value = "")]
        description: String,
        /// How the outcome is decided
        #[arg(long, default_value = "")]
        conditions: String,
        /// Stake amount (display only, never settled here)
        #[arg(short, long, default_value = "0")]
        amount: String,
        /// Stake currency
        #[arg(short, long, default_value = "USD")]
        currency: String,
        /// Optional neutral tie-breaker email
        #[arg(short, long)]
        middleman: Option<String>,
    },
    /// Show a bet in full
    Show {
        /// Bet id
        id: String,
    },
    /// List all bets you are involved in
    List,
    /// Follow live updates of a bet until it settles
    Watch {
        /// Bet id
        id: String,
    },
    /// Cancel a pending bet you created
    Cancel {
        /// Bet id
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_bet_command(
    cmd: BetCommands,
    engine: &BetEngine<SqliteBetStore>,
) -> Result<()> {
    match cmd {
        BetCommands::Create {
            title,
            participant,
            description,
            conditions,
            amount,
            currency,
            middleman,
        } => {
            let bet = engine
                .create_bet(BetDraft {
                    title,
                    description,
                    conditions,
                    amount,
                    currency,
                    participant,
                    middleman_email: middleman,
                })
                .await?;

            println!("Bet created!");
            println!("  ID: {}", bet.id);
            println!("  Participant: {} (invited)", bet.participant);
            if let Some(middleman) = &bet.middleman_email {
                println!("  Middleman: {} (invited)", middleman);
            }
            println!();
            println!("Share the id so the other parties can respond.");
        }

        BetCommands::Show { id } => {
            let bet = engine.get(&id).await?;
            let designation = engine.my_designation(&id).await?;
            print_bet(&bet);
            println!("  Your designation: {}", designation);
        }

        BetCommands::List => {
            let bets = engine.list_bets().await?;
            if bets.is_empty() {
                println!("No bets yet. Create one with 'wager bet create'.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "ID", "Title", "Creator", "Participant", "Status", "Result",
            ]);
            for bet in &bets {
                table.add_row(vec![
                    bet.id.clone(),
                    bet.title.clone(),
                    bet.created_by.clone(),
                    bet.participant.clone(),
                    bet.status.to_string(),
                    bet.result.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }

        BetCommands::Watch { id } => {
            let mut updates = engine.subscribe(&id).await?;
            let bet = engine.get(&id).await?;
            println!("Watching bet '{}' ({})", bet.title, bet.status);

            if is_settled(&bet) {
                print_bet(&bet);
                return Ok(());
            }

            while let Some(bet) = next_update(&mut updates).await {
                println!(
                    "  update: status={} participant={} middleman={} votes={}",
                    bet.status,
                    bet.participant_status,
                    bet.middleman_status,
                    bet.voted_users.len(),
                );
                if is_settled(&bet) {
                    println!();
                    print_bet(&bet);
                    break;
                }
            }
        }

        BetCommands::Cancel { id, force } => {
            let bet = engine.get(&id).await?;
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Cancel bet '{}'?", bet.title))
                    .default(false)
                    .interact()
                    .map_err(|e| wager_core::BetError::internal(e.to_string()))?;
                if !confirmed {
                    println!("Cancel aborted.");
                    return Ok(());
                }
            }

            engine.cancel(&id).await?;
            println!("Bet '{}' cancelled.", bet.title);
        }
    }

    Ok(())
}

fn is_settled(bet: &Bet) -> bool {
    matches!(bet.status, BetStatus::Completed | BetStatus::Rejected)
}

/// Next delivery from the watch channel. Each update carries the full
/// current document, so on overflow the missed deliveries can be skipped
/// and the watch resumes from the latest retained one. `None` once the
/// channel closes.
async fn next_update(updates: &mut broadcast::Receiver<Bet>) -> Option<Bet> {
    loop {
        match updates.recv().await {
            Ok(bet) => return Some(bet),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                println!("  (missed {} updates, resuming from the latest)", missed);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

pub(crate) fn print_bet(bet: &Bet) {
    println!("Bet {}", bet.id);
    println!("  Title: {}", bet.title);
    if !bet.description.is_empty() {
        println!("  Description: {}", bet.description);
    }
    if !bet.conditions.is_empty() {
        println!("  Conditions: {}", bet.conditions);
    }
    println!("  Stake: {} {}", bet.amount, bet.currency);
    println!("  Created by: {}", bet.created_by);
    println!(
        "  Participant: {} ({})",
        bet.participant, bet.participant_status
    );
    if let Some(middleman) = &bet.middleman_email {
        println!("  Middleman: {} ({})", middleman, bet.middleman_status);
    }
    println!("  Status: {}", bet.status);
    match &bet.result {
        Some(result) => println!("  Result: {}", result),
        None => println!("  Result: pending"),
    }
    println!("  Created: {}", bet.timestamp.format("%Y-%m-%d %H:%M UTC"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wager_core::ResponseStatus;

    fn sample_bet(title: &str) -> Bet {
        Bet {
            id: "b1".to_string(),
            title: title.to_string(),
            description: String::new(),
            conditions: String::new(),
            amount: "5".to_string(),
            currency: "USD".to_string(),
            created_by: "alice@example.com".to_string(),
            participant: "bob@example.com".to_string(),
            middleman_email: None,
            status: BetStatus::Pending,
            participant_status: ResponseStatus::Pending,
            middleman_status: ResponseStatus::Pending,
            participant_result: None,
            creator_result: None,
            middleman_result: None,
            result: None,
            voted_users: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_watch_resumes_after_lagged_updates() {
        let (sender, mut updates) = broadcast::channel(1);
        for title in ["one", "two", "three"] {
            sender.send(sample_bet(title)).unwrap();
        }

        // The receiver overflowed: the lag is reported, then delivery
        // resumes from the newest retained document instead of ending
        let bet = next_update(&mut updates).await.unwrap();
        assert_eq!(bet.title, "three");

        drop(sender);
        assert!(next_update(&mut updates).await.is_none());
    }
}
