use clap::Subcommand;
use dialoguer::Confirm;
use wager_core::{can_vote, Bet, BetEngine, BetStatus, Result, Role, SqliteBetStore};

#[derive(Subcommand)]
pub enum VoteCommands {
    /// Cast your vote for the outcome
    Cast {
        /// Bet id
        id: String,
        /// Proposed result, e.g. "bob@example.com won" or "tied"
        result: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the voting state of a bet
    Status {
        /// Bet id
        id: String,
    },
}

pub async fn handle_vote_command(
    cmd: VoteCommands,
    engine: &BetEngine<SqliteBetStore>,
) -> Result<()> {
    match cmd {
        VoteCommands::Cast { id, result, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Set your result to '{}'?", result))
                    .default(false)
                    .interact()
                    .map_err(|e| wager_core::BetError::internal(e.to_string()))?;
                if !confirmed {
                    println!("Vote aborted.");
                    return Ok(());
                }
            }

            let bet = engine.cast_vote(&id, &result).await?;

            println!("Result selected successfully!");
            match bet.status {
                BetStatus::Completed => println!(
                    "Bet completed with result: {}",
                    bet.result.as_deref().unwrap_or("-")
                ),
                _ if awaiting_middleman(&bet) => {
                    println!("Votes differ. Waiting for the middleman to break the tie.")
                }
                _ => println!("Waiting for the other parties to vote."),
            }
        }

        VoteCommands::Status { id } => {
            let bet = engine.get(&id).await?;
            let designation = engine.my_designation(&id).await?;

            println!("Bet '{}' ({})", bet.title, bet.status);
            print_role_vote("Participant", bet.participant_result.as_deref());
            print_role_vote("Creator", bet.creator_result.as_deref());
            if bet.has_middleman() {
                print_role_vote("Middleman", bet.middleman_result.as_deref());
            }
            match &bet.result {
                Some(result) => println!("  Final result: {}", result),
                None if awaiting_middleman(&bet) => {
                    println!("  Waiting for the middleman to break the tie.")
                }
                None => println!("  Final result: pending"),
            }

            if bet.status == BetStatus::Accepted {
                if can_vote(&bet, designation) {
                    println!("  You may vote: 'wager vote cast {} <result>'", bet.id);
                } else if designation == Role::Middleman {
                    println!("  You vote only if participant and creator disagree.");
                }
            }
        }
    }

    Ok(())
}

fn awaiting_middleman(bet: &Bet) -> bool {
    matches!(
        (&bet.participant_result, &bet.creator_result),
        (Some(p), Some(c)) if p != c
    ) && bet.has_middleman()
        && bet.middleman_result.is_none()
}

fn print_role_vote(role: &str, vote: Option<&str>) {
    match vote {
        Some(v) => println!("  {} voted: {}", role, v),
        None => println!("  {}: has not voted", role),
    }
}
