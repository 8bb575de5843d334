use clap::Subcommand;
use wager_core::{BetEngine, BetStatus, ResponseStatus, Result, SqliteBetStore};

#[derive(Subcommand)]
pub enum RespondCommands {
    /// Accept a bet invitation
    Accept {
        /// Bet id
        id: String,
    },
    /// Reject a bet invitation
    Reject {
        /// Bet id
        id: String,
    },
}

pub async fn handle_respond_command(
    cmd: RespondCommands,
    engine: &BetEngine<SqliteBetStore>,
) -> Result<()> {
    let (id, response) = match cmd {
        RespondCommands::Accept { id } => (id, ResponseStatus::Accepted),
        RespondCommands::Reject { id } => (id, ResponseStatus::Rejected),
    };

    let bet = engine.respond(&id, response).await?;

    println!("You {} the bet '{}'.", response, bet.title);
    match bet.status {
        BetStatus::Accepted => println!("All parties are in. Voting is open."),
        BetStatus::Rejected => println!("The bet is off."),
        _ => println!("Waiting for the other parties to respond."),
    }

    Ok(())
}
