pub mod bet;
pub mod respond;
pub mod vote;

pub use bet::{handle_bet_command, BetCommands};
pub use respond::{handle_respond_command, RespondCommands};
pub use vote::{handle_vote_command, VoteCommands};
