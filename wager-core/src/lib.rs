//! Wager SDK - bet lifecycle and resolution engine
//!
//! This library records informal wagers between two parties, tracks the
//! invitation handshake (participant plus an optional neutral middleman),
//! and settles the outcome by voting, with the middleman breaking ties.
//! Persistence sits behind the [`BetStore`] trait so the engine runs the
//! same against SQLite or the in-memory store.

pub mod engine;
pub mod error;
pub mod identity;
pub mod store;
pub mod types;

pub use engine::resolver::{can_vote, derive_status, designation, try_resolve, TIED_RESULT};
pub use engine::BetEngine;
pub use error::{BetError, Result};
pub use identity::{FixedIdentity, IdentityProvider, NoIdentity};
pub use store::{BetStore, MemoryBetStore, SqliteBetStore};
pub use types::{Bet, BetDraft, BetStatus, ResponseStatus, Role};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_engine_over_sqlite() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(
            SqliteBetStore::new(&temp_dir.path().join("wager.db"))
                .await
                .unwrap(),
        );

        let creator = BetEngine::new(
            store.clone(),
            Arc::new(FixedIdentity::new("alice@example.com")),
        );
        let participant = BetEngine::new(
            store.clone(),
            Arc::new(FixedIdentity::new("bob@example.com")),
        );

        let bet = creator
            .create_bet(BetDraft {
                title: "First snow".to_string(),
                description: "Snow before December".to_string(),
                conditions: "Official weather report".to_string(),
                amount: "10".to_string(),
                currency: "USD".to_string(),
                participant: "bob@example.com".to_string(),
                middleman_email: None,
            })
            .await
            .unwrap();

        participant
            .respond(&bet.id, ResponseStatus::Accepted)
            .await
            .unwrap();
        participant.cast_vote(&bet.id, "bob won").await.unwrap();
        let settled = creator.cast_vote(&bet.id, "bob won").await.unwrap();

        assert_eq!(settled.status, BetStatus::Completed);
        assert_eq!(settled.result.as_deref(), Some("bob won"));
    }
}
