pub mod memory;
pub mod sqlite;

pub use memory::MemoryBetStore;
pub use sqlite::SqliteBetStore;

use crate::error::Result;
use crate::types::{Bet, BetStatus, ResponseStatus, Role};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Repository interface over the bet document store.
///
/// Every mutating primitive is a guarded conditional write: the guard is
/// evaluated atomically against the stored document and the method returns
/// `false` when it did not hold (the document moved under the caller). The
/// engine maps a failed guard after its own validation to an
/// `InvalidTransition` rather than clobbering concurrent state. Writes to
/// disjoint fields never touch each other.
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Persist a new bet and return the store-assigned id. The id on the
    /// passed document is ignored.
    async fn create(&self, bet: &Bet) -> Result<String>;

    async fn get(&self, id: &str) -> Result<Bet>;

    /// All bets where the identity is creator, participant or middleman,
    /// newest first. Backs the list views.
    async fn list_for(&self, identity: &str) -> Result<Vec<Bet>>;

    /// Record a party's answer to the invitation. Guard: bet status and the
    /// role's own status are both still pending. Only participant and
    /// middleman have a response field.
    async fn set_response(&self, id: &str, role: Role, response: ResponseStatus) -> Result<bool>;

    /// Compare-and-set on the overall status.
    async fn set_status(&self, id: &str, from: BetStatus, to: BetStatus) -> Result<bool>;

    /// Write-once vote field for a role. Guard: the field is still absent
    /// and the bet is accepted.
    async fn set_role_result(&self, id: &str, role: Role, value: &str) -> Result<bool>;

    /// Set-union append to `votedUsers`. Idempotent.
    async fn add_voted_user(&self, id: &str, identity: &str) -> Result<()>;

    /// Record the final result and move to completed, in one write.
    /// Guard: the bet is still accepted, so re-running resolution on a
    /// stale snapshot cannot complete twice.
    async fn complete(&self, id: &str, result: &str) -> Result<bool>;

    /// Live update channel: the full current document is delivered after
    /// every committed write. Dropping the receiver tears the subscription
    /// down; in-flight writes are unaffected.
    async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<Bet>>;
}
