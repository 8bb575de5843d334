pub mod resolver;

use crate::error::{BetError, Result};
use crate::identity::IdentityProvider;
use crate::store::BetStore;
use crate::types::{Bet, BetDraft, BetStatus, ResponseStatus, Role};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;

use resolver::{can_vote, derive_status, designation, try_resolve};

/// The bet lifecycle state machine over an injected store.
///
/// Every operation validates against a fresh snapshot, then commits exactly
/// one guarded store write. When the guard fails after validation passed,
/// another party won the race and the caller gets an `InvalidTransition`;
/// nothing is ever overwritten blindly.
pub struct BetEngine<S: BetStore> {
    store: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
}

impl<S: BetStore> BetEngine<S> {
    pub fn new(store: Arc<S>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn require_identity(&self) -> Result<String> {
        self.identity
            .current_identity()
            .ok_or(BetError::NotAuthenticated)
    }

    /// Create a new bet invitation from the acting identity. The bet starts
    /// pending with all invitation responses pending.
    pub async fn create_bet(&self, draft: BetDraft) -> Result<Bet> {
        let creator = self.require_identity()?;

        let mut bet = Bet {
            id: String::new(),
            title: draft.title,
            description: draft.description,
            conditions: draft.conditions,
            amount: draft.amount,
            currency: draft.currency,
            created_by: creator,
            participant: draft.participant,
            middleman_email: draft.middleman_email,
            status: BetStatus::Pending,
            participant_status: ResponseStatus::Pending,
            middleman_status: ResponseStatus::Pending,
            participant_result: None,
            creator_result: None,
            middleman_result: None,
            result: None,
            voted_users: Vec::new(),
            timestamp: Utc::now(),
        };

        bet.id = self.store.create(&bet).await?;

        tracing::info!("Created bet '{}' with ID: {}", bet.title, bet.id);
        Ok(bet)
    }

    /// Answer the invitation as the acting identity's role (participant or
    /// middleman). Legal only while the bet and the role's own response are
    /// both still pending. Afterwards the overall status is recomputed and
    /// committed if it moved.
    pub async fn respond(&self, id: &str, response: ResponseStatus) -> Result<Bet> {
        if response == ResponseStatus::Pending {
            return Err(BetError::invalid_transition(
                "a response must accept or reject",
            ));
        }

        let who = self.require_identity()?;
        let bet = self.store.get(id).await?;

        let role = designation(&bet, &who);
        match role {
            Role::Participant | Role::Middleman => {}
            Role::Creator => {
                return Err(BetError::invalid_transition(
                    "the creator does not respond to their own invitation",
                ))
            }
            Role::Unknown => {
                return Err(BetError::invalid_transition(
                    "identity is not a party to this bet",
                ))
            }
        }

        if bet.status != BetStatus::Pending {
            return Err(BetError::invalid_transition(format!(
                "bet is already {}",
                bet.status
            )));
        }

        let own = match role {
            Role::Participant => bet.participant_status,
            _ => bet.middleman_status,
        };
        if own != ResponseStatus::Pending {
            return Err(BetError::invalid_transition(format!(
                "{} has already {}",
                role, own
            )));
        }

        if !self.store.set_response(id, role, response).await? {
            return Err(BetError::invalid_transition(
                "bet changed concurrently, response not recorded",
            ));
        }
        tracing::info!("Bet {}: {} {}", id, role, response);

        self.check_resolution(id).await
    }

    /// Creator cancel: force the bet to rejected while it is still pending,
    /// overriding outstanding responses.
    pub async fn cancel(&self, id: &str) -> Result<Bet> {
        let who = self.require_identity()?;
        let bet = self.store.get(id).await?;

        if designation(&bet, &who) != Role::Creator {
            return Err(BetError::invalid_transition(
                "only the creator may cancel a bet",
            ));
        }
        if bet.status != BetStatus::Pending {
            return Err(BetError::invalid_transition(format!(
                "bet is already {}",
                bet.status
            )));
        }

        if !self
            .store
            .set_status(id, BetStatus::Pending, BetStatus::Rejected)
            .await?
        {
            return Err(BetError::invalid_transition(
                "bet changed concurrently, not cancelled",
            ));
        }

        tracing::warn!("Bet {} cancelled by creator", id);
        self.store.get(id).await
    }

    /// Cast the acting identity's vote for a proposed result. Legal only
    /// while the bet is accepted, the role has not voted, and (for the
    /// middleman) the primary votes are in and disagree. On success the
    /// resolution check runs against the fresh document.
    pub async fn cast_vote(&self, id: &str, proposed: &str) -> Result<Bet> {
        let who = self.require_identity()?;
        let bet = self.store.get(id).await?;

        let role = designation(&bet, &who);
        if role == Role::Unknown {
            return Err(BetError::invalid_transition(
                "identity is not a party to this bet",
            ));
        }

        if bet.status != BetStatus::Accepted {
            return Err(BetError::invalid_transition(format!(
                "votes are only accepted on an accepted bet (status: {})",
                bet.status
            )));
        }
        if bet.role_result(role).is_some() {
            return Err(BetError::invalid_transition(format!(
                "{} has already voted",
                role
            )));
        }
        if !can_vote(&bet, role) {
            // Only reachable for the middleman: primary votes missing or in
            // agreement, so there is no tie to break.
            return Err(BetError::invalid_transition(
                "middleman may only vote once participant and creator disagree",
            ));
        }

        if !self.store.set_role_result(id, role, proposed).await? {
            return Err(BetError::invalid_transition(
                "bet changed concurrently, vote not recorded",
            ));
        }
        self.store.add_voted_user(id, &who).await?;

        tracing::info!("Bet {}: {} voted '{}'", id, role, proposed);
        self.check_resolution(id).await
    }

    /// Bring the document up to date with whatever writes have committed,
    /// then record the final result if one is due. This is the convergence
    /// point for every multi-step sequence: a recorded vote is re-appended
    /// to `votedUsers` if the append was interrupted, invitation responses
    /// get the derived status they imply, and resolution commits at most
    /// once. All writes are guarded, so re-running this on any snapshot
    /// (stale, partial, already completed) is a no-op once converged.
    pub async fn check_resolution(&self, id: &str) -> Result<Bet> {
        let bet = self.store.get(id).await?;

        // A vote and its votedUsers append are separate store writes; an
        // interrupted sequence leaves a recorded result with no voter entry.
        let voters = [
            (
                bet.participant_result.is_some(),
                Some(bet.participant.as_str()),
            ),
            (bet.creator_result.is_some(), Some(bet.created_by.as_str())),
            (
                bet.middleman_result.is_some(),
                bet.middleman_email.as_deref(),
            ),
        ];
        for (recorded, identity) in voters {
            if let Some(identity) = identity {
                if recorded && !bet.has_voted(identity) {
                    self.store.add_voted_user(id, identity).await?;
                }
            }
        }

        if bet.status == BetStatus::Completed {
            return self.store.get(id).await;
        }

        // Responses may have committed without the status they imply; the
        // CAS makes concurrent re-runs converge on the same outcome.
        let derived = derive_status(&bet);
        if derived != bet.status && self.store.set_status(id, bet.status, derived).await? {
            tracing::info!("Bet {} is now {}", id, derived);
        }

        let bet = self.store.get(id).await?;
        if bet.status != BetStatus::Completed {
            if let Some(final_result) = try_resolve(&bet) {
                if self.store.complete(id, &final_result).await? {
                    tracing::info!("Bet {} completed with result: {}", id, final_result);
                }
            }
        }

        self.store.get(id).await
    }

    pub async fn get(&self, id: &str) -> Result<Bet> {
        self.store.get(id).await
    }

    /// Bets involving the acting identity in any role, newest first.
    pub async fn list_bets(&self) -> Result<Vec<Bet>> {
        let who = self.require_identity()?;
        self.store.list_for(&who).await
    }

    /// The acting identity's role on a bet.
    pub async fn my_designation(&self, id: &str) -> Result<Role> {
        let who = self.require_identity()?;
        let bet = self.store.get(id).await?;
        Ok(designation(&bet, &who))
    }

    /// Live updates for a bet document.
    pub async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<Bet>> {
        self.store.subscribe(id).await
    }
}
