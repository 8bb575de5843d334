use crate::error::{BetError, Result};
use crate::store::BetStore;
use crate::types::{Bet, BetStatus, ResponseStatus, Role};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// In-memory bet store with the same guard semantics as the SQLite store.
/// Used to test the engine without I/O and to embed the SDK without a
/// database file. Guards run under the map's write lock, so check-then-write
/// is atomic here too.
#[derive(Default)]
pub struct MemoryBetStore {
    bets: RwLock<HashMap<String, Bet>>,
    watchers: RwLock<HashMap<String, broadcast::Sender<Bet>>>,
}

impl MemoryBetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, bet: &Bet) {
        if let Some(sender) = self.watchers.read().get(&bet.id) {
            let _ = sender.send(bet.clone());
        }
    }

    /// Apply a guarded mutation: `f` returns whether the guard held and it
    /// mutated the bet. Publishes the new document if so.
    fn update_where<F>(&self, id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Bet) -> bool,
    {
        let updated = {
            let mut bets = self.bets.write();
            let bet = bets.get_mut(id).ok_or_else(|| BetError::not_found(id))?;
            if f(bet) {
                Some(bet.clone())
            } else {
                None
            }
        };

        match updated {
            Some(bet) => {
                self.publish(&bet);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BetStore for MemoryBetStore {
    async fn create(&self, bet: &Bet) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut stored = bet.clone();
        stored.id = id.clone();
        self.bets.write().insert(id.clone(), stored);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Bet> {
        self.bets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BetError::not_found(id))
    }

    async fn list_for(&self, identity: &str) -> Result<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .bets
            .read()
            .values()
            .filter(|b| {
                b.participant == identity
                    || b.created_by == identity
                    || b.middleman_email.as_deref() == Some(identity)
            })
            .cloned()
            .collect();
        bets.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(bets)
    }

    async fn set_response(&self, id: &str, role: Role, response: ResponseStatus) -> Result<bool> {
        if !matches!(role, Role::Participant | Role::Middleman) {
            return Err(BetError::internal(format!(
                "role {} has no response field",
                role
            )));
        }
        self.update_where(id, |bet| {
            let own = match role {
                Role::Participant => &mut bet.participant_status,
                _ => &mut bet.middleman_status,
            };
            if bet.status == BetStatus::Pending && *own == ResponseStatus::Pending {
                *own = response;
                true
            } else {
                false
            }
        })
    }

    async fn set_status(&self, id: &str, from: BetStatus, to: BetStatus) -> Result<bool> {
        self.update_where(id, |bet| {
            if bet.status == from {
                bet.status = to;
                true
            } else {
                false
            }
        })
    }

    async fn set_role_result(&self, id: &str, role: Role, value: &str) -> Result<bool> {
        if role == Role::Unknown {
            return Err(BetError::internal("role Unknown has no result field"));
        }
        self.update_where(id, |bet| {
            let field = match role {
                Role::Participant => &mut bet.participant_result,
                Role::Creator => &mut bet.creator_result,
                _ => &mut bet.middleman_result,
            };
            if bet.status == BetStatus::Accepted && field.is_none() {
                *field = Some(value.to_string());
                true
            } else {
                false
            }
        })
    }

    async fn add_voted_user(&self, id: &str, identity: &str) -> Result<()> {
        self.update_where(id, |bet| {
            if bet.voted_users.iter().any(|u| u == identity) {
                false
            } else {
                bet.voted_users.push(identity.to_string());
                true
            }
        })?;
        Ok(())
    }

    async fn complete(&self, id: &str, result: &str) -> Result<bool> {
        self.update_where(id, |bet| {
            if bet.status == BetStatus::Accepted {
                bet.status = BetStatus::Completed;
                bet.result = Some(result.to_string());
                true
            } else {
                false
            }
        })
    }

    async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<Bet>> {
        if !self.bets.read().contains_key(id) {
            return Err(BetError::not_found(id));
        }

        let mut watchers = self.watchers.write();
        let sender = watchers
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(16).0);
        Ok(sender.subscribe())
    }
}
