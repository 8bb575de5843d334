use crate::error::{BetError, Result};
use crate::store::BetStore;
use crate::types::{Bet, BetStatus, ResponseStatus, Role};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use uuid::Uuid;

const BET_COLUMNS: &str = "id, title, description, conditions, amount, currency, \
     created_by, participant, middleman_email, status, participant_status, \
     middleman_status, participant_result, creator_result, middleman_result, \
     result, voted_users, timestamp";

/// SQLite-backed bet store. One row per bet; enums stored as TEXT,
/// `votedUsers` as a JSON array column. All guards are expressed as
/// conditional `UPDATE .. WHERE` so check-then-write happens atomically
/// inside the database.
pub struct SqliteBetStore {
    conn: Mutex<Connection>,
    watchers: RwLock<HashMap<String, broadcast::Sender<Bet>>>,
}

impl SqliteBetStore {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BetError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            watchers: RwLock::new(HashMap::new()),
        };

        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                conditions TEXT NOT NULL,
                amount TEXT NOT NULL,
                currency TEXT NOT NULL,
                created_by TEXT NOT NULL,
                participant TEXT NOT NULL,
                middleman_email TEXT,
                status TEXT NOT NULL,
                participant_status TEXT NOT NULL,
                middleman_status TEXT NOT NULL,
                participant_result TEXT,
                creator_result TEXT,
                middleman_result TEXT,
                result TEXT,
                voted_users TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        // List views filter by each role field
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_participant ON bets(participant)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_created_by ON bets(created_by)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_middleman ON bets(middleman_email)",
            [],
        )?;

        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Bet> {
        let conn = self.conn.lock().await;

        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM bets WHERE id = ?1", BET_COLUMNS))?;

        let bet = stmt
            .query_row(params![id], row_to_bet)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => BetError::not_found(id),
                other => BetError::Storage(other),
            })?;

        Ok(bet)
    }

    /// Push the current document to any live subscribers.
    async fn publish(&self, id: &str) {
        let sender = self.watchers.read().get(id).cloned();
        if let Some(sender) = sender {
            if let Ok(bet) = self.load(id).await {
                let _ = sender.send(bet);
            }
        }
    }
}

#[async_trait]
impl BetStore for SqliteBetStore {
    async fn create(&self, bet: &Bet) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let voted_users = serde_json::to_string(&bet.voted_users)?;

        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                "INSERT INTO bets ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                BET_COLUMNS
            ),
            params![
                id,
                bet.title,
                bet.description,
                bet.conditions,
                bet.amount,
                bet.currency,
                bet.created_by,
                bet.participant,
                bet.middleman_email,
                bet.status.to_string(),
                bet.participant_status.to_string(),
                bet.middleman_status.to_string(),
                bet.participant_result,
                bet.creator_result,
                bet.middleman_result,
                bet.result,
                voted_users,
                bet.timestamp.timestamp(),
            ],
        )?;

        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Bet> {
        self.load(id).await
    }

    async fn list_for(&self, identity: &str) -> Result<Vec<Bet>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bets
             WHERE participant = ?1 OR created_by = ?1 OR middleman_email = ?1
             ORDER BY timestamp DESC",
            BET_COLUMNS
        ))?;

        let bet_iter = stmt.query_map(params![identity], row_to_bet)?;

        let mut bets = Vec::new();
        for bet in bet_iter {
            bets.push(bet?);
        }

        Ok(bets)
    }

    async fn set_response(&self, id: &str, role: Role, response: ResponseStatus) -> Result<bool> {
        let column = response_column(role)?;

        let changed = {
            let conn = self.conn.lock().await;
            conn.execute(
                &format!(
                    "UPDATE bets SET {col} = ?2
                     WHERE id = ?1 AND status = 'pending' AND {col} = 'pending'",
                    col = column
                ),
                params![id, response.to_string()],
            )?
        };

        if changed > 0 {
            self.publish(id).await;
        }
        Ok(changed > 0)
    }

    async fn set_status(&self, id: &str, from: BetStatus, to: BetStatus) -> Result<bool> {
        let changed = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE bets SET status = ?3 WHERE id = ?1 AND status = ?2",
                params![id, from.to_string(), to.to_string()],
            )?
        };

        if changed > 0 {
            self.publish(id).await;
        }
        Ok(changed > 0)
    }

    async fn set_role_result(&self, id: &str, role: Role, value: &str) -> Result<bool> {
        let column = result_column(role)?;

        let changed = {
            let conn = self.conn.lock().await;
            conn.execute(
                &format!(
                    "UPDATE bets SET {col} = ?2
                     WHERE id = ?1 AND {col} IS NULL AND status = 'accepted'",
                    col = column
                ),
                params![id, value],
            )?
        };

        if changed > 0 {
            self.publish(id).await;
        }
        Ok(changed > 0)
    }

    async fn add_voted_user(&self, id: &str, identity: &str) -> Result<()> {
        let appended = {
            let conn = self.conn.lock().await;

            let voted_json: String = conn
                .query_row(
                    "SELECT voted_users FROM bets WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => BetError::not_found(id),
                    other => BetError::Storage(other),
                })?;

            let mut voted: Vec<String> = serde_json::from_str(&voted_json)?;
            if voted.iter().any(|u| u == identity) {
                false
            } else {
                voted.push(identity.to_string());
                conn.execute(
                    "UPDATE bets SET voted_users = ?2 WHERE id = ?1",
                    params![id, serde_json::to_string(&voted)?],
                )?;
                true
            }
        };

        if appended {
            self.publish(id).await;
        }
        Ok(())
    }

    async fn complete(&self, id: &str, result: &str) -> Result<bool> {
        let changed = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE bets SET result = ?2, status = 'completed'
                 WHERE id = ?1 AND status = 'accepted'",
                params![id, result],
            )?
        };

        if changed > 0 {
            self.publish(id).await;
        }
        Ok(changed > 0)
    }

    async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<Bet>> {
        // Fail fast on unknown ids
        self.load(id).await?;

        let mut watchers = self.watchers.write();
        let sender = watchers
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(16).0);
        Ok(sender.subscribe())
    }
}

fn response_column(role: Role) -> Result<&'static str> {
    match role {
        Role::Participant => Ok("participant_status"),
        Role::Middleman => Ok("middleman_status"),
        Role::Creator | Role::Unknown => Err(BetError::internal(format!(
            "role {} has no response field",
            role
        ))),
    }
}

fn result_column(role: Role) -> Result<&'static str> {
    match role {
        Role::Participant => Ok("participant_result"),
        Role::Creator => Ok("creator_result"),
        Role::Middleman => Ok("middleman_result"),
        Role::Unknown => Err(BetError::internal("role Unknown has no result field")),
    }
}

fn row_to_bet(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bet> {
    let status: String = row.get(9)?;
    let participant_status: String = row.get(10)?;
    let middleman_status: String = row.get(11)?;
    let voted_json: String = row.get(16)?;

    Ok(Bet {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        conditions: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        created_by: row.get(6)?,
        participant: row.get(7)?,
        middleman_email: row.get(8)?,
        status: parse_column(9, &status)?,
        participant_status: parse_column(10, &participant_status)?,
        middleman_status: parse_column(11, &middleman_status)?,
        participant_result: row.get(12)?,
        creator_result: row.get(13)?,
        middleman_result: row.get(14)?,
        result: row.get(15)?,
        voted_users: serde_json::from_str(&voted_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(16, rusqlite::types::Type::Text, Box::new(e))
        })?,
        timestamp: chrono::DateTime::from_timestamp(row.get(17)?, 0).unwrap_or_else(Utc::now),
    })
}

fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = BetError>,
{
    raw.parse().map_err(|e: BetError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BetDraft;
    use tempfile::tempdir;

    fn sample_bet() -> Bet {
        let draft = BetDraft {
            title: "Derby".to_string(),
            description: "City derby outcome".to_string(),
            conditions: "Full time score decides".to_string(),
            amount: "20".to_string(),
            currency: "EUR".to_string(),
            participant: "bob@example.com".to_string(),
            middleman_email: Some("mia@example.com".to_string()),
        };
        Bet {
            id: String::new(),
            title: draft.title,
            description: draft.description,
            conditions: draft.conditions,
            amount: draft.amount,
            currency: draft.currency,
            created_by: "alice@example.com".to_string(),
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
        }
    }

    async fn open_store() -> (tempfile::TempDir, SqliteBetStore) {
        let dir = tempdir().unwrap();
        let store = SqliteBetStore::new(&dir.path().join("wager.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (_dir, store) = open_store().await;
        let id = store.create(&sample_bet()).await.unwrap();

        let bet = store.get(&id).await.unwrap();
        assert_eq!(bet.id, id);
        assert_eq!(bet.title, "Derby");
        assert_eq!(bet.status, BetStatus::Pending);
        assert_eq!(bet.middleman_email.as_deref(), Some("mia@example.com"));
        assert!(bet.voted_users.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let (_dir, store) = open_store().await;
        match store.get("missing").await {
            Err(BetError::BetNotFound { id }) => assert_eq!(id, "missing"),
            other => panic!("expected BetNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guarded_writes_fall_through_once_spent() {
        let (_dir, store) = open_store().await;
        let id = store.create(&sample_bet()).await.unwrap();

        assert!(store
            .set_response(&id, Role::Participant, ResponseStatus::Accepted)
            .await
            .unwrap());
        // Same guard again: participant_status is no longer pending
        assert!(!store
            .set_response(&id, Role::Participant, ResponseStatus::Rejected)
            .await
            .unwrap());

        assert!(store
            .set_response(&id, Role::Middleman, ResponseStatus::Accepted)
            .await
            .unwrap());
        assert!(store
            .set_status(&id, BetStatus::Pending, BetStatus::Accepted)
            .await
            .unwrap());
        assert!(!store
            .set_status(&id, BetStatus::Pending, BetStatus::Rejected)
            .await
            .unwrap());

        assert!(store
            .set_role_result(&id, Role::Creator, "alice won")
            .await
            .unwrap());
        assert!(!store
            .set_role_result(&id, Role::Creator, "bob won")
            .await
            .unwrap());

        let bet = store.get(&id).await.unwrap();
        assert_eq!(bet.creator_result.as_deref(), Some("alice won"));
    }

    #[tokio::test]
    async fn test_complete_only_from_accepted() {
        let (_dir, store) = open_store().await;
        let id = store.create(&sample_bet()).await.unwrap();

        // Still pending: guard refuses
        assert!(!store.complete(&id, "alice won").await.unwrap());

        store
            .set_status(&id, BetStatus::Pending, BetStatus::Accepted)
            .await
            .unwrap();
        assert!(store.complete(&id, "alice won").await.unwrap());
        // Second completion is a no-op
        assert!(!store.complete(&id, "bob won").await.unwrap());

        let bet = store.get(&id).await.unwrap();
        assert_eq!(bet.status, BetStatus::Completed);
        assert_eq!(bet.result.as_deref(), Some("alice won"));
    }

    #[tokio::test]
    async fn test_voted_users_dedup() {
        let (_dir, store) = open_store().await;
        let id = store.create(&sample_bet()).await.unwrap();

        store.add_voted_user(&id, "bob@example.com").await.unwrap();
        store.add_voted_user(&id, "bob@example.com").await.unwrap();
        store
            .add_voted_user(&id, "alice@example.com")
            .await
            .unwrap();

        let bet = store.get(&id).await.unwrap();
        assert_eq!(bet.voted_users, vec!["bob@example.com", "alice@example.com"]);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_updates() {
        let (_dir, store) = open_store().await;
        let id = store.create(&sample_bet()).await.unwrap();

        let mut updates = store.subscribe(&id).await.unwrap();
        store
            .set_response(&id, Role::Participant, ResponseStatus::Accepted)
            .await
            .unwrap();

        let bet = updates.recv().await.unwrap();
        assert_eq!(bet.participant_status, ResponseStatus::Accepted);
    }

    #[tokio::test]
    async fn test_list_for_each_role() {
        let (_dir, store) = open_store().await;
        store.create(&sample_bet()).await.unwrap();

        for identity in ["alice@example.com", "bob@example.com", "mia@example.com"] {
            let bets = store.list_for(identity).await.unwrap();
            assert_eq!(bets.len(), 1, "no bet listed for {}", identity);
        }
        assert!(store.list_for("nobody@example.com").await.unwrap().is_empty());
    }
}
