use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BetError;

/// Overall lifecycle state of a bet.
///
/// `Pending -> {Accepted, Rejected}`, `Accepted -> Completed`. `Rejected`
/// and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// A single party's answer to the bet invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A party's relationship to a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Participant,
    Middleman,
    Unknown,
}

/// The bet document. Field names serialize in camelCase — that layout is
/// the wire contract other collaborators (list views, stores) rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub title: String,
    pub description: String,
    pub conditions: String,
    pub amount: String,
    pub currency: String,
    pub created_by: String,
    pub participant: String,
    pub middleman_email: Option<String>,
    pub status: BetStatus,
    pub participant_status: ResponseStatus,
    pub middleman_status: ResponseStatus,
    pub participant_result: Option<String>,
    pub creator_result: Option<String>,
    pub middleman_result: Option<String>,
    pub result: Option<String>,
    pub voted_users: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Bet {
    pub fn has_middleman(&self) -> bool {
        self.middleman_email.is_some()
    }

    /// The proposed result recorded for a role, if that role has voted.
    pub fn role_result(&self, role: Role) -> Option<&str> {
        match role {
            Role::Participant => self.participant_result.as_deref(),
            Role::Creator => self.creator_result.as_deref(),
            Role::Middleman => self.middleman_result.as_deref(),
            Role::Unknown => None,
        }
    }

    pub fn has_voted(&self, identity: &str) -> bool {
        self.voted_users.iter().any(|u| u == identity)
    }
}

/// Creation input supplied by the creator. The store assigns the id and
/// the engine stamps identity, statuses and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetDraft {
    pub title: String,
    pub description: String,
    pub conditions: String,
    pub amount: String,
    pub currency: String,
    pub participant: String,
    pub middleman_email: Option<String>,
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BetStatus::Pending => "pending",
            BetStatus::Accepted => "accepted",
            BetStatus::Rejected => "rejected",
            BetStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BetStatus {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BetStatus::Pending),
            "accepted" => Ok(BetStatus::Accepted),
            "rejected" => Ok(BetStatus::Rejected),
            "completed" => Ok(BetStatus::Completed),
            other => Err(BetError::internal(format!("unknown bet status: {other}"))),
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ResponseStatus {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResponseStatus::Pending),
            "accepted" => Ok(ResponseStatus::Accepted),
            "rejected" => Ok(ResponseStatus::Rejected),
            other => Err(BetError::internal(format!(
                "unknown response status: {other}"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Creator => "Creator",
            Role::Participant => "Participant",
            Role::Middleman => "Middleman",
            Role::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}
