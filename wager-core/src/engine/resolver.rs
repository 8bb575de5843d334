//! Pure decision logic over a bet snapshot. No I/O here: every function is
//! safe to re-run on stale snapshots, which is what makes the engine's
//! resolution check re-entrant across live updates.

use crate::types::{Bet, BetStatus, ResponseStatus, Role};

/// Final result recorded when the primary votes disagree and no middleman
/// exists to break the tie.
pub const TIED_RESULT: &str = "tied";

/// Resolve an identity's role against a bet. First match wins, checked in
/// the fixed order creator, participant, middleman, so degenerate documents
/// where one identity holds several fields resolve deterministically.
pub fn designation(bet: &Bet, identity: &str) -> Role {
    if bet.created_by == identity {
        Role::Creator
    } else if bet.participant == identity {
        Role::Participant
    } else if bet.middleman_email.as_deref() == Some(identity) {
        Role::Middleman
    } else {
        Role::Unknown
    }
}

/// Recompute the overall status from the invitation responses. The
/// middleman's answer is required only when a middleman is configured.
/// Idempotent: feeding the same snapshot twice yields the same status.
pub fn derive_status(bet: &Bet) -> BetStatus {
    if bet.status != BetStatus::Pending {
        return bet.status;
    }

    let mut responses = vec![bet.participant_status];
    if bet.has_middleman() {
        responses.push(bet.middleman_status);
    }

    if responses.contains(&ResponseStatus::Rejected) {
        BetStatus::Rejected
    } else if responses.iter().all(|r| *r == ResponseStatus::Accepted) {
        BetStatus::Accepted
    } else {
        BetStatus::Pending
    }
}

/// Whether a role may cast a vote right now. Participant and creator may
/// vote any time the bet is accepted and they have not voted yet. The
/// middleman only gets a vote once both primary votes are in and disagree.
pub fn can_vote(bet: &Bet, role: Role) -> bool {
    if bet.status != BetStatus::Accepted {
        return false;
    }

    match role {
        Role::Participant | Role::Creator => bet.role_result(role).is_none(),
        Role::Middleman => match (&bet.participant_result, &bet.creator_result) {
            (Some(p), Some(c)) => p != c && bet.middleman_result.is_none(),
            _ => false,
        },
        Role::Unknown => false,
    }
}

/// Decide the final outcome, if one is due.
///
/// Returns `None` while votes are outstanding, including the legitimate
/// wait state where the primary votes disagree and a configured middleman
/// has not voted yet. A disagreement with no middleman resolves to the
/// [`TIED_RESULT`] sentinel rather than waiting forever.
pub fn try_resolve(bet: &Bet) -> Option<String> {
    let participant = bet.participant_result.as_deref()?;
    let creator = bet.creator_result.as_deref()?;

    if participant == creator {
        return Some(participant.to_string());
    }

    if bet.has_middleman() {
        bet.middleman_result.clone()
    } else {
        Some(TIED_RESULT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bet(middleman: bool) -> Bet {
        Bet {
            id: "b1".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            conditions: "c".to_string(),
            amount: "5".to_string(),
            currency: "USD".to_string(),
            created_by: "alice@example.com".to_string(),
            participant: "bob@example.com".to_string(),
            middleman_email: middleman.then(|| "mia@example.com".to_string()),
            status: BetStatus::Accepted,
            participant_status: ResponseStatus::Accepted,
            middleman_status: ResponseStatus::Accepted,
            participant_result: None,
            creator_result: None,
            middleman_result: None,
            result: None,
            voted_users: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_designation_order() {
        let b = bet(true);
        assert_eq!(designation(&b, "alice@example.com"), Role::Creator);
        assert_eq!(designation(&b, "bob@example.com"), Role::Participant);
        assert_eq!(designation(&b, "mia@example.com"), Role::Middleman);
        assert_eq!(designation(&b, "eve@example.com"), Role::Unknown);
    }

    #[test]
    fn test_designation_first_match_wins_on_degenerate_input() {
        let mut b = bet(true);
        b.participant = "alice@example.com".to_string();
        b.middleman_email = Some("alice@example.com".to_string());
        assert_eq!(designation(&b, "alice@example.com"), Role::Creator);
    }

    #[test]
    fn test_derive_status_requires_all_parties() {
        let mut b = bet(true);
        b.status = BetStatus::Pending;
        b.participant_status = ResponseStatus::Accepted;
        b.middleman_status = ResponseStatus::Pending;
        assert_eq!(derive_status(&b), BetStatus::Pending);

        b.middleman_status = ResponseStatus::Accepted;
        assert_eq!(derive_status(&b), BetStatus::Accepted);
        // Idempotent: same inputs, same answer
        assert_eq!(derive_status(&b), BetStatus::Accepted);
    }

    #[test]
    fn test_derive_status_any_rejection_rejects() {
        let mut b = bet(true);
        b.status = BetStatus::Pending;
        b.participant_status = ResponseStatus::Accepted;
        b.middleman_status = ResponseStatus::Rejected;
        assert_eq!(derive_status(&b), BetStatus::Rejected);
    }

    #[test]
    fn test_derive_status_without_middleman_ignores_middleman_field() {
        let mut b = bet(false);
        b.status = BetStatus::Pending;
        b.participant_status = ResponseStatus::Accepted;
        b.middleman_status = ResponseStatus::Pending;
        assert_eq!(derive_status(&b), BetStatus::Accepted);
    }

    #[test]
    fn test_derive_status_keeps_terminal_states() {
        let mut b = bet(true);
        b.status = BetStatus::Completed;
        assert_eq!(derive_status(&b), BetStatus::Completed);
    }

    #[test]
    fn test_primary_roles_vote_once() {
        let mut b = bet(true);
        assert!(can_vote(&b, Role::Participant));
        assert!(can_vote(&b, Role::Creator));

        b.creator_result = Some("alice won".to_string());
        assert!(!can_vote(&b, Role::Creator));
        assert!(can_vote(&b, Role::Participant));
    }

    #[test]
    fn test_no_votes_outside_accepted() {
        let mut b = bet(true);
        b.status = BetStatus::Pending;
        assert!(!can_vote(&b, Role::Participant));
        b.status = BetStatus::Completed;
        assert!(!can_vote(&b, Role::Creator));
    }

    #[test]
    fn test_middleman_votes_only_on_split_decision() {
        let mut b = bet(true);
        // Both absent
        assert!(!can_vote(&b, Role::Middleman));

        // Only one vote in
        b.participant_result = Some("bob won".to_string());
        assert!(!can_vote(&b, Role::Middleman));

        // Agreement: middleman stays out even though invited
        b.creator_result = Some("bob won".to_string());
        assert!(!can_vote(&b, Role::Middleman));

        // Disagreement: now the middleman is in
        b.creator_result = Some("alice won".to_string());
        assert!(can_vote(&b, Role::Middleman));

        // But only once
        b.middleman_result = Some("alice won".to_string());
        assert!(!can_vote(&b, Role::Middleman));
    }

    #[test]
    fn test_unknown_never_votes() {
        assert!(!can_vote(&bet(true), Role::Unknown));
    }

    #[test]
    fn test_resolve_agreement_skips_middleman() {
        for middleman in [true, false] {
            let mut b = bet(middleman);
            b.participant_result = Some("A won".to_string());
            b.creator_result = Some("A won".to_string());
            assert_eq!(try_resolve(&b).as_deref(), Some("A won"));
        }
    }

    #[test]
    fn test_resolve_waits_for_votes() {
        let mut b = bet(false);
        assert_eq!(try_resolve(&b), None);
        b.participant_result = Some("A won".to_string());
        assert_eq!(try_resolve(&b), None);
    }

    #[test]
    fn test_resolve_split_without_middleman_is_tied() {
        let mut b = bet(false);
        b.participant_result = Some("A won".to_string());
        b.creator_result = Some("B won".to_string());
        assert_eq!(try_resolve(&b).as_deref(), Some(TIED_RESULT));
    }

    #[test]
    fn test_resolve_split_awaits_middleman() {
        let mut b = bet(true);
        b.participant_result = Some("A won".to_string());
        b.creator_result = Some("B won".to_string());
        assert_eq!(try_resolve(&b), None);

        b.middleman_result = Some("A won".to_string());
        assert_eq!(try_resolve(&b).as_deref(), Some("A won"));
    }
}
