//! Authorization Engine
//!
//! Decides whether a caller may apply a change set to a session. The rules
//! are one explicit table over caller role, relation to the target and the
//! kind of role change requested; board-wide preconditions (membership, the
//! last moderator) are layered on top in a fixed order.

use crate::errors::DenialReason;
use crate::store::UpdateGuard;
use crate::types::{BoardSession, SessionRole, SessionUpdate};

/// Whether the caller is editing their own session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Own,
    Other,
}

/// Effect of the requested `role` on the target's current role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleChange {
    /// Absent, or equal to the role already held
    None,
    Promote,
    Demote,
}

impl RoleChange {
    pub fn of(current: SessionRole, requested: Option<SessionRole>) -> Self {
        match (current, requested) {
            (SessionRole::Participant, Some(SessionRole::Moderator)) => RoleChange::Promote,
            (SessionRole::Moderator, Some(SessionRole::Participant)) => RoleChange::Demote,
            _ => RoleChange::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenialReason),
}

/// The authorization matrix.
///
/// Every combination is listed so that adding a role or change kind fails to
/// compile until the table is extended.
pub fn decide(caller_role: SessionRole, relation: Relation, change: RoleChange) -> Decision {
    use DenialReason::*;
    use Relation::*;
    use RoleChange as R;
    use SessionRole::*;

    match (caller_role, relation, change) {
        (Moderator, Own, R::None) => Decision::Allow,
        (Moderator, Own, R::Promote) => Decision::Deny(SelfRoleChange),
        (Moderator, Own, R::Demote) => Decision::Deny(SelfRoleChange),
        (Moderator, Other, R::None) => Decision::Allow,
        (Moderator, Other, R::Promote) => Decision::Allow,
        (Moderator, Other, R::Demote) => Decision::Allow,
        (Participant, Own, R::None) => Decision::Allow,
        (Participant, Own, R::Promote) => Decision::Deny(SelfRoleChange),
        (Participant, Own, R::Demote) => Decision::Deny(SelfRoleChange),
        (Participant, Other, R::None) => Decision::Deny(InsufficientRole),
        (Participant, Other, R::Promote) => Decision::Deny(InsufficientRole),
        (Participant, Other, R::Demote) => Decision::Deny(InsufficientRole),
    }
}

/// Authorize a single-session update.
///
/// `moderators` is the number of moderators on the board as last read. The
/// store re-checks the same conditions when the write commits; the guard
/// returned here carries the caller-side precondition.
pub fn authorize_update(
    caller: Option<&BoardSession>,
    target: &BoardSession,
    changes: &SessionUpdate,
    moderators: usize,
) -> Result<UpdateGuard, DenialReason> {
    let caller = caller.ok_or(DenialReason::NotAMember)?;

    let relation = if caller.user == target.user {
        Relation::Own
    } else {
        Relation::Other
    };
    let change = RoleChange::of(target.role, changes.role);

    match decide(caller.role, relation, change) {
        Decision::Deny(DenialReason::InsufficientRole) => {
            return Err(DenialReason::InsufficientRole)
        }
        _ if change == RoleChange::Demote && moderators <= 1 => {
            return Err(DenialReason::LastModerator)
        }
        Decision::Deny(reason) => return Err(reason),
        Decision::Allow => {}
    }

    Ok(match relation {
        Relation::Own => UpdateGuard::none(),
        Relation::Other => UpdateGuard::moderator(caller.user),
    })
}

/// Authorize a change applied to every session of a board
pub fn authorize_bulk(
    caller: Option<&BoardSession>,
    changes: &SessionUpdate,
) -> Result<(), DenialReason> {
    if caller.is_none() {
        return Err(DenialReason::NotAMember);
    }
    if changes.touches_role() {
        return Err(DenialReason::BulkRoleChangeForbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(board: Uuid, role: SessionRole) -> BoardSession {
        BoardSession::new(board, Uuid::new_v4(), role)
    }

    #[test]
    fn test_flag_edits_on_own_session_are_allowed() {
        let board = Uuid::new_v4();
        let participant = session(board, SessionRole::Participant);
        let changes = SessionUpdate::new()
            .ready(true)
            .connected(false)
            .show_hidden_columns(true)
            .raised_hand(true)
            .voting_completed(true);

        let guard = authorize_update(Some(&participant), &participant, &changes, 1).unwrap();
        assert_eq!(guard, UpdateGuard::none());
    }

    #[test]
    fn test_self_promotion_is_denied() {
        let board = Uuid::new_v4();
        let participant = session(board, SessionRole::Participant);
        let changes = SessionUpdate::new().role(SessionRole::Moderator);

        assert_eq!(
            authorize_update(Some(&participant), &participant, &changes, 1),
            Err(DenialReason::SelfRoleChange)
        );
    }

    #[test]
    fn test_restating_held_role_is_not_a_change() {
        let board = Uuid::new_v4();
        let moderator = session(board, SessionRole::Moderator);
        let changes = SessionUpdate::new().role(SessionRole::Moderator).ready(true);

        assert!(authorize_update(Some(&moderator), &moderator, &changes, 1).is_ok());
    }

    #[test]
    fn test_self_demotion_with_other_moderators() {
        let board = Uuid::new_v4();
        let moderator = session(board, SessionRole::Moderator);
        let changes = SessionUpdate::new().role(SessionRole::Participant);

        assert_eq!(
            authorize_update(Some(&moderator), &moderator, &changes, 2),
            Err(DenialReason::SelfRoleChange)
        );
    }

    #[test]
    fn test_last_moderator_takes_precedence_over_self_role_change() {
        let board = Uuid::new_v4();
        let moderator = session(board, SessionRole::Moderator);
        let changes = SessionUpdate::new().role(SessionRole::Participant);

        assert_eq!(
            authorize_update(Some(&moderator), &moderator, &changes, 1),
            Err(DenialReason::LastModerator)
        );
    }

    #[test]
    fn test_participant_cannot_touch_others() {
        let board = Uuid::new_v4();
        let participant = session(board, SessionRole::Participant);
        let moderator = session(board, SessionRole::Moderator);

        assert_eq!(
            authorize_update(
                Some(&participant),
                &moderator,
                &SessionUpdate::new().role(SessionRole::Participant),
                1
            ),
            Err(DenialReason::InsufficientRole)
        );
        assert_eq!(
            authorize_update(Some(&participant), &moderator, &SessionUpdate::new().ready(true), 1),
            Err(DenialReason::InsufficientRole)
        );
    }

    #[test]
    fn test_moderator_edits_others_under_guard() {
        let board = Uuid::new_v4();
        let moderator = session(board, SessionRole::Moderator);
        let participant = session(board, SessionRole::Participant);

        let guard = authorize_update(
            Some(&moderator),
            &participant,
            &SessionUpdate::new().role(SessionRole::Moderator).ready(false),
            1,
        )
        .unwrap();
        assert_eq!(guard, UpdateGuard::moderator(moderator.user));
    }

    #[test]
    fn test_moderator_demotes_another_moderator() {
        let board = Uuid::new_v4();
        let first = session(board, SessionRole::Moderator);
        let second = session(board, SessionRole::Moderator);
        let demote = SessionUpdate::new().role(SessionRole::Participant);

        assert!(authorize_update(Some(&first), &second, &demote, 2).is_ok());
        // stale count from a concurrent demotion
        assert_eq!(
            authorize_update(Some(&first), &second, &demote, 1),
            Err(DenialReason::LastModerator)
        );
    }

    #[test]
    fn test_non_member_is_denied_first() {
        let board = Uuid::new_v4();
        let target = session(board, SessionRole::Moderator);

        assert_eq!(
            authorize_update(None, &target, &SessionUpdate::new().role(SessionRole::Participant), 1),
            Err(DenialReason::NotAMember)
        );
        assert_eq!(
            authorize_bulk(None, &SessionUpdate::new().role(SessionRole::Moderator)),
            Err(DenialReason::NotAMember)
        );
    }

    #[test]
    fn test_bulk_rules() {
        let board = Uuid::new_v4();
        let participant = session(board, SessionRole::Participant);
        let moderator = session(board, SessionRole::Moderator);

        assert_eq!(
            authorize_bulk(Some(&participant), &SessionUpdate::new().ready(false)),
            Ok(())
        );
        assert_eq!(
            authorize_bulk(Some(&moderator), &SessionUpdate::new().role(SessionRole::Moderator)),
            Err(DenialReason::BulkRoleChangeForbidden)
        );
    }

    #[test]
    fn test_decision_table_is_exhaustive() {
        let roles = [SessionRole::Moderator, SessionRole::Participant];
        let relations = [Relation::Own, Relation::Other];
        let changes = [RoleChange::None, RoleChange::Promote, RoleChange::Demote];

        let mut allowed = 0;
        for role in roles {
            for relation in relations {
                for change in changes {
                    if decide(role, relation, change) == Decision::Allow {
                        allowed += 1;
                    }
                }
            }
        }
        // own flag edits for both roles plus every moderator-on-other edit
        assert_eq!(allowed, 5);
    }
}
