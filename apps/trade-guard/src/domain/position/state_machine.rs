//! Position State Machine
//!
//! Transition table for the position lifecycle. The aggregate consults it
//! before every state change.

use super::{PositionError, PositionState};

/// Validates position lifecycle transitions.
pub struct PositionStateMachine;

impl PositionStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: PositionState, to: PositionState) -> bool {
        matches!(
            (from, to),
            (PositionState::PendingOpen, PositionState::Open)
                | (PositionState::Open, PositionState::PendingClose)
                | (PositionState::PendingClose, PositionState::Closed)
                // failed or timed-out close
                | (PositionState::PendingClose, PositionState::Open)
        )
    }

    /// Validate a state transition.
    pub fn validate_transition(from: PositionState, to: PositionState) -> Result<(), PositionError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(PositionError::InvalidStateTransition {
                from,
                to,
                reason: Self::transition_error_reason(from, to),
            })
        }
    }

    /// Human-readable reason for an invalid transition.
    #[must_use]
    pub fn transition_error_reason(from: PositionState, to: PositionState) -> String {
        match from {
            PositionState::Closed => format!("Position is closed and archived, cannot move to {to}"),
            PositionState::PendingOpen => {
                format!("Entry fill not confirmed yet, cannot move to {to}")
            }
            PositionState::Open if to == PositionState::Closed => {
                "Close must go through PENDING_CLOSE".to_string()
            }
            _ => format!("Invalid transition from {from} to {to}"),
        }
    }

    /// All valid next states from a given state.
    #[must_use]
    pub fn valid_next_states(from: PositionState) -> Vec<PositionState> {
        match from {
            PositionState::PendingOpen => vec![PositionState::Open],
            PositionState::Open => vec![PositionState::PendingClose],
            PositionState::PendingClose => vec![PositionState::Closed, PositionState::Open],
            PositionState::Closed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const ALL: [PositionState; 4] = [
        PositionState::PendingOpen,
        PositionState::Open,
        PositionState::PendingClose,
        PositionState::Closed,
    ];

    #[test_case(PositionState::PendingOpen, PositionState::Open ; "fill confirms entry")]
    #[test_case(PositionState::Open, PositionState::PendingClose ; "close accepted")]
    #[test_case(PositionState::PendingClose, PositionState::Closed ; "fill confirms exit")]
    #[test_case(PositionState::PendingClose, PositionState::Open ; "close reverted")]
    fn allowed_transitions(from: PositionState, to: PositionState) {
        assert!(PositionStateMachine::validate_transition(from, to).is_ok());
    }

    #[test]
    fn closed_is_terminal() {
        for to in ALL {
            assert!(!PositionStateMachine::is_valid_transition(
                PositionState::Closed,
                to
            ));
        }
        assert!(PositionStateMachine::valid_next_states(PositionState::Closed).is_empty());
    }

    #[test]
    fn open_cannot_skip_pending_close() {
        let Err(err) =
            PositionStateMachine::validate_transition(PositionState::Open, PositionState::Closed)
        else {
            panic!("expected rejection");
        };
        assert!(err.to_string().contains("PENDING_CLOSE"));
    }

    #[test]
    fn table_matches_next_states() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    PositionStateMachine::is_valid_transition(from, to),
                    PositionStateMachine::valid_next_states(from).contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }
}
