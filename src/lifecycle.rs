//! Session lifecycle transition planner
//!
//! Each transition is a pure function of (current state, actor role,
//! action) to (new state, required side effects). The coordinator queues
//! the side effects against the ledger and persists the state write in
//! the same atomic unit; nothing here mutates anything.
//!
//! This module is the ONLY authority on legal transitions. Dispute
//! resolution is just another transition source and goes through the
//! same planner rather than a special-cased path.

use crate::dispute::ResolutionKind;
use crate::error::CoreError;
use crate::session::{EscrowState, Role, SessionStatus};

/// Caller-initiated actions against a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Provider accepts the booking
    Confirm,
    /// Requester funds escrow
    Pay,
    /// Either party marks the session started
    Start,
    /// Either party marks the session ended
    End,
    /// One party attests the outcome; `both_after` is true when this
    /// attestation is the second of the pair
    ConfirmOutcome { both_after: bool },
    /// Either party withdraws
    Cancel,
    /// Either party opens a dispute
    OpenDispute,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Confirm => "confirm",
            SessionAction::Pay => "pay",
            SessionAction::Start => "start",
            SessionAction::End => "end",
            SessionAction::ConfirmOutcome { .. } => "verify-outcome",
            SessionAction::Cancel => "cancel",
            SessionAction::OpenDispute => "open-dispute",
        }
    }
}

/// Ledger work a transition requires.
///
/// Effects are symbolic; the coordinator resolves amounts from the
/// session's payment block and applies them atomically with the state
/// write. If the ledger apply fails the state write must not persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Lock the gross amount out of the payer's avail balance
    LockEscrow,
    /// Release escrow: payer gross out, provider net in, platform fee row
    ReleaseEscrow,
    /// Return the full gross from escrow to the payer
    RefundEscrow,
    /// Split escrow: part refunded to payer, remainder (net of fee)
    /// released to the provider
    PartialRefund,
    /// Invoke the completion hook exactly once, after the ledger commit
    InvokeCompletion,
}

/// Outcome of planning: the target state plus queued side effects.
pub type Plan = (SessionStatus, Vec<SideEffect>);

fn violation(status: SessionStatus, action: &'static str) -> CoreError {
    CoreError::StateViolation {
        status: status.as_str(),
        action,
    }
}

/// Plan a caller-initiated transition.
///
/// Pure: no clocks, no ids, no mutation. Rejects anything not in the
/// transition table with `StateViolation`; role mismatches with
/// `WrongRole`; duplicate escrow funding with `AlreadyActioned`.
pub fn plan(
    status: SessionStatus,
    escrow: EscrowState,
    role: Role,
    action: SessionAction,
) -> Result<Plan, CoreError> {
    match action {
        SessionAction::Confirm => {
            if status != SessionStatus::Pending {
                return Err(violation(status, "confirm"));
            }
            if role != Role::Provider {
                return Err(CoreError::WrongRole("provider"));
            }
            Ok((SessionStatus::Confirmed, vec![]))
        }

        SessionAction::Pay => {
            // Idempotency guard first: a session whose escrow is already
            // locked (or later) must reject a second pay, whatever the
            // lifecycle state claims.
            if escrow != EscrowState::Pending {
                return Err(CoreError::AlreadyActioned("escrow already locked"));
            }
            if status != SessionStatus::Confirmed {
                return Err(violation(status, "pay"));
            }
            if role != Role::Requester {
                return Err(CoreError::WrongRole("requester"));
            }
            Ok((SessionStatus::EscrowPaid, vec![SideEffect::LockEscrow]))
        }

        SessionAction::Start => {
            if status != SessionStatus::EscrowPaid {
                return Err(violation(status, "start"));
            }
            Ok((SessionStatus::InProgress, vec![]))
        }

        SessionAction::End => {
            if status != SessionStatus::InProgress {
                return Err(violation(status, "end"));
            }
            Ok((SessionStatus::OutcomePending, vec![]))
        }

        SessionAction::ConfirmOutcome { both_after } => {
            if status != SessionStatus::OutcomePending {
                return Err(violation(status, "verify-outcome"));
            }
            if both_after {
                Ok((
                    SessionStatus::Completed,
                    vec![SideEffect::ReleaseEscrow, SideEffect::InvokeCompletion],
                ))
            } else {
                // Single confirmation: state holds until the other party
                // acts or a dispute is opened.
                Ok((SessionStatus::OutcomePending, vec![]))
            }
        }

        SessionAction::Cancel => {
            if status.is_terminal() || status == SessionStatus::Disputed {
                return Err(violation(status, "cancel"));
            }
            let effects = if escrow == EscrowState::Locked {
                vec![SideEffect::RefundEscrow]
            } else {
                vec![]
            };
            Ok((SessionStatus::Cancelled, effects))
        }

        SessionAction::OpenDispute => {
            if status.is_terminal() || status == SessionStatus::Disputed {
                return Err(violation(status, "open-dispute"));
            }
            Ok((SessionStatus::Disputed, vec![]))
        }
    }
}

/// Plan the session-side transition for a dispute resolution.
///
/// Only legal while the session is frozen in `Disputed`. Each outcome
/// maps to exactly one terminal state and the identical ledger effects
/// the normal paths use.
pub fn plan_resolution(
    status: SessionStatus,
    escrow: EscrowState,
    kind: ResolutionKind,
) -> Result<Plan, CoreError> {
    if status != SessionStatus::Disputed {
        return Err(violation(status, "resolve"));
    }

    let locked = escrow == EscrowState::Locked;
    match kind {
        ResolutionKind::Refund => {
            let effects = if locked {
                vec![SideEffect::RefundEscrow]
            } else {
                vec![]
            };
            Ok((SessionStatus::Refunded, effects))
        }
        ResolutionKind::Release => {
            if !locked {
                // Nothing is held; releasing nothing is a resolution bug.
                return Err(CoreError::StateViolation {
                    status: escrow.as_str(),
                    action: "release",
                });
            }
            Ok((
                SessionStatus::Completed,
                vec![SideEffect::ReleaseEscrow, SideEffect::InvokeCompletion],
            ))
        }
        ResolutionKind::PartialRefund => {
            if !locked {
                return Err(CoreError::StateViolation {
                    status: escrow.as_str(),
                    action: "partial-refund",
                });
            }
            Ok((SessionStatus::Completed, vec![SideEffect::PartialRefund]))
        }
        ResolutionKind::NoAction => {
            // Dispute dismissed: the engagement ends without settlement
            // in either direction beyond returning any held funds.
            let effects = if locked {
                vec![SideEffect::RefundEscrow]
            } else {
                vec![]
            };
            Ok((SessionStatus::Cancelled, effects))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_order() {
        let (s, fx) = plan(
            SessionStatus::Pending,
            EscrowState::Pending,
            Role::Provider,
            SessionAction::Confirm,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Confirmed);
        assert!(fx.is_empty());

        let (s, fx) = plan(
            SessionStatus::Confirmed,
            EscrowState::Pending,
            Role::Requester,
            SessionAction::Pay,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::EscrowPaid);
        assert_eq!(fx, vec![SideEffect::LockEscrow]);

        let (s, _) = plan(
            SessionStatus::EscrowPaid,
            EscrowState::Locked,
            Role::Provider,
            SessionAction::Start,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::InProgress);

        let (s, _) = plan(
            SessionStatus::InProgress,
            EscrowState::Locked,
            Role::Requester,
            SessionAction::End,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::OutcomePending);
    }

    #[test]
    fn test_single_confirmation_holds() {
        let (s, fx) = plan(
            SessionStatus::OutcomePending,
            EscrowState::Locked,
            Role::Requester,
            SessionAction::ConfirmOutcome { both_after: false },
        )
        .unwrap();
        assert_eq!(s, SessionStatus::OutcomePending);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_dual_confirmation_releases_and_hooks_once() {
        let (s, fx) = plan(
            SessionStatus::OutcomePending,
            EscrowState::Locked,
            Role::Provider,
            SessionAction::ConfirmOutcome { both_after: true },
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Completed);
        assert_eq!(
            fx,
            vec![SideEffect::ReleaseEscrow, SideEffect::InvokeCompletion]
        );
    }

    #[test]
    fn test_pay_requires_requester() {
        let err = plan(
            SessionStatus::Confirmed,
            EscrowState::Pending,
            Role::Provider,
            SessionAction::Pay,
        )
        .unwrap_err();
        assert_eq!(err, CoreError::WrongRole("requester"));
    }

    #[test]
    fn test_confirm_requires_provider() {
        let err = plan(
            SessionStatus::Pending,
            EscrowState::Pending,
            Role::Requester,
            SessionAction::Confirm,
        )
        .unwrap_err();
        assert_eq!(err, CoreError::WrongRole("provider"));
    }

    #[test]
    fn test_double_pay_rejected_idempotently() {
        // Escrow already locked: second pay is AlreadyActioned, not a
        // state violation, regardless of lifecycle status.
        for status in [SessionStatus::EscrowPaid, SessionStatus::InProgress] {
            let err = plan(
                status,
                EscrowState::Locked,
                Role::Requester,
                SessionAction::Pay,
            )
            .unwrap_err();
            assert_eq!(err, CoreError::AlreadyActioned("escrow already locked"));
        }
    }

    #[test]
    fn test_cancel_refunds_only_when_locked() {
        let (s, fx) = plan(
            SessionStatus::Confirmed,
            EscrowState::Pending,
            Role::Requester,
            SessionAction::Cancel,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Cancelled);
        assert!(fx.is_empty());

        let (s, fx) = plan(
            SessionStatus::EscrowPaid,
            EscrowState::Locked,
            Role::Provider,
            SessionAction::Cancel,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Cancelled);
        assert_eq!(fx, vec![SideEffect::RefundEscrow]);
    }

    #[test]
    fn test_cancel_illegal_from_terminal_and_disputed() {
        for status in [
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::Refunded,
            SessionStatus::Disputed,
        ] {
            assert!(plan(
                status,
                EscrowState::Locked,
                Role::Requester,
                SessionAction::Cancel
            )
            .is_err());
        }
    }

    #[test]
    fn test_dispute_from_any_non_terminal() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Confirmed,
            SessionStatus::EscrowPaid,
            SessionStatus::InProgress,
            SessionStatus::OutcomePending,
        ] {
            let (s, fx) = plan(
                status,
                EscrowState::Pending,
                Role::Requester,
                SessionAction::OpenDispute,
            )
            .unwrap();
            assert_eq!(s, SessionStatus::Disputed);
            assert!(fx.is_empty());
        }
    }

    #[test]
    fn test_illegal_transitions_have_no_effects() {
        // A rejected plan never reaches the ledger.
        let err = plan(
            SessionStatus::Pending,
            EscrowState::Pending,
            Role::Requester,
            SessionAction::Start,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::StateViolation {
                status: "pending",
                action: "start"
            }
        );
    }

    #[test]
    fn test_resolution_paths() {
        let (s, fx) = plan_resolution(
            SessionStatus::Disputed,
            EscrowState::Locked,
            ResolutionKind::Refund,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Refunded);
        assert_eq!(fx, vec![SideEffect::RefundEscrow]);

        let (s, fx) = plan_resolution(
            SessionStatus::Disputed,
            EscrowState::Locked,
            ResolutionKind::Release,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Completed);
        assert_eq!(
            fx,
            vec![SideEffect::ReleaseEscrow, SideEffect::InvokeCompletion]
        );

        let (s, fx) = plan_resolution(
            SessionStatus::Disputed,
            EscrowState::Locked,
            ResolutionKind::PartialRefund,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Completed);
        assert_eq!(fx, vec![SideEffect::PartialRefund]);

        let (s, fx) = plan_resolution(
            SessionStatus::Disputed,
            EscrowState::Locked,
            ResolutionKind::NoAction,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Cancelled);
        assert_eq!(fx, vec![SideEffect::RefundEscrow]);
    }

    #[test]
    fn test_resolution_requires_disputed() {
        assert!(plan_resolution(
            SessionStatus::InProgress,
            EscrowState::Locked,
            ResolutionKind::Refund
        )
        .is_err());
    }

    #[test]
    fn test_release_requires_locked_escrow() {
        assert!(plan_resolution(
            SessionStatus::Disputed,
            EscrowState::Pending,
            ResolutionKind::Release
        )
        .is_err());

        // Refund of an unfunded session moves no money
        let (s, fx) = plan_resolution(
            SessionStatus::Disputed,
            EscrowState::Pending,
            ResolutionKind::Refund,
        )
        .unwrap();
        assert_eq!(s, SessionStatus::Refunded);
        assert!(fx.is_empty());
    }
}
