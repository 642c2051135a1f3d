//! Session entity and status definitions
//!
//! Status IDs are stable i16 codes suitable for relational storage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, ListingId, SessionId, UserId};

/// Session lifecycle states
///
/// Terminal states: COMPLETED (60), CANCELLED (-10), REFUNDED (-20)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum SessionStatus {
    /// Created by the requester, awaiting provider acceptance
    Pending = 0,

    /// Provider accepted, awaiting escrow payment
    Confirmed = 10,

    /// Payer's funds locked in escrow
    EscrowPaid = 20,

    /// Session underway
    InProgress = 30,

    /// Session ended, awaiting dual outcome confirmation
    OutcomePending = 40,

    /// A dispute has frozen the lifecycle; only resolution may exit
    Disputed = 50,

    /// Terminal: outcome confirmed by both parties, escrow released
    Completed = 60,

    /// Terminal: withdrawn by a party (escrow refunded if it was locked)
    Cancelled = -10,

    /// Terminal: dispute resolved in the payer's favor
    Refunded = -20,
}

impl SessionStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Refunded
        )
    }

    /// Get the numeric state ID for storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from a storage state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(SessionStatus::Pending),
            10 => Some(SessionStatus::Confirmed),
            20 => Some(SessionStatus::EscrowPaid),
            30 => Some(SessionStatus::InProgress),
            40 => Some(SessionStatus::OutcomePending),
            50 => Some(SessionStatus::Disputed),
            60 => Some(SessionStatus::Completed),
            -10 => Some(SessionStatus::Cancelled),
            -20 => Some(SessionStatus::Refunded),
            _ => None,
        }
    }

    /// Human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::EscrowPaid => "escrow_paid",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::OutcomePending => "outcome_pending",
            SessionStatus::Disputed => "disputed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Escrow sub-status attached to a session's payment block.
///
/// Monotonic: `Pending → Locked → {Released | Refunded}`, never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowState {
    Pending,
    Locked,
    Released,
    Refunded,
}

impl EscrowState {
    /// Whether `next` is a legal forward step from `self`.
    pub fn can_advance_to(&self, next: EscrowState) -> bool {
        matches!(
            (self, next),
            (EscrowState::Pending, EscrowState::Locked)
                | (EscrowState::Locked, EscrowState::Released)
                | (EscrowState::Locked, EscrowState::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowState::Pending => "pending",
            EscrowState::Locked => "locked",
            EscrowState::Released => "released",
            EscrowState::Refunded => "refunded",
        }
    }
}

/// Kind of paid interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Teach,
    Rent,
    LocalService,
}

/// The two roles a participant can hold in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Requester,
    Provider,
}

/// Scheduling block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub is_online: bool,
    pub meeting_ref: Option<String>,
}

/// One party's outcome attestation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeConfirmation {
    pub confirmed: bool,
    pub feedback: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Payment block; fee is fixed at escrow lock and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub gross: Amount,
    pub platform_fee: Amount,
    pub provider_net: Amount,
    pub escrow: EscrowState,
    pub paid_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

/// One-directional post-completion rating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub stars: u8,
    pub review: Option<String>,
    pub rated_at: DateTime<Utc>,
}

/// Cancellation metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: UserId,
    pub cancelled_at: DateTime<Utc>,
}

/// One paid, scheduled engagement between a requester and a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub requester: UserId,
    pub provider: UserId,
    pub listing: Option<ListingId>,

    pub skill: String,
    pub sub_skill: Option<String>,
    pub kind: InteractionKind,

    pub status: SessionStatus,
    pub schedule: Schedule,

    pub requester_outcome: OutcomeConfirmation,
    pub provider_outcome: OutcomeConfirmation,
    pub completed_at: Option<DateTime<Utc>>,

    pub payment: Payment,

    pub rating_by_requester: Option<Rating>,
    pub rating_by_provider: Option<Rating>,

    pub cancellation: Option<Cancellation>,

    /// Bumped on every persisted transition; the optimistic check for
    /// storage ports that do not serialize writers themselves.
    pub version: u64,

    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Role of `user` within this session, if a participant at all.
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if user == self.requester {
            Some(Role::Requester)
        } else if user == self.provider {
            Some(Role::Provider)
        } else {
            None
        }
    }

    /// Counterparty of `user`, if a participant.
    pub fn counterparty(&self, user: UserId) -> Option<UserId> {
        match self.role_of(user)? {
            Role::Requester => Some(self.provider),
            Role::Provider => Some(self.requester),
        }
    }

    /// Both parties have attested the outcome.
    pub fn both_confirmed(&self) -> bool {
        self.requester_outcome.confirmed && self.provider_outcome.confirmed
    }

    /// Advance the escrow sub-status, rejecting any regression.
    pub fn advance_escrow(&mut self, next: EscrowState) -> Result<(), &'static str> {
        if !self.payment.escrow.can_advance_to(next) {
            return Err("escrow state cannot regress");
        }
        self.payment.escrow = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(SessionStatus::Refunded.is_terminal());

        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Confirmed.is_terminal());
        assert!(!SessionStatus::EscrowPaid.is_terminal());
        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(!SessionStatus::OutcomePending.is_terminal());
        assert!(!SessionStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_state_id_roundtrip() {
        let states = [
            SessionStatus::Pending,
            SessionStatus::Confirmed,
            SessionStatus::EscrowPaid,
            SessionStatus::InProgress,
            SessionStatus::OutcomePending,
            SessionStatus::Disputed,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::Refunded,
        ];

        for state in states {
            let id = state.id();
            let recovered = SessionStatus::from_id(id).unwrap();
            assert_eq!(state, recovered);
        }
    }

    #[test]
    fn test_invalid_state_id() {
        assert!(SessionStatus::from_id(999).is_none());
        assert!(SessionStatus::from_id(-999).is_none());
    }

    #[test]
    fn test_escrow_monotonic() {
        assert!(EscrowState::Pending.can_advance_to(EscrowState::Locked));
        assert!(EscrowState::Locked.can_advance_to(EscrowState::Released));
        assert!(EscrowState::Locked.can_advance_to(EscrowState::Refunded));

        // No regressions, no skips, no exits from terminals
        assert!(!EscrowState::Locked.can_advance_to(EscrowState::Pending));
        assert!(!EscrowState::Pending.can_advance_to(EscrowState::Released));
        assert!(!EscrowState::Released.can_advance_to(EscrowState::Refunded));
        assert!(!EscrowState::Refunded.can_advance_to(EscrowState::Locked));
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionStatus::Pending.to_string(), "pending");
        assert_eq!(SessionStatus::EscrowPaid.to_string(), "escrow_paid");
        assert_eq!(SessionStatus::OutcomePending.to_string(), "outcome_pending");
    }
}
