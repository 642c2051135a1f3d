//! Dispute entities and their state machine
//!
//! A dispute is a parallel process attached to one session. While it is
//! live the session is frozen in `disputed`; the only way out is a
//! resolution, which the coordinator applies through the lifecycle
//! planner and the ledger in one atomic unit.

use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, DisputeId, SessionId, UserId};
use crate::error::CoreError;

/// Why the dispute was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeReason {
    OutcomeNotMet,
    NoShow,
    PoorQuality,
    Harassment,
    PaymentIssue,
    ServiceIncomplete,
    Misrepresentation,
    Other,
}

impl DisputeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeReason::OutcomeNotMet => "outcome_not_met",
            DisputeReason::NoShow => "no_show",
            DisputeReason::PoorQuality => "poor_quality",
            DisputeReason::Harassment => "harassment",
            DisputeReason::PaymentIssue => "payment_issue",
            DisputeReason::ServiceIncomplete => "service_incomplete",
            DisputeReason::Misrepresentation => "misrepresentation",
            DisputeReason::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum DisputeStatus {
    Open = 0,
    AutomaticReview = 10,
    ManualReview = 20,
    Arbitration = 30,
    Resolved = 40,
    Closed = 50,
}

impl DisputeStatus {
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(DisputeStatus::Open),
            10 => Some(DisputeStatus::AutomaticReview),
            20 => Some(DisputeStatus::ManualReview),
            30 => Some(DisputeStatus::Arbitration),
            40 => Some(DisputeStatus::Resolved),
            50 => Some(DisputeStatus::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::AutomaticReview => "automatic_review",
            DisputeStatus::ManualReview => "manual_review",
            DisputeStatus::Arbitration => "arbitration",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Closed => "closed",
        }
    }

    /// Resolution is only accepted once a human (or arbitration panel)
    /// owns the case; automatic review must escalate first.
    pub const fn can_resolve(&self) -> bool {
        matches!(self, DisputeStatus::ManualReview | DisputeStatus::Arbitration)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the dispute settles the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Full escrow back to the payer; session → refunded
    Refund,
    /// Full release to the provider (minus fee); session → completed
    Release,
    /// Part back to the payer, remainder released; session → completed
    PartialRefund,
    /// Dismissed; any held escrow returns; session → cancelled
    NoAction,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Refund => "refund",
            ResolutionKind::Release => "release",
            ResolutionKind::PartialRefund => "partial_refund",
            ResolutionKind::NoAction => "no_action",
        }
    }
}

/// Triage verdict attached when the dispute is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triage {
    pub route: DisputeStatus,
    /// 0..=100
    pub confidence: u8,
    pub recommendation: String,
}

/// Route a freshly opened dispute.
///
/// No-show claims are mechanical to verify (the session clock and
/// attendance attestation suffice), so they skip straight to automatic
/// review with a strong refund recommendation. Everything else needs a
/// human.
pub fn triage(reason: DisputeReason) -> Triage {
    match reason {
        DisputeReason::NoShow => Triage {
            route: DisputeStatus::AutomaticReview,
            confidence: 95,
            recommendation: "auto-refund recommended".to_string(),
        },
        DisputeReason::Harassment => Triage {
            route: DisputeStatus::ManualReview,
            confidence: 40,
            recommendation: "trust-and-safety review required".to_string(),
        },
        _ => Triage {
            route: DisputeStatus::ManualReview,
            confidence: 60,
            recommendation: "manual review required".to_string(),
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub kind: ResolutionKind,
    /// For `partial_refund`: the portion returned to the payer. For the
    /// other kinds this records the full settled amount.
    pub amount: Amount,
    pub resolver: UserId,
    pub notes: String,
    pub resolved_at: i64,
}

/// Append-only audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub actor: UserId,
    pub action: String,
    pub note: String,
    pub at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub by: UserId,
    pub reason: String,
    pub at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub dispute_id: DisputeId,
    pub session_id: SessionId,
    pub raised_by: UserId,
    pub against: UserId,
    pub reason: DisputeReason,
    pub description: String,
    pub evidence: Vec<String>,
    pub disputed_amount: Amount,
    pub status: DisputeStatus,
    pub triage: Triage,
    pub resolution: Option<Resolution>,
    pub timeline: Vec<TimelineEvent>,
    pub appeal: Option<Appeal>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Dispute {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        dispute_id: DisputeId,
        session_id: SessionId,
        raised_by: UserId,
        against: UserId,
        reason: DisputeReason,
        description: String,
        evidence: Vec<String>,
        disputed_amount: Amount,
        now: i64,
    ) -> Self {
        let triage = triage(reason);
        let mut dispute = Dispute {
            dispute_id,
            session_id,
            raised_by,
            against,
            reason,
            description,
            evidence,
            disputed_amount,
            status: triage.route,
            triage,
            resolution: None,
            timeline: Vec::new(),
            appeal: None,
            created_at: now,
            updated_at: now,
        };
        dispute.record(raised_by, "opened", dispute.reason.as_str(), now);
        dispute
    }

    pub fn record(&mut self, actor: UserId, action: &str, note: &str, now: i64) {
        self.timeline.push(TimelineEvent {
            actor,
            action: action.to_string(),
            note: note.to_string(),
            at: now,
        });
        self.updated_at = now;
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.raised_by == user_id || self.against == user_id
    }

    /// Move an automatic-review case into a reviewer's queue.
    pub fn escalate(&mut self, actor: UserId, now: i64) -> Result<(), CoreError> {
        if self.status != DisputeStatus::AutomaticReview {
            return Err(CoreError::StateViolation {
                status: self.status.as_str(),
                action: "escalate",
            });
        }
        self.status = DisputeStatus::ManualReview;
        self.record(actor, "escalated", "moved to manual review", now);
        Ok(())
    }

    /// Record the resolution on the dispute itself. The coordinator is
    /// responsible for settling the ledger and terminating the session
    /// in the same atomic unit; this method only owns the dispute side.
    pub fn resolve(
        &mut self,
        kind: ResolutionKind,
        amount: Amount,
        resolver: UserId,
        notes: String,
        now: i64,
    ) -> Result<(), CoreError> {
        if !self.status.can_resolve() {
            return Err(CoreError::StateViolation {
                status: self.status.as_str(),
                action: "resolve",
            });
        }
        self.resolution = Some(Resolution {
            kind,
            amount,
            resolver,
            notes,
            resolved_at: now,
        });
        self.status = DisputeStatus::Resolved;
        self.record(resolver, "resolved", kind.as_str(), now);
        Ok(())
    }

    /// One appeal per dispute, and only against a resolved case.
    /// Reopens into arbitration; a second resolution closes it for good.
    pub fn appeal(&mut self, by: UserId, reason: String, now: i64) -> Result<(), CoreError> {
        if self.status != DisputeStatus::Resolved {
            return Err(CoreError::StateViolation {
                status: self.status.as_str(),
                action: "appeal",
            });
        }
        if self.appeal.is_some() {
            return Err(CoreError::AlreadyActioned("appeal already filed"));
        }
        self.appeal = Some(Appeal {
            by,
            reason: reason.clone(),
            at: now,
        });
        self.status = DisputeStatus::Arbitration;
        self.record(by, "appealed", &reason, now);
        Ok(())
    }

    pub fn close(&mut self, actor: UserId, now: i64) -> Result<(), CoreError> {
        if self.status != DisputeStatus::Resolved {
            return Err(CoreError::StateViolation {
                status: self.status.as_str(),
                action: "close",
            });
        }
        self.status = DisputeStatus::Closed;
        self.record(actor, "closed", "", now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_dispute(reason: DisputeReason) -> Dispute {
        Dispute::open(
            1,
            100,
            7,
            8,
            reason,
            "did not show up".into(),
            vec![],
            50_000,
            1_700_000_000_000,
        )
    }

    #[test]
    fn test_status_id_roundtrip() {
        for s in [
            DisputeStatus::Open,
            DisputeStatus::AutomaticReview,
            DisputeStatus::ManualReview,
            DisputeStatus::Arbitration,
            DisputeStatus::Resolved,
            DisputeStatus::Closed,
        ] {
            assert_eq!(DisputeStatus::from_id(s.id()), Some(s));
        }
        assert_eq!(DisputeStatus::from_id(99), None);
    }

    #[test]
    fn test_dispute_serde_round_trip() {
        let d = open_dispute(DisputeReason::NoShow);
        let json = serde_json::to_string(&d).unwrap();
        let back: Dispute = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, d.status);
        assert_eq!(back.triage, d.triage);
        assert_eq!(back.triage.recommendation, "auto-refund recommended");
    }

    #[test]
    fn test_no_show_triages_to_automatic_review() {
        let t = triage(DisputeReason::NoShow);
        assert_eq!(t.route, DisputeStatus::AutomaticReview);
        assert!(t.confidence >= 90);

        let d = open_dispute(DisputeReason::NoShow);
        assert_eq!(d.status, DisputeStatus::AutomaticReview);
        assert_eq!(d.timeline.len(), 1);
        assert_eq!(d.timeline[0].action, "opened");
    }

    #[test]
    fn test_other_reasons_go_to_manual_review() {
        for reason in [
            DisputeReason::OutcomeNotMet,
            DisputeReason::PoorQuality,
            DisputeReason::PaymentIssue,
            DisputeReason::Other,
        ] {
            assert_eq!(triage(reason).route, DisputeStatus::ManualReview);
        }
    }

    #[test]
    fn test_automatic_review_must_escalate_before_resolve() {
        let mut d = open_dispute(DisputeReason::NoShow);
        let err = d
            .resolve(ResolutionKind::Refund, 50_000, 99, "ok".into(), 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::StateViolation { .. }));

        d.escalate(99, 2).unwrap();
        assert_eq!(d.status, DisputeStatus::ManualReview);
        d.resolve(ResolutionKind::Refund, 50_000, 99, "ok".into(), 3)
            .unwrap();
        assert_eq!(d.status, DisputeStatus::Resolved);
        assert_eq!(d.resolution.as_ref().unwrap().kind, ResolutionKind::Refund);
    }

    #[test]
    fn test_single_appeal_reopens_into_arbitration() {
        let mut d = open_dispute(DisputeReason::PoorQuality);
        d.resolve(ResolutionKind::NoAction, 0, 99, "dismissed".into(), 1)
            .unwrap();

        d.appeal(7, "new evidence".into(), 2).unwrap();
        assert_eq!(d.status, DisputeStatus::Arbitration);

        d.resolve(ResolutionKind::Refund, 50_000, 99, "upheld".into(), 3)
            .unwrap();
        let err = d.appeal(8, "again".into(), 4).unwrap_err();
        assert_eq!(err, CoreError::AlreadyActioned("appeal already filed"));
    }

    #[test]
    fn test_close_only_from_resolved() {
        let mut d = open_dispute(DisputeReason::Other);
        assert!(d.close(99, 1).is_err());
        d.resolve(ResolutionKind::NoAction, 0, 99, "".into(), 2)
            .unwrap();
        d.close(99, 3).unwrap();
        assert_eq!(d.status, DisputeStatus::Closed);
        assert!(d.close(99, 4).is_err());
    }
}
