//! Session coordinator
//!
//! Owns all mutable state (sessions, disputes, ledger) behind one mutex
//! and drives every transition through the lifecycle planner. Single
//! writer: a transition validates, applies its ledger effects, then
//! persists the session write, all under the same lock, so a failed
//! ledger effect leaves no partial state.
//!
//! Completion hooks run after the lock is dropped, bounded by a timeout;
//! a hook failure is logged for reconciliation and never rolls back the
//! committed ledger.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::completion::{CompletionHooks, CompletionRecord};
use crate::config::EscrowConfig;
use crate::core_types::{Amount, DisputeId, ListingId, SessionId, UserId};
use crate::dispute::{Dispute, DisputeReason, ResolutionKind};
use crate::error::CoreError;
use crate::fee::split_gross;
use crate::ledger::{FeeBreakdown, LedgerStore, PaymentChannel, TxFilter, Transaction, WalletSummary};
use crate::lifecycle::{plan, plan_resolution, SessionAction, SideEffect};
use crate::session::{
    Cancellation, EscrowState, InteractionKind, OutcomeConfirmation, Payment, Rating, Role,
    Schedule, Session, SessionStatus,
};

/// Snowflake-style id generator: timestamp (41 bits) | machine (8 bits)
/// | sequence (15 bits).
struct SnowflakeGenerator {
    machine_id: u8,
    sequence: u32,
    last_timestamp: u64,
}

impl SnowflakeGenerator {
    fn new(machine_id: u8) -> Self {
        Self {
            machine_id,
            sequence: 0,
            last_timestamp: 0,
        }
    }

    fn generate(&mut self) -> u64 {
        let now = Utc::now().timestamp_millis() as u64;
        if now == self.last_timestamp {
            self.sequence += 1;
        } else {
            self.sequence = 0;
            self.last_timestamp = now;
        }
        (now << 23) | ((self.machine_id as u64) << 15) | (self.sequence as u64 & 0x7FFF)
    }
}

/// Everything the single writer owns.
struct CoordinatorState {
    sessions: FxHashMap<SessionId, Session>,
    disputes: FxHashMap<DisputeId, Dispute>,
    /// Live dispute per session; cleared on resolution.
    open_dispute: FxHashMap<SessionId, DisputeId>,
    /// Client idempotency keys for booking retries.
    booking_cids: FxHashMap<Uuid, SessionId>,
    ledger: LedgerStore,
    id_gen: SnowflakeGenerator,
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub requester: UserId,
    pub provider: UserId,
    pub listing: Option<ListingId>,
    pub skill: String,
    pub sub_skill: Option<String>,
    pub kind: InteractionKind,
    pub gross: Amount,
    pub schedule: Schedule,
    /// Client-supplied idempotency key; a retried booking with the same
    /// key returns the original session instead of double-booking.
    pub cid: Option<Uuid>,
}

/// Session list filter; `None` matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFilter {
    pub role: Option<Role>,
    pub status: Option<SessionStatus>,
}

pub struct SessionCoordinator {
    state: Mutex<CoordinatorState>,
    hooks: Arc<dyn CompletionHooks>,
    fee_rate: u64,
    hook_timeout: Duration,
}

impl SessionCoordinator {
    pub fn new(config: &EscrowConfig, machine_id: u8, hooks: Arc<dyn CompletionHooks>) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                sessions: FxHashMap::default(),
                disputes: FxHashMap::default(),
                open_dispute: FxHashMap::default(),
                booking_cids: FxHashMap::default(),
                ledger: LedgerStore::new(config.min_withdrawal),
                id_gen: SnowflakeGenerator::new(machine_id),
            }),
            hooks,
            fee_rate: config.fee_rate,
            hook_timeout: Duration::from_millis(config.hook_timeout_ms),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CoordinatorState>, CoreError> {
        self.state
            .lock()
            .map_err(|_| CoreError::Storage("coordinator state poisoned".to_string()))
    }

    // === Session lifecycle ===

    pub fn book(&self, req: BookingRequest) -> Result<Session, CoreError> {
        if req.gross == 0 {
            return Err(CoreError::InvalidAmount);
        }
        if req.requester == req.provider {
            return Err(CoreError::SameParty);
        }

        let (fee, net) = split_gross(req.gross, self.fee_rate);
        let now = Utc::now();
        let mut state = self.lock_state()?;
        if let Some(cid) = req.cid {
            if let Some(existing) = state
                .booking_cids
                .get(&cid)
                .and_then(|id| state.sessions.get(id))
            {
                debug!(cid = %cid, session_id = existing.id, "duplicate booking cid");
                return Ok(existing.clone());
            }
        }
        let id = state.id_gen.generate();
        let session = Session {
            id,
            requester: req.requester,
            provider: req.provider,
            listing: req.listing,
            skill: req.skill,
            sub_skill: req.sub_skill,
            kind: req.kind,
            status: SessionStatus::Pending,
            schedule: req.schedule,
            requester_outcome: OutcomeConfirmation::default(),
            provider_outcome: OutcomeConfirmation::default(),
            completed_at: None,
            payment: Payment {
                gross: req.gross,
                platform_fee: fee,
                provider_net: net,
                escrow: EscrowState::Pending,
                paid_at: None,
                released_at: None,
            },
            rating_by_requester: None,
            rating_by_provider: None,
            cancellation: None,
            version: 0,
            created_at: now,
        };
        info!(
            session_id = id,
            requester = req.requester,
            provider = req.provider,
            gross = req.gross,
            "session booked"
        );
        if let Some(cid) = req.cid {
            state.booking_cids.insert(cid, id);
        }
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    pub fn confirm(&self, caller: UserId, session_id: SessionId) -> Result<Session, CoreError> {
        self.transition(caller, session_id, SessionAction::Confirm)
    }

    pub fn pay(&self, caller: UserId, session_id: SessionId) -> Result<Session, CoreError> {
        self.transition(caller, session_id, SessionAction::Pay)
    }

    pub fn start(&self, caller: UserId, session_id: SessionId) -> Result<Session, CoreError> {
        self.transition(caller, session_id, SessionAction::Start)
    }

    pub fn end(&self, caller: UserId, session_id: SessionId) -> Result<Session, CoreError> {
        self.transition(caller, session_id, SessionAction::End)
    }

    pub fn cancel(
        &self,
        caller: UserId,
        session_id: SessionId,
        reason: String,
    ) -> Result<Session, CoreError> {
        let mut state = self.lock_state()?;
        let state = &mut *state;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(CoreError::SessionNotFound(session_id))?;
        session.role_of(caller).ok_or(CoreError::Unauthorized)?;

        let (next, effects) = plan(
            session.status,
            session.payment.escrow,
            // Cancel is role-agnostic; the actor is recorded below
            Role::Requester,
            SessionAction::Cancel,
        )?;

        apply_effects(&mut state.ledger, session, &effects, None, self.fee_rate)?;
        session.status = next;
        session.cancellation = Some(Cancellation {
            reason,
            cancelled_by: caller,
            cancelled_at: Utc::now(),
        });
        session.version += 1;
        info!(session_id, caller, "session cancelled");
        Ok(session.clone())
    }

    /// Record one party's outcome attestation. When this is the second
    /// `true`, escrow releases and the completion hook fires once.
    pub async fn verify_outcome(
        &self,
        caller: UserId,
        session_id: SessionId,
        confirmed: bool,
        feedback: Option<String>,
    ) -> Result<Session, CoreError> {
        let (snapshot, record) = {
            let mut state = self.lock_state()?;
            let state = &mut *state;
            let session = state
                .sessions
                .get_mut(&session_id)
                .ok_or(CoreError::SessionNotFound(session_id))?;
            let role = session.role_of(caller).ok_or(CoreError::Unauthorized)?;

            let own = match role {
                Role::Requester => &session.requester_outcome,
                Role::Provider => &session.provider_outcome,
            };
            if own.confirmed_at.is_some() {
                return Err(CoreError::AlreadyActioned("outcome already attested"));
            }

            let other_confirmed = match role {
                Role::Requester => session.provider_outcome.confirmed,
                Role::Provider => session.requester_outcome.confirmed,
            };
            let both_after = confirmed && other_confirmed;
            let (next, effects) = plan(
                session.status,
                session.payment.escrow,
                role,
                SessionAction::ConfirmOutcome { both_after },
            )?;

            apply_effects(&mut state.ledger, session, &effects, None, self.fee_rate)?;

            let now = Utc::now();
            let attestation = OutcomeConfirmation {
                confirmed,
                feedback,
                confirmed_at: Some(now),
            };
            match role {
                Role::Requester => session.requester_outcome = attestation,
                Role::Provider => session.provider_outcome = attestation,
            }
            session.status = next;
            session.version += 1;

            let record = if next == SessionStatus::Completed {
                session.completed_at = Some(now);
                info!(session_id, "session completed, escrow released");
                Some(completion_record(session))
            } else {
                debug!(session_id, caller, confirmed, "outcome attested");
                None
            };
            (session.clone(), record)
        };

        if let Some(record) = record {
            self.dispatch_completion(record).await;
        }
        Ok(snapshot)
    }

    /// One rating per direction, only once the session is terminal on
    /// the completed side.
    pub fn rate(
        &self,
        caller: UserId,
        session_id: SessionId,
        stars: u8,
        review: Option<String>,
    ) -> Result<Session, CoreError> {
        if !(1..=5).contains(&stars) {
            return Err(CoreError::InvalidRating);
        }
        let mut state = self.lock_state()?;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(CoreError::SessionNotFound(session_id))?;
        let role = session.role_of(caller).ok_or(CoreError::Unauthorized)?;
        if session.status != SessionStatus::Completed {
            return Err(CoreError::StateViolation {
                status: session.status.as_str(),
                action: "rate",
            });
        }
        let slot = match role {
            Role::Requester => &mut session.rating_by_requester,
            Role::Provider => &mut session.rating_by_provider,
        };
        if slot.is_some() {
            return Err(CoreError::AlreadyActioned("already rated"));
        }
        *slot = Some(Rating {
            stars,
            review,
            rated_at: Utc::now(),
        });
        session.version += 1;
        Ok(session.clone())
    }

    fn transition(
        &self,
        caller: UserId,
        session_id: SessionId,
        action: SessionAction,
    ) -> Result<Session, CoreError> {
        let mut state = self.lock_state()?;
        let state = &mut *state;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(CoreError::SessionNotFound(session_id))?;
        let role = session.role_of(caller).ok_or(CoreError::Unauthorized)?;

        let (next, effects) = plan(session.status, session.payment.escrow, role, action)?;
        apply_effects(&mut state.ledger, session, &effects, None, self.fee_rate)?;
        session.status = next;
        session.version += 1;
        debug!(
            session_id,
            caller,
            action = action.as_str(),
            status = %next,
            "transition applied"
        );
        Ok(session.clone())
    }

    // === Wallet ===

    pub fn deposit(
        &self,
        user_id: UserId,
        amount: Amount,
        channel: PaymentChannel,
    ) -> Result<WalletSummary, CoreError> {
        let mut state = self.lock_state()?;
        state
            .ledger
            .deposit(user_id, amount, channel, Utc::now().timestamp_millis())?;
        Ok(state.ledger.summary(user_id))
    }

    pub fn withdraw(
        &self,
        user_id: UserId,
        amount: Amount,
        channel: PaymentChannel,
    ) -> Result<WalletSummary, CoreError> {
        let mut state = self.lock_state()?;
        state
            .ledger
            .withdraw(user_id, amount, channel, Utc::now().timestamp_millis())?;
        Ok(state.ledger.summary(user_id))
    }

    pub fn wallet_summary(&self, user_id: UserId) -> Result<WalletSummary, CoreError> {
        Ok(self.lock_state()?.ledger.summary(user_id))
    }

    pub fn transactions(
        &self,
        user_id: UserId,
        filter: TxFilter,
    ) -> Result<Vec<Transaction>, CoreError> {
        Ok(self.lock_state()?.ledger.transactions(user_id, filter))
    }

    // === Disputes ===

    pub fn open_dispute(
        &self,
        caller: UserId,
        session_id: SessionId,
        reason: DisputeReason,
        description: String,
        evidence: Vec<String>,
    ) -> Result<Dispute, CoreError> {
        let mut state = self.lock_state()?;
        let state = &mut *state;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(CoreError::SessionNotFound(session_id))?;
        session.role_of(caller).ok_or(CoreError::Unauthorized)?;
        let against = session
            .counterparty(caller)
            .ok_or(CoreError::Unauthorized)?;

        let (next, effects) = plan(
            session.status,
            session.payment.escrow,
            Role::Requester,
            SessionAction::OpenDispute,
        )?;
        debug_assert!(effects.is_empty());

        let dispute_id = state.id_gen.generate();
        let dispute = Dispute::open(
            dispute_id,
            session_id,
            caller,
            against,
            reason,
            description,
            evidence,
            session.payment.gross,
            Utc::now().timestamp_millis(),
        );
        session.status = next;
        session.version += 1;
        state.open_dispute.insert(session_id, dispute_id);
        state.disputes.insert(dispute_id, dispute.clone());
        info!(
            dispute_id,
            session_id,
            caller,
            reason = reason.as_str(),
            route = %dispute.status,
            "dispute opened"
        );
        Ok(dispute)
    }

    pub fn escalate_dispute(
        &self,
        caller: UserId,
        dispute_id: DisputeId,
    ) -> Result<Dispute, CoreError> {
        let mut state = self.lock_state()?;
        let dispute = state
            .disputes
            .get_mut(&dispute_id)
            .ok_or(CoreError::DisputeNotFound(dispute_id))?;
        dispute.escalate(caller, Utc::now().timestamp_millis())?;
        Ok(dispute.clone())
    }

    /// Apply a resolution: settle the ledger, terminate the session, and
    /// record the outcome on the dispute, as one unit under the lock.
    /// The resolver must not be a party to the dispute.
    pub async fn resolve_dispute(
        &self,
        resolver: UserId,
        dispute_id: DisputeId,
        kind: ResolutionKind,
        refund_amount: Option<Amount>,
        notes: String,
    ) -> Result<Dispute, CoreError> {
        let (snapshot, record) = {
            let mut state = self.lock_state()?;
            let state = &mut *state;
            let dispute = state
                .disputes
                .get_mut(&dispute_id)
                .ok_or(CoreError::DisputeNotFound(dispute_id))?;
            if dispute.is_participant(resolver) {
                return Err(CoreError::Unauthorized);
            }
            if !dispute.status.can_resolve() {
                return Err(CoreError::StateViolation {
                    status: dispute.status.as_str(),
                    action: "resolve",
                });
            }
            let session = state
                .sessions
                .get_mut(&dispute.session_id)
                .ok_or(CoreError::SessionNotFound(dispute.session_id))?;

            let (next, effects) = plan_resolution(session.status, session.payment.escrow, kind)?;

            let partial = match kind {
                ResolutionKind::PartialRefund => {
                    let amount = refund_amount.ok_or(CoreError::InvalidAmount)?;
                    if amount == 0 || amount >= session.payment.gross {
                        return Err(CoreError::InvalidAmount);
                    }
                    Some(amount)
                }
                _ => None,
            };

            apply_effects(&mut state.ledger, session, &effects, partial, self.fee_rate)?;

            let now = Utc::now();
            session.status = next;
            session.version += 1;
            let record = match next {
                SessionStatus::Completed => {
                    session.completed_at = Some(now);
                    if effects.contains(&SideEffect::InvokeCompletion) {
                        Some(completion_record(session))
                    } else {
                        None
                    }
                }
                SessionStatus::Cancelled => {
                    session.cancellation = Some(Cancellation {
                        reason: "dispute dismissed".to_string(),
                        cancelled_by: resolver,
                        cancelled_at: now,
                    });
                    None
                }
                _ => None,
            };

            let settled = match kind {
                ResolutionKind::Refund => session.payment.gross,
                ResolutionKind::Release => session.payment.provider_net,
                ResolutionKind::PartialRefund => partial.unwrap_or(0),
                ResolutionKind::NoAction => 0,
            };
            let session_id = session.id;
            dispute.resolve(kind, settled, resolver, notes, now.timestamp_millis())?;
            state.open_dispute.remove(&session_id);
            info!(
                dispute_id,
                session_id,
                resolver,
                kind = kind.as_str(),
                settled,
                "dispute resolved"
            );
            (dispute.clone(), record)
        };

        if let Some(record) = record {
            self.dispatch_completion(record).await;
        }
        Ok(snapshot)
    }

    /// A party may appeal a resolved dispute once; the session freezes
    /// back into `disputed` pending arbitration.
    pub fn appeal_dispute(
        &self,
        caller: UserId,
        dispute_id: DisputeId,
        reason: String,
    ) -> Result<Dispute, CoreError> {
        let mut state = self.lock_state()?;
        let state = &mut *state;
        let dispute = state
            .disputes
            .get_mut(&dispute_id)
            .ok_or(CoreError::DisputeNotFound(dispute_id))?;
        if !dispute.is_participant(caller) {
            return Err(CoreError::Unauthorized);
        }
        dispute.appeal(caller, reason, Utc::now().timestamp_millis())?;

        // An appeal reopens the session dispute freeze. Funds already
        // settled by the first resolution stay settled; arbitration can
        // only redirect what is still held.
        let session_id = dispute.session_id;
        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.status = SessionStatus::Disputed;
            session.version += 1;
        }
        state.open_dispute.insert(session_id, dispute_id);
        info!(dispute_id, session_id, caller, "dispute appealed");
        Ok(dispute.clone())
    }

    pub fn close_dispute(
        &self,
        caller: UserId,
        dispute_id: DisputeId,
    ) -> Result<Dispute, CoreError> {
        let mut state = self.lock_state()?;
        let dispute = state
            .disputes
            .get_mut(&dispute_id)
            .ok_or(CoreError::DisputeNotFound(dispute_id))?;
        dispute.close(caller, Utc::now().timestamp_millis())?;
        Ok(dispute.clone())
    }

    // === Queries ===

    pub fn session(&self, caller: UserId, session_id: SessionId) -> Result<Session, CoreError> {
        let state = self.lock_state()?;
        let session = state
            .sessions
            .get(&session_id)
            .ok_or(CoreError::SessionNotFound(session_id))?;
        session.role_of(caller).ok_or(CoreError::Unauthorized)?;
        Ok(session.clone())
    }

    pub fn sessions_for(
        &self,
        user_id: UserId,
        filter: SessionFilter,
    ) -> Result<Vec<Session>, CoreError> {
        let state = self.lock_state()?;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| match filter.role {
                Some(role) => s.role_of(user_id) == Some(role),
                None => s.role_of(user_id).is_some(),
            })
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    pub fn dispute(&self, caller: UserId, dispute_id: DisputeId) -> Result<Dispute, CoreError> {
        let state = self.lock_state()?;
        let dispute = state
            .disputes
            .get(&dispute_id)
            .ok_or(CoreError::DisputeNotFound(dispute_id))?;
        if !dispute.is_participant(caller) {
            return Err(CoreError::Unauthorized);
        }
        Ok(dispute.clone())
    }

    pub fn disputes_for(&self, user_id: UserId) -> Result<Vec<Dispute>, CoreError> {
        let state = self.lock_state()?;
        let mut disputes: Vec<Dispute> = state
            .disputes
            .values()
            .filter(|d| d.is_participant(user_id))
            .cloned()
            .collect();
        disputes.sort_by_key(|d| d.dispute_id);
        Ok(disputes)
    }

    async fn dispatch_completion(&self, record: CompletionRecord) {
        let session_id = record.session_id;
        match tokio::time::timeout(
            self.hook_timeout,
            self.hooks.on_session_completed(&record),
        )
        .await
        {
            Ok(Ok(())) => debug!(session_id, "completion hook delivered"),
            Ok(Err(e)) => warn!(session_id, error = %e, "completion hook failed"),
            Err(_) => warn!(session_id, "completion hook timed out"),
        }
    }
}

fn completion_record(session: &Session) -> CompletionRecord {
    CompletionRecord {
        session_id: session.id,
        requester_id: session.requester,
        provider_id: session.provider,
        kind: session.kind,
        gross: session.payment.gross,
        provider_net: session.payment.provider_net,
        completed_at: session
            .completed_at
            .map(|t| t.timestamp_millis())
            .unwrap_or_default(),
    }
}

/// Run the planner's queued ledger effects for one session. Escrow
/// sub-status advances with each money move, so a replay trips the
/// monotonicity guard instead of double-moving funds.
fn apply_effects(
    ledger: &mut LedgerStore,
    session: &mut Session,
    effects: &[SideEffect],
    partial_refund: Option<Amount>,
    fee_rate: u64,
) -> Result<(), CoreError> {
    let now_ms = Utc::now().timestamp_millis();
    for effect in effects {
        match effect {
            SideEffect::LockEscrow => {
                let fees = FeeBreakdown {
                    subtotal: session.payment.gross,
                    fee: session.payment.platform_fee,
                    fee_rate,
                    net: session.payment.provider_net,
                };
                ledger.lock(
                    session.requester,
                    session.id,
                    session.payment.gross,
                    fees,
                    now_ms,
                )?;
                session
                    .advance_escrow(EscrowState::Locked)
                    .map_err(|e| CoreError::Storage(e.to_string()))?;
                session.payment.paid_at = Some(Utc::now());
            }
            SideEffect::ReleaseEscrow => {
                ledger.release(
                    session.id,
                    session.provider,
                    session.payment.provider_net,
                    session.payment.platform_fee,
                    fee_rate,
                    now_ms,
                )?;
                session
                    .advance_escrow(EscrowState::Released)
                    .map_err(|e| CoreError::Storage(e.to_string()))?;
                session.payment.released_at = Some(Utc::now());
            }
            SideEffect::RefundEscrow => {
                ledger.refund(session.id, now_ms)?;
                session
                    .advance_escrow(EscrowState::Refunded)
                    .map_err(|e| CoreError::Storage(e.to_string()))?;
            }
            SideEffect::PartialRefund => {
                let refund = partial_refund.ok_or(CoreError::InvalidAmount)?;
                let remainder = session
                    .payment
                    .gross
                    .checked_sub(refund)
                    .ok_or(CoreError::InvalidAmount)?;
                let (fee, net) = split_gross(remainder, fee_rate);
                ledger.partial_refund(
                    session.id,
                    session.provider,
                    refund,
                    net,
                    fee,
                    fee_rate,
                    now_ms,
                )?;
                session
                    .advance_escrow(EscrowState::Released)
                    .map_err(|e| CoreError::Storage(e.to_string()))?;
                session.payment.released_at = Some(Utc::now());
            }
            SideEffect::InvokeCompletion => {
                // Dispatched by the caller after the lock drops
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::RecordingHooks;
    use crate::dispute::DisputeStatus;

    const REQUESTER: UserId = 10;
    const PROVIDER: UserId = 20;
    const ARBITER: UserId = 99;

    fn coordinator() -> (SessionCoordinator, Arc<RecordingHooks>) {
        let hooks = Arc::new(RecordingHooks::new());
        let coord = SessionCoordinator::new(&EscrowConfig::default(), 1, hooks.clone());
        (coord, hooks)
    }

    fn schedule() -> Schedule {
        Schedule {
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            is_online: true,
            meeting_ref: None,
        }
    }

    fn booking(gross: Amount) -> BookingRequest {
        BookingRequest {
            requester: REQUESTER,
            provider: PROVIDER,
            listing: None,
            skill: "guitar".to_string(),
            sub_skill: None,
            kind: InteractionKind::Teach,
            gross,
            schedule: schedule(),
            cid: None,
        }
    }

    fn booked_and_funded(coord: &SessionCoordinator, gross: Amount) -> SessionId {
        coord
            .deposit(REQUESTER, gross, PaymentChannel::Upi)
            .unwrap();
        let session = coord.book(booking(gross)).unwrap();
        coord.confirm(PROVIDER, session.id).unwrap();
        coord.pay(REQUESTER, session.id).unwrap();
        session.id
    }

    #[tokio::test]
    async fn test_happy_path_end_to_end() {
        // 500.00 gross at 5%: fee 25.00, provider nets 475.00
        let (coord, hooks) = coordinator();
        let id = booked_and_funded(&coord, 50_000);
        coord.start(PROVIDER, id).unwrap();
        coord.end(REQUESTER, id).unwrap();

        let s = coord.verify_outcome(REQUESTER, id, true, None).await.unwrap();
        assert_eq!(s.status, SessionStatus::OutcomePending);
        assert!(hooks.deliveries().is_empty());

        let s = coord.verify_outcome(PROVIDER, id, true, None).await.unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.payment.escrow, EscrowState::Released);

        assert_eq!(coord.wallet_summary(REQUESTER).unwrap().balance, 0);
        assert_eq!(coord.wallet_summary(PROVIDER).unwrap().balance, 47_500);
        assert_eq!(
            coord.wallet_summary(crate::core_types::PLATFORM_ID).unwrap().balance,
            2_500
        );

        let deliveries = hooks.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].session_id, id);
        assert_eq!(deliveries[0].provider_net, 47_500);
    }

    #[tokio::test]
    async fn test_hook_failure_does_not_roll_back() {
        let (coord, hooks) = coordinator();
        hooks.fail.store(true, std::sync::atomic::Ordering::Relaxed);
        let id = booked_and_funded(&coord, 50_000);
        coord.start(PROVIDER, id).unwrap();
        coord.end(REQUESTER, id).unwrap();
        coord.verify_outcome(REQUESTER, id, true, None).await.unwrap();
        let s = coord.verify_outcome(PROVIDER, id, true, None).await.unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(coord.wallet_summary(PROVIDER).unwrap().balance, 47_500);
    }

    #[tokio::test]
    async fn test_duplicate_attestation_rejected() {
        let (coord, _) = coordinator();
        let id = booked_and_funded(&coord, 50_000);
        coord.start(PROVIDER, id).unwrap();
        coord.end(REQUESTER, id).unwrap();

        let s = coord.verify_outcome(REQUESTER, id, true, None).await.unwrap();
        assert_eq!(s.status, SessionStatus::OutcomePending);

        let err = coord
            .verify_outcome(REQUESTER, id, true, None)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::AlreadyActioned("outcome already attested"));

        // The provider's attestation still completes the session.
        let s = coord.verify_outcome(PROVIDER, id, true, None).await.unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[test]
    fn test_book_rejects_self_dealing_and_zero() {
        let (coord, _) = coordinator();
        let mut req = booking(0);
        assert_eq!(coord.book(req.clone()).unwrap_err(), CoreError::InvalidAmount);
        req.gross = 10_000;
        req.provider = REQUESTER;
        assert_eq!(coord.book(req).unwrap_err(), CoreError::SameParty);
    }

    #[test]
    fn test_booking_cid_dedupes_retries() {
        let (coord, _) = coordinator();
        let mut req = booking(10_000);
        req.cid = Some(Uuid::new_v4());
        let first = coord.book(req.clone()).unwrap();
        let second = coord.book(req).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            coord
                .sessions_for(REQUESTER, SessionFilter::default())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_pay_without_funds() {
        let (coord, _) = coordinator();
        let session = coord.book(booking(50_000)).unwrap();
        coord.confirm(PROVIDER, session.id).unwrap();
        let err = coord.pay(REQUESTER, session.id).unwrap_err();
        assert_eq!(err, CoreError::InsufficientFunds);
        // Session stays payable
        let s = coord.session(REQUESTER, session.id).unwrap();
        assert_eq!(s.status, SessionStatus::Confirmed);
        assert_eq!(s.payment.escrow, EscrowState::Pending);
    }

    #[test]
    fn test_double_pay_rejected() {
        let (coord, _) = coordinator();
        coord
            .deposit(REQUESTER, 200_000, PaymentChannel::Upi)
            .unwrap();
        let session = coord.book(booking(50_000)).unwrap();
        coord.confirm(PROVIDER, session.id).unwrap();
        coord.pay(REQUESTER, session.id).unwrap();
        let err = coord.pay(REQUESTER, session.id).unwrap_err();
        assert_eq!(err, CoreError::AlreadyActioned("escrow already locked"));
        assert_eq!(coord.wallet_summary(REQUESTER).unwrap().pending_escrow, 50_000);
    }

    #[test]
    fn test_mid_flight_cancel_refunds_full_gross() {
        // 1500.00 locked, then cancelled: full amount back, no fee
        let (coord, _) = coordinator();
        let id = booked_and_funded(&coord, 150_000);
        coord.start(PROVIDER, id).unwrap();
        let s = coord
            .cancel(PROVIDER, id, "provider unavailable".to_string())
            .unwrap();
        assert_eq!(s.status, SessionStatus::Cancelled);
        assert_eq!(s.payment.escrow, EscrowState::Refunded);
        let w = coord.wallet_summary(REQUESTER).unwrap();
        assert_eq!(w.balance, 150_000);
        assert_eq!(w.pending_escrow, 0);
        assert_eq!(s.cancellation.as_ref().unwrap().cancelled_by, PROVIDER);
    }

    #[test]
    fn test_outsider_rejected() {
        let (coord, _) = coordinator();
        let session = coord.book(booking(10_000)).unwrap();
        assert_eq!(
            coord.confirm(777, session.id).unwrap_err(),
            CoreError::Unauthorized
        );
        assert_eq!(
            coord.session(777, session.id).unwrap_err(),
            CoreError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_no_show_dispute_flow() {
        let (coord, _) = coordinator();
        let id = booked_and_funded(&coord, 50_000);
        coord.start(PROVIDER, id).unwrap();

        let dispute = coord
            .open_dispute(
                REQUESTER,
                id,
                DisputeReason::NoShow,
                "provider never joined".to_string(),
                vec![],
            )
            .unwrap();
        assert_eq!(dispute.status, DisputeStatus::AutomaticReview);
        assert!(dispute.triage.confidence >= 90);
        assert_eq!(
            coord.session(REQUESTER, id).unwrap().status,
            SessionStatus::Disputed
        );

        // Frozen sessions reject normal transitions
        assert!(coord.end(REQUESTER, id).is_err());
        assert!(coord.cancel(REQUESTER, id, "x".to_string()).is_err());

        coord.escalate_dispute(ARBITER, dispute.dispute_id).unwrap();
        let resolved = coord
            .resolve_dispute(
                ARBITER,
                dispute.dispute_id,
                ResolutionKind::Refund,
                None,
                "no-show confirmed".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);

        let s = coord.session(REQUESTER, id).unwrap();
        assert_eq!(s.status, SessionStatus::Refunded);
        assert_eq!(s.payment.escrow, EscrowState::Refunded);
        assert_eq!(coord.wallet_summary(REQUESTER).unwrap().balance, 50_000);
    }

    #[tokio::test]
    async fn test_resolution_release_completes_and_hooks() {
        let (coord, hooks) = coordinator();
        let id = booked_and_funded(&coord, 50_000);
        let dispute = coord
            .open_dispute(
                PROVIDER,
                id,
                DisputeReason::PaymentIssue,
                "work done, payment contested".to_string(),
                vec![],
            )
            .unwrap();
        let resolved = coord
            .resolve_dispute(
                ARBITER,
                dispute.dispute_id,
                ResolutionKind::Release,
                None,
                "delivery verified".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(resolved.resolution.as_ref().unwrap().kind, ResolutionKind::Release);

        let s = coord.session(PROVIDER, id).unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(coord.wallet_summary(PROVIDER).unwrap().balance, 47_500);
        assert_eq!(hooks.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_refund_resolution() {
        // 1000.00 held: 400.00 back, 600.00 released at 5% => 570.00 net
        let (coord, _) = coordinator();
        let id = booked_and_funded(&coord, 100_000);
        let dispute = coord
            .open_dispute(
                REQUESTER,
                id,
                DisputeReason::ServiceIncomplete,
                "half the session delivered".to_string(),
                vec![],
            )
            .unwrap();
        coord
            .resolve_dispute(
                ARBITER,
                dispute.dispute_id,
                ResolutionKind::PartialRefund,
                Some(40_000),
                "partial delivery".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(coord.wallet_summary(REQUESTER).unwrap().balance, 40_000);
        assert_eq!(coord.wallet_summary(PROVIDER).unwrap().balance, 57_000);
        assert_eq!(
            coord.wallet_summary(crate::core_types::PLATFORM_ID).unwrap().balance,
            3_000
        );
        let s = coord.session(REQUESTER, id).unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_participant_cannot_resolve() {
        let (coord, _) = coordinator();
        let id = booked_and_funded(&coord, 50_000);
        let dispute = coord
            .open_dispute(REQUESTER, id, DisputeReason::Other, "".to_string(), vec![])
            .unwrap();
        let err = coord
            .resolve_dispute(
                REQUESTER,
                dispute.dispute_id,
                ResolutionKind::Refund,
                None,
                "".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::Unauthorized);
    }

    #[tokio::test]
    async fn test_appeal_reopens_then_arbitration_settles() {
        let (coord, _) = coordinator();
        let id = booked_and_funded(&coord, 50_000);
        let dispute = coord
            .open_dispute(
                REQUESTER,
                id,
                DisputeReason::PoorQuality,
                "".to_string(),
                vec![],
            )
            .unwrap();
        // First resolution dismisses; escrow returns, session cancelled
        coord
            .resolve_dispute(
                ARBITER,
                dispute.dispute_id,
                ResolutionKind::NoAction,
                None,
                "insufficient evidence".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(
            coord.session(REQUESTER, id).unwrap().status,
            SessionStatus::Cancelled
        );

        let appealed = coord
            .appeal_dispute(REQUESTER, dispute.dispute_id, "new evidence".to_string())
            .unwrap();
        assert_eq!(appealed.status, DisputeStatus::Arbitration);
        assert_eq!(
            coord.session(REQUESTER, id).unwrap().status,
            SessionStatus::Disputed
        );

        // Escrow already refunded: arbitration can only confirm refund
        let resolved = coord
            .resolve_dispute(
                ARBITER,
                dispute.dispute_id,
                ResolutionKind::Refund,
                None,
                "refund stands".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(
            coord.session(REQUESTER, id).unwrap().status,
            SessionStatus::Refunded
        );
        // No double refund
        assert_eq!(coord.wallet_summary(REQUESTER).unwrap().balance, 50_000);
    }

    #[test]
    fn test_rating_rules() {
        let (coord, _) = coordinator();
        let session = coord.book(booking(10_000)).unwrap();
        assert_eq!(
            coord.rate(REQUESTER, session.id, 6, None).unwrap_err(),
            CoreError::InvalidRating
        );
        // Not yet completed
        assert!(matches!(
            coord.rate(REQUESTER, session.id, 5, None).unwrap_err(),
            CoreError::StateViolation { .. }
        ));
    }

    #[test]
    fn test_session_listing_filters() {
        let (coord, _) = coordinator();
        coord.book(booking(10_000)).unwrap();
        let session = coord.book(booking(20_000)).unwrap();
        coord.confirm(PROVIDER, session.id).unwrap();

        let all = coord.sessions_for(REQUESTER, SessionFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let confirmed = coord
            .sessions_for(
                PROVIDER,
                SessionFilter {
                    role: Some(Role::Provider),
                    status: Some(SessionStatus::Confirmed),
                },
            )
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, session.id);

        assert!(coord.sessions_for(777, SessionFilter::default()).unwrap().is_empty());
    }
}
