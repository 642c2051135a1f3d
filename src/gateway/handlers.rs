//! HTTP handlers
//!
//! Thin adapters: parse the wire shapes, hand off to the coordinator,
//! translate the result back into the response envelope. All business
//! rules live behind the coordinator boundary.

use axum::extract::{Path, Query, State};
use axum::Json;

use super::state::AppState;
use super::types::{
    ok, ApiError, ApiResponse, ApiResult, AppealRequest, BookSessionRequest, CallerId,
    CancelRequest, DepositRequest, DisputeView, OpenDisputeRequest, RateRequest,
    ResolveDisputeRequest, SessionListQuery, SessionView, TransactionView, TxListQuery,
    VerifyOutcomeRequest, WalletView, WithdrawRequest,
};
use super::types::{parse_role, parse_session_status, parse_tx_kind};
use crate::coordinator::{BookingRequest, SessionFilter};
use crate::core_types::UserId;
use crate::dispute::ResolutionKind;
use crate::ledger::TxFilter;
use crate::money;
use crate::session::Schedule;

// Rejected transitions carry the current (unchanged) resource state so
// the caller can resynchronize without a follow-up fetch.
fn session_rejection(state: &AppState, caller: UserId, id: u64, err: ApiError) -> ApiError {
    match state.coordinator.session(caller, id) {
        Ok(s) => err.with_state(SessionView::from(s)),
        Err(_) => err,
    }
}

fn dispute_rejection(state: &AppState, caller: UserId, id: u64, err: ApiError) -> ApiError {
    match state.coordinator.dispute(caller, id) {
        Ok(d) => err.with_state(DisputeView::from(d)),
        Err(_) => err,
    }
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "Health"
)]
pub async fn health() -> &'static str {
    "ok"
}

// ============================================================================
// Sessions
// ============================================================================

/// Book a session with a provider
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    request_body = BookSessionRequest,
    responses(
        (status = 200, description = "Session created", body = ApiResponse<SessionView>),
        (status = 400, description = "Invalid amount or self-dealing"),
        (status = 401, description = "Missing caller identity")
    ),
    tag = "Sessions"
)]
pub async fn book_session(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<BookSessionRequest>,
) -> ApiResult<SessionView> {
    let gross = money::parse_amount(&req.amount)?;
    let session = state.coordinator.book(BookingRequest {
        requester: caller.0,
        provider: req.provider_id,
        listing: req.listing_id,
        skill: req.skill,
        sub_skill: req.sub_skill,
        kind: req.kind,
        gross,
        schedule: Schedule {
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
            is_online: req.is_online,
            meeting_ref: req.meeting_ref,
        },
        cid: req.cid,
    })?;
    ok(session.into())
}

/// Fetch one session (participants only)
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    params(("id" = u64, Path, description = "Session id")),
    responses(
        (status = 200, body = ApiResponse<SessionView>),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "No such session")
    ),
    tag = "Sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<SessionView> {
    ok(state.coordinator.session(caller.0, id)?.into())
}

/// List the caller's sessions, optionally filtered by role and status
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    params(
        ("role" = Option<String>, Query, description = "requester | provider"),
        ("status" = Option<String>, Query, description = "Session status filter")
    ),
    responses((status = 200, body = ApiResponse<Vec<SessionView>>)),
    tag = "Sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<Vec<SessionView>> {
    let filter = SessionFilter {
        role: query.role.as_deref().map(parse_role).transpose()?,
        status: query
            .status
            .as_deref()
            .map(parse_session_status)
            .transpose()?,
    };
    let sessions = state.coordinator.sessions_for(caller.0, filter)?;
    ok(sessions.into_iter().map(Into::into).collect())
}

/// Provider accepts the booking
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/confirm",
    params(("id" = u64, Path, description = "Session id")),
    responses(
        (status = 200, body = ApiResponse<SessionView>),
        (status = 403, description = "Caller is not the provider"),
        (status = 409, description = "Not pending")
    ),
    tag = "Sessions"
)]
pub async fn confirm_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .confirm(caller.0, id)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

/// Requester funds escrow for a confirmed session
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/pay",
    params(("id" = u64, Path, description = "Session id")),
    responses(
        (status = 200, body = ApiResponse<SessionView>),
        (status = 409, description = "Escrow already locked"),
        (status = 422, description = "Insufficient balance")
    ),
    tag = "Sessions"
)]
pub async fn pay_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .pay(caller.0, id)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

/// Mark the session started
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/start",
    params(("id" = u64, Path, description = "Session id")),
    responses((status = 200, body = ApiResponse<SessionView>)),
    tag = "Sessions"
)]
pub async fn start_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .start(caller.0, id)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

/// Mark the session ended; outcome verification begins
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/end",
    params(("id" = u64, Path, description = "Session id")),
    responses((status = 200, body = ApiResponse<SessionView>)),
    tag = "Sessions"
)]
pub async fn end_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .end(caller.0, id)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

/// Attest the outcome; the second positive attestation releases escrow
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/verify",
    params(("id" = u64, Path, description = "Session id")),
    request_body = VerifyOutcomeRequest,
    responses(
        (status = 200, body = ApiResponse<SessionView>),
        (status = 409, description = "Already attested or not awaiting outcome")
    ),
    tag = "Sessions"
)]
pub async fn verify_outcome(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
    Json(req): Json<VerifyOutcomeRequest>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .verify_outcome(caller.0, id, req.confirmed, req.feedback)
        .await
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

/// Cancel a session; locked escrow returns to the payer in full
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/cancel",
    params(("id" = u64, Path, description = "Session id")),
    request_body = CancelRequest,
    responses(
        (status = 200, body = ApiResponse<SessionView>),
        (status = 409, description = "Terminal or disputed")
    ),
    tag = "Sessions"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .cancel(caller.0, id, req.reason)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

/// Rate the counterparty after completion
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/rate",
    params(("id" = u64, Path, description = "Session id")),
    request_body = RateRequest,
    responses(
        (status = 200, body = ApiResponse<SessionView>),
        (status = 400, description = "Stars out of range"),
        (status = 409, description = "Not completed or already rated")
    ),
    tag = "Sessions"
)]
pub async fn rate_session(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
    Json(req): Json<RateRequest>,
) -> ApiResult<SessionView> {
    let session = state
        .coordinator
        .rate(caller.0, id, req.stars, req.review)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(session.into())
}

// ============================================================================
// Wallet
// ============================================================================

/// Credit external funds into the caller's wallet
#[utoipa::path(
    post,
    path = "/api/v1/wallet/deposit",
    request_body = DepositRequest,
    responses(
        (status = 200, body = ApiResponse<WalletView>),
        (status = 400, description = "Malformed amount")
    ),
    tag = "Wallet"
)]
pub async fn deposit(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<DepositRequest>,
) -> ApiResult<WalletView> {
    let amount = money::parse_amount(&req.amount)?;
    ok(state.coordinator.deposit(caller.0, amount, req.channel)?.into())
}

/// Withdraw available balance to an external destination
#[utoipa::path(
    post,
    path = "/api/v1/wallet/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 200, body = ApiResponse<WalletView>),
        (status = 422, description = "Below minimum or insufficient balance")
    ),
    tag = "Wallet"
)]
pub async fn withdraw(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<WalletView> {
    let amount = money::parse_amount(&req.amount)?;
    ok(state
        .coordinator
        .withdraw(caller.0, amount, req.channel)?
        .into())
}

/// Wallet summary: balance, pending escrow, lifetime totals
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    responses((status = 200, body = ApiResponse<WalletView>)),
    tag = "Wallet"
)]
pub async fn wallet_summary(
    State(state): State<AppState>,
    caller: CallerId,
) -> ApiResult<WalletView> {
    ok(state.coordinator.wallet_summary(caller.0)?.into())
}

/// Transaction history, filterable by kind and time window
#[utoipa::path(
    get,
    path = "/api/v1/wallet/transactions",
    params(
        ("kind" = Option<String>, Query, description = "Transaction kind filter"),
        ("from_ts" = Option<i64>, Query, description = "Inclusive lower bound, epoch millis"),
        ("to_ts" = Option<i64>, Query, description = "Inclusive upper bound, epoch millis")
    ),
    responses((status = 200, body = ApiResponse<Vec<TransactionView>>)),
    tag = "Wallet"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<TxListQuery>,
) -> ApiResult<Vec<TransactionView>> {
    let filter = TxFilter {
        kind: query.kind.as_deref().map(parse_tx_kind).transpose()?,
        from_ts: query.from_ts,
        to_ts: query.to_ts,
    };
    let txs = state.coordinator.transactions(caller.0, filter)?;
    ok(txs.into_iter().map(Into::into).collect())
}

// ============================================================================
// Disputes
// ============================================================================

/// Open a dispute; the session freezes until resolution
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/disputes",
    params(("id" = u64, Path, description = "Session id")),
    request_body = OpenDisputeRequest,
    responses(
        (status = 200, body = ApiResponse<DisputeView>),
        (status = 409, description = "Session already terminal or disputed")
    ),
    tag = "Disputes"
)]
pub async fn open_dispute(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
    Json(req): Json<OpenDisputeRequest>,
) -> ApiResult<DisputeView> {
    let dispute = state
        .coordinator
        .open_dispute(caller.0, id, req.reason, req.description, req.evidence)
        .map_err(|e| session_rejection(&state, caller.0, id, e.into()))?;
    ok(dispute.into())
}

/// Fetch one dispute (participants only)
#[utoipa::path(
    get,
    path = "/api/v1/disputes/{id}",
    params(("id" = u64, Path, description = "Dispute id")),
    responses(
        (status = 200, body = ApiResponse<DisputeView>),
        (status = 404, description = "No such dispute")
    ),
    tag = "Disputes"
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<DisputeView> {
    ok(state.coordinator.dispute(caller.0, id)?.into())
}

/// List disputes the caller is a party to
#[utoipa::path(
    get,
    path = "/api/v1/disputes",
    responses((status = 200, body = ApiResponse<Vec<DisputeView>>)),
    tag = "Disputes"
)]
pub async fn list_disputes(
    State(state): State<AppState>,
    caller: CallerId,
) -> ApiResult<Vec<DisputeView>> {
    let disputes = state.coordinator.disputes_for(caller.0)?;
    ok(disputes.into_iter().map(Into::into).collect())
}

/// Move an automatic-review case into manual review
#[utoipa::path(
    post,
    path = "/api/v1/disputes/{id}/escalate",
    params(("id" = u64, Path, description = "Dispute id")),
    responses((status = 200, body = ApiResponse<DisputeView>)),
    tag = "Disputes"
)]
pub async fn escalate_dispute(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<DisputeView> {
    let dispute = state
        .coordinator
        .escalate_dispute(caller.0, id)
        .map_err(|e| dispute_rejection(&state, caller.0, id, e.into()))?;
    ok(dispute.into())
}

/// Resolve a dispute: settles the ledger and terminates the session
#[utoipa::path(
    post,
    path = "/api/v1/disputes/{id}/resolve",
    params(("id" = u64, Path, description = "Dispute id")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, body = ApiResponse<DisputeView>),
        (status = 403, description = "Resolver is a party to the dispute"),
        (status = 409, description = "Not in a resolvable state")
    ),
    tag = "Disputes"
)]
pub async fn resolve_dispute(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
    Json(req): Json<ResolveDisputeRequest>,
) -> ApiResult<DisputeView> {
    let refund_amount = match (&req.kind, &req.refund_amount) {
        (ResolutionKind::PartialRefund, Some(raw)) => Some(money::parse_amount(raw)?),
        (ResolutionKind::PartialRefund, None) => {
            return Err(ApiError::bad_request(
                "partial_refund requires refund_amount",
            ));
        }
        _ => None,
    };
    let dispute = state
        .coordinator
        .resolve_dispute(caller.0, id, req.kind, refund_amount, req.notes)
        .await
        .map_err(|e| dispute_rejection(&state, caller.0, id, e.into()))?;
    ok(dispute.into())
}

/// Appeal a resolved dispute (once); reopens into arbitration
#[utoipa::path(
    post,
    path = "/api/v1/disputes/{id}/appeal",
    params(("id" = u64, Path, description = "Dispute id")),
    request_body = AppealRequest,
    responses(
        (status = 200, body = ApiResponse<DisputeView>),
        (status = 409, description = "Not resolved, or already appealed")
    ),
    tag = "Disputes"
)]
pub async fn appeal_dispute(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
    Json(req): Json<AppealRequest>,
) -> ApiResult<DisputeView> {
    let dispute = state
        .coordinator
        .appeal_dispute(caller.0, id, req.reason)
        .map_err(|e| dispute_rejection(&state, caller.0, id, e.into()))?;
    ok(dispute.into())
}

/// Close a resolved dispute
#[utoipa::path(
    post,
    path = "/api/v1/disputes/{id}/close",
    params(("id" = u64, Path, description = "Dispute id")),
    responses((status = 200, body = ApiResponse<DisputeView>)),
    tag = "Disputes"
)]
pub async fn close_dispute(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<u64>,
) -> ApiResult<DisputeView> {
    let dispute = state
        .coordinator
        .close_dispute(caller.0, id)
        .map_err(|e| dispute_rejection(&state, caller.0, id, e.into()))?;
    ok(dispute.into())
}
