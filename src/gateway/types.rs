//! Gateway wire types: the response envelope, error code mapping, and
//! request/response DTOs.
//!
//! Amounts cross the wire as decimal strings ("500.00") and are parsed
//! strictly at this boundary; everything past it works in paise.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core_types::UserId;
use crate::dispute::{Appeal, Dispute, DisputeReason, ResolutionKind, TimelineEvent};
use crate::error::CoreError;
use crate::ledger::{PaymentChannel, Transaction, TxKind, TxStatus, WalletSummary};
use crate::money::{self, MoneyError};
use crate::session::{InteractionKind, Session};

/// Envelope for every API response.
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: payload on success; on a rejected transition, the current
///   unchanged resource state when it could be fetched
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const BELOW_MINIMUM: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const FORBIDDEN: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const STATE_CONFLICT: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

/// Handler-level error: carries the HTTP status plus the envelope code.
///
/// `data` optionally holds the current (unchanged) resource view, so a
/// caller whose transition was rejected can resynchronize from the
/// error response itself.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn missing_auth() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: error_codes::MISSING_AUTH,
            msg: "X-User-Id header required".to_string(),
            data: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: error_codes::INVALID_PARAMETER,
            msg: msg.into(),
            data: None,
        }
    }

    /// Attach the current resource state to a rejection response.
    pub fn with_state<T: Serialize>(mut self, view: T) -> Self {
        self.data = serde_json::to_value(view).ok();
        self
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::SessionNotFound(_)
            | CoreError::DisputeNotFound(_)
            | CoreError::UserNotFound(_) => error_codes::NOT_FOUND,
            CoreError::Unauthorized | CoreError::WrongRole(_) => error_codes::FORBIDDEN,
            CoreError::SameParty | CoreError::InvalidAmount | CoreError::InvalidRating => {
                error_codes::INVALID_PARAMETER
            }
            CoreError::StateViolation { .. } | CoreError::AlreadyActioned(_) => {
                error_codes::STATE_CONFLICT
            }
            CoreError::InsufficientFunds => error_codes::INSUFFICIENT_BALANCE,
            CoreError::BelowMinimumWithdrawal => error_codes::BELOW_MINIMUM,
            CoreError::Storage(_) => error_codes::SERVICE_UNAVAILABLE,
        };
        let status = StatusCode::from_u16(err.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            code,
            msg: err.to_string(),
            data: None,
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            code: self.code,
            msg: self.msg,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Caller identity, taken from the `X-User-Id` header.
///
/// Stand-in for a real auth layer: upstream is expected to terminate
/// authentication and forward the verified user id.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<UserId>().ok())
            .map(CallerId)
            .ok_or_else(ApiError::missing_auth)
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookSessionRequest {
    pub provider_id: UserId,
    pub listing_id: Option<u64>,
    #[schema(example = "guitar")]
    pub skill: String,
    pub sub_skill: Option<String>,
    pub kind: InteractionKind,
    /// Decimal rupees, e.g. "500.00"
    #[schema(example = "500.00")]
    pub amount: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub is_online: bool,
    pub meeting_ref: Option<String>,
    /// Idempotency key for safe retries
    pub cid: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOutcomeRequest {
    pub confirmed: bool,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateRequest {
    #[schema(minimum = 1, maximum = 5)]
    pub stars: u8,
    pub review: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Decimal rupees, e.g. "1000.00"
    #[schema(example = "1000.00")]
    pub amount: String,
    pub channel: PaymentChannel,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    #[schema(example = "250.00")]
    pub amount: String,
    pub channel: PaymentChannel,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenDisputeRequest {
    pub reason: DisputeReason,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveDisputeRequest {
    pub kind: ResolutionKind,
    /// Required for partial_refund: decimal rupees returned to the payer
    pub refund_amount: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AppealRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TxListQuery {
    pub kind: Option<String>,
    pub from_ts: Option<i64>,
    pub to_ts: Option<i64>,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub session_id: u64,
    pub requester_id: UserId,
    pub provider_id: UserId,
    pub skill: String,
    pub kind: InteractionKind,
    pub status: String,
    #[schema(example = "500.00")]
    pub amount: String,
    pub platform_fee: String,
    pub provider_net: String,
    pub escrow_status: String,
    pub scheduled_at: DateTime<Utc>,
    pub requester_confirmed: bool,
    pub provider_confirmed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<Session> for SessionView {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.id,
            requester_id: s.requester,
            provider_id: s.provider,
            skill: s.skill,
            kind: s.kind,
            status: s.status.as_str().to_string(),
            amount: money::format_amount(s.payment.gross),
            platform_fee: money::format_amount(s.payment.platform_fee),
            provider_net: money::format_amount(s.payment.provider_net),
            escrow_status: s.payment.escrow.as_str().to_string(),
            scheduled_at: s.schedule.scheduled_at,
            requester_confirmed: s.requester_outcome.confirmed,
            provider_confirmed: s.provider_outcome.confirmed,
            completed_at: s.completed_at,
            version: s.version,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletView {
    pub user_id: UserId,
    #[schema(example = "1234.56")]
    pub balance: String,
    pub pending_escrow: String,
    pub total_earned: String,
    pub total_spent: String,
}

impl From<WalletSummary> for WalletView {
    fn from(w: WalletSummary) -> Self {
        Self {
            user_id: w.user_id,
            balance: money::format_amount(w.balance),
            pending_escrow: money::format_amount(w.pending_escrow),
            total_earned: money::format_amount(w.total_earned),
            total_spent: money::format_amount(w.total_spent),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionView {
    pub tx_id: u64,
    pub kind: String,
    /// Signed decimal rupees; negative means money left the wallet
    #[schema(example = "-500.00")]
    pub amount: String,
    pub status: TxStatus,
    pub session_id: Option<u64>,
    pub counterparty_id: Option<UserId>,
    pub created_at: i64,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            tx_id: tx.tx_id,
            kind: tx.kind.as_str().to_string(),
            amount: money::format_amount_signed(tx.amount),
            status: tx.status,
            session_id: tx.session_id,
            counterparty_id: tx.counterparty,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeView {
    pub dispute_id: u64,
    pub session_id: u64,
    pub raised_by: UserId,
    pub against: UserId,
    pub reason: String,
    pub description: String,
    pub status: String,
    pub triage_confidence: u8,
    pub triage_recommendation: String,
    pub disputed_amount: String,
    pub resolution: Option<ResolutionView>,
    pub timeline: Vec<TimelineEventView>,
    pub appealed: bool,
    pub created_at: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResolutionView {
    pub kind: String,
    pub amount: String,
    pub resolver_id: UserId,
    pub notes: String,
    pub resolved_at: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelineEventView {
    pub actor_id: UserId,
    pub action: String,
    pub note: String,
    pub at: i64,
}

impl From<TimelineEvent> for TimelineEventView {
    fn from(e: TimelineEvent) -> Self {
        Self {
            actor_id: e.actor,
            action: e.action,
            note: e.note,
            at: e.at,
        }
    }
}

impl From<Dispute> for DisputeView {
    fn from(d: Dispute) -> Self {
        Self {
            dispute_id: d.dispute_id,
            session_id: d.session_id,
            raised_by: d.raised_by,
            against: d.against,
            reason: d.reason.as_str().to_string(),
            description: d.description,
            status: d.status.as_str().to_string(),
            triage_confidence: d.triage.confidence,
            triage_recommendation: d.triage.recommendation,
            disputed_amount: money::format_amount(d.disputed_amount),
            resolution: d.resolution.map(|r| ResolutionView {
                kind: r.kind.as_str().to_string(),
                amount: money::format_amount(r.amount),
                resolver_id: r.resolver,
                notes: r.notes,
                resolved_at: r.resolved_at,
            }),
            timeline: d.timeline.into_iter().map(Into::into).collect(),
            appealed: matches!(d.appeal, Some(Appeal { .. })),
            created_at: d.created_at,
        }
    }
}

pub fn parse_session_status(s: &str) -> Result<crate::session::SessionStatus, ApiError> {
    use crate::session::SessionStatus::*;
    match s {
        "pending" => Ok(Pending),
        "confirmed" => Ok(Confirmed),
        "escrow_paid" => Ok(EscrowPaid),
        "in_progress" => Ok(InProgress),
        "outcome_pending" => Ok(OutcomePending),
        "disputed" => Ok(Disputed),
        "completed" => Ok(Completed),
        "cancelled" => Ok(Cancelled),
        "refunded" => Ok(Refunded),
        other => Err(ApiError::bad_request(format!(
            "unknown session status: {}",
            other
        ))),
    }
}

pub fn parse_role(s: &str) -> Result<crate::session::Role, ApiError> {
    match s {
        "requester" => Ok(crate::session::Role::Requester),
        "provider" => Ok(crate::session::Role::Provider),
        other => Err(ApiError::bad_request(format!("unknown role: {}", other))),
    }
}

pub fn parse_tx_kind(s: &str) -> Result<TxKind, ApiError> {
    match s {
        "payment" => Ok(TxKind::Payment),
        "escrow_lock" => Ok(TxKind::EscrowLock),
        "escrow_release" => Ok(TxKind::EscrowRelease),
        "withdrawal" => Ok(TxKind::Withdrawal),
        "refund" => Ok(TxKind::Refund),
        "commission" => Ok(TxKind::Commission),
        "fee" => Ok(TxKind::Fee),
        "bonus" => Ok(TxKind::Bonus),
        "reward" => Ok(TxKind::Reward),
        other => Err(ApiError::bad_request(format!(
            "unknown transaction kind: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_shapes() {
        let ok: ApiResponse<u32> = ApiResponse::success(7);
        assert_eq!(ok.code, 0);
        assert_eq!(ok.data, Some(7));

        let err = ApiResponse::<()>::error(error_codes::NOT_FOUND, "missing");
        assert_eq!(err.code, 4001);
        assert!(err.data.is_none());
    }

    #[test]
    fn test_core_error_mapping() {
        let api: ApiError = CoreError::InsufficientFunds.into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.code, error_codes::INSUFFICIENT_BALANCE);

        let api: ApiError = CoreError::SessionNotFound(5).into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.code, error_codes::NOT_FOUND);

        let api: ApiError = CoreError::AlreadyActioned("escrow already locked").into();
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code, error_codes::STATE_CONFLICT);
    }

    #[test]
    fn test_error_carries_current_state() {
        let api: ApiError = CoreError::StateViolation {
            status: "pending",
            action: "pay",
        }
        .into();
        assert!(api.data.is_none());

        let api = api.with_state(serde_json::json!({ "status": "pending" }));
        let data = api.data.as_ref().unwrap();
        assert_eq!(data["status"], "pending");
    }

    #[test]
    fn test_parse_tx_kind() {
        assert_eq!(parse_tx_kind("refund").unwrap(), TxKind::Refund);
        assert!(parse_tx_kind("teleport").is_err());
    }
}
