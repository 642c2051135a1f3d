//! OpenAPI 3.0 documentation
//!
//! JSON document served at `/api-docs/openapi.json`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::types::{
    AppealRequest, BookSessionRequest, CancelRequest, DepositRequest, DisputeView,
    OpenDisputeRequest, RateRequest, ResolutionView, ResolveDisputeRequest, SessionView,
    TimelineEventView, TransactionView, VerifyOutcomeRequest, WalletView, WithdrawRequest,
};

/// Forwarded-identity header scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id_header",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-User-Id",
                    "Verified user id forwarded by the authenticating proxy",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SkillPay Escrow API",
        version = "1.0.0",
        description = "Escrow-backed session marketplace: booking lifecycle, escrow ledger, dispute resolution.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health,
        crate::gateway::handlers::book_session,
        crate::gateway::handlers::get_session,
        crate::gateway::handlers::list_sessions,
        crate::gateway::handlers::confirm_session,
        crate::gateway::handlers::pay_session,
        crate::gateway::handlers::start_session,
        crate::gateway::handlers::end_session,
        crate::gateway::handlers::verify_outcome,
        crate::gateway::handlers::cancel_session,
        crate::gateway::handlers::rate_session,
        crate::gateway::handlers::deposit,
        crate::gateway::handlers::withdraw,
        crate::gateway::handlers::wallet_summary,
        crate::gateway::handlers::list_transactions,
        crate::gateway::handlers::open_dispute,
        crate::gateway::handlers::get_dispute,
        crate::gateway::handlers::list_disputes,
        crate::gateway::handlers::escalate_dispute,
        crate::gateway::handlers::resolve_dispute,
        crate::gateway::handlers::appeal_dispute,
        crate::gateway::handlers::close_dispute,
    ),
    components(schemas(
        BookSessionRequest,
        VerifyOutcomeRequest,
        CancelRequest,
        RateRequest,
        DepositRequest,
        WithdrawRequest,
        OpenDisputeRequest,
        ResolveDisputeRequest,
        AppealRequest,
        SessionView,
        WalletView,
        TransactionView,
        DisputeView,
        ResolutionView,
        TimelineEventView,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Sessions", description = "Booking lifecycle and outcome verification"),
        (name = "Wallet", description = "Deposits, withdrawals, and transaction history"),
        (name = "Disputes", description = "Dispute triage, resolution, and appeals"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/api/v1/sessions"));
        assert!(json.contains("/api/v1/disputes/{id}/resolve"));
        assert!(json.contains("SkillPay"));
    }
}
