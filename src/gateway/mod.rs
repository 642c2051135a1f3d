//! HTTP gateway: axum router over the session coordinator

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use utoipa::OpenApi;

use crate::coordinator::SessionCoordinator;
use state::AppState;

pub fn build_router(coordinator: Arc<SessionCoordinator>) -> Router {
    let state = AppState::new(coordinator);

    let session_routes = Router::new()
        .route("/sessions", post(handlers::book_session))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/confirm", post(handlers::confirm_session))
        .route("/sessions/{id}/pay", post(handlers::pay_session))
        .route("/sessions/{id}/start", post(handlers::start_session))
        .route("/sessions/{id}/end", post(handlers::end_session))
        .route("/sessions/{id}/verify", post(handlers::verify_outcome))
        .route("/sessions/{id}/cancel", post(handlers::cancel_session))
        .route("/sessions/{id}/rate", post(handlers::rate_session))
        .route("/sessions/{id}/disputes", post(handlers::open_dispute));

    let wallet_routes = Router::new()
        .route("/wallet", get(handlers::wallet_summary))
        .route("/wallet/deposit", post(handlers::deposit))
        .route("/wallet/withdraw", post(handlers::withdraw))
        .route("/wallet/transactions", get(handlers::list_transactions));

    let dispute_routes = Router::new()
        .route("/disputes", get(handlers::list_disputes))
        .route("/disputes/{id}", get(handlers::get_dispute))
        .route("/disputes/{id}/escalate", post(handlers::escalate_dispute))
        .route("/disputes/{id}/resolve", post(handlers::resolve_dispute))
        .route("/disputes/{id}/appeal", post(handlers::appeal_dispute))
        .route("/disputes/{id}/close", post(handlers::close_dispute));

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(openapi::ApiDoc::openapi()) }),
        )
        .nest(
            "/api/v1",
            session_routes.merge(wallet_routes).merge(dispute_routes),
        )
        .with_state(state)
}

pub async fn serve(
    coordinator: Arc<SessionCoordinator>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let app = build_router(coordinator);
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("gateway listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
