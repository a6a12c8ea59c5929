use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::MatchmakingError;
use crate::matchmaking::{MatchRequest, Matchmaker};
use crate::registry::SessionRegistry;

#[derive(Clone)]
pub struct ApiState {
    pub matchmaker: Matchmaker,
    pub registry: Arc<SessionRegistry>,
}

#[derive(Serialize)]
struct SubmitResponse {
    accepted: bool,
    user_id: u64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn engine_error(e: MatchmakingError) -> Response {
    match e {
        MatchmakingError::InvalidRequest(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        MatchmakingError::EngineStopped => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/match", post(submit_handler))
        .route(
            "/api/match/:user_id",
            get(status_handler).delete(cancel_handler),
        )
        .route("/api/queue", get(queue_depth_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_api(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Matchmaking API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Accepts the request for the engine. The registry learns about it from
/// the engine's `Queued` event, never from here.
async fn submit_handler(
    State(state): State<ApiState>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Malformed match request");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };
    let user_id = request.user_id;

    match state.matchmaker.submit(request) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                accepted: true,
                user_id,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Match request rejected");
            engine_error(e)
        }
    }
}

async fn cancel_handler(State(state): State<ApiState>, Path(user_id): Path<u64>) -> Response {
    match state.matchmaker.cancel(user_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn status_handler(State(state): State<ApiState>, Path(user_id): Path<u64>) -> Response {
    match state.registry.get(user_id).await {
        Some(entry) => (StatusCode::OK, Json(entry)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("No match request known for user {}", user_id),
        ),
    }
}

async fn queue_depth_handler(State(state): State<ApiState>) -> Response {
    match state.matchmaker.queue_depth().await {
        Ok(depth) => (StatusCode::OK, Json(depth)).into_response(),
        Err(e) => engine_error(e),
    }
}
