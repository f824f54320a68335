use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::AssignmentError;
use crate::session::{AssignmentSession, SessionView};
use crate::snapshot::SnapshotSource;
use crate::types::{AssignmentInput, Preview};

#[derive(Clone)]
struct ApiState {
    session: Arc<AssignmentSession>,
    snapshots: Arc<dyn SnapshotSource>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<AssignmentError> for ApiError {
    fn from(error: AssignmentError) -> Self {
        let status = match &error {
            AssignmentError::NotInitialized => StatusCode::PRECONDITION_REQUIRED,
            AssignmentError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AssignmentError::RequestInFlight => StatusCode::CONFLICT,
            AssignmentError::MalformedResponse(_) | AssignmentError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            AssignmentError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse { ok: true, data }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct CredentialRequest {
    key: String,
}

/// Either an inline snapshot or a store/date pair resolved by the snapshot source.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PreviewRequest {
    Inline {
        snapshot: AssignmentInput,
    },
    Stored {
        #[serde(rename = "storeId")]
        store_id: String,
        date: NaiveDate,
    },
}

pub fn router(session: Arc<AssignmentSession>, snapshots: Arc<dyn SnapshotSource>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/api/health", get(health))
        .route("/api/session", get(session_view))
        .route("/api/credential", post(set_credential).delete(clear_credential))
        .route("/api/preview", post(request_preview).delete(clear_preview))
        .layer(cors)
        .with_state(ApiState { session, snapshots })
}

pub async fn run_server(
    session: Arc<AssignmentSession>,
    snapshots: Arc<dyn SnapshotSource>,
    addr: SocketAddr,
) -> Result<()> {
    let app = router(session, snapshots);
    info!("starting shift-fill API on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn session_view(State(state): State<ApiState>) -> ApiResult<SessionView> {
    ok(state.session.view())
}

async fn set_credential(
    State(state): State<ApiState>,
    Json(body): Json<CredentialRequest>,
) -> ApiResult<SessionView> {
    if body.key.trim().is_empty() {
        return Err(ApiError::bad_request("key must not be empty"));
    }
    state.session.set_credential(body.key.trim()).await?;
    ok(state.session.view())
}

async fn clear_credential(State(state): State<ApiState>) -> ApiResult<SessionView> {
    state.session.clear_credential()?;
    ok(state.session.view())
}

async fn request_preview(
    State(state): State<ApiState>,
    Json(body): Json<PreviewRequest>,
) -> ApiResult<Preview> {
    let input = match body {
        PreviewRequest::Inline { snapshot } => snapshot,
        PreviewRequest::Stored { store_id, date } => state
            .snapshots
            .load_day(&store_id, date)
            .await
            .map_err(ApiError::internal)?,
    };
    let preview = state.session.request_assignment(&input).await?;
    ok(preview)
}

async fn clear_preview(State(state): State<ApiState>) -> ApiResult<SessionView> {
    state.session.clear_preview();
    ok(state.session.view())
}
