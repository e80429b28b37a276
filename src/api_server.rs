// Axum API Server Module
//
// Purpose: REST surface over the key scorer (evaluate, justify, matrix summary)
// Performance target: <150ms per evaluation on matrices of a few thousand cells

#[cfg(feature = "api")]
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};

#[cfg(feature = "api")]
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};

#[cfg(feature = "api")]
use serde::Deserialize;

#[cfg(feature = "api")]
use std::path::Path;

#[cfg(feature = "api")]
use std::sync::Arc;

#[cfg(feature = "api")]
use crate::matrix::TraitKind;

#[cfg(feature = "api")]
use crate::options::AlgoOptions;

#[cfg(feature = "api")]
use crate::scorer::{EvaluateRequest, EvaluateResult, KeyScorer};

#[cfg(feature = "api")]
use crate::justification::Justification;

#[cfg(feature = "api")]
use crate::selection::Selection;

// ============================================================================
// Application State
// ============================================================================

#[cfg(feature = "api")]
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<KeyScorer>,
}

#[cfg(feature = "api")]
impl AppState {
    /// Load the matrix (and optional default options) from disk
    pub fn new(matrix_path: &str, options_path: Option<&str>) -> anyhow::Result<Self> {
        tracing::info!("Initializing key scorer...");
        let scorer = KeyScorer::load(Path::new(matrix_path), options_path.map(Path::new))?;
        Ok(Self::from_scorer(scorer))
    }

    pub fn from_scorer(scorer: KeyScorer) -> Self {
        Self {
            scorer: Arc::new(scorer),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

#[cfg(feature = "api")]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Matrix summary (trait and taxon lists for the client)
        .route("/api/matrix", get(get_matrix))

        // Scoring endpoints
        .route("/api/evaluate", post(evaluate))
        .route("/api/justify", post(justify))

        // Middleware (applied in reverse order)
        .layer(CompressionLayer::new()) // gzip + brotli compression
        .layer(CorsLayer::permissive()) // Allow all origins (adjust for production)
        .layer(TraceLayer::new_for_http()) // Request logging
        .with_state(state)
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

#[cfg(feature = "api")]
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[cfg(feature = "api")]
async fn get_matrix(State(state): State<AppState>) -> Json<serde_json::Value> {
    let matrix = state.scorer.matrix();

    let traits: Vec<serde_json::Value> = matrix
        .traits
        .iter()
        .map(|t| {
            serde_json::json!({
                "id": t.id,
                "name": t.display_name(),
                "group": t.group,
                "type": t.kind,
                "parent": t.parent_id,
                "state": t.parent_id.as_ref().map(|_| t.state_label()),
                "states": t.allowed_states,
                "minValue": t.min_value,
                "maxValue": t.max_value,
                "isInteger": t.is_integer,
                "difficulty": t.difficulty,
                "risk": t.risk,
                "helpText": t.help_text,
            })
        })
        .collect();

    let taxa: Vec<serde_json::Value> = matrix
        .taxa
        .iter()
        .map(|tx| serde_json::json!({ "id": tx.id, "name": tx.name }))
        .collect();

    let n_continuous = matrix.traits.iter().filter(|t| t.kind == TraitKind::Continuous).count();

    Json(serde_json::json!({
        "name": matrix.name,
        "traitCount": traits.len(),
        "continuousTraitCount": n_continuous,
        "taxonCount": taxa.len(),
        "traits": traits,
        "taxa": taxa,
    }))
}

#[cfg(feature = "api")]
async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluateResult>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    // CPU-bound work: run in blocking thread pool
    let scorer = state.scorer.clone();
    let result = tokio::task::spawn_blocking(move || scorer.evaluate(&request))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?;

    Ok(Json(result))
}

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JustifyRequest {
    taxon_id: String,
    #[serde(flatten)]
    selection: Selection,
    #[serde(default)]
    opts: Option<AlgoOptions>,
}

#[cfg(feature = "api")]
async fn justify(
    State(state): State<AppState>,
    payload: Result<Json<JustifyRequest>, JsonRejection>,
) -> Result<Json<Justification>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let scorer = state.scorer.clone();
    let taxon_id = request.taxon_id.clone();
    let result = tokio::task::spawn_blocking(move || {
        scorer.justify(&request.taxon_id, &request.selection, request.opts.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?;

    result
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Taxon {} not found", taxon_id)))
}

// ============================================================================
// Error Handling
// ============================================================================

#[cfg(feature = "api")]
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    NotFound(String),
}

#[cfg(feature = "api")]
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
