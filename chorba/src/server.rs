// HTTP boundary for single-page recipe extraction

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chorba_core::{Recipe, RecipeScraper};
use chorba_scanner::ScanError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<RecipeScraper>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeQuery {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub recipe: Option<Recipe>,
}

/// Error surfaced to HTTP clients as `{"error": ...}`
pub struct ApiError(ScanError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScanError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(scraper: Arc<RecipeScraper>) -> Router {
    Router::new()
        .route("/recipe", get(extract_recipe))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { scraper })
}

pub async fn serve(bind: SocketAddr, scraper: Arc<RecipeScraper>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(scraper)).await?;
    Ok(())
}

async fn extract_recipe(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<RecipeResponse>, ApiError> {
    match state.scraper.scrape_from_url(&query.url).await {
        Ok(recipe) => Ok(Json(RecipeResponse { recipe })),
        Err(e) => {
            warn!("Extraction failed for {}: {}", query.url, e);
            Err(ApiError(e))
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
