use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server state was built.
    pub uptime: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn service_info() -> Json<Value> {
    Json(json!({
        "name": "speakflow",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /api/health",
            "processAudio": "POST /api/audio/process",
            "getConversation": "GET /api/audio/conversation/{sessionId}",
            "translate": "POST /api/audio/translate",
            "guide": "GET /api/audio/guide",
            "tts": {
                "generate": "POST /api/audio/tts/generate",
                "status": "GET /api/audio/tts/status"
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Server is running",
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}
