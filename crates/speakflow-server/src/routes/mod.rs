pub mod audio;
pub mod health;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/audio", audio::router())
}
