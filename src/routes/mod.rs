mod health;
mod me;
pub mod token;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/token", post(token::handler))
        .route("/me", get(me::handler))
        .with_state(state)
}
