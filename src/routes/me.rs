use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{error::AuthError, middleware::bearer::AuthenticatedToken, state::AppState};

/// Describe the user and client behind the presented access token.
pub async fn handler(
    State(state): State<AppState>,
    AuthenticatedToken { token }: AuthenticatedToken,
) -> Result<Json<Value>, AuthError> {
    let user = state
        .db
        .find_user_by_id(token.user_id)
        .await?
        .ok_or_else(|| AuthError::NoPermission("user no longer exists".to_string()))?;

    Ok(Json(json!({
        "user_id": user.id,
        "email": user.email,
        "client_id": token.client_id,
        "expires": token.expires,
    })))
}
