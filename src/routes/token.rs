use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;

use crate::{
    error::AuthError,
    grant::AuthInfo,
    middleware::bearer::BearerToken,
    oauth::GrantRequest,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    grant_type: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
    refresh_token: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::BadRequest(format!("{name} parameter is required")))
}

impl TokenRequest {
    pub fn into_grant(self) -> Result<GrantRequest, AuthError> {
        let grant_type = required(self.grant_type, "grant_type")?;

        match grant_type.as_str() {
            "password" => Ok(GrantRequest::Password {
                client_id: required(self.client_id, "client_id")?,
                client_secret: self.client_secret,
                username: required(self.username, "username")?,
                password: required(self.password, "password")?,
            }),
            "refresh_token" => Ok(GrantRequest::RefreshToken {
                client_id: required(self.client_id, "client_id")?,
                client_secret: self.client_secret,
                refresh_token: required(self.refresh_token, "refresh_token")?,
            }),
            _ => Err(AuthError::UnsupportedGrantType(grant_type)),
        }
    }
}

/// Token request body, accepted as either JSON or a urlencoded form.
pub struct TokenRequestBody(pub TokenRequest);

impl<S> FromRequest<S> for TokenRequestBody
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<TokenRequest>::from_request(req, state)
                .await
                .map_err(|e| AuthError::BadRequest(e.body_text()))?;
            Ok(Self(body))
        } else {
            let Form(body) = Form::<TokenRequest>::from_request(req, state)
                .await
                .map_err(|e| AuthError::BadRequest(e.body_text()))?;
            Ok(Self(body))
        }
    }
}

fn cache_control_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers
}

pub async fn handler(
    State(state): State<AppState>,
    BearerToken(previous_access_token): BearerToken,
    TokenRequestBody(body): TokenRequestBody,
) -> Result<Response, AuthError> {
    let grant = body.into_grant()?;
    let auth_info = AuthInfo {
        access_token: previous_access_token,
    };

    let response = state.oauth.exchange(grant, auth_info).await?;

    Ok((StatusCode::OK, cache_control_headers(), Json(response)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{body::Body, http::Request, Router};
    use lambda_http::tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        config::Config,
        credentials::hash_password,
        db::{client::ClientTable, refresh_token::RefreshTokenTable, user::UserTable},
        token::{expires_in, now_millis, ONE_HOUR_SECS},
    };

    async fn test_state() -> AppState {
        let db = crate::db::memory();
        db.add_client(ClientTable::new_public("admin-app", "Admin"))
            .await
            .unwrap();
        db.add_user(UserTable {
            id: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
            password_hash: hash_password("Correct-Horse-1").unwrap(),
            status: Default::default(),
        })
        .await
        .unwrap();
        AppState::with_database(db, &Config::default()).await
    }

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/token", axum::routing::post(handler))
            .with_state(state)
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/token")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_into_grant_requires_fields() {
        let request = TokenRequest {
            grant_type: Some("password".into()),
            client_id: Some("admin-app".into()),
            username: Some("owner@example.com".into()),
            ..Default::default()
        };
        assert_eq!(
            request.into_grant(),
            Err(AuthError::BadRequest("password parameter is required".into()))
        );
    }

    #[test]
    fn test_into_grant_rejects_unknown_grant_type() {
        let request = TokenRequest {
            grant_type: Some("authorization_code".into()),
            ..Default::default()
        };
        assert_eq!(
            request.into_grant(),
            Err(AuthError::UnsupportedGrantType("authorization_code".into()))
        );
    }

    #[tokio::test]
    async fn test_password_grant_success() {
        let app = test_router(test_state().await);

        let response = app
            .oneshot(form_request(
                "grant_type=password&client_id=admin-app&username=owner%40example.com&password=Correct-Horse-1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        assert_eq!(response.headers().get("Pragma").unwrap(), "no-cache");

        let json = json_body(response).await;
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
        assert!(json["access_token"].is_string());
        assert!(json["refresh_token"].is_string());
    }

    #[tokio::test]
    async fn test_password_grant_accepts_json() {
        let app = test_router(test_state().await);

        let body = serde_json::json!({
            "grant_type": "password",
            "client_id": "admin-app",
            "username": "owner@example.com",
            "password": "Correct-Horse-1",
        });
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_password_grant_wrong_password() {
        let app = test_router(test_state().await);

        let response = app
            .oneshot(form_request(
                "grant_type=password&client_id=admin-app&username=owner%40example.com&password=nope",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_body(response).await;
        assert_eq!(json["error"], "access_denied");
    }

    #[tokio::test]
    async fn test_refresh_grant_uses_bearer_header_as_superseded_token() {
        let state = test_state().await;
        let client = state
            .db
            .find_client_by_slug("admin-app")
            .await
            .unwrap()
            .unwrap();
        let user_id = Uuid::new_v4();
        state
            .db
            .add_refresh_token(&RefreshTokenTable {
                token: "refresh-value".to_string(),
                user_id,
                client_id: client.id,
                expires: expires_in(ONE_HOUR_SECS),
            })
            .await
            .unwrap();
        state
            .db
            .add_access_token(&crate::db::access_token::AccessTokenTable {
                token: "old-access".to_string(),
                user_id,
                client_id: client.id,
                expires: expires_in(ONE_HOUR_SECS),
            })
            .await
            .unwrap();
        let app = test_router(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Authorization", "Bearer old-access")
            .body(Body::from(
                "grant_type=refresh_token&client_id=admin-app&refresh_token=refresh-value",
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["expires_in"], 2_628_000);
        assert!(json.get("refresh_token").is_none());

        let old = state
            .db
            .find_access_token("old-access")
            .await
            .unwrap()
            .unwrap();
        assert!(old.expires <= now_millis() + 5 * 60 * 1000);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_param() {
        let app = test_router(test_state().await);

        let response = app
            .oneshot(form_request("grant_type=refresh_token&client_id=admin-app"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let app = test_router(test_state().await);

        let response = app
            .oneshot(form_request("grant_type=client_credentials&client_id=admin-app"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_malformed_json_body() {
        let app = test_router(test_state().await);

        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "invalid_request");
    }
}
