use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::{db::access_token::AccessTokenTable, state::AppState, token::now_millis};

/// Pull the bearer token a request presents, if any.
///
/// An `Authorization` header whose scheme is `Bearer` (any case) wins;
/// otherwise the `access_token` query parameter is used.
pub fn extract_bearer_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|value| {
            let mut parts = value.split_whitespace();
            let scheme = parts.next()?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return None;
            }
            parts.next().map(str::to_string)
        });

    from_header.or_else(|| {
        let query = uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| *key == "access_token")
            .map(|(_, value)| value.into_owned())
    })
}

/// The bearer token presented with a request, which may be absent.
pub struct BearerToken(pub Option<String>);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(BearerToken(extract_bearer_token(&parts.headers, &parts.uri)))
    }
}

/// A request authenticated by a stored, unexpired access token.
pub struct AuthenticatedToken {
    pub token: AccessTokenTable,
}

pub struct BearerError(String);

impl IntoResponse for BearerError {
    fn into_response(self) -> Response {
        let www_auth = format!(
            "Bearer error=\"invalid_token\", error_description=\"{}\"",
            self.0
        );
        (
            StatusCode::UNAUTHORIZED,
            [(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_str(&www_auth)
                    .unwrap_or_else(|_| HeaderValue::from_static("Bearer error=\"invalid_token\"")),
            )],
            self.0,
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedToken
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = BearerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let value = extract_bearer_token(&parts.headers, &parts.uri)
            .ok_or_else(|| BearerError("missing bearer token".into()))?;

        let token = state
            .db
            .find_access_token(&value)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "access token lookup failed");
                BearerError("token lookup failed".into())
            })?
            .ok_or_else(|| BearerError("unknown access token".into()))?;

        if token.is_expired(now_millis()) {
            return Err(BearerError("access token expired".into()));
        }

        Ok(AuthenticatedToken { token })
    }
}
