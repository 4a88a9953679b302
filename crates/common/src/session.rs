use async_trait::async_trait;
use axum::{
    extract::FromRef,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the dashboard session token
pub const DEFAULT_SESSION_COOKIE: &str = "navisight_session";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Client,
    Worker,
}

/// Claims of a signed dashboard session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // user id
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, handed to request handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
}

impl UserIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<SessionClaims> for UserIdentity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Resolves the caller of a request to a user, if any
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<UserIdentity>;
}

/// Verifies HS256 session tokens locally, without a round trip to the auth backend
#[derive(Clone)]
pub struct JwtSessionVerifier {
    secret: String,
    cookie_name: String,
}

impl JwtSessionVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }

    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, String> {
        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid session token: {}", e))
    }

    /// Bearer token first, then the session cookie
    fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(auth) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = auth.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }

        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.to_string())
    }
}

#[async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<UserIdentity> {
        let token = self.extract_token(headers)?;
        match self.verify(&token) {
            Ok(claims) => Some(claims.into()),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}

/// Axum extractor for requiring a dashboard session
/// Usage: `RequireSession(user): RequireSession` in route handlers
pub struct RequireSession(pub UserIdentity);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
    Arc<dyn SessionVerifier>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<dyn SessionVerifier>::from_ref(state);
        verifier
            .authenticate(&parts.headers)
            .await
            .map(RequireSession)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "Unauthorized" })),
                )
                    .into_response()
            })
    }
}
