use {
    axum::{
        extract::{Request, State},
        http::header::AUTHORIZATION,
        middleware::Next,
        response::{IntoResponse, Response},
    },
    subtle::ConstantTimeEq,
    tracing::debug,
};

use crate::{error::ApiError, server::AppState};

// ── Types ────────────────────────────────────────────────────────────────────

/// Resolved control-surface auth. No token means POST endpoints are open.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAuth {
    pub token: Option<String>,
}

impl ResolvedAuth {
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

/// Result of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub ok: bool,
    pub reason: Option<&'static str>,
}

impl AuthResult {
    fn allow() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn deny(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

// ── Auth logic ───────────────────────────────────────────────────────────────

/// Resolve the API token. The environment (`ZAHRA_API_TOKEN`) wins over the
/// config file; empty values count as unset.
pub fn resolve_auth(config_token: Option<String>, env_token: Option<String>) -> ResolvedAuth {
    let token = env_token
        .filter(|t| !t.is_empty())
        .or(config_token.filter(|t| !t.is_empty()));
    ResolvedAuth { token }
}

/// Check an `Authorization` header value against the configured token.
pub fn authorize(auth: &ResolvedAuth, header: Option<&str>) -> AuthResult {
    let Some(expected) = auth.token.as_deref() else {
        return AuthResult::allow();
    };
    let Some(header) = header else {
        return AuthResult::deny("token_missing");
    };
    let Some(given) = header.strip_prefix("Bearer ") else {
        return AuthResult::deny("token_malformed");
    };
    if !bool::from(given.trim().as_bytes().ct_eq(expected.as_bytes())) {
        return AuthResult::deny("token_mismatch");
    }
    AuthResult::allow()
}

/// Middleware guarding mutating endpoints.
pub(crate) async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let result = authorize(&state.gateway.auth, header);
    if !result.ok {
        debug!(reason = ?result.reason, path = %req.uri().path(), "rejected unauthenticated request");
        return ApiError::unauthorized().into_response();
    }
    next.run(req).await
}
