//! Role gate for the API. Token issuance and the OIDC flow live outside this
//! service; requests arrive with a bearer token whose `role` claim is
//! verified here. With `AUTH_MODE=none` every request is treated as admin.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::config::AuthMode;
use crate::server::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Viewer,
    Operator,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "operator" => Role::Operator,
            _ => Role::Viewer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    pub exp: usize,
}

/// Authenticated request context, inserted by [`authenticate`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub role: Role,
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = &state.auth;

    if auth.mode == AuthMode::None {
        request.extensions_mut().insert(AuthContext {
            subject: "anonymous".to_string(),
            role: Role::Admin,
        });
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized("missing bearer token");
    };

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    );

    match decoded {
        Ok(data) => {
            request.extensions_mut().insert(AuthContext {
                subject: data.claims.sub,
                role: Role::parse(&data.claims.role),
            });
            next.run(request).await
        }
        Err(err) => unauthorized(&format!("invalid token: {err}")),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

fn role_of(request: &Request) -> Role {
    request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.role)
        .unwrap_or(Role::Viewer)
}

pub async fn require_operator(request: Request, next: Next) -> Response {
    if role_of(&request) < Role::Operator {
        return forbidden();
    }
    next.run(request).await
}

pub async fn require_admin(request: Request, next: Next) -> Response {
    if role_of(&request) < Role::Admin {
        return forbidden();
    }
    next.run(request).await
}

fn forbidden() -> Response {
    (
        axum::http::StatusCode::FORBIDDEN,
        axum::Json(serde_json::json!({ "error": "insufficient role" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Viewer < Role::Operator);
        assert!(Role::Operator < Role::Admin);
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("unknown"), Role::Viewer);
    }
}
