use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use serde_json::json;
use uuid::Uuid;

use super::state::AppState;
use crate::error::AppError;
use crate::models::account::Role;
use crate::services::token::{self, AccessClaims};

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Authentication required. Supply a Bearer token.",
            AuthError::InvalidToken => "The supplied token is invalid or has expired.",
        };

        let body = Json(json!({
            "error": format!("{:?}", self),
            "message": message,
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// The account acting on a request, taken from a verified bearer token
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub password_reset_required: bool,
}

impl From<AccessClaims> for CurrentAccount {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            password_reset_required: claims.pwd_reset,
        }
    }
}

impl CurrentAccount {
    /// Rejects with 403 unless the account holds at least `role`.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role.is_at_least(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "This operation requires the {:?} role.",
                role
            )))
        }
    }

    pub fn is(&self, account_id: Uuid) -> bool {
        self.id == account_id
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;

        let claims = token::verify_access_token(token, state.config.jwt_secret.expose_secret())
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            })?;

        Ok(CurrentAccount::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(value: &str) -> Parts {
        let request = Request::builder()
            .header(AUTHORIZATION, value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        let parts = parts_with_header("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&parts), Some("abc.def.ghi"));

        let parts = parts_with_header("Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&parts), None);

        let parts = Request::builder().body(()).unwrap().into_parts().0;
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_require_role() {
        let account = CurrentAccount {
            id: Uuid::new_v4(),
            name: "supervisor".to_string(),
            role: Role::Supervisor,
            password_reset_required: false,
        };

        assert!(account.require(Role::User).is_ok());
        assert!(account.require(Role::Supervisor).is_ok());
        assert!(matches!(
            account.require(Role::Administrator),
            Err(AppError::Forbidden(_))
        ));
    }
}
