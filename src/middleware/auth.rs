use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{config::JwtConfig, dto::auth::Claims, error::AppError, models::Role, state::AppState};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// Privileged operations, checked in one place by [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageCatalog,
    ManageContent,
    ManageOrders,
    ReviewMessages,
}

impl Role {
    pub fn can(&self, capability: Capability) -> bool {
        match self {
            Role::Admin => true,
            Role::User => match capability {
                Capability::ManageCatalog
                | Capability::ManageContent
                | Capability::ManageOrders
                | Capability::ReviewMessages => false,
            },
        }
    }
}

pub fn authorize(user: &AuthUser, capability: Capability) -> Result<(), AppError> {
    if !user.role.can(capability) {
        tracing::debug!(user_id = %user.user_id, ?capability, "capability denied");
        return Err(AppError::Forbidden(
            "Access denied. Administrator privileges required.".into(),
        ));
    }
    Ok(())
}

pub fn decode_token(jwt: &JwtConfig, token: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;
    let role = decoded
        .claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized("Invalid role in token".into()))?;

    Ok(AuthUser { user_id, role })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        decode_token(&state.jwt, token)
    }
}
