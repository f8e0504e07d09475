use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{
    audit,
    config::JwtConfig,
    dto::auth::{AuthResponse, Claims, LoginRequest, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, User},
    response::{ApiResponse, Meta},
    services::{is_unique_violation, non_blank, require},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let username = require(non_blank(payload.username), "Username is required.")?;
    let email = require(non_blank(payload.email), "Email is required.")?.to_lowercase();
    let password = require(payload.password.filter(|p| !p.is_empty()), "Password is required.")?;

    let exists = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Email.eq(email.as_str()))
                .add(UserCol::Username.eq(username.as_str())),
        )
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(&password)?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(Role::User.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| {
        // Lost a race with a concurrent registration.
        if is_unique_violation(&err) {
            AppError::Conflict("User already exists".into())
        } else {
            err.into()
        }
    })?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let data = auth_response(&state.jwt, user)?;
    Ok(ApiResponse::success("User registered successfully", data, Some(Meta::empty())))
}

/// Storefront login. Administrators are sent to [`admin_login`].
pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let user = check_credentials(state, payload).await?;
    if user_role(&user)? == Role::Admin {
        return Err(AppError::Forbidden(
            "Administrators must use the admin login.".into(),
        ));
    }
    finish_login(state, user, "user_login").await
}

pub async fn admin_login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let user = check_credentials(state, payload).await?;
    if user_role(&user)? != Role::Admin {
        return Err(AppError::Forbidden(
            "Access denied. Administrator privileges required.".into(),
        ));
    }
    finish_login(state, user, "admin_login").await
}

pub async fn profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success("Profile", user_from_entity(model)?, None))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn issue_token(jwt: &JwtConfig, user_id: Uuid, role: Role) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(jwt.ttl_minutes))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

async fn check_credentials(state: &AppState, payload: LoginRequest) -> AppResult<UserModel> {
    let email = require(non_blank(payload.email), "Email is required.")?.to_lowercase();
    let password = require(payload.password.filter(|p| !p.is_empty()), "Password is required.")?;

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    Ok(user)
}

async fn finish_login(
    state: &AppState,
    user: UserModel,
    action: &str,
) -> AppResult<ApiResponse<AuthResponse>> {
    audit::record(
        &state.orm,
        Some(user.id),
        action,
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let data = auth_response(&state.jwt, user)?;
    Ok(ApiResponse::success("Logged in", data, Some(Meta::empty())))
}

fn auth_response(jwt: &JwtConfig, user: UserModel) -> AppResult<AuthResponse> {
    let role = user_role(&user)?;
    Ok(AuthResponse {
        token: issue_token(jwt, user.id, role)?,
        id: user.id,
        username: user.username,
        email: user.email,
        role,
    })
}

fn user_role(user: &UserModel) -> AppResult<Role> {
    user.role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    let role = user_role(&model)?;
    Ok(User {
        id: model.id,
        username: model.username,
        email: model.email,
        role,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
