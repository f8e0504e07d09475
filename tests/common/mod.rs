#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use jewellery_storefront_api::{
    config::JwtConfig,
    db::{create_orm_conn, run_migrations},
    entity::users::ActiveModel as UserActive,
    media::{MediaFolder, MediaStore, StoredFile},
    middleware::auth::AuthUser,
    models::Role,
    payments::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway, Payments},
    services::auth_service::hash_password,
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use secrecy::SecretString;
use tokio::sync::OnceCell;
use uuid::Uuid;

pub const KEY_SECRET: &str = "test_key_secret";

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Hands out gateway order ids without calling the network.
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
        })
    }
}

/// Builds state against the test database, or `None` when no database is configured.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    MIGRATED
        .get_or_try_init(|| async { run_migrations(&orm).await })
        .await?;

    let upload_root = std::env::temp_dir().join(format!("storefront-test-{}", Uuid::new_v4()));
    let key_secret = SecretString::from(KEY_SECRET.to_string());

    Ok(Some(AppState {
        orm,
        jwt: JwtConfig {
            secret: SecretString::from("integration-test-secret".to_string()),
            ttl_minutes: 5,
        },
        payments: Payments {
            gateway: Arc::new(StubGateway),
            key_id: "rzp_test_key".into(),
            key_secret,
            currency: "INR".into(),
        },
        media: MediaStore::new(upload_root, 1024 * 1024),
        mailer: None,
    }))
}

pub fn secret() -> SecretString {
    SecretString::from(KEY_SECRET.to_string())
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
    }
}

pub fn shopper() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::User,
    }
}

/// Inserts an account directly, bypassing registration.
pub async fn create_user(
    state: &AppState,
    role: Role,
    password: &str,
) -> anyhow::Result<(Uuid, String)> {
    let tag = Uuid::new_v4().simple().to_string();
    let email = format!("{tag}@example.com");
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(format!("user-{tag}")),
        email: Set(email.clone()),
        password_hash: Set(hash_password(password)?),
        role: Set(role.as_str().into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok((user.id, email))
}

pub async fn store_image(
    state: &AppState,
    folder: MediaFolder,
    field: &str,
) -> anyhow::Result<StoredFile> {
    Ok(state
        .media
        .save_image(folder, field, "photo.png", Some("image/png"), b"\x89PNG test image")
        .await?)
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::new_v4().simple())
}
