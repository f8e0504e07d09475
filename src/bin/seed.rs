use jewellery_storefront_api::{
    db::{OrmConn, create_orm_conn, run_migrations},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    models::Role,
    services::auth_service::hash_password,
};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

struct SeedAccount {
    username: String,
    email: String,
    password: String,
    role: Role,
}

impl SeedAccount {
    fn from_env(prefix: &str, username: &str, email: &str, password: &str, role: Role) -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(format!("{prefix}_{name}")).unwrap_or_else(|_| default.to_string())
        };
        Self {
            username: var("USERNAME", username),
            email: var("EMAIL", email),
            password: var("PASSWORD", password),
            role,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Seeding only needs the database, not the full server configuration.
    let database_url = std::env::var("DATABASE_URL")?;

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let admin = SeedAccount::from_env("SEED_ADMIN", "admin", "admin@example.com", "admin123", Role::Admin);
    let user = SeedAccount::from_env("SEED_USER", "shopper", "user@example.com", "user123", Role::User);

    let admin_id = ensure_account(&orm, &admin).await?;
    let user_id = ensure_account(&orm, &user).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

/// Inserts the account, or resets role and password when the email already exists.
async fn ensure_account(orm: &OrmConn, account: &SeedAccount) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(&account.password)?;
    let existing = Users::find()
        .filter(UserCol::Email.eq(account.email.as_str()))
        .one(orm)
        .await?;

    let id = match existing {
        Some(model) => {
            let id = model.id;
            let mut active: UserActive = model.into();
            active.role = Set(account.role.as_str().to_string());
            active.password_hash = Set(password_hash);
            active.update(orm).await?;
            id
        }
        None => {
            UserActive {
                id: Set(Uuid::new_v4()),
                username: Set(account.username.clone()),
                email: Set(account.email.clone()),
                password_hash: Set(password_hash),
                role: Set(account.role.as_str().to_string()),
                created_at: NotSet,
            }
            .insert(orm)
            .await?
            .id
        }
    };

    println!("Ensured user {} (role={})", account.email, account.role.as_str());
    Ok(id)
}
