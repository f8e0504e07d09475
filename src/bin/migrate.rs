use jewellery_storefront_api::{config::AppConfig, db::{create_orm_conn, run_migrations}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    println!("Migrations applied to {}", redact_url(&config.database_url));
    Ok(())
}

fn redact_url(url: &str) -> &str {
    url.rsplit_once('@').map_or(url, |(_, host)| host)
}
