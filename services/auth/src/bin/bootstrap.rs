//! Prepare PostgreSQL for the authentication service
//!
//! Creates the database if needed, then the tables and indexes, then the
//! sample `admin` user. Every step is safe to re-run.

use anyhow::Result;
use common::database::{self, DatabaseConfig};
use common::retry::StorePolicy;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tokenkeep::repositories::PgUserRepository;
use tokenkeep::schema::{self, SeedOutcome, SeedUser};

async fn run() -> Result<()> {
    let db_config = DatabaseConfig::from_env()?;

    if schema::ensure_database(&db_config).await? {
        info!("Database {} created", db_config.name);
    }

    let pool = database::init_pool(&db_config).await?;
    schema::create_schema(&pool).await?;

    let users = PgUserRepository::new(pool.clone(), StorePolicy::from_env());
    let seed = SeedUser::default();
    match schema::seed_user(&users, &seed).await? {
        SeedOutcome::Created => info!("Sample user '{}' created", seed.username),
        SeedOutcome::AlreadyPresent => info!("Sample user '{}' left unchanged", seed.username),
    }

    pool.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    match run().await {
        Ok(()) => info!("Bootstrap completed"),
        Err(e) => {
            error!("Bootstrap failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
