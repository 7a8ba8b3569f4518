//! Common library for the tokenkeep services
//!
//! This crate provides the storage plumbing shared by the authentication
//! service and its bootstrap tool: PostgreSQL pooling, the Redis handle,
//! the store error taxonomy and the timeout/retry policy wrapped around
//! every store call.

pub mod cache;
pub mod database;
pub mod error;
pub mod retry;

/// Example usage of the database module and store policy
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool};
/// use common::error::StoreError;
/// use common::retry::StorePolicy;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     let pool = &pool;
///
///     let users: i64 = StorePolicy::from_env()
///         .run("count users", move || async move {
///             let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
///                 .fetch_one(pool)
///                 .await?;
///             Ok::<_, StoreError>(count)
///         })
///         .await?;
///     println!("{} users", users);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
