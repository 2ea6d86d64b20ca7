//! Common library for the Maker's Schedule workspace
//!
//! This crate provides the infrastructure shared by the API service and the
//! planner library: PostgreSQL and Redis connectivity, the clock abstraction
//! used for token and cache expiry, and infrastructure error types.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     let is_healthy = health_check(&pool).await?;
//!     println!("Database health check: {}", is_healthy);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod database;
pub mod error;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
