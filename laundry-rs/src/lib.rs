//! laundry-rs: Campus laundry quota tracking service
//!
//! A backend for a campus laundry room: students submit laundry
//! requests against a monthly garment quota, admins move requests
//! through their lifecycle, and a transactional ledger keeps every
//! quota balanced against the requests on file.
//!
//! # Features
//!
//! - **Quota ledger**: Atomic check-and-deduct on submission, refunds
//!   on cancellation, audited consistency
//! - **Request lifecycle**: A closed status machine with an explicit
//!   transition table
//! - **REST API**: JWT-authenticated student and admin endpoints
//! - **Accounts**: Argon2 password hashing with legacy passwordless
//!   student logins
//!
//! # Example
//!
//! ```no_run
//! use laundry_rs::api::ApiServer;
//! use laundry_rs::api::auth::JwtConfig;
//! use laundry_rs::config::Config;
//! use laundry_rs::db;
//! use laundry_rs::ledger::LedgerManager;
//! use laundry_rs::security::Authenticator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let pool = db::connect(&config.database).await?;
//!     db::init_db(&pool).await?;
//!
//!     let server = ApiServer::new(
//!         LedgerManager::new(pool.clone()),
//!         Authenticator::new(pool),
//!         JwtConfig::default(),
//!         config.server.listen_addr.clone(),
//!     );
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`db`]: Database connection and schema
//! - [`ledger`]: Quota accounting and the request lifecycle
//! - [`security`]: Accounts and credential verification
//! - [`api`]: REST API server and handlers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod security;

// Re-export commonly used types
pub use config::Config;
pub use error::{LaundryError, Result};
