//! Security module
//!
//! Provides account management and credential verification:
//! - [`auth`]: student and admin accounts, Argon2 password handling

pub mod auth;

pub use auth::{validate_student_id, AdminAccount, Authenticator, Role};
