//! REST API module for laundry-rs
//!
//! Provides HTTP API endpoints for quota-tracked laundry requests

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use server::ApiServer;
