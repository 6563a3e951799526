//! Quota accounting and the laundry request lifecycle
//!
//! This module is the only place that mutates quotas and requests:
//! - [`status`]: the closed status set and its transition table
//! - [`types`]: ledger entities and value types
//! - [`manager`]: transactional submit and status-update operations

pub mod manager;
pub mod status;
pub mod types;

pub use manager::LedgerManager;
pub use status::{JobStatus, Priority};
pub use types::{
    JobStats, JobWithStudent, LaundryJob, LedgerImbalance, QuotaLimits, Student, StudentStats,
    SubmitRequest,
};
