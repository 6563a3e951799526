//! Ledger entities and value types

use serde::Serialize;

use super::status::{JobStatus, Priority};

/// A student account with its garment quota
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Student {
    /// Internal row id
    pub id: i64,
    /// Campus student id (e.g., "STU001")
    pub student_id: String,
    /// Full name
    pub name: String,
    /// Contact email, if known
    pub email: Option<String>,
    /// Argon2 hash, absent for legacy accounts imported without one
    pub password_hash: Option<String>,
    /// Monthly garment allowance
    pub quota_limit: i64,
    /// Clothes still available this month
    pub remaining_quota: i64,
    /// Inactive students cannot log in or submit requests
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A laundry request as stored in the ledger
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LaundryJob {
    /// Internal row id
    pub id: i64,
    /// Row id of the owning student
    pub user_id: i64,
    /// Campus student id, denormalized for admin filtering
    pub student_id: String,
    /// Number of clothes in this request
    pub num_clothes: i64,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Processing priority
    pub priority: Priority,
    /// Free-form instructions from the student
    pub notes: Option<String>,
    /// When the request entered the ledger (RFC 3339)
    pub submission_date: String,
    /// Set once, when processing begins
    pub started_date: Option<String>,
    /// Set once, when the request reaches a terminal state
    pub completed_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A laundry request joined with its student, for admin views
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: LaundryJob,
    /// Student's full name
    pub student_name: String,
    /// Student's current remaining quota
    pub remaining_quota: i64,
}

/// Input for submitting a new laundry request
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub num_clothes: i64,
    pub priority: Priority,
    pub notes: Option<String>,
}

impl SubmitRequest {
    pub fn new(num_clothes: i64) -> Self {
        Self {
            num_clothes,
            priority: Priority::default(),
            notes: None,
        }
    }
}

/// Per-request bounds enforced when submitting
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    /// Smallest accepted number of clothes per request
    pub min_clothes: i64,
    /// Largest accepted number of clothes per request
    pub max_clothes: i64,
    /// Longest accepted notes field, in characters
    pub max_note_length: usize,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            min_clothes: 1,
            max_clothes: 50,
            max_note_length: 500,
        }
    }
}

/// Aggregate request counts for a student's dashboard
#[derive(Debug, Clone, Serialize)]
pub struct StudentStats {
    /// All requests ever submitted
    pub total_jobs: i64,
    /// Requests still waiting in 'submitted'
    pub pending_jobs: i64,
    /// Requests that reached 'completed'
    pub completed_jobs: i64,
}

/// Aggregate request statistics over a time window, for admin analytics
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total_jobs: i64,
    pub submitted: i64,
    pub processing: i64,
    pub completed: i64,
    pub cancelled: i64,
    /// Clothes in completed requests over the window
    pub total_clothes_processed: i64,
}

/// A student whose quota books do not balance
///
/// For every student the consumed quota must equal the clothes in
/// their non-cancelled requests. Produced by the ledger audit; an
/// empty audit means the ledger is consistent.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LedgerImbalance {
    pub student_id: String,
    pub quota_limit: i64,
    pub remaining_quota: i64,
    /// Sum of num_clothes over submitted, processing and completed requests
    pub consumed: i64,
}
