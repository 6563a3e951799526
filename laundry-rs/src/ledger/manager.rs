//! Quota-accounting ledger
//!
//! The ledger owns every mutation of student quotas and laundry
//! requests. Each write path is one SQLite transaction whose first
//! statement is a guarded UPDATE carrying its own precondition in the
//! WHERE clause. Writing first takes the database write lock up
//! front, so contending transactions queue on the busy timeout rather
//! than failing a snapshot upgrade, and a guard that matches zero
//! rows means the precondition no longer holds with nothing written,
//! so the operation can be diagnosed without ever leaving a
//! half-applied state.
//!
//! Transactions that still hit SQLITE_BUSY are retried a bounded
//! number of times before surfacing a conflict error to the caller.

use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{LaundryError, Result};
use crate::security::Role;

use super::status::JobStatus;
use super::types::{
    JobStats, JobWithStudent, LaundryJob, LedgerImbalance, QuotaLimits, Student, StudentStats,
    SubmitRequest,
};

/// Attempts per operation before giving up with a conflict error
const MAX_TXN_RETRIES: u32 = 3;

/// Whether an error is worth rerunning the transaction for
fn is_retryable(err: &LaundryError) -> bool {
    match err {
        LaundryError::Database(sqlx::Error::Database(db)) => {
            let message = db.message();
            message.contains("database is locked") || message.contains("database table is locked")
        }
        _ => false,
    }
}

/// Manager for quota accounting and the request lifecycle
#[derive(Clone)]
pub struct LedgerManager {
    db: SqlitePool,
    limits: QuotaLimits,
}

impl LedgerManager {
    /// Create a new ledger manager with default per-request bounds
    pub fn new(db: SqlitePool) -> Self {
        LedgerManager {
            db,
            limits: QuotaLimits::default(),
        }
    }

    /// Create a ledger manager with custom per-request bounds
    pub fn with_limits(db: SqlitePool, limits: QuotaLimits) -> Self {
        LedgerManager { db, limits }
    }

    /// Per-request bounds currently enforced
    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Submit a new laundry request for a student
    ///
    /// Checks the student's remaining quota, deducts the requested
    /// clothes and inserts the request in one transaction. Returns the
    /// stored request together with the student's remaining quota
    /// after the deduction.
    pub async fn submit_request(
        &self,
        user_id: i64,
        request: &SubmitRequest,
    ) -> Result<(LaundryJob, i64)> {
        self.validate_request(request)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_submit(user_id, request).await {
                Err(e) if is_retryable(&e) && attempt < MAX_TXN_RETRIES => {
                    warn!(
                        "Submit for student {} hit a write conflict (attempt {}): {}",
                        user_id, attempt, e
                    );
                    tokio::time::sleep(Duration::from_millis(10 * attempt as u64)).await;
                }
                Err(e) if is_retryable(&e) => {
                    return Err(LaundryError::Conflict(format!(
                        "could not submit request for student {} after {} attempts",
                        user_id, attempt
                    )));
                }
                other => return other,
            }
        }
    }

    fn validate_request(&self, request: &SubmitRequest) -> Result<()> {
        if request.num_clothes < self.limits.min_clothes
            || request.num_clothes > self.limits.max_clothes
        {
            return Err(LaundryError::Validation(format!(
                "Number of clothes must be between {} and {}",
                self.limits.min_clothes, self.limits.max_clothes
            )));
        }

        if let Some(notes) = &request.notes {
            if notes.chars().count() > self.limits.max_note_length {
                return Err(LaundryError::Validation(format!(
                    "Notes must be at most {} characters",
                    self.limits.max_note_length
                )));
            }
        }

        Ok(())
    }

    async fn try_submit(&self, user_id: i64, request: &SubmitRequest) -> Result<(LaundryJob, i64)> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db.begin().await?;

        // The deduction carries the quota check in its WHERE clause.
        // Zero rows affected means the student is missing, inactive,
        // or short on quota; which one is read back inside the same
        // transaction so the diagnosis matches what the guard saw.
        let deducted = sqlx::query(
            r#"
            UPDATE students
            SET remaining_quota = remaining_quota - ?, updated_at = ?
            WHERE id = ? AND is_active = 1 AND remaining_quota >= ?
            "#,
        )
        .bind(request.num_clothes)
        .bind(&now)
        .bind(user_id)
        .bind(request.num_clothes)
        .execute(&mut *tx)
        .await?;

        if deducted.rows_affected() == 0 {
            let row = sqlx::query_as::<_, (i64, bool)>(
                r#"
                SELECT remaining_quota, is_active FROM students WHERE id = ?
                "#,
            )
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            return match row {
                None | Some((_, false)) => {
                    Err(LaundryError::NotFound(format!("student {}", user_id)))
                }
                Some((available, true)) => Err(LaundryError::InsufficientQuota {
                    requested: request.num_clothes,
                    available,
                }),
            };
        }

        let (student_code, remaining) = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT student_id, remaining_quota FROM students WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO laundry_jobs
                (user_id, student_id, num_clothes, status, priority, notes,
                 submission_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&student_code)
        .bind(request.num_clothes)
        .bind(JobStatus::Submitted)
        .bind(request.priority)
        .bind(&request.notes)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let job_id = inserted.last_insert_rowid();
        let job = self.fetch_job(&mut tx, job_id).await?;

        tx.commit().await?;

        info!(
            "Student {} submitted request {} for {} clothes ({} remaining)",
            student_code, job_id, request.num_clothes, remaining
        );
        Ok((job, remaining))
    }

    /// Transition a laundry request to a new status
    ///
    /// Only admins may call this. The transition must be listed in the
    /// status table; anything else is rejected without touching the
    /// ledger. Cancelling refunds the request's clothes to the
    /// student, completing does not.
    pub async fn update_status(
        &self,
        job_id: i64,
        new_status: JobStatus,
        actor: Role,
    ) -> Result<LaundryJob> {
        if actor != Role::Admin {
            return Err(LaundryError::Permission(
                "only admins may update request status".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_update_status(job_id, new_status).await {
                Err(e) if is_retryable(&e) && attempt < MAX_TXN_RETRIES => {
                    warn!(
                        "Status update for request {} hit a write conflict (attempt {}): {}",
                        job_id, attempt, e
                    );
                    tokio::time::sleep(Duration::from_millis(10 * attempt as u64)).await;
                }
                Err(e) if is_retryable(&e) => {
                    return Err(LaundryError::Conflict(format!(
                        "could not update request {} after {} attempts",
                        job_id, attempt
                    )));
                }
                other => return other,
            }
        }
    }

    async fn try_update_status(&self, job_id: i64, new_status: JobStatus) -> Result<LaundryJob> {
        let now = Utc::now().to_rfc3339();
        let sources: Vec<JobStatus> = JobStatus::all()
            .into_iter()
            .filter(|s| s.can_transition_to(new_status))
            .collect();

        let mut tx = self.db.begin().await?;

        // The status change is the transaction's first statement and
        // carries the legality check in its WHERE clause: every legal
        // source state for the target is listed, so a request in any
        // other state matches zero rows. Writing first makes
        // contending writers queue on the busy timeout instead of
        // failing a snapshot upgrade mid-transaction.
        let updated = if sources.is_empty() {
            0
        } else {
            let date_column = if new_status == JobStatus::Processing {
                "started_date"
            } else {
                "completed_date"
            };
            let placeholders = vec!["?"; sources.len()].join(", ");
            let sql = format!(
                r#"
                UPDATE laundry_jobs
                SET status = ?, {} = ?, updated_at = ?
                WHERE id = ? AND status IN ({})
                "#,
                date_column, placeholders
            );

            let mut query = sqlx::query(&sql)
                .bind(new_status)
                .bind(&now)
                .bind(&now)
                .bind(job_id);
            for source in &sources {
                query = query.bind(*source);
            }
            query.execute(&mut *tx).await?.rows_affected()
        };

        if updated == 0 {
            // Diagnose under the write lock the guard took, so the
            // state reported is the one the guard rejected.
            let current = sqlx::query_as::<_, (JobStatus,)>(
                r#"
                SELECT status FROM laundry_jobs WHERE id = ?
                "#,
            )
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;

            return match current {
                None => Err(LaundryError::NotFound(format!("laundry request {}", job_id))),
                Some((from,)) => Err(LaundryError::InvalidTransition {
                    from: from.as_str().to_string(),
                    to: new_status.as_str().to_string(),
                }),
            };
        }

        let job = self.fetch_job(&mut tx, job_id).await?;

        if new_status == JobStatus::Cancelled {
            sqlx::query(
                r#"
                UPDATE students
                SET remaining_quota = remaining_quota + ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(job.num_clothes)
            .bind(&now)
            .bind(job.user_id)
            .execute(&mut *tx)
            .await?;

            debug!(
                "Refunded {} clothes to student {} for cancelled request {}",
                job.num_clothes, job.student_id, job_id
            );
        }

        tx.commit().await?;

        info!("Request {} moved to '{}'", job_id, new_status);
        Ok(job)
    }

    async fn fetch_job(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        job_id: i64,
    ) -> Result<LaundryJob> {
        let job = sqlx::query_as::<_, LaundryJob>(
            r#"
            SELECT * FROM laundry_jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(job)
    }

    /// Get a student by internal row id
    pub async fn get_student(&self, user_id: i64) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(student)
    }

    /// Get a student by campus student id
    pub async fn get_student_by_student_id(&self, student_id: &str) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(student)
    }

    /// Get a laundry request by id
    pub async fn get_job(&self, job_id: i64) -> Result<Option<LaundryJob>> {
        let job = sqlx::query_as::<_, LaundryJob>(
            r#"
            SELECT * FROM laundry_jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(job)
    }

    /// Get a laundry request only if it belongs to the given student
    pub async fn get_student_job(&self, user_id: i64, job_id: i64) -> Result<Option<LaundryJob>> {
        let job = sqlx::query_as::<_, LaundryJob>(
            r#"
            SELECT * FROM laundry_jobs WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(job_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(job)
    }

    /// A student's request history, newest first
    ///
    /// Returns the total matching count along with one page of
    /// requests. Pages are 1-based.
    pub async fn student_history(
        &self,
        user_id: i64,
        status: Option<JobStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<(i64, Vec<LaundryJob>)> {
        let mut count_sql = String::from("SELECT COUNT(*) FROM laundry_jobs WHERE user_id = ?");
        let mut list_sql = String::from("SELECT * FROM laundry_jobs WHERE user_id = ?");
        if status.is_some() {
            count_sql.push_str(" AND status = ?");
            list_sql.push_str(" AND status = ?");
        }
        list_sql.push_str(" ORDER BY submission_date DESC LIMIT ? OFFSET ?");

        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(user_id);
        let mut list_query = sqlx::query_as::<_, LaundryJob>(&list_sql).bind(user_id);
        if let Some(status) = status {
            count_query = count_query.bind(status);
            list_query = list_query.bind(status);
        }

        let total = count_query.fetch_one(&self.db).await?.0;
        let jobs = list_query
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.db)
            .await?;

        Ok((total, jobs))
    }

    /// Aggregate request counts for a student's dashboard
    pub async fn student_stats(&self, user_id: i64) -> Result<StudentStats> {
        let (total, pending, completed) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'submitted' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
            FROM laundry_jobs
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(StudentStats {
            total_jobs: total,
            pending_jobs: pending,
            completed_jobs: completed,
        })
    }

    /// A student's most recent requests
    pub async fn recent_jobs(&self, user_id: i64, limit: i64) -> Result<Vec<LaundryJob>> {
        let jobs = sqlx::query_as::<_, LaundryJob>(
            r#"
            SELECT * FROM laundry_jobs
            WHERE user_id = ?
            ORDER BY submission_date DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(jobs)
    }

    /// All requests in one status joined with their students
    ///
    /// Submitted requests come back oldest first so the queue is
    /// served in submission order; everything else is ordered by when
    /// processing started.
    pub async fn board_jobs(&self, status: JobStatus) -> Result<Vec<JobWithStudent>> {
        let order = match status {
            JobStatus::Submitted => "j.submission_date ASC",
            _ => "j.started_date ASC",
        };
        let sql = format!(
            r#"
            SELECT j.*, s.name AS student_name, s.remaining_quota AS remaining_quota
            FROM laundry_jobs j
            JOIN students s ON s.id = j.user_id
            WHERE j.status = ?
            ORDER BY {}
            "#,
            order
        );

        let jobs = sqlx::query_as::<_, JobWithStudent>(&sql)
            .bind(status)
            .fetch_all(&self.db)
            .await?;

        Ok(jobs)
    }

    /// Requests completed since UTC midnight today
    pub async fn completed_today(&self) -> Result<i64> {
        let midnight = format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"));
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM laundry_jobs
            WHERE status = 'completed' AND completed_date >= ?
            "#,
        )
        .bind(&midnight)
        .fetch_one(&self.db)
        .await?;

        Ok(count.0)
    }

    /// All requests with optional status and student filters, paginated
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        student_id: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<(i64, Vec<JobWithStudent>)> {
        let mut count_sql = String::from("SELECT COUNT(*) FROM laundry_jobs j WHERE 1 = 1");
        let mut list_sql = String::from(
            r#"
            SELECT j.*, s.name AS student_name, s.remaining_quota AS remaining_quota
            FROM laundry_jobs j
            JOIN students s ON s.id = j.user_id
            WHERE 1 = 1
            "#,
        );
        if status.is_some() {
            count_sql.push_str(" AND j.status = ?");
            list_sql.push_str(" AND j.status = ?");
        }
        if student_id.is_some() {
            count_sql.push_str(" AND j.student_id = ?");
            list_sql.push_str(" AND j.student_id = ?");
        }
        list_sql.push_str(" ORDER BY j.submission_date DESC LIMIT ? OFFSET ?");

        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        let mut list_query = sqlx::query_as::<_, JobWithStudent>(&list_sql);
        if let Some(status) = status {
            count_query = count_query.bind(status);
            list_query = list_query.bind(status);
        }
        if let Some(student_id) = student_id {
            count_query = count_query.bind(student_id);
            list_query = list_query.bind(student_id);
        }

        let total = count_query.fetch_one(&self.db).await?.0;
        let jobs = list_query
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.db)
            .await?;

        Ok((total, jobs))
    }

    /// Request statistics over the last `days` days
    pub async fn analytics(&self, days: i64) -> Result<JobStats> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();

        let (total, submitted, processing, completed, cancelled, clothes) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(CASE WHEN status = 'submitted' THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN status = 'completed' THEN num_clothes ELSE 0 END), 0)
                FROM laundry_jobs
                WHERE submission_date >= ?
                "#,
            )
            .bind(&cutoff)
            .fetch_one(&self.db)
            .await?;

        Ok(JobStats {
            total_jobs: total,
            submitted,
            processing,
            completed,
            cancelled,
            total_clothes_processed: clothes,
        })
    }

    /// Cross-check every student's quota against their requests
    ///
    /// For each student, quota_limit minus remaining_quota must equal
    /// the clothes in their non-cancelled requests. Returns the
    /// students for which the books do not balance.
    pub async fn audit_quota_ledger(&self) -> Result<Vec<LedgerImbalance>> {
        let imbalances = sqlx::query_as::<_, LedgerImbalance>(
            r#"
            SELECT s.student_id, s.quota_limit, s.remaining_quota,
                   COALESCE(SUM(CASE WHEN j.status != 'cancelled' THEN j.num_clothes ELSE 0 END), 0) AS consumed
            FROM students s
            LEFT JOIN laundry_jobs j ON j.user_id = s.id
            GROUP BY s.id
            HAVING s.quota_limit - s.remaining_quota != consumed
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(imbalances)
    }
}
