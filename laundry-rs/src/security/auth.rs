//! Account management and credential verification
//!
//! Two kinds of principals exist: students, who own a garment quota
//! and submit requests, and admins, who run the laundry room. Both are
//! stored in SQLite with Argon2 password hashes.
//!
//! Students imported from the legacy campus roster may have no
//! password on file yet; those accounts authenticate by student id
//! alone until a password is set.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::{LaundryError, Result};
use crate::ledger::Student;

/// What a principal is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    /// Parse a role from its wire representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "student" => Some(Self::Student),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Get the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }
}

/// An admin account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminAccount {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn student_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^STU\d{3,}$").expect("static pattern is valid"))
}

/// Account store and authenticator
#[derive(Clone)]
pub struct Authenticator {
    db: SqlitePool,
}

impl Authenticator {
    /// Create a new authenticator over an initialized database
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a new student account
    ///
    /// The password is optional; accounts without one authenticate by
    /// student id alone until a password is set. Returns the internal
    /// row id of the new account.
    pub async fn create_student(
        &self,
        student_id: &str,
        name: &str,
        email: Option<&str>,
        password: Option<&str>,
        quota_limit: i64,
    ) -> Result<i64> {
        validate_student_id(student_id)?;

        if name.trim().is_empty() {
            return Err(LaundryError::Validation(
                "Name must not be empty".to_string(),
            ));
        }
        if let Some(email) = email {
            if !email.contains('@') {
                return Err(LaundryError::Validation(format!(
                    "Invalid email address: {}",
                    email
                )));
            }
        }
        if let Some(password) = password {
            if password.len() < 6 {
                return Err(LaundryError::Validation(
                    "Password must be at least 6 characters".to_string(),
                ));
            }
        }
        if quota_limit <= 0 {
            return Err(LaundryError::Validation(
                "Quota limit must be positive".to_string(),
            ));
        }

        if self.student_exists(student_id).await? {
            return Err(LaundryError::Validation(format!(
                "Student {} already exists",
                student_id
            )));
        }

        info!("Adding student: {}", student_id);

        let password_hash = match password {
            Some(password) => Some(self.hash_password(password)?),
            None => None,
        };
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO students
                (student_id, name, email, password_hash, quota_limit, remaining_quota,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(student_id)
        .bind(name.trim())
        .bind(email)
        .bind(&password_hash)
        .bind(quota_limit)
        .bind(quota_limit)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(unique_to_validation)?;

        Ok(result.last_insert_rowid())
    }

    /// Register a new admin account
    ///
    /// Admin passwords are mandatory and must be at least 8 characters
    /// with at least one letter and one number.
    pub async fn create_admin(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<i64> {
        if username.trim().len() < 3 {
            return Err(LaundryError::Validation(
                "Username must be at least 3 characters".to_string(),
            ));
        }
        validate_admin_password(password)?;

        if self.admin_exists(username).await? {
            return Err(LaundryError::Validation(format!(
                "Admin {} already exists",
                username
            )));
        }

        info!("Adding admin: {}", username);

        let password_hash = self.hash_password(password)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO admins (username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(username.trim())
        .bind(email)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(unique_to_validation)?;

        Ok(result.last_insert_rowid())
    }

    /// Authenticate a student by student id and password
    ///
    /// Returns the account on success and `None` on bad credentials.
    /// Inactive accounts are rejected with a permission error so the
    /// caller can distinguish them from a wrong password.
    pub async fn authenticate_student(
        &self,
        student_id: &str,
        password: &str,
    ) -> Result<Option<Student>> {
        debug!("Authentication attempt for student {}", student_id);

        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(student) = student else {
            warn!("Authentication failed: unknown student {}", student_id);
            return Ok(None);
        };

        if !student.is_active {
            warn!("Authentication rejected: student {} is inactive", student_id);
            return Err(LaundryError::Permission("Account is inactive".to_string()));
        }

        match &student.password_hash {
            Some(hash) => {
                if self.verify_password(password, hash) {
                    info!("Authentication successful for student {}", student_id);
                    Ok(Some(student))
                } else {
                    warn!("Authentication failed: invalid password for {}", student_id);
                    Ok(None)
                }
            }
            None => {
                // Legacy roster import without a password on file
                debug!("Student {} has no password set, allowing login", student_id);
                Ok(Some(student))
            }
        }
    }

    /// Authenticate an admin by username and password
    ///
    /// Updates the account's last login timestamp on success.
    pub async fn authenticate_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<AdminAccount>> {
        debug!("Authentication attempt for admin {}", username);

        let admin = sqlx::query_as::<_, AdminAccount>(
            r#"
            SELECT * FROM admins WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        let Some(admin) = admin else {
            warn!("Authentication failed: unknown admin {}", username);
            return Ok(None);
        };

        if !admin.is_active {
            warn!("Authentication rejected: admin {} is inactive", username);
            return Err(LaundryError::Permission("Account is inactive".to_string()));
        }

        if !self.verify_password(password, &admin.password_hash) {
            warn!("Authentication failed: invalid password for {}", username);
            return Ok(None);
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE admins SET last_login = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(admin.id)
        .execute(&self.db)
        .await?;

        info!("Authentication successful for admin {}", username);
        Ok(Some(admin))
    }

    /// Set or replace a student's password
    pub async fn set_student_password(&self, student_id: &str, password: &str) -> Result<()> {
        if password.len() < 6 {
            return Err(LaundryError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let password_hash = self.hash_password(password)?;
        let result = sqlx::query(
            r#"
            UPDATE students SET password_hash = ?, updated_at = ? WHERE student_id = ?
            "#,
        )
        .bind(&password_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(student_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LaundryError::NotFound(format!("student {}", student_id)));
        }

        info!("Password updated for student {}", student_id);
        Ok(())
    }

    /// Deactivate a student account
    ///
    /// The account keeps its history but can no longer log in or
    /// submit requests.
    pub async fn deactivate_student(&self, student_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE students SET is_active = 0, updated_at = ? WHERE student_id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(student_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LaundryError::NotFound(format!("student {}", student_id)));
        }

        info!("Deactivated student {}", student_id);
        Ok(())
    }

    /// Delete a student account
    ///
    /// Refused while any laundry requests are on file for the student,
    /// so the request history never loses its owner.
    pub async fn delete_student(&self, student_id: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT id FROM students WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id,)) = row else {
            return Err(LaundryError::NotFound(format!("student {}", student_id)));
        };

        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM laundry_jobs WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if count.0 > 0 {
            return Err(LaundryError::Validation(format!(
                "Student {} has {} laundry requests on file; deactivate the account instead",
                student_id, count.0
            )));
        }

        sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Deleted student {}", student_id);
        Ok(())
    }

    /// Check if a student exists
    pub async fn student_exists(&self, student_id: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM students WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count.0 > 0)
    }

    /// Check if an admin exists
    pub async fn admin_exists(&self, username: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM admins WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_one(&self.db)
        .await?;

        Ok(count.0 > 0)
    }

    /// List all students (for CLI)
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students ORDER BY student_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(students)
    }

    /// Hash a password with Argon2
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| LaundryError::Config(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verify a password against a stored Argon2 hash
    ///
    /// An unreadable stored hash fails verification rather than
    /// erroring, so a corrupt row cannot be logged into.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored_hash) {
            Ok(hash) => hash,
            Err(_) => {
                warn!("Stored password hash is unreadable");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Health check - verify database connectivity
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;

        Ok(())
    }
}

/// Validate the campus student id format, e.g. "STU001"
pub fn validate_student_id(student_id: &str) -> Result<()> {
    if !student_id_pattern().is_match(student_id) {
        return Err(LaundryError::Validation(format!(
            "Invalid student ID format: '{}'. Must be STU followed by at least three digits (e.g., STU001)",
            student_id
        )));
    }
    Ok(())
}

fn validate_admin_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(LaundryError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(LaundryError::Validation(
            "Password must contain at least one letter and one number".to_string(),
        ));
    }
    Ok(())
}

fn unique_to_validation(err: sqlx::Error) -> LaundryError {
    if err.to_string().contains("UNIQUE") {
        LaundryError::Validation("Account already exists".to_string())
    } else {
        LaundryError::Database(err)
    }
}
