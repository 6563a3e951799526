//! CLI tool for managing laundry service accounts
//!
//! This tool provides commands to manage student and admin accounts.
//!
//! # Usage
//!
//! ```bash
//! # Add a new student (omit --password for legacy roster imports)
//! laundry-user add-student STU001 "Alice Chen" --password secret1 --db sqlite://laundry.db
//!
//! # Add an admin
//! laundry-user add-admin admin laundry2026 --db sqlite://laundry.db
//!
//! # List all students with their quotas
//! laundry-user list --db sqlite://laundry.db
//!
//! # Show one student's profile and request counts
//! laundry-user show STU001
//!
//! # Set or replace a student's password
//! laundry-user set-password STU001 newpass2
//!
//! # Deactivate a student (keeps request history)
//! laundry-user deactivate STU001
//!
//! # Delete a student (refused while requests are on file)
//! laundry-user delete STU001
//! ```

use clap::{Parser, Subcommand};
use laundry_rs::config::DatabaseConfig;
use laundry_rs::db;
use laundry_rs::ledger::LedgerManager;
use laundry_rs::security::Authenticator;

#[derive(Parser)]
#[command(name = "laundry-user")]
#[command(about = "Manage laundry service accounts", long_about = None)]
struct Cli {
    /// Database URL (e.g., sqlite://laundry.db)
    #[arg(short, long, default_value = "sqlite://laundry.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new student
    AddStudent {
        /// Campus student id (e.g., STU001)
        student_id: String,
        /// Full name
        name: String,
        /// Contact email
        #[arg(short, long)]
        email: Option<String>,
        /// Password; omit to allow login by student id alone
        #[arg(short, long)]
        password: Option<String>,
        /// Monthly garment quota
        #[arg(short, long, default_value_t = 30)]
        quota: i64,
    },
    /// Add a new admin
    AddAdmin {
        /// Admin username
        username: String,
        /// Admin password (min 8 characters, one letter and one number)
        password: String,
        /// Contact email
        #[arg(short, long)]
        email: Option<String>,
    },
    /// List all students with their quotas
    List,
    /// Show one student's profile and request counts
    Show {
        /// Campus student id
        student_id: String,
    },
    /// Set or replace a student's password
    SetPassword {
        /// Campus student id
        student_id: String,
        /// New password
        password: String,
    },
    /// Deactivate a student account
    Deactivate {
        /// Campus student id
        student_id: String,
    },
    /// Delete a student account
    Delete {
        /// Campus student id
        student_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = DatabaseConfig {
        url: cli.db,
        ..DatabaseConfig::default()
    };
    let pool = db::connect(&config).await?;
    db::init_db(&pool).await?;
    let ledger = LedgerManager::new(pool.clone());
    let auth = Authenticator::new(pool);

    match cli.command {
        Commands::AddStudent {
            student_id,
            name,
            email,
            password,
            quota,
        } => {
            println!("Adding student: {}", student_id);

            auth.create_student(
                &student_id,
                &name,
                email.as_deref(),
                password.as_deref(),
                quota,
            )
            .await?;

            if password.is_none() {
                println!("  (no password set; account logs in by student id alone)");
            }
            println!("✓ Student {} added with a quota of {} clothes", student_id, quota);
        }
        Commands::AddAdmin {
            username,
            password,
            email,
        } => {
            println!("Adding admin: {}", username);

            auth.create_admin(&username, email.as_deref(), &password)
                .await?;
            println!("✓ Admin {} added successfully", username);
        }
        Commands::List => {
            println!("Listing all students...\n");

            let students = auth.list_students().await?;

            if students.is_empty() {
                println!("No students found.");
            } else {
                println!(
                    "{:<10} {:<25} {:<8} {:<8} {:<8}",
                    "ID", "Name", "Quota", "Left", "Active"
                );
                println!("{:-<61}", "");

                for student in &students {
                    println!(
                        "{:<10} {:<25} {:<8} {:<8} {:<8}",
                        student.student_id,
                        student.name,
                        student.quota_limit,
                        student.remaining_quota,
                        if student.is_active { "yes" } else { "no" }
                    );
                }

                println!("\nTotal: {} student(s)", students.len());
            }
        }
        Commands::Show { student_id } => {
            let student = ledger
                .get_student_by_student_id(&student_id)
                .await?
                .ok_or_else(|| {
                    laundry_rs::LaundryError::NotFound(format!("student {}", student_id))
                })?;
            let stats = ledger.student_stats(student.id).await?;

            println!("Student:   {} ({})", student.name, student.student_id);
            if let Some(email) = &student.email {
                println!("Email:     {}", email);
            }
            println!("Active:    {}", if student.is_active { "yes" } else { "no" });
            println!(
                "Quota:     {} of {} clothes remaining",
                student.remaining_quota, student.quota_limit
            );
            println!(
                "Requests:  {} total, {} pending, {} completed",
                stats.total_jobs, stats.pending_jobs, stats.completed_jobs
            );
        }
        Commands::SetPassword {
            student_id,
            password,
        } => {
            auth.set_student_password(&student_id, &password).await?;
            println!("✓ Password updated for {}", student_id);
        }
        Commands::Deactivate { student_id } => {
            auth.deactivate_student(&student_id).await?;
            println!("✓ Student {} deactivated", student_id);
        }
        Commands::Delete { student_id } => {
            auth.delete_student(&student_id).await?;
            println!("✓ Student {} deleted", student_id);
        }
    }

    Ok(())
}
