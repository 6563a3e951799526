//! Integration tests for the quota ledger under concurrency
//!
//! These run against a file-backed SQLite database with a full
//! connection pool, so submissions and status updates really race
//! each other the way they do in production.

use laundry_rs::config::DatabaseConfig;
use laundry_rs::db;
use laundry_rs::error::LaundryError;
use laundry_rs::ledger::{JobStatus, LedgerManager, SubmitRequest};
use laundry_rs::security::{Authenticator, Role};

/// Helper to set up a ledger over a file-backed database
async fn start_test_ledger() -> (LedgerManager, Authenticator, tempfile::TempDir) {
    let tempdir = tempfile::tempdir().unwrap();
    let db_path = tempdir.path().join("laundry.db");
    let config = DatabaseConfig {
        url: format!("sqlite:{}", db_path.display()),
        ..DatabaseConfig::default()
    };

    let pool = db::connect(&config).await.unwrap();
    db::init_db(&pool).await.unwrap();

    (
        LedgerManager::new(pool.clone()),
        Authenticator::new(pool),
        tempdir,
    )
}

async fn remaining_quota(ledger: &LedgerManager, student_id: &str) -> i64 {
    ledger
        .get_student_by_student_id(student_id)
        .await
        .unwrap()
        .unwrap()
        .remaining_quota
}

#[tokio::test]
async fn test_racing_submissions_admit_exactly_one_winner() {
    let (ledger, auth, _tempdir) = start_test_ledger().await;
    let user_id = auth
        .create_student("STU001", "Alice Chen", None, None, 30)
        .await
        .unwrap();

    // Two submissions of 25 clothes against a quota of 30: whatever
    // the interleaving, only one can fit.
    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.submit_request(user_id, &SubmitRequest::new(25)).await })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.submit_request(user_id, &SubmitRequest::new(25)).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one submission must win");

    let loser = results.into_iter().find(|r| r.is_err()).unwrap();
    match loser.unwrap_err() {
        LaundryError::InsufficientQuota { requested, available } => {
            assert_eq!(requested, 25);
            assert_eq!(available, 5);
        }
        other => panic!("expected InsufficientQuota, got {:?}", other),
    }

    assert_eq!(remaining_quota(&ledger, "STU001").await, 5);
    assert!(ledger.audit_quota_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_submissions_never_oversubscribe() {
    let (ledger, auth, _tempdir) = start_test_ledger().await;
    let user_id = auth
        .create_student("STU001", "Alice Chen", None, None, 30)
        .await
        .unwrap();

    // Eight tasks of 5 clothes each against a quota of 30: exactly
    // six can fit, no interleaving may admit a seventh.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.submit_request(user_id, &SubmitRequest::new(5)).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LaundryError::InsufficientQuota { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(successes, 6);
    assert_eq!(remaining_quota(&ledger, "STU001").await, 0);

    let (total, _) = ledger.student_history(user_id, None, 1, 100).await.unwrap();
    assert_eq!(total, 6);
    assert!(ledger.audit_quota_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_racing_cancellations_refund_exactly_once() {
    let (ledger, auth, _tempdir) = start_test_ledger().await;
    let user_id = auth
        .create_student("STU001", "Alice Chen", None, None, 30)
        .await
        .unwrap();
    let (job, remaining) = ledger
        .submit_request(user_id, &SubmitRequest::new(10))
        .await
        .unwrap();
    assert_eq!(remaining, 20);

    let a = {
        let ledger = ledger.clone();
        let id = job.id;
        tokio::spawn(async move { ledger.update_status(id, JobStatus::Cancelled, Role::Admin).await })
    };
    let b = {
        let ledger = ledger.clone();
        let id = job.id;
        tokio::spawn(async move { ledger.update_status(id, JobStatus::Cancelled, Role::Admin).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one cancellation must apply");

    let loser = results.into_iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.unwrap_err(),
        LaundryError::InvalidTransition { .. } | LaundryError::Conflict(_)
    ));

    // The refund must have been applied exactly once
    assert_eq!(remaining_quota(&ledger, "STU001").await, 30);
    let job = ledger.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(ledger.audit_quota_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_updates_on_distinct_jobs_all_succeed() {
    let (ledger, auth, _tempdir) = start_test_ledger().await;

    // Eight jobs across four students, one admin task per job. None
    // of the updates contend on a row, so every single one must go
    // through; a conflict here would mean independent students are
    // not independent.
    let mut job_ids = Vec::new();
    for i in 1..=4 {
        let user_id = auth
            .create_student(&format!("STU00{}", i), "Worker Test", None, None, 30)
            .await
            .unwrap();
        for _ in 0..2 {
            let (job, _) = ledger
                .submit_request(user_id, &SubmitRequest::new(5))
                .await
                .unwrap();
            job_ids.push(job.id);
        }
    }

    let mut handles = Vec::new();
    for &job_id in &job_ids {
        let worker = ledger.clone();
        handles.push(tokio::spawn(async move {
            worker
                .update_status(job_id, JobStatus::Processing, Role::Admin)
                .await
        }));
    }
    for handle in handles {
        let job = handle.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }

    assert!(ledger.audit_quota_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_restores_capacity_for_new_submissions() {
    let (ledger, auth, _tempdir) = start_test_ledger().await;
    let user_id = auth
        .create_student("STU001", "Alice Chen", None, None, 30)
        .await
        .unwrap();

    let (big, _) = ledger
        .submit_request(user_id, &SubmitRequest::new(20))
        .await
        .unwrap();

    let err = ledger
        .submit_request(user_id, &SubmitRequest::new(15))
        .await
        .unwrap_err();
    assert!(matches!(err, LaundryError::InsufficientQuota { .. }));

    ledger
        .update_status(big.id, JobStatus::Cancelled, Role::Admin)
        .await
        .unwrap();

    let (_, remaining) = ledger
        .submit_request(user_id, &SubmitRequest::new(15))
        .await
        .unwrap();
    assert_eq!(remaining, 15);
    assert!(ledger.audit_quota_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mixed_concurrent_load_keeps_every_ledger_balanced() {
    let (ledger, auth, _tempdir) = start_test_ledger().await;

    let mut students = Vec::new();
    for i in 1..=4 {
        let student_id = format!("STU00{}", i);
        let user_id = auth
            .create_student(&student_id, "Load Test", None, None, 30)
            .await
            .unwrap();
        students.push(user_id);
    }

    // Every student fires three submissions at once; 5+10+20 exceeds
    // the quota, so one of each batch must lose.
    let mut handles = Vec::new();
    for &user_id in &students {
        for clothes in [5, 10, 20] {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .submit_request(user_id, &SubmitRequest::new(clothes))
                    .await
            }));
        }
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(LaundryError::InsufficientQuota { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    // Admins work the queues concurrently: first job of each student
    // goes through processing to completed, the second is cancelled.
    let mut handles = Vec::new();
    for &user_id in &students {
        let (_, jobs) = ledger.student_history(user_id, None, 1, 10).await.unwrap();
        assert_eq!(jobs.len(), 2);

        let complete_id = jobs[0].id;
        let cancel_id = jobs[1].id;

        let worker = ledger.clone();
        handles.push(tokio::spawn(async move {
            worker
                .update_status(complete_id, JobStatus::Processing, Role::Admin)
                .await?;
            worker
                .update_status(complete_id, JobStatus::Completed, Role::Admin)
                .await
        }));
        let worker = ledger.clone();
        handles.push(tokio::spawn(async move {
            worker
                .update_status(cancel_id, JobStatus::Cancelled, Role::Admin)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // However the races resolved, every quota must balance against
    // the requests on file and stay within bounds.
    assert!(ledger.audit_quota_ledger().await.unwrap().is_empty());
    for student in auth.list_students().await.unwrap() {
        assert!(student.remaining_quota >= 0);
        assert!(student.remaining_quota <= student.quota_limit);
    }
}
