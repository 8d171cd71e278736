//! Integration tests for the translation platform core
//!
//! These tests drive the full claim → submit → review → accept/reject
//! pipeline across modules: lifecycle, statistics ledger, certification
//! engine, and review registry, all on top of a throwaway store.

use tempfile::TempDir;

use crowd_translate::auth::Authenticator;
use crowd_translate::certification::{calculate_progress, CertificationEngine};
use crowd_translate::content::ContentStore;
use crowd_translate::db::Database;
use crowd_translate::ledger::StatsLedger;
use crowd_translate::lifecycle::LifecycleEngine;
use crowd_translate::models::{
    FileStatus, NewFile, ReviewDecision, ReviewStatus, TranslatableFile, UserRole,
};
use crowd_translate::review::ReviewRegistry;

// ==================== Test Helpers ====================

struct Harness {
    db: Database,
    lifecycle: LifecycleEngine,
    certification: CertificationEngine,
    review: ReviewRegistry,
    auth: Authenticator,
    _temp_dir: TempDir,
}

fn create_harness() -> Harness {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("integration.db");
    let db = Database::new(db_path.to_str().unwrap()).expect("db");

    let certification = CertificationEngine::new(db.clone());
    let lifecycle = LifecycleEngine::new(
        db.clone(),
        StatsLedger::new(db.clone()),
        certification.clone(),
        ContentStore::new(),
        72,
    );
    Harness {
        lifecycle,
        certification,
        review: ReviewRegistry::new(db.clone()),
        auth: Authenticator::new(db.clone()),
        db,
        _temp_dir: temp_dir,
    }
}

fn seed_users(harness: &Harness) {
    harness
        .db
        .upsert_token("tok-alice", "alice", "Alice", UserRole::Contributor)
        .expect("token");
    harness
        .db
        .upsert_token("tok-mora", "mora", "Mora", UserRole::Moderator)
        .expect("token");
    // First authentication initializes the contribution records
    harness
        .auth
        .verify_bearer(Some("Bearer tok-alice"))
        .expect("alice");
    harness
        .auth
        .verify_bearer(Some("Bearer tok-mora"))
        .expect("mora");
}

fn seed_file(harness: &Harness, label: &str, words: usize) -> TranslatableFile {
    let original_text = vec!["palabra"; words].join(" ");
    let (_, files) = harness
        .db
        .create_project(
            &format!("Project for {}", label),
            &["documentation".to_string()],
            &[NewFile {
                label: label.to_string(),
                original_text,
                content_url: None,
                word_count: None,
            }],
        )
        .expect("project");
    files.into_iter().next().expect("file")
}

async fn accept_file(harness: &Harness, file_id: &str) -> crowd_translate::lifecycle::ResolveOutcome {
    harness
        .lifecycle
        .claim(file_id, "alice")
        .await
        .expect("claim");
    harness
        .lifecycle
        .submit(file_id, "alice", "la traduccion terminada")
        .await
        .expect("submit");
    harness
        .lifecycle
        .resolve(file_id, "mora", UserRole::Moderator, ReviewDecision::Accept, None)
        .await
        .expect("resolve")
}

// ==================== Full Pipeline: Acceptance ====================

#[tokio::test]
async fn test_fresh_translator_to_first_certificate() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "intro.md", 500);

    let profile = harness.db.get_profile("alice").expect("get").expect("exists");
    assert_eq!(profile.total_words_translated, 0);

    let outcome = accept_file(&harness, &file.id).await;

    assert_eq!(outcome.file.status, FileStatus::Accepted);
    assert_eq!(outcome.translator.total_words_translated, 500);
    assert_eq!(outcome.translator.approved_translations, 1);
    assert_eq!(outcome.new_certificates.len(), 1);
    assert_eq!(outcome.new_certificates[0].tier_id, "tier-500");

    // The review task mirrors the terminal file state
    let task = harness
        .review
        .find_by_file(&file.id)
        .expect("find")
        .expect("present");
    assert_eq!(task.status, ReviewStatus::Approved);
    assert!(harness.review.list_pending().expect("pending").is_empty());

    // The minted certificate is publicly verifiable
    let code = &outcome.new_certificates[0].verification_code;
    let found = harness
        .db
        .find_certificate_by_code(code)
        .expect("lookup")
        .expect("present");
    assert_eq!(found.user_id, "alice");
}

#[tokio::test]
async fn test_certificates_accumulate_across_files() {
    let harness = create_harness();
    seed_users(&harness);

    // 300 words: no tier yet
    let first = seed_file(&harness, "part-1.md", 300);
    let outcome = accept_file(&harness, &first.id).await;
    assert!(outcome.new_certificates.is_empty());
    assert_eq!(outcome.translator.total_words_translated, 300);

    // 250 more crosses the 500-word tier exactly once
    let second = seed_file(&harness, "part-2.md", 250);
    let outcome = accept_file(&harness, &second.id).await;
    assert_eq!(outcome.translator.total_words_translated, 550);
    assert_eq!(outcome.new_certificates.len(), 1);
    assert_eq!(outcome.new_certificates[0].tier_id, "tier-500");

    // A third acceptance does not re-award the tier
    let third = seed_file(&harness, "part-3.md", 100);
    let outcome = accept_file(&harness, &third.id).await;
    assert!(outcome.new_certificates.is_empty());
    assert_eq!(
        harness
            .db
            .list_certificates_for_user("alice")
            .expect("list")
            .len(),
        1
    );

    // Contribution history lists every accepted file
    let profile = harness.db.get_profile("alice").expect("get").expect("exists");
    assert_eq!(profile.contributed_files.len(), 3);
    assert_eq!(profile.approved_translations, 3);
}

// ==================== Full Pipeline: Rejection ====================

#[tokio::test]
async fn test_rejection_counts_without_credit() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "draft.md", 400);

    harness
        .lifecycle
        .claim(&file.id, "alice")
        .await
        .expect("claim");
    harness
        .lifecycle
        .submit(&file.id, "alice", "un intento")
        .await
        .expect("submit");
    let outcome = harness
        .lifecycle
        .resolve(
            &file.id,
            "mora",
            UserRole::Moderator,
            ReviewDecision::Reject,
            Some("terminology is off"),
        )
        .await
        .expect("resolve");

    assert_eq!(outcome.file.status, FileStatus::Rejected);
    assert_eq!(outcome.translator.rejected_translations, 1);
    assert_eq!(outcome.translator.total_words_translated, 0);
    assert!(outcome.new_certificates.is_empty());

    let task = outcome.task.expect("task");
    assert_eq!(task.status, ReviewStatus::Rejected);
    assert_eq!(task.comments.as_deref(), Some("terminology is off"));
}

// ==================== Guard Rails ====================

#[tokio::test]
async fn test_claim_race_leaves_assignment_intact() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "hot.md", 50);

    harness
        .lifecycle
        .claim(&file.id, "alice")
        .await
        .expect("first claim");
    let err = harness.lifecycle.claim(&file.id, "mora").await.unwrap_err();
    assert_eq!(err.kind(), "conflict");

    let stored = harness.db.get_file(&file.id).expect("get").expect("exists");
    assert_eq!(stored.assigned_translator_id.as_deref(), Some("alice"));
    assert_eq!(stored.status, FileStatus::InProgress);
}

#[tokio::test]
async fn test_submit_skipping_claim_fails() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "skipped.md", 50);

    let err = harness
        .lifecycle
        .submit(&file.id, "alice", "texto")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
    assert!(harness.review.find_by_file(&file.id).expect("find").is_none());
}

#[tokio::test]
async fn test_whitespace_submission_keeps_file_in_progress() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "empty.md", 50);

    harness
        .lifecycle
        .claim(&file.id, "alice")
        .await
        .expect("claim");
    let err = harness
        .lifecycle
        .submit(&file.id, "alice", " \n\t ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let stored = harness.db.get_file(&file.id).expect("get").expect("exists");
    assert_eq!(stored.status, FileStatus::InProgress);
}

#[tokio::test]
async fn test_terminal_file_cannot_be_re_resolved() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "done.md", 120);
    accept_file(&harness, &file.id).await;

    let err = harness
        .lifecycle
        .resolve(
            &file.id,
            "mora",
            UserRole::Moderator,
            ReviewDecision::Accept,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_state");

    // No double credit
    let profile = harness.db.get_profile("alice").expect("get").expect("exists");
    assert_eq!(profile.total_words_translated, 120);
    assert_eq!(profile.approved_translations, 1);
}

// ==================== Certification Interplay ====================

#[tokio::test]
async fn test_manual_claim_and_milestone_sweep_do_not_double_award() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "big.md", 700);
    accept_file(&harness, &file.id).await;

    // The acceptance sweep already took tier-500; a direct claim is a no-op
    let direct = harness
        .certification
        .award_certificate("alice", "tier-500")
        .expect("award");
    assert!(direct.is_none());

    // And another sweep finds nothing new
    let swept = harness.certification.check_milestones("alice").expect("sweep");
    assert!(swept.is_empty());

    assert_eq!(
        harness
            .db
            .list_certificates_for_user("alice")
            .expect("list")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_progress_view_tracks_pipeline() {
    let harness = create_harness();
    seed_users(&harness);
    let file = seed_file(&harness, "mid.md", 2_750);
    accept_file(&harness, &file.id).await;

    let profile = harness.db.get_profile("alice").expect("get").expect("exists");
    let progress = calculate_progress(&profile);
    assert_eq!(progress.current_tier.expect("tier").id, "tier-500");
    assert_eq!(progress.next_tier.expect("tier").id, "tier-5k");
    // (2750 - 500) / (5000 - 500) = 50%
    assert!((progress.progress_percentage - 50.0).abs() < f64::EPSILON);
    // tier-500 is owned already, nothing else is reached
    assert!(progress.available_certificates.is_empty());
}

// ==================== Concurrency ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_acceptances_for_one_translator() {
    let harness = create_harness();
    seed_users(&harness);

    // Ten files, each 100 words, all claimed and submitted by alice
    let mut file_ids = Vec::new();
    for i in 0..10 {
        let file = seed_file(&harness, &format!("chunk-{}.md", i), 100);
        harness
            .lifecycle
            .claim(&file.id, "alice")
            .await
            .expect("claim");
        harness
            .lifecycle
            .submit(&file.id, "alice", "texto listo")
            .await
            .expect("submit");
        file_ids.push(file.id);
    }

    // Resolved concurrently by different reviewers
    let mut handles = Vec::new();
    for file_id in file_ids {
        let lifecycle = harness.lifecycle.clone();
        handles.push(tokio::spawn(async move {
            lifecycle
                .resolve(
                    &file_id,
                    "mora",
                    UserRole::Moderator,
                    ReviewDecision::Accept,
                    None,
                )
                .await
                .expect("resolve")
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    let profile = harness.db.get_profile("alice").expect("get").expect("exists");
    assert_eq!(profile.total_words_translated, 1_000);
    assert_eq!(profile.approved_translations, 10);

    // Crossing 500 mid-burst still mints exactly one certificate
    let certificates = harness
        .db
        .list_certificates_for_user("alice")
        .expect("list");
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0].tier_id, "tier-500");
}
