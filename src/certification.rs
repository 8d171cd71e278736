use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Certificate, CertificateTier, UserProfile};

/// Issuer name stamped onto every certificate.
pub const PLATFORM_NAME: &str = "Crowd Translate";

/// Milestone tiers, ordered by strictly increasing word threshold.
pub const TIERS: &[CertificateTier] = &[
    CertificateTier {
        id: "tier-500",
        word_threshold: 500,
        name: "Apprentice Translator",
        category: "translation",
    },
    CertificateTier {
        id: "tier-5k",
        word_threshold: 5_000,
        name: "Contributor",
        category: "translation",
    },
    CertificateTier {
        id: "tier-20k",
        word_threshold: 20_000,
        name: "Senior Translator",
        category: "translation",
    },
    CertificateTier {
        id: "tier-50k",
        word_threshold: 50_000,
        name: "Expert Translator",
        category: "translation",
    },
    CertificateTier {
        id: "tier-100k",
        word_threshold: 100_000,
        name: "Master Translator",
        category: "translation",
    },
];

pub fn tier_by_id(tier_id: &str) -> Option<&'static CertificateTier> {
    TIERS.iter().find(|tier| tier.id == tier_id)
}

/// Where a user stands relative to the tier ladder.
#[derive(Debug, Clone, Serialize)]
pub struct TierProgress {
    pub current_tier: Option<CertificateTier>,
    pub next_tier: Option<CertificateTier>,
    pub progress_percentage: f64,
    pub available_certificates: Vec<CertificateTier>,
}

/// Pure tier math over a profile snapshot. A word count exactly on a
/// threshold qualifies for that tier.
pub fn calculate_progress(profile: &UserProfile) -> TierProgress {
    let total = profile.total_words_translated;

    let current_tier = TIERS
        .iter()
        .filter(|tier| tier.word_threshold <= total)
        .last()
        .copied();
    let next_tier = TIERS.iter().find(|tier| tier.word_threshold > total).copied();

    let progress_percentage = match (current_tier, next_tier) {
        (_, None) => 100.0,
        (current, Some(next)) => {
            let base = current.map(|tier| tier.word_threshold).unwrap_or(0);
            let span = (next.word_threshold - base) as f64;
            let gained = (total - base) as f64;
            (gained / span * 100.0).clamp(0.0, 100.0)
        }
    };

    let available_certificates = TIERS
        .iter()
        .filter(|tier| {
            tier.word_threshold <= total && !profile.certificates.iter().any(|c| c == tier.id)
        })
        .copied()
        .collect();

    TierProgress {
        current_tier,
        next_tier,
        progress_percentage,
        available_certificates,
    }
}

fn is_unique_violation(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Mints milestone certificates. Award idempotence comes from the
/// conditional tier-ownership insert: only the caller that wins it creates
/// the certificate record, every other caller gets the no-op result.
#[derive(Clone)]
pub struct CertificationEngine {
    db: Database,
}

impl CertificationEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Award one tier to one user. Returns `Ok(None)` when the tier was
    /// already owned at the time of the conditional check — a designed
    /// no-op, not an error — and `Validation` when the user has not reached
    /// the threshold.
    pub fn award_certificate(
        &self,
        user_id: &str,
        tier_id: &str,
    ) -> AppResult<Option<Certificate>> {
        let tier = tier_by_id(tier_id)
            .ok_or_else(|| AppError::Validation(format!("unknown tier: {}", tier_id)))?;

        let profile = self
            .db
            .get_profile(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;

        if profile.certificates.iter().any(|c| c == tier.id) {
            return Ok(None);
        }
        if profile.total_words_translated < tier.word_threshold {
            return Err(AppError::Validation(format!(
                "{} words translated, tier {} requires {}",
                profile.total_words_translated, tier.id, tier.word_threshold
            )));
        }

        // The conditional insert decides the single winner under races.
        if !self.db.try_own_tier(user_id, tier.id)? {
            return Ok(None);
        }

        let certificate = self.mint_certificate(user_id, tier)?;
        info!(
            "Awarded {} ({}) to {} with code {}",
            tier.name, tier.id, user_id, certificate.verification_code
        );
        Ok(Some(certificate))
    }

    /// Sweep every reached-but-unowned tier for this user. Safe to call
    /// after each acceptance; already-owned tiers come back as no-ops and
    /// are excluded from the result.
    pub fn check_milestones(&self, user_id: &str) -> AppResult<Vec<Certificate>> {
        let profile = self
            .db
            .get_profile(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;

        let mut minted = Vec::new();
        for tier in calculate_progress(&profile).available_certificates {
            if let Some(certificate) = self.award_certificate(user_id, tier.id)? {
                minted.push(certificate);
            }
        }
        Ok(minted)
    }

    /// Create the certificate record with a fresh verification code. Codes
    /// come from a cryptographically secure source and are checked for
    /// global uniqueness before commit; a collision regenerates.
    fn mint_certificate(
        &self,
        user_id: &str,
        tier: &CertificateTier,
    ) -> AppResult<Certificate> {
        const MAX_ATTEMPTS: usize = 4;

        let mut last_err = None;
        for _ in 0..MAX_ATTEMPTS {
            let code = Uuid::new_v4().simple().to_string();
            if self.db.verification_code_exists(&code)? {
                continue;
            }
            let certificate = Certificate {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                tier_id: tier.id.to_string(),
                verification_code: code,
                project_name: PLATFORM_NAME.to_string(),
                category: tier.category.to_string(),
                created_at: Utc::now().to_rfc3339(),
            };
            match self.db.insert_certificate(&certificate) {
                Ok(()) => return Ok(certificate),
                Err(err) if is_unique_violation(&err) => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "could not generate a unique verification code"
            ))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use regex::Regex;
    use tempfile::TempDir;

    fn create_test_engine() -> (CertificationEngine, Database, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("certs.db");
        let db = Database::new(db_path.to_str().unwrap()).expect("db");
        (CertificationEngine::new(db.clone()), db, temp_dir)
    }

    fn profile_with_words(words: i64, certificates: Vec<String>) -> UserProfile {
        UserProfile {
            user_id: "u1".to_string(),
            display_name: "Alice".to_string(),
            role: UserRole::Contributor,
            total_words_translated: words,
            approved_translations: 0,
            rejected_translations: 0,
            contributed_files: vec![],
            certificates,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn credit_words(db: &Database, user_id: &str, words: i64) {
        db.ensure_profile(user_id, "Alice", UserRole::Contributor)
            .expect("profile");
        db.record_acceptance(user_id, "seed-file", "seed", words)
            .expect("credit");
    }

    // ==================== Tier Table Tests ====================

    #[test]
    fn test_tiers_strictly_increasing() {
        for pair in TIERS.windows(2) {
            assert!(pair[0].word_threshold < pair[1].word_threshold);
        }
    }

    #[test]
    fn test_tier_by_id() {
        assert_eq!(tier_by_id("tier-500").unwrap().word_threshold, 500);
        assert!(tier_by_id("tier-999").is_none());
    }

    // ==================== Progress Tests ====================

    #[test]
    fn test_progress_below_first_tier() {
        let progress = calculate_progress(&profile_with_words(250, vec![]));
        assert!(progress.current_tier.is_none());
        assert_eq!(progress.next_tier.unwrap().id, "tier-500");
        assert!((progress.progress_percentage - 50.0).abs() < f64::EPSILON);
        assert!(progress.available_certificates.is_empty());
    }

    #[test]
    fn test_progress_exactly_on_threshold() {
        // A word count equal to the threshold qualifies
        let progress = calculate_progress(&profile_with_words(500, vec![]));
        assert_eq!(progress.current_tier.unwrap().id, "tier-500");
        assert_eq!(progress.next_tier.unwrap().id, "tier-5k");
        assert!((progress.progress_percentage - 0.0).abs() < f64::EPSILON);
        assert_eq!(progress.available_certificates.len(), 1);
        assert_eq!(progress.available_certificates[0].id, "tier-500");
    }

    #[test]
    fn test_progress_between_tiers() {
        // Halfway from 5k to 20k
        let progress = calculate_progress(&profile_with_words(12_500, vec![]));
        assert_eq!(progress.current_tier.unwrap().id, "tier-5k");
        assert_eq!(progress.next_tier.unwrap().id, "tier-20k");
        assert!((progress.progress_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_past_last_tier() {
        let progress = calculate_progress(&profile_with_words(250_000, vec![]));
        assert_eq!(progress.current_tier.unwrap().id, "tier-100k");
        assert!(progress.next_tier.is_none());
        assert!((progress.progress_percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(progress.available_certificates.len(), TIERS.len());
    }

    #[test]
    fn test_progress_excludes_owned_tiers() {
        let progress =
            calculate_progress(&profile_with_words(6_000, vec!["tier-500".to_string()]));
        let available: Vec<&str> = progress
            .available_certificates
            .iter()
            .map(|tier| tier.id)
            .collect();
        assert_eq!(available, vec!["tier-5k"]);
    }

    #[test]
    fn test_progress_zero_words() {
        let progress = calculate_progress(&profile_with_words(0, vec![]));
        assert!(progress.current_tier.is_none());
        assert!((progress.progress_percentage - 0.0).abs() < f64::EPSILON);
    }

    // ==================== Award Tests ====================

    #[test]
    fn test_award_mints_certificate() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 600);

        let certificate = engine
            .award_certificate("u1", "tier-500")
            .expect("award")
            .expect("minted");
        assert_eq!(certificate.tier_id, "tier-500");
        assert_eq!(certificate.user_id, "u1");
        assert_eq!(certificate.project_name, PLATFORM_NAME);

        let code_shape = Regex::new(r"^[0-9a-f]{32}$").unwrap();
        assert!(code_shape.is_match(&certificate.verification_code));
    }

    #[test]
    fn test_award_twice_is_noop_second_time() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 600);

        let first = engine.award_certificate("u1", "tier-500").expect("first");
        assert!(first.is_some());
        let second = engine.award_certificate("u1", "tier-500").expect("second");
        assert!(second.is_none());

        assert_eq!(db.list_certificates_for_user("u1").expect("list").len(), 1);
    }

    #[test]
    fn test_award_concurrent_single_certificate() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 600);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine
                        .award_certificate("u1", "tier-500")
                        .expect("award")
                        .is_some()
                })
            })
            .collect();
        let minted = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .filter(|minted| *minted)
            .count();

        assert_eq!(minted, 1);
        assert_eq!(db.list_certificates_for_user("u1").expect("list").len(), 1);
    }

    #[test]
    fn test_award_below_threshold_fails() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 100);

        let err = engine.award_certificate("u1", "tier-500").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert!(db.list_certificates_for_user("u1").expect("list").is_empty());
    }

    #[test]
    fn test_award_unknown_tier() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 600);
        let err = engine.award_certificate("u1", "tier-nope").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_award_missing_profile() {
        let (engine, _db, _tmp) = create_test_engine();
        let err = engine.award_certificate("ghost", "tier-500").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    // ==================== Milestone Sweep Tests ====================

    #[test]
    fn test_check_milestones_awards_all_reached() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 25_000);

        let minted = engine.check_milestones("u1").expect("sweep");
        let tier_ids: Vec<&str> = minted.iter().map(|c| c.tier_id.as_str()).collect();
        assert_eq!(tier_ids, vec!["tier-500", "tier-5k", "tier-20k"]);
    }

    #[test]
    fn test_check_milestones_is_idempotent() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 700);

        assert_eq!(engine.check_milestones("u1").expect("first").len(), 1);
        assert!(engine.check_milestones("u1").expect("second").is_empty());
        assert_eq!(db.list_certificates_for_user("u1").expect("list").len(), 1);
    }

    #[test]
    fn test_check_milestones_nothing_reached() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 10);
        assert!(engine.check_milestones("u1").expect("sweep").is_empty());
    }

    #[test]
    fn test_verification_codes_are_unique() {
        let (engine, db, _tmp) = create_test_engine();
        credit_words(&db, "u1", 120_000);

        let minted = engine.check_milestones("u1").expect("sweep");
        assert_eq!(minted.len(), TIERS.len());

        let mut codes: Vec<&str> = minted
            .iter()
            .map(|c| c.verification_code.as_str())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), TIERS.len());
    }
}
