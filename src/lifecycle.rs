use chrono::{Duration, Utc};
use tracing::info;

use crate::certification::CertificationEngine;
use crate::content::{count_words, ContentStore};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::ledger::StatsLedger;
use crate::models::{
    Certificate, FileStatus, ReviewDecision, ReviewTask, TranslatableFile, UserProfile, UserRole,
};

/// Everything a review resolution produced: the terminal file, the mirrored
/// task, the translator's post-update statistics, and any certificates the
/// acceptance just unlocked.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub file: TranslatableFile,
    pub task: Option<ReviewTask>,
    pub translator: UserProfile,
    pub new_certificates: Vec<Certificate>,
}

/// The state machine driving a file through
/// `not-started → in-progress → pending-review → accepted | rejected`.
///
/// Terminal transitions are the only place translator statistics and
/// certificates move, so the ledger and certification engine are invoked
/// from here and nowhere else.
#[derive(Clone)]
pub struct LifecycleEngine {
    db: Database,
    ledger: StatsLedger,
    certification: CertificationEngine,
    content: ContentStore,
    review_sla_hours: i64,
}

impl LifecycleEngine {
    pub fn new(
        db: Database,
        ledger: StatsLedger,
        certification: CertificationEngine,
        content: ContentStore,
        review_sla_hours: i64,
    ) -> Self {
        Self {
            db,
            ledger,
            certification,
            content,
            review_sla_hours,
        }
    }

    /// Reserve an unclaimed file for a translator.
    pub async fn claim(&self, file_id: &str, requester_id: &str) -> AppResult<TranslatableFile> {
        let file = self.db.claim_file(file_id, requester_id)?;
        info!("File {} claimed by {}", file_id, requester_id);
        Ok(file)
    }

    /// Hand in a finished translation. Updating the file and creating its
    /// review task commit as one unit; on any failure the file stays
    /// `in-progress` and no task exists.
    pub async fn submit(
        &self,
        file_id: &str,
        requester_id: &str,
        translated_text: &str,
    ) -> AppResult<(TranslatableFile, ReviewTask)> {
        if translated_text.trim().is_empty() {
            return Err(AppError::Validation(
                "translated text must not be empty".into(),
            ));
        }

        let due_date = (Utc::now() + Duration::hours(self.review_sla_hours)).to_rfc3339();
        let (file, task) = self
            .db
            .submit_file(file_id, requester_id, translated_text, &due_date, 0)?;
        info!(
            "File {} submitted for review by {} (task {}, due {})",
            file_id, requester_id, task.id, task.due_date
        );
        Ok((file, task))
    }

    /// Apply a reviewer's verdict to a submitted file. Acceptance credits
    /// the translator's statistics and sweeps certificate milestones;
    /// rejection only counts against them.
    pub async fn resolve(
        &self,
        file_id: &str,
        reviewer_id: &str,
        reviewer_role: UserRole,
        decision: ReviewDecision,
        comments: Option<&str>,
    ) -> AppResult<ResolveOutcome> {
        if !reviewer_role.can_review() {
            return Err(AppError::Forbidden(format!(
                "role {} cannot resolve reviews",
                reviewer_role.as_str()
            )));
        }

        // Fast-fail on state before any fallback I/O; the transition itself
        // re-checks the guard atomically.
        let file = self
            .db
            .get_file(file_id)?
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;
        if file.status != FileStatus::PendingReview {
            return Err(AppError::InvalidState(format!(
                "file {} cannot be resolved from status {}",
                file_id,
                file.status.as_str()
            )));
        }

        let word_count = match decision {
            ReviewDecision::Accept => Some(self.resolve_word_count(&file).await?),
            ReviewDecision::Reject => None,
        };

        let (mut file, task) = self
            .db
            .resolve_file(file_id, reviewer_id, decision, comments)?;
        let translator_id = file.assigned_translator_id.clone().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "file {} reached review with no assigned translator",
                file_id
            ))
        })?;

        let (translator, new_certificates) = match decision {
            ReviewDecision::Accept => {
                let word_count = word_count.unwrap_or(0);
                if word_count != file.word_count {
                    self.db.set_word_count(file_id, word_count)?;
                    file.word_count = word_count;
                }
                let profile = self.ledger.record_acceptance(
                    &translator_id,
                    file_id,
                    &file.label,
                    word_count,
                )?;
                let minted = self.certification.check_milestones(&translator_id)?;
                (profile, minted)
            }
            ReviewDecision::Reject => (self.ledger.record_rejection(&translator_id)?, Vec::new()),
        };

        info!(
            "File {} resolved as {:?} by {} ({} new certificates)",
            file_id,
            decision,
            reviewer_id,
            new_certificates.len()
        );
        Ok(ResolveOutcome {
            file,
            task,
            translator,
            new_certificates,
        })
    }

    /// Authoritative word count, in fallback order: the stored count when
    /// already computed, else the externally stored original, else the
    /// inline original text.
    async fn resolve_word_count(&self, file: &TranslatableFile) -> AppResult<i64> {
        if file.word_count > 0 {
            return Ok(file.word_count);
        }
        if let Some(url) = &file.content_url {
            let body = self.content.fetch_original(url).await?;
            return Ok(count_words(&body));
        }
        Ok(count_words(&file.original_text))
    }
}
