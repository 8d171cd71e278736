use tracing::info;

use crate::db::Database;
use crate::error::AppResult;
use crate::models::UserProfile;

/// The only write path for contribution statistics.
///
/// Counters move through the store's atomic increments, so concurrent
/// acceptances of different files by the same translator all land; nothing
/// here reads before writing.
#[derive(Clone)]
pub struct StatsLedger {
    db: Database,
}

impl StatsLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Credit one accepted translation and return the post-update snapshot.
    /// Fails with `NotFound` if the profile was never initialized; callers
    /// must create profiles before assigning files.
    pub fn record_acceptance(
        &self,
        user_id: &str,
        file_id: &str,
        label: &str,
        word_count: i64,
    ) -> AppResult<UserProfile> {
        let profile = self
            .db
            .record_acceptance(user_id, file_id, label, word_count)?;
        info!(
            "Credited {} words to {} (total now {})",
            word_count, user_id, profile.total_words_translated
        );
        Ok(profile)
    }

    /// Count one rejected translation. No word credit.
    pub fn record_rejection(&self, user_id: &str) -> AppResult<UserProfile> {
        let profile = self.db.record_rejection(user_id)?;
        info!(
            "Recorded rejection for {} ({} total)",
            user_id, profile.rejected_translations
        );
        Ok(profile)
    }
}
