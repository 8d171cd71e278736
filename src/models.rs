use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lifecycle status of a translatable file.
///
/// `Accepted` and `Rejected` are terminal; no operation leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    NotStarted,
    InProgress,
    PendingReview,
    Accepted,
    Rejected,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::NotStarted => "not-started",
            FileStatus::InProgress => "in-progress",
            FileStatus::PendingReview => "pending-review",
            FileStatus::Accepted => "accepted",
            FileStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "not-started" => Ok(FileStatus::NotStarted),
            "in-progress" => Ok(FileStatus::InProgress),
            "pending-review" => Ok(FileStatus::PendingReview),
            "accepted" => Ok(FileStatus::Accepted),
            "rejected" => Ok(FileStatus::Rejected),
            other => Err(AppError::Validation(format!(
                "unknown file status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Accepted | FileStatus::Rejected)
    }
}

/// Platform role attached to a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Contributor,
    Bot,
    Moderator,
    Administrator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Contributor => "contributor",
            UserRole::Bot => "bot",
            UserRole::Moderator => "moderator",
            UserRole::Administrator => "administrator",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "contributor" => Ok(UserRole::Contributor),
            "bot" => Ok(UserRole::Bot),
            "moderator" => Ok(UserRole::Moderator),
            "administrator" => Ok(UserRole::Administrator),
            other => Err(AppError::Validation(format!("unknown role: {}", other))),
        }
    }

    /// Whether this role may resolve submitted translations.
    pub fn can_review(&self) -> bool {
        matches!(self, UserRole::Moderator | UserRole::Administrator)
    }

    /// Whether this role may author projects and seed files.
    pub fn can_manage_projects(&self) -> bool {
        matches!(self, UserRole::Moderator | UserRole::Administrator)
    }
}

/// Outcome of a review task, mirroring the file's terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(AppError::Validation(format!(
                "unknown review status: {}",
                other
            ))),
        }
    }
}

/// A reviewer's verdict on a submitted translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Accept,
    Reject,
}

/// A translatable document inside a project.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatableFile {
    pub id: String,
    pub project_id: String,
    pub label: String,
    pub status: FileStatus,
    pub assigned_translator_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub word_count: i64,
    pub original_text: String,
    pub translated_text: Option<String>,
    /// External location of the original when it is too large to inline.
    pub content_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A file this user has had accepted, keyed by file id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributedFile {
    pub file_id: String,
    pub label: String,
}

/// A user's contribution record. Counters are monotonic and only ever
/// written through the statistics ledger; `certificates` is the set of
/// owned tier ids, not the certificate records themselves.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub role: UserRole,
    pub total_words_translated: i64,
    pub approved_translations: i64,
    pub rejected_translations: i64,
    pub contributed_files: Vec<ContributedFile>,
    pub certificates: Vec<String>,
    pub created_at: String,
}

/// Human-review bookkeeping for one submitted translation.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewTask {
    pub id: i64,
    pub file_id: String,
    pub reviewer_id: Option<String>,
    pub status: ReviewStatus,
    pub priority: i64,
    pub due_date: String,
    pub category: String,
    pub comments: Option<String>,
    pub created_at: String,
}

/// A milestone definition. The tier table is static configuration, see
/// `certification::TIERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CertificateTier {
    pub id: &'static str,
    pub word_threshold: i64,
    pub name: &'static str,
    pub category: &'static str,
}

/// An issued milestone certificate. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub tier_id: String,
    pub verification_code: String,
    pub project_name: String,
    pub category: String,
    pub created_at: String,
}

/// A translation project owning a set of files.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub created_at: String,
}

impl Project {
    /// Category inherited by review tasks for this project's files.
    pub fn primary_category(&self) -> String {
        self.categories
            .first()
            .cloned()
            .unwrap_or_else(|| "general".to_string())
    }
}

/// Input shape for seeding one file with its project.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFile {
    pub label: String,
    pub original_text: String,
    #[serde(default)]
    pub content_url: Option<String>,
    /// Pre-computed word count, if the importer already knows it.
    #[serde(default)]
    pub word_count: Option<i64>,
}
