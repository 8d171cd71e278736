use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Certificate, ContributedFile, FileStatus, NewFile, Project, ReviewDecision, ReviewStatus,
    ReviewTask, TranslatableFile, UserProfile, UserRole,
};

/// Embedded store for the translation platform.
///
/// All writes that must be atomic run as SQL transactions on a single
/// connection; counter updates are expressed as `SET x = x + ?` so no
/// read-modify-write window exists in application code.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Wrap a domain conversion failure into a rusqlite row-mapping error.
fn conv_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranslatableFile> {
    let status_raw: String = row.get(3)?;
    Ok(TranslatableFile {
        id: row.get(0)?,
        project_id: row.get(1)?,
        label: row.get(2)?,
        status: FileStatus::from_str(&status_raw).map_err(conv_err)?,
        assigned_translator_id: row.get(4)?,
        reviewer_id: row.get(5)?,
        word_count: row.get(6)?,
        original_text: row.get(7)?,
        translated_text: row.get(8)?,
        content_url: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const FILE_COLUMNS: &str = "id, project_id, label, status, assigned_translator_id, reviewer_id, \
     word_count, original_text, translated_text, content_url, created_at, updated_at";

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewTask> {
    let status_raw: String = row.get(3)?;
    Ok(ReviewTask {
        id: row.get(0)?,
        file_id: row.get(1)?,
        reviewer_id: row.get(2)?,
        status: ReviewStatus::from_str(&status_raw).map_err(conv_err)?,
        priority: row.get(4)?,
        due_date: row.get(5)?,
        category: row.get(6)?,
        comments: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const TASK_COLUMNS: &str =
    "id, file_id, reviewer_id, status, priority, due_date, category, comments, created_at";

fn certificate_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tier_id: row.get(2)?,
        verification_code: row.get(3)?,
        project_name: row.get(4)?,
        category: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const CERTIFICATE_COLUMNS: &str =
    "id, user_id, tier_id, verification_code, project_name, category, created_at";

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let categories_raw: String = row.get(2)?;
    let categories = serde_json::from_str(&categories_raw).unwrap_or_else(|e| {
        warn!("Unreadable categories column, treating as empty: {}", e);
        Vec::new()
    });
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        categories,
        created_at: row.get(3)?,
    })
}

/// Load a full profile snapshot (counters + contributions + owned tiers).
fn load_profile(conn: &Connection, user_id: &str) -> AppResult<Option<UserProfile>> {
    let base = conn
        .query_row(
            "SELECT user_id, display_name, role, total_words_translated,
                    approved_translations, rejected_translations, created_at
             FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                let role_raw: String = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    UserRole::from_str(&role_raw).map_err(conv_err)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    let (user_id, display_name, role, total, approved, rejected, created_at) = match base {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut stmt = conn.prepare(
        "SELECT file_id, label FROM contributed_files WHERE user_id = ?1 ORDER BY file_id",
    )?;
    let contributed_files = stmt
        .query_map(params![user_id], |row| {
            Ok(ContributedFile {
                file_id: row.get(0)?,
                label: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT tier_id FROM owned_tiers WHERE user_id = ?1 ORDER BY tier_id")?;
    let certificates = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(UserProfile {
        user_id,
        display_name,
        role,
        total_words_translated: total,
        approved_translations: approved,
        rejected_translations: rejected,
        contributed_files,
        certificates,
        created_at,
    }))
}

impl Database {
    /// Open the store and create the schema if it does not exist yet.
    pub fn new(database_path: &str) -> AppResult<Self> {
        let conn = Connection::open(database_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                categories TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                label TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'not-started',
                assigned_translator_id TEXT,
                reviewer_id TEXT,
                word_count INTEGER NOT NULL DEFAULT 0,
                original_text TEXT NOT NULL,
                translated_text TEXT,
                content_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_files_project ON files (project_id);
            CREATE INDEX IF NOT EXISTS idx_files_assignee ON files (assigned_translator_id);
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'contributor',
                total_words_translated INTEGER NOT NULL DEFAULT 0,
                approved_translations INTEGER NOT NULL DEFAULT 0,
                rejected_translations INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS contributed_files (
                user_id TEXT NOT NULL,
                file_id TEXT NOT NULL,
                label TEXT NOT NULL,
                PRIMARY KEY (user_id, file_id)
            );
            CREATE TABLE IF NOT EXISTS owned_tiers (
                user_id TEXT NOT NULL,
                tier_id TEXT NOT NULL,
                PRIMARY KEY (user_id, tier_id)
            );
            CREATE TABLE IF NOT EXISTS review_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL,
                reviewer_id TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                priority INTEGER NOT NULL DEFAULT 0,
                due_date TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                comments TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_review_tasks_file ON review_tasks (file_id);
            CREATE TABLE IF NOT EXISTS certificates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                tier_id TEXT NOT NULL,
                verification_code TEXT NOT NULL UNIQUE,
                project_name TEXT NOT NULL,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_certificates_user ON certificates (user_id);
            CREATE TABLE IF NOT EXISTS api_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL DEFAULT 'contributor',
                created_at TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ==================== Profiles ====================

    /// Create the profile row on first authentication; later calls are
    /// no-ops that return the current snapshot.
    pub fn ensure_profile(
        &self,
        user_id: &str,
        display_name: &str,
        role: UserRole,
    ) -> AppResult<UserProfile> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO profiles (user_id, display_name, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, display_name, role.as_str(), now()],
        )?;
        load_profile(&conn, user_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
    }

    pub fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let conn = self.conn.lock().unwrap();
        load_profile(&conn, user_id)
    }

    /// Credit an accepted translation: bump both counters and record the
    /// contributed file, atomically, without reading first. Two concurrent
    /// acceptances for the same user both land.
    pub fn record_acceptance(
        &self,
        user_id: &str,
        file_id: &str,
        label: &str,
        word_count: i64,
    ) -> AppResult<UserProfile> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE profiles
             SET total_words_translated = total_words_translated + ?1,
                 approved_translations = approved_translations + 1
             WHERE user_id = ?2",
            params![word_count, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("profile {}", user_id)));
        }

        tx.execute(
            "INSERT OR IGNORE INTO contributed_files (user_id, file_id, label)
             VALUES (?1, ?2, ?3)",
            params![user_id, file_id, label],
        )?;

        let profile = load_profile(&tx, user_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;
        tx.commit()?;
        Ok(profile)
    }

    /// Count a rejected translation. No word credit.
    pub fn record_rejection(&self, user_id: &str) -> AppResult<UserProfile> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE profiles SET rejected_translations = rejected_translations + 1
             WHERE user_id = ?1",
            params![user_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("profile {}", user_id)));
        }

        let profile = load_profile(&tx, user_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;
        tx.commit()?;
        Ok(profile)
    }

    /// Add a tier to the user's owned set if absent. Returns true only for
    /// the caller that actually inserted the row; everyone else sees false.
    /// This is the compare-and-set that makes certificate awards
    /// exactly-once.
    pub fn try_own_tier(&self, user_id: &str, tier_id: &str) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO owned_tiers (user_id, tier_id) VALUES (?1, ?2)",
            params![user_id, tier_id],
        )?;
        Ok(inserted == 1)
    }

    // ==================== API Tokens ====================

    /// Register (or replace) an operator-seeded token → identity mapping.
    pub fn upsert_token(
        &self,
        token: &str,
        user_id: &str,
        display_name: &str,
        role: UserRole,
    ) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO api_tokens (token, user_id, display_name, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![token, user_id, display_name, role.as_str(), now()],
        )?;
        Ok(())
    }

    pub fn find_token(&self, token: &str) -> AppResult<Option<(String, String, UserRole)>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, display_name, role FROM api_tokens WHERE token = ?1",
                params![token],
                |row| {
                    let role_raw: String = row.get(2)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        UserRole::from_str(&role_raw).map_err(conv_err)?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    // ==================== Projects & Files ====================

    /// Seed a project and all of its files as one all-or-nothing batch.
    pub fn create_project(
        &self,
        name: &str,
        categories: &[String],
        files: &[NewFile],
    ) -> AppResult<(Project, Vec<TranslatableFile>)> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("project name must not be empty".into()));
        }
        for file in files {
            if file.label.trim().is_empty() {
                return Err(AppError::Validation("file label must not be empty".into()));
            }
            if file.original_text.trim().is_empty() && file.content_url.is_none() {
                return Err(AppError::Validation(format!(
                    "file {} has neither inline text nor a content url",
                    file.label
                )));
            }
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let created_at = now();
        let project_id = Uuid::new_v4().to_string();
        let categories_json =
            serde_json::to_string(categories).map_err(|e| AppError::Internal(e.into()))?;

        tx.execute(
            "INSERT INTO projects (id, name, categories, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![project_id, name, categories_json, created_at],
        )?;

        let mut created_files = Vec::with_capacity(files.len());
        for file in files {
            let file_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO files (id, project_id, label, status, word_count, original_text,
                                    content_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'not-started', ?4, ?5, ?6, ?7, ?7)",
                params![
                    file_id,
                    project_id,
                    file.label,
                    file.word_count.unwrap_or(0),
                    file.original_text,
                    file.content_url,
                    created_at
                ],
            )?;
            let created = tx.query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![file_id],
                file_from_row,
            )?;
            created_files.push(created);
        }

        let project = tx.query_row(
            "SELECT id, name, categories, created_at FROM projects WHERE id = ?1",
            params![project_id],
            project_from_row,
        )?;
        tx.commit()?;
        Ok((project, created_files))
    }

    pub fn get_project(&self, project_id: &str) -> AppResult<Option<Project>> {
        let conn = self.conn.lock().unwrap();
        let project = conn
            .query_row(
                "SELECT id, name, categories, created_at FROM projects WHERE id = ?1",
                params![project_id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Projects that still have unclaimed files.
    pub fn list_available_projects(&self) -> AppResult<Vec<Project>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT p.id, p.name, p.categories, p.created_at
             FROM projects p
             JOIN files f ON f.project_id = p.id
             WHERE f.status = 'not-started'
             ORDER BY p.created_at DESC",
        )?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn list_project_files(&self, project_id: &str) -> AppResult<Vec<TranslatableFile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE project_id = ?1 ORDER BY label",
            FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map(params![project_id], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    pub fn get_file(&self, file_id: &str) -> AppResult<Option<TranslatableFile>> {
        let conn = self.conn.lock().unwrap();
        let file = conn
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![file_id],
                file_from_row,
            )
            .optional()?;
        Ok(file)
    }

    /// Files a translator currently has in flight.
    pub fn list_assigned_files(&self, user_id: &str) -> AppResult<Vec<TranslatableFile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files
             WHERE assigned_translator_id = ?1 AND status IN ('in-progress', 'pending-review')
             ORDER BY updated_at DESC",
            FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map(params![user_id], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Persist an authoritative word count once it has been resolved.
    pub fn set_word_count(&self, file_id: &str, word_count: i64) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE files SET word_count = ?1 WHERE id = ?2",
            params![word_count, file_id],
        )?;
        Ok(())
    }

    // ==================== Lifecycle Transitions ====================

    /// Reserve an unassigned file for a translator. The guard and the write
    /// run in one transaction, so a lost race is reported as a conflict and
    /// never overwrites the winner's assignment.
    pub fn claim_file(&self, file_id: &str, user_id: &str) -> AppResult<TranslatableFile> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let file = tx
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![file_id],
                file_from_row,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;

        if file.assigned_translator_id.is_some() {
            return Err(AppError::Conflict(format!(
                "file {} is already claimed",
                file_id
            )));
        }
        if file.status != FileStatus::NotStarted {
            return Err(AppError::InvalidState(format!(
                "file {} cannot be claimed from status {}",
                file_id,
                file.status.as_str()
            )));
        }

        tx.execute(
            "UPDATE files
             SET assigned_translator_id = ?1, status = 'in-progress', updated_at = ?2
             WHERE id = ?3",
            params![user_id, now(), file_id],
        )?;
        let updated = tx.query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
            params![file_id],
            file_from_row,
        )?;
        tx.commit()?;
        Ok(updated)
    }

    /// Move a claimed file to `pending-review` and create its review task.
    /// Both writes commit together or not at all.
    pub fn submit_file(
        &self,
        file_id: &str,
        requester_id: &str,
        translated_text: &str,
        due_date: &str,
        priority: i64,
    ) -> AppResult<(TranslatableFile, ReviewTask)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let file = tx
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![file_id],
                file_from_row,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;

        if file.status != FileStatus::InProgress {
            return Err(AppError::InvalidState(format!(
                "file {} cannot be submitted from status {}",
                file_id,
                file.status.as_str()
            )));
        }
        if file.assigned_translator_id.as_deref() != Some(requester_id) {
            return Err(AppError::Forbidden(format!(
                "file {} is not assigned to {}",
                file_id, requester_id
            )));
        }

        let stamp = now();
        tx.execute(
            "UPDATE files SET translated_text = ?1, status = 'pending-review', updated_at = ?2
             WHERE id = ?3",
            params![translated_text, stamp, file_id],
        )?;

        // Category is inherited from the project; a missing or unreadable
        // project must not block the submission.
        let category = tx
            .query_row(
                "SELECT id, name, categories, created_at FROM projects WHERE id = ?1",
                params![file.project_id],
                project_from_row,
            )
            .optional()?
            .map(|p| p.primary_category())
            .unwrap_or_else(|| {
                warn!(
                    "Project {} missing while submitting file {}, using default category",
                    file.project_id, file_id
                );
                "general".to_string()
            });

        tx.execute(
            "INSERT INTO review_tasks (file_id, status, priority, due_date, category, created_at)
             VALUES (?1, 'pending', ?2, ?3, ?4, ?5)",
            params![file_id, priority, due_date, category, stamp],
        )?;
        let task_id = tx.last_insert_rowid();

        let updated = tx.query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
            params![file_id],
            file_from_row,
        )?;
        let task = tx.query_row(
            &format!("SELECT {} FROM review_tasks WHERE id = ?1", TASK_COLUMNS),
            params![task_id],
            task_from_row,
        )?;
        tx.commit()?;
        Ok((updated, task))
    }

    /// Apply a review verdict: move the file to its terminal status and
    /// resolve the matching pending task to the mirrored status.
    pub fn resolve_file(
        &self,
        file_id: &str,
        reviewer_id: &str,
        decision: ReviewDecision,
        comments: Option<&str>,
    ) -> AppResult<(TranslatableFile, Option<ReviewTask>)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let file = tx
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![file_id],
                file_from_row,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;

        if file.status != FileStatus::PendingReview {
            return Err(AppError::InvalidState(format!(
                "file {} cannot be resolved from status {}",
                file_id,
                file.status.as_str()
            )));
        }

        let (file_status, task_status) = match decision {
            ReviewDecision::Accept => (FileStatus::Accepted, ReviewStatus::Approved),
            ReviewDecision::Reject => (FileStatus::Rejected, ReviewStatus::Rejected),
        };

        let stamp = now();
        tx.execute(
            "UPDATE files SET status = ?1, reviewer_id = ?2, updated_at = ?3 WHERE id = ?4",
            params![file_status.as_str(), reviewer_id, stamp, file_id],
        )?;

        let mirrored = tx.execute(
            "UPDATE review_tasks SET status = ?1, reviewer_id = ?2, comments = ?3
             WHERE file_id = ?4 AND status = 'pending'",
            params![task_status.as_str(), reviewer_id, comments, file_id],
        )?;
        if mirrored == 0 {
            warn!(
                "No pending review task found for file {} while resolving",
                file_id
            );
        }

        let updated = tx.query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
            params![file_id],
            file_from_row,
        )?;
        let task = tx
            .query_row(
                &format!(
                    "SELECT {} FROM review_tasks WHERE file_id = ?1 ORDER BY id DESC LIMIT 1",
                    TASK_COLUMNS
                ),
                params![file_id],
                task_from_row,
            )
            .optional()?;
        tx.commit()?;
        Ok((updated, task))
    }

    // ==================== Review Tasks ====================

    pub fn find_task_by_file(&self, file_id: &str) -> AppResult<Option<ReviewTask>> {
        let conn = self.conn.lock().unwrap();
        let task = conn
            .query_row(
                &format!(
                    "SELECT {} FROM review_tasks WHERE file_id = ?1 ORDER BY id DESC LIMIT 1",
                    TASK_COLUMNS
                ),
                params![file_id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_pending_tasks(&self) -> AppResult<Vec<ReviewTask>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM review_tasks WHERE status = 'pending' ORDER BY due_date",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Pending tasks whose due date has passed. RFC 3339 timestamps in UTC
    /// compare correctly as strings.
    pub fn list_overdue_tasks(&self, now_iso: &str) -> AppResult<Vec<ReviewTask>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM review_tasks WHERE status = 'pending' AND due_date < ?1
             ORDER BY due_date",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![now_iso], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    // ==================== Certificates ====================

    pub fn verification_code_exists(&self, code: &str) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM certificates WHERE verification_code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_certificate(&self, certificate: &Certificate) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO certificates (id, user_id, tier_id, verification_code, project_name,
                                       category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                certificate.id,
                certificate.user_id,
                certificate.tier_id,
                certificate.verification_code,
                certificate.project_name,
                certificate.category,
                certificate.created_at
            ],
        )?;
        Ok(())
    }

    pub fn find_certificate_by_code(&self, code: &str) -> AppResult<Option<Certificate>> {
        let conn = self.conn.lock().unwrap();
        let certificate = conn
            .query_row(
                &format!(
                    "SELECT {} FROM certificates WHERE verification_code = ?1",
                    CERTIFICATE_COLUMNS
                ),
                params![code],
                certificate_from_row,
            )
            .optional()?;
        Ok(certificate)
    }

    pub fn list_certificates_for_user(&self, user_id: &str) -> AppResult<Vec<Certificate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM certificates WHERE user_id = ?1 ORDER BY created_at",
            CERTIFICATE_COLUMNS
        ))?;
        let certificates = stmt
            .query_map(params![user_id], certificate_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(certificates)
    }
}
