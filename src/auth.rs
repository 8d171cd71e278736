use tracing::debug;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::UserRole;

/// An authenticated caller, as established by token verification.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: String,
    pub display_name: String,
    pub role: UserRole,
}

/// Bearer-token verification against the operator-seeded token table.
///
/// Tokens are issued elsewhere; this only maps a presented credential to an
/// identity. The first successful verification creates the user's
/// contribution profile, so statistics always have a row to land on before
/// any file is assigned.
#[derive(Clone)]
pub struct Authenticator {
    db: Database,
}

impl Authenticator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn verify_bearer(&self, authorization: Option<&str>) -> AppResult<AuthedUser> {
        let header = authorization.ok_or(AppError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?
            .trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let (user_id, display_name, role) =
            self.db.find_token(token)?.ok_or(AppError::Unauthorized)?;

        self.db.ensure_profile(&user_id, &display_name, role)?;
        debug!("Authenticated {} as {}", user_id, role.as_str());
        Ok(AuthedUser {
            user_id,
            display_name,
            role,
        })
    }
}
