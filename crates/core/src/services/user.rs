//! User service.

use std::sync::Arc;

use sawab_common::{AppError, AppResult};
use sawab_db::{entities::user, repositories::UserRepository};
use sea_orm::DatabaseConnection;
use serde::Serialize;

/// Largest leaderboard page.
const MAX_LEADERBOARD: u64 = 100;

/// Public leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub sawab_balance: i32,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            user_repo: UserRepository::new(db),
        }
    }

    /// Resolve an access token to a user.
    ///
    /// Unknown tokens are `Unauthorized`; banned users are `Forbidden`.
    pub async fn authenticate(&self, token: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if user.is_banned() {
            return Err(AppError::Forbidden("Account is banned".to_string()));
        }
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Get a user by username, case-insensitively.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User @{username}")))
    }

    /// Users with the highest balance; ties ordered by username.
    pub async fn leaderboard(&self, limit: u64) -> AppResult<Vec<LeaderboardEntry>> {
        let users = self
            .user_repo
            .leaderboard(limit.clamp(1, MAX_LEADERBOARD))
            .await?;

        Ok(users
            .into_iter()
            .enumerate()
            .map(|(i, user)| LeaderboardEntry {
                rank: i + 1,
                id: user.id,
                username: user.username,
                name: user.name,
                sawab_balance: user.sawab_balance,
            })
            .collect())
    }
}
