use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

/// The tracked-player roster: the working set the update and rotation engines
/// iterate over. Membership is case-insensitive with first-seen casing kept
/// for display, same as stat record identity.
#[async_trait]
pub trait RosterRepository: Send + Sync {
    /// Adds a player to the roster. Returns false if an equivalent identity
    /// was already tracked.
    async fn add_player(&self, player: &str) -> Result<bool, AppError>;

    /// Removes a player from the roster. Returns false if they were not
    /// tracked.
    async fn remove_player(&self, player: &str) -> Result<bool, AppError>;

    /// All tracked players, sorted case-insensitively.
    async fn list_players(&self) -> Result<Vec<String>, AppError>;

    async fn is_tracked(&self, player: &str) -> Result<bool, AppError>;
}

/// In-memory implementation of RosterRepository for development and testing
pub struct InMemoryRosterRepository {
    /// lowercase identity -> first-seen casing; BTreeMap keeps listings
    /// sorted the way the database implementation orders them.
    players: Mutex<BTreeMap<String, String>>,
}

impl Default for InMemoryRosterRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRosterRepository {
    pub fn new() -> Self {
        Self {
            players: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates a roster pre-populated with the given players
    pub fn with_players(players: Vec<String>) -> Self {
        let map = players
            .into_iter()
            .map(|p| (p.to_lowercase(), p))
            .collect();
        Self {
            players: Mutex::new(map),
        }
    }
}

#[async_trait]
impl RosterRepository for InMemoryRosterRepository {
    #[instrument(skip(self))]
    async fn add_player(&self, player: &str) -> Result<bool, AppError> {
        let mut players = self.players.lock().unwrap();
        let key = player.to_lowercase();
        if players.contains_key(&key) {
            debug!(player = %player, "Player already tracked in memory");
            return Ok(false);
        }

        players.insert(key, player.to_string());
        debug!(player = %player, "Player added to roster in memory");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn remove_player(&self, player: &str) -> Result<bool, AppError> {
        let mut players = self.players.lock().unwrap();
        let removed = players.remove(&player.to_lowercase()).is_some();
        debug!(player = %player, removed, "Roster removal in memory");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn list_players(&self) -> Result<Vec<String>, AppError> {
        let players = self.players.lock().unwrap();
        Ok(players.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn is_tracked(&self, player: &str) -> Result<bool, AppError> {
        let players = self.players.lock().unwrap();
        Ok(players.contains_key(&player.to_lowercase()))
    }
}

/// PostgreSQL implementation of the tracked-player roster
pub struct PostgresRosterRepository {
    pool: PgPool,
}

impl PostgresRosterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterRepository for PostgresRosterRepository {
    #[instrument(skip(self))]
    async fn add_player(&self, player: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO tracked_players (username) \
             SELECT $1 WHERE NOT EXISTS \
             (SELECT 1 FROM tracked_players WHERE LOWER(username) = LOWER($1))",
        )
        .bind(player)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to add player to roster");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove_player(&self, player: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tracked_players WHERE LOWER(username) = LOWER($1)")
            .bind(player)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to remove player from roster");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_players(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT username FROM tracked_players ORDER BY LOWER(username)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to list roster");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(rows.iter().map(|r| r.get("username")).collect())
    }

    #[instrument(skip(self))]
    async fn is_tracked(&self, player: &str) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM tracked_players WHERE LOWER(username) = LOWER($1)) AS present",
        )
        .bind(player)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed roster membership check");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(row.get("present"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_list_players() {
        let repo = InMemoryRosterRepository::new();

        assert!(repo.add_player("Charlie").await.unwrap());
        assert!(repo.add_player("alice").await.unwrap());
        assert!(repo.add_player("Bob").await.unwrap());

        let players = repo.list_players().await.unwrap();
        assert_eq!(players, vec!["alice", "Bob", "Charlie"]);
    }

    #[tokio::test]
    async fn test_membership_is_case_insensitive() {
        let repo = InMemoryRosterRepository::new();

        assert!(repo.add_player("Alice").await.unwrap());
        assert!(!repo.add_player("ALICE").await.unwrap());

        assert!(repo.is_tracked("alice").await.unwrap());
        let players = repo.list_players().await.unwrap();
        assert_eq!(players, vec!["Alice"]);
    }

    #[tokio::test]
    async fn test_remove_player() {
        let repo = InMemoryRosterRepository::with_players(vec!["Alice".to_string()]);

        assert!(repo.remove_player("ALICE").await.unwrap());
        assert!(!repo.remove_player("Alice").await.unwrap());
        assert!(repo.list_players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_roster_lists_empty() {
        let repo = InMemoryRosterRepository::new();
        assert!(repo.list_players().await.unwrap().is_empty());
        assert!(!repo.is_tracked("anyone").await.unwrap());
    }
}
