use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Service for the auxiliary identity maps around the stat store: which
/// external chat accounts are linked to which player names, which linked
/// player an account means by default, and a per-player session streak
/// counter. Simple keyed maps; none of these carry derived invariants.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Link a player name to an external account. Idempotent.
    async fn link_player(&self, account_id: &str, player: &str) -> Result<(), IdentityError>;

    /// Remove a link. Returns false if no such link existed.
    async fn unlink_player(&self, account_id: &str, player: &str) -> bool;

    /// All player names linked to an account, in link order.
    async fn linked_players(&self, account_id: &str) -> Vec<String>;

    /// Set the player an account resolves to when no name is given.
    /// The player must already be linked to the account.
    async fn set_default_player(&self, account_id: &str, player: &str)
        -> Result<(), IdentityError>;

    async fn default_player(&self, account_id: &str) -> Option<String>;

    /// Bump and return the player's session streak counter.
    async fn bump_streak(&self, player: &str) -> u32;

    /// Reset the player's streak counter to zero.
    async fn reset_streak(&self, player: &str);

    async fn streak(&self, player: &str) -> u32;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    #[error("Player '{player}' is not linked to account '{account_id}'")]
    NotLinked { player: String, account_id: String },
}

/// In-memory implementation of IdentityService.
/// Uses RwLock for concurrent access with read optimization.
pub struct InMemoryIdentityService {
    links: Arc<RwLock<HashMap<String, Vec<String>>>>,
    defaults: Arc<RwLock<HashMap<String, String>>>,
    streaks: Arc<RwLock<HashMap<String, u32>>>,
}

impl Default for InMemoryIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self {
            links: Arc::new(RwLock::new(HashMap::new())),
            defaults: Arc::new(RwLock::new(HashMap::new())),
            streaks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn link_player(&self, account_id: &str, player: &str) -> Result<(), IdentityError> {
        let mut links = self.links.write().await;
        let linked = links.entry(account_id.to_string()).or_default();

        if linked.iter().any(|p| p.eq_ignore_ascii_case(player)) {
            debug!(account_id = %account_id, player = %player, "Link already exists");
            return Ok(());
        }

        linked.push(player.to_string());
        info!(account_id = %account_id, player = %player, "Player linked to account");
        Ok(())
    }

    async fn unlink_player(&self, account_id: &str, player: &str) -> bool {
        let mut links = self.links.write().await;
        let Some(linked) = links.get_mut(account_id) else {
            return false;
        };

        let before = linked.len();
        linked.retain(|p| !p.eq_ignore_ascii_case(player));
        let removed = linked.len() < before;

        if removed {
            // A removed link cannot stay the account default.
            let mut defaults = self.defaults.write().await;
            if defaults
                .get(account_id)
                .is_some_and(|d| d.eq_ignore_ascii_case(player))
            {
                defaults.remove(account_id);
            }
            info!(account_id = %account_id, player = %player, "Player unlinked from account");
        }
        removed
    }

    async fn linked_players(&self, account_id: &str) -> Vec<String> {
        let links = self.links.read().await;
        links.get(account_id).cloned().unwrap_or_default()
    }

    async fn set_default_player(
        &self,
        account_id: &str,
        player: &str,
    ) -> Result<(), IdentityError> {
        let links = self.links.read().await;
        let is_linked = links
            .get(account_id)
            .is_some_and(|linked| linked.iter().any(|p| p.eq_ignore_ascii_case(player)));

        if !is_linked {
            return Err(IdentityError::NotLinked {
                player: player.to_string(),
                account_id: account_id.to_string(),
            });
        }
        drop(links);

        let mut defaults = self.defaults.write().await;
        defaults.insert(account_id.to_string(), player.to_string());
        debug!(account_id = %account_id, player = %player, "Default player set");
        Ok(())
    }

    async fn default_player(&self, account_id: &str) -> Option<String> {
        let defaults = self.defaults.read().await;
        defaults.get(account_id).cloned()
    }

    async fn bump_streak(&self, player: &str) -> u32 {
        let mut streaks = self.streaks.write().await;
        let counter = streaks.entry(player.to_lowercase()).or_insert(0);
        *counter += 1;
        *counter
    }

    async fn reset_streak(&self, player: &str) {
        let mut streaks = self.streaks.write().await;
        streaks.remove(&player.to_lowercase());
    }

    async fn streak(&self, player: &str) -> u32 {
        let streaks = self.streaks.read().await;
        streaks.get(&player.to_lowercase()).copied().unwrap_or(0)
    }
}

pub mod handlers {
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    };
    use serde::Deserialize;
    use tracing::instrument;

    use crate::shared::{AppError, AppState};

    #[derive(Debug, Deserialize)]
    pub struct LinkRequest {
        pub player: String,
    }

    /// HTTP handler for linking a player to an external account
    ///
    /// POST /accounts/:account/links
    #[instrument(name = "link_account_player", skip(state))]
    pub async fn link_account_player(
        State(state): State<AppState>,
        Path(account): Path<String>,
        Json(request): Json<LinkRequest>,
    ) -> Result<StatusCode, AppError> {
        state
            .identity_service
            .link_player(&account, &request.player)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(StatusCode::CREATED)
    }

    /// HTTP handler for listing an account's linked players
    ///
    /// GET /accounts/:account/links
    #[instrument(name = "list_account_links", skip(state))]
    pub async fn list_account_links(
        State(state): State<AppState>,
        Path(account): Path<String>,
    ) -> Json<Vec<String>> {
        Json(state.identity_service.linked_players(&account).await)
    }

    /// HTTP handler for choosing an account's default player
    ///
    /// PUT /accounts/:account/default
    #[instrument(name = "set_default_player", skip(state))]
    pub async fn set_default_player(
        State(state): State<AppState>,
        Path(account): Path<String>,
        Json(request): Json<LinkRequest>,
    ) -> Result<StatusCode, AppError> {
        state
            .identity_service
            .set_default_player(&account, &request.player)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// HTTP handler for resolving an account's default player
    ///
    /// GET /accounts/:account/default
    #[instrument(name = "get_default_player", skip(state))]
    pub async fn get_default_player(
        State(state): State<AppState>,
        Path(account): Path<String>,
    ) -> Result<Json<String>, AppError> {
        let player = state
            .identity_service
            .default_player(&account)
            .await
            .ok_or_else(|| {
                AppError::NotFound(format!("No default player for account '{account}'"))
            })?;
        Ok(Json(player))
    }
}
