use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use strum::IntoEnumIterator;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    category::{classify, Category},
    models::{
        Baselines, PlayerMeta, RotationOutcome, RotationReport, StatDeltas, StatOutcome,
        StatRecord, UpdateReport, Window,
    },
    repository::StatsRepository,
    StatsError,
};

enum RotationKind {
    DailyToYesterday,
    WeeklyReset,
}

/// Update engine, rotation engine and delta reader over a stat record store.
///
/// Every read-modify-write (update, rotation, removal) runs inside a
/// per-player mutual-exclusion scope so a rotation racing an update for the
/// same player cannot lose baseline writes. Operations on different players
/// are independent.
pub struct StatsService {
    repository: Arc<dyn StatsRepository>,
    player_mutexes: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl StatsService {
    pub fn new(repository: Arc<dyn StatsRepository>) -> Self {
        Self {
            repository,
            player_mutexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Applies a batch of upstream (stat -> lifetime value) pairs for one
    /// player, re-baselining the requested windows.
    ///
    /// Per stat: the value is validated, the stat is classified into its
    /// partition, and each baseline slot is resolved independently —
    /// explicit rebaseline wins, otherwise a prior snapshot is kept,
    /// otherwise the slot snapshots the new lifetime value (zero initial
    /// delta). Invalid values are skipped and reported, never fatal; only a
    /// store-level failure aborts the batch.
    pub async fn update(
        &self,
        player: &str,
        stat_values: &HashMap<String, serde_json::Value>,
        rebaseline_windows: &HashSet<Window>,
        bootstrap_categories: &HashSet<Category>,
    ) -> Result<UpdateReport, StatsError> {
        let lock = self.player_lock(player).await;
        let _guard = lock.lock().await;

        let canonical = self
            .repository
            .canonical_name(player)
            .await?
            .unwrap_or_else(|| player.to_string());

        // Partition presence is snapshotted once per batch: every stat in the
        // batch sees the same answer to "is this category new for the player".
        let existing_categories = self.repository.categories_with_records(&canonical).await?;

        let mut outcomes = HashMap::new();
        for (name, raw_value) in stat_values {
            let stat = name.to_lowercase();

            let lifetime = match parse_lifetime(&stat, raw_value) {
                Ok(v) => v,
                Err(err) => {
                    warn!(player = %canonical, stat = %stat, error = %err, "Skipping invalid stat value");
                    outcomes.insert(
                        stat,
                        StatOutcome::Invalid {
                            reason: err.to_string(),
                        },
                    );
                    continue;
                }
            };

            let result = self
                .apply_stat(
                    &canonical,
                    &stat,
                    lifetime,
                    rebaseline_windows,
                    bootstrap_categories,
                    &existing_categories,
                )
                .await;

            match result {
                Ok(()) => {
                    outcomes.insert(stat, StatOutcome::Applied);
                }
                // Connectivity loss is fatal for the batch; anything else is
                // isolated to this stat.
                Err(err @ StatsError::StoreUnavailable(_)) => return Err(err),
                Err(err) => {
                    warn!(player = %canonical, stat = %stat, error = %err, "Stat update failed");
                    outcomes.insert(
                        stat,
                        StatOutcome::Failed {
                            reason: err.to_string(),
                        },
                    );
                }
            }
        }

        let report = UpdateReport {
            player: canonical,
            outcomes,
        };
        info!(
            player = %report.player,
            applied = report.applied_count(),
            total = report.outcomes.len(),
            "Batch update complete"
        );
        Ok(report)
    }

    async fn apply_stat(
        &self,
        player: &str,
        stat: &str,
        lifetime: f64,
        rebaseline_windows: &HashSet<Window>,
        bootstrap_categories: &HashSet<Category>,
        existing_categories: &HashSet<Category>,
    ) -> Result<(), StatsError> {
        let category = classify(stat);
        let prior = self.repository.get_record(category, player, stat).await?;

        let is_new_record = prior.is_none();
        let category_is_new = !existing_categories.contains(&category);

        let mut baselines = Baselines::default();
        for window in Window::iter() {
            let value = if rebaseline_windows.contains(&window) {
                // Explicit re-baseline always wins.
                lifetime
            } else if let Some(prev) = prior.as_ref().and_then(|p| p.baselines.get(window)) {
                prev
            } else if is_new_record && category_is_new && bootstrap_categories.contains(&category)
            {
                // Newly onboarded category. Same number as the arm below;
                // kept as its own branch so the intent stays visible until
                // the product question of nonzero bootstrap deltas is
                // settled.
                lifetime
            } else {
                // First sight of this stat (or a legacy record with this
                // slot missing): snapshot now, so the window starts at zero.
                lifetime
            };
            baselines.set(window, value);
        }

        let record = StatRecord {
            lifetime,
            baselines,
            updated_at: chrono::Utc::now(),
        };
        self.repository
            .put_record(category, player, stat, &record)
            .await?;

        debug!(player = %player, stat = %stat, partition = %category, lifetime, "Stat applied");
        Ok(())
    }

    /// Full per-stat delta view for a player. Always recomputed from the
    /// latest baselines; nothing is cached between calls. Unknown players get
    /// an empty mapping.
    pub async fn read_with_deltas(
        &self,
        player: &str,
    ) -> Result<HashMap<String, StatDeltas>, StatsError> {
        let stats = self.repository.get_stats(player).await?;
        Ok(stats
            .into_iter()
            .map(|(stat, record)| (stat, StatDeltas::from_record(&record)))
            .collect())
    }

    /// Copies each tracked player's daily baselines into the yesterday slots.
    /// The scheduler must invoke this before the day's first daily
    /// re-baseline; the engine itself has no notion of wall-clock time.
    pub async fn rotate_yesterday(&self, players: &[String]) -> RotationReport {
        self.rotate(players, RotationKind::DailyToYesterday).await
    }

    /// Resets each tracked player's weekly baselines to the current lifetime
    /// values. Intended for a fixed weekly trigger owned by the scheduler.
    pub async fn reset_weekly(&self, players: &[String]) -> RotationReport {
        self.rotate(players, RotationKind::WeeklyReset).await
    }

    async fn rotate(&self, players: &[String], kind: RotationKind) -> RotationReport {
        let mut report = RotationReport::default();

        for player in players {
            let lock = self.player_lock(player).await;
            let _guard = lock.lock().await;

            let result = match kind {
                RotationKind::DailyToYesterday => {
                    self.repository.rotate_daily_to_yesterday(player).await
                }
                RotationKind::WeeklyReset => {
                    self.repository.reset_weekly_to_lifetime(player).await
                }
            };

            // Per-player failures are isolated; the rest of the roster still
            // rotates.
            let outcome = match result {
                Ok(()) => RotationOutcome::Rotated,
                Err(err) => {
                    warn!(player = %player, error = %err, "Rotation failed for player");
                    RotationOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            report.results.insert(player.clone(), outcome);
        }

        info!(
            rotated = report.rotated_count(),
            failed = report.failed_count(),
            "Rotation pass complete"
        );
        report
    }

    pub async fn get_meta(&self, player: &str) -> Result<Option<PlayerMeta>, StatsError> {
        self.repository.get_meta(player).await
    }

    pub async fn put_meta(&self, player: &str, meta: &PlayerMeta) -> Result<(), StatsError> {
        let lock = self.player_lock(player).await;
        let _guard = lock.lock().await;

        let canonical = self
            .repository
            .canonical_name(player)
            .await?
            .unwrap_or_else(|| player.to_string());
        self.repository.put_meta(&canonical, meta).await
    }

    /// Deletes every record and metadata entry for the player, atomically.
    pub async fn remove_player(&self, player: &str) -> Result<(), StatsError> {
        let lock = self.player_lock(player).await;
        let _guard = lock.lock().await;

        self.repository.delete_player(player).await?;
        self.clear_player_lock(player).await;
        Ok(())
    }

    /// Per-player exclusion scope, keyed case-insensitively so "Alice" and
    /// "alice" contend on the same lock.
    async fn player_lock(&self, player: &str) -> Arc<AsyncMutex<()>> {
        let key = player.to_lowercase();

        {
            let guard = self.player_mutexes.read().await;
            if let Some(lock) = guard.get(&key) {
                return lock.clone();
            }
        }

        let mut guard = self.player_mutexes.write().await;
        guard
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn clear_player_lock(&self, player: &str) {
        let mut guard = self.player_mutexes.write().await;
        guard.remove(&player.to_lowercase());
    }
}

fn parse_lifetime(stat: &str, raw: &serde_json::Value) -> Result<f64, StatsError> {
    let value = raw.as_f64().ok_or_else(|| StatsError::InvalidStatValue {
        stat: stat.to_string(),
        reason: format!("not a number: {raw}"),
    })?;

    if !value.is_finite() {
        return Err(StatsError::InvalidStatValue {
            stat: stat.to_string(),
            reason: "not a finite number".to_string(),
        });
    }

    Ok(value)
}
