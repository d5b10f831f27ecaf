use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use strum::IntoEnumIterator;
use tracing::{debug, instrument, warn};

use super::category::Category;
use super::models::{Baselines, PlayerMeta, StatRecord};
use super::StatsError;

/// Durable keyed storage of (player, stat) records across category partitions,
/// plus player metadata with its own lifecycle.
///
/// Player identity is case-insensitive: the first-seen casing becomes
/// canonical, and all later lookups and writes for any case variant resolve to
/// it. Reads of absent players yield empty/None, never an error.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// All stat records for a player, merged across every partition.
    async fn get_stats(&self, player: &str) -> Result<HashMap<String, StatRecord>, StatsError>;

    /// One record from one partition, if present.
    async fn get_record(
        &self,
        category: Category,
        player: &str,
        stat: &str,
    ) -> Result<Option<StatRecord>, StatsError>;

    /// Total-replacement upsert of one record. Callers wanting a partial
    /// update must read-modify-write. `player` must be the canonical casing.
    async fn put_record(
        &self,
        category: Category,
        player: &str,
        stat: &str,
        record: &StatRecord,
    ) -> Result<(), StatsError>;

    async fn get_meta(&self, player: &str) -> Result<Option<PlayerMeta>, StatsError>;

    async fn put_meta(&self, player: &str, meta: &PlayerMeta) -> Result<(), StatsError>;

    /// Removes every record in every partition plus metadata, atomically with
    /// respect to observers.
    async fn delete_player(&self, player: &str) -> Result<(), StatsError>;

    /// Canonical casing for a case-insensitive identity, if the player is
    /// known to any partition or the metadata table.
    async fn canonical_name(&self, player: &str) -> Result<Option<String>, StatsError>;

    /// Partitions that already hold at least one record for the player. Used
    /// by the update engine's first-seen-category bootstrap policy.
    async fn categories_with_records(
        &self,
        player: &str,
    ) -> Result<HashSet<Category>, StatsError>;

    /// `yesterday := daily` for every stat of the player, all partitions.
    /// Leaves lifetime and every other baseline untouched.
    async fn rotate_daily_to_yesterday(&self, player: &str) -> Result<(), StatsError>;

    /// `weekly := lifetime` for every stat of the player, all partitions.
    async fn reset_weekly_to_lifetime(&self, player: &str) -> Result<(), StatsError>;
}

type PartitionMap = HashMap<String, HashMap<String, StatRecord>>;

#[derive(Default)]
struct StoreInner {
    /// category -> canonical player -> stat -> record
    partitions: HashMap<Category, PartitionMap>,
    /// canonical player -> metadata
    meta: HashMap<String, PlayerMeta>,
    /// lowercase identity -> first-seen canonical casing
    canonical: HashMap<String, String>,
}

impl StoreInner {
    fn resolve(&self, player: &str) -> Option<String> {
        self.canonical.get(&player.to_lowercase()).cloned()
    }

    /// Resolves to the canonical casing, registering the input casing as
    /// canonical if this identity has never been seen.
    fn resolve_or_register(&mut self, player: &str) -> String {
        self.canonical
            .entry(player.to_lowercase())
            .or_insert_with(|| player.to_string())
            .clone()
    }
}

/// In-memory implementation of StatsRepository for development and testing.
/// A single mutex over the whole store makes multi-partition operations
/// (notably delete_player) trivially atomic.
pub struct InMemoryStatsRepository {
    inner: Mutex<StoreInner>,
}

impl Default for InMemoryStatsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Number of stat records held for a player, across all partitions
    /// (useful for debugging and duplicate-detection tests).
    pub fn record_count(&self, player: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            return 0;
        };
        inner
            .partitions
            .values()
            .filter_map(|p| p.get(&canonical))
            .map(|stats| stats.len())
            .sum()
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    #[instrument(skip(self))]
    async fn get_stats(&self, player: &str) -> Result<HashMap<String, StatRecord>, StatsError> {
        let inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            debug!(player = %player, "No records for player in memory");
            return Ok(HashMap::new());
        };

        let mut merged = HashMap::new();
        for partition in inner.partitions.values() {
            if let Some(stats) = partition.get(&canonical) {
                for (stat, record) in stats {
                    merged.insert(stat.clone(), record.clone());
                }
            }
        }

        debug!(player = %canonical, stat_count = merged.len(), "Fetched stats from memory");
        Ok(merged)
    }

    #[instrument(skip(self))]
    async fn get_record(
        &self,
        category: Category,
        player: &str,
        stat: &str,
    ) -> Result<Option<StatRecord>, StatsError> {
        let inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            return Ok(None);
        };

        Ok(inner
            .partitions
            .get(&category)
            .and_then(|p| p.get(&canonical))
            .and_then(|stats| stats.get(stat))
            .cloned())
    }

    #[instrument(skip(self, record))]
    async fn put_record(
        &self,
        category: Category,
        player: &str,
        stat: &str,
        record: &StatRecord,
    ) -> Result<(), StatsError> {
        let mut inner = self.inner.lock().unwrap();
        let canonical = inner.resolve_or_register(player);

        inner
            .partitions
            .entry(category)
            .or_default()
            .entry(canonical.clone())
            .or_default()
            .insert(stat.to_string(), record.clone());

        debug!(player = %canonical, stat = %stat, partition = %category, "Record upserted in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_meta(&self, player: &str) -> Result<Option<PlayerMeta>, StatsError> {
        let inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            return Ok(None);
        };
        Ok(inner.meta.get(&canonical).cloned())
    }

    #[instrument(skip(self, meta))]
    async fn put_meta(&self, player: &str, meta: &PlayerMeta) -> Result<(), StatsError> {
        let mut inner = self.inner.lock().unwrap();
        let canonical = inner.resolve_or_register(player);
        inner.meta.insert(canonical.clone(), meta.clone());

        debug!(player = %canonical, "Metadata upserted in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_player(&self, player: &str) -> Result<(), StatsError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            debug!(player = %player, "Nothing to delete for unknown player");
            return Ok(());
        };

        for partition in inner.partitions.values_mut() {
            partition.remove(&canonical);
        }
        inner.meta.remove(&canonical);
        inner.canonical.remove(&player.to_lowercase());

        debug!(player = %canonical, "Player deleted from all partitions in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn canonical_name(&self, player: &str) -> Result<Option<String>, StatsError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.resolve(player))
    }

    #[instrument(skip(self))]
    async fn categories_with_records(
        &self,
        player: &str,
    ) -> Result<HashSet<Category>, StatsError> {
        let inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            return Ok(HashSet::new());
        };

        Ok(inner
            .partitions
            .iter()
            .filter(|(_, p)| p.get(&canonical).is_some_and(|stats| !stats.is_empty()))
            .map(|(category, _)| *category)
            .collect())
    }

    #[instrument(skip(self))]
    async fn rotate_daily_to_yesterday(&self, player: &str) -> Result<(), StatsError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            debug!(player = %player, "No records to rotate for unknown player");
            return Ok(());
        };

        let mut rotated = 0usize;
        for partition in inner.partitions.values_mut() {
            if let Some(stats) = partition.get_mut(&canonical) {
                for record in stats.values_mut() {
                    record.baselines.yesterday = record.baselines.daily;
                    rotated += 1;
                }
            }
        }

        debug!(player = %canonical, rotated, "Rotated daily baselines into yesterday in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset_weekly_to_lifetime(&self, player: &str) -> Result<(), StatsError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(canonical) = inner.resolve(player) else {
            debug!(player = %player, "No records to reset for unknown player");
            return Ok(());
        };

        let mut reset = 0usize;
        for partition in inner.partitions.values_mut() {
            if let Some(stats) = partition.get_mut(&canonical) {
                for record in stats.values_mut() {
                    record.baselines.weekly = Some(record.lifetime);
                    reset += 1;
                }
            }
        }

        debug!(player = %canonical, reset, "Reset weekly baselines to lifetime in memory");
        Ok(())
    }
}

/// PostgreSQL implementation of the stat record store. One table per category
/// partition, with nullable baseline columns to tolerate legacy rows. The pool
/// is injected; nothing here reaches for a process-wide handle.
pub struct PostgresStatsRepository {
    pool: PgPool,
}

impl PostgresStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> StatRecord {
        StatRecord {
            lifetime: row.get("lifetime"),
            baselines: Baselines {
                session: row.get("session"),
                daily: row.get("daily"),
                yesterday: row.get("yesterday"),
                weekly: row.get("weekly"),
                monthly: row.get("monthly"),
            },
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    #[instrument(skip(self))]
    async fn get_stats(&self, player: &str) -> Result<HashMap<String, StatRecord>, StatsError> {
        let mut merged = HashMap::new();

        for category in Category::iter() {
            // Table names come from the Category enum, never from input.
            let query = format!(
                "SELECT stat_name, lifetime, session, daily, yesterday, weekly, monthly, updated_at \
                 FROM {} WHERE LOWER(username) = LOWER($1)",
                category.table()
            );

            let rows = sqlx::query(&query)
                .bind(player)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, partition = %category, "Failed to fetch stats partition");
                    StatsError::StoreUnavailable(e.to_string())
                })?;

            for row in rows {
                merged.insert(row.get("stat_name"), Self::record_from_row(&row));
            }
        }

        debug!(player = %player, stat_count = merged.len(), "Fetched stats from database");
        Ok(merged)
    }

    #[instrument(skip(self))]
    async fn get_record(
        &self,
        category: Category,
        player: &str,
        stat: &str,
    ) -> Result<Option<StatRecord>, StatsError> {
        let query = format!(
            "SELECT stat_name, lifetime, session, daily, yesterday, weekly, monthly, updated_at \
             FROM {} WHERE LOWER(username) = LOWER($1) AND stat_name = $2",
            category.table()
        );

        let row = sqlx::query(&query)
            .bind(player)
            .bind(stat)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, partition = %category, "Failed to fetch stat record");
                StatsError::StoreUnavailable(e.to_string())
            })?;

        Ok(row.map(|r| Self::record_from_row(&r)))
    }

    #[instrument(skip(self, record))]
    async fn put_record(
        &self,
        category: Category,
        player: &str,
        stat: &str,
        record: &StatRecord,
    ) -> Result<(), StatsError> {
        let query = format!(
            "INSERT INTO {} (username, stat_name, lifetime, session, daily, yesterday, weekly, monthly, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (username, stat_name) DO UPDATE SET \
             lifetime = EXCLUDED.lifetime, session = EXCLUDED.session, daily = EXCLUDED.daily, \
             yesterday = EXCLUDED.yesterday, weekly = EXCLUDED.weekly, monthly = EXCLUDED.monthly, \
             updated_at = EXCLUDED.updated_at",
            category.table()
        );

        sqlx::query(&query)
            .bind(player)
            .bind(stat)
            .bind(record.lifetime)
            .bind(record.baselines.session)
            .bind(record.baselines.daily)
            .bind(record.baselines.yesterday)
            .bind(record.baselines.weekly)
            .bind(record.baselines.monthly)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, partition = %category, stat = %stat, "Failed to upsert stat record");
                StatsError::StoreUnavailable(e.to_string())
            })?;

        debug!(player = %player, stat = %stat, partition = %category, "Record upserted in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_meta(&self, player: &str) -> Result<Option<PlayerMeta>, StatsError> {
        let meta = sqlx::query_as::<_, PlayerMeta>(
            "SELECT level, icon, ign_color, guild_tag, guild_hex, rank \
             FROM player_meta WHERE LOWER(username) = LOWER($1)",
        )
        .bind(player)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch player metadata");
            StatsError::StoreUnavailable(e.to_string())
        })?;

        Ok(meta)
    }

    #[instrument(skip(self, meta))]
    async fn put_meta(&self, player: &str, meta: &PlayerMeta) -> Result<(), StatsError> {
        sqlx::query(
            "INSERT INTO player_meta (username, level, icon, ign_color, guild_tag, guild_hex, rank, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
             ON CONFLICT (username) DO UPDATE SET \
             level = EXCLUDED.level, icon = EXCLUDED.icon, ign_color = EXCLUDED.ign_color, \
             guild_tag = EXCLUDED.guild_tag, guild_hex = EXCLUDED.guild_hex, rank = EXCLUDED.rank, \
             updated_at = NOW()",
        )
        .bind(player)
        .bind(meta.level)
        .bind(&meta.icon)
        .bind(&meta.ign_color)
        .bind(&meta.guild_tag)
        .bind(&meta.guild_hex)
        .bind(&meta.rank)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to upsert player metadata");
            StatsError::StoreUnavailable(e.to_string())
        })?;

        debug!(player = %player, "Metadata upserted in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_player(&self, player: &str) -> Result<(), StatsError> {
        // One transaction across every partition and the meta table keeps the
        // removal all-or-nothing for observers.
        let mut tx = self.pool.begin().await.map_err(|e| {
            warn!(error = %e, "Failed to open delete transaction");
            StatsError::StoreUnavailable(e.to_string())
        })?;

        for category in Category::iter() {
            let query = format!(
                "DELETE FROM {} WHERE LOWER(username) = LOWER($1)",
                category.table()
            );
            sqlx::query(&query)
                .bind(player)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    warn!(error = %e, partition = %category, "Failed to delete stat records");
                    StatsError::StoreUnavailable(e.to_string())
                })?;
        }

        sqlx::query("DELETE FROM player_meta WHERE LOWER(username) = LOWER($1)")
            .bind(player)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete player metadata");
                StatsError::StoreUnavailable(e.to_string())
            })?;

        tx.commit().await.map_err(|e| {
            warn!(error = %e, "Failed to commit delete transaction");
            StatsError::StoreUnavailable(e.to_string())
        })?;

        debug!(player = %player, "Player deleted from all partitions in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn canonical_name(&self, player: &str) -> Result<Option<String>, StatsError> {
        for category in Category::iter() {
            let query = format!(
                "SELECT username FROM {} WHERE LOWER(username) = LOWER($1) LIMIT 1",
                category.table()
            );
            let row = sqlx::query(&query)
                .bind(player)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, partition = %category, "Failed canonical name lookup");
                    StatsError::StoreUnavailable(e.to_string())
                })?;

            if let Some(row) = row {
                return Ok(Some(row.get("username")));
            }
        }

        let row = sqlx::query(
            "SELECT username FROM player_meta WHERE LOWER(username) = LOWER($1) LIMIT 1",
        )
        .bind(player)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed canonical name lookup in metadata");
            StatsError::StoreUnavailable(e.to_string())
        })?;

        Ok(row.map(|r| r.get("username")))
    }

    #[instrument(skip(self))]
    async fn categories_with_records(
        &self,
        player: &str,
    ) -> Result<HashSet<Category>, StatsError> {
        let mut present = HashSet::new();

        for category in Category::iter() {
            let query = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE LOWER(username) = LOWER($1)) AS present",
                category.table()
            );
            let row = sqlx::query(&query)
                .bind(player)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, partition = %category, "Failed partition presence probe");
                    StatsError::StoreUnavailable(e.to_string())
                })?;

            if row.get::<bool, _>("present") {
                present.insert(category);
            }
        }

        Ok(present)
    }

    #[instrument(skip(self))]
    async fn rotate_daily_to_yesterday(&self, player: &str) -> Result<(), StatsError> {
        for category in Category::iter() {
            let query = format!(
                "UPDATE {} SET yesterday = daily WHERE LOWER(username) = LOWER($1)",
                category.table()
            );
            sqlx::query(&query)
                .bind(player)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, partition = %category, "Failed daily->yesterday rotation");
                    StatsError::StoreUnavailable(e.to_string())
                })?;
        }

        debug!(player = %player, "Rotated daily baselines into yesterday in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset_weekly_to_lifetime(&self, player: &str) -> Result<(), StatsError> {
        for category in Category::iter() {
            let query = format!(
                "UPDATE {} SET weekly = lifetime WHERE LOWER(username) = LOWER($1)",
                category.table()
            );
            sqlx::query(&query)
                .bind(player)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, partition = %category, "Failed weekly reset");
                    StatsError::StoreUnavailable(e.to_string())
                })?;
        }

        debug!(player = %player, "Reset weekly baselines to lifetime in database");
        Ok(())
    }
}
