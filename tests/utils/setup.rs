use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stattrack::{
    roster::{InMemoryRosterRepository, RosterRepository},
    stats::{InMemoryStatsRepository, StatsService, Window},
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub stats_service: Arc<StatsService>,
    pub stats_repository: Arc<InMemoryStatsRepository>,
    pub roster_repository: Arc<InMemoryRosterRepository>,
    pub players: Vec<String>,
}

impl TestSetup {
    /// Roster snapshot in the shape the rotation entry points take.
    pub async fn roster(&self) -> Vec<String> {
        self.roster_repository.list_players().await.unwrap()
    }
}

pub struct TestSetupBuilder {
    players: Vec<String>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self { players: vec![] }
    }

    pub fn with_tracked_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub async fn build(self) -> TestSetup {
        let stats_repository = Arc::new(InMemoryStatsRepository::new());
        let stats_service = Arc::new(StatsService::new(stats_repository.clone()));
        let roster_repository = Arc::new(InMemoryRosterRepository::new());

        for player in &self.players {
            roster_repository.add_player(player).await.unwrap();
        }

        TestSetup {
            stats_service,
            stats_repository,
            roster_repository,
            players: self.players,
        }
    }
}

pub fn stat_values(pairs: &[(&str, f64)]) -> HashMap<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(stat, v)| (stat.to_string(), serde_json::json!(v)))
        .collect()
}

pub fn windows(list: &[Window]) -> HashSet<Window> {
    list.iter().copied().collect()
}
