// Library crate for the windowed player-stat tracker
// This file exposes the public API for integration tests

pub mod identity;
pub mod roster;
pub mod shared;
pub mod stats;

// Re-export commonly used types for easier access in tests
pub use identity::{IdentityService, InMemoryIdentityService};
pub use roster::{InMemoryRosterRepository, RosterRepository};
pub use shared::{AppError, AppState};
pub use stats::{
    classify, Category, InMemoryStatsRepository, StatDeltas, StatsError, StatsRepository,
    StatsService, Window,
};
