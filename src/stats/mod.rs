// Public API - what other modules can use
pub use category::{classify, Category};
pub use errors::StatsError;
pub use handlers::{
    delete_player, get_player_meta, get_player_stats, put_player_meta, reset_weekly,
    rotate_yesterday, update_player_stats,
};
pub use models::*;
pub use repository::{InMemoryStatsRepository, PostgresStatsRepository, StatsRepository};
pub use service::StatsService;

// Internal modules
pub mod category;
mod errors;
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
