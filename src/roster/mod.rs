// Public API - what other modules can use
pub use handlers::{add_tracked_player, list_tracked_players, remove_tracked_player};
pub use repository::{InMemoryRosterRepository, PostgresRosterRepository, RosterRepository};

// Internal modules
mod handlers;
pub mod repository;
