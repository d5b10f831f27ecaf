mod identity;
mod roster;
mod shared;
mod stats;

use axum::{
    routing::{delete, get, post},
    Router,
};
use identity::InMemoryIdentityService;
use roster::InMemoryRosterRepository;
use shared::AppState;
use stats::{InMemoryStatsRepository, StatsService};
// use roster::PostgresRosterRepository; // For production
// use stats::PostgresStatsRepository; // For production
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stattrack=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stat tracker service");

    // Create shared application state with dependency injection
    // Easy to switch between implementations:
    let stats_repository = Arc::new(InMemoryStatsRepository::new());
    let roster_repository = Arc::new(InMemoryRosterRepository::new());

    // For production with PostgreSQL:
    // let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    // let pool = sqlx::PgPool::connect(&database_url).await.expect("Failed to connect to database");
    // let stats_repository = Arc::new(PostgresStatsRepository::new(pool.clone()));
    // let roster_repository = Arc::new(PostgresRosterRepository::new(pool));

    let stats_service = Arc::new(StatsService::new(stats_repository));
    let identity_service = Arc::new(InMemoryIdentityService::new());

    let app_state = AppState::new(stats_service, roster_repository, identity_service);

    // The scheduler (cron or similar) drives the rotation endpoints at the
    // wall-clock boundaries it owns; this service never self-schedules.
    let app = Router::new()
        .route(
            "/players/:player/stats",
            get(stats::get_player_stats).post(stats::update_player_stats),
        )
        .route(
            "/players/:player/meta",
            get(stats::get_player_meta).put(stats::put_player_meta),
        )
        .route("/players/:player", delete(stats::delete_player))
        .route("/rotation/yesterday", post(stats::rotate_yesterday))
        .route("/rotation/weekly", post(stats::reset_weekly))
        .route(
            "/roster",
            get(roster::list_tracked_players).post(roster::add_tracked_player),
        )
        .route("/roster/:player", delete(roster::remove_tracked_player))
        .route(
            "/accounts/:account/links",
            get(identity::handlers::list_account_links).post(identity::handlers::link_account_player),
        )
        .route(
            "/accounts/:account/default",
            get(identity::handlers::get_default_player).put(identity::handlers::set_default_player),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("Server running on http://localhost:3000");
    axum::serve(listener, app).await.unwrap();
}
