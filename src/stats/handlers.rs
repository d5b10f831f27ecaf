use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

use super::models::{PlayerMeta, RotationReport, StatDeltas, UpdateReport, Window};
use super::Category;
use crate::shared::{AppError, AppState};

/// Body for a batch stat update: the lifetime values fetched from the
/// upstream stats source, the windows the scheduler wants re-baselined, and
/// any categories being onboarded for the first time.
#[derive(Debug, Deserialize)]
pub struct UpdateStatsRequest {
    pub stats: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub rebaseline: HashSet<Window>,
    #[serde(default)]
    pub bootstrap: HashSet<Category>,
}

/// HTTP handler for reading a player's stats with per-window deltas
///
/// GET /players/:player/stats
/// Unknown players yield an empty mapping, not a 404.
#[instrument(name = "get_player_stats", skip(state))]
pub async fn get_player_stats(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<Json<HashMap<String, StatDeltas>>, AppError> {
    let deltas = state.stats_service.read_with_deltas(&player).await?;
    Ok(Json(deltas))
}

/// HTTP handler for applying a batch of upstream lifetime values
///
/// POST /players/:player/stats
/// Returns the per-stat outcome breakdown.
#[instrument(name = "update_player_stats", skip(state, request))]
pub async fn update_player_stats(
    State(state): State<AppState>,
    Path(player): Path<String>,
    Json(request): Json<UpdateStatsRequest>,
) -> Result<Json<UpdateReport>, AppError> {
    info!(
        player = %player,
        stat_count = request.stats.len(),
        rebaseline = ?request.rebaseline,
        "Applying batch stat update"
    );

    let report = state
        .stats_service
        .update(
            &player,
            &request.stats,
            &request.rebaseline,
            &request.bootstrap,
        )
        .await?;

    Ok(Json(report))
}

/// HTTP handler for removing a player and all their records
///
/// DELETE /players/:player
#[instrument(name = "delete_player", skip(state))]
pub async fn delete_player(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<StatusCode, AppError> {
    info!(player = %player, "Deleting player");
    state.stats_service.remove_player(&player).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// HTTP handler for fetching player metadata
///
/// GET /players/:player/meta
#[instrument(name = "get_player_meta", skip(state))]
pub async fn get_player_meta(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<Json<PlayerMeta>, AppError> {
    let meta = state
        .stats_service
        .get_meta(&player)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No metadata for player '{player}'")))?;
    Ok(Json(meta))
}

/// HTTP handler for upserting player metadata
///
/// PUT /players/:player/meta
#[instrument(name = "put_player_meta", skip(state, meta))]
pub async fn put_player_meta(
    State(state): State<AppState>,
    Path(player): Path<String>,
    Json(meta): Json<PlayerMeta>,
) -> Result<StatusCode, AppError> {
    state.stats_service.put_meta(&player, &meta).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// HTTP handler for the scheduled daily->yesterday rotation
///
/// POST /rotation/yesterday
/// The external scheduler must call this before the day's first update that
/// re-baselines the daily window.
#[instrument(name = "rotate_yesterday", skip(state))]
pub async fn rotate_yesterday(
    State(state): State<AppState>,
) -> Result<Json<RotationReport>, AppError> {
    let roster = state.roster_repository.list_players().await?;
    info!(player_count = roster.len(), "Rotating daily baselines into yesterday");

    let report = state.stats_service.rotate_yesterday(&roster).await;
    Ok(Json(report))
}

/// HTTP handler for the scheduled weekly baseline reset
///
/// POST /rotation/weekly
#[instrument(name = "reset_weekly", skip(state))]
pub async fn reset_weekly(
    State(state): State<AppState>,
) -> Result<Json<RotationReport>, AppError> {
    let roster = state.roster_repository.list_players().await?;
    info!(player_count = roster.len(), "Resetting weekly baselines to lifetime");

    let report = state.stats_service.reset_weekly(&roster).await;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    fn app(state: AppState) -> Router {
        Router::new()
            .route(
                "/players/:player/stats",
                axum::routing::get(get_player_stats).post(update_player_stats),
            )
            .route(
                "/players/:player/meta",
                axum::routing::get(get_player_meta).put(put_player_meta),
            )
            .route("/players/:player", axum::routing::delete(delete_player))
            .route("/rotation/yesterday", axum::routing::post(rotate_yesterday))
            .route("/rotation/weekly", axum::routing::post(reset_weekly))
            .with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_update_then_read_stats() {
        let app = app(AppStateBuilder::new().build());

        let request_body = r#"{"stats": {"kills": 50}, "rebaseline": [], "bootstrap": []}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/players/Bob/stats")
            .header("content-type", "application/json")
            .body(Body::from(request_body))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: UpdateReport = body_json(response).await;
        assert_eq!(report.player, "Bob");
        assert!(report.all_applied());

        let request = Request::builder()
            .method("GET")
            .uri("/players/bob/stats")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let deltas: HashMap<String, StatDeltas> = body_json(response).await;
        let kills = deltas.get("kills").unwrap();
        assert_eq!(kills.lifetime, 50.0);
        assert_eq!(kills.daily, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_player_stats_are_empty_not_404() {
        let app = app(AppStateBuilder::new().build());

        let request = Request::builder()
            .method("GET")
            .uri("/players/nobody/stats")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let deltas: HashMap<String, StatDeltas> = body_json(response).await;
        assert!(deltas.is_empty());
    }

    #[tokio::test]
    async fn test_update_with_rebaseline_window_names() {
        let app = app(AppStateBuilder::new().build());

        let seed = r#"{"stats": {"kills": 50}}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/players/Bob/stats")
            .header("content-type", "application/json")
            .body(Body::from(seed))
            .unwrap();
        app.clone().oneshot(request).await.unwrap();

        let request_body = r#"{"stats": {"kills": 70}, "rebaseline": ["daily"]}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/players/Bob/stats")
            .header("content-type", "application/json")
            .body(Body::from(request_body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .method("GET")
            .uri("/players/Bob/stats")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let deltas: HashMap<String, StatDeltas> = body_json(response).await;
        let kills = deltas.get("kills").unwrap();
        assert_eq!(kills.daily, 0.0);
        assert_eq!(kills.session, 20.0);
    }

    #[tokio::test]
    async fn test_meta_roundtrip_and_404() {
        let app = app(AppStateBuilder::new().build());

        let request = Request::builder()
            .method("GET")
            .uri("/players/Bob/meta")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let meta_body = r##"{"level": 42, "icon": "[+]", "ign_color": null, "guild_tag": "TAG", "guild_hex": "#ffaa00", "rank": "VIP"}"##;
        let request = Request::builder()
            .method("PUT")
            .uri("/players/Bob/meta")
            .header("content-type", "application/json")
            .body(Body::from(meta_body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let request = Request::builder()
            .method("GET")
            .uri("/players/BOB/meta")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let meta: PlayerMeta = body_json(response).await;
        assert_eq!(meta.level, 42);
        assert_eq!(meta.guild_tag, Some("TAG".to_string()));
    }

    #[tokio::test]
    async fn test_rotation_covers_the_roster() {
        let state = AppStateBuilder::new().build();
        state.roster_repository.add_player("Bob").await.unwrap();

        let app = app(state.clone());

        let seed = r#"{"stats": {"kills": 50}}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/players/Bob/stats")
            .header("content-type", "application/json")
            .body(Body::from(seed))
            .unwrap();
        app.clone().oneshot(request).await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/rotation/yesterday")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report: RotationReport = body_json(response).await;
        assert_eq!(report.rotated_count(), 1);
        assert!(report.results.contains_key("Bob"));
    }

    #[tokio::test]
    async fn test_delete_player_handler() {
        let app = app(AppStateBuilder::new().build());

        let seed = r#"{"stats": {"kills": 50}}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/players/Bob/stats")
            .header("content-type", "application/json")
            .body(Body::from(seed))
            .unwrap();
        app.clone().oneshot(request).await.unwrap();

        let request = Request::builder()
            .method("DELETE")
            .uri("/players/bob")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let request = Request::builder()
            .method("GET")
            .uri("/players/Bob/stats")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let deltas: HashMap<String, StatDeltas> = body_json(response).await;
        assert!(deltas.is_empty());
    }
}
