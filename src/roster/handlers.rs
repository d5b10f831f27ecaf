use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct TrackPlayerRequest {
    pub player: String,
}

/// HTTP handler for listing the tracked-player roster
///
/// GET /roster
#[instrument(name = "list_tracked_players", skip(state))]
pub async fn list_tracked_players(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let players = state.roster_repository.list_players().await?;
    Ok(Json(players))
}

/// HTTP handler for adding a player to the roster
///
/// POST /roster
/// Returns 409 if an equivalent identity is already tracked.
#[instrument(name = "add_tracked_player", skip(state))]
pub async fn add_tracked_player(
    State(state): State<AppState>,
    Json(request): Json<TrackPlayerRequest>,
) -> Result<StatusCode, AppError> {
    let added = state.roster_repository.add_player(&request.player).await?;
    if !added {
        return Err(AppError::Conflict(format!(
            "Player '{}' is already tracked",
            request.player
        )));
    }

    info!(player = %request.player, "Player added to roster");
    Ok(StatusCode::CREATED)
}

/// HTTP handler for removing a player from the roster
///
/// DELETE /roster/:player
#[instrument(name = "remove_tracked_player", skip(state))]
pub async fn remove_tracked_player(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed = state.roster_repository.remove_player(&player).await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "Player '{player}' is not tracked"
        )));
    }

    info!(player = %player, "Player removed from roster");
    Ok(StatusCode::NO_CONTENT)
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
                "/roster",
                axum::routing::get(list_tracked_players).post(add_tracked_player),
            )
            .route(
                "/roster/:player",
                axum::routing::delete(remove_tracked_player),
            )
            .with_state(state)
    }

    #[tokio::test]
    async fn test_add_list_remove_roundtrip() {
        let app = app(AppStateBuilder::new().build());

        let request = Request::builder()
            .method("POST")
            .uri("/roster")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"player": "Alice"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = Request::builder()
            .method("GET")
            .uri("/roster")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let players: Vec<String> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(players, vec!["Alice"]);

        let request = Request::builder()
            .method("DELETE")
            .uri("/roster/alice")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_duplicate_add_conflicts() {
        let app = app(AppStateBuilder::new().build());

        let body = r#"{"player": "Alice"}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/roster")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        app.clone().oneshot(request).await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/roster")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"player": "ALICE"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_remove_untracked_player_is_404() {
        let app = app(AppStateBuilder::new().build());

        let request = Request::builder()
            .method("DELETE")
            .uri("/roster/ghost")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
