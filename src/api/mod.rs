use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::predict::{self, PipelineConfig, PredictError, PredictRequest};
use crate::stats::{self, GameLogProvider, PlayerInfo, SeasonStatsProvider, StatLine, Team};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn GameLogProvider>,
    pub season_stats: Arc<dyn SeasonStatsProvider>,
    pub pipeline: PipelineConfig,
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the API router.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/ping", get(ping_handler))
        .route("/api/teams", get(teams_handler))
        .route("/api/players", get(players_handler))
        .route("/api/player-stats", get(player_stats_handler))
        .route("/api/team-stats", get(team_stats_handler))
        .route("/api/team-stats/league", get(league_team_stats_handler))
        .route("/api/predict", get(predict_handler))
        .route("/api/over-under", get(over_under_handler))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// CORS policy for browser clients on the given origins.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

fn error_body(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn bad_request(message: &str) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message)
}

fn not_found(message: &str) -> ApiError {
    error_body(StatusCode::NOT_FOUND, message)
}

/// Season-average lookups report provider failures as 500.
fn stats_failure(err: anyhow::Error) -> ApiError {
    warn!("Stats lookup failed: {:#}", err);
    error_body(StatusCode::INTERNAL_SERVER_ERROR, &format!("{:#}", err))
}

/// Unwrap query parameters, turning a parse failure into a JSON 400.
fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(p)| p)
        .map_err(|rejection| bad_request(&rejection.body_text()))
}

/// Trimmed, non-empty parameter or a 400 naming it.
fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(bad_request(&format!("Please provide a {} parameter", name))),
    }
}

fn status_for(err: &PredictError) -> StatusCode {
    match err {
        PredictError::NotFound(_) => StatusCode::NOT_FOUND,
        PredictError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PredictError::InsufficientData(_) | PredictError::DegenerateTrainingSet => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PredictError::Upstream(_) => StatusCode::BAD_GATEWAY,
    }
}

fn predict_error(err: PredictError) -> ApiError {
    if matches!(err, PredictError::Upstream(_)) {
        warn!("Upstream failure: {}", err);
    }
    error_body(status_for(&err), &err.to_string())
}

/// GET /api/ping
async fn ping_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "API is working" }))
}

/// GET /api/teams
async fn teams_handler() -> Json<&'static [Team]> {
    Json(stats::TEAMS)
}

#[derive(Debug, Deserialize)]
struct PlayersParams {
    name: Option<String>,
}

/// GET /api/players?name=lebron
async fn players_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PlayersParams>, QueryRejection>,
) -> ApiResult<Vec<PlayerInfo>> {
    let name = required(query_params(params)?.name, "name")?;
    state
        .provider
        .search_players(&name)
        .await
        .map(Json)
        .map_err(|e| predict_error(PredictError::upstream(e)))
}

#[derive(Debug, Deserialize)]
struct PlayerStatsParams {
    player: Option<String>,
    season: Option<String>,
}

/// GET /api/player-stats?player=LeBron%20James&season=2024-25
async fn player_stats_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PlayerStatsParams>, QueryRejection>,
) -> ApiResult<StatLine> {
    let params = query_params(params)?;
    let player = required(params.player, "player")?;
    let season = params
        .season
        .unwrap_or_else(|| state.pipeline.season.clone());

    let info = state
        .provider
        .find_player(&player)
        .await
        .map_err(stats_failure)?
        .ok_or_else(|| not_found(&format!("Player '{}' not found", player)))?;
    state
        .season_stats
        .player_season_stats(info.id, &season)
        .await
        .map_err(stats_failure)?
        .map(Json)
        .ok_or_else(|| not_found("No stats available for this player"))
}

#[derive(Debug, Deserialize)]
struct TeamStatsParams {
    team: Option<String>,
    season: Option<String>,
}

/// GET /api/team-stats?team=LAL&season=2024-25
async fn team_stats_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<TeamStatsParams>, QueryRejection>,
) -> ApiResult<StatLine> {
    let params = query_params(params)?;
    let team_name = required(params.team, "team")?;
    let season = params
        .season
        .unwrap_or_else(|| state.pipeline.season.clone());

    let team = stats::find_team(&team_name)
        .ok_or_else(|| not_found(&format!("Team '{}' not found", team_name)))?;
    state
        .season_stats
        .team_season_stats(&season, Some(team.id))
        .await
        .map_err(stats_failure)?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| not_found("No stats available for this team"))
}

#[derive(Debug, Deserialize)]
struct SeasonParams {
    season: Option<String>,
}

/// GET /api/team-stats/league?season=2024-25
async fn league_team_stats_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SeasonParams>, QueryRejection>,
) -> ApiResult<Vec<StatLine>> {
    let season = query_params(params)?
        .season
        .unwrap_or_else(|| state.pipeline.season.clone());
    state
        .season_stats
        .team_season_stats(&season, None)
        .await
        .map(Json)
        .map_err(stats_failure)
}

#[derive(Debug, Deserialize)]
struct PredictParams {
    player: Option<String>,
    threshold: Option<f64>,
    home: Option<bool>,
}

/// GET /api/predict?player=LeBron%20James&threshold=24.5&home=true
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PredictParams>, QueryRejection>,
) -> ApiResult<predict::Prediction> {
    let params = query_params(params)?;
    let player = required(params.player, "player")?;
    let Some(threshold) = params.threshold else {
        return Err(bad_request("Please provide a threshold parameter"));
    };
    let request = PredictRequest {
        player,
        threshold,
        is_home: params.home.unwrap_or(true),
    };
    predict::predict_over_under(state.provider.as_ref(), &request, &state.pipeline)
        .await
        .map(Json)
        .map_err(predict_error)
}

#[derive(Debug, Deserialize)]
struct OverUnderParams {
    player: Option<String>,
    threshold: Option<f64>,
    season: Option<String>,
}

/// GET /api/over-under?player=LeBron%20James&threshold=24.5
async fn over_under_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<OverUnderParams>, QueryRejection>,
) -> ApiResult<predict::OverUnderHistory> {
    let params = query_params(params)?;
    let player = required(params.player, "player")?;
    let Some(threshold) = params.threshold else {
        return Err(bad_request("Please provide a threshold parameter"));
    };
    let season = params
        .season
        .unwrap_or_else(|| state.pipeline.season.clone());
    predict::player_over_under_history(state.provider.as_ref(), &player, threshold, &season)
        .await
        .map(Json)
        .map_err(predict_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::GameRecord;
    use async_trait::async_trait;

    const LAKERS: i64 = 1610612747;

    /// Knows one player ("Rookie") with no games and season averages for
    /// the Lakers only.
    struct EmptyProvider {
        stats_down: bool,
    }

    #[async_trait]
    impl GameLogProvider for EmptyProvider {
        fn name(&self) -> &str {
            "empty"
        }

        async fn search_players(&self, term: &str) -> anyhow::Result<Vec<PlayerInfo>> {
            if term.eq_ignore_ascii_case("rookie") {
                return Ok(vec![PlayerInfo {
                    id: 9,
                    full_name: "Rookie".into(),
                    is_active: true,
                }]);
            }
            Ok(vec![])
        }

        async fn fetch_game_logs(&self, _: i64, _: &str) -> anyhow::Result<Vec<GameRecord>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl SeasonStatsProvider for EmptyProvider {
        async fn player_season_stats(&self, _: i64, _: &str) -> anyhow::Result<Option<StatLine>> {
            if self.stats_down {
                anyhow::bail!("NBA stats error 503");
            }
            Ok(None)
        }

        async fn team_season_stats(
            &self,
            season: &str,
            team_id: Option<i64>,
        ) -> anyhow::Result<Vec<StatLine>> {
            if self.stats_down {
                anyhow::bail!("NBA stats error 503");
            }
            let line = |id: i64, pts: f64| -> StatLine {
                let mut line = StatLine::new();
                line.insert("TEAM_ID".into(), json!(id));
                line.insert("SEASON".into(), json!(season));
                line.insert("PTS".into(), json!(pts));
                line
            };
            let league = vec![line(LAKERS, 116.2), line(1610612738, 116.3)];
            Ok(match team_id {
                Some(id) => league.into_iter().filter(|l| l["TEAM_ID"] == json!(id)).collect(),
                None => league,
            })
        }
    }

    fn app_state(stats_down: bool) -> AppState {
        let provider = Arc::new(EmptyProvider { stats_down });
        AppState {
            provider: provider.clone(),
            season_stats: provider,
            pipeline: PipelineConfig::default(),
        }
    }

    fn state() -> State<Arc<AppState>> {
        State(Arc::new(app_state(false)))
    }

    /// Serve the router on an ephemeral port and return its base URL.
    async fn spawn_app(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state, CorsLayer::new()))
                .await
                .unwrap();
        });
        format!("http://{}", addr)
    }

    async fn get_json(url: String) -> (reqwest::StatusCode, Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap();
        (status, body)
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            status_for(&PredictError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&PredictError::DegenerateTrainingSet),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PredictError::InsufficientData("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PredictError::Upstream("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&PredictError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn cors_rejects_invalid_origin() {
        assert!(cors_layer(&["http://localhost:3000".into()]).is_ok());
        assert!(cors_layer(&["bad\norigin".into()]).is_err());
    }

    #[tokio::test]
    async fn predict_requires_player_and_threshold() {
        let params = PredictParams {
            player: None,
            threshold: Some(20.0),
            home: None,
        };
        let (status, _) = predict_handler(state(), Ok(Query(params))).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let params = PredictParams {
            player: Some("Rookie".into()),
            threshold: None,
            home: None,
        };
        let (status, _) = predict_handler(state(), Ok(Query(params))).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn predict_surfaces_pipeline_errors() {
        let params = PredictParams {
            player: Some("Ghost".into()),
            threshold: Some(20.0),
            home: Some(false),
        };
        let (status, Json(body)) = predict_handler(state(), Ok(Query(params)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Player 'Ghost' not found");

        let params = PredictParams {
            player: Some("Rookie".into()),
            threshold: Some(20.0),
            home: None,
        };
        let (status, _) = predict_handler(state(), Ok(Query(params))).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn players_requires_name() {
        let params = PlayersParams {
            name: Some("  ".into()),
        };
        let err = players_handler(state(), Ok(Query(params))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let params = PlayersParams {
            name: Some("rookie".into()),
        };
        let Json(found) = players_handler(state(), Ok(Query(params))).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn over_under_for_player_without_games() {
        let params = OverUnderParams {
            player: Some("Rookie".into()),
            threshold: Some(10.0),
            season: None,
        };
        let Json(history) = over_under_handler(state(), Ok(Query(params))).await.unwrap();
        assert_eq!(history.total_games, 0);
    }

    #[tokio::test]
    async fn team_stats_resolve_abbreviation_or_name() {
        for team in ["LAL", "lakers"] {
            let params = TeamStatsParams {
                team: Some(team.into()),
                season: Some("2023-24".into()),
            };
            let Json(line) = team_stats_handler(state(), Ok(Query(params))).await.unwrap();
            assert_eq!(line["TEAM_ID"], json!(LAKERS));
            assert_eq!(line["SEASON"], "2023-24");
        }

        let params = TeamStatsParams {
            team: Some("Sonics".into()),
            season: None,
        };
        let (status, Json(body)) = team_stats_handler(state(), Ok(Query(params)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Team 'Sonics' not found");

        // Resolves, but the provider has nothing for the Hawks.
        let params = TeamStatsParams {
            team: Some("ATL".into()),
            season: None,
        };
        let (status, Json(body)) = team_stats_handler(state(), Ok(Query(params)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No stats available for this team");

        let params = TeamStatsParams {
            team: None,
            season: None,
        };
        let (status, _) = team_stats_handler(state(), Ok(Query(params))).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn player_stats_distinguish_unknown_player_from_missing_stats() {
        let params = PlayerStatsParams {
            player: Some("Ghost".into()),
            season: None,
        };
        let (status, Json(body)) = player_stats_handler(state(), Ok(Query(params)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Player 'Ghost' not found");

        let params = PlayerStatsParams {
            player: Some("Rookie".into()),
            season: None,
        };
        let (status, Json(body)) = player_stats_handler(state(), Ok(Query(params)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No stats available for this player");
    }

    #[tokio::test]
    async fn stats_failures_are_server_errors() {
        let down = State(Arc::new(app_state(true)));
        let (status, Json(body)) =
            league_team_stats_handler(down.clone(), Ok(Query(SeasonParams { season: None })))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("503"));

        let params = PlayerStatsParams {
            player: Some("Rookie".into()),
            season: None,
        };
        let (status, _) = player_stats_handler(down, Ok(Query(params))).await.unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unparseable_query_gets_a_json_error() {
        let base = spawn_app(app_state(false)).await;

        let (status, body) = get_json(format!("{}/api/predict?player=x&threshold=abc", base)).await;
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());

        let (status, body) =
            get_json(format!("{}/api/over-under?player=Rookie&threshold=20&home=1", base)).await;
        assert_eq!(status, reqwest::StatusCode::OK, "unknown keys are ignored: {}", body);

        let (status, body) =
            get_json(format!("{}/api/predict?player=Rookie&threshold=20&home=1", base)).await;
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn router_serves_team_routes() {
        let base = spawn_app(app_state(false)).await;

        let (status, teams) = get_json(format!("{}/api/teams", base)).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(teams.as_array().unwrap().len(), 30);
        assert_eq!(teams[0]["abbreviation"], "ATL");

        let (status, line) = get_json(format!("{}/api/team-stats?team=LAL", base)).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(line["TEAM_ID"], json!(LAKERS));

        let (status, league) = get_json(format!("{}/api/team-stats/league", base)).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(league.as_array().unwrap().len(), 2);
        assert_eq!(league[0]["SEASON"], "2024-25");
    }
}
