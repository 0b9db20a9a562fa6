use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::models::{GameRecord, PlayerInfo};

/// Source of player identities and game logs.
#[async_trait]
pub trait GameLogProvider: Send + Sync {
    /// All players whose full name contains `term` (case-insensitive).
    async fn search_players(&self, term: &str) -> Result<Vec<PlayerInfo>>;

    /// Resolve a name to a player. When several players match, the first
    /// match is returned; ambiguous names are not rejected.
    async fn find_player(&self, name: &str) -> Result<Option<PlayerInfo>> {
        Ok(self.search_players(name).await?.into_iter().next())
    }

    /// Regular-season game logs for a player, in provider order.
    async fn fetch_game_logs(&self, player_id: i64, season: &str) -> Result<Vec<GameRecord>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// One row of season averages keyed by column name, as the stats API
/// reports it.
pub type StatLine = Map<String, Value>;

/// Source of per-game season averages for players and teams.
#[async_trait]
pub trait SeasonStatsProvider: Send + Sync {
    /// Overall per-game averages for a player, if the season has any.
    async fn player_season_stats(&self, player_id: i64, season: &str) -> Result<Option<StatLine>>;

    /// Per-game averages for every team, or only `team_id` when given.
    async fn team_season_stats(&self, season: &str, team_id: Option<i64>) -> Result<Vec<StatLine>>;
}
