use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::models::{parse_minutes, GameRecord, PlayerInfo};
use super::provider::{GameLogProvider, SeasonStatsProvider, StatLine};

/// Game-log, player-index and season-average client for the stats.nba.com JSON API.
pub struct NbaStats {
    http: Client,
    base_url: String,
    /// Season used to fetch the player index
    season: String,
    /// Minimum spacing between two requests
    spacing: Duration,
    last_request: Mutex<Option<Instant>>,
    players: OnceCell<Vec<PlayerInfo>>,
}

impl NbaStats {
    pub fn new(base_url: &str, season: &str, timeout: Duration, spacing: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // stats.nba.com drops requests that don't look like they come from nba.com
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            ),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(NbaStats {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            season: season.to_string(),
            spacing,
            last_request: Mutex::new(None),
            players: OnceCell::new(),
        })
    }

    /// Wait until at least `spacing` has passed since the previous request.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.spacing;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.throttle().await;
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("Fetching {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("NBA stats request to {} failed", endpoint))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("NBA stats error {} on {}: {}", status, endpoint, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse NBA stats response from {}", endpoint))
    }

    async fn player_index(&self) -> Result<&[PlayerInfo]> {
        let players = self
            .players
            .get_or_try_init(|| async {
                let raw = self
                    .get_json(
                        "commonallplayers",
                        &[
                            ("LeagueID", "00"),
                            ("Season", self.season.as_str()),
                            ("IsOnlyCurrentSeason", "0"),
                        ],
                    )
                    .await?;
                let players = parse_player_index(&raw)?;
                info!("Loaded NBA player index ({} players)", players.len());
                Ok::<_, anyhow::Error>(players)
            })
            .await?;
        Ok(players.as_slice())
    }
}

#[async_trait]
impl GameLogProvider for NbaStats {
    fn name(&self) -> &str {
        "stats.nba.com"
    }

    async fn search_players(&self, term: &str) -> Result<Vec<PlayerInfo>> {
        let index = self.player_index().await?;
        Ok(filter_players(index, term))
    }

    async fn fetch_game_logs(&self, player_id: i64, season: &str) -> Result<Vec<GameRecord>> {
        let id = player_id.to_string();
        let raw = self
            .get_json(
                "playergamelog",
                &[
                    ("PlayerID", id.as_str()),
                    ("Season", season),
                    ("SeasonType", "Regular Season"),
                ],
            )
            .await?;
        let records = parse_game_log(&raw)?;
        debug!(
            "Fetched {} game(s) for player {} in {}",
            records.len(),
            player_id,
            season
        );
        Ok(records)
    }
}

/// Filters shared by the dashboard endpoints: regular season, per-game
/// averages, no splits.
const DASHBOARD_QUERY: &[(&str, &str)] = &[
    ("MeasureType", "Base"),
    ("PerMode", "PerGame"),
    ("PlusMinus", "N"),
    ("PaceAdjust", "N"),
    ("Rank", "N"),
    ("SeasonType", "Regular Season"),
    ("LastNGames", "0"),
    ("Month", "0"),
    ("OpponentTeamID", "0"),
    ("Period", "0"),
    ("LeagueID", "00"),
];

#[async_trait]
impl SeasonStatsProvider for NbaStats {
    async fn player_season_stats(&self, player_id: i64, season: &str) -> Result<Option<StatLine>> {
        let id = player_id.to_string();
        let mut query = vec![("PlayerID", id.as_str()), ("Season", season)];
        query.extend_from_slice(DASHBOARD_QUERY);
        let raw = self
            .get_json("playerdashboardbygeneralsplits", &query)
            .await?;
        let line = parse_stat_lines(&raw, "OverallPlayerDashboard")?
            .into_iter()
            .next();
        debug!(
            "Player {} season averages for {}: {}",
            player_id,
            season,
            if line.is_some() { "found" } else { "none" }
        );
        Ok(line)
    }

    async fn team_season_stats(&self, season: &str, team_id: Option<i64>) -> Result<Vec<StatLine>> {
        let id = team_id.unwrap_or(0).to_string();
        let mut query = vec![("TeamID", id.as_str()), ("Season", season)];
        query.extend_from_slice(DASHBOARD_QUERY);
        let raw = self.get_json("leaguedashteamstats", &query).await?;
        let mut lines = parse_stat_lines(&raw, "LeagueDashTeamStats")?;
        if let Some(team_id) = team_id {
            lines.retain(|line| line.get("TEAM_ID").and_then(Value::as_i64) == Some(team_id));
        }
        debug!("Fetched {} team stat line(s) for {}", lines.len(), season);
        Ok(lines)
    }
}

/// Case-insensitive substring match on full names, in index order.
pub fn filter_players(index: &[PlayerInfo], term: &str) -> Vec<PlayerInfo> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    index
        .iter()
        .filter(|p| p.full_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// A header/rowSet table from an NBA stats response.
struct ResultSet<'a> {
    headers: Vec<&'a str>,
    rows: &'a [Value],
}

impl<'a> ResultSet<'a> {
    fn find(raw: &'a Value, name: &str) -> Result<Self> {
        let sets = raw["resultSets"]
            .as_array()
            .context("NBA stats response has no resultSets")?;
        let set = sets
            .iter()
            .find(|s| s["name"].as_str() == Some(name))
            .or_else(|| sets.first())
            .with_context(|| format!("NBA stats response has no {} result set", name))?;
        let headers = set["headers"]
            .as_array()
            .context("result set has no headers")?
            .iter()
            .map(|h| h.as_str().unwrap_or_default())
            .collect();
        let rows = set["rowSet"]
            .as_array()
            .map(Vec::as_slice)
            .context("result set has no rowSet")?;
        Ok(ResultSet { headers, rows })
    }

    /// Rows as header-keyed maps. Rows that are not arrays are skipped.
    fn stat_lines(&self) -> Vec<StatLine> {
        self.rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .map(|(h, v)| (h.to_string(), v.clone()))
                    .collect()
            })
            .collect()
    }

    fn column(&self, header: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| *h == header)
            .with_context(|| format!("result set is missing column {}", header))
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

pub fn parse_player_index(raw: &Value) -> Result<Vec<PlayerInfo>> {
    let set = ResultSet::find(raw, "CommonAllPlayers")?;
    let id_col = set.column("PERSON_ID")?;
    let name_col = set.column("DISPLAY_FIRST_LAST")?;
    let roster_col = set.column("ROSTERSTATUS").ok();

    let players = set
        .rows
        .iter()
        .filter_map(|row| {
            let id = row[id_col].as_i64()?;
            let full_name = row[name_col].as_str()?.to_string();
            let is_active = roster_col
                .and_then(|c| as_f64(&row[c]))
                .map(|s| s > 0.0)
                .unwrap_or(false);
            Some(PlayerInfo {
                id,
                full_name,
                is_active,
            })
        })
        .collect();
    Ok(players)
}

pub fn parse_stat_lines(raw: &Value, set_name: &str) -> Result<Vec<StatLine>> {
    Ok(ResultSet::find(raw, set_name)?.stat_lines())
}

/// Column positions of the fields read from a game log.
struct GameLogColumns {
    date: usize,
    matchup: usize,
    pts: usize,
    fga: usize,
    fg_pct: usize,
    min: usize,
    fg3_pct: Option<usize>,
    fg3a: Option<usize>,
}

impl GameLogColumns {
    fn locate(set: &ResultSet<'_>) -> Result<Self> {
        Ok(GameLogColumns {
            date: set.column("GAME_DATE")?,
            matchup: set.column("MATCHUP")?,
            pts: set.column("PTS")?,
            fga: set.column("FGA")?,
            fg_pct: set.column("FG_PCT")?,
            min: set.column("MIN")?,
            fg3_pct: set.column("FG3_PCT").ok(),
            fg3a: set.column("FG3A").ok(),
        })
    }

    fn parse_row(&self, row: &Value) -> Option<GameRecord> {
        let game_date = parse_game_date(row[self.date].as_str()?)?;
        let matchup = row[self.matchup].as_str()?.to_string();
        let points = as_f64(&row[self.pts])?;
        let fga = as_f64(&row[self.fga])?;
        let fg_pct = as_f64(&row[self.fg_pct]).unwrap_or(0.0);
        let minutes = match &row[self.min] {
            Value::String(s) => parse_minutes(s)?,
            other => as_f64(other)?,
        };
        // The API reports 0.0 for nights without a three-point attempt.
        let fg3_pct = match self.fg3a.and_then(|c| as_f64(&row[c])) {
            Some(attempts) if attempts <= 0.0 => None,
            _ => self.fg3_pct.and_then(|c| as_f64(&row[c])),
        };
        Some(GameRecord {
            game_date,
            matchup,
            points: points.max(0.0) as u32,
            fga: fga.max(0.0) as u32,
            fg_pct,
            fg3_pct,
            minutes,
        })
    }
}

pub fn parse_game_log(raw: &Value) -> Result<Vec<GameRecord>> {
    let set = ResultSet::find(raw, "PlayerGameLog")?;
    let columns = GameLogColumns::locate(&set)?;

    let mut records = Vec::with_capacity(set.rows.len());
    for row in set.rows {
        match columns.parse_row(row) {
            Some(record) => records.push(record),
            None => warn!("Skipping malformed game log row: {}", row),
        }
    }
    Ok(records)
}
