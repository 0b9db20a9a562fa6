use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Matchup marker for a home game ("LAL vs. BOS").
const HOME_MARKER: &str = " vs. ";
/// Matchup marker for an away game ("LAL @ BOS").
const AWAY_MARKER: &str = " @ ";

/// One game from a player's log, as retrieved from the stats provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_date: NaiveDate,
    /// e.g. "LAL vs. BOS" (home) or "LAL @ BOS" (away)
    pub matchup: String,
    pub points: u32,
    /// Field goals attempted
    pub fga: u32,
    /// Field-goal percentage as a fraction (0.0–1.0)
    pub fg_pct: f64,
    /// Three-point percentage as a fraction; `None` when no threes were attempted
    pub fg3_pct: Option<f64>,
    /// Minutes played, in decimal minutes
    pub minutes: f64,
}

impl GameRecord {
    pub fn is_home(&self) -> bool {
        self.matchup.contains(HOME_MARKER)
    }

    /// Opponent abbreviation parsed from the matchup, if the matchup is well-formed.
    pub fn opponent(&self) -> Option<&str> {
        self.matchup
            .split_once(HOME_MARKER)
            .or_else(|| self.matchup.split_once(AWAY_MARKER))
            .map(|(_, opp)| opp.trim())
            .filter(|opp| !opp.is_empty())
    }
}

/// A player as known to the stats provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: i64,
    pub full_name: String,
    pub is_active: bool,
}

/// Normalise a minutes value to decimal minutes.
///
/// Accepts `"MM:SS"` (`"34:30"` → 34.5) or a plain number (`"34"`, `"33.5"`).
pub fn parse_minutes(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let minutes = match raw.split_once(':') {
        Some((mm, ss)) => {
            let mm: f64 = mm.trim().parse().ok()?;
            let ss: f64 = ss.trim().parse().ok()?;
            mm + ss / 60.0
        }
        None => raw.parse().ok()?,
    };
    (minutes.is_finite() && minutes >= 0.0).then_some(minutes)
}
