use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::classifier::{Evaluation, FeatureImportance};
use super::window::GameLogWindow;
use crate::stats::GameRecord;

/// Number of games shown as recent form.
pub const RECENT_GAMES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Over,
    Under,
}

impl Outcome {
    pub fn from_label(over: bool) -> Self {
        if over {
            Outcome::Over
        } else {
            Outcome::Under
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Over => write!(f, "OVER"),
            Outcome::Under => write!(f, "UNDER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentGame {
    pub game_date: NaiveDate,
    pub matchup: String,
    pub opponent: Option<String>,
    pub pts: u32,
}

impl From<&GameRecord> for RecentGame {
    fn from(g: &GameRecord) -> Self {
        RecentGame {
            game_date: g.game_date,
            matchup: g.matchup.clone(),
            opponent: g.opponent().map(str::to_string),
            pts: g.points,
        }
    }
}

/// Everything a caller gets back from a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub player: String,
    pub point_threshold: f64,
    /// Last five games, oldest first
    pub recent_games: Vec<RecentGame>,
    /// Holdout accuracy; indicative only, the holdout is tiny
    pub model_accuracy: f64,
    pub confusion_matrix: [[u32; 2]; 2],
    pub prediction: Outcome,
    /// Probability of OVER for the upcoming game
    pub probability: f64,
    pub feature_importance: Vec<FeatureImportance>,
    pub recent_avg: f64,
    /// Share of all games in the window at or above the threshold
    pub historical_over_rate: f64,
    pub training_rows: usize,
    pub holdout_rows: usize,
}

/// Model-side inputs to [`assemble`].
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub evaluation: Evaluation,
    pub over: bool,
    pub probability: f64,
    pub feature_importance: Vec<FeatureImportance>,
    pub training_rows: usize,
    pub holdout_rows: usize,
}

pub fn historical_over_rate(games: &[GameRecord], threshold: f64) -> f64 {
    if games.is_empty() {
        return 0.0;
    }
    let over = games.iter().filter(|g| g.points as f64 >= threshold).count();
    over as f64 / games.len() as f64
}

pub fn assemble(
    player: &str,
    threshold: f64,
    window: &GameLogWindow,
    summary: ModelSummary,
) -> Prediction {
    let recent = window.recent(RECENT_GAMES);
    let recent_avg = if recent.is_empty() {
        0.0
    } else {
        recent.iter().map(|g| g.points as f64).sum::<f64>() / recent.len() as f64
    };

    Prediction {
        player: player.to_string(),
        point_threshold: threshold,
        recent_games: recent.iter().map(RecentGame::from).collect(),
        model_accuracy: summary.evaluation.accuracy,
        confusion_matrix: summary.evaluation.confusion_matrix,
        prediction: Outcome::from_label(summary.over),
        probability: summary.probability,
        feature_importance: summary.feature_importance,
        recent_avg,
        historical_over_rate: historical_over_rate(window.games(), threshold),
        training_rows: summary.training_rows,
        holdout_rows: summary.holdout_rows,
    }
}

/// Season-long over/under record for a player at a threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverUnderHistory {
    pub over_count: usize,
    pub under_count: usize,
    pub total_games: usize,
    pub over_rate: f64,
    pub home_over_rate: f64,
    pub away_over_rate: f64,
    pub avg_points: Option<f64>,
    pub median_points: Option<f64>,
    /// Sample standard deviation; needs at least two games
    pub std_points: Option<f64>,
}

pub fn over_under_history(games: &[GameRecord], threshold: f64) -> OverUnderHistory {
    let is_over = |g: &&GameRecord| g.points as f64 >= threshold;
    let rate = |over: usize, total: usize| {
        if total == 0 {
            0.0
        } else {
            over as f64 / total as f64
        }
    };

    let total_games = games.len();
    let over_count = games.iter().filter(is_over).count();
    let (home, away): (Vec<&GameRecord>, Vec<&GameRecord>) =
        games.iter().partition(|g| g.is_home());
    let home_over = home.iter().filter(|g| is_over(*g)).count();
    let away_over = away.iter().filter(|g| is_over(*g)).count();

    let mut points: Vec<f64> = games.iter().map(|g| g.points as f64).collect();
    points.sort_by(f64::total_cmp);
    let avg_points = (!points.is_empty()).then(|| points.iter().sum::<f64>() / points.len() as f64);
    let median_points = match points.len() {
        0 => None,
        n if n % 2 == 1 => Some(points[n / 2]),
        n => Some((points[n / 2 - 1] + points[n / 2]) / 2.0),
    };
    let std_points = avg_points.filter(|_| points.len() > 1).map(|m| {
        let var = points.iter().map(|p| (p - m).powi(2)).sum::<f64>() / (points.len() - 1) as f64;
        var.sqrt()
    });

    OverUnderHistory {
        over_count,
        under_count: total_games - over_count,
        total_games,
        over_rate: rate(over_count, total_games),
        home_over_rate: rate(home_over, home.len()),
        away_over_rate: rate(away_over, away.len()),
        avg_points,
        median_points,
        std_points,
    }
}
