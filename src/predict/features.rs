//! Rolling-window features over a player's game log.
//!
//! Historical rows are built from the `w` games strictly before the game they
//! describe (lag of one), so a row never sees its own outcome. The upcoming
//! row is built from the last `w` games that have been played (no lag). The
//! two paths are kept as separate functions on purpose; see
//! [`lagged_slice`] and [`trailing_slice`].

use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

use super::window::GameLogWindow;
use crate::stats::GameRecord;

/// Statistic computed for a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    HomeIndicator,
    PointsMean,
    PointsStd,
    FieldGoalsAttemptedMean,
    FieldGoalPctMean,
    ThreePointPctMean,
    MinutesMean,
}

/// Per-window statistics in column order.
const WINDOW_STATISTICS: [Statistic; 6] = [
    Statistic::PointsMean,
    Statistic::PointsStd,
    Statistic::FieldGoalsAttemptedMean,
    Statistic::FieldGoalPctMean,
    Statistic::ThreePointPctMean,
    Statistic::MinutesMean,
];

/// Identity of a feature column: which statistic over which window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    /// `None` for features that are not windowed (home indicator)
    pub window: Option<usize>,
    pub statistic: Statistic,
}

impl FeatureKey {
    pub const HOME: FeatureKey = FeatureKey {
        window: None,
        statistic: Statistic::HomeIndicator,
    };

    fn windowed(window: usize, statistic: Statistic) -> Self {
        FeatureKey {
            window: Some(window),
            statistic,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stem = match self.statistic {
            Statistic::HomeIndicator => return write!(f, "is_home"),
            Statistic::PointsMean => "pts",
            Statistic::PointsStd => "pts_std",
            Statistic::FieldGoalsAttemptedMean => "fga",
            Statistic::FieldGoalPctMean => "fg_pct",
            Statistic::ThreePointPctMean => "fg3_pct",
            Statistic::MinutesMean => "min",
        };
        match self.window {
            Some(w) => write!(f, "{}_last_{}", stem, w),
            None => write!(f, "{}", stem),
        }
    }
}

/// A single feature value tagged with its column identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub key: FeatureKey,
    pub value: f64,
}

/// One historical game turned into model input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Position of the game inside the window
    pub game_index: usize,
    pub game_date: NaiveDate,
    /// Values aligned with [`FeatureTable::keys`]
    pub values: Vec<f64>,
    /// Whether the player reached the threshold in this game
    pub label: bool,
}

/// Valid feature rows in chronological order, sharing one column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub keys: Vec<FeatureKey>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn labels(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.label).collect()
    }
}

/// Features for the game about to be played. Windows longer than the
/// available history leave their columns empty.
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingFeatureRow {
    pub keys: Vec<FeatureKey>,
    pub values: Vec<Option<f64>>,
}

impl UpcomingFeatureRow {
    /// The features that could be computed, in column order.
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.keys
            .iter()
            .zip(&self.values)
            .filter_map(|(&key, value)| value.map(|value| Feature { key, value }))
    }
}

/// Builds feature rows for one game log window.
pub struct FeatureBuilder<'a> {
    window: &'a GameLogWindow,
    keys: Vec<FeatureKey>,
}

impl<'a> FeatureBuilder<'a> {
    /// Decide the column schema for `window` and the given rolling windows.
    ///
    /// The three-point family is only emitted when every game in the window
    /// has a defined three-point percentage.
    pub fn new(window: &'a GameLogWindow, rolling_windows: &[usize]) -> Self {
        let has_threes = window.games().iter().all(|g| g.fg3_pct.is_some());

        let mut sizes: Vec<usize> = Vec::with_capacity(rolling_windows.len());
        for &w in rolling_windows {
            if !sizes.contains(&w) {
                sizes.push(w);
            }
        }

        let mut keys = vec![FeatureKey::HOME];
        for w in sizes {
            for statistic in WINDOW_STATISTICS {
                if statistic == Statistic::ThreePointPctMean && !has_threes {
                    continue;
                }
                keys.push(FeatureKey::windowed(w, statistic));
            }
        }
        FeatureBuilder { window, keys }
    }

    pub fn keys(&self) -> &[FeatureKey] {
        &self.keys
    }

    /// One row per historical game whose lagged windows are fully populated.
    /// Rows with any undefined feature are dropped.
    pub fn build(&self, threshold: f64) -> FeatureTable {
        let games = self.window.games();
        let rows: Vec<FeatureRow> = (0..games.len())
            .filter_map(|i| {
                let game = &games[i];
                let values = self
                    .keys
                    .iter()
                    .map(|key| match key.window {
                        None => Some(home_indicator(game.is_home())),
                        Some(w) => lagged_slice(games, i, w)
                            .and_then(|slice| window_statistic(slice, key.statistic)),
                    })
                    .collect::<Option<Vec<f64>>>()?;
                Some(FeatureRow {
                    game_index: i,
                    game_date: game.game_date,
                    values,
                    label: game.points as f64 >= threshold,
                })
            })
            .collect();

        debug!(
            "Feature table: {} valid row(s) of {} game(s), {} column(s)",
            rows.len(),
            games.len(),
            self.keys.len()
        );
        FeatureTable {
            keys: self.keys.clone(),
            rows,
        }
    }

    /// The row for the next game, from the most recent games played.
    pub fn build_upcoming(&self, is_home: bool) -> UpcomingFeatureRow {
        let games = self.window.games();
        let values = self
            .keys
            .iter()
            .map(|key| match key.window {
                None => Some(home_indicator(is_home)),
                Some(w) => trailing_slice(games, w)
                    .and_then(|slice| window_statistic(slice, key.statistic)),
            })
            .collect();
        UpcomingFeatureRow {
            keys: self.keys.clone(),
            values,
        }
    }
}

fn home_indicator(is_home: bool) -> f64 {
    if is_home {
        1.0
    } else {
        0.0
    }
}

/// The `w` games strictly before game `i`.
fn lagged_slice(games: &[GameRecord], i: usize, w: usize) -> Option<&[GameRecord]> {
    if w == 0 || i < w {
        return None;
    }
    Some(&games[i - w..i])
}

/// The last `w` games played, including the most recent one.
fn trailing_slice(games: &[GameRecord], w: usize) -> Option<&[GameRecord]> {
    if w == 0 || games.len() < w {
        return None;
    }
    Some(&games[games.len() - w..])
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Sample standard deviation; undefined for fewer than two values.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn window_statistic(slice: &[GameRecord], statistic: Statistic) -> Option<f64> {
    match statistic {
        Statistic::HomeIndicator => None,
        Statistic::PointsMean => mean(slice.iter().map(|g| g.points as f64)),
        Statistic::PointsStd => {
            let points: Vec<f64> = slice.iter().map(|g| g.points as f64).collect();
            sample_std(&points)
        }
        Statistic::FieldGoalsAttemptedMean => mean(slice.iter().map(|g| g.fga as f64)),
        Statistic::FieldGoalPctMean => mean(slice.iter().map(|g| g.fg_pct)),
        Statistic::ThreePointPctMean => {
            // Any undefined game leaves the whole window undefined.
            let values: Option<Vec<f64>> = slice.iter().map(|g| g.fg3_pct).collect();
            values.and_then(|v| mean(v.into_iter()))
        }
        Statistic::MinutesMean => mean(slice.iter().map(|g| g.minutes)),
    }
}
