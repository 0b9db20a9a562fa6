use tracing::debug;

use super::error::{PredictError, Result};
use crate::stats::GameRecord;

/// A player's most recent games, oldest first, one record per game date.
#[derive(Debug, Clone)]
pub struct GameLogWindow {
    games: Vec<GameRecord>,
}

impl GameLogWindow {
    /// Build a window of exactly `cap` games from provider-ordered records.
    ///
    /// Records are de-duplicated by game date, the most recent `cap` are kept
    /// and the result is re-sorted chronologically. Fails when fewer than
    /// `cap` distinct games are available.
    pub fn new(records: &[GameRecord], cap: usize) -> Result<Self> {
        let mut games: Vec<GameRecord> = records.to_vec();
        // Newest first so the cut keeps the latest games.
        games.sort_by(|a, b| b.game_date.cmp(&a.game_date));
        games.dedup_by_key(|g| g.game_date);

        if games.len() < cap {
            return Err(PredictError::InsufficientData(format!(
                "{} game(s) available, {} required",
                games.len(),
                cap
            )));
        }

        games.truncate(cap);
        games.reverse();
        debug!(
            "Game log window: {} game(s) from {} to {}",
            games.len(),
            games[0].game_date,
            games[games.len() - 1].game_date
        );
        Ok(GameLogWindow { games })
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// The last `n` games, oldest first.
    pub fn recent(&self, n: usize) -> &[GameRecord] {
        &self.games[self.games.len().saturating_sub(n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn game(day: i64, points: u32) -> GameRecord {
        GameRecord {
            game_date: NaiveDate::from_ymd_opt(2024, 10, 22).unwrap() + Duration::days(day),
            matchup: "LAL vs. BOS".into(),
            points,
            fga: 15,
            fg_pct: 0.5,
            fg3_pct: Some(0.35),
            minutes: 32.0,
        }
    }

    #[test]
    fn rejects_short_history() {
        let records: Vec<_> = (0..19).map(|d| game(d, 20)).collect();
        let err = GameLogWindow::new(&records, 20).unwrap_err();
        assert!(matches!(err, PredictError::InsufficientData(_)));
    }

    #[test]
    fn keeps_most_recent_in_chronological_order() {
        // Provider order is newest first, as the stats API returns it.
        let records: Vec<_> = (0..30).rev().map(|d| game(d, d as u32)).collect();
        let window = GameLogWindow::new(&records, 20).unwrap();

        assert_eq!(window.len(), 20);
        let points: Vec<u32> = window.games().iter().map(|g| g.points).collect();
        assert_eq!(points, (10..30).collect::<Vec<u32>>());
        assert!(window
            .games()
            .windows(2)
            .all(|w| w[0].game_date < w[1].game_date));
    }

    #[test]
    fn duplicate_dates_count_once() {
        let mut records: Vec<_> = (0..20).map(|d| game(d, 20)).collect();
        records.push(game(5, 99));
        let window = GameLogWindow::new(&records, 20).unwrap();
        assert_eq!(window.len(), 20);

        records.truncate(19);
        records.push(game(3, 10));
        assert!(GameLogWindow::new(&records, 20).is_err());
    }

    #[test]
    fn recent_returns_tail() {
        let records: Vec<_> = (0..20).map(|d| game(d, d as u32)).collect();
        let window = GameLogWindow::new(&records, 20).unwrap();
        let recent: Vec<u32> = window.recent(5).iter().map(|g| g.points).collect();
        assert_eq!(recent, vec![15, 16, 17, 18, 19]);
    }
}
