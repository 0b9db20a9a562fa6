pub mod models;
pub mod nba;
pub mod provider;
pub mod teams;

pub use models::{GameRecord, PlayerInfo};
pub use nba::NbaStats;
pub use provider::{GameLogProvider, SeasonStatsProvider, StatLine};
pub use teams::{find_team, Team, TEAMS};
