use serde::Serialize;

/// A franchise as listed by the league's static team table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Team {
    pub id: i64,
    pub full_name: &'static str,
    pub abbreviation: &'static str,
    pub nickname: &'static str,
    pub city: &'static str,
    pub state: &'static str,
    pub year_founded: u16,
}

const fn team(
    id: i64,
    full_name: &'static str,
    abbreviation: &'static str,
    nickname: &'static str,
    city: &'static str,
    state: &'static str,
    year_founded: u16,
) -> Team {
    Team {
        id,
        full_name,
        abbreviation,
        nickname,
        city,
        state,
        year_founded,
    }
}

/// All current teams, in league id order.
pub const TEAMS: &[Team] = &[
    team(1610612737, "Atlanta Hawks", "ATL", "Hawks", "Atlanta", "Georgia", 1949),
    team(1610612738, "Boston Celtics", "BOS", "Celtics", "Boston", "Massachusetts", 1946),
    team(1610612739, "Cleveland Cavaliers", "CLE", "Cavaliers", "Cleveland", "Ohio", 1970),
    team(1610612740, "New Orleans Pelicans", "NOP", "Pelicans", "New Orleans", "Louisiana", 2002),
    team(1610612741, "Chicago Bulls", "CHI", "Bulls", "Chicago", "Illinois", 1966),
    team(1610612742, "Dallas Mavericks", "DAL", "Mavericks", "Dallas", "Texas", 1980),
    team(1610612743, "Denver Nuggets", "DEN", "Nuggets", "Denver", "Colorado", 1976),
    team(1610612744, "Golden State Warriors", "GSW", "Warriors", "Golden State", "California", 1946),
    team(1610612745, "Houston Rockets", "HOU", "Rockets", "Houston", "Texas", 1967),
    team(1610612746, "Los Angeles Clippers", "LAC", "Clippers", "Los Angeles", "California", 1970),
    team(1610612747, "Los Angeles Lakers", "LAL", "Lakers", "Los Angeles", "California", 1948),
    team(1610612748, "Miami Heat", "MIA", "Heat", "Miami", "Florida", 1988),
    team(1610612749, "Milwaukee Bucks", "MIL", "Bucks", "Milwaukee", "Wisconsin", 1968),
    team(1610612750, "Minnesota Timberwolves", "MIN", "Timberwolves", "Minnesota", "Minnesota", 1989),
    team(1610612751, "Brooklyn Nets", "BKN", "Nets", "Brooklyn", "New York", 1976),
    team(1610612752, "New York Knicks", "NYK", "Knicks", "New York", "New York", 1946),
    team(1610612753, "Orlando Magic", "ORL", "Magic", "Orlando", "Florida", 1989),
    team(1610612754, "Indiana Pacers", "IND", "Pacers", "Indiana", "Indiana", 1976),
    team(1610612755, "Philadelphia 76ers", "PHI", "76ers", "Philadelphia", "Pennsylvania", 1949),
    team(1610612756, "Phoenix Suns", "PHX", "Suns", "Phoenix", "Arizona", 1968),
    team(1610612757, "Portland Trail Blazers", "POR", "Trail Blazers", "Portland", "Oregon", 1970),
    team(1610612758, "Sacramento Kings", "SAC", "Kings", "Sacramento", "California", 1948),
    team(1610612759, "San Antonio Spurs", "SAS", "Spurs", "San Antonio", "Texas", 1976),
    team(1610612760, "Oklahoma City Thunder", "OKC", "Thunder", "Oklahoma City", "Oklahoma", 1967),
    team(1610612761, "Toronto Raptors", "TOR", "Raptors", "Toronto", "Ontario", 1995),
    team(1610612762, "Utah Jazz", "UTA", "Jazz", "Utah", "Utah", 1974),
    team(1610612763, "Memphis Grizzlies", "MEM", "Grizzlies", "Memphis", "Tennessee", 1995),
    team(1610612764, "Washington Wizards", "WAS", "Wizards", "Washington", "District of Columbia", 1961),
    team(1610612765, "Detroit Pistons", "DET", "Pistons", "Detroit", "Michigan", 1948),
    team(1610612766, "Charlotte Hornets", "CHA", "Hornets", "Charlotte", "North Carolina", 1988),
];

/// Resolve a team by exact abbreviation, then by full-name substring.
/// Both checks ignore case; when several full names match, the first in
/// [`TEAMS`] order wins.
pub fn find_team(query: &str) -> Option<&'static Team> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    if let Some(team) = TEAMS
        .iter()
        .find(|t| t.abbreviation.eq_ignore_ascii_case(query))
    {
        return Some(team);
    }
    let needle = query.to_lowercase();
    TEAMS
        .iter()
        .find(|t| t.full_name.to_lowercase().contains(&needle))
}
