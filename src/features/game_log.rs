//! Per-game derived features
//!
//! Turns the played partition of a normalized game log into
//! [`GameLogRecord`]s: score share, opponent flags, double/triple-double
//! bonuses, fantasy score and the box score URL of each game.

use super::encoding::{dominant_team, OpponentEncoder};
use super::fantasy::{bonuses, fantasy_score, percent_score, required_number, StatLine};
use crate::data::normalize::{columns, NormalizedRecord, Value};
use crate::{HoopsError, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// Season-level inputs to derivation
#[derive(Debug, Clone)]
pub struct DeriveContext {
    /// Ending year of the season; selects the franchise list
    pub season: u16,
    pub base_url: String,
    pub player: Option<String>,
}

/// One played game with derived fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameLogRecord {
    /// Normalized source row
    #[serde(skip)]
    pub record: NormalizedRecord,
    pub date: NaiveDate,
    pub team: String,
    pub opponent: String,
    pub result: u8,
    pub team_score: f64,
    pub opp_score: f64,
    pub seconds_played: i64,
    pub percent_score: f64,
    #[serde(skip)]
    pub stats: StatLine,
    pub double_double: u8,
    pub triple_double: u8,
    pub fantasy_score: f64,
    pub url: String,
    #[serde(skip)]
    pub opponents: Vec<(String, u8)>,
    pub player: Option<String>,
}

impl GameLogRecord {
    /// Source row followed by the derived columns
    pub fn to_record(&self) -> NormalizedRecord {
        let mut record = self.record.clone();
        record.set("Percent Score", Value::Float(self.percent_score));
        for (team, flag) in &self.opponents {
            record.set(team, Value::Int(i64::from(*flag)));
        }
        record.set("double_double", Value::Int(i64::from(self.double_double)));
        record.set("triple_double", Value::Int(i64::from(self.triple_double)));
        record.set("fantasy_score", Value::Float(self.fantasy_score));
        record.set("URL", Value::text(&self.url));
        if let Some(player) = &self.player {
            record.set("Player", Value::text(player));
        }
        record
    }
}

/// `{base}/boxscores/{YYYYMMDD}0{TEAM}.html`
pub fn box_score_url(base_url: &str, date: NaiveDate, team: &str) -> String {
    format!(
        "{}/boxscores/{}0{}.html",
        base_url.trim_end_matches('/'),
        date.format("%Y%m%d"),
        team
    )
}

/// Derive features for every played row; the first bad row aborts
pub fn derive_game_log(played: &[NormalizedRecord], context: &DeriveContext) -> Result<Vec<GameLogRecord>> {
    let Some(own_team) = dominant_team(played) else {
        return Ok(Vec::new());
    };
    let encoder = OpponentEncoder::for_season(context.season, &own_team);
    log::debug!(
        "Deriving {} games for {} with {} opponent columns",
        played.len(),
        own_team,
        encoder.columns().len()
    );

    played
        .iter()
        .map(|record| derive_row(record, &encoder, context))
        .collect()
}

fn derive_row(record: &NormalizedRecord, encoder: &OpponentEncoder, context: &DeriveContext) -> Result<GameLogRecord> {
    let date = record
        .get(columns::DATE)
        .and_then(Value::as_date)
        .ok_or_else(|| coercion(record, columns::DATE))?;
    let team = text(record, columns::TEAM)?;
    let opponent = text(record, columns::OPP)?;

    let result = match record.get(columns::RESULT) {
        Some(Value::Int(outcome)) => *outcome as u8,
        _ => return Err(coercion(record, columns::RESULT)),
    };
    let team_score = required_number(record, columns::TEAM_SCORE)?;
    let opp_score = required_number(record, columns::OPP_SCORE)?;
    let seconds_played = match record.get(columns::MP) {
        Some(Value::Int(seconds)) => *seconds,
        _ => return Err(coercion(record, columns::MP)),
    };

    let stats = StatLine::from_record(record)?;
    let bonus = bonuses(&stats);

    Ok(GameLogRecord {
        record: record.clone(),
        date,
        url: box_score_url(&context.base_url, date, &team),
        opponents: encoder.encode(&opponent)?,
        team,
        opponent,
        result,
        team_score,
        opp_score,
        seconds_played,
        percent_score: percent_score(stats.points, team_score)?,
        stats,
        double_double: bonus.double_double,
        triple_double: bonus.triple_double,
        fantasy_score: fantasy_score(&stats),
        player: context.player.clone(),
    })
}

fn text(record: &NormalizedRecord, column: &str) -> Result<String> {
    record
        .get_str(column)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| coercion(record, column))
}

fn coercion(record: &NormalizedRecord, column: &str) -> HoopsError {
    HoopsError::TypeCoercion {
        column: column.to_string(),
        value: record
            .get(column)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize::NormalizeRules;
    use crate::data::table::RawTable;

    const BASE: &str = "https://www.basketball-reference.com";

    fn context() -> DeriveContext {
        DeriveContext {
            season: 2025,
            base_url: BASE.to_string(),
            player: Some("Test Player".to_string()),
        }
    }

    fn mock_table() -> RawTable {
        let columns = [
            "Date", "Team", "Opp", "Result", "MP", "GS", "PTS", "TRB", "AST", "STL", "BLK", "TOV",
            "3P", "3P%",
        ];
        let rows = [
            [
                "20250101", "LAL", "BOS", "W 110-100", "30:00", "*", "20", "5", "5", "2", "1", "3",
                "2", "",
            ],
            ["20250103", "LAL", "GSW", "", "", "", "", "", "", "", "", "", "", ""],
            [
                "20250105", "LAL", "DEN", "L 100-120", "25:00", "*", "15", "3", "2", "1", "0", "2",
                "0", "0",
            ],
        ];
        RawTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_mock_season_end_to_end() {
        let table = NormalizeRules::game_log().normalize(mock_table()).unwrap();
        assert_eq!(table.played.len(), 2);
        assert_eq!(table.missed.len(), 1);
        assert_eq!(table.played[0].get("3P%"), Some(&Value::Float(0.0)));

        let games = derive_game_log(&table.played, &context()).unwrap();
        assert_eq!(games.len(), 2);

        let first = &games[0];
        assert_eq!(first.result, 1);
        assert_eq!(first.team_score, 110.0);
        assert_eq!(first.opp_score, 100.0);
        assert_eq!(first.seconds_played, 1800);
        assert_eq!(first.percent_score, 0.18);
        assert_eq!(first.double_double, 0);
        assert_eq!(first.triple_double, 0);
        // 5 + 5 + 10 + 2 + 1 - 3
        assert_eq!(first.fantasy_score, 20.0);
        assert_eq!(first.url, format!("{}/boxscores/202501010LAL.html", BASE));

        let second = &games[1];
        assert_eq!(second.result, 0);
        assert_eq!(second.seconds_played, 1500);
        assert_eq!(second.percent_score, 0.15);
        assert_eq!(second.fantasy_score, 11.5);
    }

    #[test]
    fn test_one_opponent_flag_per_row() {
        let table = NormalizeRules::game_log().normalize(mock_table()).unwrap();
        let games = derive_game_log(&table.played, &context()).unwrap();

        for game in &games {
            let set: Vec<_> = game.opponents.iter().filter(|(_, f)| *f == 1).collect();
            assert_eq!(set.len(), 1);
            assert_eq!(set[0].0, game.opponent);
            assert!(!game.opponents.iter().any(|(team, _)| team == "LAL"));
        }
    }

    #[test]
    fn test_to_record_appends_derived_columns() {
        let table = NormalizeRules::game_log().normalize(mock_table()).unwrap();
        let games = derive_game_log(&table.played, &context()).unwrap();
        let record = games[0].to_record();

        assert_eq!(record.get("Result"), Some(&Value::Int(1)));
        assert_eq!(record.get("MP"), Some(&Value::Int(1800)));
        assert_eq!(record.get("BOS"), Some(&Value::Int(1)));
        assert_eq!(record.get("DEN"), Some(&Value::Int(0)));
        assert_eq!(record.get("fantasy_score"), Some(&Value::Float(20.0)));
        assert_eq!(record.get_str("Player"), Some("Test Player"));
        assert!(record.get_str("URL").unwrap().ends_with("202501010LAL.html"));
    }

    #[test]
    fn test_zero_team_score_aborts() {
        let mut table = mock_table();
        table.rows[0][3] = "L 0-12".to_string();
        let normalized = NormalizeRules::game_log().normalize(table).unwrap();
        match derive_game_log(&normalized.played, &context()) {
            Err(HoopsError::DivisionByZero { column }) => assert_eq!(column, "Team Score"),
            other => panic!("expected DivisionByZero, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_opponent_aborts() {
        let mut table = mock_table();
        table.rows[2][2] = "SEA".to_string();
        let normalized = NormalizeRules::game_log().normalize(table).unwrap();
        assert!(matches!(
            derive_game_log(&normalized.played, &context()),
            Err(HoopsError::UnknownTeam(t)) if t == "SEA"
        ));
    }

    #[test]
    fn test_traded_player_faces_former_team() {
        let mut table = mock_table();
        table.rows[0][1] = "HOU".to_string();
        table.rows[0][2] = "LAL".to_string();
        table.rows[1] = [
            "20250103", "LAL", "BOS", "W 99-98", "20:00", "*", "10", "2", "1", "0", "0", "1", "0",
            "0",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let normalized = NormalizeRules::game_log().normalize(table).unwrap();
        assert_eq!(normalized.played.len(), 3);
        let games = derive_game_log(&normalized.played, &context()).unwrap();
        assert_eq!(games.len(), 3);

        for game in &games {
            let set: Vec<_> = game.opponents.iter().filter(|(_, f)| *f == 1).collect();
            assert_eq!(set.len(), 1);
            assert_eq!(set[0].0, game.opponent);
        }
        assert_eq!(games[0].to_record().get("LAL"), Some(&Value::Int(1)));
        assert_eq!(games[1].to_record().get("LAL"), None);
        assert_eq!(games[0].url, format!("{}/boxscores/202501010HOU.html", BASE));
    }

    #[test]
    fn test_empty_season() {
        assert!(derive_game_log(&[], &context()).unwrap().is_empty());
    }

    #[test]
    fn test_box_score_url() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        assert_eq!(
            box_score_url("https://www.basketball-reference.com/", date, "BOS"),
            "https://www.basketball-reference.com/boxscores/202411030BOS.html"
        );
    }
}
