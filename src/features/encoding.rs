//! Opponent one-hot encoding

use crate::data::normalize::{columns, NormalizedRecord};
use crate::{league, HoopsError, Result};
use std::collections::HashMap;

/// Most frequent value of the `Team` column; ties go to the team seen first
pub fn dominant_team(records: &[NormalizedRecord]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for team in records.iter().filter_map(|r| r.get_str(columns::TEAM)) {
        let team = team.trim();
        if team.is_empty() {
            continue;
        }
        let count = counts.entry(team).or_insert(0);
        if *count == 0 {
            order.push(team);
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for team in order {
        let count = counts[team];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((team, count));
        }
    }
    best.map(|(team, _)| team.to_string())
}

/// One indicator column per league team other than the player's own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpponentEncoder {
    columns: Vec<String>,
    /// Set when the own team is a league code left out of `columns`
    own_team: Option<String>,
}

impl OpponentEncoder {
    /// Columns for every franchise active in `season`
    pub fn for_season(season: u16, own_team: &str) -> Self {
        Self::with_teams(league::franchise_codes(season), own_team)
    }

    pub fn with_teams<S: AsRef<str>>(teams: impl IntoIterator<Item = S>, own_team: &str) -> Self {
        let mut own = None;
        let mut columns = Vec::new();
        for team in teams {
            let team = team.as_ref();
            if team == own_team {
                own = Some(team.to_string());
            } else {
                columns.push(team.to_string());
            }
        }
        OpponentEncoder { columns, own_team: own }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Flags for one opponent; exactly one of them is 1.
    ///
    /// A game against the own team (possible after a mid-season trade) gets
    /// the own team's column appended as the set flag.
    pub fn encode(&self, opponent: &str) -> Result<Vec<(String, u8)>> {
        let opponent = opponent.trim();
        let mut flags: Vec<(String, u8)> = self
            .columns
            .iter()
            .map(|c| (c.clone(), u8::from(c == opponent)))
            .collect();

        if flags.iter().any(|(_, flag)| *flag == 1) {
            return Ok(flags);
        }
        match &self.own_team {
            Some(own) if own == opponent => {
                flags.push((own.clone(), 1));
                Ok(flags)
            }
            _ => Err(HoopsError::UnknownTeam(opponent.to_string())),
        }
    }
}
