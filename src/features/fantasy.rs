//! Fantasy scoring
//!
//! Score = TRB + AST + 0.5 * PTS + STL + BLK - TOV + double-double bonus
//! + triple-double bonus, rounded to two decimals.

use crate::data::normalize::{columns, NormalizedRecord};
use crate::{HoopsError, Result};

/// Counting stats that feed the fantasy score
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatLine {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
}

impl StatLine {
    /// Read the stat columns of a normalized game log row
    pub fn from_record(record: &NormalizedRecord) -> Result<Self> {
        Ok(StatLine {
            points: required_number(record, columns::PTS)?,
            rebounds: required_number(record, columns::TRB)?,
            assists: required_number(record, columns::AST)?,
            steals: required_number(record, columns::STL)?,
            blocks: required_number(record, columns::BLK)?,
            turnovers: required_number(record, columns::TOV)?,
        })
    }

    /// How many of points, rebounds, assists, steals and blocks reached ten
    pub fn double_digit_categories(&self) -> usize {
        [self.points, self.rebounds, self.assists, self.steals, self.blocks]
            .iter()
            .filter(|&&v| v >= 10.0)
            .count()
    }
}

/// Numeric column value; absent or non-numeric cells are coercion errors
pub(crate) fn required_number(record: &NormalizedRecord, column: &str) -> Result<f64> {
    record.get_f64(column).ok_or_else(|| HoopsError::TypeCoercion {
        column: column.to_string(),
        value: record
            .get(column)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    })
}

/// Double- and triple-double bonus points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bonuses {
    pub double_double: u8,
    pub triple_double: u8,
}

pub fn bonuses(line: &StatLine) -> Bonuses {
    let categories = line.double_digit_categories();
    Bonuses {
        double_double: u8::from(categories >= 2),
        triple_double: if categories >= 3 { 2 } else { 0 },
    }
}

pub fn fantasy_score(line: &StatLine) -> f64 {
    let bonus = bonuses(line);
    round2(
        line.rebounds + line.assists + 0.5 * line.points + line.steals + line.blocks
            - line.turnovers
            + f64::from(bonus.double_double)
            + f64::from(bonus.triple_double),
    )
}

/// Player points as a share of the team's score
pub fn percent_score(points: f64, team_score: f64) -> Result<f64> {
    if team_score == 0.0 {
        return Err(HoopsError::DivisionByZero {
            column: columns::TEAM_SCORE.to_string(),
        });
    }
    Ok(round2(points / team_score))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize::Value;

    fn line(pts: f64, trb: f64, ast: f64, stl: f64, blk: f64, tov: f64) -> StatLine {
        StatLine {
            points: pts,
            rebounds: trb,
            assists: ast,
            steals: stl,
            blocks: blk,
            turnovers: tov,
        }
    }

    #[test]
    fn test_points_and_rebounds_double_double() {
        let stats = line(20.0, 10.0, 5.0, 2.0, 1.0, 3.0);
        assert_eq!(bonuses(&stats).double_double, 1);
        assert_eq!(bonuses(&stats).triple_double, 0);
        assert_eq!(fantasy_score(&stats), 26.0);
    }

    #[test]
    fn test_double_double_scoring() {
        let stats = line(10.0, 5.0, 20.0, 2.0, 1.0, 3.0);
        assert_eq!(
            bonuses(&stats),
            Bonuses {
                double_double: 1,
                triple_double: 0
            }
        );
        assert_eq!(fantasy_score(&stats), 31.0);
    }

    #[test]
    fn test_triple_double_bonus() {
        let stats = line(25.0, 12.0, 11.0, 1.0, 0.0, 4.0);
        let bonus = bonuses(&stats);
        assert_eq!(bonus.double_double, 1);
        assert_eq!(bonus.triple_double, 2);
        // 12 + 11 + 12.5 + 1 + 0 - 4 + 1 + 2
        assert_eq!(fantasy_score(&stats), 35.5);
    }

    #[test]
    fn test_no_bonus_below_ten() {
        let stats = line(9.0, 9.0, 9.0, 9.0, 9.0, 0.0);
        assert_eq!(bonuses(&stats), Bonuses::default());
    }

    #[test]
    fn test_percent_score() {
        assert_eq!(percent_score(20.0, 110.0).unwrap(), 0.18);
        assert_eq!(percent_score(15.0, 100.0).unwrap(), 0.15);
        assert!(matches!(
            percent_score(10.0, 0.0),
            Err(HoopsError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_stat_line_requires_numeric_columns() {
        let record = NormalizedRecord::new()
            .with("PTS", Value::Float(20.0))
            .with("TRB", Value::Float(5.0))
            .with("AST", Value::text("x"))
            .with("STL", Value::Float(1.0))
            .with("BLK", Value::Float(0.0))
            .with("TOV", Value::Float(2.0));
        match StatLine::from_record(&record) {
            Err(HoopsError::TypeCoercion { column, value }) => {
                assert_eq!(column, "AST");
                assert_eq!(value, "x");
            }
            other => panic!("expected TypeCoercion, got {:?}", other),
        }
    }
}
