//! Record normalization
//!
//! Turns string-valued [`RawTable`] rows into typed [`NormalizedRecord`]s.
//! Every coercion is column-scoped so a fault names the column it came from.

use crate::data::table::RawTable;
use crate::{HoopsError, Result, SeasonType};
use chrono::NaiveDate;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Well-known column names on game log pages
pub mod columns {
    pub const DATE: &str = "Date";
    pub const TEAM: &str = "Team";
    pub const OPP: &str = "Opp";
    pub const RESULT: &str = "Result";
    pub const GS: &str = "GS";
    pub const MP: &str = "MP";
    pub const PTS: &str = "PTS";
    pub const TRB: &str = "TRB";
    pub const AST: &str = "AST";
    pub const STL: &str = "STL";
    pub const BLK: &str = "BLK";
    pub const TOV: &str = "TOV";
    pub const TEAM_SCORE: &str = "Team Score";
    pub const OPP_SCORE: &str = "Opp Score";
}

/// Game log columns cast to floating point
pub const GAME_LOG_NUMERIC: &[&str] = &[
    "FG", "FGA", "FG%", "3P", "3PA", "3P%", "2P", "2PA", "2P%", "eFG%", "FT", "FTA", "FT%", "ORB",
    "DRB", "TRB", "AST", "STL", "BLK", "TOV", "PF", "PTS", "GmSc", "+/-", "Team Score",
    "Opp Score",
];

static RESULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([WL])\s*(\d+)-(\d+)").expect("valid regex"));
static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d+)$").expect("valid regex"));

/// A typed cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Empty text; typed values are never blank
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Text(s) if s.trim().is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Column name to value mapping that keeps column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    fields: Vec<(String, Value)>,
}

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair column names with one row of cell text
    pub fn from_row(columns: &[String], row: &[String]) -> Self {
        NormalizedRecord {
            fields: columns
                .iter()
                .zip(row.iter())
                .map(|(c, v)| (c.clone(), Value::Text(v.clone())))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    /// Replace the value of `column`, appending it if missing
    pub fn set(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn with(mut self, column: &str, value: Value) -> Self {
        self.set(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(c, _)| c == column)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some((c, _)) = self.fields.iter_mut().find(|(c, _)| c == from) {
            *c = to.to_string();
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn is_all_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_blank())
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Parsed `"W 110-102"` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    /// 1 for a win, 0 for a loss
    pub outcome: u8,
    pub team_score: u32,
    pub opp_score: u32,
}

/// Parse a result string of the form `W 110-102` / `L 98-101`
pub fn parse_result(value: &str) -> Result<GameResult> {
    let malformed = || HoopsError::MalformedResult {
        value: value.to_string(),
    };
    let caps = RESULT_PATTERN.captures(value).ok_or_else(malformed)?;

    let outcome = if &caps[1] == "W" { 1 } else { 0 };
    let team_score = caps[2].parse().map_err(|_| malformed())?;
    let opp_score = caps[3].parse().map_err(|_| malformed())?;

    Ok(GameResult {
        outcome,
        team_score,
        opp_score,
    })
}

/// Convert `MM:SS` to whole seconds
pub fn parse_duration(value: &str) -> Result<i64> {
    let malformed = || HoopsError::MalformedDuration {
        value: value.to_string(),
    };
    let caps = DURATION_PATTERN.captures(value.trim()).ok_or_else(malformed)?;
    let minutes: i64 = caps[1].parse().map_err(|_| malformed())?;
    let seconds: i64 = caps[2].parse().map_err(|_| malformed())?;
    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .ok_or_else(malformed)
}

/// Parse the date formats used on game log and schedule pages
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    ["%Y-%m-%d", "%Y%m%d", "%a, %b %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Replace empty values in every `%` column with 0.
///
/// An empty percentage means no attempts were made, not that data is missing.
pub fn fill_empty_percentages(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    records
        .into_iter()
        .map(|record| NormalizedRecord {
            fields: record
                .fields
                .into_iter()
                .map(|(column, value)| {
                    if column.contains('%') && value.is_blank() {
                        (column, Value::Int(0))
                    } else {
                        (column, value)
                    }
                })
                .collect(),
        })
        .collect()
}

/// Set the season type column on every record
pub fn tag_season_type(records: Vec<NormalizedRecord>, season_type: SeasonType) -> Vec<NormalizedRecord> {
    records
        .into_iter()
        .map(|r| r.with(SeasonType::COLUMN, Value::text(season_type.label())))
        .collect()
}

/// How blank rows are recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlankRows {
    /// Drop rows whose every cell is empty
    AllColumns,
    /// The first row blank across these columns starts the trailing totals
    /// block; it and everything after it are dropped
    Identity(Vec<String>),
}

/// Column marking whether the player took part in a game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartIndicator {
    pub column: String,
    pub marker: String,
}

/// Column-scoped rules for one kind of table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeRules {
    pub blank_rows: BlankRows,
    pub start: Option<StartIndicator>,
    pub result_column: Option<String>,
    pub duration_column: Option<String>,
    pub date_column: Option<String>,
    pub numeric_columns: Vec<String>,
}

/// A record paired with its source row position
type IndexedRecord = (usize, NormalizedRecord);

/// A row left out of the played set and why
#[derive(Debug)]
pub struct ExcludedRow {
    /// Position of the row in the source table, header excluded
    pub index: usize,
    pub record: NormalizedRecord,
    pub error: HoopsError,
}

/// Output of normalization
#[derive(Debug, Default)]
pub struct NormalizedTable {
    pub played: Vec<NormalizedRecord>,
    pub missed: Vec<NormalizedRecord>,
    pub excluded: Vec<ExcludedRow>,
}

impl NormalizedTable {
    /// Append the rows of another table after this one's
    pub fn extend(&mut self, other: NormalizedTable) {
        self.played.extend(other.played);
        self.missed.extend(other.missed);
        self.excluded.extend(other.excluded);
    }

    pub fn tagged(self, season_type: SeasonType) -> Self {
        NormalizedTable {
            played: tag_season_type(self.played, season_type),
            missed: tag_season_type(self.missed, season_type),
            excluded: self.excluded,
        }
    }
}

/// Tag regular and playoff tables and concatenate them, regular rows first
pub fn concat_season_types(regular: NormalizedTable, playoff: Option<NormalizedTable>) -> NormalizedTable {
    let mut combined = regular.tagged(SeasonType::Regular);
    if let Some(playoff) = playoff {
        combined.extend(playoff.tagged(SeasonType::Playoff));
    }
    combined
}

impl NormalizeRules {
    /// Rules for a player's per-game log
    pub fn game_log() -> Self {
        NormalizeRules {
            blank_rows: BlankRows::Identity(vec![
                columns::DATE.to_string(),
                columns::TEAM.to_string(),
                columns::OPP.to_string(),
            ]),
            start: Some(StartIndicator {
                column: columns::GS.to_string(),
                marker: "*".to_string(),
            }),
            result_column: Some(columns::RESULT.to_string()),
            duration_column: Some(columns::MP.to_string()),
            date_column: Some(columns::DATE.to_string()),
            numeric_columns: GAME_LOG_NUMERIC.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Rules for summary tables (career averages, rosters, standings)
    pub fn summary() -> Self {
        NormalizeRules {
            blank_rows: BlankRows::AllColumns,
            start: None,
            result_column: None,
            duration_column: None,
            date_column: None,
            numeric_columns: Vec::new(),
        }
    }

    /// Normalize a freshly extracted table
    pub fn normalize(&self, table: RawTable) -> Result<NormalizedTable> {
        let records = table
            .rows
            .iter()
            .map(|row| NormalizedRecord::from_row(&table.columns, row))
            .collect();
        self.normalize_records(records)
    }

    /// Normalize records; running this on its own `played` output is a no-op
    pub fn normalize_records(&self, records: Vec<NormalizedRecord>) -> Result<NormalizedTable> {
        let rows: Vec<IndexedRecord> =
            drop_unlabeled_columns(records).into_iter().enumerate().collect();
        let rows = self.drop_blank_rows(rows);
        let (played, missed) = self.partition(rows);
        let (indices, played): (Vec<usize>, Vec<NormalizedRecord>) = played.into_iter().unzip();
        let played = fill_empty_percentages(played);

        let mut out = NormalizedTable {
            missed: missed.into_iter().map(|(_, r)| r).collect(),
            ..Default::default()
        };

        for (index, record) in indices.into_iter().zip(played) {
            let record = match self.split_result(record) {
                Ok(record) => record,
                Err((record, error)) => {
                    log::warn!("Excluding row {}: {}", index, error);
                    out.excluded.push(ExcludedRow {
                        index,
                        record,
                        error,
                    });
                    continue;
                }
            };
            let record = self.convert_duration(record)?;
            let record = self.coerce_types(record)?;
            out.played.push(record);
        }

        log::debug!(
            "Normalized {} played, {} missed, {} excluded",
            out.played.len(),
            out.missed.len(),
            out.excluded.len()
        );
        Ok(out)
    }

    fn drop_blank_rows(&self, records: Vec<IndexedRecord>) -> Vec<IndexedRecord> {
        match &self.blank_rows {
            BlankRows::AllColumns => records.into_iter().filter(|(_, r)| !r.is_all_blank()).collect(),
            BlankRows::Identity(identity) => {
                let present: Vec<&String> = identity
                    .iter()
                    .filter(|c| records.iter().any(|(_, r)| r.contains(c)))
                    .collect();
                if present.is_empty() {
                    return records.into_iter().filter(|(_, r)| !r.is_all_blank()).collect();
                }

                let split = records
                    .iter()
                    .position(|(_, r)| {
                        present
                            .iter()
                            .all(|c| r.get(c).map(Value::is_blank).unwrap_or(true))
                    })
                    .unwrap_or(records.len());
                if split < records.len() {
                    log::debug!("Dropping {} trailing rows", records.len() - split);
                }

                let mut records = records;
                records.truncate(split);
                records
            }
        }
    }

    fn partition(&self, records: Vec<IndexedRecord>) -> (Vec<IndexedRecord>, Vec<IndexedRecord>) {
        let Some(start) = &self.start else {
            return (records, Vec::new());
        };
        records.into_iter().partition(|(_, r)| match r.get(&start.column) {
            Some(value) => value.as_str() == Some(start.marker.as_str()),
            None => true,
        })
    }

    fn split_result(
        &self,
        mut record: NormalizedRecord,
    ) -> std::result::Result<NormalizedRecord, (NormalizedRecord, HoopsError)> {
        let Some(column) = &self.result_column else {
            return Ok(record);
        };
        let text = match record.get(column) {
            Some(Value::Text(s)) => s.clone(),
            _ => return Ok(record),
        };

        match parse_result(&text) {
            Ok(result) => {
                record.set(column, Value::Int(result.outcome as i64));
                record.set(columns::TEAM_SCORE, Value::Int(result.team_score as i64));
                record.set(columns::OPP_SCORE, Value::Int(result.opp_score as i64));
                Ok(record)
            }
            Err(e) => Err((record, e)),
        }
    }

    fn convert_duration(&self, mut record: NormalizedRecord) -> Result<NormalizedRecord> {
        let Some(column) = &self.duration_column else {
            return Ok(record);
        };
        if let Some(Value::Text(s)) = record.get(column) {
            let seconds = parse_duration(s)?;
            record.set(column, Value::Int(seconds));
        }
        Ok(record)
    }

    fn coerce_types(&self, mut record: NormalizedRecord) -> Result<NormalizedRecord> {
        if let Some(column) = &self.date_column {
            if let Some(Value::Text(s)) = record.get(column) {
                let date = parse_date(s).ok_or_else(|| HoopsError::TypeCoercion {
                    column: column.clone(),
                    value: s.clone(),
                })?;
                record.set(column, Value::Date(date));
            }
        }

        for column in &self.numeric_columns {
            let value = match record.get(column) {
                Some(Value::Float(_)) | None => continue,
                Some(Value::Int(i)) => *i as f64,
                Some(Value::Text(s)) => s.trim().parse::<f64>().map_err(|_| HoopsError::TypeCoercion {
                    column: column.clone(),
                    value: s.clone(),
                })?,
                Some(other) => {
                    return Err(HoopsError::TypeCoercion {
                        column: column.clone(),
                        value: other.to_string(),
                    })
                }
            };
            record.set(column, Value::Float(value));
        }

        Ok(record)
    }
}

/// Remove columns whose header was empty
fn drop_unlabeled_columns(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    records
        .into_iter()
        .map(|r| NormalizedRecord {
            fields: r.fields.into_iter().filter(|(c, _)| !c.is_empty()).collect(),
        })
        .collect()
}
