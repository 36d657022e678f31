//! basketball-reference.com pages
//!
//! Each operation builds a page URL, fetches it through a [`Fetcher`] and
//! hands the relevant tables to the locator and normalizer. Nothing here
//! touches the network directly, so every page can be served from fixtures.

use super::{fetch_with_fallback, Fetcher, HttpFetcher, RetryPolicy};
use crate::data::normalize::{
    concat_season_types, tag_season_type, ExcludedRow, NormalizeRules, NormalizedRecord, Value,
};
use crate::data::table::{locate, locate_optional, TableSelector, TableSpec};
use crate::features::game_log::{derive_game_log, DeriveContext, GameLogRecord};
use crate::{league, Config, HoopsError, Result, SeasonType};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static PLAYER_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#meta h1").expect("valid selector"));
static GAME_LOG_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{4}-\d{2}\s+(Playoffs\s+)?Game Log$").expect("valid regex"));

/// Career summary tables on a player page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    PerGame,
    Totals,
    PerMinute,
    Advanced,
    Shooting,
}

impl SummaryKind {
    /// Value of `data-soc-sum-table-type`
    pub fn table_type(&self) -> &'static str {
        match self {
            SummaryKind::PerGame => "PlayerPerGame",
            SummaryKind::Totals => "PlayerTotals",
            SummaryKind::PerMinute => "PlayerPerMinute",
            SummaryKind::Advanced => "Advanced",
            SummaryKind::Shooting => "Shooting",
        }
    }
}

impl FromStr for SummaryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-game" | "pergame" => Ok(SummaryKind::PerGame),
            "totals" => Ok(SummaryKind::Totals),
            "per-minute" | "perminute" | "per-36" => Ok(SummaryKind::PerMinute),
            "advanced" => Ok(SummaryKind::Advanced),
            "shooting" => Ok(SummaryKind::Shooting),
            _ => Err(format!(
                "Unknown summary kind: {}. Use per-game, totals, per-minute, advanced or shooting",
                s
            )),
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_type())
    }
}

/// Tables on a team season page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamTable {
    Roster,
    PerGame,
    PerMinute,
}

impl TeamTable {
    pub fn table_id(&self) -> &'static str {
        match self {
            TeamTable::Roster => "roster",
            TeamTable::PerGame => "per_game_stats",
            TeamTable::PerMinute => "per_minute_stats",
        }
    }
}

/// One player on a team roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub name: String,
    pub position: String,
    pub team: String,
}

impl RosterEntry {
    pub fn to_record(&self) -> NormalizedRecord {
        NormalizedRecord::new()
            .with("Player_NAME", Value::text(&self.name))
            .with("Player_POSITION", Value::text(&self.position))
            .with("Player_TEAM", Value::text(&self.team))
    }
}

/// A player's season: derived games plus the rows that did not make it
#[derive(Debug)]
pub struct PlayerSeason {
    pub player: Option<String>,
    pub season: u16,
    pub games: Vec<GameLogRecord>,
    /// Games the player did not take part in
    pub missed: Vec<NormalizedRecord>,
    /// Rows dropped for a malformed result
    pub excluded: Vec<ExcludedRow>,
}

/// Basic box score of both teams in one game
#[derive(Debug, Clone, PartialEq)]
pub struct BoxScore {
    pub team: Vec<NormalizedRecord>,
    pub opponent: Vec<NormalizedRecord>,
}

pub struct BasketballReference<F: Fetcher = HttpFetcher> {
    fetcher: F,
    base_url: String,
    retry: RetryPolicy,
}

impl BasketballReference<HttpFetcher> {
    /// Live client with the configured HTTP settings and cache. Offline
    /// mode serves cached pages only and needs a cache directory.
    pub fn from_config(config: &Config, offline: bool) -> Result<Self> {
        let mut fetcher = HttpFetcher::new(&config.scrape)?.offline_only(offline);
        match &config.data.cache_dir {
            Some(dir) => fetcher = fetcher.with_cache(dir),
            None if offline => {
                return Err(HoopsError::Config(
                    "Offline mode needs data.cache_dir in the config".to_string(),
                ))
            }
            None => {}
        }
        Ok(BasketballReference::new(fetcher, &config.scrape.base_url)
            .with_retry(config.scrape.retry_policy()))
    }
}

impl<F: Fetcher> BasketballReference<F> {
    pub fn new(fetcher: F, base_url: &str) -> Self {
        BasketballReference {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn page(&self, path: &str) -> Result<Html> {
        fetch_with_fallback(&self.fetcher, &self.url(path), None, &self.retry)
    }

    /// Every table on one page comes back as a record list
    fn summary_table(document: &Html, spec: &TableSpec) -> Result<Vec<NormalizedRecord>> {
        let table = locate(document, spec)?;
        Ok(NormalizeRules::summary().normalize(table.to_raw_table())?.played)
    }

    /// Game log of one season, regular season and playoffs, with derived
    /// fantasy features
    pub fn player_game_log(&self, player_id: &str, season: u16) -> Result<PlayerSeason> {
        let path = format!("{}/gamelog/{}/", player_path(player_id)?, season);
        let document = self.page(&path)?;
        let rules = NormalizeRules::game_log();

        let regular = locate(&document, &game_log_spec(SeasonType::Regular))?;
        let regular = rules.normalize(regular.to_raw_table())?;

        let playoff = match locate_optional(&document, &game_log_spec(SeasonType::Playoff))? {
            Some(table) => Some(rules.normalize(table.to_raw_table())?),
            None => None,
        };

        let combined = concat_season_types(regular, playoff);
        let player = player_name(&document);
        log::info!(
            "{} {}: {} played, {} missed, {} excluded",
            player.as_deref().unwrap_or(player_id),
            season,
            combined.played.len(),
            combined.missed.len(),
            combined.excluded.len()
        );

        let context = DeriveContext {
            season,
            base_url: self.base_url.clone(),
            player: player.clone(),
        };
        let games = derive_game_log(&combined.played, &context)?;

        Ok(PlayerSeason {
            player,
            season,
            games,
            missed: combined.missed,
            excluded: combined.excluded,
        })
    }

    /// Career summary rows; playoff rows follow regular season rows when the
    /// player has any
    pub fn player_summary(&self, player_id: &str, kind: SummaryKind) -> Result<Vec<NormalizedRecord>> {
        let path = format!("{}.html", player_path(player_id)?);
        let document = self.page(&path)?;

        let regular_spec = TableSpec::new(TableSelector::summary(kind.table_type(), SeasonType::Regular));
        let mut records = tag_season_type(
            Self::summary_table(&document, &regular_spec)?,
            SeasonType::Regular,
        );

        let playoff_spec = TableSpec::new(TableSelector::summary(kind.table_type(), SeasonType::Playoff));
        if let Some(table) = locate_optional(&document, &playoff_spec)? {
            let playoffs = NormalizeRules::summary().normalize(table.to_raw_table())?.played;
            records.extend(tag_season_type(playoffs, SeasonType::Playoff));
        }
        Ok(records)
    }

    /// Active franchises
    pub fn franchises(&self) -> Result<Vec<NormalizedRecord>> {
        let document = self.page("/teams/")?;
        Self::summary_table(&document, &TableSpec::by_id("teams_active"))
    }

    /// Season-by-season history of one franchise
    pub fn team_history(&self, team: &str) -> Result<Vec<NormalizedRecord>> {
        check_team(team)?;
        let document = self.page(&format!("/teams/{}/", team))?;
        Self::summary_table(&document, &TableSpec::by_id(team))
    }

    pub fn team_season(&self, team: &str, season: u16, table: TeamTable) -> Result<Vec<NormalizedRecord>> {
        check_team(team)?;
        let document = self.page(&format!("/teams/{}/{}.html", team, season))?;
        Self::summary_table(&document, &TableSpec::by_id(table.table_id()))
    }

    /// Name and position of everyone on a team's roster
    pub fn roster(&self, team: &str, season: u16) -> Result<Vec<RosterEntry>> {
        check_team(team)?;
        let document = self.page(&format!("/teams/{}/{}.html", team, season))?;
        let spec = TableSpec::by_id(TeamTable::Roster.table_id()).labelled_by_data_stat();
        let table = locate(&document, &spec)?;

        let player_col = table.columns().iter().position(|c| c == "player");
        let pos_col = table.columns().iter().position(|c| c == "pos");
        let (Some(player_col), Some(pos_col)) = (player_col, pos_col) else {
            return Err(HoopsError::Parse(format!(
                "Roster table for {} {} lacks player/pos columns",
                team, season
            )));
        };

        Ok(table
            .rows()
            .filter(|row| !row[player_col].is_empty())
            .map(|row| RosterEntry {
                name: row[player_col].clone(),
                position: row[pos_col].clone(),
                team: team.to_string(),
            })
            .collect())
    }

    /// League summary per season
    pub fn seasons(&self) -> Result<Vec<NormalizedRecord>> {
        let document = self.page("/leagues/")?;
        Self::summary_table(&document, &TableSpec::by_id("stats"))
    }

    /// Conference standings, east then west
    pub fn standings(&self, season: u16) -> Result<Vec<NormalizedRecord>> {
        let document = self.page(&format!("/leagues/NBA_{}_standings.html", season))?;

        let mut records = Vec::new();
        for (conference, id) in [("East", "confs_standings_E"), ("West", "confs_standings_W")] {
            let table = locate(&document, &TableSpec::by_id(id))?;
            let first_column = table.columns()[0].clone();
            for mut record in NormalizeRules::summary().normalize(table.to_raw_table())?.played {
                record.rename(&first_column, "team_name");
                let name = record
                    .get_str("team_name")
                    .map(clean_team_name)
                    .unwrap_or_default();
                record.set("team_name", Value::Text(name));
                record.set("Conference", Value::text(conference));
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Basic box score of one game. A failed fetch is retried at the same
    /// URL with the team code swapped for the opponent's, since only the
    /// home team's code forms a valid box score address.
    pub fn box_score(&self, url: &str, team: &str, opponent: &str) -> Result<BoxScore> {
        check_team(team)?;
        check_team(opponent)?;

        let alternate = url.replace(team, opponent);
        let alternate = (alternate != url).then_some(alternate);
        let document = fetch_with_fallback(&self.fetcher, url, alternate.as_deref(), &self.retry)?;

        Ok(BoxScore {
            team: Self::summary_table(&document, &box_score_spec(team))?,
            opponent: Self::summary_table(&document, &box_score_spec(opponent))?,
        })
    }

    /// Box score for a derived game log row
    pub fn box_score_for(&self, game: &GameLogRecord) -> Result<BoxScore> {
        self.box_score(&game.url, &game.team, &game.opponent)
    }
}

fn game_log_spec(season_type: SeasonType) -> TableSpec {
    TableSpec::by_id(format!("player_game_log_{}", season_type.game_log_suffix()))
}

fn box_score_spec(team: &str) -> TableSpec {
    TableSpec::by_id(format!("box-{}-game-basic", team)).labelled_by_data_stat()
}

/// `/players/j/jamesle01`
fn player_path(player_id: &str) -> Result<String> {
    let first = player_id
        .chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())
        .ok_or_else(|| HoopsError::Parse(format!("Invalid player id: {:?}", player_id)))?;
    Ok(format!("/players/{}/{}", first.to_ascii_lowercase(), player_id))
}

fn check_team(team: &str) -> Result<()> {
    if league::is_known_code(team) {
        Ok(())
    } else {
        Err(HoopsError::UnknownTeam(team.to_string()))
    }
}

/// Player name from the page heading, without the season/game log suffix
fn player_name(document: &Html) -> Option<String> {
    let heading = document.select(&PLAYER_NAME).next()?;
    let text = heading
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let name = GAME_LOG_TITLE.replace(&text, "").trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Standings names carry a playoff seed marker and the seed itself
fn clean_team_name(name: &str) -> String {
    let name = name.trim_end_matches('*').trim();
    match name.rfind(" (") {
        Some(idx) if name.ends_with(')') => name[..idx].trim_end_matches('*').to_string(),
        _ => name.to_string(),
    }
}
