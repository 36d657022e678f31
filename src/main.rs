//! Basketball statistics CLI
//!
//! Scrapes game logs, rosters, standings and box scores and stores them in
//! SQLite.

use clap::{Parser, Subcommand};
use hoopstats::data::scrapers::bbref::SummaryKind;
use hoopstats::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "Basketball statistics scraping and fantasy scoring", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Use only cached pages (no network requests)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Player pages
    Player {
        #[command(subcommand)]
        action: PlayerCommands,
    },
    /// Team pages
    Team {
        #[command(subcommand)]
        action: TeamCommands,
    },
    /// Basic box score of one game
    BoxScore {
        /// Box score URL
        url: String,
        /// Team code (e.g. LAL)
        team: String,
        /// Opponent code
        opp: String,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Conference standings
    Standings {
        /// Season end year (2025 = 2024-25)
        season: u16,
        /// Store in the database
        #[arg(long)]
        store: bool,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum PlayerCommands {
    /// Season game log with fantasy scores
    GameLog {
        /// Player id (e.g. jamesle01)
        id: String,
        /// Season end year
        season: u16,
        /// Store in the database
        #[arg(long)]
        store: bool,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Career summary table
    Summary {
        id: String,
        /// per-game, totals, per-minute, advanced or shooting
        #[arg(default_value = "per-game")]
        kind: SummaryKind,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum TeamCommands {
    /// Season roster
    Roster {
        team: String,
        season: u16,
        #[arg(long)]
        store: bool,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Franchise history, or the active franchise list without a team
    History {
        team: Option<String>,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Player stats for one team season
    Stats {
        team: String,
        season: u16,
        /// Per-36-minute rather than per-game stats
        #[arg(long)]
        per_minute: bool,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Show database status
    Status,
    /// List seasons on record
    Seasons {
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let offline = cli.offline;
    let result = match cli.command {
        Commands::Player { action } => match action {
            PlayerCommands::GameLog {
                id,
                season,
                store,
                format,
            } => commands::player_game_log(&config, offline, &id, season, store, format),
            PlayerCommands::Summary { id, kind, format } => {
                commands::player_summary(&config, offline, &id, kind, format)
            }
        },
        Commands::Team { action } => match action {
            TeamCommands::Roster {
                team,
                season,
                store,
                format,
            } => commands::team_roster(&config, offline, &team, season, store, format),
            TeamCommands::History { team, format } => {
                commands::team_history(&config, offline, team.as_deref(), format)
            }
            TeamCommands::Stats {
                team,
                season,
                per_minute,
                format,
            } => commands::team_stats(&config, offline, &team, season, per_minute, format),
        },
        Commands::BoxScore {
            url,
            team,
            opp,
            format,
        } => commands::box_score(&config, offline, &url, &team, &opp, format),
        Commands::Standings {
            season,
            store,
            format,
        } => commands::standings(&config, offline, season, store, format),
        Commands::Data { action } => match action {
            DataCommands::Status => commands::data_status(&config),
            DataCommands::Seasons { format } => commands::seasons(&config, offline, format),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hoopstats::data::normalize::{NormalizedRecord, Value};
    use hoopstats::data::scrapers::bbref::{BasketballReference, TeamTable};
    use hoopstats::data::scrapers::HttpFetcher;
    use hoopstats::data::Database;
    use hoopstats::HoopsError;

    fn client(config: &Config, offline: bool) -> Result<BasketballReference<HttpFetcher>> {
        BasketballReference::from_config(config, offline)
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hoops player game-log jamesle01 2025' to fetch a game log");
        println!("  3. Run 'hoops standings 2025 --store' to save standings");

        Ok(())
    }

    pub fn player_game_log(
        config: &Config,
        offline: bool,
        id: &str,
        season: u16,
        store: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let reference = client(config, offline)?;
        let log = reference.player_game_log(id, season)?;

        let records: Vec<NormalizedRecord> = log
            .games
            .iter()
            .map(|game| game.to_record().with("player_id", Value::text(id)))
            .collect();

        print_records(&records, format)?;

        if !log.excluded.is_empty() {
            eprintln!("{} rows excluded:", log.excluded.len());
            for row in &log.excluded {
                eprintln!("  row {}: {}", row.index, row.error);
            }
        }

        if matches!(format, OutputFormat::Table) {
            let total: f64 = log.games.iter().map(|g| g.fantasy_score).sum();
            let name = log.player.as_deref().unwrap_or(id);
            println!(
                "\n{} {}: {} games played, {} missed, {:.2} fantasy points ({:.2} per game)",
                name,
                season,
                log.games.len(),
                log.missed.len(),
                total,
                total / log.games.len().max(1) as f64
            );
        }

        if store && !records.is_empty() {
            let db = Database::open(&config.data.database_path)?;
            let keys = ["player_id", "Date"];
            let count = db.store("game_log", &records, &keys)?;
            println!("Stored {} games in database", count);
        }

        Ok(())
    }

    pub fn player_summary(
        config: &Config,
        offline: bool,
        id: &str,
        kind: SummaryKind,
        format: OutputFormat,
    ) -> Result<()> {
        let reference = client(config, offline)?;
        let records = reference.player_summary(id, kind)?;
        print_records(&records, format)
    }

    pub fn team_roster(
        config: &Config,
        offline: bool,
        team: &str,
        season: u16,
        store: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let reference = client(config, offline)?;
        let roster = reference.roster(team, season)?;
        let records: Vec<NormalizedRecord> = roster
            .iter()
            .map(|entry| entry.to_record().with("season", Value::Int(i64::from(season))))
            .collect();

        print_records(&records, format)?;

        if store && !records.is_empty() {
            let db = Database::open(&config.data.database_path)?;
            let keys = ["Player_NAME", "Player_TEAM", "season"];
            let count = db.store("roster", &records, &keys)?;
            println!("Stored {} players in database", count);
        }

        Ok(())
    }

    pub fn team_history(config: &Config, offline: bool, team: Option<&str>, format: OutputFormat) -> Result<()> {
        let reference = client(config, offline)?;
        let records = match team {
            Some(team) => reference.team_history(team)?,
            None => reference.franchises()?,
        };
        print_records(&records, format)
    }

    pub fn team_stats(
        config: &Config,
        offline: bool,
        team: &str,
        season: u16,
        per_minute: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let reference = client(config, offline)?;
        let table = if per_minute {
            TeamTable::PerMinute
        } else {
            TeamTable::PerGame
        };
        let records = reference.team_season(team, season, table)?;
        print_records(&records, format)
    }

    pub fn box_score(
        config: &Config,
        offline: bool,
        url: &str,
        team: &str,
        opp: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let reference = client(config, offline)?;
        let score = reference.box_score(url, team, opp)?;

        println!("{}", team);
        print_records(&score.team, format)?;
        println!("\n{}", opp);
        print_records(&score.opponent, format)
    }

    pub fn standings(config: &Config, offline: bool, season: u16, store: bool, format: OutputFormat) -> Result<()> {
        let reference = client(config, offline)?;
        let records: Vec<NormalizedRecord> = reference
            .standings(season)?
            .into_iter()
            .map(|r| r.with("season", Value::Int(i64::from(season))))
            .collect();

        print_records(&records, format)?;

        if store && !records.is_empty() {
            let db = Database::open(&config.data.database_path)?;
            let keys = ["team_name", "season"];
            let count = db.store("conference_data", &records, &keys)?;
            println!("Stored {} teams in database", count);
        }

        Ok(())
    }

    pub fn seasons(config: &Config, offline: bool, format: OutputFormat) -> Result<()> {
        let reference = client(config, offline)?;
        print_records(&reference.seasons()?, format)
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Tables:   {}", stats.tables.len());
        for (name, rows) in &stats.tables {
            println!("    {:<20} {:>6} rows", name, rows);
        }
        println!("  Total:    {} rows", stats.total_rows());

        Ok(())
    }

    /// Column names across all records, in first-seen order
    fn header(records: &[NormalizedRecord]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for column in record.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }

    fn cell(record: &NormalizedRecord, column: &str) -> String {
        record.get(column).map(|v| v.to_string()).unwrap_or_default()
    }

    fn print_records(records: &[NormalizedRecord], format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(records)
                    .map_err(|e| HoopsError::Parse(format!("Failed to serialize output: {}", e)))?;
                println!("{}", json);
            }
            OutputFormat::Csv => {
                let columns = header(records);
                println!("{}", columns.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(","));
                for record in records {
                    let row: Vec<String> = columns.iter().map(|c| csv_field(&cell(record, c))).collect();
                    println!("{}", row.join(","));
                }
            }
            OutputFormat::Table => {
                if records.is_empty() {
                    println!("(no rows)");
                    return Ok(());
                }
                let columns = header(records);
                let widths: Vec<usize> = columns
                    .iter()
                    .map(|c| {
                        records
                            .iter()
                            .map(|r| cell(r, c).chars().count())
                            .max()
                            .unwrap_or(0)
                            .max(c.chars().count())
                    })
                    .collect();

                let line = |values: Vec<String>| {
                    values
                        .iter()
                        .zip(&widths)
                        .map(|(v, w)| format!("{:<width$}", v, width = *w))
                        .collect::<Vec<_>>()
                        .join("  ")
                };
                println!("{}", line(columns.clone()));
                println!("{}", "─".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
                for record in records {
                    println!("{}", line(columns.iter().map(|c| cell(record, c)).collect()));
                }
            }
        }
        Ok(())
    }

    fn csv_field(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}
