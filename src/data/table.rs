//! HTML table location and row extraction
//!
//! A [`TableSpec`] names one table on a page. [`locate`] resolves it against a
//! parsed document and reads the column names from the last header row;
//! [`LocatedTable::rows`] then yields fixed-width rows of cell text.

use crate::{HoopsError, Result, SeasonType};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static HEADER_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead tr").expect("valid selector"));
static ANY_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static BODY_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody tr").expect("valid selector"));

/// Marker text of the separator row between starters and bench in box scores
const RESERVES_MARKER: &str = "Reserves";

/// One row of cell text, always exactly as wide as its table
pub type RawRow = Vec<String>;

/// How a table is picked out of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelector {
    /// `<table id="...">`
    Id(String),
    /// Every listed attribute must match
    Attributes(Vec<(String, String)>),
}

impl TableSelector {
    pub fn id(id: impl Into<String>) -> Self {
        TableSelector::Id(id.into())
    }

    pub fn attributes<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        TableSelector::Attributes(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Career summary tables on player pages (`PlayerPerGame`, `Advanced`, ...)
    pub fn summary(table_type: &str, season_type: SeasonType) -> Self {
        Self::attributes([
            ("data-soc-sum-table-type", table_type),
            ("data-soc-sum-phase-type", season_type.phase_attr()),
        ])
    }

    /// CSS form of the selector
    pub fn css(&self) -> String {
        match self {
            TableSelector::Id(id) => format!("table[id=\"{}\"]", escape_attr(id)),
            TableSelector::Attributes(pairs) => {
                let mut css = String::from("table");
                for (name, value) in pairs {
                    css.push_str(&format!("[{}=\"{}\"]", name, escape_attr(value)));
                }
                css
            }
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Where column names come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnLabels {
    /// Visible header text
    #[default]
    Text,
    /// The `data-stat` attribute of each header cell, falling back to its text
    DataStat,
}

/// Identifies a table and how its columns are named
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub selector: TableSelector,
    pub labels: ColumnLabels,
    /// Declared column names; read from the header row when absent
    pub columns: Option<Vec<String>>,
}

impl TableSpec {
    pub fn new(selector: TableSelector) -> Self {
        TableSpec {
            selector,
            labels: ColumnLabels::Text,
            columns: None,
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(TableSelector::id(id))
    }

    pub fn labelled_by_data_stat(mut self) -> Self {
        self.labels = ColumnLabels::DataStat;
        self
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// A table found in a document together with its column names
#[derive(Debug, Clone)]
pub struct LocatedTable<'a> {
    element: ElementRef<'a>,
    columns: Vec<String>,
}

impl<'a> LocatedTable<'a> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    /// Body rows of the table; every call scans the table again
    pub fn rows(&self) -> RowIter<'a> {
        extract_rows(self.element, self.num_cols())
    }

    /// Collect all rows into an owned table
    pub fn to_raw_table(&self) -> RawTable {
        RawTable {
            columns: self.columns.clone(),
            rows: self.rows().collect(),
        }
    }
}

/// Owned rows of a table plus their column names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Compile a table selector
pub fn compile(selector: &TableSelector) -> Result<Selector> {
    let css = selector.css();
    Selector::parse(&css)
        .map_err(|e| HoopsError::Parse(format!("Invalid selector {}: {:?}", css, e)))
}

/// Find the first table matching `spec` in document order
pub fn locate<'a>(document: &'a Html, spec: &TableSpec) -> Result<LocatedTable<'a>> {
    let selector = compile(&spec.selector)?;
    let element = document
        .select(&selector)
        .next()
        .ok_or_else(|| HoopsError::TableNotFound {
            selector: spec.selector.css(),
        })?;

    let columns = match &spec.columns {
        Some(columns) => columns.clone(),
        None => header_columns(element, spec.labels),
    };

    if columns.is_empty() {
        return Err(HoopsError::Parse(format!(
            "Table {} has no header cells",
            spec.selector.css()
        )));
    }

    log::debug!(
        "Located {} with {} columns",
        spec.selector.css(),
        columns.len()
    );

    Ok(LocatedTable { element, columns })
}

/// Like [`locate`], but a missing table is `None` rather than an error
pub fn locate_optional<'a>(document: &'a Html, spec: &TableSpec) -> Result<Option<LocatedTable<'a>>> {
    match locate(document, spec) {
        Ok(table) => Ok(Some(table)),
        Err(HoopsError::TableNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Column names from the last row of the header section.
///
/// Stacked headers put group labels in earlier rows, so only the last one
/// names individual columns. Tables without a `<thead>` use their first row.
fn header_columns(table: ElementRef<'_>, labels: ColumnLabels) -> Vec<String> {
    let header_row = table
        .select(&HEADER_ROWS)
        .last()
        .or_else(|| table.select(&ANY_ROW).next());

    let Some(row) = header_row else {
        return Vec::new();
    };

    child_cells(row)
        .filter(|cell| cell.value().name() == "th")
        .map(|cell| match labels {
            ColumnLabels::Text => cell_text(cell),
            ColumnLabels::DataStat => cell
                .value()
                .attr("data-stat")
                .map(|s| s.to_string())
                .unwrap_or_else(|| cell_text(cell)),
        })
        .collect()
}

/// Iterate the body rows of `table` as rows of exactly `num_cols` cells
pub fn extract_rows(table: ElementRef<'_>, num_cols: usize) -> RowIter<'_> {
    RowIter {
        rows: table.select(&BODY_ROWS),
        num_cols,
    }
}

/// Lazy row iterator over one table body
pub struct RowIter<'a> {
    rows: scraper::element_ref::Select<'a, 'static>,
    num_cols: usize,
}

impl Iterator for RowIter<'_> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        for tr in self.rows.by_ref() {
            if tr.value().classes().any(|c| c == "thead") {
                continue;
            }

            let row = row_cells(tr);
            if row.first().map(|c| c == RESERVES_MARKER).unwrap_or(false) {
                continue;
            }

            return Some(fit_width(row, self.num_cols));
        }
        None
    }
}

/// Pad with empty strings or truncate so the row has `num_cols` cells
pub fn fit_width(mut row: RawRow, num_cols: usize) -> RawRow {
    row.resize(num_cols, String::new());
    row
}

/// Cell text of one row; a cell spanning `n` columns yields its text followed
/// by `n - 1` empty cells.
fn row_cells(tr: ElementRef<'_>) -> RawRow {
    let mut cells = Vec::new();
    for cell in child_cells(tr) {
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
        cells.push(cell_text(cell));
        cells.extend(std::iter::repeat(String::new()).take(span - 1));
    }
    cells
}

fn child_cells<'a>(row: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "th" | "td"))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME_LOG: &str = r#"
        <html><body>
        <table id="player_game_log_reg">
          <thead>
            <tr class="over_header"><th colspan="3">Game</th><th colspan="2">Box</th></tr>
            <tr><th scope="col">Date</th><th scope="col">Team</th><th scope="col"></th>
                <th scope="col">Opp</th><th scope="col">PTS</th></tr>
          </thead>
          <tbody>
            <tr><th>2024-10-22</th><td>LAL</td><td></td><td>MIN</td><td>16</td></tr>
            <tr class="thead"><th>Date</th><td>Team</td><td></td><td>Opp</td><td>PTS</td></tr>
            <tr><th>2024-10-25</th><td>LAL</td><td>@</td><td>PHO</td><td>21</td><td>extra</td></tr>
            <tr><th>2024-10-26</th><td>LAL</td><td>@</td><td>SAC</td></tr>
            <tr><th>2024-10-28</th><td>LAL</td><td></td><td>SAC</td><td colspan="1">Inactive</td></tr>
            <tr><td></td><td></td><td></td><td></td><td></td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    fn game_log_table(document: &Html) -> LocatedTable<'_> {
        locate(document, &TableSpec::by_id("player_game_log_reg")).unwrap()
    }

    #[test]
    fn test_columns_come_from_last_header_row() {
        let document = Html::parse_document(GAME_LOG);
        let table = game_log_table(&document);
        assert_eq!(table.columns(), &["Date", "Team", "", "Opp", "PTS"]);
    }

    #[test]
    fn test_rows_are_fixed_width() {
        let document = Html::parse_document(GAME_LOG);
        let table = game_log_table(&document);
        let rows: Vec<_> = table.rows().collect();

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.len() == 5));
        // Truncated on the right
        assert_eq!(rows[1][4], "21");
        // Padded on the right
        assert_eq!(rows[2][4], "");
    }

    #[test]
    fn test_header_repeats_skipped_and_blank_rows_kept() {
        let document = Html::parse_document(GAME_LOG);
        let table = game_log_table(&document);
        let rows: Vec<_> = table.rows().collect();

        assert!(rows.iter().all(|r| r[0] != "Date"));
        assert!(rows.last().unwrap().iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_rows_rescan_the_table() {
        let document = Html::parse_document(GAME_LOG);
        let table = game_log_table(&document);
        let first: Vec<_> = table.rows().collect();
        let second: Vec<_> = table.rows().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_colspan_expands_to_blank_cells() {
        let html = r#"
            <table id="log">
              <thead><tr><th>Date</th><th>Opp</th><th>Result</th><th>MP</th><th>PTS</th></tr></thead>
              <tbody><tr><th>2025-01-03</th><td>GSW</td><td colspan="3">Did Not Play</td></tr></tbody>
            </table>
        "#;
        let document = Html::parse_document(html);
        let table = locate(&document, &TableSpec::by_id("log")).unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0], vec!["2025-01-03", "GSW", "Did Not Play", "", ""]);
    }

    #[test]
    fn test_attribute_selector_picks_first_match() {
        let html = r#"
            <table data-soc-sum-table-type="PlayerPerGame" data-soc-sum-phase-type="reg">
              <thead><tr><th>Season</th><th>PTS</th></tr></thead>
              <tbody><tr><th>2023-24</th><td>25.7</td></tr></tbody>
            </table>
            <table data-soc-sum-table-type="PlayerPerGame" data-soc-sum-phase-type="reg">
              <thead><tr><th>Season</th><th>PTS</th></tr></thead>
              <tbody><tr><th>1999-00</th><td>1.0</td></tr></tbody>
            </table>
            <table data-soc-sum-table-type="PlayerPerGame" data-soc-sum-phase-type="post">
              <thead><tr><th>Season</th><th>PTS</th></tr></thead>
              <tbody><tr><th>2023-24</th><td>27.8</td></tr></tbody>
            </table>
        "#;
        let document = Html::parse_document(html);

        let spec = TableSpec::new(TableSelector::summary("PlayerPerGame", SeasonType::Regular));
        let reg = locate(&document, &spec).unwrap().to_raw_table();
        assert_eq!(reg.rows, vec![vec!["2023-24", "25.7"]]);

        let spec = TableSpec::new(TableSelector::summary("PlayerPerGame", SeasonType::Playoff));
        let post = locate(&document, &spec).unwrap().to_raw_table();
        assert_eq!(post.rows, vec![vec!["2023-24", "27.8"]]);
    }

    #[test]
    fn test_missing_table_is_table_not_found() {
        let document = Html::parse_document(GAME_LOG);
        let result = locate(&document, &TableSpec::by_id("player_game_log_post"));
        assert!(matches!(result, Err(HoopsError::TableNotFound { .. })));

        let optional = locate_optional(&document, &TableSpec::by_id("player_game_log_post"));
        assert!(optional.unwrap().is_none());
    }

    #[test]
    fn test_data_stat_labels_and_reserves_row() {
        let html = r#"
            <table id="box-LAL-game-basic">
              <thead>
                <tr class="over_header"><th colspan="3">Basic Box Score Stats</th></tr>
                <tr><th data-stat="player">Starters</th><th data-stat="mp">MP</th><th data-stat="pts">PTS</th></tr>
              </thead>
              <tbody>
                <tr><th data-stat="player">LeBron James</th><td data-stat="mp">35:12</td><td data-stat="pts">28</td></tr>
                <tr class="thead"><th data-stat="player">Reserves</th><td>MP</td><td>PTS</td></tr>
                <tr><th data-stat="player">Reserves</th><td>MP</td><td>PTS</td></tr>
                <tr><th data-stat="player">Gabe Vincent</th><td data-stat="mp">18:40</td><td data-stat="pts">6</td></tr>
              </tbody>
            </table>
        "#;
        let document = Html::parse_document(html);
        let spec = TableSpec::by_id("box-LAL-game-basic").labelled_by_data_stat();
        let table = locate(&document, &spec).unwrap().to_raw_table();

        assert_eq!(table.columns, vec!["player", "mp", "pts"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][0], "Gabe Vincent");
    }

    #[test]
    fn test_declared_columns_override_header() {
        let document = Html::parse_document(GAME_LOG);
        let spec = TableSpec::by_id("player_game_log_reg").with_columns(["Date", "Team"]);
        let table = locate(&document, &spec).unwrap();
        assert_eq!(table.num_cols(), 2);
        assert!(table.rows().all(|r| r.len() == 2));
    }

    #[test]
    fn test_fit_width_pads_and_truncates() {
        let short = fit_width(vec!["a".to_string()], 3);
        assert_eq!(short, vec!["a", "", ""]);

        let long = fit_width(vec!["a".into(), "b".into(), "c".into()], 2);
        assert_eq!(long, vec!["a", "b"]);
    }

    #[test]
    fn test_selector_css() {
        assert_eq!(TableSelector::id("roster").css(), "table[id=\"roster\"]");
        assert_eq!(
            TableSelector::summary("Advanced", SeasonType::Playoff).css(),
            "table[data-soc-sum-table-type=\"Advanced\"][data-soc-sum-phase-type=\"post\"]"
        );
    }
}
