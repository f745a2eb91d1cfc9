//! HTML table scraper
//!
//! Downloads a web page, picks one `<table>` by its position among all tables
//! in the document, and converts it into an array of records keyed by the
//! header row. Selection is positional: if the page layout shifts, a
//! different table is extracted without any error.

use async_trait::async_trait;
use firmo_common::Dataset;
use reqwest::{header::USER_AGENT, Client};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use super::{ensure_success, Extractor};
use crate::error::{PipelineError, Result};

/// Upper bound on `colspan` so a malformed attribute cannot blow up a row.
const MAX_COLSPAN: usize = 1000;

pub struct WebTableExtractor {
    client: Client,
    url: String,
    user_agent: String,
    table_index: usize,
    dataset: Dataset,
}

impl WebTableExtractor {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        user_agent: impl Into<String>,
        table_index: usize,
        dataset: Dataset,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            user_agent: user_agent.into(),
            table_index,
            dataset,
        }
    }
}

#[async_trait]
impl Extractor for WebTableExtractor {
    fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[instrument(skip(self), fields(url = %self.url, table_index = self.table_index))]
    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;
        ensure_success(&self.url, &response)?;

        let html = response.text().await?;
        debug!(bytes = html.len(), "Fetched page");

        let records = parse_table(&html, self.table_index)?;
        info!(records = records.len(), "Extracted table records");

        Ok(serde_json::to_vec(&records)?)
    }
}

#[derive(Debug)]
struct Cell {
    text: String,
    header: bool,
    colspan: usize,
}

impl Cell {
    fn from_element(element: ElementRef<'_>) -> Self {
        let raw: String = element.text().collect();
        let colspan = element
            .value()
            .attr("colspan")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_COLSPAN);

        Self {
            text: raw.split_whitespace().collect::<Vec<_>>().join(" "),
            header: element.value().name() == "th",
            colspan,
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PipelineError::Parse(format!("bad selector '{}': {}", css, e)))
}

/// Convert the `index`-th table of `html` into an ordered list of records.
///
/// The header is the first of the leading rows made only of `<th>` cells (or
/// the first row when the table does not open with one). Every later row
/// holding at least one `<td>` becomes a record; short rows are padded with
/// `null`, extra cells dropped. Values are typed per column.
pub fn parse_table(html: &str, index: usize) -> Result<Vec<Map<String, Value>>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;

    let tables: Vec<ElementRef<'_>> = document.select(&table_selector).collect();
    let table = tables.get(index).ok_or_else(|| {
        PipelineError::Parse(format!(
            "page has {} tables, no table at index {}",
            tables.len(),
            index
        ))
    })?;

    let rows: Vec<Vec<Cell>> = table
        .select(&row_selector)
        .map(|row| expand_colspans(row.select(&cell_selector).map(Cell::from_element)))
        .filter(|cells| !cells.is_empty())
        .collect();

    let header_row = rows
        .first()
        .ok_or_else(|| PipelineError::Parse(format!("table {} has no rows", index)))?;
    let leading_headers = rows
        .iter()
        .take_while(|cells| cells.iter().all(|c| c.header))
        .count()
        .max(1);
    let columns = column_names(header_row);

    let body: Vec<&Vec<Cell>> = rows[leading_headers..]
        .iter()
        .filter(|cells| cells.iter().any(|c| !c.header))
        .collect();

    let kinds: Vec<ColumnKind> = (0..columns.len())
        .map(|i| {
            ColumnKind::infer(
                body.iter()
                    .filter_map(|cells| cells.get(i))
                    .map(|c| c.text.as_str()),
            )
        })
        .collect();

    let records = body
        .iter()
        .map(|cells| {
            columns
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(i, (column, kind))| {
                    let value = cells.get(i).map(|c| kind.value(&c.text)).unwrap_or(Value::Null);
                    (column.clone(), value)
                })
                .collect::<Map<String, Value>>()
        })
        .collect();

    Ok(records)
}

fn expand_colspans(cells: impl Iterator<Item = Cell>) -> Vec<Cell> {
    let mut expanded = Vec::new();
    for cell in cells {
        for _ in 1..cell.colspan {
            expanded.push(Cell {
                text: cell.text.clone(),
                header: cell.header,
                colspan: 1,
            });
        }
        expanded.push(cell);
    }
    expanded
}

/// Header labels, with blanks named `Unnamed: <i>` and repeats suffixed `.1`, `.2`, ...
fn column_names(header: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = if cell.text.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                cell.text.clone()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Value type shared by every cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// A column is numeric only when every non-empty cell parses as a number.
    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut integer = true;
        let mut float = true;

        for text in cells.filter(|t| !t.is_empty()) {
            integer &= text.parse::<i64>().is_ok();
            float &= text.parse::<f64>().map(f64::is_finite).unwrap_or(false);
        }

        if integer {
            ColumnKind::Integer
        } else if float {
            ColumnKind::Float
        } else {
            ColumnKind::Text
        }
    }

    fn value(self, text: &str) -> Value {
        if text.is_empty() {
            return Value::Null;
        }
        let number = match self {
            ColumnKind::Integer => text.parse::<i64>().ok().map(Number::from),
            ColumnKind::Float => text.parse::<f64>().ok().and_then(Number::from_f64),
            ColumnKind::Text => None,
        };
        number
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"
        <html><body>
          <table><tr><td>navbox</td></tr></table>
          <table class="wikitable">
            <thead><tr><th>Symbol</th><th>Security</th><th>CIK</th><th>Weight</th></tr></thead>
            <tbody>
              <tr><td>MMM</td><td>3M</td><td>0000066740</td><td>0.25</td></tr>
              <tr><td>AOS</td><td> A. O.
                  Smith </td><td>0000091142</td><td></td></tr>
              <tr><td>ABT</td></tr>
            </tbody>
          </table>
        </body></html>
    "#;

    #[test]
    fn test_selects_table_by_position() {
        let records = parse_table(PAGE, 1).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            vec!["Symbol", "Security", "CIK", "Weight"]
        );
        assert_eq!(first["Symbol"], json!("MMM"));
        assert_eq!(first["CIK"], json!(66740));
        assert_eq!(first["Weight"], json!(0.25));
    }

    #[test]
    fn test_whitespace_and_empty_cells() {
        let records = parse_table(PAGE, 1).unwrap();
        assert_eq!(records[1]["Security"], json!("A. O. Smith"));
        assert_eq!(records[1]["Weight"], Value::Null);
        // short row is padded
        assert_eq!(records[2]["Security"], Value::Null);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = parse_table(PAGE, 5).unwrap_err();
        assert!(err.to_string().contains("no table at index 5"));
    }

    #[test]
    fn test_first_row_is_header_without_th() {
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>1</td><td>x</td></tr></table>";
        let records = parse_table(html, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["a"], json!(1));
        assert_eq!(records[0]["b"], json!("x"));
    }

    #[test]
    fn test_colspan_and_duplicate_headers() {
        let html = r#"<table>
            <tr><th>Name</th><th>Name</th><th></th></tr>
            <tr><td colspan="2">wide</td><td>z</td></tr>
        </table>"#;
        let records = parse_table(html, 0).unwrap();
        assert_eq!(
            records[0].keys().collect::<Vec<_>>(),
            vec!["Name", "Name.1", "Unnamed: 2"]
        );
        assert_eq!(records[0]["Name"], json!("wide"));
        assert_eq!(records[0]["Name.1"], json!("wide"));
        assert_eq!(records[0]["Unnamed: 2"], json!("z"));
    }

    #[test]
    fn test_column_kind_inference() {
        assert_eq!(ColumnKind::infer(["1902", "", "-12"].into_iter()), ColumnKind::Integer);
        assert_eq!(ColumnKind::infer(["0.25", "3"].into_iter()), ColumnKind::Float);
        assert_eq!(ColumnKind::infer(["1", "NaN"].into_iter()), ColumnKind::Text);
        assert_eq!(ColumnKind::Float.value("3"), json!(3.0));
        assert_eq!(ColumnKind::Text.value("1957-03-04"), json!("1957-03-04"));
        assert_eq!(ColumnKind::Text.value(""), Value::Null);
    }

    #[test]
    fn test_mixed_column_stays_text() {
        let html = r#"<table>
            <tr><th>Symbol</th><th>Founded</th><th>CIK</th></tr>
            <tr><td>MMM</td><td>1902</td><td>0000066740</td></tr>
            <tr><td>GOOGL</td><td>2013 (1888)</td><td>0001652044</td></tr>
        </table>"#;
        let records = parse_table(html, 0).unwrap();
        assert_eq!(records[0]["Founded"], json!("1902"));
        assert_eq!(records[1]["Founded"], json!("2013 (1888)"));
        assert_eq!(records[1]["CIK"], json!(1652044));
    }

    #[test]
    fn test_section_row_mid_table_is_not_header() {
        let html = r#"<table>
            <tr><td>a</td><td>b</td></tr>
            <tr><td>1</td><td>2</td></tr>
            <tr><th>Section</th><th>X</th></tr>
            <tr><td>3</td><td>4</td></tr>
        </table>"#;
        let records = parse_table(html, 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(records[0]["a"], json!(1));
        assert_eq!(records[1]["b"], json!(4));
    }

    #[test]
    fn test_stacked_header_rows_are_skipped() {
        let html = r#"<table>
            <tr><th>Date</th><th colspan="2">Added</th></tr>
            <tr><th>Date</th><th>Ticker</th><th>Security</th></tr>
            <tr><td>March 24, 2025</td><td>DASH</td><td>DoorDash</td></tr>
        </table>"#;
        let records = parse_table(html, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Added.1"], json!("DoorDash"));
    }
}
