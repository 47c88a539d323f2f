use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value as JsonValue};

use super::model::{Field, ObservationTable, Period, RawObservation};

/// Accepted names for the entity column, in order of preference.
const ENTITY_COLUMNS: [&str; 4] = ["entity", "district", "city", "country"];
const REGION_COLUMN: &str = "region";
const PERIOD_COLUMNS: [&str; 2] = ["period", "date"];
const YEAR_COLUMN: &str = "year";
const MONTH_COLUMN: &str = "month";
const UNKNOWN_REGION: &str = "Unknown";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an observation table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header row; one observation per line
/// * `.json` – `[{ "district": "Zomba", "date": "2021-03", "w_supplied": 21000, ... }, ...]`
pub fn load_file(path: &Path) -> Result<ObservationTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!(
        "loaded {} observations for {} entities from {}",
        table.len(),
        table.entities().len(),
        path.display()
    );
    Ok(table)
}

/// Like [`load_file`], but a file that does not exist is `Ok(None)` so the
/// caller can fall back to synthetic data.
pub fn load_optional(path: &Path) -> Result<Option<ObservationTable>> {
    if !path.exists() {
        log::warn!("data file {} not found", path.display());
        return Ok(None);
    }
    load_file(path).map(Some)
}

/// Write a table as CSV in the layout [`load_file`] reads back.
pub fn write_csv(path: &Path, table: &ObservationTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec![REGION_COLUMN, ENTITY_COLUMNS[0], PERIOD_COLUMNS[0]];
    header.extend(Field::ALL.iter().map(|f| f.column_name()));
    writer.write_record(&header).context("writing CSV header")?;

    for row in table.rows() {
        let mut record = vec![row.region.clone(), row.entity.clone(), row.period.to_string()];
        record.extend(
            Field::ALL
                .iter()
                .map(|f| row.get(*f).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Record abstraction shared by the CSV and JSON loaders
// ---------------------------------------------------------------------------

/// A single cell as read from the source file.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Empty,
}

impl Cell<'_> {
    fn text(self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Number(n) if n.fract() == 0.0 => Some(format!("{n:.0}")),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Empty => None,
        }
    }
}

fn text_cell(s: &str) -> Cell<'_> {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s)
    }
}

trait Record {
    fn cell(&self, column: &str) -> Cell<'_>;
    fn columns(&self) -> Vec<&str>;
}

impl<T: Record + ?Sized> Record for &T {
    fn cell(&self, column: &str) -> Cell<'_> {
        (**self).cell(column)
    }

    fn columns(&self) -> Vec<&str> {
        (**self).columns()
    }
}

struct CsvRecord<'a> {
    headers: &'a [String],
    record: &'a csv::StringRecord,
}

impl Record for CsvRecord<'_> {
    fn cell(&self, column: &str) -> Cell<'_> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.record.get(i))
            .map_or(Cell::Empty, text_cell)
    }

    fn columns(&self) -> Vec<&str> {
        self.headers.iter().map(String::as_str).collect()
    }
}

impl Record for Map<String, JsonValue> {
    fn cell(&self, column: &str) -> Cell<'_> {
        match self.get(column) {
            Some(JsonValue::String(s)) => text_cell(s),
            Some(JsonValue::Number(n)) => n.as_f64().map_or(Cell::Empty, Cell::Number),
            Some(JsonValue::Bool(b)) => Cell::Text(if *b { "true" } else { "false" }),
            _ => Cell::Empty,
        }
    }

    fn columns(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

/// Forgiving number parsing: trims and strips thousands separators.
/// `NaN` and infinities are rejected.
fn parse_number(s: &str) -> Option<f64> {
    s.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// A whole number that fits a year.
fn whole_year(n: f64) -> Option<i32> {
    (n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX)).then_some(n as i32)
}

fn parse_period(record: &impl Record, row: usize) -> Result<Period> {
    for column in PERIOD_COLUMNS {
        match record.cell(column) {
            Cell::Empty => continue,
            Cell::Number(n) => {
                return whole_year(n)
                    .map(Period::from_year)
                    .with_context(|| format!("Row {row}: '{n}' in '{column}' is not a year"));
            }
            Cell::Text(s) => {
                return s
                    .parse::<Period>()
                    .with_context(|| format!("Row {row}: bad '{column}' value"));
            }
        }
    }

    let year = record
        .cell(YEAR_COLUMN)
        .text()
        .with_context(|| format!("Row {row}: missing period, date or year column"))?;
    let year: i32 = year
        .parse()
        .with_context(|| format!("Row {row}: '{year}' is not a year"))?;
    match record.cell(MONTH_COLUMN).text() {
        None => Ok(Period::from_year(year)),
        Some(month) => month
            .parse::<u32>()
            .ok()
            .and_then(|m| Period::from_ym_opt(year, m))
            .with_context(|| format!("Row {row}: '{month}' is not a month")),
    }
}

fn build_row(record: &impl Record, row: usize) -> Result<RawObservation> {
    let entity = ENTITY_COLUMNS
        .iter()
        .find_map(|column| record.cell(column).text())
        .with_context(|| format!("Row {row}: missing entity column (one of {ENTITY_COLUMNS:?})"))?;
    let region = record
        .cell(REGION_COLUMN)
        .text()
        .unwrap_or_else(|| UNKNOWN_REGION.to_string());
    let period = parse_period(record, row)?;

    let mut observation = RawObservation::new(region, entity, period);
    for column in record.columns() {
        let Ok(field) = column.parse::<Field>() else {
            continue;
        };
        let value = match record.cell(column) {
            Cell::Empty => continue,
            Cell::Number(n) if n.is_finite() => n,
            Cell::Number(n) => bail!("Row {row}, {column}: '{n}' is not a finite number"),
            Cell::Text(s) => parse_number(s)
                .with_context(|| format!("Row {row}, {column}: '{s}' is not a number"))?,
        };
        observation = observation.with(field, value);
    }
    Ok(observation)
}

fn is_known_column(column: &str) -> bool {
    ENTITY_COLUMNS.contains(&column)
        || PERIOD_COLUMNS.contains(&column)
        || [REGION_COLUMN, YEAR_COLUMN, MONTH_COLUMN].contains(&column)
        || column.parse::<Field>().is_ok()
}

/// Collect rows, rejecting a second row for the same (entity, period).
fn collect_rows<R, I>(records: I) -> Result<ObservationTable>
where
    R: Record,
    I: IntoIterator<Item = Result<R>>,
{
    let mut seen: HashSet<(String, Period)> = HashSet::new();
    let mut ignored: BTreeSet<String> = BTreeSet::new();
    let mut rows = Vec::new();

    for (row_no, record) in records.into_iter().enumerate() {
        let record = record?;
        ignored.extend(
            record
                .columns()
                .into_iter()
                .filter(|c| !is_known_column(c))
                .map(str::to_string),
        );
        let observation = build_row(&record, row_no)?;
        if !seen.insert((observation.entity.clone(), observation.period)) {
            bail!(
                "Row {row_no}: duplicate observation for {} at {}",
                observation.entity,
                observation.period
            );
        }
        rows.push(observation);
    }

    if !ignored.is_empty() {
        log::debug!("ignoring columns {ignored:?}");
    }
    Ok(ObservationTable::from_rows(rows))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<ObservationTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let records = reader
        .records()
        .enumerate()
        .map(|(row_no, result)| result.with_context(|| format!("CSV row {row_no}")))
        .collect::<Result<Vec<csv::StringRecord>>>()?;

    collect_rows(records.iter().map(|record| {
        Ok(CsvRecord {
            headers: &headers,
            record,
        })
    }))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`).
fn load_json(path: &Path) -> Result<ObservationTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    collect_rows(records.iter().enumerate().map(|(i, rec)| {
        rec.as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_strips_separators() {
        assert_eq!(parse_number(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        for text in ["NaN", "nan", "inf", "-inf", "Infinity"] {
            assert_eq!(parse_number(text), None, "{text}");
        }
    }

    #[test]
    fn test_whole_year() {
        assert_eq!(whole_year(2021.0), Some(2021));
        assert_eq!(whole_year(2021.7), None);
        assert_eq!(whole_year(1e12), None);
        assert_eq!(whole_year(f64::NAN), None);
    }

    #[test]
    fn test_cell_text_formats_whole_numbers() {
        assert_eq!(Cell::Number(2021.0).text(), Some("2021".to_string()));
        assert_eq!(Cell::Text(" Zomba ").text(), Some("Zomba".to_string()));
        assert_eq!(Cell::Empty.text(), None);
    }

    #[test]
    fn test_known_columns() {
        assert!(is_known_column("district"));
        assert!(is_known_column("w_supplied"));
        assert!(!is_known_column("notes"));
    }
}
