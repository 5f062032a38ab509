//! Reading drug rows from a CSV file for `medkit drugs import`
//!
//! Columns: name, form, expiration date, optional description. The first
//! line is a header. `;` or `,` separated, matching what spreadsheet exports
//! and `drugs export --format csv` produce.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use medkit_client::models::{DrugForm, DrugRequest};

/// Accepted spellings of the expiration date.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Line number in the file, header included
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ParsedRows {
    pub rows: Vec<DrugRequest>,
    pub errors: Vec<RowError>,
}

/// Parse the whole file. Malformed rows are reported, not fatal.
pub fn read_rows(text: &str) -> Result<ParsedRows> {
    let text = text.trim_start_matches('\u{feff}');
    let header = text.lines().next().unwrap_or_default();
    let delimiter = if header.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut parsed = ParsedRows::default();
    for record in reader.records() {
        let record = record.context("malformed CSV")?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        if record.iter().all(str::is_empty) {
            continue;
        }
        match parse_row(&record) {
            Ok(row) => parsed.rows.push(row),
            Err(message) => parsed.errors.push(RowError { line, message }),
        }
    }
    Ok(parsed)
}

fn parse_row(record: &csv::StringRecord) -> std::result::Result<DrugRequest, String> {
    if record.len() < 3 {
        return Err("expected name, form and expiration date".into());
    }
    let name = &record[0];
    if name.is_empty() {
        return Err("name is required".into());
    }
    let form = DrugForm::from_str(&record[1])?;
    let date = parse_date(&record[2])
        .ok_or_else(|| format!("invalid expiration date {:?}", &record[2]))?;
    let description = record
        .get(3)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(DrugRequest {
        name: name.to_string(),
        form,
        expiration_year: date.year(),
        expiration_month: date.month(),
        description,
    })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}
