// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Spreadsheet access for uploads: the first worksheet of a workbook (or a CSV
//! export of one) as rows of cells, plus header-row detection and tolerant
//! cell conversions.

use crate::error::LedgerError;
use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::path::Path;

pub type Row = Vec<Data>;

/// How many leading rows are searched for a header.
pub const HEADER_SCAN_ROWS: usize = 10;

/// Date layouts tried in order on text cells; the first match wins.
pub const DATE_FORMATS: &[&str] = &["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        return read_csv_rows(path);
    }
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Cannot open spreadsheet {}", path.display()))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Spreadsheet {} has no worksheets", path.display()))?;
    let range = workbook
        .worksheet_range(&first)
        .with_context(|| format!("Cannot read sheet '{}' in {}", first, path.display()))?;
    Ok(range.rows().map(|r| r.to_vec()).collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Row>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path.display()))?;
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("Read CSV {}", path.display()))?;
        rows.push(
            rec.iter()
                .map(|f| {
                    let f = f.trim_start_matches('\u{feff}');
                    if f.is_empty() {
                        Data::Empty
                    } else {
                        Data::String(f.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

pub fn cell_str(cell: Option<&Data>) -> Option<String> {
    let c = cell?;
    match c {
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::Empty => None,
        _ => Some(c.to_string()),
    }
}

/// Trimmed text of a cell; empty when the cell is missing or blank.
pub fn cell_text(row: &[Data], idx: usize) -> String {
    cell_str(row.get(idx)).unwrap_or_default().trim().to_string()
}

/// Locates the header row among the first [`HEADER_SCAN_ROWS`] rows: a row
/// whose first cell equals `sentinel` wins, otherwise the first row mentioning
/// any keyword. Falls back to row 0.
pub fn find_header_row(rows: &[Row], sentinel: Option<&str>, keywords: &[&str]) -> usize {
    let scan = rows.len().min(HEADER_SCAN_ROWS);
    if let Some(sentinel) = sentinel {
        for (i, row) in rows.iter().take(scan).enumerate() {
            if cell_text(row, 0) == sentinel {
                tracing::debug!(row = i, "header found by sentinel");
                return i;
            }
        }
    }
    for (i, row) in rows.iter().take(scan).enumerate() {
        let joined = row
            .iter()
            .filter_map(|c| cell_str(Some(c)))
            .collect::<Vec<_>>()
            .join(" ");
        if keywords.iter().any(|kw| joined.contains(kw)) {
            tracing::debug!(row = i, "header found by keyword");
            return i;
        }
    }
    0
}

/// Header names of one row, in column order.
#[derive(Debug, Clone)]
pub struct Columns {
    names: Vec<String>,
}

impl Columns {
    pub fn from_row(row: &[Data]) -> Self {
        Columns {
            names: row
                .iter()
                .map(|c| cell_str(Some(c)).unwrap_or_default().trim().to_string())
                .collect(),
        }
    }

    /// Index of the first candidate present in the header.
    pub fn find(&self, candidates: &[&str]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|cand| self.names.iter().position(|n| n == cand))
    }

    pub fn require(&self, candidates: &[&str]) -> Result<usize> {
        self.find(candidates)
            .ok_or_else(|| self.missing().into())
    }

    pub fn missing(&self) -> LedgerError {
        LedgerError::MissingColumns {
            found: self.names.iter().filter(|n| !n.is_empty()).cloned().collect(),
        }
    }
}

/// Date from a date/datetime cell, an Excel serial number, or text in one of
/// [`DATE_FORMATS`]. A trailing time component on text is ignored.
pub fn cell_date(cell: Option<&Data>) -> Option<NaiveDate> {
    match cell? {
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::Float(f) if *f > 59.0 && *f < 2_958_466.0 && f.fract() == 0.0 => {
            // 8-digit yyyymmdd values also arrive as floats
            let as_text = format!("{}", *f as i64);
            parse_date_text(&as_text).or_else(|| excel_serial_to_date(*f))
        }
        Data::Int(i) => parse_date_text(&i.to_string()),
        Data::Empty => None,
        other => parse_date_text(&cell_str(Some(other))?),
    }
}

pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(d);
        }
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Excel serial date conversion using the 1899-12-30 epoch.
fn excel_serial_to_date(v: f64) -> Option<NaiveDate> {
    if !v.is_finite() || v < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    Some(base + Duration::days(v.floor() as i64))
}

/// Numeric value of an amount cell; commas are dropped, blanks and garbage
/// read as zero.
pub fn cell_amount(cell: Option<&Data>) -> Decimal {
    match cell {
        Some(Data::Float(f)) => Decimal::try_from(*f).unwrap_or(Decimal::ZERO),
        Some(Data::Int(i)) => Decimal::from(*i),
        Some(other) => {
            let s = cell_str(Some(other)).unwrap_or_default().replace(',', "");
            s.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO)
        }
        None => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn sentinel_beats_keywords() {
        let rows = vec![
            vec![s("카드 이용내역"), Data::Empty],
            vec![s("조회기간"), s("이용일 기준")],
            vec![s("NO"), s("이용일")],
        ];
        assert_eq!(find_header_row(&rows, Some("NO"), &["이용일"]), 2);
        assert_eq!(find_header_row(&rows, None, &["이용일"]), 1);
        assert_eq!(find_header_row(&rows, None, &["없음"]), 0);
    }

    #[test]
    fn dates_try_formats_in_order() {
        assert_eq!(parse_date_text("2025.03.15"), NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(parse_date_text("2025/03/15 13:01"), NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(parse_date_text("20250315"), NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(parse_date_text("합계"), None);
        assert_eq!(
            cell_date(Some(&Data::Float(45731.0))),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        assert_eq!(
            cell_date(Some(&Data::Float(20250315.0))),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
    }

    #[test]
    fn amounts_are_tolerant() {
        assert_eq!(cell_amount(Some(&s("12,500"))), Decimal::from(12_500));
        assert_eq!(cell_amount(Some(&Data::Float(3300.0))), Decimal::from(3300));
        assert_eq!(cell_amount(Some(&s("n/a"))), Decimal::ZERO);
        assert_eq!(cell_amount(None), Decimal::ZERO);
    }

    #[test]
    fn missing_columns_lists_found_headers() {
        let cols = Columns::from_row(&[s("가맹점명"), Data::Empty, s("카드번호")]);
        assert_eq!(cols.find(&["카드 번호", "카드번호"]), Some(2));
        let err = cols.require(&["이용일"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Required columns not found. Sheet columns: [가맹점명, 카드번호]"
        );
    }
}
