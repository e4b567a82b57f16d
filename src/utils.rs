// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::LedgerError;
use crate::models::{Account, BookType, EntryType};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s.trim()))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    let cleaned = s.trim().replace(',', "");
    cleaned
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s.trim()))
}

/// Amount typed into a ledger row: thousands separators are ignored and an
/// empty field means zero. `None` when the text is not a number at all.
pub fn parse_amount_lenient(s: &str) -> Option<Decimal> {
    let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Some(Decimal::ZERO);
    }
    cleaned.parse::<Decimal>().ok()
}

/// Canonical TEXT form of a stored amount, so equal values compare equal in SQL.
pub fn amount_text(d: &Decimal) -> String {
    d.normalize().to_string()
}

pub fn check_period(year: i32, month: u32) -> Result<()> {
    if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(LedgerError::InvalidPeriod { year, month }.into());
    }
    Ok(())
}

/// (Jan 1 of the year, first day of the month, first day of the next month).
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate, NaiveDate)> {
    check_period(year, month)?;
    let invalid = || LedgerError::InvalidPeriod { year, month };
    let year_start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
    let month_start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((year_start, month_start, next_start))
}

pub fn prev_period(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

/// Whole-won amounts with thousands separators; fractional digits are kept.
pub fn fmt_amount(d: &Decimal) -> String {
    let s = d.normalize().to_string();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn fmt_rate(d: &Decimal) -> String {
    format!("{:.1}%", d.round_dp(1))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(|v| {
            let numeric = !v.is_empty()
                && v.chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '%'));
            if numeric {
                Cell::new(v).set_alignment(CellAlignment::Right)
            } else {
                Cell::new(v)
            }
        }));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Reads a decimal stored as text.
pub fn get_decimal(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.trim().parse::<Decimal>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub fn find_account(conn: &Connection, fiscal_year: i32, code: &str) -> Result<Option<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE fiscal_year=?1 AND code=?2",
        Account::COLUMNS
    );
    let acct = conn
        .query_row(&sql, params![fiscal_year, code.trim()], Account::from_row)
        .optional()?;
    Ok(acct)
}

pub fn account_for_code(conn: &Connection, fiscal_year: i32, code: &str) -> Result<Account> {
    find_account(conn, fiscal_year, code)?
        .with_context(|| format!("Account '{}' not found in fiscal year {}", code.trim(), fiscal_year))
}

pub fn id_for_category(
    conn: &Connection,
    book: BookType,
    entry: EntryType,
    name: &str,
) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM cashbook_categories WHERE book_type=?1 AND entry_type=?2 AND name=?3",
            params![book, entry, name.trim()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn id_for_member(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM members WHERE name=?1")?;
    let id: i64 = stmt
        .query_row(params![name.trim()], |r| r.get(0))
        .with_context(|| format!("Member '{}' not found", name.trim()))?;
    Ok(id)
}

// Settings
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Name stamped on confirmations: the `operator` setting, then the login name.
pub fn operator_name(conn: &Connection) -> Result<String> {
    if let Some(op) = get_setting(conn, "operator")?.filter(|s| !s.trim().is_empty()) {
        return Ok(op);
    }
    Ok(std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_amounts() {
        assert_eq!(parse_amount_lenient("1,200,000"), Some(Decimal::from(1_200_000)));
        assert_eq!(parse_amount_lenient("  "), Some(Decimal::ZERO));
        assert_eq!(parse_amount_lenient("12a"), None);
    }

    #[test]
    fn bounds_roll_over_december() {
        let (ys, ms, ns) = month_bounds(2025, 12).unwrap();
        assert_eq!(ys.to_string(), "2025-01-01");
        assert_eq!(ms.to_string(), "2025-12-01");
        assert_eq!(ns.to_string(), "2026-01-01");
        assert!(month_bounds(2025, 13).is_err());
        assert_eq!(prev_period(2025, 1), (2024, 12));
        assert_eq!(prev_period(2025, 7), (2025, 6));
    }

    #[test]
    fn amount_grouping() {
        assert_eq!(fmt_amount(&Decimal::from(1_000_000)), "1,000,000");
        assert_eq!(fmt_amount(&Decimal::from(-950)), "-950");
        assert_eq!(fmt_amount(&"12345.50".parse().unwrap()), "12,345.5");
        assert_eq!(fmt_rate(&Decimal::from(20)), "20.0%");
    }
}
