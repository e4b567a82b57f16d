// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Withholding deposit ledger (예수금출납장). Payroll deductions booked here
//! feed the payroll line of the budget execution report.

use crate::commands::cashbook::{LedgerLine, SaveOutcome, read_lines};
use crate::commands::reports::{DEPOSIT_DISPLAY_ROWS, pad_rows};
use crate::models::{BookType, EntryType};
use crate::utils::{
    amount_text, check_period, fmt_amount, get_decimal, id_for_category, maybe_print_json,
    parse_amount_lenient, pretty_table,
};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositLine {
    pub id: i64,
    pub date: NaiveDate,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub note: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositStatement {
    pub year: i32,
    pub month: u32,
    pub lines: Vec<DepositLine>,
    pub total: Decimal,
}

/// Replaces the month's deposit lines. Items name deposit expense categories.
pub fn save_period(
    conn: &mut Connection,
    year: i32,
    month: u32,
    lines: &[LedgerLine],
) -> Result<SaveOutcome> {
    check_period(year, month)?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM deposit_ledger WHERE year=?1 AND month=?2",
        params![year, month],
    )?;
    let mut out = SaveOutcome::default();
    for (i, line) in lines.iter().enumerate() {
        if line.day.is_empty() && line.item.is_empty() {
            continue;
        }
        if line.entry_type == Some(EntryType::Income) {
            out.skipped += 1;
            continue;
        }
        let (Some(date), Some(amount)) = (line.date(year, month), parse_amount_lenient(&line.amount))
        else {
            tracing::warn!(row = i, day = %line.day, amount = %line.amount, "deposit line skipped");
            out.skipped += 1;
            continue;
        };
        let name = line.item.strip_prefix("category:").unwrap_or(&line.item).trim();
        let Some(category_id) = id_for_category(&tx, BookType::Deposit, EntryType::Expense, name)?
        else {
            tracing::warn!(row = i, item = %line.item, "unknown deposit category, line skipped");
            out.skipped += 1;
            continue;
        };
        tx.execute(
            "INSERT INTO deposit_ledger(year, month, date, category_id, description, amount,
                                        note, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                year,
                month,
                date,
                category_id,
                name,
                amount_text(&amount),
                line.note,
                out.saved as i64
            ],
        )?;
        out.saved += 1;
    }
    tx.commit()?;
    tracing::info!(year, month, saved = out.saved, skipped = out.skipped, "deposit ledger saved");
    Ok(out)
}

pub fn statement(conn: &Connection, year: i32, month: u32) -> Result<DepositStatement> {
    check_period(year, month)?;
    let mut stmt = conn.prepare(
        "SELECT d.id, d.date, c.name, d.description, d.amount, d.note, d.sort_order
         FROM deposit_ledger d JOIN cashbook_categories c ON c.id=d.category_id
         WHERE d.year=?1 AND d.month=?2
         ORDER BY d.sort_order, d.id",
    )?;
    let lines = stmt
        .query_map(params![year, month], |r| {
            Ok(DepositLine {
                id: r.get(0)?,
                date: r.get(1)?,
                category: r.get(2)?,
                description: r.get(3)?,
                amount: get_decimal(r, 4)?,
                note: r.get(5)?,
                order: r.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total = lines.iter().map(|l| l.amount).sum();
    Ok(DepositStatement {
        year,
        month,
        lines,
        total,
    })
}

pub fn show(conn: &Connection, year: i32, month: u32, sub: &clap::ArgMatches) -> Result<()> {
    let st = statement(conn, year, month)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &st)? {
        return Ok(());
    }
    let rows: Vec<Vec<String>> = st
        .lines
        .iter()
        .map(|l| {
            vec![
                l.date.day().to_string(),
                l.category.clone(),
                fmt_amount(&l.amount),
                l.note.clone(),
            ]
        })
        .collect();
    let min_rows = if sub.get_flag("compact") { 0 } else { DEPOSIT_DISPLAY_ROWS };
    println!("{} {}-{:02}", BookType::Deposit.label(), year, month);
    println!(
        "{}",
        pretty_table(&["Day", "Category", "Amount", "Note"], pad_rows(rows, min_rows, 4))
    );
    println!("Total {}", fmt_amount(&st.total));
    Ok(())
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("save", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let month = *sub.get_one::<u32>("month").unwrap();
            let path = sub.get_one::<String>("path").unwrap().trim();
            let lines = read_lines(Path::new(path))?;
            let out = save_period(conn, year, month, &lines)?;
            println!(
                "{} {}-{:02} saved ({} lines, {} skipped)",
                BookType::Deposit.label(),
                year,
                month,
                out.saved,
                out.skipped
            );
        }
        Some(("show", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let month = *sub.get_one::<u32>("month").unwrap();
            show(conn, year, month, sub)?;
        }
        _ => {}
    }
    Ok(())
}
