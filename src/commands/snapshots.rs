// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Monthly confirmation: a report is frozen into a versioned JSON document and
//! stays authoritative for its (kind, year, month) until the row is deleted.

use crate::commands::reports::{
    self, BudgetExecution, CardStatement, CashbookStatement, render_budget_execution,
    render_card, render_cashbook,
};
use crate::error::LedgerError;
use crate::models::{BookType, SnapshotKind};
use crate::utils::{check_period, fmt_amount, maybe_print_json, operator_name, pretty_table};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub schema_version: u32,
    pub payload: SnapshotPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotPayload {
    Budget(BudgetExecution),
    Cashbook(CashbookStatement),
    Card(CardStatement),
}

impl SnapshotPayload {
    /// The headline amount used by listings: executed, next balance or total.
    pub fn headline(&self) -> Decimal {
        match self {
            SnapshotPayload::Budget(b) => b.grand_total.executed,
            SnapshotPayload::Cashbook(c) => c.next_balance,
            SnapshotPayload::Card(c) => c.total_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySnapshot {
    pub id: i64,
    pub kind: SnapshotKind,
    pub fiscal_year: i32,
    pub month: u32,
    pub document: SnapshotDocument,
    pub is_confirmed: bool,
    pub confirmed_at: DateTime<Utc>,
    pub confirmed_by: String,
}

const SNAPSHOT_COLUMNS: &str =
    "id, snapshot_type, fiscal_year, month, snapshot_data, is_confirmed, confirmed_at, confirmed_by";

type RawSnapshot = (i64, SnapshotKind, i32, u32, String, bool, DateTime<Utc>, String);

fn raw_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawSnapshot> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
    ))
}

fn decode(raw: RawSnapshot) -> Result<MonthlySnapshot> {
    let (id, kind, fiscal_year, month, data, is_confirmed, confirmed_at, confirmed_by) = raw;
    let document = serde_json::from_str(&data)
        .with_context(|| format!("Corrupt {} snapshot for {}-{:02}", kind, fiscal_year, month))?;
    Ok(MonthlySnapshot {
        id,
        kind,
        fiscal_year,
        month,
        document,
        is_confirmed,
        confirmed_at,
        confirmed_by,
    })
}

/// Computes the live report a snapshot of `kind` would freeze.
pub fn live_payload(
    conn: &Connection,
    kind: SnapshotKind,
    year: i32,
    month: u32,
) -> Result<SnapshotPayload> {
    Ok(match kind {
        SnapshotKind::Budget => SnapshotPayload::Budget(reports::budget_execution(conn, year, month)?),
        SnapshotKind::CashbookBank => SnapshotPayload::Cashbook(reports::cashbook_statement(
            conn,
            BookType::Bank,
            year,
            month,
        )?),
        SnapshotKind::CashbookCash => SnapshotPayload::Cashbook(reports::cashbook_statement(
            conn,
            BookType::Cash,
            year,
            month,
        )?),
        SnapshotKind::CardExpense => {
            SnapshotPayload::Card(reports::card_statement(conn, year, month, None)?)
        }
    })
}

pub fn load(
    conn: &Connection,
    kind: SnapshotKind,
    year: i32,
    month: u32,
) -> Result<Option<MonthlySnapshot>> {
    let sql = format!(
        "SELECT {} FROM monthly_snapshots WHERE snapshot_type=?1 AND fiscal_year=?2 AND month=?3",
        SNAPSHOT_COLUMNS
    );
    let row = conn
        .query_row(&sql, params![kind, year, month], raw_row)
        .optional()?;
    row.map(decode).transpose()
}

pub fn is_confirmed(conn: &Connection, kind: SnapshotKind, year: i32, month: u32) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM monthly_snapshots
         WHERE snapshot_type=?1 AND fiscal_year=?2 AND month=?3 AND is_confirmed=1",
        params![kind, year, month],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

/// Freezes the live reports of `kinds` for the period, replacing earlier
/// confirmations, all in one transaction.
pub fn confirm_all(
    conn: &mut Connection,
    kinds: &[SnapshotKind],
    year: i32,
    month: u32,
    confirmer: &str,
) -> Result<Vec<MonthlySnapshot>> {
    check_period(year, month)?;
    let tx = conn.transaction()?;
    let now = Utc::now();
    for kind in kinds {
        let document = SnapshotDocument {
            schema_version: SCHEMA_VERSION,
            payload: live_payload(&tx, *kind, year, month)?,
        };
        let data = serde_json::to_string(&document)?;
        tx.execute(
            "INSERT INTO monthly_snapshots(snapshot_type, fiscal_year, month, snapshot_data,
                                           is_confirmed, confirmed_at, confirmed_by)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
             ON CONFLICT(snapshot_type, fiscal_year, month) DO UPDATE SET
                snapshot_data=excluded.snapshot_data,
                is_confirmed=1,
                confirmed_at=excluded.confirmed_at,
                confirmed_by=excluded.confirmed_by",
            params![kind, year, month, data, now, confirmer],
        )?;
        tracing::info!(kind = %kind, year, month, by = confirmer, "snapshot confirmed");
    }
    tx.commit()?;

    let mut out = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if let Some(s) = load(conn, *kind, year, month)? {
            out.push(s);
        }
    }
    Ok(out)
}

pub fn confirm(
    conn: &mut Connection,
    kind: SnapshotKind,
    year: i32,
    month: u32,
    confirmer: &str,
) -> Result<MonthlySnapshot> {
    confirm_all(conn, &[kind], year, month, confirmer)?
        .pop()
        .with_context(|| format!("{} snapshot for {}-{:02} was not stored", kind, year, month))
}

/// Removes a confirmation. Returns whether one existed.
pub fn cancel(conn: &Connection, kind: SnapshotKind, year: i32, month: u32) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM monthly_snapshots WHERE snapshot_type=?1 AND fiscal_year=?2 AND month=?3",
        params![kind, year, month],
    )?;
    if n > 0 {
        tracing::info!(kind = %kind, year, month, "snapshot canceled");
    }
    Ok(n > 0)
}

/// Confirmed snapshots, newest period first.
pub fn list(conn: &Connection, year: Option<i32>) -> Result<Vec<MonthlySnapshot>> {
    let sql = format!(
        "SELECT {} FROM monthly_snapshots
         WHERE is_confirmed=1 AND (?1 IS NULL OR fiscal_year=?1)
         ORDER BY fiscal_year DESC, month DESC, snapshot_type",
        SNAPSHOT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![year], raw_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(decode).collect()
}

/// Kinds named on the command line. `cashbook` covers both bank and cash books.
pub fn parse_kinds(s: &str) -> Result<Vec<SnapshotKind>> {
    Ok(match s.trim().to_lowercase().as_str() {
        "budget" => vec![SnapshotKind::Budget],
        "cashbook" => vec![SnapshotKind::CashbookBank, SnapshotKind::CashbookCash],
        "bank" => vec![SnapshotKind::CashbookBank],
        "cash" => vec![SnapshotKind::CashbookCash],
        "card" => vec![SnapshotKind::CardExpense],
        other => vec![other.parse::<SnapshotKind>()?],
    })
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("confirm", sub)) => {
            let kinds = parse_kinds(sub.get_one::<String>("kind").unwrap())?;
            let (year, month) = period(sub);
            let by = match sub.get_one::<String>("by") {
                Some(b) => b.trim().to_string(),
                None => operator_name(conn)?,
            };
            for s in confirm_all(conn, &kinds, year, month, &by)? {
                println!(
                    "Confirmed {} {}-{:02} ({})",
                    s.kind.label(),
                    year,
                    month,
                    fmt_amount(&s.document.payload.headline())
                );
            }
        }
        Some(("cancel", sub)) => {
            let kinds = parse_kinds(sub.get_one::<String>("kind").unwrap())?;
            let (year, month) = period(sub);
            for kind in kinds {
                if cancel(conn, kind, year, month)? {
                    println!("Canceled {} {}-{:02}", kind.label(), year, month);
                } else {
                    println!("{} {}-{:02} was not confirmed", kind.label(), year, month);
                }
            }
        }
        Some(("show", sub)) => show(conn, sub)?,
        Some(("list", sub)) => {
            let year = sub.get_one::<i32>("year").copied();
            let snaps = list(conn, year)?;
            let data: Vec<Vec<String>> = snaps
                .iter()
                .map(|s| {
                    vec![
                        format!("{}-{:02}", s.fiscal_year, s.month),
                        s.kind.to_string(),
                        fmt_amount(&s.document.payload.headline()),
                        s.confirmed_at.format("%Y-%m-%d %H:%M").to_string(),
                        s.confirmed_by.clone(),
                    ]
                })
                .collect();
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &snaps)? {
                println!(
                    "{}",
                    pretty_table(&["Period", "Kind", "Amount", "Confirmed", "By"], data)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn period(sub: &clap::ArgMatches) -> (i32, u32) {
    (
        *sub.get_one::<i32>("year").unwrap(),
        *sub.get_one::<u32>("month").unwrap(),
    )
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let kinds = parse_kinds(sub.get_one::<String>("kind").unwrap())?;
    let (year, month) = period(sub);
    for kind in kinds {
        let snap = load(conn, kind, year, month)?.ok_or(LedgerError::NotConfirmed {
            kind: kind.label(),
            year,
            month,
        })?;
        if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &snap)? {
            continue;
        }
        println!(
            "{} {}-{:02} confirmed {} by {}",
            kind.label(),
            year,
            month,
            snap.confirmed_at.format("%Y-%m-%d %H:%M"),
            snap.confirmed_by
        );
        match &snap.document.payload {
            SnapshotPayload::Budget(b) => println!("{}", render_budget_execution(b)),
            SnapshotPayload::Cashbook(c) => print!("{}", render_cashbook(c, 0, 0)),
            SnapshotPayload::Card(c) => println!("{}", render_card(c)),
        }
    }
    Ok(())
}
