// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::reports;
use crate::error::LedgerError;
use crate::models::AccountType;
use crate::sheet::{self, Columns, Row};
use crate::utils::{
    amount_text, find_account, fmt_amount, get_decimal, maybe_print_json, pretty_table,
};
use anyhow::{Context, Result, anyhow};
use calamine::Data;
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

pub const CARD_KIND: &str = "card";

const HEADER_KEYWORDS: &[&str] = &["이용일", "승인금액", "매출금액", "가맹점명", "카드번호"];
const CANCEL_COLS: &[&str] = &["취소\n구분", "취소구분", "취소 구분", "상태", "승인상태"];
const CANCEL_AMOUNT_COLS: &[&str] = &["취소매출금액", "취소금액"];
const DATE_COLS: &[&str] = &["이용일자", "이용일", "거래일자", "거래일", "승인일자", "승인일"];
const AMOUNT_COLS: &[&str] = &["매출금액", "이용금액", "승인금액", "결제금액", "금액"];
const FEE_COLS: &[&str] = &["환가료"];
const DESC_COLS: &[&str] = &["가맹점명", "가맹점", "이용가맹점", "이용처", "사용처"];
const CARD_NO_COLS: &[&str] = &["카드번호", "카드 번호", "카드NO"];
const APPROVAL_COLS: &[&str] = &["승인번호", "승인NO", "승인 번호"];
const ACTIVE_STATUSES: &[&str] = &["정상", "승인"];

/// One purchase read from a card company statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardItem {
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub card_number: String,
    pub approval_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CardSaveOutcome {
    pub saved: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("card", sub)) => stage_card(conn, sub),
        Some(("card-save", sub)) => save_card(conn, sub),
        Some(("discard", sub)) => {
            let token = sub.get_one::<String>("token").unwrap().trim();
            discard(conn, token)?;
            println!("Discarded staged import {}", token);
            Ok(())
        }
        Some(("staged", sub)) => list_staged(conn, sub),
        _ => Ok(()),
    }
}

/// Card purchases from sheet rows. Canceled rows, unreadable dates and
/// non-positive amounts are dropped.
pub fn parse_card_rows(rows: &[Row]) -> Result<Vec<CardItem>> {
    let header = sheet::find_header_row(rows, Some("NO"), HEADER_KEYWORDS);
    let cols = Columns::from_row(rows.get(header).map(|r| r.as_slice()).unwrap_or(&[]));
    let date_col = cols.require(DATE_COLS)?;
    let amount_col = cols.require(AMOUNT_COLS)?;
    let cancel_col = cols.find(CANCEL_COLS);
    let cancel_amount_col = cols.find(CANCEL_AMOUNT_COLS);
    let fee_col = cols.find(FEE_COLS);
    let desc_col = cols.find(DESC_COLS);
    let card_col = cols.find(CARD_NO_COLS);
    let approval_col = cols.find(APPROVAL_COLS);
    tracing::debug!(header, date_col, amount_col, ?cancel_col, ?approval_col, "card columns");

    let mut items = Vec::new();
    for (index, row) in rows.iter().skip(header + 1).enumerate() {
        if let Some(c) = cancel_col {
            let status = sheet::cell_text(row, c);
            if !status.is_empty() && !ACTIVE_STATUSES.contains(&status.as_str()) {
                tracing::debug!(index, %status, "canceled card row dropped");
                continue;
            }
        }
        if let Some(c) = cancel_amount_col {
            if canceled_amount(row.get(c)) > Decimal::ZERO {
                tracing::debug!(index, "card row with canceled amount dropped");
                continue;
            }
        }
        let Some(date) = sheet::cell_date(row.get(date_col)) else {
            continue;
        };
        let mut amount = sheet::cell_amount(row.get(amount_col));
        if let Some(c) = fee_col {
            amount += sheet::cell_amount(row.get(c));
        }
        if amount <= Decimal::ZERO {
            continue;
        }
        let mut approval_number = approval_col
            .map(|c| sheet::cell_text(row, c))
            .unwrap_or_default();
        if approval_number.eq_ignore_ascii_case("nan") {
            approval_number.clear();
        }
        items.push(CardItem {
            index,
            date,
            description: desc_col.map(|c| sheet::cell_text(row, c)).unwrap_or_default(),
            amount,
            card_number: card_col.map(|c| sheet::cell_text(row, c)).unwrap_or_default(),
            approval_number,
        });
    }
    if items.is_empty() {
        return Err(LedgerError::NoValidRows("card statement".into()).into());
    }
    Ok(items)
}

/// Reversal amount of a card row. Text cells lose their sign the way card
/// issuers print it ("-12,000"); numeric cells keep it.
fn canceled_amount(cell: Option<&Data>) -> Decimal {
    match cell {
        Some(Data::String(s)) => s
            .replace([',', '-'], "")
            .trim()
            .parse::<Decimal>()
            .unwrap_or(Decimal::ZERO),
        other => sheet::cell_amount(other),
    }
}

/// Persists parsed card items until accounts are assigned; returns the token.
pub fn stage(conn: &Connection, items: &[CardItem]) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO staged_imports(token, kind, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, CARD_KIND, serde_json::to_string(items)?, Utc::now()],
    )?;
    tracing::info!(%token, items = items.len(), "card import staged");
    Ok(token)
}

pub fn load_staged(conn: &Connection, token: &str) -> Result<Vec<CardItem>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM staged_imports WHERE token=?1 AND kind=?2",
            params![token, CARD_KIND],
            |r| r.get(0),
        )
        .optional()?;
    let payload = payload.ok_or_else(|| LedgerError::UnknownImport(token.to_string()))?;
    serde_json::from_str(&payload).with_context(|| format!("Corrupt staged import {}", token))
}

pub fn discard(conn: &Connection, token: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM staged_imports WHERE token=?1", params![token])?;
    if n == 0 {
        return Err(LedgerError::UnknownImport(token.to_string()).into());
    }
    Ok(())
}

/// Books staged card items against the assigned account codes. Items without
/// an assignment or with an unknown account are skipped; a purchase already on
/// file is re-pointed when its account differs and skipped otherwise.
pub fn save_staged(
    conn: &mut Connection,
    token: &str,
    assignments: &HashMap<usize, String>,
    default_code: Option<&str>,
) -> Result<CardSaveOutcome> {
    let items = load_staged(conn, token)?;
    let tx = conn.transaction()?;
    let mut out = CardSaveOutcome::default();
    for item in &items {
        let code = assignments
            .get(&item.index)
            .map(|s| s.as_str())
            .or(default_code)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(code) = code else {
            out.skipped += 1;
            continue;
        };
        let account = find_account(&tx, item.date.year(), code)?
            .filter(|a| a.account_type == AccountType::Expense);
        let Some(account) = account else {
            tracing::warn!(index = item.index, code, "unknown expense account, card item skipped");
            out.skipped += 1;
            continue;
        };

        let existing: Option<(i64, i64)> = if item.approval_number.is_empty() {
            let mut stmt = tx.prepare(
                "SELECT id, account_id, amount FROM transactions
                 WHERE payment_method='CARD' AND date=?1 AND description=?2
                 ORDER BY id",
            )?;
            let candidates = stmt
                .query_map(params![item.date, item.description], |r| {
                    Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, get_decimal(r, 2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            candidates
                .into_iter()
                .find(|(_, _, amount)| *amount == item.amount)
                .map(|(id, account_id, _)| (id, account_id))
        } else {
            tx.query_row(
                "SELECT id, account_id FROM transactions
                 WHERE payment_method='CARD' AND approval_number=?1
                 ORDER BY id LIMIT 1",
                params![item.approval_number],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
        };

        match existing {
            Some((id, account_id)) if account_id != account.id => {
                tx.execute(
                    "UPDATE transactions SET account_id=?1, updated_at=datetime('now') WHERE id=?2",
                    params![account.id, id],
                )?;
                out.updated += 1;
            }
            Some(_) => out.skipped += 1,
            None => {
                tx.execute(
                    "INSERT INTO transactions(date, transaction_type, account_id, description,
                                              amount, payment_method, approval_number, status)
                     VALUES (?1, 'EXPENSE', ?2, ?3, ?4, 'CARD', ?5, 'APPROVED')",
                    params![
                        item.date,
                        account.id,
                        item.description,
                        amount_text(&item.amount),
                        Some(item.approval_number.as_str()).filter(|s| !s.is_empty())
                    ],
                )?;
                out.saved += 1;
            }
        }
    }
    tx.execute("DELETE FROM staged_imports WHERE token=?1", params![token])?;
    tx.commit()?;
    tracing::info!(
        token,
        saved = out.saved,
        updated = out.updated,
        skipped = out.skipped,
        "card import saved"
    );
    Ok(out)
}

fn stage_card(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let path = sub.get_one::<String>("path").unwrap().trim();
    let rows = sheet::read_rows(Path::new(path))?;
    let items = parse_card_rows(&rows).with_context(|| format!("Parse card statement {}", path))?;
    let token = stage(conn, &items)?;

    let total: Decimal = items.iter().map(|i| i.amount).sum();
    let data: Vec<Vec<String>> = items
        .iter()
        .map(|i| {
            vec![
                i.index.to_string(),
                i.date.to_string(),
                i.description.clone(),
                fmt_amount(&i.amount),
                i.card_number.clone(),
                i.approval_number.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["#", "Date", "Merchant", "Amount", "Card", "Approval"],
            data
        )
    );
    println!("{} items, total {}", items.len(), fmt_amount(&total));

    let first = items[0].date;
    let accounts = expense_accounts(conn, first.year())?;
    if !accounts.is_empty() {
        let data = accounts.into_iter().map(|(c, n)| vec![c, n]).collect();
        println!("{}", pretty_table(&["Code", "Expense account"], data));
    }
    let existing = reports::card_statement(conn, first.year(), first.month(), None)?;
    if existing.item_count > 0 {
        println!(
            "{}-{:02} already holds {} card expenses totalling {}",
            first.year(),
            first.month(),
            existing.item_count,
            fmt_amount(&existing.total_amount)
        );
    }
    println!("Staged as {}", token);
    Ok(())
}

/// Active expense accounts for the year, falling back to the current year.
fn expense_accounts(conn: &Connection, year: i32) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT code, account_name FROM accounts
         WHERE fiscal_year=?1 AND account_type=?2 AND is_active=1 ORDER BY code",
    )?;
    let mut out = stmt
        .query_map(params![year, AccountType::Expense], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let this_year = Utc::now().year();
    if out.is_empty() && year != this_year {
        out = stmt
            .query_map(params![this_year, AccountType::Expense], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
    }
    Ok(out)
}

/// Parses `INDEX=CODE` assignments.
pub fn parse_assignments<'a, I>(raw: I) -> Result<HashMap<usize, String>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut map = HashMap::new();
    for a in raw {
        let (idx, code) = a
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid assignment '{}', expected INDEX=CODE", a))?;
        let idx: usize = idx
            .trim()
            .parse()
            .with_context(|| format!("Invalid item index in '{}'", a))?;
        map.insert(idx, code.trim().to_string());
    }
    Ok(map)
}

fn save_card(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let token = sub.get_one::<String>("token").unwrap().trim().to_string();
    let assignments = parse_assignments(sub.get_many::<String>("assign").into_iter().flatten())?;
    let default_code = sub.get_one::<String>("default").map(|s| s.as_str());
    let out = save_staged(conn, &token, &assignments, default_code)?;
    if !maybe_print_json(sub.get_flag("json"), false, &out)? {
        println!(
            "Saved {}, updated {}, skipped {}",
            out.saved, out.updated, out.skipped
        );
    }
    Ok(())
}

fn list_staged(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT token, kind, payload, created_at FROM staged_imports ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (token, kind, payload, created) = row?;
        let count = serde_json::from_str::<Vec<serde_json::Value>>(&payload)
            .map(|v| v.len())
            .unwrap_or(0);
        data.push(vec![token, kind, count.to_string(), created]);
    }
    if !maybe_print_json(sub.get_flag("json"), false, &data)? {
        println!("{}", pretty_table(&["Token", "Kind", "Items", "Staged"], data));
    }
    Ok(())
}
