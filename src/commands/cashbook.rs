// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::snapshots;
use crate::models::{BookType, EntryType, SnapshotKind};
use crate::utils::{
    amount_text, check_period, find_account, id_for_category, maybe_print_json,
    parse_amount_lenient,
};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

/// One submitted ledger line, as typed on the monthly form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerLine {
    pub entry_type: Option<EntryType>,
    pub day: String,
    pub item: String,
    pub amount: String,
    pub note: String,
    pub bank: String,
}

impl LedgerLine {
    fn is_blank(&self) -> bool {
        self.day.trim().is_empty() && self.item.trim().is_empty() && self.amount.trim().is_empty()
    }

    /// The line's date within the period, if the day is valid.
    pub fn date(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let day: u32 = self.day.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub saved: usize,
    pub skipped: usize,
    pub linked: usize,
}

/// Ledger lines from a CSV with the columns `type,day,item,amount,note,bank`.
/// A missing or blank type reads as an expense line.
pub fn read_lines(path: &Path) -> Result<Vec<LedgerLine>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path.display()))?;
    let mut lines = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("Read CSV {} line {}", path.display(), i + 2))?;
        let field = |n: usize| rec.get(n).unwrap_or("").trim().to_string();
        let typ = field(0);
        let entry_type = if typ.is_empty() {
            None
        } else {
            Some(
                typ.parse::<EntryType>()
                    .with_context(|| format!("Line {} of {}", i + 2, path.display()))?,
            )
        };
        lines.push(LedgerLine {
            entry_type,
            day: field(1),
            item: field(2),
            amount: field(3),
            note: field(4),
            bank: field(5),
        });
    }
    Ok(lines)
}

/// Deletes the period's lines together with the transactions they posted.
/// Returns (lines, transactions) removed.
fn delete_period(tx: &Transaction<'_>, book: BookType, year: i32, month: u32) -> Result<(usize, usize)> {
    let linked: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT linked_transaction_id FROM cashbook
             WHERE book_type=?1 AND year=?2 AND month=?3 AND linked_transaction_id IS NOT NULL",
        )?;
        stmt.query_map(params![book, year, month], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
    };
    let lines = tx.execute(
        "DELETE FROM cashbook WHERE book_type=?1 AND year=?2 AND month=?3",
        params![book, year, month],
    )?;
    let mut txns = 0;
    for id in linked {
        txns += tx.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
    }
    Ok((lines, txns))
}

fn bank_account_id(tx: &Transaction<'_>, key: &str) -> Result<Option<i64>> {
    let id = tx
        .query_row(
            "SELECT id FROM bank_accounts
             WHERE account_number=?1 OR bank_name=?1
             ORDER BY account_number=?1 DESC, sort_order, id LIMIT 1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

enum ExpenseTarget {
    Account { id: i64, name: String },
    Category { id: i64, name: String },
}

fn resolve_expense_item(
    tx: &Transaction<'_>,
    book: BookType,
    year: i32,
    item: &str,
) -> Result<Option<ExpenseTarget>> {
    let Some((kind, key)) = item.split_once(':') else {
        return Ok(None);
    };
    Ok(match kind.trim() {
        "account" => find_account(tx, year, key)?
            .filter(|a| a.account_type.is_payable())
            .map(|a| ExpenseTarget::Account {
                id: a.id,
                name: a.account_name,
            }),
        "category" => id_for_category(tx, book, EntryType::Expense, key)?.map(|id| {
            ExpenseTarget::Category {
                id,
                name: key.trim().to_string(),
            }
        }),
        _ => None,
    })
}

/// Replaces a month of one book with `lines`. Bank expense lines posted to an
/// account also book an approved bank expense and keep a link to it.
pub fn save_period(
    conn: &mut Connection,
    book: BookType,
    year: i32,
    month: u32,
    lines: &[LedgerLine],
) -> Result<SaveOutcome> {
    check_period(year, month)?;
    if book == BookType::Deposit {
        return Err(anyhow!("Use the deposit ledger for {} lines", book.label()));
    }
    let tx = conn.transaction()?;
    let (old_lines, old_txns) = delete_period(&tx, book, year, month)?;
    tracing::debug!(%book, year, month, old_lines, old_txns, "period cleared before save");

    let mut out = SaveOutcome::default();
    let entries = lines.iter().filter(|l| !l.is_blank());
    // income lines first so the order field follows the form layout
    let (income, expense): (Vec<_>, Vec<_>) =
        entries.partition(|l| l.entry_type == Some(EntryType::Income));

    for (i, line) in income.iter().enumerate() {
        let (Some(date), Some(amount)) = (line.date(year, month), parse_amount_lenient(&line.amount))
        else {
            tracing::warn!(row = i, day = %line.day, amount = %line.amount, "income line skipped");
            out.skipped += 1;
            continue;
        };
        let Some(category_id) = id_for_category(&tx, book, EntryType::Income, &line.item)? else {
            tracing::warn!(row = i, item = %line.item, "unknown income category, line skipped");
            out.skipped += 1;
            continue;
        };
        let bank_id = if line.bank.is_empty() {
            None
        } else {
            match bank_account_id(&tx, &line.bank)? {
                Some(id) => Some(id),
                None => {
                    tracing::warn!(row = i, bank = %line.bank, "unknown bank account, line skipped");
                    out.skipped += 1;
                    continue;
                }
            }
        };
        tx.execute(
            "INSERT INTO cashbook(book_type, year, month, entry_type, date, category_id,
                                  amount, bank_account_id, note, sort_order)
             VALUES (?1, ?2, ?3, 'INCOME', ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                book,
                year,
                month,
                date,
                category_id,
                amount_text(&amount),
                bank_id,
                line.note,
                out.saved as i64
            ],
        )?;
        out.saved += 1;
    }

    for (i, line) in expense.iter().enumerate() {
        let (Some(date), Some(amount)) = (line.date(year, month), parse_amount_lenient(&line.amount))
        else {
            tracing::warn!(row = i, day = %line.day, amount = %line.amount, "expense line skipped");
            out.skipped += 1;
            continue;
        };
        let Some(target) = resolve_expense_item(&tx, book, year, &line.item)? else {
            tracing::warn!(row = i, item = %line.item, "unknown expense item, line skipped");
            out.skipped += 1;
            continue;
        };
        let (account_id, category_id, display_name) = match target {
            ExpenseTarget::Account { id, name } => (Some(id), None, name),
            ExpenseTarget::Category { id, name } => (None, Some(id), name),
        };

        let mut linked = None;
        if let Some(account_id) = account_id.filter(|_| book == BookType::Bank && amount > Decimal::ZERO) {
            let description = if line.note.is_empty() {
                display_name.clone()
            } else {
                format!("{} ({})", display_name, line.note)
            };
            tx.execute(
                "INSERT INTO transactions(date, transaction_type, account_id, description,
                                          amount, payment_method, status)
                 VALUES (?1, 'EXPENSE', ?2, ?3, ?4, 'BANK', 'APPROVED')",
                params![date, account_id, description, amount_text(&amount)],
            )?;
            linked = Some(tx.last_insert_rowid());
            out.linked += 1;
        }

        tx.execute(
            "INSERT INTO cashbook(book_type, year, month, entry_type, date, account_id,
                                  category_id, description, amount, note, sort_order,
                                  linked_transaction_id)
             VALUES (?1, ?2, ?3, 'EXPENSE', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                book,
                year,
                month,
                date,
                account_id,
                category_id,
                display_name,
                amount_text(&amount),
                line.note,
                out.saved as i64,
                linked
            ],
        )?;
        out.saved += 1;
    }
    tx.commit()?;

    if let Some(kind) = SnapshotKind::for_book(book) {
        if snapshots::is_confirmed(conn, kind, year, month)? {
            tracing::warn!(%book, year, month, "period is confirmed; re-confirm to refresh the snapshot");
        }
    }
    tracing::info!(
        %book, year, month,
        saved = out.saved,
        skipped = out.skipped,
        linked = out.linked,
        "cashbook saved"
    );
    Ok(out)
}

/// Deletes every line of the period and the transactions they posted.
pub fn clear_period(conn: &mut Connection, book: BookType, year: i32, month: u32) -> Result<(usize, usize)> {
    check_period(year, month)?;
    let tx = conn.transaction()?;
    let removed = delete_period(&tx, book, year, month)?;
    tx.commit()?;
    tracing::info!(%book, year, month, lines = removed.0, transactions = removed.1, "cashbook cleared");
    Ok(removed)
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("save", sub)) => {
            let book: BookType = sub.get_one::<String>("book").unwrap().parse()?;
            let year = *sub.get_one::<i32>("year").unwrap();
            let month = *sub.get_one::<u32>("month").unwrap();
            let path = sub.get_one::<String>("path").unwrap().trim();
            let lines = read_lines(Path::new(path))?;
            let out = save_period(conn, book, year, month, &lines)?;
            if !maybe_print_json(sub.get_flag("json"), false, &out)? {
                let mut msg = format!(
                    "{} {}-{:02} saved ({} lines, {} skipped)",
                    book.label(),
                    year,
                    month,
                    out.saved,
                    out.skipped
                );
                if out.linked > 0 {
                    msg.push_str(&format!(" - {} transactions posted", out.linked));
                }
                println!("{}", msg);
            }
        }
        Some(("clear", sub)) => {
            let book: BookType = sub.get_one::<String>("book").unwrap().parse()?;
            let year = *sub.get_one::<i32>("year").unwrap();
            let month = *sub.get_one::<u32>("month").unwrap();
            let (lines, txns) = clear_period(conn, book, year, month)?;
            println!(
                "Cleared {} {}-{:02}: {} lines, {} linked transactions",
                book.label(),
                year,
                month,
                lines,
                txns
            );
        }
        _ => {}
    }
    Ok(())
}
