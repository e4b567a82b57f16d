// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::snapshots::{self, SnapshotPayload};
use crate::utils::{get_decimal, prev_period, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Consistency problems found in the ledger, as (issue, detail) pairs.
pub fn check(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut issues = Vec::new();

    // 1) expense lines must point at exactly one of account/category
    let mut stmt = conn.prepare(
        "SELECT id, book_type, year, month FROM cashbook
         WHERE entry_type='EXPENSE'
           AND ((account_id IS NULL AND category_id IS NULL)
             OR (account_id IS NOT NULL AND category_id IS NOT NULL))
         ORDER BY id",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let book: String = r.get(1)?;
        let year: i32 = r.get(2)?;
        let month: u32 = r.get(3)?;
        issues.push((
            "cashbook_item_ambiguous".into(),
            format!("#{} {} {}-{:02}", id, book, year, month),
        ));
    }

    // 2) linked transactions drifting from their ledger line
    let mut stmt = conn.prepare(
        "SELECT cb.id, cb.date, cb.amount, t.id, t.date, t.amount
         FROM cashbook cb JOIN transactions t ON t.id=cb.linked_transaction_id
         ORDER BY cb.id",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let line_id: i64 = r.get(0)?;
        let line_date: String = r.get(1)?;
        let line_amount = get_decimal(r, 2)?;
        let tx_id: i64 = r.get(3)?;
        let tx_date: String = r.get(4)?;
        let tx_amount = get_decimal(r, 5)?;
        if line_date != tx_date || line_amount != tx_amount {
            issues.push((
                "linked_transaction_mismatch".into(),
                format!(
                    "cashbook #{} ({} {}) vs transaction #{} ({} {})",
                    line_id, line_date, line_amount, tx_id, tx_date, tx_amount
                ),
            ));
        }
    }

    // 3) budgets filed under another year than their account
    let mut stmt = conn.prepare(
        "SELECT b.fiscal_year, a.fiscal_year, a.code
         FROM budgets b JOIN accounts a ON a.id=b.account_id
         WHERE b.fiscal_year != a.fiscal_year",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let by: i32 = r.get(0)?;
        let ay: i32 = r.get(1)?;
        let code: String = r.get(2)?;
        issues.push((
            "budget_year_mismatch".into(),
            format!("budget {} for account {} of {}", by, code, ay),
        ));
    }

    // 4) carry-forward chain between consecutive confirmed cashbooks
    let mut closing: HashMap<(String, i32, u32), Decimal> = HashMap::new();
    let mut openings = Vec::new();
    for snap in snapshots::list(conn, None)? {
        if let SnapshotPayload::Cashbook(st) = snap.document.payload {
            let book = st.book.to_string();
            closing.insert((book.clone(), st.year, st.month), st.next_balance);
            openings.push((book, st.year, st.month, st.prior_balance));
        }
    }
    for (book, year, month, opening) in openings {
        let (py, pm) = prev_period(year, month);
        if let Some(prev_close) = closing.get(&(book.clone(), py, pm)) {
            if *prev_close != opening {
                issues.push((
                    "carry_forward_break".into(),
                    format!(
                        "{} {}-{:02} opens at {} but {}-{:02} closed at {}",
                        book, year, month, opening, py, pm, prev_close
                    ),
                ));
            }
        }
    }

    // 5) card approval numbers booked more than once
    let mut stmt = conn.prepare(
        "SELECT approval_number, COUNT(*) FROM transactions
         WHERE payment_method='CARD' AND approval_number IS NOT NULL AND approval_number != ''
         GROUP BY approval_number HAVING COUNT(*) > 1
         ORDER BY approval_number",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let approval: String = r.get(0)?;
        let n: i64 = r.get(1)?;
        issues.push((
            "duplicate_card_approval".into(),
            format!("{} x{}", approval, n),
        ));
    }

    Ok(issues)
}

pub fn handle(conn: &Connection) -> Result<()> {
    let issues = check(conn)?;
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        tracing::warn!(count = issues.len(), "ledger issues found");
        let rows = issues.into_iter().map(|(i, d)| vec![i, d]).collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
