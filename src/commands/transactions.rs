// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{PaymentMethod, Transaction, TxnStatus, TxnType};
use crate::utils::{
    account_for_code, amount_text, fmt_amount, get_decimal, id_for_member, maybe_print_json, month_bounds,
    parse_date, parse_decimal, pretty_table,
};
use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let ids: Vec<i64> = sub.get_many::<i64>("id").into_iter().flatten().copied().collect();
            let n = delete_many(conn, &ids)?;
            println!("Deleted {} transactions", n);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let code = sub.get_one::<String>("account").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let typ: TxnType = sub.get_one::<String>("type").unwrap().parse()?;
    let method: PaymentMethod = sub.get_one::<String>("method").unwrap().parse()?;
    let status: TxnStatus = sub.get_one::<String>("status").unwrap().parse()?;
    let description = sub
        .get_one::<String>("desc")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let approval = sub
        .get_one::<String>("approval")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let partner_id = match sub.get_one::<String>("partner") {
        Some(p) => Some(id_for_member(conn, p)?),
        None => None,
    };
    if amount <= rust_decimal::Decimal::ZERO {
        return Err(anyhow!("Amount must be positive, got {}", amount));
    }

    let account = account_for_code(conn, date.year(), code)?;
    conn.execute(
        "INSERT INTO transactions(date, transaction_type, account_id, description, partner_id,
                                  amount, payment_method, approval_number, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            date,
            typ,
            account.id,
            description,
            partner_id,
            amount_text(&amount),
            method,
            approval,
            status
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(id, %date, account = %account.code, "transaction recorded");
    println!(
        "Recorded #{} {} {} on {} ({} {})",
        id,
        typ.label(),
        fmt_amount(&amount),
        date,
        account.code,
        account.account_name
    );
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let t = conn
        .query_row(
            "SELECT id, date, transaction_type, account_id, description, partner_id, amount,
                    payment_method, approval_number, status
             FROM transactions WHERE id=?1",
            params![id],
            |r| {
                Ok(Transaction {
                    id: r.get(0)?,
                    date: r.get(1)?,
                    transaction_type: r.get(2)?,
                    account_id: r.get(3)?,
                    description: r.get(4)?,
                    partner_id: r.get(5)?,
                    amount: get_decimal(r, 6)?,
                    payment_method: r.get(7)?,
                    approval_number: r.get(8)?,
                    status: r.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(t)
}

/// Deletes the given transactions in one go; unknown ids are ignored. Ledger
/// lines that posted them lose their link.
pub fn delete_many(conn: &mut Connection, ids: &[i64]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut deleted = 0;
    for id in ids {
        let Some(t) = get(&tx, *id)? else {
            tracing::debug!(id, "transaction already gone");
            continue;
        };
        deleted += tx.execute("DELETE FROM transactions WHERE id=?1", params![t.id])?;
    }
    tx.commit()?;
    tracing::info!(deleted, "transactions deleted");
    Ok(deleted)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.transaction_type.clone(),
                    format!("{} {}", r.account_code, r.account_name),
                    r.description.clone(),
                    r.amount.clone(),
                    r.payment_method.clone(),
                    r.status.clone(),
                    r.approval_number.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Date", "Type", "Account", "Description", "Amount", "Method", "Status",
                    "Approval",
                ],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub transaction_type: String,
    pub account_code: String,
    pub account_name: String,
    pub description: String,
    pub partner: String,
    pub amount: String,
    pub payment_method: String,
    pub status: String,
    pub approval_number: String,
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let mut sql = String::from(
        "SELECT t.id, t.date, t.transaction_type, a.code, a.account_name, t.description, m.name,
                t.amount, t.payment_method, t.status, t.approval_number
         FROM transactions t
         JOIN accounts a ON t.account_id=a.id
         LEFT JOIN members m ON t.partner_id=m.id
         WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    let year = sub.get_one::<i32>("year").copied();
    if let Some(month) = sub.get_one::<u32>("month").copied() {
        let year = year.ok_or_else(|| anyhow!("--month needs --year"))?;
        let (_, start, next) = month_bounds(year, month)?;
        sql.push_str(" AND t.date>=? AND t.date<?");
        params_vec.push(start.to_string());
        params_vec.push(next.to_string());
    } else if let Some(year) = year {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| anyhow!("Invalid year {}", year))?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .ok_or_else(|| anyhow!("Invalid year {}", year))?;
        sql.push_str(" AND t.date>=? AND t.date<?");
        params_vec.push(start.to_string());
        params_vec.push(next.to_string());
    }
    if let Some(code) = sub.get_one::<String>("account") {
        sql.push_str(" AND a.code=?");
        params_vec.push(code.trim().into());
    }
    if let Some(method) = sub.get_one::<String>("method") {
        sql.push_str(" AND t.payment_method=?");
        params_vec.push(method.parse::<PaymentMethod>()?.to_string());
    }
    if let Some(typ) = sub.get_one::<String>("type") {
        sql.push_str(" AND t.transaction_type=?");
        params_vec.push(typ.parse::<TxnType>()?.to_string());
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params_vec.iter()))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let partner: Option<String> = r.get(6)?;
        let approval: Option<String> = r.get(10)?;
        data.push(TransactionRow {
            id: r.get(0)?,
            date: r.get(1)?,
            transaction_type: r.get(2)?,
            account_code: r.get(3)?,
            account_name: r.get(4)?,
            description: r.get(5)?,
            partner: partner.unwrap_or_default(),
            amount: r.get(7)?,
            payment_method: r.get(8)?,
            status: r.get(9)?,
            approval_number: approval.unwrap_or_default(),
        });
    }
    Ok(data)
}
