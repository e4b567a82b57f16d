// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::LedgerError;
use crate::models::{AccountType, Budget};
use crate::sheet::{self, Row};
use crate::utils::{
    account_for_code, amount_text, fmt_amount, get_decimal, maybe_print_json, parse_decimal, pretty_table,
};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

const HEADER_TEXT: &str = "구분(대분류)";

/// Leading digit of account codes generated from a budget sheet.
pub fn large_category_prefix(large: &str) -> &'static str {
    match large {
        "인건비" => "1",
        "사업비" => "2",
        _ => "9",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetRow {
    pub code: String,
    pub category_large: String,
    pub category_medium: String,
    pub account_name: String,
    pub budget: Budget,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetUpload {
    pub accounts: usize,
    pub budgets: usize,
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("upload", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let path = sub.get_one::<String>("path").unwrap().trim();
            let rows = sheet::read_rows(Path::new(path))?;
            let out = upload(conn, year, &rows)?;
            println!(
                "{} budget uploaded: {} accounts, {} budgets",
                year, out.accounts, out.budgets
            );
        }
        Some(("set", sub)) => set(conn, sub)?,
        Some(("list", sub)) => list_cmd(conn, sub)?,
        Some(("rm", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let code = sub.get_one::<String>("code").unwrap();
            let acct = account_for_code(conn, year, code)?;
            let n = conn.execute(
                "DELETE FROM budgets WHERE fiscal_year=?1 AND account_id=?2",
                params![year, acct.id],
            )?;
            if n == 0 {
                println!("No budget for {} in {}", acct.code, year);
            } else {
                println!("Removed {} budget for {} '{}'", year, acct.code, acct.account_name);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Creates expense accounts and their budgets from a budget sheet laid out as
/// large, medium, small, account name, (unused), amount. Refused when the
/// year already has budgets.
pub fn upload(conn: &mut Connection, year: i32, rows: &[Row]) -> Result<BudgetUpload> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM budgets WHERE fiscal_year=?1",
        params![year],
        |r| r.get(0),
    )?;
    if existing > 0 {
        return Err(LedgerError::DuplicateYear {
            what: "Budgets",
            year,
        }
        .into());
    }

    let header = sheet::find_header_row(rows, None, &[HEADER_TEXT, "대분류", "계정명"]);
    // (large, medium, small, name) in first-seen order, amounts summed per name
    let mut accounts: Vec<(String, String, String, String)> = Vec::new();
    let mut amounts: HashMap<String, Decimal> = HashMap::new();
    for row in rows.iter().skip(header + 1) {
        let large = sheet::cell_text(row, 0);
        if large.is_empty() || large == HEADER_TEXT {
            continue;
        }
        let name = sheet::cell_text(row, 3);
        let amount = sheet::cell_amount(row.get(5));
        match amounts.get_mut(&name) {
            Some(total) => *total += amount,
            None => {
                amounts.insert(name.clone(), amount);
                accounts.push((
                    large,
                    sheet::cell_text(row, 1),
                    sheet::cell_text(row, 2),
                    name,
                ));
            }
        }
    }
    if accounts.is_empty() {
        return Err(LedgerError::NoValidRows("budget sheet".into()).into());
    }

    let tx = conn.transaction()?;
    let mut counters: HashMap<&str, u32> = HashMap::new();
    let mut out = BudgetUpload::default();
    for (large, medium, small, name) in &accounts {
        let prefix = large_category_prefix(large);
        let n = counters.entry(prefix).or_insert(0);
        *n += 1;
        let code = format!("{}{:03}", prefix, n);
        tx.execute(
            "INSERT INTO accounts(fiscal_year, code, category_large, category_medium,
                                  category_small, account_name, account_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![year, code, large, medium, small, name, AccountType::Expense],
        )
        .with_context(|| format!("Create account {} '{}'", code, name))?;
        let account_id = tx.last_insert_rowid();
        out.accounts += 1;

        let amount = amounts.get(name).copied().unwrap_or_default();
        if amount > Decimal::ZERO {
            tx.execute(
                "INSERT INTO budgets(fiscal_year, account_id, annual_amount, supplementary_amount)
                 VALUES (?1, ?2, ?3, '0')",
                params![year, account_id, amount_text(&amount)],
            )?;
            out.budgets += 1;
        }
    }
    tx.commit()?;
    tracing::info!(year, accounts = out.accounts, budgets = out.budgets, "budget uploaded");
    Ok(out)
}

/// Sets the annual (and optionally supplementary) amount of an account's
/// budget, creating it when missing, and optionally renames the account.
pub fn set_budget(
    conn: &Connection,
    year: i32,
    code: &str,
    annual: Decimal,
    supplementary: Option<Decimal>,
    rename: Option<&str>,
) -> Result<Budget> {
    let acct = account_for_code(conn, year, code)?;
    conn.execute(
        "INSERT INTO budgets(fiscal_year, account_id, annual_amount, supplementary_amount)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(fiscal_year, account_id) DO UPDATE SET
            annual_amount=excluded.annual_amount,
            supplementary_amount=CASE WHEN ?5 THEN excluded.supplementary_amount
                                      ELSE budgets.supplementary_amount END",
        params![
            year,
            acct.id,
            amount_text(&annual),
            amount_text(&supplementary.unwrap_or_default()),
            supplementary.is_some()
        ],
    )?;
    if let Some(name) = rename.map(str::trim).filter(|n| !n.is_empty() && *n != acct.account_name) {
        conn.execute(
            "UPDATE accounts SET account_name=?1 WHERE id=?2",
            params![name, acct.id],
        )?;
    }
    load_budget(conn, year, acct.id)?
        .with_context(|| format!("Budget for {} in {} was not stored", code, year))
}

pub fn load_budget(conn: &Connection, year: i32, account_id: i64) -> Result<Option<Budget>> {
    let b = conn
        .query_row(
            "SELECT id, fiscal_year, account_id, annual_amount, supplementary_amount
             FROM budgets WHERE fiscal_year=?1 AND account_id=?2",
            params![year, account_id],
            |r| {
                Ok(Budget {
                    id: r.get(0)?,
                    fiscal_year: r.get(1)?,
                    account_id: r.get(2)?,
                    annual_amount: get_decimal(r, 3)?,
                    supplementary_amount: get_decimal(r, 4)?,
                })
            },
        )
        .optional()?;
    Ok(b)
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let year = *sub.get_one::<i32>("year").unwrap();
    let code = sub.get_one::<String>("code").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let supplementary = match sub.get_one::<String>("supplementary") {
        Some(s) => Some(parse_decimal(s)?),
        None => None,
    };
    let rename = sub.get_one::<String>("rename").map(|s| s.as_str());
    let b = set_budget(conn, year, code, amount, supplementary, rename)?;
    println!(
        "Budget set for {} / {} = {} (total {})",
        year,
        code,
        fmt_amount(&b.annual_amount),
        fmt_amount(&b.total_budget())
    );
    Ok(())
}

pub fn list(conn: &Connection, year: i32) -> Result<Vec<BudgetRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.fiscal_year, b.account_id, b.annual_amount, b.supplementary_amount,
                a.code, a.category_large, a.category_medium, a.account_name
         FROM budgets b JOIN accounts a ON a.id=b.account_id
         WHERE b.fiscal_year=?1 ORDER BY a.code, b.id",
    )?;
    let rows = stmt
        .query_map(params![year], |r| {
            Ok(BudgetRow {
                budget: Budget {
                    id: r.get(0)?,
                    fiscal_year: r.get(1)?,
                    account_id: r.get(2)?,
                    annual_amount: get_decimal(r, 3)?,
                    supplementary_amount: get_decimal(r, 4)?,
                },
                code: r.get(5)?,
                category_large: r.get(6)?,
                category_medium: r.get(7)?,
                account_name: r.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn list_cmd(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let year = *sub.get_one::<i32>("year").unwrap();
    let rows = list(conn, year)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        return Ok(());
    }
    let total: Decimal = rows.iter().map(|r| r.budget.total_budget()).sum();
    let mut data: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.code.clone(),
                r.category_large.clone(),
                r.category_medium.clone(),
                r.account_name.clone(),
                fmt_amount(&r.budget.annual_amount),
                fmt_amount(&r.budget.supplementary_amount),
                fmt_amount(&r.budget.total_budget()),
            ]
        })
        .collect();
    data.push(vec![
        String::new(),
        String::new(),
        String::new(),
        "합계".into(),
        String::new(),
        String::new(),
        fmt_amount(&total),
    ]);
    println!(
        "{}",
        pretty_table(
            &["Code", "Large", "Medium", "Account", "Annual", "Supplementary", "Total"],
            data
        )
    );
    Ok(())
}
