// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::LedgerError;
use crate::models::{Account, AccountType};
use crate::sheet::{self, Columns, Row};
use crate::utils::{account_for_code, maybe_print_json, pretty_table};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;
use std::path::Path;

/// Fields of an account before it has an id.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub code: Option<String>,
    pub category_large: String,
    pub category_medium: String,
    pub category_small: String,
    pub account_name: String,
    pub account_type: Option<AccountType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearDeletion {
    pub transactions: usize,
    pub budgets: usize,
    pub accounts: usize,
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let typ: AccountType = sub.get_one::<String>("type").unwrap().parse()?;
            let text = |k: &str| sub.get_one::<String>(k).map(|s| s.trim().to_string());
            let new = NewAccount {
                code: text("code"),
                category_large: text("large").unwrap_or_default(),
                category_medium: text("medium").unwrap_or_default(),
                category_small: text("small").unwrap_or_default(),
                account_name: text("name").unwrap_or_default(),
                account_type: Some(typ),
            };
            let acct = add(conn, year, &new)?;
            println!(
                "Added account {} '{}' ({}, {})",
                acct.code, acct.account_name, acct.account_type, year
            );
        }
        Some(("list", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let typ = match sub.get_one::<String>("type") {
                Some(t) => Some(t.parse::<AccountType>()?),
                None => None,
            };
            let accounts = list(conn, year, typ)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &accounts)? {
                let data = accounts
                    .iter()
                    .map(|a| {
                        vec![
                            a.code.clone(),
                            a.account_type.label().to_string(),
                            a.category_large.clone(),
                            a.category_medium.clone(),
                            a.category_small.clone(),
                            a.account_name.clone(),
                            if a.is_active { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Code", "Type", "Large", "Medium", "Small", "Name", "Active"],
                        data
                    )
                );
            }
        }
        Some(("rm", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let code = sub.get_one::<String>("code").unwrap();
            let acct = remove(conn, year, code)?;
            println!("Removed account {} '{}'", acct.code, acct.account_name);
        }
        Some(("set-active", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let code = sub.get_one::<String>("code").unwrap();
            let active = sub.get_one::<String>("active").unwrap() == "yes";
            let acct = account_for_code(conn, year, code)?;
            conn.execute(
                "UPDATE accounts SET is_active=?1 WHERE id=?2",
                params![active, acct.id],
            )?;
            println!(
                "Account {} is now {}",
                acct.code,
                if active { "active" } else { "inactive" }
            );
        }
        Some(("upload", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let path = sub.get_one::<String>("path").unwrap().trim();
            let rows = sheet::read_rows(Path::new(path))?;
            let out = upload(conn, year, &rows)?;
            if out.created == 0 {
                println!("No accounts were registered");
            } else if out.skipped > 0 {
                println!(
                    "Registered {} accounts ({} duplicates skipped)",
                    out.created, out.skipped
                );
            } else {
                println!("Registered {} accounts", out.created);
            }
        }
        Some(("delete-year", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let d = delete_year(conn, year, sub.get_flag("force"))?;
            let mut msg = format!(
                "Deleted {} data: {} accounts, {} budgets",
                year, d.accounts, d.budgets
            );
            if d.transactions > 0 {
                msg.push_str(&format!(", {} transactions", d.transactions));
            }
            println!("{}", msg);
        }
        _ => {}
    }
    Ok(())
}

/// Next free code for `prefix` in the fiscal year: highest numeric suffix + 1,
/// three digits.
pub fn next_code(conn: &Connection, year: i32, prefix: &str) -> Result<String> {
    let mut stmt =
        conn.prepare_cached("SELECT code FROM accounts WHERE fiscal_year=?1 AND code LIKE ?2")?;
    let codes = stmt
        .query_map(params![year, format!("{}%", prefix)], |r| {
            r.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let max = codes
        .iter()
        .filter_map(|c| c.get(prefix.len()..)?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    Ok(format!("{}{:03}", prefix, max + 1))
}

pub fn add(conn: &Connection, year: i32, new: &NewAccount) -> Result<Account> {
    let typ = new.account_type.unwrap_or(AccountType::Expense);
    if new.account_name.trim().is_empty() {
        return Err(anyhow!("Account name is required"));
    }
    let code = match new.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c.to_string(),
        None => next_code(conn, year, typ.code_prefix())?,
    };
    conn.execute(
        "INSERT INTO accounts(fiscal_year, code, category_large, category_medium,
                              category_small, account_name, account_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            year,
            code,
            new.category_large,
            new.category_medium,
            new.category_small,
            new.account_name.trim(),
            typ
        ],
    )
    .with_context(|| format!("Account code {} already exists in {}", code, year))?;
    account_for_code(conn, year, &code)
}

pub fn list(conn: &Connection, year: i32, typ: Option<AccountType>) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE fiscal_year=?1 AND (?2 IS NULL OR account_type=?2)
         ORDER BY code",
        Account::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![year, typ], Account::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn count(conn: &Connection, sql: &str, id: i64) -> Result<i64> {
    Ok(conn.query_row(sql, params![id], |r| r.get(0))?)
}

/// Deletes an account unless budgets, transactions or ledger lines use it.
pub fn remove(conn: &Connection, year: i32, code: &str) -> Result<Account> {
    let acct = account_for_code(conn, year, code)?;
    let mut refs = Vec::new();
    for (table, sql) in [
        ("budgets", "SELECT COUNT(*) FROM budgets WHERE account_id=?1"),
        ("transactions", "SELECT COUNT(*) FROM transactions WHERE account_id=?1"),
        ("cashbook lines", "SELECT COUNT(*) FROM cashbook WHERE account_id=?1"),
    ] {
        let n = count(conn, sql, acct.id)?;
        if n > 0 {
            refs.push(format!("{} {}", n, table));
        }
    }
    if !refs.is_empty() {
        return Err(LedgerError::Referenced {
            entity: "Account",
            name: format!("{} {}", acct.code, acct.account_name),
            refs,
        }
        .into());
    }
    conn.execute("DELETE FROM accounts WHERE id=?1", params![acct.id])?;
    tracing::info!(year, code = %acct.code, "account removed");
    Ok(acct)
}

/// Registers accounts from a sheet with the headers 계정유형, 대분류, 중분류,
/// 소분류, 계정명. Refused when the year already has accounts.
pub fn upload(conn: &mut Connection, year: i32, rows: &[Row]) -> Result<UploadOutcome> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE fiscal_year=?1",
        params![year],
        |r| r.get(0),
    )?;
    if existing > 0 {
        return Err(LedgerError::DuplicateYear {
            what: "Accounts",
            year,
        }
        .into());
    }
    let header = sheet::find_header_row(rows, None, &["계정유형", "계정명"]);
    let cols = Columns::from_row(rows.get(header).map(|r| r.as_slice()).unwrap_or(&[]));
    let type_col = cols.require(&["계정유형"])?;
    let name_col = cols.require(&["계정명"])?;
    let large_col = cols.find(&["대분류"]);
    let medium_col = cols.find(&["중분류"]);
    let small_col = cols.find(&["소분류"]);
    let opt_text = |row: &Row, c: Option<usize>| c.map(|c| sheet::cell_text(row, c)).unwrap_or_default();

    let tx = conn.transaction()?;
    let mut out = UploadOutcome::default();
    for (i, row) in rows.iter().enumerate().skip(header + 1) {
        let type_text = sheet::cell_text(row, type_col);
        let name = sheet::cell_text(row, name_col);
        if type_text.is_empty() || name.is_empty() {
            continue;
        }
        let typ = match type_text.parse::<AccountType>() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(row = i, error = %e, "account row skipped");
                out.skipped += 1;
                continue;
            }
        };
        let dup: i64 = tx.query_row(
            "SELECT COUNT(*) FROM accounts WHERE fiscal_year=?1 AND account_name=?2 AND account_type=?3",
            params![year, name, typ],
            |r| r.get(0),
        )?;
        if dup > 0 {
            out.skipped += 1;
            continue;
        }
        let new = NewAccount {
            code: None,
            category_large: opt_text(row, large_col),
            category_medium: opt_text(row, medium_col),
            category_small: opt_text(row, small_col),
            account_name: name,
            account_type: Some(typ),
        };
        add(&tx, year, &new)?;
        out.created += 1;
    }
    tx.commit()?;
    tracing::info!(year, created = out.created, skipped = out.skipped, "accounts uploaded");
    Ok(out)
}

/// Removes a fiscal year's accounts, budgets and the transactions posted to
/// them. Transactions are only removed with `force`.
pub fn delete_year(conn: &mut Connection, year: i32, force: bool) -> Result<YearDeletion> {
    let ledger_refs: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cashbook cb JOIN accounts a ON a.id=cb.account_id
         WHERE a.fiscal_year=?1",
        params![year],
        |r| r.get(0),
    )?;
    if ledger_refs > 0 {
        return Err(LedgerError::Referenced {
            entity: "Fiscal year",
            name: year.to_string(),
            refs: vec![format!("{} cashbook lines", ledger_refs)],
        }
        .into());
    }
    let txns: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions t JOIN accounts a ON a.id=t.account_id
         WHERE a.fiscal_year=?1",
        params![year],
        |r| r.get(0),
    )?;
    if txns > 0 && !force {
        return Err(anyhow!(
            "{} accounts carry {} transactions; re-run with --force to delete them too",
            year,
            txns
        ));
    }
    let tx = conn.transaction()?;
    let transactions = tx.execute(
        "DELETE FROM transactions WHERE account_id IN (SELECT id FROM accounts WHERE fiscal_year=?1)",
        params![year],
    )?;
    let budgets = tx.execute("DELETE FROM budgets WHERE fiscal_year=?1", params![year])?;
    let accounts = tx.execute("DELETE FROM accounts WHERE fiscal_year=?1", params![year])?;
    tx.commit()?;
    tracing::info!(year, transactions, budgets, accounts, "fiscal year deleted");
    Ok(YearDeletion {
        transactions,
        budgets,
        accounts,
    })
}
