// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::BankAccount;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let bank = sub.get_one::<String>("bank").unwrap().trim();
            let number = sub.get_one::<String>("number").unwrap().trim();
            let holder = sub
                .get_one::<String>("holder")
                .map(|s| s.trim())
                .unwrap_or("");
            let order = sub.get_one::<i64>("order").copied().unwrap_or(0);
            conn.execute(
                "INSERT INTO bank_accounts(bank_name, account_number, account_holder, sort_order)
                 VALUES (?1, ?2, ?3, ?4)",
                params![bank, number, holder, order],
            )?;
            println!("Added bank account {} {}", bank, number);
        }
        Some(("list", sub)) => {
            let banks = list(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &banks)? {
                let data = banks
                    .iter()
                    .map(|b| {
                        vec![
                            b.to_string(),
                            b.account_holder.clone(),
                            b.order.to_string(),
                            if b.is_active { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Account", "Holder", "Order", "Active"], data)
                );
            }
        }
        Some(("set-active", sub)) => {
            let number = sub.get_one::<String>("number").unwrap().trim();
            let active = sub.get_one::<String>("active").unwrap() == "yes";
            let n = conn.execute(
                "UPDATE bank_accounts SET is_active=?1 WHERE account_number=?2",
                params![active, number],
            )?;
            if n == 0 {
                return Err(anyhow::anyhow!("Bank account '{}' not found", number));
            }
            println!("Bank account {} updated", number);
        }
        Some(("rm", sub)) => {
            let number = sub.get_one::<String>("number").unwrap().trim();
            let n = conn
                .execute(
                    "DELETE FROM bank_accounts WHERE account_number=?1",
                    params![number],
                )
                .with_context(|| format!("Remove bank account {}", number))?;
            if n == 0 {
                return Err(anyhow::anyhow!("Bank account '{}' not found", number));
            }
            println!("Removed bank account {}", number);
        }
        _ => {}
    }
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<BankAccount>> {
    let mut stmt = conn.prepare(
        "SELECT id, bank_name, account_number, account_holder, sort_order, is_active
         FROM bank_accounts ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(BankAccount {
                id: r.get(0)?,
                bank_name: r.get(1)?,
                account_number: r.get(2)?,
                account_holder: r.get(3)?,
                order: r.get(4)?,
                is_active: r.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
