// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{Settlement, SettlementStatus};
use crate::utils::{maybe_print_json, parse_date, pretty_table};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("open", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let closing = parse_date(sub.get_one::<String>("closing-date").unwrap())?;
            let notes = sub.get_one::<String>("notes").map(|s| s.trim()).unwrap_or("");
            conn.execute(
                "INSERT INTO settlements(fiscal_year, closing_date, notes) VALUES (?1, ?2, ?3)",
                params![year, closing, notes],
            )
            .with_context(|| format!("Settlement for {} already exists", year))?;
            println!("Opened {} settlement (closing {})", year, closing);
        }
        Some(("status", sub)) => {
            let year = *sub.get_one::<i32>("year").unwrap();
            let status: SettlementStatus = sub.get_one::<String>("status").unwrap().parse()?;
            let n = conn.execute(
                "UPDATE settlements SET status=?1, updated_at=datetime('now') WHERE fiscal_year=?2",
                params![status, year],
            )?;
            if n == 0 {
                return Err(anyhow!("No settlement for {}", year));
            }
            tracing::info!(year, %status, "settlement status changed");
            println!("{} settlement is now {}", year, status.label());
        }
        Some(("list", sub)) => {
            let items = list(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
                let data = items
                    .iter()
                    .map(|s| {
                        vec![
                            s.fiscal_year.to_string(),
                            s.closing_date.to_string(),
                            s.status.label().to_string(),
                            s.notes.clone(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Year", "Closing", "Status", "Notes"], data)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<Settlement>> {
    let mut stmt = conn.prepare(
        "SELECT id, fiscal_year, closing_date, status, notes FROM settlements
         ORDER BY fiscal_year DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Settlement {
                id: r.get(0)?,
                fiscal_year: r.get(1)?,
                closing_date: r.get(2)?,
                status: r.get(3)?,
                notes: r.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
