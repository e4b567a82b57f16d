// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::reports::budget_execution;
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        Some(("budget", sub)) => export_budget(conn, sub),
        _ => Ok(()),
    }
}

fn output_format(sub: &clap::ArgMatches) -> Result<String> {
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    match fmt.as_str() {
        "csv" | "json" => Ok(fmt),
        _ => Err(anyhow!("Unknown format: {} (use csv|json)", fmt)),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = output_format(sub)?;
    let out = sub.get_one::<String>("out").unwrap().trim();

    let mut sql = String::from(
        "SELECT t.date, t.transaction_type, a.code, a.account_name, t.description, t.amount,
                t.payment_method, t.status, t.approval_number, m.name
         FROM transactions t
         JOIN accounts a ON t.account_id=a.id
         LEFT JOIN members m ON t.partner_id=m.id",
    );
    let mut params_vec: Vec<String> = Vec::new();
    if let Some(year) = sub.get_one::<i32>("year") {
        sql.push_str(" WHERE substr(t.date, 1, 4)=?");
        params_vec.push(format!("{:04}", year));
    }
    sql.push_str(" ORDER BY t.date, t.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), |r| {
            Ok([
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, Option<String>>(8)?.unwrap_or_default(),
                r.get::<_, Option<String>>(9)?.unwrap_or_default(),
            ])
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let headers = [
        "date",
        "type",
        "account_code",
        "account_name",
        "description",
        "amount",
        "payment_method",
        "status",
        "approval_number",
        "partner",
    ];
    match fmt.as_str() {
        "csv" => {
            let mut wtr =
                csv::Writer::from_path(out).with_context(|| format!("Create {}", out))?;
            wtr.write_record(headers)?;
            for row in &rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
        }
        _ => {
            let items: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let obj: serde_json::Map<String, serde_json::Value> = headers
                        .iter()
                        .zip(row.iter())
                        .map(|(k, v)| (k.to_string(), json!(v)))
                        .collect();
                    serde_json::Value::Object(obj)
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)
                .with_context(|| format!("Write {}", out))?;
        }
    }
    tracing::info!(count = rows.len(), out, "transactions exported");
    println!("Exported {} transactions to {}", rows.len(), out);
    Ok(())
}

fn export_budget(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = output_format(sub)?;
    let out = sub.get_one::<String>("out").unwrap().trim();
    let year = *sub.get_one::<i32>("year").unwrap();
    let month = *sub.get_one::<u32>("month").unwrap();
    let report = budget_execution(conn, year, month)?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr =
                csv::Writer::from_path(out).with_context(|| format!("Create {}", out))?;
            wtr.write_record([
                "category_large",
                "category_medium",
                "code",
                "account_name",
                "budget",
                "cumulative",
                "monthly",
                "remaining",
                "exec_rate",
            ])?;
            for large in &report.groups {
                for medium in &large.mediums {
                    for line in &medium.items {
                        wtr.write_record([
                            large.name.clone(),
                            medium.name.clone(),
                            line.code.clone(),
                            line.account_name.clone(),
                            line.annual_budget.to_string(),
                            line.cumulative.to_string(),
                            line.monthly.to_string(),
                            line.remaining.to_string(),
                            line.exec_rate.to_string(),
                        ])?;
                    }
                }
            }
            let t = &report.grand_total;
            wtr.write_record([
                "합계".to_string(),
                String::new(),
                String::new(),
                String::new(),
                t.budget.to_string(),
                t.executed.to_string(),
                t.month.to_string(),
                t.remaining.to_string(),
                t.rate.to_string(),
            ])?;
            wtr.flush()?;
        }
        _ => {
            std::fs::write(out, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("Write {}", out))?;
        }
    }
    tracing::info!(year, month, out, "budget execution exported");
    println!("Exported {}-{:02} budget execution to {}", year, month, out);
    Ok(())
}
