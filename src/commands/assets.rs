// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{DepreciationMethod, FixedAsset};
use crate::utils::{
    amount_text, fmt_amount, get_decimal, maybe_print_json, parse_date, parse_decimal,
    pretty_table,
};
use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap().trim();
            let acquired = parse_date(sub.get_one::<String>("acquired").unwrap())?;
            let cost = parse_decimal(sub.get_one::<String>("cost").unwrap())?;
            let life = *sub.get_one::<i64>("life").unwrap();
            let method: DepreciationMethod = match sub.get_one::<String>("method") {
                Some(s) => s.parse()?,
                None => DepreciationMethod::Straight,
            };
            let salvage = match sub.get_one::<String>("salvage") {
                Some(s) => parse_decimal(s)?,
                None => Decimal::ZERO,
            };
            if life <= 0 {
                return Err(anyhow!("Useful life must be at least one year"));
            }
            conn.execute(
                "INSERT INTO fixed_assets(name, acquisition_date, acquisition_cost, useful_life,
                                          depreciation_method, salvage_value, current_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?3)",
                params![name, acquired, amount_text(&cost), life, method, amount_text(&salvage)],
            )?;
            println!("Added fixed asset '{}' ({})", name, fmt_amount(&cost));
        }
        Some(("list", sub)) => {
            let assets = list(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &assets)? {
                let data = assets
                    .iter()
                    .map(|a| {
                        vec![
                            a.name.clone(),
                            a.acquisition_date.to_string(),
                            fmt_amount(&a.acquisition_cost),
                            a.useful_life.to_string(),
                            a.depreciation_method.label().to_string(),
                            fmt_amount(&a.annual_depreciation()),
                            fmt_amount(&a.current_value),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Asset", "Acquired", "Cost", "Life", "Method", "Depreciation/yr", "Value"],
                        data
                    )
                );
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<FixedAsset>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, acquisition_date, acquisition_cost, useful_life, depreciation_method,
                salvage_value, current_value, is_active
         FROM fixed_assets ORDER BY acquisition_date, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(FixedAsset {
                id: r.get(0)?,
                name: r.get(1)?,
                acquisition_date: r.get(2)?,
                acquisition_cost: get_decimal(r, 3)?,
                useful_life: r.get(4)?,
                depreciation_method: r.get(5)?,
                salvage_value: get_decimal(r, 6)?,
                current_value: get_decimal(r, 7)?,
                is_active: r.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
