// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{Member, PartnerType};
use crate::utils::{id_for_member, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap().trim();
            let partner: PartnerType = match sub.get_one::<String>("type") {
                Some(t) => t.parse()?,
                None => PartnerType::General,
            };
            let text = |k: &str| {
                sub.get_one::<String>(k)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };
            conn.execute(
                "INSERT INTO members(name, business_number, partner_type, contact_person)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, text("business-number"), partner, text("contact")],
            )?;
            println!("Added {} '{}'", partner.label(), name);
        }
        Some(("list", sub)) => {
            let members = list(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &members)? {
                let data = members
                    .iter()
                    .map(|m| {
                        vec![
                            m.name.clone(),
                            m.partner_type.label().to_string(),
                            m.business_number.clone(),
                            m.contact_person.clone(),
                            if m.is_active { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Name", "Type", "Business no.", "Contact", "Active"], data)
                );
            }
        }
        Some(("rm", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_member(conn, name)?;
            // transactions keep their history; the partner link is cleared
            conn.execute("DELETE FROM members WHERE id=?1", params![id])?;
            println!("Removed member '{}'", name.trim());
        }
        _ => {}
    }
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, business_number, partner_type, contact_person, is_active
         FROM members ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Member {
                id: r.get(0)?,
                name: r.get(1)?,
                business_number: r.get(2)?,
                partner_type: r.get(3)?,
                contact_person: r.get(4)?,
                is_active: r.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
