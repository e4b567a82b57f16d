// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::LedgerError;
use crate::models::{BookType, CashBookCategory, EntryType};
use crate::utils::{id_for_category, maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use rusqlite::{Connection, params};

fn book_entry(sub: &clap::ArgMatches) -> Result<(BookType, EntryType)> {
    Ok((
        sub.get_one::<String>("book").unwrap().parse()?,
        sub.get_one::<String>("entry").unwrap().parse()?,
    ))
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let (book, entry) = book_entry(sub)?;
            let name = sub.get_one::<String>("name").unwrap().trim();
            let order = sub.get_one::<i64>("order").copied();
            add(conn, book, entry, name, order)?;
            println!("Added {} {} category '{}'", book.label(), entry.label(), name);
        }
        Some(("list", sub)) => {
            let book = match sub.get_one::<String>("book") {
                Some(b) => Some(b.parse::<BookType>()?),
                None => None,
            };
            let cats = list(conn, book)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &cats)? {
                let data = cats
                    .iter()
                    .map(|c| {
                        vec![
                            c.book_type.label().to_string(),
                            c.entry_type.label().to_string(),
                            c.name.clone(),
                            c.order.to_string(),
                            if c.is_active { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Book", "Entry", "Category", "Order", "Active"], data)
                );
            }
        }
        Some(("rm", sub)) => {
            let (book, entry) = book_entry(sub)?;
            let name = sub.get_one::<String>("name").unwrap().trim();
            remove(conn, book, entry, name)?;
            println!("Removed category '{}'", name);
        }
        Some(("set-active", sub)) => {
            let (book, entry) = book_entry(sub)?;
            let name = sub.get_one::<String>("name").unwrap().trim();
            let active = sub.get_one::<String>("active").unwrap() == "yes";
            let id = category_id(conn, book, entry, name)?;
            conn.execute(
                "UPDATE cashbook_categories SET is_active=?1 WHERE id=?2",
                params![active, id],
            )?;
            println!(
                "Category '{}' is now {}",
                name,
                if active { "active" } else { "inactive" }
            );
        }
        _ => {}
    }
    Ok(())
}

fn category_id(conn: &Connection, book: BookType, entry: EntryType, name: &str) -> Result<i64> {
    id_for_category(conn, book, entry, name)?.with_context(|| {
        format!(
            "Category '{}' not found in {} {}",
            name,
            book.label(),
            entry.label()
        )
    })
}

/// Adds a category; without an explicit order it goes after the last one of
/// its book and entry type.
pub fn add(
    conn: &Connection,
    book: BookType,
    entry: EntryType,
    name: &str,
    order: Option<i64>,
) -> Result<i64> {
    let order = match order {
        Some(o) => o,
        None => conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM cashbook_categories
             WHERE book_type=?1 AND entry_type=?2",
            params![book, entry],
            |r| r.get(0),
        )?,
    };
    conn.execute(
        "INSERT INTO cashbook_categories(book_type, entry_type, name, sort_order)
         VALUES (?1, ?2, ?3, ?4)",
        params![book, entry, name, order],
    )
    .with_context(|| format!("Category '{}' already exists", name))?;
    Ok(conn.last_insert_rowid())
}

pub fn list(conn: &Connection, book: Option<BookType>) -> Result<Vec<CashBookCategory>> {
    let mut stmt = conn.prepare(
        "SELECT id, book_type, entry_type, name, sort_order, is_active
         FROM cashbook_categories
         WHERE (?1 IS NULL OR book_type=?1)
         ORDER BY book_type, entry_type, sort_order, name",
    )?;
    let rows = stmt
        .query_map(params![book], |r| {
            Ok(CashBookCategory {
                id: r.get(0)?,
                book_type: r.get(1)?,
                entry_type: r.get(2)?,
                name: r.get(3)?,
                order: r.get(4)?,
                is_active: r.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Deletes a category that no ledger line uses.
pub fn remove(conn: &Connection, book: BookType, entry: EntryType, name: &str) -> Result<()> {
    let id = category_id(conn, book, entry, name)?;
    let mut refs = Vec::new();
    for (what, sql) in [
        ("cashbook lines", "SELECT COUNT(*) FROM cashbook WHERE category_id=?1"),
        ("deposit lines", "SELECT COUNT(*) FROM deposit_ledger WHERE category_id=?1"),
    ] {
        let n: i64 = conn.query_row(sql, params![id], |r| r.get(0))?;
        if n > 0 {
            refs.push(format!("{} {}", n, what));
        }
    }
    if !refs.is_empty() {
        return Err(LedgerError::Referenced {
            entity: "Category",
            name: name.to_string(),
            refs,
        }
        .into());
    }
    conn.execute("DELETE FROM cashbook_categories WHERE id=?1", params![id])?;
    Ok(())
}
