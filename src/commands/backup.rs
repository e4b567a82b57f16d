// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db;
use crate::utils::pretty_table;
use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};

const PREFIX: &str = "db_backup_";
const SUFFIX: &str = ".sqlite3";
const STAMP: &str = "%Y%m%d_%H%M%S";
pub const DEFAULT_KEEP_DAYS: i64 = 30;
const LIST_LIMIT: usize = 10;

pub fn backup_dir() -> Result<PathBuf> {
    let dir = db::data_dir()?.join("backups");
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

/// Timestamp encoded in a backup file name, if the name is one of ours.
pub fn backup_stamp(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, STAMP).ok()
}

/// Copies the live database into `dir` with `VACUUM INTO`.
pub fn create(conn: &Connection, dir: &Path, now: NaiveDateTime) -> Result<PathBuf> {
    let path = dir.join(format!("{}{}{}", PREFIX, now.format(STAMP), SUFFIX));
    if path.exists() {
        return Err(anyhow!("Backup {} already exists", path.display()));
    }
    let target = path
        .to_str()
        .ok_or_else(|| anyhow!("Backup path is not valid UTF-8"))?;
    conn.execute("VACUUM INTO ?1", params![target])
        .with_context(|| format!("Write backup {}", path.display()))?;
    tracing::info!(path = %path.display(), "backup written");
    Ok(path)
}

/// Deletes backups whose stamped date is older than `keep_days` before `today`.
pub fn prune(dir: &Path, today: NaiveDate, keep_days: i64) -> Result<Vec<PathBuf>> {
    let cutoff = today - chrono::Duration::days(keep_days);
    let mut removed = Vec::new();
    for (path, stamp) in backups(dir)? {
        if stamp.date() < cutoff {
            fs::remove_file(&path).with_context(|| format!("Remove {}", path.display()))?;
            tracing::debug!(path = %path.display(), "old backup removed");
            removed.push(path);
        }
    }
    Ok(removed)
}

/// Backups in `dir`, newest first.
pub fn backups(dir: &Path) -> Result<Vec<(PathBuf, NaiveDateTime)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Read {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(stamp) = name.to_str().and_then(backup_stamp) {
            found.push((entry.path(), stamp));
        }
    }
    found.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(found)
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let dir = backup_dir()?;
    match m.subcommand() {
        Some(("create", sub)) => {
            let keep_days = sub
                .get_one::<i64>("keep-days")
                .copied()
                .unwrap_or(DEFAULT_KEEP_DAYS);
            let now = Local::now().naive_local();
            let path = create(conn, &dir, now)?;
            let removed = prune(&dir, now.date(), keep_days)?;
            println!("Backup written to {}", path.display());
            if !removed.is_empty() {
                println!("Removed {} backups older than {} days", removed.len(), keep_days);
            }
        }
        Some(("list", _)) => {
            let rows: Vec<Vec<String>> = backups(&dir)?
                .into_iter()
                .take(LIST_LIMIT)
                .map(|(path, stamp)| {
                    let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    vec![
                        path.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                        format!("{:.1} KB", size as f64 / 1024.0),
                    ]
                })
                .collect();
            if rows.is_empty() {
                println!("No backups in {}", dir.display());
            } else {
                println!("{}", pretty_table(&["File", "Created", "Size"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn stamp_round_trips_through_file_name() {
        assert_eq!(
            backup_stamp("db_backup_20250301_093000.sqlite3"),
            Some(at(2025, 3, 1))
        );
        assert_eq!(backup_stamp("notes.txt"), None);
        assert_eq!(backup_stamp("db_backup_garbage.sqlite3"), None);
    }

    #[test]
    fn create_then_prune_old_copies() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO settings(key, value) VALUES ('operator', 'kim')",
            [],
        )
        .unwrap();

        let old = create(&conn, dir.path(), at(2025, 1, 1)).unwrap();
        let fresh = create(&conn, dir.path(), at(2025, 3, 1)).unwrap();
        assert!(old.exists() && fresh.exists());

        let copy = Connection::open(&fresh).unwrap();
        let op: String = copy
            .query_row("SELECT value FROM settings WHERE key='operator'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(op, "kim");

        let removed = prune(dir.path(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(), 30).unwrap();
        assert_eq!(removed, vec![old.clone()]);
        assert!(!old.exists());
        assert_eq!(backups(dir.path()).unwrap().len(), 1);
    }
}
