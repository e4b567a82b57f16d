// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Hoegye", "hoegye"));

/// Environment variable that overrides the database location.
pub const DB_ENV: &str = "HOEGYE_DB";

pub fn data_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.to_path_buf())
}

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_ENV).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(p);
        if let Some(parent) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        return Ok(path);
    }
    Ok(data_dir()?.join("hoegye.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Fresh in-memory database with the full schema, used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fiscal_year INTEGER NOT NULL,
        code TEXT NOT NULL,
        category_large TEXT NOT NULL DEFAULT '',
        category_medium TEXT NOT NULL DEFAULT '',
        category_small TEXT NOT NULL DEFAULT '',
        account_name TEXT NOT NULL DEFAULT '',
        account_name2 TEXT NOT NULL DEFAULT '',
        account_type TEXT NOT NULL DEFAULT 'EXPENSE'
            CHECK(account_type IN ('ASSET','LIABILITY','EQUITY','INCOME','EXPENSE')),
        report_position TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 1,
        UNIQUE(fiscal_year, code)
    );

    CREATE TABLE IF NOT EXISTS members(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        business_number TEXT NOT NULL DEFAULT '',
        partner_type TEXT NOT NULL DEFAULT 'GENERAL' CHECK(partner_type IN ('MEMBER','GENERAL')),
        contact_person TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 1
    );

    -- amounts are stored as exact decimal text
    CREATE TABLE IF NOT EXISTS budgets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fiscal_year INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        annual_amount TEXT NOT NULL DEFAULT '0',
        supplementary_amount TEXT NOT NULL DEFAULT '0',
        UNIQUE(fiscal_year, account_id),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE RESTRICT
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        transaction_type TEXT NOT NULL CHECK(transaction_type IN ('INCOME','EXPENSE','TRANSFER')),
        account_id INTEGER NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        partner_id INTEGER,
        amount TEXT NOT NULL,
        payment_method TEXT NOT NULL DEFAULT 'BANK' CHECK(payment_method IN ('CASH','BANK','CARD','OTHER')),
        approval_number TEXT,
        status TEXT NOT NULL DEFAULT 'APPROVED' CHECK(status IN ('APPROVED','PENDING')),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE RESTRICT,
        FOREIGN KEY(partner_id) REFERENCES members(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_approval ON transactions(approval_number);

    CREATE TABLE IF NOT EXISTS cashbook_categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_type TEXT NOT NULL CHECK(book_type IN ('BANK','CASH','DEPOSIT')),
        entry_type TEXT NOT NULL CHECK(entry_type IN ('INCOME','EXPENSE')),
        name TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        UNIQUE(book_type, entry_type, name)
    );

    CREATE TABLE IF NOT EXISTS bank_accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bank_name TEXT NOT NULL,
        account_number TEXT NOT NULL,
        account_holder TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS cashbook(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_type TEXT NOT NULL CHECK(book_type IN ('BANK','CASH')),
        year INTEGER NOT NULL,
        month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
        entry_type TEXT NOT NULL CHECK(entry_type IN ('INCOME','EXPENSE')),
        date TEXT NOT NULL,
        category_id INTEGER,
        account_id INTEGER,
        description TEXT NOT NULL DEFAULT '',
        amount TEXT NOT NULL DEFAULT '0',
        bank_account_id INTEGER,
        note TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        linked_transaction_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(category_id) REFERENCES cashbook_categories(id) ON DELETE RESTRICT,
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE RESTRICT,
        FOREIGN KEY(bank_account_id) REFERENCES bank_accounts(id) ON DELETE SET NULL,
        FOREIGN KEY(linked_transaction_id) REFERENCES transactions(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cashbook_period ON cashbook(book_type, year, month);

    CREATE TABLE IF NOT EXISTS deposit_ledger(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        year INTEGER NOT NULL,
        month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
        date TEXT NOT NULL,
        category_id INTEGER NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        amount TEXT NOT NULL DEFAULT '0',
        note TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(category_id) REFERENCES cashbook_categories(id) ON DELETE RESTRICT
    );
    CREATE INDEX IF NOT EXISTS idx_deposit_period ON deposit_ledger(year, month);

    CREATE TABLE IF NOT EXISTS monthly_snapshots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        snapshot_type TEXT NOT NULL
            CHECK(snapshot_type IN ('BUDGET','CASHBOOK_BANK','CASHBOOK_CASH','CARD_EXPENSE')),
        fiscal_year INTEGER NOT NULL,
        month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
        snapshot_data TEXT NOT NULL,
        is_confirmed INTEGER NOT NULL DEFAULT 1,
        confirmed_at TEXT NOT NULL,
        confirmed_by TEXT NOT NULL DEFAULT '',
        UNIQUE(snapshot_type, fiscal_year, month)
    );

    CREATE TABLE IF NOT EXISTS fixed_assets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        acquisition_date TEXT NOT NULL,
        acquisition_cost TEXT NOT NULL,
        useful_life INTEGER NOT NULL,
        depreciation_method TEXT NOT NULL DEFAULT 'STRAIGHT'
            CHECK(depreciation_method IN ('STRAIGHT','DECLINING')),
        salvage_value TEXT NOT NULL DEFAULT '0',
        current_value TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS settlements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fiscal_year INTEGER NOT NULL UNIQUE,
        closing_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'DRAFT' CHECK(status IN ('DRAFT','SUBMITTED','APPROVED')),
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- parsed uploads waiting for account assignment, keyed by token
    CREATE TABLE IF NOT EXISTS staged_imports(
        token TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let mut conn = open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='monthly_snapshots'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn foreign_keys_enforced() {
        let conn = open_in_memory().unwrap();
        let err = conn.execute(
            "INSERT INTO budgets(fiscal_year, account_id, annual_amount) VALUES (2025, 99, '1')",
            [],
        );
        assert!(err.is_err());
    }
}
