// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use hoegye::commands::accounts::{self, NewAccount};
use hoegye::models::AccountType;
use hoegye::{cli, commands::exporter, db};
use rusqlite::Connection;
use serde_json::json;
use tempfile::tempdir;

fn base_conn() -> Connection {
    let conn = db::open_in_memory().unwrap();
    accounts::add(
        &conn,
        2025,
        &NewAccount {
            code: Some("X001".into()),
            account_name: "회의비".into(),
            account_type: Some(AccountType::Expense),
            ..Default::default()
        },
    )
    .unwrap();
    conn.execute("INSERT INTO members(name) VALUES ('한빛상사')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO transactions(date, transaction_type, account_id, description, partner_id,
                                  amount, payment_method, approval_number)
         VALUES ('2025-01-02', 'EXPENSE', 1, '정기회의 다과', 1, '12000', 'CARD', 'A100')",
        [],
    )
    .unwrap();
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["hoegye", "export"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(conn, export_m)
    } else {
        panic!("no export subcommand");
    }
}

#[test]
fn export_transactions_writes_pretty_json() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.json");
    let out_str = out_path.to_string_lossy().to_string();

    run(&conn, &["transactions", "--format", "json", "--out", &out_str]).unwrap();

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(
        parsed,
        json!([
            {
                "date": "2025-01-02",
                "type": "EXPENSE",
                "account_code": "X001",
                "account_name": "회의비",
                "description": "정기회의 다과",
                "amount": "12000",
                "payment_method": "CARD",
                "status": "APPROVED",
                "approval_number": "A100",
                "partner": "한빛상사"
            }
        ])
    );
}

#[test]
fn export_year_filter_and_csv() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.csv");
    let out_str = out_path.to_string_lossy().to_string();

    run(
        &conn,
        &["transactions", "--format", "CSV", "--out", &out_str, "--year", "2024"],
    )
    .unwrap();
    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.starts_with("date,type,account_code"));
}

#[test]
fn export_budget_csv_ends_with_total() {
    let conn = base_conn();
    hoegye::commands::budgets::set_budget(
        &conn,
        2025,
        "X001",
        rust_decimal::Decimal::from(100_000),
        None,
        None,
    )
    .unwrap();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("budget.csv");
    let out_str = out_path.to_string_lossy().to_string();

    run(
        &conn,
        &[
            "budget", "--year", "2025", "--month", "1", "--format", "csv", "--out", &out_str,
        ],
    )
    .unwrap();
    let contents = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("X001"));
    assert!(lines[2].starts_with("합계"));
    assert!(lines[2].contains("12000"));
}

#[test]
fn export_transactions_rejects_unknown_format() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.unknown");
    let out_str = out_path.to_string_lossy().to_string();

    assert!(run(&conn, &["transactions", "--format", "xml", "--out", &out_str]).is_err());
    assert!(!out_path.exists());
}
