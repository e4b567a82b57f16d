// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use hoegye::commands::accounts::{self, NewAccount};
use hoegye::commands::snapshots::{self, SnapshotPayload};
use hoegye::commands::{budgets, doctor};
use hoegye::error::LedgerError;
use hoegye::models::{AccountType, SnapshotKind};
use hoegye::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = db::open_in_memory().unwrap();
    accounts::add(
        &conn,
        2025,
        &NewAccount {
            code: Some("X001".into()),
            category_large: "사업비".into(),
            category_medium: "운영".into(),
            account_name: "사업비".into(),
            account_type: Some(AccountType::Expense),
            ..Default::default()
        },
    )
    .unwrap();
    budgets::set_budget(&conn, 2025, "X001", Decimal::from(1_000_000), None, None).unwrap();
    conn.execute(
        "INSERT INTO transactions(date, transaction_type, account_id, amount, payment_method)
         VALUES ('2025-03-15', 'EXPENSE', 1, '200000', 'CARD')",
        [],
    )
    .unwrap();
    conn
}

#[test]
fn reconfirm_is_idempotent() {
    let mut conn = setup();
    let first = snapshots::confirm(&mut conn, SnapshotKind::Budget, 2025, 3, "kim").unwrap();
    let second = snapshots::confirm(&mut conn, SnapshotKind::Budget, 2025, 3, "lee").unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.document, second.document);
    assert_eq!(second.confirmed_by, "lee");
    assert_eq!(second.document.schema_version, snapshots::SCHEMA_VERSION);
    match &second.document.payload {
        SnapshotPayload::Budget(b) => {
            assert_eq!(b.grand_total.executed, Decimal::from(200_000));
            assert_eq!(b.grand_total.rate, Decimal::from(20));
        }
        other => panic!("unexpected payload {:?}", other),
    }
    assert_eq!(snapshots::list(&conn, Some(2025)).unwrap().len(), 1);
}

#[test]
fn confirmed_snapshot_ignores_later_edits() {
    let mut conn = setup();
    snapshots::confirm(&mut conn, SnapshotKind::CardExpense, 2025, 3, "kim").unwrap();
    conn.execute(
        "INSERT INTO transactions(date, transaction_type, account_id, amount, payment_method)
         VALUES ('2025-03-20', 'EXPENSE', 1, '5000', 'CARD')",
        [],
    )
    .unwrap();

    let frozen = snapshots::load(&conn, SnapshotKind::CardExpense, 2025, 3)
        .unwrap()
        .unwrap();
    assert_eq!(frozen.document.payload.headline(), Decimal::from(200_000));
    let live = snapshots::live_payload(&conn, SnapshotKind::CardExpense, 2025, 3).unwrap();
    assert_eq!(live.headline(), Decimal::from(205_000));
}

#[test]
fn cancel_returns_to_live() {
    let mut conn = setup();
    snapshots::confirm(&mut conn, SnapshotKind::Budget, 2025, 3, "kim").unwrap();
    assert!(snapshots::is_confirmed(&conn, SnapshotKind::Budget, 2025, 3).unwrap());
    assert!(snapshots::cancel(&conn, SnapshotKind::Budget, 2025, 3).unwrap());
    assert!(!snapshots::cancel(&conn, SnapshotKind::Budget, 2025, 3).unwrap());
    assert!(snapshots::load(&conn, SnapshotKind::Budget, 2025, 3).unwrap().is_none());

    let matches = cli::build_cli().get_matches_from([
        "hoegye", "snapshot", "show", "--kind", "budget", "--year", "2025", "--month", "3",
    ]);
    if let Some(("snapshot", snap_m)) = matches.subcommand() {
        let err = snapshots::handle(&mut conn, snap_m).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::NotConfirmed { month: 3, .. })
        ));
    } else {
        panic!("no snapshot subcommand");
    }
}

#[test]
fn confirm_cashbook_kind_covers_both_books() {
    let mut conn = setup();
    let matches = cli::build_cli().get_matches_from([
        "hoegye", "snapshot", "confirm", "--kind", "cashbook", "--year", "2025", "--month", "1",
        "--by", "park",
    ]);
    if let Some(("snapshot", snap_m)) = matches.subcommand() {
        snapshots::handle(&mut conn, snap_m).unwrap();
    } else {
        panic!("no snapshot subcommand");
    }
    let kinds: Vec<SnapshotKind> = snapshots::list(&conn, None)
        .unwrap()
        .into_iter()
        .map(|s| s.kind)
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&SnapshotKind::CashbookBank));
    assert!(kinds.contains(&SnapshotKind::CashbookCash));
    assert!(snapshots::parse_kinds("ledger").is_err());
}

#[test]
fn doctor_flags_broken_carry_forward() {
    let mut conn = setup();
    snapshots::confirm(&mut conn, SnapshotKind::CashbookCash, 2025, 1, "kim").unwrap();
    snapshots::confirm(&mut conn, SnapshotKind::CashbookCash, 2025, 2, "kim").unwrap();
    assert!(doctor::check(&conn).unwrap().is_empty());

    // January closes at 10,000 after the fact; February still opens at zero
    conn.execute(
        "INSERT INTO cashbook_categories(book_type, entry_type, name) VALUES ('CASH', 'INCOME', '후원금')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO cashbook(book_type, year, month, entry_type, date, category_id, amount)
         VALUES ('CASH', 2025, 1, 'INCOME', '2025-01-05', 1, '10000')",
        [],
    )
    .unwrap();
    snapshots::confirm(&mut conn, SnapshotKind::CashbookCash, 2025, 1, "kim").unwrap();

    let issues = doctor::check(&conn).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].0, "carry_forward_break");
}
