// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use hoegye::commands::accounts::{self, NewAccount};
use hoegye::commands::cashbook::{self, LedgerLine};
use hoegye::commands::{categories, reports, snapshots};
use hoegye::error::LedgerError;
use hoegye::models::{AccountType, BookType, EntryType, SnapshotKind};
use hoegye::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::io::Write;

fn setup() -> Connection {
    let conn = db::open_in_memory().unwrap();
    accounts::add(
        &conn,
        2025,
        &NewAccount {
            code: Some("X001".into()),
            category_large: "사업비".into(),
            account_name: "사업비".into(),
            account_type: Some(AccountType::Expense),
            ..Default::default()
        },
    )
    .unwrap();
    conn.execute(
        "INSERT INTO bank_accounts(bank_name, account_number) VALUES ('국민', '123-45')",
        [],
    )
    .unwrap();
    categories::add(&conn, BookType::Bank, EntryType::Income, "후원금", None).unwrap();
    categories::add(&conn, BookType::Cash, EntryType::Income, "후원금", None).unwrap();
    categories::add(&conn, BookType::Cash, EntryType::Expense, "소모품", None).unwrap();
    conn
}

fn line(entry: EntryType, day: &str, item: &str, amount: &str) -> LedgerLine {
    LedgerLine {
        entry_type: Some(entry),
        day: day.into(),
        item: item.into(),
        amount: amount.into(),
        ..Default::default()
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

#[test]
fn bank_expense_posts_linked_transaction_and_clear_removes_it() {
    let mut conn = setup();
    let mut expense = line(EntryType::Expense, "10", "account:X001", "50,000");
    expense.note = "3월 임차료".into();
    let lines = vec![expense];
    let out = cashbook::save_period(&mut conn, BookType::Bank, 2025, 3, &lines).unwrap();
    assert_eq!(out.saved, 1);
    assert_eq!(out.linked, 1);

    let (date, desc, amount, method): (String, String, String, String) = conn
        .query_row(
            "SELECT date, description, amount, payment_method FROM transactions",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .unwrap();
    assert_eq!(date, "2025-03-10");
    assert_eq!(desc, "사업비 (3월 임차료)");
    assert_eq!(amount, "50000");
    assert_eq!(method, "BANK");

    // saving again replaces rather than duplicates
    cashbook::save_period(&mut conn, BookType::Bank, 2025, 3, &lines).unwrap();
    assert_eq!(count(&conn, "cashbook"), 1);
    assert_eq!(count(&conn, "transactions"), 1);

    let (removed_lines, removed_txns) =
        cashbook::clear_period(&mut conn, BookType::Bank, 2025, 3).unwrap();
    assert_eq!((removed_lines, removed_txns), (1, 1));
    assert_eq!(count(&conn, "cashbook"), 0);
    assert_eq!(count(&conn, "transactions"), 0);
}

#[test]
fn cash_book_never_posts_transactions() {
    let mut conn = setup();
    let lines = vec![line(EntryType::Expense, "3", "account:X001", "12000")];
    let out = cashbook::save_period(&mut conn, BookType::Cash, 2025, 3, &lines).unwrap();
    assert_eq!(out.saved, 1);
    assert_eq!(out.linked, 0);
    assert_eq!(count(&conn, "transactions"), 0);
}

#[test]
fn bad_lines_are_skipped_not_fatal() {
    let mut conn = setup();
    let lines = vec![
        line(EntryType::Income, "5", "후원금", "100,000"),
        line(EntryType::Income, "31", "후원금", "1000"),
        line(EntryType::Income, "6", "없는분류", "1000"),
        line(EntryType::Expense, "7", "account:Z999", "1000"),
        line(EntryType::Expense, "8", "category:소모품", "abc"),
        LedgerLine::default(),
    ];
    // April has 30 days
    let out = cashbook::save_period(&mut conn, BookType::Cash, 2025, 4, &lines).unwrap();
    assert_eq!(out.saved, 1);
    assert_eq!(out.skipped, 4);
}

#[test]
fn carry_forward_uses_previous_confirmed_month() {
    let mut conn = setup();
    let feb = vec![
        line(EntryType::Income, "3", "후원금", "100,000"),
        line(EntryType::Expense, "4", "category:소모품", "30,000"),
    ];
    cashbook::save_period(&mut conn, BookType::Cash, 2025, 2, &feb).unwrap();
    let mar = vec![line(EntryType::Expense, "4", "category:소모품", "20,000")];
    cashbook::save_period(&mut conn, BookType::Cash, 2025, 3, &mar).unwrap();

    let unconfirmed = reports::cashbook_statement(&conn, BookType::Cash, 2025, 3).unwrap();
    assert!(unconfirmed.prior_balance.is_zero());

    let snap = snapshots::confirm(&mut conn, SnapshotKind::CashbookCash, 2025, 2, "kim").unwrap();
    match &snap.document.payload {
        snapshots::SnapshotPayload::Cashbook(st) => {
            assert_eq!(st.next_balance, Decimal::from(70_000));
            assert_eq!(st.next_balance, st.prior_balance + st.income_total - st.expense_total);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let st = reports::cashbook_statement(&conn, BookType::Cash, 2025, 3).unwrap();
    assert_eq!(st.prior_balance, Decimal::from(70_000));
    assert_eq!(st.next_balance, Decimal::from(50_000));
    assert_eq!(st.expense[0].item, "소모품");

    // bank book has its own chain
    let bank = reports::cashbook_statement(&conn, BookType::Bank, 2025, 3).unwrap();
    assert!(bank.prior_balance.is_zero());
}

#[test]
fn used_category_cannot_be_removed() {
    let mut conn = setup();
    let lines = vec![line(EntryType::Income, "3", "후원금", "1000")];
    cashbook::save_period(&mut conn, BookType::Cash, 2025, 1, &lines).unwrap();

    let err = categories::remove(&conn, BookType::Cash, EntryType::Income, "후원금").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::Referenced { .. })
    ));
    categories::remove(&conn, BookType::Bank, EntryType::Income, "후원금").unwrap();
}

#[test]
fn save_from_csv_through_cli() {
    let mut conn = setup();
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(
        file,
        "type,day,item,amount,note,bank\nINCOME,2,후원금,\"300,000\",정기후원,123-45\n,15,account:X001,\"40,000\",,\n"
    )
    .unwrap();
    file.flush().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let matches = cli::build_cli().get_matches_from([
        "hoegye", "cashbook", "save", "--book", "bank", "--year", "2025", "--month", "5", "--path",
        &path,
    ]);
    if let Some(("cashbook", cb_m)) = matches.subcommand() {
        cashbook::handle(&mut conn, cb_m).unwrap();
    } else {
        panic!("no cashbook subcommand");
    }

    let st = reports::cashbook_statement(&conn, BookType::Bank, 2025, 5).unwrap();
    assert_eq!(st.income_total, Decimal::from(300_000));
    assert_eq!(st.income[0].bank.as_deref(), Some("국민"));
    assert_eq!(st.expense_total, Decimal::from(40_000));
    assert!(st.expense[0].linked_transaction_id.is_some());
}

#[test]
fn bank_lines_pay_only_expense_side_accounts() {
    let mut conn = setup();
    for (code, name, typ) in [
        ("I001", "회비수입", AccountType::Income),
        ("A001", "보통예금", AccountType::Asset),
        ("L001", "미지급금", AccountType::Liability),
    ] {
        accounts::add(
            &conn,
            2025,
            &NewAccount {
                code: Some(code.into()),
                account_name: name.into(),
                account_type: Some(typ),
                ..Default::default()
            },
        )
        .unwrap();
    }
    let lines = vec![
        line(EntryType::Expense, "10", "account:I001", "10,000"),
        line(EntryType::Expense, "11", "account:A001", "10,000"),
        line(EntryType::Expense, "12", "account:L001", "10,000"),
    ];
    let out = cashbook::save_period(&mut conn, BookType::Bank, 2025, 6, &lines).unwrap();
    assert_eq!((out.saved, out.skipped, out.linked), (1, 2, 1));

    let code: String = conn
        .query_row(
            "SELECT a.code FROM transactions t JOIN accounts a ON a.id = t.account_id",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(code, "L001");
}
