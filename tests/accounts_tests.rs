// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use calamine::Data;
use hoegye::commands::accounts::{self, NewAccount};
use hoegye::commands::cashbook::{self, LedgerLine};
use hoegye::commands::budgets;
use hoegye::error::LedgerError;
use hoegye::models::{AccountType, BookType, EntryType};
use hoegye::{cli, db};
use rust_decimal::Decimal;

fn s(v: &str) -> Data {
    Data::String(v.to_string())
}

fn new_account(name: &str, typ: AccountType) -> NewAccount {
    NewAccount {
        account_name: name.into(),
        account_type: Some(typ),
        ..Default::default()
    }
}

#[test]
fn codes_continue_per_type_prefix() {
    let conn = db::open_in_memory().unwrap();
    let a = accounts::add(&conn, 2025, &new_account("회의비", AccountType::Expense)).unwrap();
    let b = accounts::add(&conn, 2025, &new_account("소모품비", AccountType::Expense)).unwrap();
    let c = accounts::add(&conn, 2025, &new_account("회비수입", AccountType::Income)).unwrap();
    let d = accounts::add(&conn, 2026, &new_account("회의비", AccountType::Expense)).unwrap();
    assert_eq!(a.code, "X001");
    assert_eq!(b.code, "X002");
    assert_eq!(c.code, "I001");
    assert_eq!(d.code, "X001");

    let mut explicit = new_account("예비비", AccountType::Expense);
    explicit.code = Some("X010".into());
    accounts::add(&conn, 2025, &explicit).unwrap();
    assert_eq!(accounts::next_code(&conn, 2025, "X").unwrap(), "X011");
    assert!(accounts::add(&conn, 2025, &explicit).is_err());
}

#[test]
fn referenced_account_is_not_deleted() {
    let conn = db::open_in_memory().unwrap();
    let acct = accounts::add(&conn, 2025, &new_account("사업비", AccountType::Expense)).unwrap();
    budgets::set_budget(&conn, 2025, &acct.code, Decimal::from(1_000), None, None).unwrap();

    let err = accounts::remove(&conn, 2025, &acct.code).unwrap_err();
    match err.downcast_ref::<LedgerError>() {
        Some(LedgerError::Referenced { refs, .. }) => assert_eq!(refs, &vec!["1 budgets".to_string()]),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(accounts::list(&conn, 2025, None).unwrap().len(), 1);
    assert_eq!(budgets::list(&conn, 2025).unwrap().len(), 1);

    let unused = accounts::add(&conn, 2025, &new_account("예비비", AccountType::Expense)).unwrap();
    accounts::remove(&conn, 2025, &unused.code).unwrap();
    assert_eq!(accounts::list(&conn, 2025, None).unwrap().len(), 1);
}

fn assert_referenced_by(err: anyhow::Error, table: &str) {
    match err.downcast_ref::<LedgerError>() {
        Some(LedgerError::Referenced { refs, .. }) => {
            assert_eq!(refs.len(), 1);
            assert!(refs[0].ends_with(table), "{:?}", refs);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn transaction_reference_blocks_delete() {
    let conn = db::open_in_memory().unwrap();
    let acct = accounts::add(&conn, 2025, &new_account("회의비", AccountType::Expense)).unwrap();
    conn.execute(
        "INSERT INTO transactions(date, transaction_type, account_id, amount, payment_method)
         VALUES ('2025-02-01', 'EXPENSE', ?1, '3000', 'CARD')",
        [acct.id],
    )
    .unwrap();

    assert_referenced_by(accounts::remove(&conn, 2025, &acct.code).unwrap_err(), "transactions");
    assert_eq!(accounts::list(&conn, 2025, None).unwrap().len(), 1);
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM transactions WHERE account_id=?1", [acct.id], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn cashbook_line_reference_blocks_delete() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = accounts::add(&conn, 2025, &new_account("소모품비", AccountType::Expense)).unwrap();
    let lines = vec![LedgerLine {
        entry_type: Some(EntryType::Expense),
        day: "12".into(),
        item: format!("account:{}", acct.code),
        amount: "8,000".into(),
        ..Default::default()
    }];
    // cash book lines never post a transaction
    let out = cashbook::save_period(&mut conn, BookType::Cash, 2025, 2, &lines).unwrap();
    assert_eq!((out.saved, out.linked), (1, 0));

    assert_referenced_by(accounts::remove(&conn, 2025, &acct.code).unwrap_err(), "cashbook lines");
    assert_eq!(accounts::list(&conn, 2025, None).unwrap().len(), 1);
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM cashbook WHERE account_id=?1", [acct.id], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn upload_maps_korean_headers() {
    let mut conn = db::open_in_memory().unwrap();
    let rows = vec![
        vec![s("계정과목표")],
        vec![s("계정유형"), s("대분류"), s("중분류"), s("소분류"), s("계정명")],
        vec![s("지출"), s("사업비"), s("운영"), Data::Empty, s("회의비")],
        vec![s("EXPENSE"), s("사업비"), s("운영"), Data::Empty, s("회의비")],
        vec![s("수입"), s("회비"), Data::Empty, Data::Empty, s("정회원회비")],
        vec![s("기타"), Data::Empty, Data::Empty, Data::Empty, s("알수없음")],
    ];
    let out = accounts::upload(&mut conn, 2025, &rows).unwrap();
    assert_eq!(out.created, 2);
    assert_eq!(out.skipped, 2);

    let expense = accounts::list(&conn, 2025, Some(AccountType::Expense)).unwrap();
    assert_eq!(expense.len(), 1);
    assert_eq!(expense[0].category_medium, "운영");

    let err = accounts::upload(&mut conn, 2025, &rows).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::DuplicateYear { .. })
    ));
}

#[test]
fn upload_reports_sheet_columns_when_required_missing() {
    let mut conn = db::open_in_memory().unwrap();
    let rows = vec![
        vec![s("계정명"), s("비고")],
        vec![s("회의비"), Data::Empty],
    ];
    let err = accounts::upload(&mut conn, 2025, &rows).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Required columns not found. Sheet columns: [계정명, 비고]"
    );
    assert!(accounts::list(&conn, 2025, None).unwrap().is_empty());
}

#[test]
fn delete_year_needs_force_with_transactions() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = accounts::add(&conn, 2024, &new_account("사업비", AccountType::Expense)).unwrap();
    budgets::set_budget(&conn, 2024, &acct.code, Decimal::from(1_000), None, None).unwrap();
    conn.execute(
        "INSERT INTO transactions(date, transaction_type, account_id, amount)
         VALUES ('2024-05-01', 'EXPENSE', ?1, '100')",
        [acct.id],
    )
    .unwrap();

    assert!(accounts::delete_year(&mut conn, 2024, false).is_err());

    let matches = cli::build_cli().get_matches_from([
        "hoegye", "account", "delete-year", "--year", "2024", "--force",
    ]);
    if let Some(("account", acct_m)) = matches.subcommand() {
        accounts::handle(&mut conn, acct_m).unwrap();
    } else {
        panic!("no account subcommand");
    }
    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))
        .unwrap();
    assert_eq!(left, 0);
}
