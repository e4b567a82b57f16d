// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use calamine::Data;
use hoegye::commands::accounts::{self, NewAccount};
use hoegye::commands::{importer, reports};
use hoegye::error::LedgerError;
use hoegye::models::AccountType;
use hoegye::{cli, db, sheet};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

fn s(v: &str) -> Data {
    Data::String(v.to_string())
}

fn setup() -> Connection {
    let conn = db::open_in_memory().unwrap();
    for (code, name) in [("X001", "회의비"), ("X002", "소모품비")] {
        accounts::add(
            &conn,
            2025,
            &NewAccount {
                code: Some(code.into()),
                account_name: name.into(),
                account_type: Some(AccountType::Expense),
                ..Default::default()
            },
        )
        .unwrap();
    }
    conn
}

fn card_csv() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    write!(
        file,
        "\u{feff}법인카드 이용내역,,,,,\n\
         NO,이용일,가맹점명,매출금액,승인번호,취소구분\n\
         1,2025.03.10,문구점,\"12,000\",A100,정상\n\
         2,2025.03.10,문구점,\"12,000\",A100,취소\n"
    )
    .unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn canceled_duplicate_saves_once() {
    let mut conn = setup();
    let file = card_csv();
    let rows = sheet::read_rows(file.path()).unwrap();
    let items = importer::parse_card_rows(&rows).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].approval_number, "A100");
    assert_eq!(items[0].amount, Decimal::from(12_000));

    let token = importer::stage(&conn, &items).unwrap();
    let out = importer::save_staged(&mut conn, &token, &HashMap::new(), Some("X001")).unwrap();
    assert_eq!((out.saved, out.updated, out.skipped), (1, 0, 0));

    // the staged record is consumed
    let err = importer::load_staged(&conn, &token).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::UnknownImport(_))
    ));

    let st = reports::card_statement(&conn, 2025, 3, None).unwrap();
    assert_eq!(st.item_count, 1);
    assert_eq!(st.total_amount, Decimal::from(12_000));
    assert_eq!(st.items[0].day, 10);
}

#[test]
fn reimport_updates_account_then_skips() {
    let mut conn = setup();
    let file = card_csv();
    let items = importer::parse_card_rows(&sheet::read_rows(file.path()).unwrap()).unwrap();

    let token = importer::stage(&conn, &items).unwrap();
    importer::save_staged(&mut conn, &token, &HashMap::new(), Some("X001")).unwrap();

    let mut assign = HashMap::new();
    assign.insert(items[0].index, "X002".to_string());
    let token = importer::stage(&conn, &items).unwrap();
    let out = importer::save_staged(&mut conn, &token, &assign, None).unwrap();
    assert_eq!((out.saved, out.updated, out.skipped), (0, 1, 0));

    let token = importer::stage(&conn, &items).unwrap();
    let out = importer::save_staged(&mut conn, &token, &assign, None).unwrap();
    assert_eq!((out.saved, out.updated, out.skipped), (0, 0, 1));

    let st = reports::card_statement(&conn, 2025, 3, Some("X002")).unwrap();
    assert_eq!(st.item_count, 1);
    assert!(reports::card_statement(&conn, 2025, 3, Some("X001")).unwrap().items.is_empty());
}

#[test]
fn rows_without_approval_dedup_on_date_amount_description() {
    let mut conn = setup();
    let rows = vec![
        vec![s("이용일"), s("가맹점명"), s("이용금액"), s("환가료")],
        vec![s("2025-04-01"), s("해외서점"), Data::Float(50_000.0), Data::Float(500.0)],
        vec![s("합계"), Data::Empty, Data::Float(50_500.0), Data::Empty],
        vec![s("2025-04-02"), s("환불"), Data::Float(-3_000.0), Data::Empty],
    ];
    let items = importer::parse_card_rows(&rows).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].amount, Decimal::from(50_500));
    assert!(items[0].approval_number.is_empty());

    for expected_saved in [1, 0] {
        let token = importer::stage(&conn, &items).unwrap();
        let out = importer::save_staged(&mut conn, &token, &HashMap::new(), Some("X001")).unwrap();
        assert_eq!(out.saved, expected_saved);
    }
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn unassigned_or_unknown_accounts_are_skipped() {
    let mut conn = setup();
    let file = card_csv();
    let items = importer::parse_card_rows(&sheet::read_rows(file.path()).unwrap()).unwrap();

    let token = importer::stage(&conn, &items).unwrap();
    let out = importer::save_staged(&mut conn, &token, &HashMap::new(), None).unwrap();
    assert_eq!(out.skipped, 1);

    let token = importer::stage(&conn, &items).unwrap();
    let out = importer::save_staged(&mut conn, &token, &HashMap::new(), Some("Z999")).unwrap();
    assert_eq!(out.skipped, 1);
    assert_eq!(out.saved, 0);
}

#[test]
fn missing_date_column_is_reported() {
    let rows = vec![vec![s("가맹점명"), s("매출금액")], vec![s("문구점"), s("1000")]];
    let err = importer::parse_card_rows(&rows).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::MissingColumns { .. })
    ));
}

#[test]
fn assignments_parse_index_code_pairs() {
    let raw = vec!["0=X001".to_string(), " 3 = X002 ".to_string()];
    let map = importer::parse_assignments(raw.iter()).unwrap();
    assert_eq!(map.get(&0).map(String::as_str), Some("X001"));
    assert_eq!(map.get(&3).map(String::as_str), Some("X002"));
    assert!(importer::parse_assignments([&"X001".to_string()]).is_err());
}

#[test]
fn stage_and_discard_through_cli() {
    let mut conn = setup();
    let file = card_csv();
    let path = file.path().to_str().unwrap().to_string();
    let matches = cli::build_cli().get_matches_from(["hoegye", "import", "card", "--path", &path]);
    if let Some(("import", import_m)) = matches.subcommand() {
        importer::handle(&mut conn, import_m).unwrap();
    } else {
        panic!("no import subcommand");
    }
    let token: String = conn
        .query_row("SELECT token FROM staged_imports", [], |r| r.get(0))
        .unwrap();
    importer::discard(&conn, &token).unwrap();
    assert!(importer::discard(&conn, &token).is_err());
    assert!(Path::new(&path).exists());
}

#[test]
fn only_positive_reversal_amounts_drop_a_row() {
    let rows = vec![
        vec![s("이용일"), s("가맹점명"), s("이용금액"), s("취소금액")],
        vec![s("2025-05-02"), s("문구점"), Data::Float(8_000.0), Data::Float(-5_000.0)],
        vec![s("2025-05-03"), s("서점"), Data::Float(15_000.0), Data::Float(0.0)],
        vec![s("2025-05-04"), s("식당"), Data::Float(30_000.0), s("-30,000")],
        vec![s("2025-05-05"), s("카페"), Data::Float(4_500.0), Data::Float(4_500.0)],
    ];
    let items = importer::parse_card_rows(&rows).unwrap();
    let names: Vec<&str> = items.iter().map(|i| i.description.as_str()).collect();
    assert_eq!(names, vec!["문구점", "서점"]);
}

#[test]
fn same_amount_at_another_scale_is_not_booked_twice() {
    let mut conn = setup();
    let first = vec![
        vec![s("이용일"), s("가맹점명"), s("이용금액")],
        vec![s("2025-06-10"), s("문구점"), Data::Float(12_000.0)],
    ];
    let second = vec![
        vec![s("이용일"), s("가맹점명"), s("이용금액")],
        vec![s("2025-06-10"), s("문구점"), s("12,000.00")],
    ];
    let mut saved = 0;
    for rows in [first, second] {
        let items = importer::parse_card_rows(&rows).unwrap();
        let token = importer::stage(&conn, &items).unwrap();
        saved += importer::save_staged(&mut conn, &token, &HashMap::new(), Some("X001"))
            .unwrap()
            .saved;
    }
    assert_eq!(saved, 1);
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn card_items_book_only_against_expense_accounts() {
    let mut conn = setup();
    accounts::add(
        &conn,
        2025,
        &NewAccount {
            code: Some("I001".into()),
            account_name: "후원금수입".into(),
            account_type: Some(AccountType::Income),
            ..Default::default()
        },
    )
    .unwrap();
    let file = card_csv();
    let items = importer::parse_card_rows(&sheet::read_rows(file.path()).unwrap()).unwrap();
    let token = importer::stage(&conn, &items).unwrap();
    let out = importer::save_staged(&mut conn, &token, &HashMap::new(), Some("I001")).unwrap();
    assert_eq!((out.saved, out.skipped), (0, 1));
}
