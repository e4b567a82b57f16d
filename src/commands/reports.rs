// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::snapshots::{self, SnapshotPayload};
use crate::models::{BookType, EntryType, SnapshotKind};
use crate::utils::{
    check_period, fmt_amount, fmt_rate, get_decimal, maybe_print_json, month_bounds, prev_period,
    pretty_table,
};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, Params, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payroll account whose execution also counts withheld deposits.
pub const PAYROLL_ACCOUNT: &str = "급여";
pub const PAYROLL_DEPOSIT_CATEGORIES: [&str; 2] = ["예수금(4대보험)", "예수금(원천세)"];

/// Minimum rows per section when a ledger is printed as a form.
pub const BANK_DISPLAY_ROWS: (usize, usize) = (20, 20);
pub const CASH_DISPLAY_ROWS: (usize, usize) = (5, 20);
pub const DEPOSIT_DISPLAY_ROWS: usize = 5;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("budget", sub)) => budget(conn, sub)?,
        Some(("cashbook", sub)) => cashbook(conn, sub)?,
        Some(("card", sub)) => card(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTotals {
    pub budget: Decimal,
    pub executed: Decimal,
    pub month: Decimal,
    pub remaining: Decimal,
    pub rate: Decimal,
}

impl ExecutionTotals {
    fn add(&mut self, budget: Decimal, executed: Decimal, month: Decimal) {
        self.budget += budget;
        self.executed += executed;
        self.month += month;
        self.remaining = self.budget - self.executed;
        self.rate = exec_rate(self.executed, self.budget);
    }
}

/// Executed share of the budget in percent; zero for an empty budget.
pub fn exec_rate(executed: Decimal, budget: Decimal) -> Decimal {
    if budget > Decimal::ZERO {
        (executed / budget * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub account_id: i64,
    pub code: String,
    pub category_small: String,
    pub account_name: String,
    pub annual_budget: Decimal,
    pub cumulative: Decimal,
    pub monthly: Decimal,
    pub remaining: Decimal,
    pub exec_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediumGroup {
    pub name: String,
    pub items: Vec<BudgetLine>,
    pub subtotal: ExecutionTotals,
    pub show_subtotal: bool,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeGroup {
    pub name: String,
    pub mediums: Vec<MediumGroup>,
    pub total: ExecutionTotals,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetExecution {
    pub year: i32,
    pub month: u32,
    pub groups: Vec<LargeGroup>,
    pub grand_total: ExecutionTotals,
}

impl BudgetExecution {
    pub fn lines(&self) -> impl Iterator<Item = &BudgetLine> {
        self.groups
            .iter()
            .flat_map(|l| l.mediums.iter())
            .flat_map(|m| m.items.iter())
    }
}

fn sum_amounts<P: Params>(conn: &Connection, sql: &str, p: P) -> Result<Decimal> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(p)?;
    let mut total = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        total += get_decimal(r, 0)?;
    }
    Ok(total)
}

fn approved_expenses(
    conn: &Connection,
    account_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Decimal> {
    sum_amounts(
        conn,
        "SELECT amount FROM transactions
         WHERE account_id=?1 AND transaction_type='EXPENSE' AND status='APPROVED'
           AND date>=?2 AND date<?3",
        params![account_id, from, until],
    )
}

/// Withheld payroll deposits booked in months `first..=last` of `year`.
fn payroll_deposits(conn: &Connection, year: i32, first: u32, last: u32) -> Result<Decimal> {
    sum_amounts(
        conn,
        "SELECT d.amount FROM deposit_ledger d
         JOIN cashbook_categories c ON c.id=d.category_id
         WHERE d.year=?1 AND d.month BETWEEN ?2 AND ?3 AND c.name IN (?4, ?5)",
        params![
            year,
            first,
            last,
            PAYROLL_DEPOSIT_CATEGORIES[0],
            PAYROLL_DEPOSIT_CATEGORIES[1]
        ],
    )
}

/// Budget execution for a month: per-account cumulative and monthly approved
/// expenses grouped by large and medium category in upload order.
pub fn budget_execution(conn: &Connection, year: i32, month: u32) -> Result<BudgetExecution> {
    let (year_start, month_start, next_start) = month_bounds(year, month)?;
    let mut stmt = conn.prepare(
        "SELECT b.account_id, b.annual_amount, b.supplementary_amount, a.code,
                a.category_large, a.category_medium, a.category_small, a.account_name
         FROM budgets b JOIN accounts a ON a.id=b.account_id
         WHERE b.fiscal_year=?1
         ORDER BY a.code, b.id",
    )?;
    let budgets = stmt
        .query_map(params![year], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                get_decimal(r, 1)? + get_decimal(r, 2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, String>(7)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Load budgets for {}", year))?;

    let mut groups: Vec<LargeGroup> = Vec::new();
    for (account_id, annual_budget, code, large, medium, small, name) in budgets {
        let mut cumulative = approved_expenses(conn, account_id, year_start, next_start)?;
        let mut monthly = approved_expenses(conn, account_id, month_start, next_start)?;
        if name == PAYROLL_ACCOUNT {
            cumulative += payroll_deposits(conn, year, 1, month)?;
            monthly += payroll_deposits(conn, year, month, month)?;
        }
        let line = BudgetLine {
            account_id,
            code,
            category_small: small,
            account_name: name,
            annual_budget,
            cumulative,
            monthly,
            remaining: annual_budget - cumulative,
            exec_rate: exec_rate(cumulative, annual_budget),
        };

        let li = match groups.iter().position(|g| g.name == large) {
            Some(i) => i,
            None => {
                groups.push(LargeGroup {
                    name: large,
                    mediums: Vec::new(),
                    total: ExecutionTotals::default(),
                    row_count: 0,
                });
                groups.len() - 1
            }
        };
        let lg = &mut groups[li];
        let mi = match lg.mediums.iter().position(|g| g.name == medium) {
            Some(i) => i,
            None => {
                lg.mediums.push(MediumGroup {
                    name: medium,
                    items: Vec::new(),
                    subtotal: ExecutionTotals::default(),
                    show_subtotal: false,
                    row_count: 0,
                });
                lg.mediums.len() - 1
            }
        };
        let mg = &mut lg.mediums[mi];
        mg.subtotal.add(line.annual_budget, line.cumulative, line.monthly);
        mg.items.push(line);
    }

    let mut grand_total = ExecutionTotals::default();
    for lg in &mut groups {
        let mut total = ExecutionTotals::default();
        let mut rows = 0;
        for mg in &mut lg.mediums {
            mg.show_subtotal = mg.items.len() > 1;
            mg.row_count = mg.items.len() + usize::from(mg.show_subtotal);
            rows += mg.row_count;
            total.add(mg.subtotal.budget, mg.subtotal.executed, mg.subtotal.month);
        }
        lg.total = total;
        lg.row_count = rows;
        grand_total.add(lg.total.budget, lg.total.executed, lg.total.month);
    }

    Ok(BudgetExecution {
        year,
        month,
        groups,
        grand_total,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashbookLine {
    pub id: i64,
    pub date: NaiveDate,
    pub entry_type: EntryType,
    /// Category name, or the account name for expense lines posted to an account.
    pub item: String,
    pub account_code: Option<String>,
    pub description: String,
    pub amount: Decimal,
    pub bank: Option<String>,
    pub note: String,
    pub order: i64,
    pub linked_transaction_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashbookStatement {
    pub book: BookType,
    pub year: i32,
    pub month: u32,
    pub income: Vec<CashbookLine>,
    pub expense: Vec<CashbookLine>,
    pub income_total: Decimal,
    pub expense_total: Decimal,
    pub prior_balance: Decimal,
    pub next_balance: Decimal,
}

pub fn cashbook_lines(
    conn: &Connection,
    book: BookType,
    year: i32,
    month: u32,
    entry: EntryType,
) -> Result<Vec<CashbookLine>> {
    let mut stmt = conn.prepare(
        "SELECT cb.id, cb.date, cb.entry_type, COALESCE(c.name, a.account_name, ''), a.code,
                cb.description, cb.amount, ba.bank_name, cb.note, cb.sort_order,
                cb.linked_transaction_id
         FROM cashbook cb
         LEFT JOIN cashbook_categories c ON c.id=cb.category_id
         LEFT JOIN accounts a ON a.id=cb.account_id
         LEFT JOIN bank_accounts ba ON ba.id=cb.bank_account_id
         WHERE cb.book_type=?1 AND cb.year=?2 AND cb.month=?3 AND cb.entry_type=?4
         ORDER BY cb.sort_order, cb.id",
    )?;
    let lines = stmt
        .query_map(params![book, year, month, entry], |r| {
            Ok(CashbookLine {
                id: r.get(0)?,
                date: r.get(1)?,
                entry_type: r.get(2)?,
                item: r.get(3)?,
                account_code: r.get(4)?,
                description: r.get(5)?,
                amount: get_decimal(r, 6)?,
                bank: r.get(7)?,
                note: r.get(8)?,
                order: r.get(9)?,
                linked_transaction_id: r.get(10)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lines)
}

/// Carry-forward balance: the next balance frozen in the previous month's
/// snapshot of the same book, zero when that month was never confirmed.
pub fn prior_balance(conn: &Connection, book: BookType, year: i32, month: u32) -> Result<Decimal> {
    let Some(kind) = SnapshotKind::for_book(book) else {
        return Ok(Decimal::ZERO);
    };
    let (py, pm) = prev_period(year, month);
    let prior = snapshots::load(conn, kind, py, pm)?;
    Ok(match prior.map(|s| s.document.payload) {
        Some(SnapshotPayload::Cashbook(st)) => st.next_balance,
        _ => Decimal::ZERO,
    })
}

pub fn cashbook_statement(
    conn: &Connection,
    book: BookType,
    year: i32,
    month: u32,
) -> Result<CashbookStatement> {
    check_period(year, month)?;
    let income = cashbook_lines(conn, book, year, month, EntryType::Income)?;
    let expense = cashbook_lines(conn, book, year, month, EntryType::Expense)?;
    let income_total: Decimal = income.iter().map(|l| l.amount).sum();
    let expense_total: Decimal = expense.iter().map(|l| l.amount).sum();
    let prior_balance = prior_balance(conn, book, year, month)?;
    Ok(CashbookStatement {
        book,
        year,
        month,
        income,
        expense,
        income_total,
        expense_total,
        prior_balance,
        next_balance: prior_balance + income_total - expense_total,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLine {
    pub id: i64,
    pub date: NaiveDate,
    pub day: u32,
    pub account_code: String,
    pub account_name: String,
    pub description: String,
    pub amount: Decimal,
    pub approval_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardStatement {
    pub year: i32,
    pub month: u32,
    pub items: Vec<CardLine>,
    pub total_amount: Decimal,
    pub item_count: usize,
}

/// Card expenses booked in the month, optionally narrowed to one account code.
pub fn card_statement(
    conn: &Connection,
    year: i32,
    month: u32,
    account_code: Option<&str>,
) -> Result<CardStatement> {
    let (_, month_start, next_start) = month_bounds(year, month)?;
    let mut stmt = conn.prepare(
        "SELECT t.id, t.date, a.code, a.account_name, t.description, t.amount, t.approval_number
         FROM transactions t JOIN accounts a ON a.id=t.account_id
         WHERE t.payment_method='CARD' AND t.transaction_type='EXPENSE'
           AND t.date>=?1 AND t.date<?2 AND (?3 IS NULL OR a.code=?3)
         ORDER BY t.date, t.id",
    )?;
    let items = stmt
        .query_map(params![month_start, next_start, account_code], |r| {
            let date: NaiveDate = r.get(1)?;
            Ok(CardLine {
                id: r.get(0)?,
                date,
                day: date.day(),
                account_code: r.get(2)?,
                account_name: r.get(3)?,
                description: r.get(4)?,
                amount: get_decimal(r, 5)?,
                approval_number: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total_amount = items.iter().map(|i| i.amount).sum();
    Ok(CardStatement {
        year,
        month,
        item_count: items.len(),
        items,
        total_amount,
    })
}

fn period_args(sub: &clap::ArgMatches) -> (i32, u32) {
    (
        *sub.get_one::<i32>("year").unwrap(),
        *sub.get_one::<u32>("month").unwrap(),
    )
}

fn print_confirmation(conn: &Connection, kind: SnapshotKind, year: i32, month: u32) -> Result<()> {
    match snapshots::load(conn, kind, year, month)? {
        Some(s) => println!(
            "{} {}-{:02}: confirmed {} by {}",
            kind.label(),
            year,
            month,
            s.confirmed_at.format("%Y-%m-%d %H:%M"),
            if s.confirmed_by.is_empty() { "-" } else { s.confirmed_by.as_str() }
        ),
        None => println!("{} {}-{:02}: live (not confirmed)", kind.label(), year, month),
    }
    Ok(())
}

fn budget(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (year, month) = period_args(sub);
    let report = budget_execution(conn, year, month)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        return Ok(());
    }
    print_confirmation(conn, SnapshotKind::Budget, year, month)?;
    println!("{}", render_budget_execution(&report));
    Ok(())
}

fn totals_cells(t: &ExecutionTotals) -> Vec<String> {
    vec![
        fmt_amount(&t.budget),
        fmt_amount(&t.executed),
        fmt_amount(&t.month),
        fmt_amount(&t.remaining),
        fmt_rate(&t.rate),
    ]
}

pub fn render_budget_execution(report: &BudgetExecution) -> comfy_table::Table {
    let mut rows = Vec::new();
    for lg in &report.groups {
        for mg in &lg.mediums {
            for item in &mg.items {
                let mut row = vec![
                    lg.name.clone(),
                    mg.name.clone(),
                    format!("{} {}", item.code, item.account_name),
                ];
                row.extend(totals_cells(&ExecutionTotals {
                    budget: item.annual_budget,
                    executed: item.cumulative,
                    month: item.monthly,
                    remaining: item.remaining,
                    rate: item.exec_rate,
                }));
                rows.push(row);
            }
            if mg.show_subtotal {
                let mut row = vec![lg.name.clone(), mg.name.clone(), "소계".to_string()];
                row.extend(totals_cells(&mg.subtotal));
                rows.push(row);
            }
        }
        let mut row = vec![lg.name.clone(), String::new(), "합계".to_string()];
        row.extend(totals_cells(&lg.total));
        rows.push(row);
    }
    let mut row = vec!["총계".to_string(), String::new(), String::new()];
    row.extend(totals_cells(&report.grand_total));
    rows.push(row);
    pretty_table(
        &[
            "Large", "Medium", "Account", "Budget", "Executed", "Month", "Remaining", "Rate",
        ],
        rows,
    )
}

fn cashbook(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (year, month) = period_args(sub);
    let book: BookType = sub.get_one::<String>("book").unwrap().parse()?;
    if book == BookType::Deposit {
        return crate::commands::deposits::show(conn, year, month, sub);
    }
    let statement = cashbook_statement(conn, book, year, month)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &statement)? {
        return Ok(());
    }
    if let Some(kind) = SnapshotKind::for_book(book) {
        print_confirmation(conn, kind, year, month)?;
    }
    let (income_rows, expense_rows) = if sub.get_flag("compact") {
        (0, 0)
    } else if book == BookType::Bank {
        BANK_DISPLAY_ROWS
    } else {
        CASH_DISPLAY_ROWS
    };
    print!("{}", render_cashbook(&statement, income_rows, expense_rows));
    Ok(())
}

/// Pads `rows` with blank lines up to `min_rows`.
pub fn pad_rows(mut rows: Vec<Vec<String>>, min_rows: usize, width: usize) -> Vec<Vec<String>> {
    while rows.len() < min_rows {
        rows.push(vec![String::new(); width]);
    }
    rows
}

fn line_cells(l: &CashbookLine) -> Vec<String> {
    vec![
        l.date.day().to_string(),
        l.item.clone(),
        l.description.clone(),
        fmt_amount(&l.amount),
        l.bank.clone().unwrap_or_default(),
        l.note.clone(),
    ]
}

pub fn render_cashbook(st: &CashbookStatement, income_rows: usize, expense_rows: usize) -> String {
    const HEADERS: [&str; 6] = ["Day", "Item", "Description", "Amount", "Bank", "Note"];
    let income = pad_rows(st.income.iter().map(line_cells).collect(), income_rows, 6);
    let expense = pad_rows(st.expense.iter().map(line_cells).collect(), expense_rows, 6);
    let summary = vec![
        vec!["Prior balance".to_string(), fmt_amount(&st.prior_balance)],
        vec!["Income".to_string(), fmt_amount(&st.income_total)],
        vec!["Expense".to_string(), fmt_amount(&st.expense_total)],
        vec!["Next balance".to_string(), fmt_amount(&st.next_balance)],
    ];
    format!(
        "{} {}-{:02}\nIncome\n{}\nExpense\n{}\n{}\n",
        st.book.label(),
        st.year,
        st.month,
        pretty_table(&HEADERS, income),
        pretty_table(&HEADERS, expense),
        pretty_table(&["", "Amount"], summary)
    )
}

fn card(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (year, month) = period_args(sub);
    let account = sub.get_one::<String>("account").map(|s| s.trim());
    let statement = card_statement(conn, year, month, account)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &statement)? {
        return Ok(());
    }
    print_confirmation(conn, SnapshotKind::CardExpense, year, month)?;
    println!("{}", render_card(&statement));
    Ok(())
}

pub fn render_card(st: &CardStatement) -> comfy_table::Table {
    let mut rows: Vec<Vec<String>> = st
        .items
        .iter()
        .map(|i| {
            vec![
                i.id.to_string(),
                i.date.to_string(),
                format!("{} {}", i.account_code, i.account_name),
                i.description.clone(),
                fmt_amount(&i.amount),
                i.approval_number.clone(),
            ]
        })
        .collect();
    rows.push(vec![
        String::new(),
        format!("{} items", st.item_count),
        String::new(),
        "합계".to_string(),
        fmt_amount(&st.total_amount),
        String::new(),
    ]);
    pretty_table(
        &["ID", "Date", "Account", "Merchant", "Amount", "Approval"],
        rows,
    )
}
