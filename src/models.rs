// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::anyhow;
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares an enum persisted as an upper-case code. Parsing accepts the code
/// (any case) or the Korean label used on the paper forms.
macro_rules! code_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($code:literal, $label:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let t = s.trim();
                $(
                    if t.eq_ignore_ascii_case($code) || t == $label {
                        return Ok($name::$variant);
                    }
                )+
                Err(anyhow!(
                    "Invalid {} '{}', expected one of: {}",
                    stringify!($name),
                    t,
                    [$($code),+].join(", ")
                ))
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: anyhow::Error| FromSqlError::Other(e.into()))
            }
        }
    };
}

code_enum!(AccountType {
    Asset => ("ASSET", "자산"),
    Liability => ("LIABILITY", "부채"),
    Equity => ("EQUITY", "자본"),
    Income => ("INCOME", "수입"),
    Expense => ("EXPENSE", "지출"),
});

impl AccountType {
    /// Leading letter of generated account codes.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            AccountType::Asset => "A",
            AccountType::Liability => "L",
            AccountType::Equity => "E",
            AccountType::Income => "I",
            AccountType::Expense => "X",
        }
    }

    /// Accounts a cashbook expense line may be paid against.
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            AccountType::Expense | AccountType::Liability | AccountType::Equity
        )
    }
}

code_enum!(TxnType {
    Income => ("INCOME", "수입"),
    Expense => ("EXPENSE", "지출"),
    Transfer => ("TRANSFER", "대체"),
});

code_enum!(PaymentMethod {
    Cash => ("CASH", "현금"),
    Bank => ("BANK", "예금"),
    Card => ("CARD", "법인카드"),
    Other => ("OTHER", "기타"),
});

code_enum!(TxnStatus {
    Approved => ("APPROVED", "승인"),
    Pending => ("PENDING", "대기"),
});

code_enum!(
    /// Which ledger a cashbook line or category belongs to.
    BookType {
        Bank => ("BANK", "예금출납장"),
        Cash => ("CASH", "현금출납장"),
        Deposit => ("DEPOSIT", "예수금출납장"),
    }
);

code_enum!(EntryType {
    Income => ("INCOME", "수입"),
    Expense => ("EXPENSE", "지출"),
});

code_enum!(
    /// Report family frozen by a monthly snapshot.
    SnapshotKind {
        Budget => ("BUDGET", "예산집행내역"),
        CashbookBank => ("CASHBOOK_BANK", "예금출납장(확정)"),
        CashbookCash => ("CASHBOOK_CASH", "현금출납장(확정)"),
        CardExpense => ("CARD_EXPENSE", "카드사용내역"),
    }
);

impl SnapshotKind {
    pub fn for_book(book: BookType) -> Option<SnapshotKind> {
        match book {
            BookType::Bank => Some(SnapshotKind::CashbookBank),
            BookType::Cash => Some(SnapshotKind::CashbookCash),
            BookType::Deposit => None,
        }
    }
}

code_enum!(PartnerType {
    Member => ("MEMBER", "회원사"),
    General => ("GENERAL", "일반"),
});

code_enum!(DepreciationMethod {
    Straight => ("STRAIGHT", "정액법"),
    Declining => ("DECLINING", "정률법"),
});

code_enum!(SettlementStatus {
    Draft => ("DRAFT", "임시저장"),
    Submitted => ("SUBMITTED", "제출됨"),
    Approved => ("APPROVED", "승인됨"),
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub fiscal_year: i32,
    pub code: String,
    pub category_large: String,
    pub category_medium: String,
    pub category_small: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub is_active: bool,
}

impl Account {
    pub const COLUMNS: &'static str = "id, fiscal_year, code, category_large, category_medium, \
         category_small, account_name, account_type, is_active";

    pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: r.get(0)?,
            fiscal_year: r.get(1)?,
            code: r.get(2)?,
            category_large: r.get(3)?,
            category_medium: r.get(4)?,
            category_small: r.get(5)?,
            account_name: r.get(6)?,
            account_type: r.get(7)?,
            is_active: r.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub fiscal_year: i32,
    pub account_id: i64,
    pub annual_amount: Decimal,
    pub supplementary_amount: Decimal,
}

impl Budget {
    /// Annual plus supplementary appropriation.
    pub fn total_budget(&self) -> Decimal {
        self.annual_amount + self.supplementary_amount
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub transaction_type: TxnType,
    pub account_id: i64,
    pub description: String,
    pub partner_id: Option<i64>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub approval_number: Option<String>,
    pub status: TxnStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashBookCategory {
    pub id: i64,
    pub book_type: BookType,
    pub entry_type: EntryType,
    pub name: String,
    pub order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub order: i64,
    pub is_active: bool,
}

impl fmt::Display for BankAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.bank_name, self.account_number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub business_number: String,
    pub partner_type: PartnerType,
    pub contact_person: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedAsset {
    pub id: i64,
    pub name: String,
    pub acquisition_date: NaiveDate,
    pub acquisition_cost: Decimal,
    pub useful_life: i64,
    pub depreciation_method: DepreciationMethod,
    pub salvage_value: Decimal,
    pub current_value: Decimal,
    pub is_active: bool,
}

impl FixedAsset {
    /// Straight-line annual depreciation; other methods are not computed.
    pub fn annual_depreciation(&self) -> Decimal {
        if self.depreciation_method == DepreciationMethod::Straight && self.useful_life > 0 {
            (self.acquisition_cost - self.salvage_value) / Decimal::from(self.useful_life)
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: i64,
    pub fiscal_year: i32,
    pub closing_date: NaiveDate,
    pub status: SettlementStatus,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_code_or_label() {
        assert_eq!("expense".parse::<AccountType>().unwrap(), AccountType::Expense);
        assert_eq!("지출".parse::<AccountType>().unwrap(), AccountType::Expense);
        assert_eq!(" BANK ".parse::<BookType>().unwrap(), BookType::Bank);
        assert_eq!(
            "cashbook_cash".parse::<SnapshotKind>().unwrap(),
            SnapshotKind::CashbookCash
        );
        let err = "wire".parse::<PaymentMethod>().unwrap_err();
        assert!(err.to_string().contains("Invalid PaymentMethod 'wire'"));
    }

    #[test]
    fn straight_line_depreciation() {
        let asset = FixedAsset {
            id: 1,
            name: "Server".into(),
            acquisition_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            acquisition_cost: Decimal::from(5_000_000),
            useful_life: 5,
            depreciation_method: DepreciationMethod::Straight,
            salvage_value: Decimal::from(500_000),
            current_value: Decimal::from(5_000_000),
            is_active: true,
        };
        assert_eq!(asset.annual_depreciation(), Decimal::from(900_000));

        let declining = FixedAsset {
            depreciation_method: DepreciationMethod::Declining,
            ..asset
        };
        assert!(declining.annual_depreciation().is_zero());
    }

    #[test]
    fn total_budget_adds_supplementary() {
        let b = Budget {
            id: 1,
            fiscal_year: 2025,
            account_id: 1,
            annual_amount: Decimal::from(1_000_000),
            supplementary_amount: Decimal::from(250_000),
        };
        assert_eq!(b.total_budget(), Decimal::from(1_250_000));
    }
}
