// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn year_arg() -> Arg {
    Arg::new("year")
        .long("year")
        .required(true)
        .value_parser(value_parser!(i32))
        .help("Fiscal year, e.g. 2025")
}

fn month_arg() -> Arg {
    Arg::new("month")
        .long("month")
        .required(true)
        .value_parser(value_parser!(u32).range(1..=12))
        .help("Month 1-12")
}

fn json_args() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as a JSON array"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print as JSON lines"),
    ]
}

fn path_arg(help: &'static str) -> Arg {
    Arg::new("path").long("path").required(true).help(help)
}

fn active_arg() -> Arg {
    Arg::new("active")
        .long("active")
        .required(true)
        .value_parser(["yes", "no"])
}

fn compact_arg() -> Arg {
    Arg::new("compact")
        .long("compact")
        .action(ArgAction::SetTrue)
        .help("Do not pad sections to the printed form length")
}

fn book_arg(help: &'static str) -> Arg {
    Arg::new("book").long("book").required(true).help(help)
}

fn kind_arg() -> Arg {
    Arg::new("kind")
        .long("kind")
        .required(true)
        .help("budget | cashbook | bank | cash | card")
}

pub fn build_cli() -> Command {
    Command::new("hoegye")
        .about("Nonprofit bookkeeping: accounts, budgets, cashbooks, card imports and monthly reports")
        .version(clap::crate_version!())
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("config")
                .about("Stored settings")
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(Command::new("get").arg(Arg::new("key").required(true))),
        )
        .subcommand(
            Command::new("account")
                .about("Chart of accounts per fiscal year")
                .subcommand(
                    Command::new("add")
                        .arg(year_arg())
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .required(true)
                                .help("ASSET|LIABILITY|EQUITY|INCOME|EXPENSE"),
                        )
                        .arg(Arg::new("code").long("code").help("Generated from the type when omitted"))
                        .arg(Arg::new("large").long("large"))
                        .arg(Arg::new("medium").long("medium"))
                        .arg(Arg::new("small").long("small"))
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(
                    Command::new("list")
                        .arg(year_arg())
                        .arg(Arg::new("type").long("type"))
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(year_arg())
                        .arg(Arg::new("code").long("code").required(true)),
                )
                .subcommand(
                    Command::new("set-active")
                        .arg(year_arg())
                        .arg(Arg::new("code").long("code").required(true))
                        .arg(active_arg()),
                )
                .subcommand(
                    Command::new("upload")
                        .about("Register accounts from a sheet (계정유형, 계정명, ...)")
                        .arg(year_arg())
                        .arg(path_arg("Spreadsheet or CSV file")),
                )
                .subcommand(
                    Command::new("delete-year")
                        .about("Delete a fiscal year's accounts, budgets and transactions")
                        .arg(year_arg())
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .action(ArgAction::SetTrue)
                                .help("Also delete the year's transactions"),
                        ),
                ),
        )
        .subcommand(
            Command::new("budget")
                .about("Annual budgets")
                .subcommand(
                    Command::new("upload")
                        .about("Create expense accounts and budgets from a budget sheet")
                        .arg(year_arg())
                        .arg(path_arg("Spreadsheet or CSV file")),
                )
                .subcommand(
                    Command::new("set")
                        .arg(year_arg())
                        .arg(Arg::new("code").long("code").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("supplementary").long("supplementary"))
                        .arg(Arg::new("rename").long("rename").help("New account name")),
                )
                .subcommand(Command::new("list").arg(year_arg()).args(json_args()))
                .subcommand(
                    Command::new("rm")
                        .arg(year_arg())
                        .arg(Arg::new("code").long("code").required(true)),
                ),
        )
        .subcommand(
            Command::new("category")
                .about("Cashbook categories")
                .subcommand(
                    Command::new("add")
                        .arg(book_arg("BANK|CASH|DEPOSIT"))
                        .arg(Arg::new("entry").long("entry").required(true).help("INCOME|EXPENSE"))
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("order").long("order").value_parser(value_parser!(i64))),
                )
                .subcommand(
                    Command::new("list")
                        .arg(Arg::new("book").long("book"))
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(book_arg("BANK|CASH|DEPOSIT"))
                        .arg(Arg::new("entry").long("entry").required(true))
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(
                    Command::new("set-active")
                        .arg(book_arg("BANK|CASH|DEPOSIT"))
                        .arg(Arg::new("entry").long("entry").required(true))
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(active_arg()),
                ),
        )
        .subcommand(
            Command::new("bank")
                .about("Bank accounts shown on cashbook lines")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("bank").long("bank").required(true))
                        .arg(Arg::new("number").long("number").required(true))
                        .arg(Arg::new("holder").long("holder"))
                        .arg(Arg::new("order").long("order").value_parser(value_parser!(i64))),
                )
                .subcommand(Command::new("list").args(json_args()))
                .subcommand(
                    Command::new("set-active")
                        .arg(Arg::new("number").long("number").required(true))
                        .arg(active_arg()),
                )
                .subcommand(
                    Command::new("rm").arg(Arg::new("number").long("number").required(true)),
                ),
        )
        .subcommand(
            Command::new("member")
                .about("Member companies and partners")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("type").long("type").help("MEMBER|GENERAL"))
                        .arg(Arg::new("business-number").long("business-number"))
                        .arg(Arg::new("contact").long("contact")),
                )
                .subcommand(Command::new("list").args(json_args()))
                .subcommand(Command::new("rm").arg(Arg::new("name").long("name").required(true))),
        )
        .subcommand(
            Command::new("asset")
                .about("Fixed assets")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("acquired").long("acquired").required(true))
                        .arg(Arg::new("cost").long("cost").required(true))
                        .arg(
                            Arg::new("life")
                                .long("life")
                                .required(true)
                                .value_parser(value_parser!(i64))
                                .help("Useful life in years"),
                        )
                        .arg(Arg::new("method").long("method").help("STRAIGHT|DECLINING"))
                        .arg(Arg::new("salvage").long("salvage")),
                )
                .subcommand(Command::new("list").args(json_args())),
        )
        .subcommand(
            Command::new("settlement")
                .about("Year-end settlements")
                .subcommand(
                    Command::new("open")
                        .arg(year_arg())
                        .arg(Arg::new("closing-date").long("closing-date").required(true))
                        .arg(Arg::new("notes").long("notes")),
                )
                .subcommand(
                    Command::new("status")
                        .arg(year_arg())
                        .arg(
                            Arg::new("status")
                                .long("status")
                                .required(true)
                                .help("DRAFT|SUBMITTED|APPROVED"),
                        ),
                )
                .subcommand(Command::new("list").args(json_args())),
        )
        .subcommand(
            Command::new("tx")
                .about("Transactions")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("account").long("account").required(true).help("Account code"))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("type").long("type").default_value("EXPENSE"))
                        .arg(Arg::new("method").long("method").default_value("BANK"))
                        .arg(Arg::new("status").long("status").default_value("APPROVED"))
                        .arg(Arg::new("desc").long("desc"))
                        .arg(Arg::new("partner").long("partner").help("Member name"))
                        .arg(Arg::new("approval").long("approval").help("Card approval number")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(
                            Arg::new("year")
                                .long("year")
                                .value_parser(value_parser!(i32)),
                        )
                        .arg(
                            Arg::new("month")
                                .long("month")
                                .value_parser(value_parser!(u32).range(1..=12)),
                        )
                        .arg(Arg::new("account").long("account"))
                        .arg(Arg::new("method").long("method"))
                        .arg(Arg::new("type").long("type"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        )
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("rm").about("Delete transactions").arg(
                        Arg::new("id")
                            .required(true)
                            .num_args(1..)
                            .value_parser(value_parser!(i64)),
                    ),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Staged spreadsheet imports")
                .subcommand(
                    Command::new("card")
                        .about("Parse a card statement and stage it for account assignment")
                        .arg(path_arg("Card statement spreadsheet or CSV")),
                )
                .subcommand(
                    Command::new("card-save")
                        .about("Save a staged card statement")
                        .arg(Arg::new("token").long("token").required(true))
                        .arg(
                            Arg::new("assign")
                                .long("assign")
                                .action(ArgAction::Append)
                                .help("INDEX=CODE, repeatable"),
                        )
                        .arg(Arg::new("default").long("default").help("Account code for unassigned rows"))
                        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue)),
                )
                .subcommand(
                    Command::new("discard").arg(Arg::new("token").long("token").required(true)),
                )
                .subcommand(
                    Command::new("staged")
                        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue)),
                ),
        )
        .subcommand(
            Command::new("cashbook")
                .about("Bank and cash books")
                .subcommand(
                    Command::new("save")
                        .about("Replace a month's lines from a CSV (type,day,item,amount,note,bank)")
                        .arg(book_arg("BANK|CASH"))
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(path_arg("CSV of ledger lines"))
                        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue)),
                )
                .subcommand(
                    Command::new("clear")
                        .arg(book_arg("BANK|CASH"))
                        .arg(year_arg())
                        .arg(month_arg()),
                ),
        )
        .subcommand(
            Command::new("deposit")
                .about("Withholding deposit ledger")
                .subcommand(
                    Command::new("save")
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(path_arg("CSV of ledger lines")),
                )
                .subcommand(
                    Command::new("show")
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(compact_arg())
                        .args(json_args()),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Monthly reports")
                .subcommand(
                    Command::new("budget")
                        .about("Budget execution")
                        .arg(year_arg())
                        .arg(month_arg())
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("cashbook")
                        .arg(book_arg("BANK|CASH|DEPOSIT"))
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(compact_arg())
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("card")
                        .about("Card expense statement")
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(Arg::new("account").long("account").help("Account code"))
                        .args(json_args()),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Monthly confirmation")
                .subcommand(
                    Command::new("confirm")
                        .arg(kind_arg())
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(Arg::new("by").long("by").help("Confirmer name")),
                )
                .subcommand(
                    Command::new("cancel")
                        .arg(kind_arg())
                        .arg(year_arg())
                        .arg(month_arg()),
                )
                .subcommand(
                    Command::new("show")
                        .arg(kind_arg())
                        .arg(year_arg())
                        .arg(month_arg())
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("list")
                        .arg(
                            Arg::new("year")
                                .long("year")
                                .value_parser(value_parser!(i32)),
                        )
                        .args(json_args()),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("transactions")
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .required(true)
                                .help("csv|json"),
                        )
                        .arg(Arg::new("out").long("out").required(true))
                        .arg(
                            Arg::new("year")
                                .long("year")
                                .value_parser(value_parser!(i32)),
                        ),
                )
                .subcommand(
                    Command::new("budget")
                        .about("Budget execution for a month")
                        .arg(year_arg())
                        .arg(month_arg())
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .required(true)
                                .help("csv|json"),
                        )
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(
            Command::new("backup")
                .about("Database backups")
                .subcommand(
                    Command::new("create").arg(
                        Arg::new("keep-days")
                            .long("keep-days")
                            .value_parser(value_parser!(i64))
                            .help("Remove backups older than this many days (default 30)"),
                    ),
                )
                .subcommand(Command::new("list")),
        )
        .subcommand(Command::new("doctor").about("Check ledger consistency"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        let res = build_cli().try_get_matches_from([
            "hoegye", "report", "budget", "--year", "2025", "--month", "13",
        ]);
        assert!(res.is_err());
    }
}
