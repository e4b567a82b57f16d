// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Domain failures callers may want to tell apart. Everything else travels as
/// a plain `anyhow::Error` with context.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} '{name}' is still referenced by {}; nothing was deleted", .refs.join(", "))]
    Referenced {
        entity: &'static str,
        name: String,
        refs: Vec<String>,
    },

    #[error("{what} for fiscal year {year} already exist; delete the existing data before uploading")]
    DuplicateYear { what: &'static str, year: i32 },

    #[error("Required columns not found. Sheet columns: [{}]", .found.join(", "))]
    MissingColumns { found: Vec<String> },

    #[error("No valid rows found in {0}")]
    NoValidRows(String),

    #[error("No staged import for token '{0}'")]
    UnknownImport(String),

    #[error("{kind} for {year}-{month:02} is not confirmed")]
    NotConfirmed {
        kind: &'static str,
        year: i32,
        month: u32,
    },

    #[error("Invalid period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },
}
