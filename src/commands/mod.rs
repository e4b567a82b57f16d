// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod assets;
pub mod backup;
pub mod bank_accounts;
pub mod budgets;
pub mod cashbook;
pub mod categories;
pub mod config;
pub mod deposits;
pub mod doctor;
pub mod exporter;
pub mod importer;
pub mod members;
pub mod reports;
pub mod settlements;
pub mod snapshots;
pub mod transactions;
