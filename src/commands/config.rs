// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{get_setting, set_setting};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

/// Keys understood by the rest of the application.
pub const KNOWN_KEYS: &[&str] = &["operator"];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let key = sub.get_one::<String>("key").unwrap().trim();
            let value = sub.get_one::<String>("value").unwrap().trim();
            if !KNOWN_KEYS.contains(&key) {
                return Err(anyhow!(
                    "Unknown setting '{}', expected one of: {}",
                    key,
                    KNOWN_KEYS.join(", ")
                ));
            }
            set_setting(conn, key, value)?;
            tracing::info!(key, "setting updated");
            println!("{} = {}", key, value);
        }
        Some(("get", sub)) => {
            let key = sub.get_one::<String>("key").unwrap().trim();
            match get_setting(conn, key)? {
                Some(v) => println!("{}", v),
                None => println!("{} is not set", key),
            }
        }
        _ => {}
    }
    Ok(())
}
