// Bitcoin Dev Kit
// Written in 2020 by Alekos Filini <alekos.filini@gmail.com>
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Command line interface
//!
//! This module provides the [`clap`] application used by the `deposit-scanner` binary and the
//! function that runs its subcommands against a [`Scanner`]. Every command prints its result as
//! JSON.

use std::str::FromStr;

use clap::{App, Arg, ArgMatches, SubCommand};

#[allow(unused_imports)]
use log::{debug, error, info, trace, LevelFilter};

use serde_json::json;

use crate::blockchain::{log_progress, ChainReader};
use crate::database::Database;
use crate::error::Error;
use crate::types::{DepositFilter, TrackedAddress};
use crate::Scanner;

fn height_validator(s: String) -> Result<(), String> {
    u32::from_str(&s).map(|_| ()).map_err(|e| e.to_string())
}

fn parse_height(matches: &ArgMatches<'_>, name: &str) -> Result<Option<u32>, Error> {
    matches
        .value_of(name)
        .map(|s| u32::from_str(s).map_err(|e| Error::Generic(e.to_string())))
        .transpose()
}

fn height_arg<'a, 'b>(name: &'a str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .value_name("HEIGHT")
        .takes_value(true)
        .validator(height_validator)
}

/// Build the subcommands understood by [`handle_matches`]
pub fn make_cli_subcommands<'a, 'b>() -> App<'a, 'b> {
    App::new("Deposit Scanner")
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"))
        .author(option_env!("CARGO_PKG_AUTHORS").unwrap_or(""))
        .about("Detects and records incoming deposits to tracked addresses")
        .subcommand(
            SubCommand::with_name("height").about("Returns the current height of the chain tip"),
        )
        .subcommand(
            SubCommand::with_name("scan")
                .about("Scans a block and records the deposits it contains")
                .arg(
                    height_arg("height")
                        .help("Height of the block to scan")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("Returns whether a block has been completely scanned")
                .arg(
                    height_arg("height")
                        .help("Height of the block")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("pending")
                .about("Lists the blocks whose scan was started but never completed"),
        )
        .subcommand(
            SubCommand::with_name("deposits")
                .about("Lists the recorded deposits")
                .arg(
                    Arg::with_name("address")
                        .long("address")
                        .value_name("ADDRESS")
                        .help("Only lists the deposits to this address")
                        .takes_value(true),
                )
                .arg(
                    height_arg("from")
                        .long("from")
                        .help("Only lists the deposits found at or above this height"),
                )
                .arg(
                    height_arg("to")
                        .long("to")
                        .help("Only lists the deposits found at or below this height"),
                ),
        )
        .subcommand(
            SubCommand::with_name("track")
                .about("Adds an address to the tracked addresses")
                .arg(
                    Arg::with_name("address")
                        .value_name("ADDRESS")
                        .help("Address to track")
                        .takes_value(true)
                        .required(true),
                ),
        )
}

/// Add the flags shared by every subcommand
pub fn add_global_flags<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("config")
            .short("c")
            .long("config")
            .value_name("FILE")
            .help("Sets the JSON configuration file")
            .takes_value(true)
            .required(true),
    )
    .arg(
        Arg::with_name("v")
            .short("v")
            .multiple(true)
            .help("Sets the level of verbosity"),
    )
}

/// Return the log level selected with the `-v` flag
pub fn log_level(matches: &ArgMatches<'_>) -> LevelFilter {
    match matches.occurrences_of("v") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Run the subcommand in `matches`
///
/// Returns the JSON output of the command, or `None` if no known subcommand was given.
pub fn handle_matches<B, D>(
    scanner: &Scanner<B, D>,
    matches: ArgMatches<'_>,
) -> Result<Option<String>, Error>
where
    B: ChainReader + 'static,
    D: Database + 'static,
{
    let value = if matches.subcommand_matches("height").is_some() {
        json!({ "height": scanner.get_height()? })
    } else if let Some(sub_matches) = matches.subcommand_matches("scan") {
        let height = parse_height(sub_matches, "height")?
            .ok_or_else(|| Error::Generic("missing height".into()))?;
        serde_json::to_value(scanner.scan_block_with_progress(height, log_progress())?)?
    } else if let Some(sub_matches) = matches.subcommand_matches("status") {
        let height = parse_height(sub_matches, "height")?
            .ok_or_else(|| Error::Generic("missing height".into()))?;
        json!({
            "height": height,
            "completed": scanner.get_scan_status(height)?,
        })
    } else if matches.subcommand_matches("pending").is_some() {
        json!({ "pending": scanner.list_pending_blocks()? })
    } else if let Some(sub_matches) = matches.subcommand_matches("deposits") {
        let filter = DepositFilter {
            chain: Some(scanner.params().chain.clone()),
            asset_code: Some(scanner.params().asset_code.clone()),
            address: sub_matches.value_of("address").map(String::from),
            min_height: parse_height(sub_matches, "from")?,
            max_height: parse_height(sub_matches, "to")?,
        };
        serde_json::to_value(scanner.list_deposits(&filter)?)?
    } else if let Some(sub_matches) = matches.subcommand_matches("track") {
        let address = sub_matches
            .value_of("address")
            .ok_or_else(|| Error::Generic("missing address".into()))?;
        let tracked = TrackedAddress::new(
            scanner.params().chain.as_str(),
            scanner.params().asset_code.as_str(),
            address,
        );
        scanner.database().set_tracked_address(&tracked)?;
        serde_json::to_value(tracked)?
    } else {
        return Ok(None);
    };

    Ok(Some(serde_json::to_string_pretty(&value)?))
}
