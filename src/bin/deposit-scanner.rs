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

use std::fs;
use std::process;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use deposit_scanner::cli;
use deposit_scanner::{Error, Scanner, ScannerConfig};

fn load_config(path: &str) -> Result<ScannerConfig, Error> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Generic(format!("can't read config file {}: {}", path, e)))?;

    Ok(serde_json::from_str(&content)?)
}

fn run() -> Result<Option<String>, Error> {
    let app = cli::make_cli_subcommands();
    let app = cli::add_global_flags(app);
    let matches = app.get_matches();

    env_logger::Builder::from_default_env()
        .filter_level(cli::log_level(&matches))
        .init();

    let config_path = matches
        .value_of("config")
        .ok_or_else(|| Error::Generic("missing config file".into()))?;
    let config = load_config(config_path)?;
    debug!("config: {:?}", config);

    let scanner = Scanner::from_config(&config)?;
    debug!("scanner ready for {}", scanner.params().chain);

    cli::handle_matches(&scanner, matches)
}

fn main() {
    match run() {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => {}
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
