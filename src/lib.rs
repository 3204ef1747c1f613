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

// rustdoc will warn if there are missing docs
#![warn(missing_docs)]
// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A deposit scanner for Bitcoin.
//!
//! The scanner walks confirmed blocks one height at a time, resolves every transaction in the
//! block and records an incoming payment ("deposit") whenever one of the transaction outputs
//! pays to an address the operator is tracking. Each block is marked as fully scanned only after
//! all of its transactions have been processed, so an interrupted scan can always be retried
//! from scratch: deposits are keyed by txid and recording them is idempotent.
//!
//! ## Components
//!
//! * [`blockchain`]: the chain reader traits and the backends implementing them
//! * [`database`]: tracked addresses, the deposit ledger and the per-block scan state
//! * [`scanner`]: the [`Scanner`] that drives the pipeline
//!
//! ## Example
//!
//! ```no_run
//! # use deposit_scanner::blockchain::{ConfigurableBlockchain, RpcBlockchain, RpcConfig, rpc::Auth};
//! # use deposit_scanner::database::MemoryDatabase;
//! # use deposit_scanner::{Scanner, ScanParams};
//! let config = RpcConfig {
//!     url: "127.0.0.1:18332".to_string(),
//!     auth: Auth::Cookie {
//!         file: "/home/user/.bitcoin/testnet3/.cookie".into(),
//!     },
//!     network: bitcoin::Network::Testnet,
//! };
//! let blockchain = RpcBlockchain::from_config(&config)?;
//! let scanner = Scanner::new(blockchain, MemoryDatabase::new(), ScanParams::default());
//!
//! let report = scanner.scan_block(2_000_000)?;
//! println!("found {} deposits", report.deposits_found);
//! # Ok::<(), deposit_scanner::Error>(())
//! ```

pub extern crate bitcoin;
extern crate log;
extern crate serde;
extern crate serde_json;

#[cfg(feature = "key-value-db")]
pub extern crate sled;

#[cfg(feature = "sqlite")]
pub extern crate rusqlite;

#[cfg(feature = "rpc")]
pub extern crate bitcoincore_rpc;

#[cfg(test)]
#[macro_use]
extern crate lazy_static;

#[macro_use]
pub(crate) mod error;
#[cfg(feature = "cli-utils")]
pub mod cli;
pub mod blockchain;
pub mod database;
pub mod scanner;
pub(crate) mod types;

#[cfg(test)]
pub(crate) mod testutils;

pub use error::Error;
pub use scanner::{ScanParams, Scanner};
#[cfg(any(feature = "rpc", feature = "esplora"))]
pub use scanner::ScannerConfig;
pub use types::*;
