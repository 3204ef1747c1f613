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

//! Runtime-checked database types
//!
//! This module provides the implementation of [`AnyDatabase`] which allows switching the
//! inner [`Database`] type at runtime.
//!
//! ## Example
//!
//! In this example, `scanner_memory` and `scanner_sled` have the same type of
//! `Scanner<RpcBlockchain, AnyDatabase>`.
//!
//! ```no_run
//! # use deposit_scanner::blockchain::{RpcBlockchain, RpcConfig, ConfigurableBlockchain};
//! # use deposit_scanner::database::{AnyDatabase, MemoryDatabase};
//! # use deposit_scanner::{Scanner, ScanParams};
//! # let config: RpcConfig = serde_json::from_str("...")?;
//! let memory = MemoryDatabase::default();
//! let scanner_memory = Scanner::new(
//!     RpcBlockchain::from_config(&config)?,
//!     AnyDatabase::from(memory),
//!     ScanParams::default(),
//! );
//!
//! # #[cfg(feature = "key-value-db")]
//! # {
//! let sled = sled::open("my-database")?.open_tree("default_tree")?;
//! let scanner_sled = Scanner::new(
//!     RpcBlockchain::from_config(&config)?,
//!     AnyDatabase::from(sled),
//!     ScanParams::default(),
//! );
//! # }
//! # Ok::<(), deposit_scanner::Error>(())
//! ```
//!
//! When paired with the use of [`ConfigurableDatabase`], it allows creating scanners with any
//! database supported using a single line of code:
//!
//! ```no_run
//! # use deposit_scanner::database::*;
//! let config = serde_json::from_str("...")?;
//! let database = AnyDatabase::from_config(&config)?;
//! # Ok::<(), deposit_scanner::Error>(())
//! ```

use super::*;

macro_rules! impl_from {
    ( $from:ty, $to:ty, $variant:ident, $( $cfg:tt )* ) => {
        $( $cfg )*
        impl From<$from> for $to {
            fn from(inner: $from) -> Self {
                <$to>::$variant(inner)
            }
        }
    };
}

macro_rules! impl_inner_method {
    ( $enum_name:ident, $self:expr, $name:ident $(, $args:expr)* ) => {
        match $self {
            $enum_name::Memory(inner) => inner.$name( $($args, )* ),
            #[cfg(feature = "key-value-db")]
            $enum_name::Sled(inner) => inner.$name( $($args, )* ),
            #[cfg(feature = "sqlite")]
            $enum_name::Sqlite(inner) => inner.$name( $($args, )* ),
        }
    }
}

/// Type that can contain any of the [`Database`] types defined by the library
///
/// It allows switching database type at runtime.
///
/// See [this module](crate::database::any)'s documentation for a usage example.
#[derive(Debug)]
pub enum AnyDatabase {
    /// In-memory ephemeral database
    Memory(memory::MemoryDatabase),
    #[cfg(feature = "key-value-db")]
    #[cfg_attr(docsrs, doc(cfg(feature = "key-value-db")))]
    /// Simple key-value embedded database based on [`sled`]
    Sled(sled::Tree),
    #[cfg(feature = "sqlite")]
    #[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
    /// Sqlite embedded database using [`rusqlite`]
    Sqlite(sqlite::SqliteDatabase),
}

impl_from!(memory::MemoryDatabase, AnyDatabase, Memory,);
impl_from!(sled::Tree, AnyDatabase, Sled, #[cfg(feature = "key-value-db")]);
impl_from!(sqlite::SqliteDatabase, AnyDatabase, Sqlite, #[cfg(feature = "sqlite")]);

impl AddressDirectory for AnyDatabase {
    fn set_tracked_address(&self, address: &TrackedAddress) -> Result<(), Error> {
        impl_inner_method!(AnyDatabase, self, set_tracked_address, address)
    }

    fn get_tracked_address(
        &self,
        chain: &str,
        asset_code: &str,
        address: &str,
    ) -> Result<Option<TrackedAddress>, Error> {
        impl_inner_method!(
            AnyDatabase,
            self,
            get_tracked_address,
            chain,
            asset_code,
            address
        )
    }

    fn iter_tracked_addresses(
        &self,
        chain: &str,
        asset_code: &str,
    ) -> Result<Vec<TrackedAddress>, Error> {
        impl_inner_method!(AnyDatabase, self, iter_tracked_addresses, chain, asset_code)
    }
}

impl DepositLedger for AnyDatabase {
    fn record_deposit_if_absent(&self, deposit: &Deposit) -> Result<bool, Error> {
        impl_inner_method!(AnyDatabase, self, record_deposit_if_absent, deposit)
    }

    fn get_deposit(&self, txid: &Txid) -> Result<Option<Deposit>, Error> {
        impl_inner_method!(AnyDatabase, self, get_deposit, txid)
    }

    fn iter_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error> {
        impl_inner_method!(AnyDatabase, self, iter_deposits, filter)
    }
}

impl ScanState for AnyDatabase {
    fn insert_pending_block(&self, chain: &str, height: u32) -> Result<bool, Error> {
        impl_inner_method!(AnyDatabase, self, insert_pending_block, chain, height)
    }

    fn mark_scanned(&self, chain: &str, height: u32) -> Result<(), Error> {
        impl_inner_method!(AnyDatabase, self, mark_scanned, chain, height)
    }

    fn get_scan_record(&self, chain: &str, height: u32) -> Result<Option<BlockScanRecord>, Error> {
        impl_inner_method!(AnyDatabase, self, get_scan_record, chain, height)
    }

    fn iter_pending_blocks(&self, chain: &str) -> Result<Vec<BlockScanRecord>, Error> {
        impl_inner_method!(AnyDatabase, self, iter_pending_blocks, chain)
    }
}

/// Configuration type for a [`sled::Tree`] database
#[cfg(feature = "key-value-db")]
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SledDbConfiguration {
    /// Main directory of the db
    pub path: String,
    /// Name of the database tree, a separated namespace for the data
    pub tree_name: String,
}

#[cfg(feature = "key-value-db")]
impl ConfigurableDatabase for sled::Tree {
    type Config = SledDbConfiguration;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        Ok(sled::open(&config.path)?.open_tree(&config.tree_name)?)
    }
}

/// Configuration type for a [`SqliteDatabase`] database
#[cfg(feature = "sqlite")]
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SqliteDbConfiguration {
    /// Main directory of the db
    pub path: String,
}

/// Type that can contain any of the database configurations defined by the library
///
/// This allows storing a single configuration that can be loaded into an [`AnyDatabase`]
/// instance, for example as part of a [`ScannerConfig`](crate::ScannerConfig).
///
/// This type can be serialized from a JSON object like:
///
/// ```
/// # #[cfg(feature = "key-value-db")]
/// # {
/// use deposit_scanner::database::{any::SledDbConfiguration, AnyDatabaseConfig};
/// let config: AnyDatabaseConfig = serde_json::from_str(
///     r#"{ "sled": { "path": "/tmp/deposits", "tree_name": "bitcoin" } }"#,
/// )
/// .unwrap();
/// assert_eq!(
///     config,
///     AnyDatabaseConfig::Sled(SledDbConfiguration {
///         path: "/tmp/deposits".into(),
///         tree_name: "bitcoin".into(),
///     })
/// );
/// # }
/// ```
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AnyDatabaseConfig {
    /// Memory database has no config
    Memory(()),
    #[cfg(feature = "key-value-db")]
    #[cfg_attr(docsrs, doc(cfg(feature = "key-value-db")))]
    /// Simple key-value embedded database based on [`sled`]
    Sled(SledDbConfiguration),
    #[cfg(feature = "sqlite")]
    #[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
    /// Sqlite embedded database using [`rusqlite`]
    Sqlite(SqliteDbConfiguration),
}

impl ConfigurableDatabase for AnyDatabase {
    type Config = AnyDatabaseConfig;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        Ok(match config {
            AnyDatabaseConfig::Memory(inner) => {
                AnyDatabase::Memory(memory::MemoryDatabase::from_config(inner)?)
            }
            #[cfg(feature = "key-value-db")]
            AnyDatabaseConfig::Sled(inner) => AnyDatabase::Sled(sled::Tree::from_config(inner)?),
            #[cfg(feature = "sqlite")]
            AnyDatabaseConfig::Sqlite(inner) => {
                AnyDatabase::Sqlite(sqlite::SqliteDatabase::from_config(inner)?)
            }
        })
    }
}

impl_from!((), AnyDatabaseConfig, Memory,);
impl_from!(SledDbConfiguration, AnyDatabaseConfig, Sled, #[cfg(feature = "key-value-db")]);
impl_from!(SqliteDbConfiguration, AnyDatabaseConfig, Sqlite, #[cfg(feature = "sqlite")]);
