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

use std::fmt;

use bitcoin::{Network, Txid};

/// Errors that can be thrown by the [`Scanner`](crate::Scanner) and its collaborators
///
/// None of these errors is fatal: a scan that fails leaves the block unscanned so that it can be
/// retried later.
#[derive(Debug)]
pub enum Error {
    /// Generic error
    Generic(String),
    /// The chain node could not be reached
    ChainUnavailable(String),
    /// The requested block height is above the tip or unknown to the node
    BlockNotFound(u32),
    /// The node could not resolve a transaction, usually transient
    TransactionNotFound(Txid),
    /// The address directory could not be queried
    AddressLookupFailure(String),
    /// The node is running on a different network than the one requested
    InvalidNetwork {
        /// requested network, for example what is given in the configuration
        requested: Network,
        /// found network, for example the network of the bitcoin node
        found: Network,
    },

    /// Progress value must be between `0.0` (included) and `100.0` (included)
    InvalidProgressValue(f32),
    /// Progress update error (maybe the channel has been closed)
    ProgressUpdateError,

    /// Encoding error
    Encode(bitcoin::consensus::encode::Error),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),

    #[cfg(feature = "esplora")]
    /// Esplora client error
    Esplora(Box<crate::blockchain::esplora::EsploraError>),
    #[cfg(feature = "key-value-db")]
    /// Sled database error
    Sled(sled::Error),
    #[cfg(feature = "rpc")]
    /// Rpc client error
    Rpc(bitcoincore_rpc::Error),
    #[cfg(feature = "sqlite")]
    /// Rusqlite client error
    Rusqlite(rusqlite::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::ChainUnavailable(err) => write!(f, "Chain unavailable: {}", err),
            Self::BlockNotFound(height) => write!(f, "Block not found at height {}", height),
            Self::TransactionNotFound(txid) => write!(f, "Transaction not found: {}", txid),
            Self::AddressLookupFailure(err) => write!(f, "Address lookup failure: {}", err),
            Self::InvalidNetwork { requested, found } => write!(
                f,
                "Invalid network: requested {} but found {}",
                requested, found
            ),
            Self::InvalidProgressValue(progress) => {
                write!(f, "Invalid progress value: {}", progress)
            }
            Self::ProgressUpdateError => write!(
                f,
                "Progress update error (maybe the channel has been closed)"
            ),
            Self::Encode(err) => write!(f, "Encoding error: {}", err),
            Self::Json(err) => write!(f, "Serialize/Deserialize JSON error: {}", err),
            #[cfg(feature = "esplora")]
            Self::Esplora(err) => write!(f, "Esplora client error: {}", err),
            #[cfg(feature = "key-value-db")]
            Self::Sled(err) => write!(f, "Sled database error: {}", err),
            #[cfg(feature = "rpc")]
            Self::Rpc(err) => write!(f, "RPC client error: {}", err),
            #[cfg(feature = "sqlite")]
            Self::Rusqlite(err) => write!(f, "SQLite error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(bitcoin::consensus::encode::Error, Encode);
impl_error!(serde_json::Error, Json);

#[cfg(feature = "key-value-db")]
impl_error!(sled::Error, Sled);
#[cfg(feature = "rpc")]
impl_error!(bitcoincore_rpc::Error, Rpc);
#[cfg(feature = "sqlite")]
impl_error!(rusqlite::Error, Rusqlite);
