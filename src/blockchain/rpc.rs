// Bitcoin Dev Kit
// Written in 2021 by Riccardo Casatta <riccardo@casatta.it>
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Rpc Blockchain
//!
//! Backend that gets blockchain data from Bitcoin Core RPC
//!
//! The node doesn't need `-txindex`: the scanner always passes the hash of the block containing
//! the transaction, which `getrawtransaction` accepts as a lookup hint.
//!
//! ## Example
//!
//! ```no_run
//! # use deposit_scanner::blockchain::{RpcConfig, RpcBlockchain, ConfigurableBlockchain, rpc::Auth};
//! let config = RpcConfig {
//!     url: "127.0.0.1:18332".to_string(),
//!     auth: Auth::Cookie {
//!         file: "/home/user/.bitcoin/.cookie".into(),
//!     },
//!     network: bitcoin::Network::Testnet,
//! };
//! let blockchain = RpcBlockchain::from_config(&config);
//! ```

use std::path::PathBuf;

use bitcoin::{BlockHash, Network, Txid};
use bitcoincore_rpc::jsonrpc;
use bitcoincore_rpc::Auth as RpcAuth;
use bitcoincore_rpc::{Client, RpcApi};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::blockchain::*;

/// `RPC_INVALID_ADDRESS_OR_KEY`, returned for unknown blocks and transactions
const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;
/// `RPC_INVALID_PARAMETER`, returned for block heights out of range
const RPC_INVALID_PARAMETER: i32 = -8;

/// The main struct for RPC backend implementing the [`ChainReader`] trait
#[derive(Debug)]
pub struct RpcBlockchain {
    /// Rpc client to the node
    client: Client,
    /// Network used to turn output scripts into addresses
    network: Network,
}

/// RpcBlockchain configuration options
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcConfig {
    /// The bitcoin node url
    pub url: String,
    /// The bitcoin node authentication mechanism
    pub auth: Auth,
    /// The network we are using (it will be checked the bitcoin node network matches this)
    pub network: Network,
}

/// This struct is equivalent to [bitcoincore_rpc::Auth] but it implements [serde::Serialize]
/// To be removed once upstream equivalent is implementing Serialize (json serialization format
/// should be the same), see [rust-bitcoincore-rpc/pull/181](https://github.com/rust-bitcoin/rust-bitcoincore-rpc/pull/181)
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(untagged)]
pub enum Auth {
    /// None authentication
    None,
    /// Authentication with username and password, usually [Auth::Cookie] should be preferred
    UserPass {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Authentication with a cookie file
    Cookie {
        /// Cookie file
        file: PathBuf,
    },
}

impl From<Auth> for RpcAuth {
    fn from(auth: Auth) -> Self {
        match auth {
            Auth::None => RpcAuth::None,
            Auth::UserPass { username, password } => RpcAuth::UserPass(username, password),
            Auth::Cookie { file } => RpcAuth::CookieFile(file),
        }
    }
}

impl RpcBlockchain {
    /// Build a new instance given a client and the network its addresses belong to
    ///
    /// Unlike [`RpcBlockchain::from_config`] this doesn't check the node network.
    pub fn from_client(client: Client, network: Network) -> Self {
        RpcBlockchain { client, network }
    }
}

impl GetHeight for RpcBlockchain {
    fn get_height(&self) -> Result<u32, Error> {
        self.client
            .get_block_count()
            .map(|count| count as u32)
            .map_err(|e| Error::ChainUnavailable(e.to_string()))
    }
}

impl GetBlock for RpcBlockchain {
    fn get_block(&self, height: u32) -> Result<ChainBlock, Error> {
        let hash = self
            .client
            .get_block_hash(height as u64)
            .map_err(|e| map_rpc_error(e, Error::BlockNotFound(height)))?;
        let info = self
            .client
            .get_block_info(&hash)
            .map_err(|e| map_rpc_error(e, Error::BlockNotFound(height)))?;
        debug!("block {} at height {} has {} txs", hash, height, info.tx.len());

        Ok(ChainBlock {
            height,
            hash,
            txids: info.tx,
        })
    }
}

impl GetTx for RpcBlockchain {
    fn get_tx(
        &self,
        txid: &Txid,
        block_hash: Option<&BlockHash>,
    ) -> Result<ChainTransaction, Error> {
        let tx = self
            .client
            .get_raw_transaction(txid, block_hash)
            .map_err(|e| map_rpc_error(e, Error::TransactionNotFound(*txid)))?;

        Ok(ChainTransaction::from_tx(&tx, self.network))
    }
}

impl ConfigurableBlockchain for RpcBlockchain {
    type Config = RpcConfig;

    /// Returns RpcBlockchain backend creating an RPC client to the node, after checking the node
    /// is running on the configured network
    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        debug!("connecting to {} auth:{:?}", config.url, config.auth);
        let client = Client::new(config.url.clone(), config.auth.clone().into())?;

        let blockchain_info = client.get_blockchain_info()?;
        let network = match blockchain_info.chain.as_str() {
            "main" => Network::Bitcoin,
            "test" => Network::Testnet,
            "regtest" => Network::Regtest,
            "signet" => Network::Signet,
            _ => return Err(Error::Generic("Invalid network".to_string())),
        };
        if network != config.network {
            return Err(Error::InvalidNetwork {
                requested: config.network,
                found: network,
            });
        }

        Ok(RpcBlockchain {
            client,
            network: config.network,
        })
    }
}

/// Map a client error to the scanner taxonomy
///
/// Lookup failures reported by the node become `not_found`, everything else means the node
/// couldn't serve the request.
fn map_rpc_error(err: bitcoincore_rpc::Error, not_found: Error) -> Error {
    match err {
        bitcoincore_rpc::Error::JsonRpc(jsonrpc::error::Error::Rpc(ref e))
            if e.code == RPC_INVALID_ADDRESS_OR_KEY || e.code == RPC_INVALID_PARAMETER =>
        {
            debug!("rpc lookup failed: {}", e.message);
            not_found
        }
        e => Error::ChainUnavailable(e.to_string()),
    }
}
