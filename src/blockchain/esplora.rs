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

//! Esplora
//!
//! This module defines a [`EsploraBlockchain`] struct that reads blocks and transactions from an
//! Esplora backend, by way of the blocking `ureq` HTTP client.
//!
//! ## Example
//!
//! ```no_run
//! # use deposit_scanner::blockchain::esplora::EsploraBlockchain;
//! let blockchain = EsploraBlockchain::new(
//!     "https://blockstream.info/testnet/api",
//!     bitcoin::Network::Testnet,
//! );
//! # Ok::<(), deposit_scanner::Error>(())
//! ```

use std::fmt;
use std::io;
use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use ureq::{Agent, Response};

use bitcoin::consensus::{self, deserialize};
use bitcoin::{BlockHash, Network, Transaction, Txid};

use crate::blockchain::*;

/// Errors that can happen while talking to an Esplora server
#[derive(Debug)]
pub enum EsploraError {
    /// Error during ureq HTTP request
    Ureq(::ureq::Error),
    /// HTTP response error
    HttpResponse(u16),
    /// IO error during ureq response read
    Io(io::Error),
    /// Invalid number returned
    Parsing(std::num::ParseIntError),
    /// Invalid Bitcoin data returned
    BitcoinEncoding(bitcoin::consensus::encode::Error),
    /// Invalid Hex data returned
    Hex(bitcoin::hashes::hex::Error),

    /// Transaction not found
    TransactionNotFound(Txid),
    /// Header height not found
    HeaderHeightNotFound(u32),
}

impl fmt::Display for EsploraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for EsploraError {}

impl_error!(io::Error, Io, EsploraError);
impl_error!(std::num::ParseIntError, Parsing, EsploraError);
impl_error!(consensus::encode::Error, BitcoinEncoding, EsploraError);
impl_error!(bitcoin::hashes::hex::Error, Hex, EsploraError);

impl From<EsploraError> for Error {
    fn from(other: EsploraError) -> Self {
        match other {
            EsploraError::TransactionNotFound(txid) => Error::TransactionNotFound(txid),
            EsploraError::HeaderHeightNotFound(height) => Error::BlockNotFound(height),
            EsploraError::Ureq(e) => Error::ChainUnavailable(e.to_string()),
            EsploraError::Io(e) => Error::ChainUnavailable(e.to_string()),
            EsploraError::HttpResponse(code) if code >= 500 => {
                Error::ChainUnavailable(format!("HTTP status {}", code))
            }
            e => Error::Esplora(Box::new(e)),
        }
    }
}

#[derive(Debug)]
struct UrlClient {
    url: String,
    agent: Agent,
}

/// Structure that implements the [`ChainReader`] traits on top of Esplora
///
/// ## Example
/// See the [`blockchain::esplora`](crate::blockchain::esplora) module for a usage example.
#[derive(Debug)]
pub struct EsploraBlockchain {
    url_client: UrlClient,
    network: Network,
}

impl EsploraBlockchain {
    /// Create a new instance of the client from a base URL and the network it serves
    pub fn new(base_url: &str, network: Network) -> Self {
        EsploraBlockchain {
            url_client: UrlClient {
                url: base_url.trim_end_matches('/').to_string(),
                agent: Agent::new(),
            },
            network,
        }
    }

    /// Set the inner `ureq` agent.
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.url_client.agent = agent;
        self
    }
}

impl GetHeight for EsploraBlockchain {
    fn get_height(&self) -> Result<u32, Error> {
        Ok(self.url_client._get_height()?)
    }
}

impl GetBlock for EsploraBlockchain {
    fn get_block(&self, height: u32) -> Result<ChainBlock, Error> {
        let hash = self.url_client._get_block_hash(height)?;
        let txids = self.url_client._get_block_txids(&hash, height)?;
        debug!("block {} at height {} has {} txs", hash, height, txids.len());

        Ok(ChainBlock {
            height,
            hash,
            txids,
        })
    }
}

impl GetTx for EsploraBlockchain {
    fn get_tx(
        &self,
        txid: &Txid,
        _block_hash: Option<&BlockHash>,
    ) -> Result<ChainTransaction, Error> {
        let tx = self.url_client._get_tx_no_opt(txid)?;
        Ok(ChainTransaction::from_tx(&tx, self.network))
    }
}

impl UrlClient {
    fn _get_tx(&self, txid: &Txid) -> Result<Option<Transaction>, EsploraError> {
        let resp = self
            .agent
            .get(&format!("{}/tx/{}/raw", self.url, txid))
            .call();

        match resp {
            Ok(resp) => Ok(Some(deserialize(&into_bytes(resp)?)?)),
            Err(ureq::Error::Status(code, _)) => {
                if is_status_not_found(code) {
                    return Ok(None);
                }
                Err(EsploraError::HttpResponse(code))
            }
            Err(e) => Err(EsploraError::Ureq(e)),
        }
    }

    fn _get_tx_no_opt(&self, txid: &Txid) -> Result<Transaction, EsploraError> {
        match self._get_tx(txid) {
            Ok(Some(tx)) => Ok(tx),
            Ok(None) => Err(EsploraError::TransactionNotFound(*txid)),
            Err(e) => Err(e),
        }
    }

    fn _get_block_hash(&self, block_height: u32) -> Result<BlockHash, EsploraError> {
        let resp = self
            .agent
            .get(&format!("{}/block-height/{}", self.url, block_height))
            .call();

        match resp {
            Ok(resp) => Ok(BlockHash::from_str(resp.into_string()?.trim())?),
            Err(ureq::Error::Status(code, _)) if is_status_not_found(code) => {
                Err(EsploraError::HeaderHeightNotFound(block_height))
            }
            Err(ureq::Error::Status(code, _)) => Err(EsploraError::HttpResponse(code)),
            Err(e) => Err(EsploraError::Ureq(e)),
        }
    }

    fn _get_block_txids(
        &self,
        hash: &BlockHash,
        block_height: u32,
    ) -> Result<Vec<Txid>, EsploraError> {
        let resp = self
            .agent
            .get(&format!("{}/block/{}/txids", self.url, hash))
            .call();

        match resp {
            Ok(resp) => {
                let txids: Vec<Txid> = resp.into_json()?;
                Ok(txids)
            }
            // the block was reorged out between the two requests
            Err(ureq::Error::Status(code, _)) if is_status_not_found(code) => {
                Err(EsploraError::HeaderHeightNotFound(block_height))
            }
            Err(ureq::Error::Status(code, _)) => Err(EsploraError::HttpResponse(code)),
            Err(e) => Err(EsploraError::Ureq(e)),
        }
    }

    fn _get_height(&self) -> Result<u32, EsploraError> {
        let resp = self
            .agent
            .get(&format!("{}/blocks/tip/height", self.url))
            .call();

        match resp {
            Ok(resp) => Ok(resp.into_string()?.trim().parse()?),
            Err(ureq::Error::Status(code, _)) => Err(EsploraError::HttpResponse(code)),
            Err(e) => Err(EsploraError::Ureq(e)),
        }
    }
}

fn is_status_not_found(status: u16) -> bool {
    status == 404
}

fn into_bytes(resp: Response) -> Result<Vec<u8>, io::Error> {
    const BYTES_LIMIT: usize = 10 * 1_024 * 1_024;

    let mut buf: Vec<u8> = vec![];
    resp.into_reader()
        .take((BYTES_LIMIT + 1) as u64)
        .read_to_end(&mut buf)?;
    if buf.len() > BYTES_LIMIT {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "response too big for into_bytes",
        ));
    }

    Ok(buf)
}

/// Configuration for an [`EsploraBlockchain`]
#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq)]
pub struct EsploraBlockchainConfig {
    /// Base URL of the esplora service eg. `https://blockstream.info/api/`
    pub base_url: String,
    /// Network the esplora service is running on
    pub network: Network,
    /// Socket timeout, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl EsploraBlockchainConfig {
    /// create a config with default values given the base url and network
    pub fn new(base_url: String, network: Network) -> Self {
        Self {
            base_url,
            network,
            timeout: None,
        }
    }
}

impl ConfigurableBlockchain for EsploraBlockchain {
    type Config = EsploraBlockchainConfig;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        let mut agent_builder = ureq::AgentBuilder::new();
        if let Some(timeout) = config.timeout {
            agent_builder = agent_builder.timeout(Duration::from_secs(timeout));
        }

        Ok(
            EsploraBlockchain::new(config.base_url.as_str(), config.network)
                .with_agent(agent_builder.build()),
        )
    }
}
