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

use bitcoin::{Address, BlockHash, Network, Transaction, Txid};

use serde::{Deserialize, Serialize};

/// Chain label used for the Bitcoin network
pub const BITCOIN_CHAIN: &str = "bitcoin";
/// Asset code of the native Bitcoin asset
pub const BTC_ASSET_CODE: &str = "BTC";

/// An address the operator monitors for incoming payments
///
/// Unique per `(chain, asset_code, address)`. Tracked addresses are created by an external
/// onboarding process and are read-only from the point of view of the scanner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedAddress {
    /// Chain the address lives on, eg. `bitcoin`
    pub chain: String,
    /// Code of the asset being tracked, eg. `BTC`
    pub asset_code: String,
    /// The address, in its canonical string form
    pub address: String,
}

impl TrackedAddress {
    /// Create a new [`TrackedAddress`]
    pub fn new<C: Into<String>, A: Into<String>, S: Into<String>>(
        chain: C,
        asset_code: A,
        address: S,
    ) -> Self {
        TrackedAddress {
            chain: chain.into(),
            asset_code: asset_code.into(),
            address: address.into(),
        }
    }
}

/// A detected incoming payment to a [`TrackedAddress`]
///
/// There is at most one deposit per `txid`. Deposits are never mutated once recorded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    /// Id of the transaction paying to the tracked address
    pub txid: Txid,
    /// The tracked address that received the payment
    pub tracked_address: TrackedAddress,
    /// Received value (sats)
    pub amount: u64,
    /// Height of the block containing the transaction
    pub height: u32,
    /// Index of the matching output in the transaction
    pub vout: u32,
    /// Timestamp of when the deposit was detected, in seconds since the unix epoch
    pub created_at: u64,
}

/// Per-block scan completion record
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockScanRecord {
    /// Chain the block belongs to
    pub chain: String,
    /// Block height
    pub height: u32,
    /// Whether every transaction in the block has been processed
    pub has_completed_scan: bool,
}

/// Filter used when listing deposits
///
/// Every condition set to `Some` must match. The default filter matches everything.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DepositFilter {
    /// Only return deposits on this chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    /// Only return deposits of this asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    /// Only return deposits to this address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Only return deposits found at or above this height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
    /// Only return deposits found at or below this height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
}

impl DepositFilter {
    /// Return whether `deposit` satisfies every condition of the filter
    pub fn matches(&self, deposit: &Deposit) -> bool {
        let tracked = &deposit.tracked_address;

        self.chain.as_ref().map_or(true, |c| c == &tracked.chain)
            && self
                .asset_code
                .as_ref()
                .map_or(true, |a| a == &tracked.asset_code)
            && self.address.as_ref().map_or(true, |a| a == &tracked.address)
            && self.min_height.map_or(true, |h| deposit.height >= h)
            && self.max_height.map_or(true, |h| deposit.height <= h)
    }
}

/// A block as returned by a [`ChainReader`](crate::blockchain::ChainReader)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    /// Height of the block
    pub height: u32,
    /// Hash of the block
    pub hash: BlockHash,
    /// Ids of the transactions in the block, in block order
    pub txids: Vec<Txid>,
}

/// A transaction output as seen by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutput {
    /// Address the output pays to, `None` for scripts without an address form
    pub address: Option<String>,
    /// Output value (sats)
    pub value: u64,
}

/// A transaction with the raw output data needed for deposit detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    /// Transaction id
    pub txid: Txid,
    /// Outputs, in transaction order
    pub outputs: Vec<ChainOutput>,
}

impl ChainTransaction {
    /// Build a [`ChainTransaction`] from a raw transaction, deriving output addresses for `network`
    pub fn from_tx(tx: &Transaction, network: Network) -> Self {
        ChainTransaction {
            txid: tx.txid(),
            outputs: tx
                .output
                .iter()
                .map(|output| ChainOutput {
                    address: Address::from_script(&output.script_pubkey, network)
                        .map(|a| a.to_string()),
                    value: output.value,
                })
                .collect(),
        }
    }
}

/// Summary of a successful block scan
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Chain the block belongs to
    pub chain: String,
    /// Height of the scanned block
    pub height: u32,
    /// Hash of the scanned block
    pub block_hash: BlockHash,
    /// Number of transactions processed
    pub transactions: usize,
    /// Number of transactions paying to a tracked address
    pub deposits_found: usize,
    /// Number of deposits that were not already in the ledger
    pub deposits_inserted: usize,
}
