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
#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};

use crate::blockchain::{GetBlock, GetHeight, GetTx};
use crate::database::{AddressDirectory, DepositLedger, MemoryDatabase, ScanState};
use crate::error::Error;
use crate::types::{
    BlockScanRecord, ChainBlock, ChainOutput, ChainTransaction, Deposit, DepositFilter,
    TrackedAddress,
};

#[derive(Clone, Debug)]
pub struct TestIncomingOutput {
    pub value: u64,
    pub to_address: Option<String>,
}

impl TestIncomingOutput {
    pub fn new(value: u64, to_address: &str) -> Self {
        Self {
            value,
            to_address: Some(to_address.to_string()),
        }
    }

    /// An output without an address form, like an `OP_RETURN`
    pub fn unaddressable(value: u64) -> Self {
        Self {
            value,
            to_address: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TestIncomingTx {
    pub txid: Txid,
    pub output: Vec<TestIncomingOutput>,
}

impl TestIncomingTx {
    /// Create a transaction whose txid is derived from `seed`
    pub fn new(seed: &str, output: Vec<TestIncomingOutput>) -> Self {
        Self {
            txid: Txid::hash(seed.as_bytes()),
            output,
        }
    }

    fn to_chain_tx(&self) -> ChainTransaction {
        ChainTransaction {
            txid: self.txid,
            outputs: self
                .output
                .iter()
                .map(|o| ChainOutput {
                    address: o.to_address.clone(),
                    value: o.value,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
struct MockChain {
    blocks: HashMap<u32, ChainBlock>,
    txs: HashMap<Txid, ChainTransaction>,
    failing_txs: HashSet<Txid>,
}

/// Scriptable in-memory chain with failure injection
#[derive(Debug, Default)]
pub struct MockBlockchain {
    chain: RwLock<MockChain>,
    unavailable: AtomicBool,
    tx_requests: AtomicUsize,
}

impl MockBlockchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block at `height` containing `txs`, in order
    pub fn add_block(&self, height: u32, txs: Vec<TestIncomingTx>) -> BlockHash {
        let hash = BlockHash::hash(&height.to_be_bytes());
        let mut chain = self.chain.write().unwrap();

        chain.blocks.insert(
            height,
            ChainBlock {
                height,
                hash,
                txids: txs.iter().map(|tx| tx.txid).collect(),
            },
        );
        for tx in txs {
            chain.txs.insert(tx.txid, tx.to_chain_tx());
        }

        hash
    }

    /// Make every request for `txid` fail with [`Error::ChainUnavailable`]
    pub fn fail_tx(&self, txid: Txid) {
        self.chain.write().unwrap().failing_txs.insert(txid);
    }

    /// Stop failing requests for `txid`
    pub fn heal_tx(&self, txid: &Txid) {
        self.chain.write().unwrap().failing_txs.remove(txid);
    }

    /// Drop `txid` from the node, while blocks keep listing it
    pub fn forget_tx(&self, txid: &Txid) {
        self.chain.write().unwrap().txs.remove(txid);
    }

    /// Make the whole node unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of [`GetTx::get_tx`] calls received so far
    pub fn tx_requests(&self) -> usize {
        self.tx_requests.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::ChainUnavailable("mock node is down".into()));
        }

        Ok(())
    }
}

impl GetHeight for MockBlockchain {
    fn get_height(&self) -> Result<u32, Error> {
        self.check_available()?;
        Ok(self
            .chain
            .read()
            .unwrap()
            .blocks
            .keys()
            .max()
            .copied()
            .unwrap_or(0))
    }
}

impl GetBlock for MockBlockchain {
    fn get_block(&self, height: u32) -> Result<ChainBlock, Error> {
        self.check_available()?;
        self.chain
            .read()
            .unwrap()
            .blocks
            .get(&height)
            .cloned()
            .ok_or(Error::BlockNotFound(height))
    }
}

impl GetTx for MockBlockchain {
    fn get_tx(
        &self,
        txid: &Txid,
        _block_hash: Option<&BlockHash>,
    ) -> Result<ChainTransaction, Error> {
        self.tx_requests.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let chain = self.chain.read().unwrap();
        if chain.failing_txs.contains(txid) {
            return Err(Error::ChainUnavailable(format!(
                "injected failure for {}",
                txid
            )));
        }
        chain
            .txs
            .get(txid)
            .cloned()
            .ok_or(Error::TransactionNotFound(*txid))
    }
}

/// [`MemoryDatabase`] whose address directory can't be reached
///
/// Ledger and scan state calls go through to the inner database.
#[derive(Debug, Default)]
pub struct UnreachableDirectory {
    pub inner: MemoryDatabase,
}

impl UnreachableDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AddressDirectory for UnreachableDirectory {
    fn set_tracked_address(&self, address: &TrackedAddress) -> Result<(), Error> {
        self.inner.set_tracked_address(address)
    }

    fn get_tracked_address(
        &self,
        _chain: &str,
        _asset_code: &str,
        _address: &str,
    ) -> Result<Option<TrackedAddress>, Error> {
        Err(Error::Generic("directory down".into()))
    }

    fn iter_tracked_addresses(
        &self,
        _chain: &str,
        _asset_code: &str,
    ) -> Result<Vec<TrackedAddress>, Error> {
        Err(Error::Generic("directory down".into()))
    }
}

impl DepositLedger for UnreachableDirectory {
    fn record_deposit_if_absent(&self, deposit: &Deposit) -> Result<bool, Error> {
        self.inner.record_deposit_if_absent(deposit)
    }

    fn get_deposit(&self, txid: &Txid) -> Result<Option<Deposit>, Error> {
        self.inner.get_deposit(txid)
    }

    fn iter_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error> {
        self.inner.iter_deposits(filter)
    }
}

impl ScanState for UnreachableDirectory {
    fn insert_pending_block(&self, chain: &str, height: u32) -> Result<bool, Error> {
        self.inner.insert_pending_block(chain, height)
    }

    fn mark_scanned(&self, chain: &str, height: u32) -> Result<(), Error> {
        self.inner.mark_scanned(chain, height)
    }

    fn get_scan_record(&self, chain: &str, height: u32) -> Result<Option<BlockScanRecord>, Error> {
        self.inner.get_scan_record(chain, height)
    }

    fn iter_pending_blocks(&self, chain: &str) -> Result<Vec<BlockScanRecord>, Error> {
        self.inner.iter_pending_blocks(chain)
    }
}
