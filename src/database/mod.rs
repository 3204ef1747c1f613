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

//! Database types
//!
//! This module provides the implementation of some defaults database types, along with traits that
//! can be implemented externally to let the [`Scanner`](crate::Scanner) use customized databases.
//!
//! The state kept by the scanner is split in three logical stores:
//!
//! * [`AddressDirectory`]: the addresses the operator is tracking
//! * [`DepositLedger`]: the deposits detected so far, at most one per txid
//! * [`ScanState`]: the per-block scan completion records
//!
//! A type implementing all three (and `Send + Sync`, since the scanner records deposits from
//! several worker threads) is a [`Database`]. Every method takes `&self`: implementations are
//! expected to synchronize internally.
//!
//! [`MemoryDatabase`] is always available, [`sled::Tree`] requires the `key-value-db` feature
//! and [`SqliteDatabase`] the `sqlite` feature.

use bitcoin::hash_types::Txid;

use crate::error::Error;
use crate::types::*;

pub mod any;
pub use any::{AnyDatabase, AnyDatabaseConfig};

#[cfg(feature = "key-value-db")]
pub(crate) mod keyvalue;

#[cfg(feature = "sqlite")]
pub(crate) mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub mod memory;
pub use memory::MemoryDatabase;

/// Lookup of the addresses tracked for deposits
pub trait AddressDirectory {
    /// Store a tracked address
    ///
    /// This is meant for the onboarding process, the scanner never calls it. Storing the same
    /// address twice is a no-op.
    fn set_tracked_address(&self, address: &TrackedAddress) -> Result<(), Error>;

    /// Look up `address` among the tracked addresses for the `(chain, asset_code)` pair
    fn get_tracked_address(
        &self,
        chain: &str,
        asset_code: &str,
        address: &str,
    ) -> Result<Option<TrackedAddress>, Error>;

    /// Return the list of tracked addresses for the `(chain, asset_code)` pair
    fn iter_tracked_addresses(
        &self,
        chain: &str,
        asset_code: &str,
    ) -> Result<Vec<TrackedAddress>, Error>;
}

/// Deduplicated store of detected deposits
pub trait DepositLedger {
    /// Record `deposit` unless a deposit with the same txid already exists
    ///
    /// Returns `true` if the deposit was inserted. The existence check and the insertion are a
    /// single atomic step: when several callers race on the same txid exactly one of them gets
    /// `true`. An existing deposit is never modified.
    fn record_deposit_if_absent(&self, deposit: &Deposit) -> Result<bool, Error>;

    /// Fetch the deposit recorded for `txid`
    fn get_deposit(&self, txid: &Txid) -> Result<Option<Deposit>, Error>;

    /// Return the deposits matching `filter`, sorted by height and txid
    fn iter_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error>;
}

/// Persistent per-block scan completion records
pub trait ScanState {
    /// Create a pending record for the block if none exists
    ///
    /// Returns `true` if a record was created. An existing record, completed or not, is left
    /// untouched.
    fn insert_pending_block(&self, chain: &str, height: u32) -> Result<bool, Error>;

    /// Mark the block as completely scanned
    ///
    /// Idempotent, creates the record if missing. A completed record never goes back to pending.
    fn mark_scanned(&self, chain: &str, height: u32) -> Result<(), Error>;

    /// Fetch the scan record of a block
    fn get_scan_record(&self, chain: &str, height: u32) -> Result<Option<BlockScanRecord>, Error>;

    /// Return the records of `chain` that haven't completed their scan, in ascending height
    fn iter_pending_blocks(&self, chain: &str) -> Result<Vec<BlockScanRecord>, Error>;
}

/// Trait for a database that can be used by the [`Scanner`](crate::Scanner)
///
/// Automatically implemented for every type that implements the three storage traits.
pub trait Database: AddressDirectory + DepositLedger + ScanState + Send + Sync {}

impl<T: AddressDirectory + DepositLedger + ScanState + Send + Sync> Database for T {}

/// Trait for [`Database`] types that can be created given a configuration
pub trait ConfigurableDatabase: Database + Sized {
    /// Type that contains the configuration
    type Config: std::fmt::Debug;

    /// Create a new instance given a configuration
    fn from_config(config: &Self::Config) -> Result<Self, Error>;
}

/// Sort deposits the way [`DepositLedger::iter_deposits`] returns them
pub(crate) fn sort_deposits(deposits: &mut [Deposit]) {
    deposits.sort_by(|a, b| (a.height, a.txid).cmp(&(b.height, b.txid)));
}

#[cfg(test)]
pub mod test {
    #![allow(missing_docs)]

    use std::sync::Arc;
    use std::thread;

    use bitcoin::hashes::Hash;

    use super::*;

    const ADDR_A: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
    const ADDR_B: &str = "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn";

    pub fn deposit(seed: &str, address: &str, height: u32, amount: u64) -> Deposit {
        Deposit {
            txid: Txid::hash(seed.as_bytes()),
            tracked_address: TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, address),
            amount,
            height,
            vout: 0,
            created_at: 1_600_000_000,
        }
    }

    pub fn test_tracked_address<D: Database>(db: D) {
        let tracked = TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_A);

        assert_eq!(
            db.get_tracked_address(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_A)
                .unwrap(),
            None
        );

        db.set_tracked_address(&tracked).unwrap();
        // onboarding twice is harmless
        db.set_tracked_address(&tracked).unwrap();

        assert_eq!(
            db.get_tracked_address(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_A)
                .unwrap(),
            Some(tracked)
        );
        assert_eq!(
            db.get_tracked_address(BITCOIN_CHAIN, "USDT", ADDR_A)
                .unwrap(),
            None
        );
        assert_eq!(
            db.get_tracked_address("litecoin", BTC_ASSET_CODE, ADDR_A)
                .unwrap(),
            None
        );
        assert_eq!(
            db.get_tracked_address(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_B)
                .unwrap(),
            None
        );
    }

    pub fn test_iter_tracked_addresses<D: Database>(db: D) {
        db.set_tracked_address(&TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_A))
            .unwrap();
        db.set_tracked_address(&TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_B))
            .unwrap();
        db.set_tracked_address(&TrackedAddress::new(BITCOIN_CHAIN, "USDT", ADDR_A))
            .unwrap();
        db.set_tracked_address(&TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_A))
            .unwrap();

        let mut addresses = db
            .iter_tracked_addresses(BITCOIN_CHAIN, BTC_ASSET_CODE)
            .unwrap()
            .into_iter()
            .map(|a| a.address)
            .collect::<Vec<_>>();
        addresses.sort();
        let mut expected = vec![ADDR_A.to_string(), ADDR_B.to_string()];
        expected.sort();
        assert_eq!(addresses, expected);

        assert_eq!(
            db.iter_tracked_addresses(BITCOIN_CHAIN, "USDT")
                .unwrap()
                .len(),
            1
        );
        assert!(db
            .iter_tracked_addresses("litecoin", BTC_ASSET_CODE)
            .unwrap()
            .is_empty());
    }

    pub fn test_record_deposit_if_absent<D: Database>(db: D) {
        let first = deposit("t1", ADDR_A, 100, 200_000);

        assert!(db.record_deposit_if_absent(&first).unwrap());
        assert_eq!(db.get_deposit(&first.txid).unwrap(), Some(first.clone()));

        // same txid, different content: the stored deposit wins
        let mut second = first.clone();
        second.amount = 1;
        second.tracked_address.address = ADDR_B.to_string();
        second.created_at += 60;
        assert!(!db.record_deposit_if_absent(&second).unwrap());
        assert_eq!(db.get_deposit(&first.txid).unwrap(), Some(first.clone()));

        assert_eq!(db.iter_deposits(&DepositFilter::default()).unwrap().len(), 1);
        assert_eq!(db.get_deposit(&Txid::hash(b"missing")).unwrap(), None);
    }

    pub fn test_concurrent_record_deposit<D: Database + 'static>(db: D) {
        let db = Arc::new(db);
        let deposit = deposit("t1", ADDR_A, 100, 200_000);

        let handles = (0..8)
            .map(|i| {
                let db = Arc::clone(&db);
                let mut deposit = deposit.clone();
                deposit.created_at += i;
                thread::spawn(move || db.record_deposit_if_absent(&deposit).unwrap())
            })
            .collect::<Vec<_>>();
        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(
            db.iter_deposits(&DepositFilter::default()).unwrap(),
            vec![db.get_deposit(&deposit.txid).unwrap().unwrap()]
        );
    }

    pub fn test_iter_deposits<D: Database>(db: D) {
        let d1 = deposit("t1", ADDR_A, 102, 1_000);
        let d2 = deposit("t2", ADDR_B, 100, 2_000);
        let d3 = deposit("t3", ADDR_A, 101, 3_000);
        for d in &[&d1, &d2, &d3] {
            assert!(db.record_deposit_if_absent(d).unwrap());
        }

        assert_eq!(
            db.iter_deposits(&DepositFilter::default()).unwrap(),
            vec![d2.clone(), d3.clone(), d1.clone()]
        );
        assert_eq!(
            db.iter_deposits(&DepositFilter {
                address: Some(ADDR_A.to_string()),
                ..Default::default()
            })
            .unwrap(),
            vec![d3.clone(), d1.clone()]
        );
        assert_eq!(
            db.iter_deposits(&DepositFilter {
                min_height: Some(101),
                max_height: Some(101),
                ..Default::default()
            })
            .unwrap(),
            vec![d3]
        );
        assert!(db
            .iter_deposits(&DepositFilter {
                asset_code: Some("USDT".to_string()),
                ..Default::default()
            })
            .unwrap()
            .is_empty());
    }

    pub fn test_mark_scanned<D: Database>(db: D) {
        assert_eq!(db.get_scan_record(BITCOIN_CHAIN, 100).unwrap(), None);

        db.mark_scanned(BITCOIN_CHAIN, 100).unwrap();
        db.mark_scanned(BITCOIN_CHAIN, 100).unwrap();

        assert_eq!(
            db.get_scan_record(BITCOIN_CHAIN, 100).unwrap(),
            Some(BlockScanRecord {
                chain: BITCOIN_CHAIN.to_string(),
                height: 100,
                has_completed_scan: true,
            })
        );
        assert_eq!(db.get_scan_record("litecoin", 100).unwrap(), None);
        assert_eq!(db.get_scan_record(BITCOIN_CHAIN, 101).unwrap(), None);
    }

    pub fn test_insert_pending_block<D: Database>(db: D) {
        assert!(db.insert_pending_block(BITCOIN_CHAIN, 100).unwrap());
        assert!(!db.insert_pending_block(BITCOIN_CHAIN, 100).unwrap());
        assert_eq!(
            db.get_scan_record(BITCOIN_CHAIN, 100)
                .unwrap()
                .map(|r| r.has_completed_scan),
            Some(false)
        );

        db.mark_scanned(BITCOIN_CHAIN, 100).unwrap();

        // never goes back to pending
        assert!(!db.insert_pending_block(BITCOIN_CHAIN, 100).unwrap());
        assert_eq!(
            db.get_scan_record(BITCOIN_CHAIN, 100)
                .unwrap()
                .map(|r| r.has_completed_scan),
            Some(true)
        );
    }

    pub fn test_iter_pending_blocks<D: Database>(db: D) {
        db.insert_pending_block(BITCOIN_CHAIN, 300).unwrap();
        db.insert_pending_block(BITCOIN_CHAIN, 2).unwrap();
        db.insert_pending_block(BITCOIN_CHAIN, 256).unwrap();
        db.insert_pending_block("litecoin", 5).unwrap();
        db.mark_scanned(BITCOIN_CHAIN, 256).unwrap();
        db.mark_scanned(BITCOIN_CHAIN, 7).unwrap();

        let pending = db
            .iter_pending_blocks(BITCOIN_CHAIN)
            .unwrap()
            .into_iter()
            .map(|r| {
                assert!(!r.has_completed_scan);
                assert_eq!(r.chain, BITCOIN_CHAIN);
                r.height
            })
            .collect::<Vec<_>>();
        assert_eq!(pending, vec![2, 300]);
    }
}
