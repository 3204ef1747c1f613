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

//! In-memory ephemeral database
//!
//! This module defines an in-memory database type called [`MemoryDatabase`] that is based on a
//! [`BTreeMap`].

use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitcoin::consensus::encode::serialize;
use bitcoin::hash_types::Txid;

use crate::database::{
    sort_deposits, AddressDirectory, ConfigurableDatabase, DepositLedger, ScanState,
};
use crate::error::Error;
use crate::types::*;

// tracked address      a<chain>\0<asset>\0<address> -> TrackedAddress
// deposits             d<txid> -> Deposit
// scan records         b<chain>\0<height> -> BlockScanRecord

pub(crate) enum MapKey<'a> {
    TrackedAddress {
        chain: &'a str,
        asset_code: &'a str,
        address: Option<&'a str>,
    },
    Deposit(Option<&'a Txid>),
    ScanRecord {
        chain: &'a str,
        height: Option<u32>,
    },
}

impl MapKey<'_> {
    pub fn as_prefix(&self) -> Vec<u8> {
        match self {
            MapKey::TrackedAddress {
                chain, asset_code, ..
            } => [
                &b"a"[..],
                chain.as_bytes(),
                b"\0",
                asset_code.as_bytes(),
                b"\0",
            ]
            .concat(),
            MapKey::Deposit(_) => b"d".to_vec(),
            MapKey::ScanRecord { chain, .. } => [&b"b"[..], chain.as_bytes(), b"\0"].concat(),
        }
    }

    fn serialize_content(&self) -> Vec<u8> {
        match self {
            MapKey::TrackedAddress {
                address: Some(address),
                ..
            } => address.as_bytes().to_vec(),
            MapKey::Deposit(Some(txid)) => serialize(*txid),
            // big endian, so that records sort by height
            MapKey::ScanRecord {
                height: Some(height),
                ..
            } => height.to_be_bytes().to_vec(),
            _ => vec![],
        }
    }

    pub fn as_map_key(&self) -> Vec<u8> {
        let mut v = self.as_prefix();
        v.extend_from_slice(&self.serialize_content());

        v
    }
}

// every prefix ends with a `\0` separator or an ascii letter, the increment can't overflow
fn after(key: &[u8]) -> Vec<u8> {
    let mut key = key.to_vec();
    if let Some(last) = key.last_mut() {
        *last += 1;
    }

    key
}

type AnyValue = Box<dyn Any + Send + Sync>;

/// In-memory ephemeral database
///
/// This database can be used as a temporary storage for the scanner or for tests. Nothing is
/// persisted once the value is dropped.
///
/// All the data is kept behind a single [`RwLock`], which makes
/// [`record_deposit_if_absent`](DepositLedger::record_deposit_if_absent) atomic.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    map: RwLock<BTreeMap<Vec<u8>, AnyValue>>,
}

impl MemoryDatabase {
    /// Create a new empty database
    pub fn new() -> Self {
        MemoryDatabase {
            map: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Vec<u8>, AnyValue>>, Error> {
        self.map
            .read()
            .map_err(|_| Error::Generic("memory database lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Vec<u8>, AnyValue>>, Error> {
        self.map
            .write()
            .map_err(|_| Error::Generic("memory database lock poisoned".into()))
    }

    fn get_cloned<T: Clone + 'static>(&self, key: &[u8]) -> Result<Option<T>, Error> {
        self.read()?.get(key).map(downcast).transpose()
    }

    fn iter_prefix<T: Clone + 'static>(&self, prefix: &[u8]) -> Result<Vec<T>, Error> {
        self.read()?
            .range::<[u8], _>((Included(prefix), Excluded(after(prefix).as_slice())))
            .map(|(_, v)| downcast(v))
            .collect()
    }
}

fn downcast<T: Clone + 'static>(value: &AnyValue) -> Result<T, Error> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::Generic("unexpected value type in memory database".into()))
}

impl AddressDirectory for MemoryDatabase {
    fn set_tracked_address(&self, address: &TrackedAddress) -> Result<(), Error> {
        let key = MapKey::TrackedAddress {
            chain: &address.chain,
            asset_code: &address.asset_code,
            address: Some(&address.address),
        }
        .as_map_key();
        self.write()?.insert(key, Box::new(address.clone()));

        Ok(())
    }

    fn get_tracked_address(
        &self,
        chain: &str,
        asset_code: &str,
        address: &str,
    ) -> Result<Option<TrackedAddress>, Error> {
        let key = MapKey::TrackedAddress {
            chain,
            asset_code,
            address: Some(address),
        }
        .as_map_key();
        self.get_cloned(&key)
    }

    fn iter_tracked_addresses(
        &self,
        chain: &str,
        asset_code: &str,
    ) -> Result<Vec<TrackedAddress>, Error> {
        let prefix = MapKey::TrackedAddress {
            chain,
            asset_code,
            address: None,
        }
        .as_prefix();
        self.iter_prefix(&prefix)
    }
}

impl DepositLedger for MemoryDatabase {
    fn record_deposit_if_absent(&self, deposit: &Deposit) -> Result<bool, Error> {
        let key = MapKey::Deposit(Some(&deposit.txid)).as_map_key();

        let mut map = self.write()?;
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, Box::new(deposit.clone()));

        Ok(true)
    }

    fn get_deposit(&self, txid: &Txid) -> Result<Option<Deposit>, Error> {
        let key = MapKey::Deposit(Some(txid)).as_map_key();
        self.get_cloned(&key)
    }

    fn iter_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error> {
        let prefix = MapKey::Deposit(None).as_prefix();
        let mut deposits = self
            .iter_prefix::<Deposit>(&prefix)?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect::<Vec<_>>();
        sort_deposits(&mut deposits);

        Ok(deposits)
    }
}

impl ScanState for MemoryDatabase {
    fn insert_pending_block(&self, chain: &str, height: u32) -> Result<bool, Error> {
        let key = MapKey::ScanRecord {
            chain,
            height: Some(height),
        }
        .as_map_key();

        let mut map = self.write()?;
        if map.contains_key(&key) {
            return Ok(false);
        }
        let record = BlockScanRecord {
            chain: chain.to_string(),
            height,
            has_completed_scan: false,
        };
        map.insert(key, Box::new(record));

        Ok(true)
    }

    fn mark_scanned(&self, chain: &str, height: u32) -> Result<(), Error> {
        let key = MapKey::ScanRecord {
            chain,
            height: Some(height),
        }
        .as_map_key();
        let record = BlockScanRecord {
            chain: chain.to_string(),
            height,
            has_completed_scan: true,
        };
        self.write()?.insert(key, Box::new(record));

        Ok(())
    }

    fn get_scan_record(&self, chain: &str, height: u32) -> Result<Option<BlockScanRecord>, Error> {
        let key = MapKey::ScanRecord {
            chain,
            height: Some(height),
        }
        .as_map_key();
        self.get_cloned(&key)
    }

    fn iter_pending_blocks(&self, chain: &str) -> Result<Vec<BlockScanRecord>, Error> {
        let prefix = MapKey::ScanRecord {
            chain,
            height: None,
        }
        .as_prefix();

        Ok(self
            .iter_prefix::<BlockScanRecord>(&prefix)?
            .into_iter()
            .filter(|r| !r.has_completed_scan)
            .collect())
    }
}

impl ConfigurableDatabase for MemoryDatabase {
    type Config = ();

    fn from_config(_config: &Self::Config) -> Result<Self, Error> {
        Ok(MemoryDatabase::default())
    }
}
