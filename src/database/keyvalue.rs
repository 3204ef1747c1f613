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

use sled::Tree;

use bitcoin::hash_types::Txid;

use crate::database::memory::MapKey;
use crate::database::{sort_deposits, AddressDirectory, DepositLedger, ScanState};
use crate::error::Error;
use crate::types::*;

fn deserialize_prefix<T: serde::de::DeserializeOwned>(
    tree: &Tree,
    prefix: Vec<u8>,
) -> Result<Vec<T>, Error> {
    tree.scan_prefix(prefix)
        .map(|x| -> Result<_, Error> {
            let (_, v) = x?;
            Ok(serde_json::from_slice(&v)?)
        })
        .collect()
}

/// Insert `value` at `key` only if the key is not in the tree yet
///
/// Returns `true` if the value was inserted.
fn insert_if_absent(tree: &Tree, key: Vec<u8>, value: Vec<u8>) -> Result<bool, Error> {
    let res = tree.compare_and_swap(key, None as Option<&[u8]>, Some(value))?;
    Ok(res.is_ok())
}

impl AddressDirectory for Tree {
    fn set_tracked_address(&self, address: &TrackedAddress) -> Result<(), Error> {
        let key = MapKey::TrackedAddress {
            chain: &address.chain,
            asset_code: &address.asset_code,
            address: Some(&address.address),
        }
        .as_map_key();
        self.insert(key, serde_json::to_vec(address)?)?;

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
        self.get(key)?
            .map(|b| -> Result<_, Error> { Ok(serde_json::from_slice(&b)?) })
            .transpose()
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
        deserialize_prefix(self, prefix)
    }
}

impl DepositLedger for Tree {
    fn record_deposit_if_absent(&self, deposit: &Deposit) -> Result<bool, Error> {
        let key = MapKey::Deposit(Some(&deposit.txid)).as_map_key();
        insert_if_absent(self, key, serde_json::to_vec(deposit)?)
    }

    fn get_deposit(&self, txid: &Txid) -> Result<Option<Deposit>, Error> {
        let key = MapKey::Deposit(Some(txid)).as_map_key();
        self.get(key)?
            .map(|b| -> Result<_, Error> { Ok(serde_json::from_slice(&b)?) })
            .transpose()
    }

    fn iter_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error> {
        let prefix = MapKey::Deposit(None).as_prefix();
        let mut deposits = deserialize_prefix::<Deposit>(self, prefix)?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect::<Vec<_>>();
        sort_deposits(&mut deposits);

        Ok(deposits)
    }
}

impl ScanState for Tree {
    fn insert_pending_block(&self, chain: &str, height: u32) -> Result<bool, Error> {
        let key = MapKey::ScanRecord {
            chain,
            height: Some(height),
        }
        .as_map_key();
        let record = BlockScanRecord {
            chain: chain.to_string(),
            height,
            has_completed_scan: false,
        };
        insert_if_absent(self, key, serde_json::to_vec(&record)?)
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
        self.insert(key, serde_json::to_vec(&record)?)?;
        self.flush()?;

        Ok(())
    }

    fn get_scan_record(&self, chain: &str, height: u32) -> Result<Option<BlockScanRecord>, Error> {
        let key = MapKey::ScanRecord {
            chain,
            height: Some(height),
        }
        .as_map_key();
        self.get(key)?
            .map(|b| -> Result<_, Error> { Ok(serde_json::from_slice(&b)?) })
            .transpose()
    }

    fn iter_pending_blocks(&self, chain: &str) -> Result<Vec<BlockScanRecord>, Error> {
        let prefix = MapKey::ScanRecord {
            chain,
            height: None,
        }
        .as_prefix();

        Ok(deserialize_prefix::<BlockScanRecord>(self, prefix)?
            .into_iter()
            .filter(|r| !r.has_completed_scan)
            .collect())
    }
}
