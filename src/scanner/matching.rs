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

//! Output matching
//!
//! A transaction pays a tracked address when one of its outputs resolves to an entry of the
//! [`AddressDirectory`]. Only the **first** such output, in transaction order, is considered:
//! every later output is ignored, even if it also pays a tracked address.

use log::debug;

use crate::database::AddressDirectory;
use crate::error::Error;
use crate::types::{ChainTransaction, TrackedAddress};

/// The output of a transaction selected as a deposit candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Tracked address the output pays to
    pub tracked_address: TrackedAddress,
    /// Index of the output
    pub vout: u32,
    /// Value of the output (sats)
    pub amount: u64,
}

/// Find the first output of `tx` paying to an address tracked for `(chain, asset_code)`
///
/// Returns `Ok(None)` when no output matches. A match is returned even if its value is zero:
/// the caller decides whether it's worth recording.
///
/// Any error coming from the directory is reported as [`Error::AddressLookupFailure`].
pub fn find_deposit_candidate<D: AddressDirectory + ?Sized>(
    directory: &D,
    chain: &str,
    asset_code: &str,
    tx: &ChainTransaction,
) -> Result<Option<Candidate>, Error> {
    for (vout, output) in tx.outputs.iter().enumerate() {
        let address = match &output.address {
            Some(address) => address,
            None => continue,
        };

        let tracked = directory
            .get_tracked_address(chain, asset_code, address)
            .map_err(|e| Error::AddressLookupFailure(e.to_string()))?;

        if let Some(tracked_address) = tracked {
            debug!(
                "Tx {} output {} pays tracked address {}",
                tx.txid, vout, tracked_address.address
            );

            return Ok(Some(Candidate {
                tracked_address,
                vout: vout as u32,
                amount: output.value,
            }));
        }
    }

    Ok(None)
}
