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

//! Blockchain backends
//!
//! This module provides the traits the [`Scanner`](crate::Scanner) uses to read data from the
//! chain, together with the implementations of those traits for the supported backends.
//!
//! The scanner needs three things from a node: the current tip height ([`GetHeight`]), the list
//! of transactions of a block at a given height ([`GetBlock`]) and the outputs of a transaction
//! ([`GetTx`]). Every type implementing all three automatically implements [`ChainReader`].
//!
//! Backends are blocking and must be `Send + Sync`, since the scanner resolves the transactions
//! of a block from several worker threads sharing a single instance.

use std::ops::Deref;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use bitcoin::{BlockHash, Txid};

use crate::error::Error;
use crate::types::{ChainBlock, ChainTransaction};

#[cfg(any(feature = "rpc", feature = "esplora"))]
pub mod any;
#[cfg(any(feature = "rpc", feature = "esplora"))]
pub use any::{AnyBlockchain, AnyBlockchainConfig};

#[cfg(feature = "rpc")]
#[cfg_attr(docsrs, doc(cfg(feature = "rpc")))]
pub mod rpc;
#[cfg(feature = "rpc")]
pub use self::rpc::{RpcBlockchain, RpcConfig};

#[cfg(feature = "esplora")]
#[cfg_attr(docsrs, doc(cfg(feature = "esplora")))]
pub mod esplora;
#[cfg(feature = "esplora")]
pub use self::esplora::{EsploraBlockchain, EsploraBlockchainConfig};

/// Trait for getting the current height of the blockchain.
pub trait GetHeight {
    /// Return the current height
    ///
    /// Fails with [`Error::ChainUnavailable`] if the node can't be reached.
    fn get_height(&self) -> Result<u32, Error>;
}

/// Trait for getting the transaction list of a block
pub trait GetBlock {
    /// Fetch the block at `height`
    ///
    /// The order of [`ChainBlock::txids`] is the order the scanner iterates in. Fails with
    /// [`Error::BlockNotFound`] if `height` is above the tip or unknown to the node.
    fn get_block(&self, height: u32) -> Result<ChainBlock, Error>;
}

/// Trait for getting a transaction by txid
pub trait GetTx {
    /// Fetch a transaction and its outputs
    ///
    /// `block_hash` is a hint about the block containing the transaction, backends that can't
    /// look up arbitrary transactions use it to find the transaction anyway. Fails with
    /// [`Error::TransactionNotFound`] if the node can't resolve `txid`.
    fn get_tx(&self, txid: &Txid, block_hash: Option<&BlockHash>)
        -> Result<ChainTransaction, Error>;
}

/// Everything the [`Scanner`](crate::Scanner) needs from a blockchain backend
pub trait ChainReader: GetHeight + GetBlock + GetTx + Send + Sync {}

impl<T: GetHeight + GetBlock + GetTx + Send + Sync> ChainReader for T {}

/// Trait for [`ChainReader`] types that can be created given a configuration
pub trait ConfigurableBlockchain: ChainReader + Sized {
    /// Type that contains the configuration
    type Config: std::fmt::Debug;
    /// Create a new instance given a configuration
    fn from_config(config: &Self::Config) -> Result<Self, Error>;
}

/// Data sent with a progress update over a [`channel`]
pub type ProgressData = (f32, Option<String>);

/// Trait for types that can receive and process progress updates during a block scan
///
/// Returning an error from [`Progress::update`] cancels the scan: the block is left unscanned
/// and the error is returned to the caller.
pub trait Progress: Send {
    /// Send a new progress update
    ///
    /// The `progress` value should be in the range 0.0 - 100.0, and the `message` value is an
    /// optional text message that can be displayed to the user.
    fn update(&self, progress: f32, message: Option<String>) -> Result<(), Error>;
}

/// Shortcut to create a [`channel`] (pair of [`Sender`] and [`Receiver`]) that can transport [`ProgressData`]
///
/// Dropping the [`Receiver`] cancels any scan reporting to the [`Sender`].
pub fn progress() -> (Sender<ProgressData>, Receiver<ProgressData>) {
    channel()
}

impl Progress for Sender<ProgressData> {
    fn update(&self, progress: f32, message: Option<String>) -> Result<(), Error> {
        if !(0.0..=100.0).contains(&progress) {
            return Err(Error::InvalidProgressValue(progress));
        }

        self.send((progress, message))
            .map_err(|_| Error::ProgressUpdateError)
    }
}

/// Type that implements [`Progress`] and drops every update received
#[derive(Clone, Copy, Default, Debug)]
pub struct NoopProgress;

/// Create a new instance of [`NoopProgress`]
pub fn noop_progress() -> NoopProgress {
    NoopProgress
}

impl Progress for NoopProgress {
    fn update(&self, _progress: f32, _message: Option<String>) -> Result<(), Error> {
        Ok(())
    }
}

/// Type that implements [`Progress`] and logs at level `INFO` every update received
#[derive(Clone, Copy, Default, Debug)]
pub struct LogProgress;

/// Create a new instance of [`LogProgress`]
pub fn log_progress() -> LogProgress {
    LogProgress
}

impl Progress for LogProgress {
    fn update(&self, progress: f32, message: Option<String>) -> Result<(), Error> {
        log::info!(
            "Scan {:.3}%: `{}`",
            progress,
            message.unwrap_or_else(|| "".into())
        );

        Ok(())
    }
}

impl<T: GetHeight> GetHeight for Arc<T> {
    fn get_height(&self) -> Result<u32, Error> {
        self.deref().get_height()
    }
}

impl<T: GetBlock> GetBlock for Arc<T> {
    fn get_block(&self, height: u32) -> Result<ChainBlock, Error> {
        self.deref().get_block(height)
    }
}

impl<T: GetTx> GetTx for Arc<T> {
    fn get_tx(
        &self,
        txid: &Txid,
        block_hash: Option<&BlockHash>,
    ) -> Result<ChainTransaction, Error> {
        self.deref().get_tx(txid, block_hash)
    }
}
