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

//! Block scanner
//!
//! This module defines the [`Scanner`] structure, which walks the transactions of a block,
//! detects the ones paying to a tracked address and records them in the deposit ledger.
//!
//! A block goes through three states: it's `Pending` when its scan record is created, `Scanning`
//! while its transactions are being resolved and `Completed` once every transaction has been
//! processed. There is no failed state: if anything goes wrong the block simply stays
//! incomplete and a later call to [`Scanner::scan_block`] retries it from scratch. Deposits
//! recorded by an aborted scan are kept, the ledger deduplicates them on the next attempt.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::{BlockHash, Txid};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::blockchain::{noop_progress, ChainReader, Progress};
use crate::database::Database;
use crate::error::Error;
use crate::types::*;

pub mod matching;

use matching::find_deposit_candidate;

#[cfg(any(feature = "rpc", feature = "esplora"))]
use crate::blockchain::{AnyBlockchain, AnyBlockchainConfig, ConfigurableBlockchain};
#[cfg(any(feature = "rpc", feature = "esplora"))]
use crate::database::{AnyDatabase, AnyDatabaseConfig, ConfigurableDatabase};

/// Default number of transactions resolved in parallel
pub const DEFAULT_CONCURRENCY: u8 = 4;

/// Parameters of a [`Scanner`]
///
/// Every field can be omitted when deserializing, falling back to the native Bitcoin asset and
/// [`DEFAULT_CONCURRENCY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Chain label used for scan records and address lookups
    pub chain: String,
    /// Asset code used for address lookups
    pub asset_code: String,
    /// Maximum number of transactions resolved at the same time
    pub concurrency: u8,
}

impl Default for ScanParams {
    fn default() -> Self {
        ScanParams {
            chain: BITCOIN_CHAIN.to_string(),
            asset_code: BTC_ASSET_CODE.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Configuration of a [`Scanner`] built at runtime with [`Scanner::from_config`]
#[cfg(any(feature = "rpc", feature = "esplora"))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Chain backend
    pub blockchain: AnyBlockchainConfig,
    /// Storage backend for tracked addresses, deposits and scan records
    pub database: AnyDatabaseConfig,
    /// Scan parameters
    #[serde(default)]
    pub params: ScanParams,
}

/// A deposit scanner
///
/// The scanner is generic over the chain backend and the database. Both are kept behind an
/// [`Arc`] so that worker threads can share them, and so that several scanners can share a
/// single database.
#[derive(Debug)]
pub struct Scanner<B, D> {
    client: Arc<B>,
    database: Arc<D>,
    params: ScanParams,
}

impl<B, D> Scanner<B, D>
where
    B: ChainReader + 'static,
    D: Database + 'static,
{
    /// Create a new scanner
    pub fn new(client: B, database: D, params: ScanParams) -> Self {
        Self::from_shared(Arc::new(client), Arc::new(database), params)
    }

    /// Create a new scanner from shared handles to a chain backend and a database
    pub fn from_shared(client: Arc<B>, database: Arc<D>, params: ScanParams) -> Self {
        Scanner {
            client,
            database,
            params,
        }
    }

    /// Return a reference to the internal chain backend
    pub fn client(&self) -> &B {
        &self.client
    }

    /// Return a reference to the internal database
    pub fn database(&self) -> &D {
        &self.database
    }

    /// Return the scan parameters
    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Return the current height of the chain tip
    pub fn get_height(&self) -> Result<u32, Error> {
        self.client.get_height()
    }

    /// Scan the block at `height` and record every deposit found
    ///
    /// Scanning the same block again is harmless: deposits already in the ledger are not
    /// duplicated and the block stays completed.
    pub fn scan_block(&self, height: u32) -> Result<ScanReport, Error> {
        self.scan_block_with_progress(height, noop_progress())
    }

    /// Scan the block at `height`, reporting progress after each batch of transactions
    ///
    /// If `progress` returns an error the scan is cancelled: the error is returned and the block
    /// is not marked as completed.
    pub fn scan_block_with_progress<P: Progress>(
        &self,
        height: u32,
        progress: P,
    ) -> Result<ScanReport, Error> {
        info!("Begin scan of {} block {}", self.params.chain, height);

        match self.scan_transactions(height, &progress) {
            Ok(report) => {
                self.database.mark_scanned(&self.params.chain, height)?;
                info!(
                    "Completed scan of {} block {}: {} txs, {} deposits ({} new)",
                    report.chain,
                    report.height,
                    report.transactions,
                    report.deposits_found,
                    report.deposits_inserted
                );

                Ok(report)
            }
            Err(e) => {
                warn!(
                    "Scan of {} block {} aborted: {}",
                    self.params.chain, height, e
                );
                Err(e)
            }
        }
    }

    /// Return whether the block at `height` has been completely scanned
    ///
    /// Blocks that were never scanned are reported as not completed.
    pub fn get_scan_status(&self, height: u32) -> Result<bool, Error> {
        Ok(self
            .database
            .get_scan_record(&self.params.chain, height)?
            .map(|record| record.has_completed_scan)
            .unwrap_or(false))
    }

    /// List the deposits in the ledger matching `filter`
    pub fn list_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error> {
        self.database.iter_deposits(filter)
    }

    /// Return the heights of the blocks whose scan was started but never completed
    pub fn list_pending_blocks(&self) -> Result<Vec<u32>, Error> {
        Ok(self
            .database
            .iter_pending_blocks(&self.params.chain)?
            .into_iter()
            .map(|record| record.height)
            .collect())
    }

    fn scan_transactions<P: Progress>(
        &self,
        height: u32,
        progress: &P,
    ) -> Result<ScanReport, Error> {
        let block = self.client.get_block(height)?;
        if self
            .database
            .insert_pending_block(&self.params.chain, height)?
        {
            debug!("Created pending scan record for block {}", height);
        }

        let total = block.txids.len();
        progress.update(0.0, Some(format!("0/{} transactions", total)))?;

        let mut report = ScanReport {
            chain: self.params.chain.clone(),
            height,
            block_hash: block.hash,
            transactions: 0,
            deposits_found: 0,
            deposits_inserted: 0,
        };

        let concurrency = std::cmp::max(self.params.concurrency, 1) as usize;
        for batch in block.txids.chunks(concurrency) {
            let handles = batch
                .iter()
                .map(|txid| self.spawn_worker(*txid, block.hash, height))
                .collect::<Vec<_>>();

            // join every worker before looking at the results, so that no thread outlives the
            // batch that started it
            let results = handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| Error::Generic("scan worker panicked".into()))
                })
                .collect::<Vec<_>>();

            for result in results {
                if let Some(inserted) = result?? {
                    report.deposits_found += 1;
                    if inserted {
                        report.deposits_inserted += 1;
                    }
                }
                report.transactions += 1;
            }

            progress.update(
                report.transactions as f32 / total as f32 * 100.0,
                Some(format!("{}/{} transactions", report.transactions, total)),
            )?;
        }

        Ok(report)
    }

    fn spawn_worker(
        &self,
        txid: Txid,
        block_hash: BlockHash,
        height: u32,
    ) -> JoinHandle<Result<Option<bool>, Error>> {
        let client = Arc::clone(&self.client);
        let database = Arc::clone(&self.database);
        let params = self.params.clone();

        // resolve each transaction in its own thread
        thread::spawn(move || {
            process_tx(
                client.as_ref(),
                database.as_ref(),
                &params,
                &txid,
                &block_hash,
                height,
            )
        })
    }
}

/// Resolve a transaction and record it if it pays to a tracked address
///
/// Returns `None` if no deposit was found, otherwise whether the deposit was new.
fn process_tx<B: ChainReader, D: Database>(
    client: &B,
    database: &D,
    params: &ScanParams,
    txid: &Txid,
    block_hash: &BlockHash,
    height: u32,
) -> Result<Option<bool>, Error> {
    let tx = client.get_tx(txid, Some(block_hash))?;

    let candidate = match find_deposit_candidate(database, &params.chain, &params.asset_code, &tx)?
    {
        Some(candidate) if candidate.amount > 0 => candidate,
        Some(_) => {
            debug!("Skipping zero value output in tx {}", txid);
            return Ok(None);
        }
        None => return Ok(None),
    };

    let deposit = Deposit {
        txid: *txid,
        tracked_address: candidate.tracked_address,
        amount: candidate.amount,
        height,
        vout: candidate.vout,
        created_at: get_timestamp(),
    };
    let inserted = database.record_deposit_if_absent(&deposit)?;
    if inserted {
        info!(
            "New deposit of {} sats to {} in tx {}",
            deposit.amount, deposit.tracked_address.address, txid
        );
    } else {
        debug!("Deposit for tx {} already recorded", txid);
    }

    Ok(Some(inserted))
}

fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(any(feature = "rpc", feature = "esplora"))]
impl Scanner<AnyBlockchain, AnyDatabase> {
    /// Build a scanner from a [`ScannerConfig`]
    ///
    /// ```no_run
    /// # use deposit_scanner::{Scanner, ScannerConfig};
    /// let config: ScannerConfig = serde_json::from_str("...")?;
    /// let scanner = Scanner::from_config(&config)?;
    /// let report = scanner.scan_block(scanner.get_height()?)?;
    /// # Ok::<(), deposit_scanner::Error>(())
    /// ```
    pub fn from_config(config: &ScannerConfig) -> Result<Self, Error> {
        Ok(Scanner::new(
            AnyBlockchain::from_config(&config.blockchain)?,
            AnyDatabase::from_config(&config.database)?,
            config.params.clone(),
        ))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Barrier;

    use bitcoin::hashes::Hash;

    use super::*;
    use crate::blockchain::progress;
    use crate::database::{AddressDirectory, DepositLedger, MemoryDatabase, ScanState};
    use crate::testutils::{
        MockBlockchain, TestIncomingOutput, TestIncomingTx, UnreachableDirectory,
    };

    const ADDR_X: &str = "bc1qdepositxaddress";
    const ADDR_Y: &str = "bc1qdeposityaddress";

    fn get_scanner(tracked: &[&str]) -> Scanner<MockBlockchain, MemoryDatabase> {
        let _ = env_logger::builder().is_test(true).try_init();

        let database = MemoryDatabase::new();
        for address in tracked {
            database
                .set_tracked_address(&TrackedAddress::new(
                    BITCOIN_CHAIN,
                    BTC_ASSET_CODE,
                    *address,
                ))
                .unwrap();
        }

        Scanner::new(MockBlockchain::new(), database, ScanParams::default())
    }

    fn tx(seed: &str, outputs: Vec<TestIncomingOutput>) -> TestIncomingTx {
        TestIncomingTx::new(seed, outputs)
    }

    #[test]
    fn test_scan_block() {
        let scanner = get_scanner(&[ADDR_X]);
        let t1 = tx("t1", vec![TestIncomingOutput::new(200_000, ADDR_X)]);
        let t2 = tx("t2", vec![TestIncomingOutput::new(50_000, "bc1quntracked")]);
        let t1_txid = t1.txid;
        let hash = scanner.client().add_block(100, vec![t1, t2]);

        assert!(!scanner.get_scan_status(100).unwrap());

        let report = scanner.scan_block(100).unwrap();
        assert_eq!(report.block_hash, hash);
        assert_eq!(report.transactions, 2);
        assert_eq!(report.deposits_found, 1);
        assert_eq!(report.deposits_inserted, 1);

        let deposits = scanner.list_deposits(&DepositFilter::default()).unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].txid, t1_txid);
        assert_eq!(deposits[0].amount, 200_000);
        assert_eq!(deposits[0].height, 100);
        assert_eq!(deposits[0].vout, 0);
        assert_eq!(deposits[0].tracked_address.address, ADDR_X);

        assert!(scanner.get_scan_status(100).unwrap());
        assert!(scanner.list_pending_blocks().unwrap().is_empty());
    }

    #[test]
    fn test_scan_block_twice() {
        let scanner = get_scanner(&[ADDR_X]);
        scanner.client().add_block(
            100,
            vec![tx("t1", vec![TestIncomingOutput::new(200_000, ADDR_X)])],
        );

        let first = scanner.scan_block(100).unwrap();
        let deposits = scanner.list_deposits(&DepositFilter::default()).unwrap();
        let second = scanner.scan_block(100).unwrap();

        assert_eq!(first.deposits_inserted, 1);
        assert_eq!(second.deposits_found, 1);
        assert_eq!(second.deposits_inserted, 0);
        assert_eq!(
            scanner.list_deposits(&DepositFilter::default()).unwrap(),
            deposits
        );
        assert!(scanner.get_scan_status(100).unwrap());
    }

    #[test]
    fn test_scan_first_match_only() {
        let scanner = get_scanner(&[ADDR_X, ADDR_Y]);
        scanner.client().add_block(
            7,
            vec![tx(
                "t1",
                vec![
                    TestIncomingOutput::new(5, ADDR_X),
                    TestIncomingOutput::new(3, ADDR_Y),
                ],
            )],
        );

        let report = scanner.scan_block(7).unwrap();
        assert_eq!(report.deposits_found, 1);

        let deposits = scanner.list_deposits(&DepositFilter::default()).unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].tracked_address.address, ADDR_X);
        assert_eq!(deposits[0].amount, 5);
    }

    #[test]
    fn test_scan_skips_zero_amount() {
        let scanner = get_scanner(&[ADDR_X, ADDR_Y]);
        scanner.client().add_block(
            7,
            vec![tx(
                "t1",
                vec![
                    TestIncomingOutput::unaddressable(0),
                    TestIncomingOutput::new(0, ADDR_X),
                    TestIncomingOutput::new(3, ADDR_Y),
                ],
            )],
        );

        let report = scanner.scan_block(7).unwrap();
        assert_eq!(report.transactions, 1);
        assert_eq!(report.deposits_found, 0);
        assert!(scanner
            .list_deposits(&DepositFilter::default())
            .unwrap()
            .is_empty());
        assert!(scanner.get_scan_status(7).unwrap());
    }

    #[test]
    fn test_scan_empty_block() {
        let scanner = get_scanner(&[ADDR_X]);
        scanner.client().add_block(3, vec![]);

        let report = scanner.scan_block(3).unwrap();
        assert_eq!(report.transactions, 0);
        assert!(scanner.get_scan_status(3).unwrap());
    }

    #[test]
    fn test_scan_failure_leaves_block_incomplete() {
        let scanner = get_scanner(&[ADDR_X, ADDR_Y]);
        let txs = (0..10)
            .map(|i| {
                let address = if i % 2 == 0 { ADDR_X } else { ADDR_Y };
                tx(
                    &format!("t{}", i),
                    vec![TestIncomingOutput::new(1_000 + i, address)],
                )
            })
            .collect::<Vec<_>>();
        let failing = txs[6].txid;
        scanner.client().add_block(50, txs);
        scanner.client().fail_tx(failing);

        assert!(matches!(
            scanner.scan_block(50),
            Err(Error::ChainUnavailable(_))
        ));
        assert!(!scanner.get_scan_status(50).unwrap());
        assert_eq!(scanner.list_pending_blocks().unwrap(), vec![50]);
        assert!(scanner.database().get_deposit(&failing).unwrap().is_none());

        scanner.client().heal_tx(&failing);
        let report = scanner.scan_block(50).unwrap();
        assert_eq!(report.deposits_found, 10);

        let deposits = scanner.list_deposits(&DepositFilter::default()).unwrap();
        assert_eq!(deposits.len(), 10);
        assert!(scanner.get_scan_status(50).unwrap());
        assert!(scanner.list_pending_blocks().unwrap().is_empty());
    }

    #[test]
    fn test_scan_unresolvable_tx() {
        let scanner = get_scanner(&[ADDR_X]);
        let t1 = tx("t1", vec![TestIncomingOutput::new(200_000, ADDR_X)]);
        let t2 = tx("t2", vec![TestIncomingOutput::new(1_000, ADDR_X)]);
        let missing = t2.txid;
        scanner.client().add_block(60, vec![t1, t2]);
        scanner.client().forget_tx(&missing);

        assert!(matches!(
            scanner.scan_block(60),
            Err(Error::TransactionNotFound(txid)) if txid == missing
        ));
        assert!(!scanner.get_scan_status(60).unwrap());
        assert_eq!(scanner.list_pending_blocks().unwrap(), vec![60]);
        assert!(scanner.database().get_deposit(&missing).unwrap().is_none());
    }

    #[test]
    fn test_scan_address_lookup_failure() {
        let scanner = Scanner::new(
            MockBlockchain::new(),
            UnreachableDirectory::new(),
            ScanParams::default(),
        );
        scanner.client().add_block(
            5,
            vec![tx("t1", vec![TestIncomingOutput::new(200_000, ADDR_X)])],
        );

        assert!(matches!(
            scanner.scan_block(5),
            Err(Error::AddressLookupFailure(_))
        ));
        assert!(!scanner.get_scan_status(5).unwrap());
        assert_eq!(scanner.list_pending_blocks().unwrap(), vec![5]);
        assert!(scanner
            .list_deposits(&DepositFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_scan_block_not_found() {
        let scanner = get_scanner(&[ADDR_X]);

        assert!(matches!(
            scanner.scan_block(1_000),
            Err(Error::BlockNotFound(1_000))
        ));
        assert!(scanner
            .database()
            .get_scan_record(BITCOIN_CHAIN, 1_000)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_chain_unavailable() {
        let scanner = get_scanner(&[ADDR_X]);
        scanner.client().add_block(12, vec![]);
        assert_eq!(scanner.get_height().unwrap(), 12);

        scanner.client().set_unavailable(true);
        assert!(matches!(
            scanner.get_height(),
            Err(Error::ChainUnavailable(_))
        ));
        assert!(matches!(
            scanner.scan_block(12),
            Err(Error::ChainUnavailable(_))
        ));
        assert!(!scanner.get_scan_status(12).unwrap());
    }

    #[test]
    fn test_scan_batches() {
        let mut scanner = get_scanner(&[ADDR_X]);
        scanner.params.concurrency = 3;

        let txs = (0..11)
            .map(|i| {
                tx(
                    &format!("t{}", i),
                    vec![TestIncomingOutput::new(100, ADDR_X)],
                )
            })
            .collect::<Vec<_>>();
        scanner.client().add_block(20, txs);

        let (sender, receiver) = progress();
        let report = scanner.scan_block_with_progress(20, sender).unwrap();
        assert_eq!(report.transactions, 11);
        assert_eq!(report.deposits_inserted, 11);
        assert_eq!(scanner.client().tx_requests(), 11);

        // one update before the first batch, then one per batch
        let updates = receiver.try_iter().collect::<Vec<_>>();
        assert_eq!(updates.len(), 5);
        assert_eq!(updates[0].0, 0.0);
        assert_eq!(updates[4].0, 100.0);
    }

    #[test]
    fn test_scan_cancelled() {
        let scanner = get_scanner(&[ADDR_X]);
        scanner.client().add_block(
            100,
            vec![tx("t1", vec![TestIncomingOutput::new(200_000, ADDR_X)])],
        );

        let (sender, receiver) = progress();
        drop(receiver);

        assert!(matches!(
            scanner.scan_block_with_progress(100, sender),
            Err(Error::ProgressUpdateError)
        ));
        assert!(!scanner.get_scan_status(100).unwrap());
        assert_eq!(scanner.client().tx_requests(), 0);
    }

    #[test]
    fn test_concurrent_scans() {
        let client = Arc::new(MockBlockchain::new());
        let database = Arc::new(MemoryDatabase::new());
        database
            .set_tracked_address(&TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_X))
            .unwrap();
        let txs = (0..8)
            .map(|i| {
                tx(
                    &format!("t{}", i),
                    vec![TestIncomingOutput::new(100, ADDR_X)],
                )
            })
            .collect::<Vec<_>>();
        client.add_block(42, txs);

        let barrier = Arc::new(Barrier::new(4));
        let handles = (0..4)
            .map(|_| {
                let scanner = Scanner::from_shared(
                    Arc::clone(&client),
                    Arc::clone(&database),
                    ScanParams::default(),
                );
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    scanner.scan_block(42).unwrap()
                })
            })
            .collect::<Vec<_>>();

        let inserted: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap().deposits_inserted)
            .sum();
        assert_eq!(inserted, 8);
        assert_eq!(
            database.iter_deposits(&DepositFilter::default()).unwrap().len(),
            8
        );
        assert!(database
            .get_scan_record(BITCOIN_CHAIN, 42)
            .unwrap()
            .unwrap()
            .has_completed_scan);
    }

    #[test]
    fn test_scan_other_asset() {
        let database = MemoryDatabase::new();
        database
            .set_tracked_address(&TrackedAddress::new("testchain", "TST", ADDR_X))
            .unwrap();
        let params = ScanParams {
            chain: "testchain".into(),
            asset_code: "TST".into(),
            concurrency: 1,
        };
        let scanner = Scanner::new(MockBlockchain::new(), database, params);
        scanner.client().add_block(
            1,
            vec![tx("t1", vec![TestIncomingOutput::new(10, ADDR_X)])],
        );

        scanner.scan_block(1).unwrap();
        assert!(scanner.get_scan_status(1).unwrap());
        assert!(scanner
            .database()
            .get_scan_record(BITCOIN_CHAIN, 1)
            .unwrap()
            .is_none());

        let filter = DepositFilter {
            chain: Some("testchain".into()),
            ..Default::default()
        };
        assert_eq!(scanner.list_deposits(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_scan_params_default() {
        let params: ScanParams = serde_json::from_str(r#"{ "concurrency": 8 }"#).unwrap();
        assert_eq!(
            params,
            ScanParams {
                concurrency: 8,
                ..Default::default()
            }
        );
        assert_eq!(params.chain, "bitcoin");
        assert_eq!(params.asset_code, "BTC");
    }

    #[cfg(feature = "rpc")]
    #[test]
    fn test_scanner_config() {
        use crate::blockchain::rpc::{Auth, RpcConfig};
        use bitcoin::Network;

        let config = ScannerConfig {
            blockchain: AnyBlockchainConfig::Rpc(RpcConfig {
                url: "127.0.0.1:18443".into(),
                auth: Auth::UserPass {
                    username: "user".into(),
                    password: "pass".into(),
                },
                network: Network::Regtest,
            }),
            database: AnyDatabaseConfig::Memory(()),
            params: ScanParams::default(),
        };

        let mut value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["blockchain"]["type"], "rpc");
        assert_eq!(value["database"], serde_json::json!({ "memory": null }));

        value.as_object_mut().unwrap().remove("params");
        let parsed: ScannerConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_deposit_txid_unique_across_blocks() {
        let scanner = get_scanner(&[ADDR_X]);
        let txid = Txid::hash(b"t1");
        scanner
            .database()
            .record_deposit_if_absent(&Deposit {
                txid,
                tracked_address: TrackedAddress::new(BITCOIN_CHAIN, BTC_ASSET_CODE, ADDR_X),
                amount: 1,
                height: 1,
                vout: 0,
                created_at: 0,
            })
            .unwrap();
        scanner.client().add_block(
            2,
            vec![tx("t1", vec![TestIncomingOutput::new(200_000, ADDR_X)])],
        );

        let report = scanner.scan_block(2).unwrap();
        assert_eq!(report.deposits_found, 1);
        assert_eq!(report.deposits_inserted, 0);

        let deposit = scanner.database().get_deposit(&txid).unwrap().unwrap();
        assert_eq!(deposit.amount, 1);
        assert_eq!(deposit.height, 1);
    }
}
