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
use std::path::Path;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::hash_types::Txid;

use crate::database::{AddressDirectory, ConfigurableDatabase, DepositLedger, ScanState};
use crate::error::Error;
use crate::types::*;

use rusqlite::{named_params, Connection, Row};

static MIGRATIONS: &[&str] = &[
    "CREATE TABLE version (version INTEGER)",
    "INSERT INTO version VALUES (1)",
    "CREATE TABLE tracked_addresses (chain TEXT, asset_code TEXT, address TEXT);",
    "CREATE UNIQUE INDEX idx_tracked_addresses ON tracked_addresses(chain, asset_code, address);",
    "CREATE TABLE deposits (txid BLOB, chain TEXT, asset_code TEXT, address TEXT, amount INTEGER, height INTEGER, vout INTEGER, created_at INTEGER);",
    "CREATE UNIQUE INDEX idx_deposits_txid ON deposits(txid);",
    "CREATE INDEX idx_deposits_address ON deposits(chain, asset_code, address);",
    "CREATE INDEX idx_deposits_height ON deposits(height);",
    "CREATE TABLE block_scan_records (chain TEXT, height INTEGER, has_completed_scan BOOLEAN DEFAULT 0);",
    "CREATE UNIQUE INDEX idx_block_scan_records ON block_scan_records(chain, height);",
];

const DEPOSIT_COLUMNS: &str = "txid, chain, asset_code, address, amount, height, vout, created_at";

/// Sqlite database stored on filesystem
///
/// This is a permanent storage solution for devices and platforms that provide a filesystem.
///
/// Uniqueness of deposits is enforced by a `UNIQUE` index on the txid, so concurrent
/// [`record_deposit_if_absent`](DepositLedger::record_deposit_if_absent) calls can't both insert.
#[derive(Debug)]
pub struct SqliteDatabase {
    /// Path on the local filesystem to store the sqlite file
    pub path: PathBuf,
    /// A rusqlite connection object to the sqlite database
    connection: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Instantiate a new SqliteDatabase instance by creating a connection
    /// to the database stored at path
    pub fn new<T: AsRef<Path>>(path: T) -> Result<Self, Error> {
        let connection = get_connection(&path)?;
        Ok(SqliteDatabase {
            path: PathBuf::from(path.as_ref()),
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::Generic("sqlite connection lock poisoned".into()))
    }
}

fn deposit_from_row(row: &Row) -> Result<Deposit, Error> {
    let txid: Vec<u8> = row.get(0)?;
    let chain: String = row.get(1)?;
    let asset_code: String = row.get(2)?;
    let address: String = row.get(3)?;

    Ok(Deposit {
        txid: deserialize(&txid)?,
        tracked_address: TrackedAddress {
            chain,
            asset_code,
            address,
        },
        amount: row.get(4)?,
        height: row.get(5)?,
        vout: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl AddressDirectory for SqliteDatabase {
    fn set_tracked_address(&self, address: &TrackedAddress) -> Result<(), Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("INSERT OR IGNORE INTO tracked_addresses (chain, asset_code, address) VALUES (:chain, :asset_code, :address)")?;
        statement.execute(named_params! {
            ":chain": address.chain,
            ":asset_code": address.asset_code,
            ":address": address.address,
        })?;

        Ok(())
    }

    fn get_tracked_address(
        &self,
        chain: &str,
        asset_code: &str,
        address: &str,
    ) -> Result<Option<TrackedAddress>, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT chain, asset_code, address FROM tracked_addresses WHERE chain = :chain AND asset_code = :asset_code AND address = :address")?;
        let mut rows = statement.query(named_params! {
            ":chain": chain,
            ":asset_code": asset_code,
            ":address": address,
        })?;

        match rows.next()? {
            Some(row) => Ok(Some(TrackedAddress {
                chain: row.get(0)?,
                asset_code: row.get(1)?,
                address: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    fn iter_tracked_addresses(
        &self,
        chain: &str,
        asset_code: &str,
    ) -> Result<Vec<TrackedAddress>, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT chain, asset_code, address FROM tracked_addresses WHERE chain = :chain AND asset_code = :asset_code")?;
        let mut rows = statement.query(named_params! {
            ":chain": chain,
            ":asset_code": asset_code,
        })?;

        let mut addresses = vec![];
        while let Some(row) = rows.next()? {
            addresses.push(TrackedAddress {
                chain: row.get(0)?,
                asset_code: row.get(1)?,
                address: row.get(2)?,
            });
        }

        Ok(addresses)
    }
}

impl DepositLedger for SqliteDatabase {
    fn record_deposit_if_absent(&self, deposit: &Deposit) -> Result<bool, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(&format!(
            "INSERT OR IGNORE INTO deposits ({}) VALUES (:txid, :chain, :asset_code, :address, :amount, :height, :vout, :created_at)",
            DEPOSIT_COLUMNS
        ))?;
        let changed = statement.execute(named_params! {
            ":txid": serialize(&deposit.txid),
            ":chain": deposit.tracked_address.chain,
            ":asset_code": deposit.tracked_address.asset_code,
            ":address": deposit.tracked_address.address,
            ":amount": deposit.amount,
            ":height": deposit.height,
            ":vout": deposit.vout,
            ":created_at": deposit.created_at,
        })?;

        Ok(changed > 0)
    }

    fn get_deposit(&self, txid: &Txid) -> Result<Option<Deposit>, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(&format!(
            "SELECT {} FROM deposits WHERE txid = :txid",
            DEPOSIT_COLUMNS
        ))?;
        let mut rows = statement.query(named_params! {":txid": serialize(txid)})?;

        match rows.next()? {
            Some(row) => Ok(Some(deposit_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn iter_deposits(&self, filter: &DepositFilter) -> Result<Vec<Deposit>, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(&format!(
            "SELECT {} FROM deposits \
             WHERE (:chain IS NULL OR chain = :chain) \
             AND (:asset_code IS NULL OR asset_code = :asset_code) \
             AND (:address IS NULL OR address = :address) \
             AND (:min_height IS NULL OR height >= :min_height) \
             AND (:max_height IS NULL OR height <= :max_height) \
             ORDER BY height, txid",
            DEPOSIT_COLUMNS
        ))?;
        let mut rows = statement.query(named_params! {
            ":chain": filter.chain,
            ":asset_code": filter.asset_code,
            ":address": filter.address,
            ":min_height": filter.min_height,
            ":max_height": filter.max_height,
        })?;

        let mut deposits = vec![];
        while let Some(row) = rows.next()? {
            deposits.push(deposit_from_row(row)?);
        }

        Ok(deposits)
    }
}

impl ScanState for SqliteDatabase {
    fn insert_pending_block(&self, chain: &str, height: u32) -> Result<bool, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("INSERT OR IGNORE INTO block_scan_records (chain, height, has_completed_scan) VALUES (:chain, :height, 0)")?;
        let changed = statement.execute(named_params! {
            ":chain": chain,
            ":height": height,
        })?;

        Ok(changed > 0)
    }

    fn mark_scanned(&self, chain: &str, height: u32) -> Result<(), Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("INSERT INTO block_scan_records (chain, height, has_completed_scan) VALUES (:chain, :height, 1) ON CONFLICT(chain, height) DO UPDATE SET has_completed_scan=1")?;
        statement.execute(named_params! {
            ":chain": chain,
            ":height": height,
        })?;

        Ok(())
    }

    fn get_scan_record(&self, chain: &str, height: u32) -> Result<Option<BlockScanRecord>, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT has_completed_scan FROM block_scan_records WHERE chain = :chain AND height = :height")?;
        let mut rows = statement.query(named_params! {
            ":chain": chain,
            ":height": height,
        })?;

        match rows.next()? {
            Some(row) => Ok(Some(BlockScanRecord {
                chain: chain.to_string(),
                height,
                has_completed_scan: row.get(0)?,
            })),
            None => Ok(None),
        }
    }

    fn iter_pending_blocks(&self, chain: &str) -> Result<Vec<BlockScanRecord>, Error> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT height FROM block_scan_records WHERE chain = :chain AND has_completed_scan = 0 ORDER BY height")?;
        let mut rows = statement.query(named_params! {":chain": chain})?;

        let mut records = vec![];
        while let Some(row) = rows.next()? {
            records.push(BlockScanRecord {
                chain: chain.to_string(),
                height: row.get(0)?,
                has_completed_scan: false,
            });
        }

        Ok(records)
    }
}

impl ConfigurableDatabase for SqliteDatabase {
    type Config = crate::database::any::SqliteDbConfiguration;

    fn from_config(config: &Self::Config) -> Result<Self, Error> {
        SqliteDatabase::new(&config.path)
    }
}

pub fn get_connection<T: AsRef<Path>>(path: &T) -> Result<Connection, Error> {
    let mut connection = Connection::open(path)?;
    migrate(&mut connection)?;
    Ok(connection)
}

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    let statement = conn.prepare_cached("SELECT version FROM version");
    match statement {
        Err(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
            if msg == "no such table: version" {
                Ok(0)
            } else {
                Err(rusqlite::Error::SqliteFailure(e, Some(msg)))
            }
        }
        Ok(mut stmt) => {
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => {
                    let version: i32 = row.get(0)?;
                    Ok(version)
                }
                None => Ok(0),
            }
        }
        _ => Ok(0),
    }
}

pub fn set_schema_version(conn: &Connection, version: i32) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE version SET version=:version",
        named_params! {":version": version},
    )
}

pub fn migrate(conn: &mut Connection) -> Result<(), Error> {
    let version = get_schema_version(conn)?;
    let stmts = &MIGRATIONS[(version as usize)..];

    // all migration statements and the new schema version commit or rollback together
    let tx = conn.transaction()?;

    let new_version = stmts
        .iter()
        .enumerate()
        .map(|version_stmt| {
            log::info!(
                "executing db migration {}: `{}`",
                version + version_stmt.0 as i32 + 1,
                version_stmt.1
            );
            tx.execute(version_stmt.1, [])
                .map(|_| version_stmt.0 as i32 + version + 1)
        })
        .last()
        .transpose()?;

    if let Some(version) = new_version {
        set_schema_version(&tx, version)?;
    } else {
        log::info!("db up to date, no migration needed");
    }

    tx.commit()?;
    Ok(())
}
