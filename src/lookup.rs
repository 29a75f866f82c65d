//! Previous-transaction lookup
//!
//! A [`TxSource`] produces raw transaction bytes for an id; transport is the
//! implementor's concern. [`TxFetcher`] sits in front of a source, parses what
//! it returns, checks the id, and caches the result until it is invalidated or
//! a caller asks for a fresh copy.

use crate::error::{ConsensusError, Result};
use crate::network::Network;
use crate::tx::Tx;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Raw transaction bytes by id
pub trait TxSource {
    /// Bytes of transaction `tx_id` (64 hex characters, display order).
    fn fetch_raw(&self, tx_id: &str, network: Network) -> Result<Vec<u8>>;
}

type CacheKey = (Network, String);

/// Caching, id-checking front end to a [`TxSource`]
pub struct TxFetcher<S> {
    source: S,
    cache: Mutex<HashMap<CacheKey, Tx>>,
}

/// Read the extended serialization by dropping the marker and flag and taking
/// the locktime from the final four bytes.
fn parse_extended(raw: &[u8], network: Network) -> Result<Tx> {
    let mut stripped = raw[..4].to_vec();
    stripped.extend_from_slice(&raw[6..]);
    let mut tx = Tx::parse(&mut Cursor::new(&stripped), network)?;
    let mut locktime = [0u8; 4];
    locktime.copy_from_slice(&raw[raw.len() - 4..]);
    tx.locktime = u32::from_le_bytes(locktime);
    Ok(tx)
}

/// Parse fetched bytes for `tx_id`.
///
/// A legacy transaction with no inputs also starts `00 01` after the version,
/// so the extended reading is kept only when it reproduces the requested id.
fn parse_fetched(raw: &[u8], tx_id: &str, network: Network) -> Result<Tx> {
    if raw.len() > 10 && raw[4] == 0x00 && raw[5] == 0x01 {
        match parse_extended(raw, network) {
            Ok(tx) if tx.id() == tx_id => return Ok(tx),
            _ => debug!(tx_id, "not an extended serialization, reading as legacy"),
        }
    }
    Tx::parse_bytes(raw, network)
}

impl<S: TxSource> TxFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn cache(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, Tx>>> {
        self.cache
            .lock()
            .map_err(|_| ConsensusError::Lookup("transaction cache lock poisoned".to_string()))
    }

    /// Transaction `tx_id` on `network`; `fresh` bypasses and refreshes the cache.
    pub fn fetch(&self, tx_id: &str, network: Network, fresh: bool) -> Result<Tx> {
        let key = (network, tx_id.to_lowercase());
        if !fresh {
            if let Some(tx) = self.cache()?.get(&key) {
                debug!(tx_id, %network, "transaction cache hit");
                return Ok(tx.clone());
            }
        }

        debug!(tx_id, %network, fresh, "fetching transaction");
        let raw = self.source.fetch_raw(&key.1, network)?;
        let tx = parse_fetched(&raw, &key.1, network)?;
        let actual = tx.id();
        if actual != key.1 {
            debug!(expected = %key.1, %actual, "fetched transaction has a different id");
            return Err(ConsensusError::TxIdMismatch {
                expected: key.1,
                actual,
            });
        }

        self.cache()?.insert(key, tx.clone());
        Ok(tx)
    }

    /// Drop one cached transaction.
    pub fn invalidate(&self, tx_id: &str, network: Network) -> Result<()> {
        self.cache()?.remove(&(network, tx_id.to_lowercase()));
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.cache()?.clear();
        Ok(())
    }

    pub fn cached(&self) -> Result<usize> {
        Ok(self.cache()?.len())
    }
}

/// Transactions held in memory, keyed by id
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MemoryTxSource {
    transactions: HashMap<String, String>,
}

impl MemoryTxSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `tx` under its own id.
    pub fn insert(&mut self, tx: &Tx) {
        self.transactions.insert(tx.id(), hex::encode(tx.serialize()));
    }

    /// Store raw bytes under `tx_id` without checking them.
    pub fn insert_raw(&mut self, tx_id: &str, raw: &[u8]) {
        self.transactions.insert(tx_id.to_lowercase(), hex::encode(raw));
    }

    /// Load a JSON object mapping transaction ids to raw transaction hex.
    pub fn from_json(json: &str) -> Result<Self> {
        let source: Self = serde_json::from_str(json)
            .map_err(|e| ConsensusError::Parse(format!("transaction fixture: {}", e)))?;
        Ok(Self {
            transactions: source
                .transactions
                .into_iter()
                .map(|(id, raw)| (id.to_lowercase(), raw))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TxSource for MemoryTxSource {
    fn fetch_raw(&self, tx_id: &str, _network: Network) -> Result<Vec<u8>> {
        let raw = self
            .transactions
            .get(&tx_id.to_lowercase())
            .ok_or_else(|| ConsensusError::Lookup(format!("transaction {} not found", tx_id)))?;
        hex::decode(raw).map_err(|e| ConsensusError::Lookup(format!("transaction {}: {}", tx_id, e)))
    }
}
