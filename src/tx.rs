//! Transactions: wire codec, identity, signature hash, signing and verification
//!
//! Previous outputs are never owned by a transaction. Each [`TxIn`] names one by
//! id and index, and everything that needs its amount or locking script goes
//! through a [`TxFetcher`].

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use crate::hash::hash256;
use crate::lookup::{TxFetcher, TxSource};
use crate::network::Network;
use crate::private_key::PrivateKey;
use crate::script::{Command, Script};
use crate::serialization::{encode_varint, ReadBitcoinExt};
use crate::types::{Hash, Natural};
use byteorder::{LittleEndian, ReadBytesExt};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read};
use tracing::debug;

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Id of the transaction being spent, in display byte order
    pub prev_tx: Hash,
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in satoshis
    pub amount: Natural,
    pub script_pubkey: Script,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub locktime: u32,
    pub network: Network,
}

impl TxIn {
    /// Input spending `prev_tx:prev_index` with an empty unlocking script.
    pub fn new(prev_tx: Hash, prev_index: u32) -> Self {
        Self {
            prev_tx,
            prev_index,
            script_sig: Script::default(),
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut prev_tx = reader.read_32_bytes()?;
        prev_tx.reverse();
        let prev_index = reader.read_u32::<LittleEndian>()?;
        let script_sig = Script::parse(reader)?;
        let sequence = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            prev_tx,
            prev_index,
            script_sig,
            sequence,
        })
    }

    fn serialize_with(&self, script_sig: &Script) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(self.prev_tx.iter().rev());
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        out.extend(script_sig.serialize());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with(&self.script_sig)
    }

    pub fn prev_tx_id(&self) -> String {
        hex::encode(self.prev_tx)
    }

    /// The transaction this input spends from.
    pub fn fetch_tx<S: TxSource>(&self, fetcher: &TxFetcher<S>, network: Network) -> Result<Tx> {
        fetcher.fetch(&self.prev_tx_id(), network, false)
    }

    fn prev_output<S: TxSource>(&self, fetcher: &TxFetcher<S>, network: Network) -> Result<TxOut> {
        let tx = self.fetch_tx(fetcher, network)?;
        tx.outputs
            .get(self.prev_index as usize)
            .cloned()
            .ok_or_else(|| {
                ConsensusError::Lookup(format!(
                    "{} has no output {}",
                    self.prev_tx_id(),
                    self.prev_index
                ))
            })
    }

    /// Amount of the output being spent.
    pub fn value<S: TxSource>(&self, fetcher: &TxFetcher<S>, network: Network) -> Result<Natural> {
        Ok(self.prev_output(fetcher, network)?.amount)
    }

    /// Locking script of the output being spent.
    pub fn script_pubkey<S: TxSource>(&self, fetcher: &TxFetcher<S>, network: Network) -> Result<Script> {
        Ok(self.prev_output(fetcher, network)?.script_pubkey)
    }
}

impl TxOut {
    pub fn new(amount: Natural, script_pubkey: Script) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let amount = reader.read_u64::<LittleEndian>()?;
        let script_pubkey = Script::parse(reader)?;
        Ok(Self {
            amount,
            script_pubkey,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.amount.to_le_bytes().to_vec();
        out.extend(self.script_pubkey.serialize());
        out
    }
}

impl Tx {
    pub fn new(version: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, locktime: u32, network: Network) -> Self {
        Self {
            version,
            inputs,
            outputs,
            locktime,
            network,
        }
    }

    /// Read one transaction in the legacy serialization, leaving any
    /// following bytes unread.
    pub fn parse<R: Read>(reader: &mut R, network: Network) -> Result<Self> {
        let version = reader.read_u32::<LittleEndian>()?;
        let input_count = reader.read_varint()?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(TxIn::parse(reader)?);
        }
        let output_count = reader.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TxOut::parse(reader)?);
        }
        let locktime = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            version,
            inputs,
            outputs,
            locktime,
            network,
        })
    }

    /// Parse a complete transaction; trailing bytes are an error.
    pub fn parse_bytes(bytes: &[u8], network: Network) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let tx = Self::parse(&mut cursor, network)?;
        if cursor.position() as usize != bytes.len() {
            return Err(ConsensusError::Parse(format!(
                "{} trailing bytes after transaction",
                bytes.len() - cursor.position() as usize
            )));
        }
        Ok(tx)
    }

    fn serialize_with(&self, script_for: impl Fn(usize, &TxIn) -> Script) -> Vec<u8> {
        let mut out = self.version.to_le_bytes().to_vec();
        out.extend(encode_varint(self.inputs.len() as u64));
        for (i, tx_in) in self.inputs.iter().enumerate() {
            out.extend(tx_in.serialize_with(&script_for(i, tx_in)));
        }
        out.extend(encode_varint(self.outputs.len() as u64));
        for tx_out in &self.outputs {
            out.extend(tx_out.serialize());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with(|_, tx_in| tx_in.script_sig.clone())
    }

    /// hash256 of the serialization, in display byte order.
    pub fn hash(&self) -> Hash {
        let mut hash = hash256(&self.serialize());
        hash.reverse();
        hash
    }

    /// Hex transaction id.
    pub fn id(&self) -> String {
        hex::encode(self.hash())
    }

    /// Input value minus output value; negative when the outputs overspend.
    pub fn fee<S: TxSource>(&self, fetcher: &TxFetcher<S>) -> Result<i64> {
        let mut total: i128 = 0;
        for tx_in in &self.inputs {
            total += i128::from(tx_in.value(fetcher, self.network)?);
        }
        for tx_out in &self.outputs {
            total -= i128::from(tx_out.amount);
        }
        i64::try_from(total).map_err(|_| ConsensusError::OutOfRange(format!("fee {} does not fit", total)))
    }

    fn check_index(&self, index: usize) -> Result<&TxIn> {
        self.inputs.get(index).ok_or(ConsensusError::InputIndex(index))
    }

    /// Digest signed by input `index` when its signing script is `script_code`.
    fn sig_hash_with(&self, index: usize, script_code: &Script) -> BigUint {
        let mut preimage = self.serialize_with(|i, _| {
            if i == index {
                script_code.clone()
            } else {
                Script::default()
            }
        });
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        BigUint::from_bytes_be(&hash256(&preimage))
    }

    /// SIGHASH_ALL digest for input `index`.
    ///
    /// The input's unlocking script is replaced by `redeem_script` when given,
    /// otherwise by the locking script of the output it spends; every other
    /// input gets an empty script.
    pub fn sig_hash<S: TxSource>(
        &self,
        index: usize,
        redeem_script: Option<&Script>,
        fetcher: &TxFetcher<S>,
    ) -> Result<BigUint> {
        let tx_in = self.check_index(index)?;
        let script_code = match redeem_script {
            Some(redeem) => redeem.clone(),
            None => tx_in.script_pubkey(fetcher, self.network)?,
        };
        Ok(self.sig_hash_with(index, &script_code))
    }

    pub fn verify_input<S: TxSource>(&self, index: usize, fetcher: &TxFetcher<S>) -> Result<bool> {
        self.verify_input_with_flags(index, fetcher, SCRIPT_VERIFY_NONE)
    }

    /// Evaluate unlocking ++ locking script for input `index`.
    ///
    /// Script failures, including an unparseable P2SH redeem script, are
    /// `Ok(false)`; only lookup and index problems are errors.
    pub fn verify_input_with_flags<S: TxSource>(
        &self,
        index: usize,
        fetcher: &TxFetcher<S>,
        flags: u32,
    ) -> Result<bool> {
        let tx_in = self.check_index(index)?;
        let script_pubkey = tx_in.script_pubkey(fetcher, self.network)?;

        let script_code = if script_pubkey.is_p2sh() {
            match redeem_script(index, tx_in) {
                Some(redeem) => redeem,
                None => return Ok(false),
            }
        } else {
            script_pubkey.clone()
        };

        let z = self.sig_hash_with(index, &script_code);
        let combined = tx_in.script_sig.clone() + script_pubkey;
        let valid = combined.evaluate(&z, flags);
        debug!(input = index, valid, "input evaluated");
        Ok(valid)
    }

    /// DER signature with the SIGHASH_ALL byte appended, for input `index`.
    pub fn signature_for<S: TxSource>(
        &self,
        index: usize,
        key: &PrivateKey,
        redeem_script: Option<&Script>,
        fetcher: &TxFetcher<S>,
    ) -> Result<Vec<u8>> {
        let z = self.sig_hash(index, redeem_script, fetcher)?;
        let mut sig = key.sign(&z)?.der();
        sig.push(SIGHASH_ALL as u8);
        Ok(sig)
    }

    /// Install a `<sig> <compressed pubkey>` unlocking script on input `index`
    /// and report whether the input now verifies.
    ///
    /// For a P2SH spend the digest commits to the redeem script in the last
    /// push of the unlocking script already on the input.
    pub fn sign_input<S: TxSource>(
        &mut self,
        index: usize,
        key: &PrivateKey,
        fetcher: &TxFetcher<S>,
    ) -> Result<bool> {
        let tx_in = self.check_index(index)?;
        let redeem = if tx_in.script_pubkey(fetcher, self.network)?.is_p2sh() {
            redeem_script(index, tx_in)
        } else {
            None
        };
        let sig = self.signature_for(index, key, redeem.as_ref(), fetcher)?;
        let sec = key.point().sec(true);
        self.inputs[index].script_sig = Script::new(vec![Command::Push(sig), Command::Push(sec)]);
        self.verify_input(index, fetcher)
    }

    pub fn verify<S: TxSource>(&self, fetcher: &TxFetcher<S>) -> Result<bool> {
        self.verify_with_flags(fetcher, SCRIPT_VERIFY_NONE)
    }

    /// Non-negative fee and every input verifies.
    pub fn verify_with_flags<S: TxSource>(&self, fetcher: &TxFetcher<S>, flags: u32) -> Result<bool> {
        let fee = self.fee(fetcher)?;
        if fee < 0 {
            debug!(fee, tx = %self.id(), "outputs exceed inputs");
            return Ok(false);
        }
        for index in 0..self.inputs.len() {
            if !self.verify_input_with_flags(index, fetcher, flags)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Verify each input independently; a lookup failure on one input does
    /// not stop the others.
    pub fn verify_inputs<S: TxSource>(&self, fetcher: &TxFetcher<S>) -> Vec<Result<bool>> {
        (0..self.inputs.len())
            .map(|index| self.verify_input(index, fetcher))
            .collect()
    }
}

/// Redeem script carried by the last push of a P2SH spend's unlocking script.
fn redeem_script(index: usize, tx_in: &TxIn) -> Option<Script> {
    match tx_in.script_sig.last_push().map(Script::parse_raw) {
        Some(Ok(redeem)) => Some(redeem),
        Some(Err(e)) => {
            debug!(input = index, error = %e, "redeem script does not parse");
            None
        }
        None => {
            debug!(input = index, "P2SH spend without a redeem script push");
            None
        }
    }
}

impl fmt::Display for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tx: {}", self.id())?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "inputs:")?;
        for tx_in in &self.inputs {
            writeln!(f, "  {}:{}", tx_in.prev_tx_id(), tx_in.prev_index)?;
        }
        writeln!(f, "outputs:")?;
        for tx_out in &self.outputs {
            writeln!(f, "  {}:{}", tx_out.amount, tx_out.script_pubkey)?;
        }
        write!(f, "locktime: {}", self.locktime)
    }
}
