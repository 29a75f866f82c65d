//! Script representation, byte codec and evaluator
//!
//! A [`Script`] is an ordered list of [`Command`]s. Evaluation runs the
//! commands from a double-ended queue so that branch opcodes can consume their
//! bodies and an embedded redeem script can be spliced in front of whatever is
//! left:
//!
//! 1. Pop the next command
//! 2. Push data onto the stack; when the rest of the queue is exactly
//!    `OP_HASH160 <20 bytes> OP_EQUAL`, check the pushed bytes against the hash
//!    and run them as a script
//! 3. Run opcodes through [`crate::opcodes`]; any failure ends evaluation
//! 4. Succeed iff exactly one true element remains

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use crate::hash::hash160;
use crate::network::Network;
use crate::opcodes::{self, is_true, Opcode};
use crate::s256::S256Point;
use crate::serialization::{encode_varint, ReadBitcoinExt};
use crate::types::{ByteString, Hash160, StackElement};
use byteorder::{LittleEndian, ReadBytesExt};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::ops::Add;
use tracing::debug;

/// One script element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Op(Opcode),
    Push(ByteString),
    /// A byte with no assigned opcode; evaluating it fails the script
    Unknown(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script {
    commands: Vec<Command>,
}

fn truncated(_: io::Error) -> ConsensusError {
    ConsensusError::Parse("script ends inside a push".to_string())
}

impl Script {
    /// Empty pushes are stored as `OP_0`, the form they parse back to.
    pub fn new(commands: Vec<Command>) -> Self {
        let commands = commands
            .into_iter()
            .map(|command| match command {
                Command::Push(data) if data.is_empty() => Command::Op(Opcode::Op0),
                other => other,
            })
            .collect();
        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Read a varint length followed by that many script bytes.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let len = reader.read_varint()?;
        let mut raw = Vec::new();
        reader.by_ref().take(len).read_to_end(&mut raw)?;
        if raw.len() as u64 != len {
            return Err(ConsensusError::Parse(format!(
                "script declares {} bytes, only {} available",
                len,
                raw.len()
            )));
        }
        Self::parse_raw(&raw)
    }

    /// Decode script bytes without a length prefix.
    pub fn parse_raw(raw: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(raw);
        let mut commands = Vec::new();

        while (cursor.position() as usize) < raw.len() {
            let byte = cursor.read_u8().map_err(truncated)?;
            let len = match byte {
                0x01..=0x4b => byte as usize,
                // OP_PUSHDATA1
                0x4c => cursor.read_u8().map_err(truncated)? as usize,
                // OP_PUSHDATA2
                0x4d => cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize,
                // OP_PUSHDATA4
                0x4e => cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize,
                _ => {
                    commands.push(Opcode::from_byte(byte).map_or(Command::Unknown(byte), Command::Op));
                    continue;
                }
            };
            if len > raw.len() - cursor.position() as usize {
                return Err(ConsensusError::Parse(format!(
                    "push of {} bytes runs past end of script",
                    len
                )));
            }
            commands.push(Command::Push(cursor.read_bytes(len).map_err(truncated)?));
        }

        Ok(Self { commands })
    }

    /// Script bytes without the length prefix.
    pub fn raw_serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for command in &self.commands {
            match command {
                Command::Op(op) => out.push(op.to_byte()),
                Command::Unknown(byte) => out.push(*byte),
                Command::Push(data) => {
                    let len = data.len();
                    if len <= MAX_DIRECT_PUSH {
                        out.push(len as u8);
                    } else if len <= 0xff {
                        out.push(0x4c);
                        out.push(len as u8);
                    } else if len <= 0xffff {
                        out.push(0x4d);
                        out.extend_from_slice(&(len as u16).to_le_bytes());
                    } else {
                        out.push(0x4e);
                        out.extend_from_slice(&(len as u32).to_le_bytes());
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    /// Varint length followed by the script bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let raw = self.raw_serialize();
        let mut out = encode_varint(raw.len() as u64);
        out.extend(raw);
        out
    }

    /// OP_DUP OP_HASH160 <h160> OP_EQUALVERIFY OP_CHECKSIG
    pub fn p2pkh(h160: &Hash160) -> Self {
        Self::new(vec![
            Command::Op(Opcode::OpDup),
            Command::Op(Opcode::OpHash160),
            Command::Push(h160.to_vec()),
            Command::Op(Opcode::OpEqualVerify),
            Command::Op(Opcode::OpCheckSig),
        ])
    }

    /// OP_HASH160 <h160> OP_EQUAL
    pub fn p2sh(h160: &Hash160) -> Self {
        Self::new(vec![
            Command::Op(Opcode::OpHash160),
            Command::Push(h160.to_vec()),
            Command::Op(Opcode::OpEqual),
        ])
    }

    /// Bare m-of-n multisig over compressed keys, 1 <= m <= n <= 16.
    pub fn multisig(m: u8, keys: &[S256Point]) -> Result<Self> {
        let n = keys.len();
        if m == 0 || usize::from(m) > n || n > 16 {
            return Err(ConsensusError::OutOfRange(format!(
                "{}-of-{} multisig not supported",
                m, n
            )));
        }
        let small = |value: usize| {
            Opcode::small_int(value as u8)
                .map(Command::Op)
                .ok_or_else(|| ConsensusError::OutOfRange(format!("{} has no small-int opcode", value)))
        };
        let mut commands = vec![small(usize::from(m))?];
        commands.extend(keys.iter().map(|key| Command::Push(key.sec(true))));
        commands.push(small(n)?);
        commands.push(Command::Op(Opcode::OpCheckMultiSig));
        Ok(Self::new(commands))
    }

    fn pushed_hash(command: &Command) -> Option<Hash160> {
        match command {
            Command::Push(data) if data.len() == 20 => {
                let mut h160 = [0u8; 20];
                h160.copy_from_slice(data);
                Some(h160)
            }
            _ => None,
        }
    }

    /// The 20-byte hash of a pay-to-public-key-hash script
    pub fn p2pkh_hash(&self) -> Option<Hash160> {
        match self.commands.as_slice() {
            [Command::Op(Opcode::OpDup), Command::Op(Opcode::OpHash160), push, Command::Op(Opcode::OpEqualVerify), Command::Op(Opcode::OpCheckSig)] => {
                Self::pushed_hash(push)
            }
            _ => None,
        }
    }

    /// The 20-byte hash of a pay-to-script-hash script
    pub fn p2sh_hash(&self) -> Option<Hash160> {
        match self.commands.as_slice() {
            [Command::Op(Opcode::OpHash160), push, Command::Op(Opcode::OpEqual)] => {
                Self::pushed_hash(push)
            }
            _ => None,
        }
    }

    pub fn is_p2pkh(&self) -> bool {
        self.p2pkh_hash().is_some()
    }

    pub fn is_p2sh(&self) -> bool {
        self.p2sh_hash().is_some()
    }

    /// Address version byte followed by the script's hash, for Base58Check
    /// encoding by the caller. `None` for scripts with no address form.
    pub fn address_payload(&self, network: Network) -> Option<Vec<u8>> {
        let (prefix, h160) = match (self.p2pkh_hash(), self.p2sh_hash()) {
            (Some(h160), _) => (network.p2pkh_prefix(), h160),
            (_, Some(h160)) => (network.p2sh_prefix(), h160),
            _ => return None,
        };
        let mut payload = Vec::with_capacity(21);
        payload.push(prefix);
        payload.extend_from_slice(&h160);
        Some(payload)
    }

    /// Bytes of the final data push, the redeem script of a P2SH spend.
    pub fn last_push(&self) -> Option<&[u8]> {
        match self.commands.last() {
            Some(Command::Push(data)) => Some(data),
            _ => None,
        }
    }

    /// Run the script against sighash `z`.
    ///
    /// `flags` is a bit set of `SCRIPT_VERIFY_*` values.
    pub fn evaluate(&self, z: &BigUint, flags: u32) -> bool {
        let mut commands: VecDeque<Command> = self.commands.iter().cloned().collect();
        let mut stack: Vec<StackElement> = Vec::new();
        let mut altstack: Vec<StackElement> = Vec::new();

        while let Some(command) = commands.pop_front() {
            match command {
                Command::Op(op) => {
                    if !opcodes::execute(op, &mut stack, &mut altstack, &mut commands, z, flags) {
                        debug!(opcode = op.name(), "script failed");
                        return false;
                    }
                }
                Command::Unknown(byte) => {
                    debug!(byte, "unknown opcode");
                    return false;
                }
                Command::Push(data) => {
                    if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                        debug!(len = data.len(), "push exceeds element size limit");
                        return false;
                    }
                    match embedded_script_hash(&commands) {
                        Some(expected) => {
                            commands.clear();
                            if hash160(&data) != expected {
                                debug!("redeem script does not match script hash");
                                return false;
                            }
                            let redeem = match Script::parse_raw(&data) {
                                Ok(redeem) => redeem,
                                Err(e) => {
                                    debug!(error = %e, "redeem script does not parse");
                                    return false;
                                }
                            };
                            commands.extend(redeem.commands);
                        }
                        None => stack.push(data),
                    }
                }
            }
            if stack.len() + altstack.len() > MAX_STACK_SIZE {
                debug!("stack size limit exceeded");
                return false;
            }
        }

        match stack.as_slice() {
            [top] if is_true(top) => true,
            _ => {
                debug!(depth = stack.len(), "final stack is not a single true element");
                false
            }
        }
    }
}

/// Hash from a queue that is exactly `OP_HASH160 <20 bytes> OP_EQUAL`.
fn embedded_script_hash(commands: &VecDeque<Command>) -> Option<Hash160> {
    if commands.len() != 3 {
        return None;
    }
    match (&commands[0], &commands[2]) {
        (Command::Op(Opcode::OpHash160), Command::Op(Opcode::OpEqual)) => {
            Script::pushed_hash(&commands[1])
        }
        _ => None,
    }
}

impl Add for Script {
    type Output = Script;

    fn add(mut self, rhs: Script) -> Script {
        self.commands.extend(rhs.commands);
        self
    }
}

impl From<Vec<Command>> for Script {
    fn from(commands: Vec<Command>) -> Self {
        Self::new(commands)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match command {
                Command::Op(op) => write!(f, "{}", op.name())?,
                Command::Push(data) => write!(f, "{}", hex::encode(data))?,
                Command::Unknown(byte) => write!(f, "OP_UNKNOWN_{:#04x}", byte)?,
            }
        }
        Ok(())
    }
}
