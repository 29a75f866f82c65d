//! Wire-format helpers: varint (CompactSize) and fixed-width little-endian fields

use crate::error::{ConsensusError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io;

/// Extends [`io::Read`] with Bitcoin wire-format readers.
pub trait ReadBitcoinExt: io::Read {
    /// Reads a `u64` using the Bitcoin varint (CompactSize) encoding.
    ///
    /// Non-canonical encodings (a value that fits a shorter form) are rejected.
    fn read_varint(&mut self) -> Result<u64> {
        let flag_byte = self.read_u8()?;
        match flag_byte {
            n @ 0x00..=0xfc => Ok(n as u64),
            0xfd => match self.read_u16::<LittleEndian>()? {
                n @ 0x00fd..=0xffff => Ok(n as u64),
                _ => Err(ConsensusError::Parse("non-canonical varint".to_string())),
            },
            0xfe => match self.read_u32::<LittleEndian>()? {
                n @ 0x0001_0000..=0xffff_ffff => Ok(n as u64),
                _ => Err(ConsensusError::Parse("non-canonical varint".to_string())),
            },
            0xff => match self.read_u64::<LittleEndian>()? {
                n @ 0x1_0000_0000..=0xffff_ffff_ffff_ffff => Ok(n),
                _ => Err(ConsensusError::Parse("non-canonical varint".to_string())),
            },
        }
    }

    /// Reads exactly 32 bytes.
    fn read_32_bytes(&mut self) -> io::Result<[u8; 32]> {
        let mut bytes = [0u8; 32];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads exactly `len` bytes into a fresh buffer.
    fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

impl<R: io::Read + ?Sized> ReadBitcoinExt for R {}

/// Encode an integer as a varint byte string
pub fn encode_varint(n: u64) -> Vec<u8> {
    match n {
        0x00..=0xfc => vec![n as u8],
        0xfd..=0xffff => {
            let mut bytes = vec![0xfd];
            bytes.extend_from_slice(&(n as u16).to_le_bytes());
            bytes
        }
        0x1_0000..=0xffff_ffff => {
            let mut bytes = vec![0xfe];
            bytes.extend_from_slice(&(n as u32).to_le_bytes());
            bytes
        }
        _ => {
            let mut bytes = vec![0xff];
            bytes.extend_from_slice(&n.to_le_bytes());
            bytes
        }
    }
}

/// Decode a varint from the front of `bytes`, returning the value and bytes consumed
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut cursor = io::Cursor::new(bytes);
    let value = cursor.read_varint()?;
    Ok((value, cursor.position() as usize))
}
