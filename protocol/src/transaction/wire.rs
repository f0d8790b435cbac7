//! Low-level wire encoding.
//!
//! The ledger's transaction format is a hand-rolled binary layout where
//! every variable-length sequence is prefixed by a "compact-u16" (a.k.a.
//! shortvec) length: little-endian base-128, at most three bytes, value at
//! most `u16::MAX`. Everything else is fixed-width.
//!
//! serde/bincode are intentionally not used here: bincode's length prefixes
//! are fixed 8-byte integers, which is not what the network speaks.

use thiserror::Error;

/// Errors from encoding or decoding wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unexpected end of input: needed {needed} more bytes, {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("compact-u16 length overflows u16")]
    LengthOverflow,

    #[error("compact-u16 length is not minimally encoded")]
    NonCanonicalLength,

    #[error("{0} trailing bytes after the end of the transaction")]
    TrailingBytes(usize),

    #[error("account index {index} out of range ({len} account keys)")]
    AccountIndexOutOfRange { index: u8, len: usize },

    #[error("too many accounts: {0} (max 255)")]
    TooManyAccounts(usize),

    #[error("signature count {signatures} does not match required signers {required}")]
    SignatureCountMismatch { signatures: usize, required: usize },

    #[error("invalid message header: {0}")]
    InvalidHeader(&'static str),
}

/// Append a compact-u16 length prefix.
pub fn encode_length(buf: &mut Vec<u8>, len: usize) -> Result<(), WireError> {
    let mut rem = u16::try_from(len).map_err(|_| WireError::LengthOverflow)?;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// A bounds-checked cursor over a byte slice.
///
/// Every read either returns exactly what was asked for or an
/// [`WireError::UnexpectedEof`]; nothing here can panic on hostile input.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a compact-u16 length prefix. Rejects overlong and non-minimal
    /// encodings so that every message has exactly one byte representation.
    pub fn read_length(&mut self) -> Result<usize, WireError> {
        let mut value: u32 = 0;
        for i in 0..3 {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                if i > 0 && byte == 0 {
                    return Err(WireError::NonCanonicalLength);
                }
                return u16::try_from(value)
                    .map(usize::from)
                    .map_err(|_| WireError::LengthOverflow);
            }
        }
        Err(WireError::LengthOverflow)
    }

    /// Read a length-prefixed byte vector.
    pub fn read_vec(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_length()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }
}
