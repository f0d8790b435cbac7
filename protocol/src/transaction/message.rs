//! Message compilation and the canonical message byte format.
//!
//! A [`Message`] is the thing that actually gets signed: a header, a
//! de-duplicated list of account keys, the recent blockhash and the
//! instructions with their accounts replaced by indexes into that list.
//!
//! # Account ordering
//!
//! Keys are grouped, in this order:
//!
//! 1. writable signers (the fee payer is always first)
//! 2. read-only signers
//! 3. writable non-signers
//! 4. read-only non-signers (program ids usually end up here)
//!
//! Within a group, first-seen order is preserved. The header records the
//! group sizes so the runtime can recover each key's role from its index.
//!
//! # Byte format
//!
//! ```text
//! u8  num_required_signatures
//! u8  num_readonly_signed_accounts
//! u8  num_readonly_unsigned_accounts
//! len account_keys, then 32 bytes each
//! [32] recent_blockhash
//! len instructions, each:
//!     u8  program_id_index
//!     len account indexes, then 1 byte each
//!     len data, then data bytes
//! ```
//!
//! `len` is a compact-u16 (see [`super::wire`]).

use serde::{Deserialize, Serialize};

use super::types::{AccountMeta, Hash, Instruction};
use super::wire::{encode_length, Reader, WireError};
use crate::config::{HASH_LENGTH, PUBKEY_LENGTH};
use crate::crypto::keys::Pubkey;

/// Role counts for the account key list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction whose program and accounts are indexes into
/// [`Message::account_keys`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message paid for by `payer`.
    ///
    /// Instruction order is preserved exactly. Two compilations that differ
    /// only in instruction order produce different bytes and therefore
    /// different signatures.
    pub fn compile(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: Hash,
    ) -> Result<Self, WireError> {
        let mut keys: Vec<AccountMeta> = vec![AccountMeta::new(*payer, true)];

        let mut upsert = |meta: AccountMeta| {
            match keys.iter_mut().find(|k| k.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => keys.push(meta),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(*meta);
            }
            upsert(AccountMeta::new_readonly(ix.program_id, false));
        }

        // Stable partition into the four role groups. The payer was inserted
        // first as a writable signer, so it stays at index 0.
        let group = |m: &AccountMeta| match (m.is_signer, m.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        keys.sort_by_key(group);

        // Header counts and instruction indices are single bytes.
        if keys.len() > usize::from(u8::MAX) {
            return Err(WireError::TooManyAccounts(keys.len()));
        }

        // Every count below is bounded by `keys.len()`, so none truncates.
        let count = |g: u8| keys.iter().filter(|m| group(*m) == g).count() as u8;
        let header = MessageHeader {
            num_required_signatures: count(0) + count(1),
            num_readonly_signed_accounts: count(1),
            num_readonly_unsigned_accounts: count(3),
        };

        let account_keys: Vec<Pubkey> = keys.iter().map(|m| m.pubkey).collect();
        let index_of = |pubkey: &Pubkey| -> u8 {
            // Every key referenced below was inserted above and the list is
            // capped at 255 entries.
            account_keys
                .iter()
                .position(|k| k == pubkey)
                .map(|i| i as u8)
                .unwrap_or_default()
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The fee payer: the first account key.
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Keys that must sign, in signature order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let h = &self.header;
        let signers = usize::from(h.num_required_signatures);
        if index >= self.account_keys.len() {
            return false;
        }
        if index < signers {
            index < signers - usize::from(h.num_readonly_signed_accounts)
        } else {
            index < self.account_keys.len() - usize::from(h.num_readonly_unsigned_accounts)
        }
    }

    /// Canonical bytes. This is exactly what gets signed.
    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(
            3 + 3 + self.account_keys.len() * PUBKEY_LENGTH + HASH_LENGTH + 64,
        );
        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        encode_length(&mut buf, self.account_keys.len())?;
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_ref());
        }

        buf.extend_from_slice(self.recent_blockhash.as_ref());

        encode_length(&mut buf, self.instructions.len())?;
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_length(&mut buf, ix.accounts.len())?;
            buf.extend_from_slice(&ix.accounts);
            encode_length(&mut buf, ix.data.len())?;
            buf.extend_from_slice(&ix.data);
        }
        Ok(buf)
    }

    /// Parse a standalone message. Trailing bytes are an error.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(bytes);
        let message = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }

    /// Parse a message from the current reader position.
    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        let header = MessageHeader {
            num_required_signatures: reader.read_u8()?,
            num_readonly_signed_accounts: reader.read_u8()?,
            num_readonly_unsigned_accounts: reader.read_u8()?,
        };

        let num_keys = reader.read_length()?;
        let mut account_keys = Vec::with_capacity(num_keys.min(256));
        for _ in 0..num_keys {
            account_keys.push(Pubkey::new_from_array(reader.read_array()?));
        }

        let recent_blockhash = Hash::new_from_array(reader.read_array()?);

        let num_ix = reader.read_length()?;
        let mut instructions = Vec::with_capacity(num_ix.min(64));
        for _ in 0..num_ix {
            let program_id_index = reader.read_u8()?;
            let accounts = reader.read_vec()?;
            let data = reader.read_vec()?;
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        let message = Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        };
        message.sanitize()?;
        Ok(message)
    }

    /// Structural checks: header counts fit the key list, the payer is a
    /// writable signer and every index points at a real key.
    pub fn sanitize(&self) -> Result<(), WireError> {
        let h = &self.header;
        let len = self.account_keys.len();
        if h.num_required_signatures == 0 {
            return Err(WireError::InvalidHeader("no required signatures"));
        }
        if h.num_readonly_signed_accounts >= h.num_required_signatures {
            return Err(WireError::InvalidHeader("fee payer must be writable"));
        }
        if usize::from(h.num_required_signatures) + usize::from(h.num_readonly_unsigned_accounts)
            > len
        {
            return Err(WireError::InvalidHeader("header counts exceed account keys"));
        }
        for ix in &self.instructions {
            for &index in std::iter::once(&ix.program_id_index).chain(ix.accounts.iter()) {
                if usize::from(index) >= len {
                    return Err(WireError::AccountIndexOutOfRange { index, len });
                }
            }
        }
        Ok(())
    }

    /// Expand compiled instructions back into [`Instruction`]s.
    pub fn decompile(&self) -> Result<Vec<Instruction>, WireError> {
        self.sanitize()?;
        Ok(self
            .instructions
            .iter()
            .map(|ix| Instruction {
                program_id: self.account_keys[usize::from(ix.program_id_index)],
                accounts: ix
                    .accounts
                    .iter()
                    .map(|&i| {
                        let i = usize::from(i);
                        AccountMeta {
                            pubkey: self.account_keys[i],
                            is_signer: self.is_signer(i),
                            is_writable: self.is_writable(i),
                        }
                    })
                    .collect(),
                data: ix.data.clone(),
            })
            .collect())
    }
}
