//! Instruction encoders for the three programs a transfer ever touches,
//! plus program-derived address (PDA) derivation.
//!
//! | program | instruction | data |
//! |---|---|---|
//! | System | `Transfer` | `u32 LE 2` then `u64 LE lamports` |
//! | SPL Token | `Transfer` | `u8 3` then `u64 LE amount` |
//! | Associated Token Account | `Create` | `u8 0` |
//!
//! The program semantics live on-chain. All we do here is put the right
//! bytes and accounts in the right order.

use thiserror::Error;

use super::types::{AccountMeta, Instruction};
use crate::config::{MAX_SEEDS, MAX_SEED_LEN, PDA_MARKER};
use crate::crypto::hash::sha256v;
use crate::crypto::keys::Pubkey;

// ---------------------------------------------------------------------------
// Program ids
// ---------------------------------------------------------------------------

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79, 0xac,
    0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff, 0x00, 0xa9,
]);

/// `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d, 0x83,
    0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9, 0xf8, 0x59,
]);

const SYSTEM_TRANSFER_INDEX: u32 = 2;
const TOKEN_TRANSFER_TAG: u8 = 3;
const ATA_CREATE_TAG: u8 = 0;

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

/// Move `lamports` of the native currency from `from` to `to`.
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

/// Move `amount` base units between two token holding accounts.
///
/// `source` and `destination` are holding accounts, not wallets; `owner` is
/// the wallet that owns `source` and signs.
pub fn token_transfer(
    source: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(TOKEN_TRANSFER_TAG);
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data,
    }
}

/// Create `wallet`'s holding account for `mint`, paid for by `payer`.
pub fn create_associated_token_account(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, PdaError> {
    let holding = associated_token_address(wallet, mint)?;
    Ok(Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(holding, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![ATA_CREATE_TAG],
    })
}

// ---------------------------------------------------------------------------
// Program-derived addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PdaError {
    #[error("too many seeds (max 16)")]
    TooManySeeds,

    #[error("seed longer than 32 bytes")]
    SeedTooLong,

    #[error("derived address is on the ed25519 curve")]
    OnCurve,

    /// 256 bumps and every one of them landed on the curve. Each bump has
    /// roughly even odds, so this is about as likely as a cosmic ray
    /// flipping the right bit in the right register.
    #[error("no viable bump seed")]
    NoViableBump,
}

/// `sha256(seeds || program_id || "ProgramDerivedAddress")`, rejected if the
/// result is a valid curve point (someone could hold its private key).
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey, PdaError> {
    if seeds.len() > MAX_SEEDS {
        return Err(PdaError::TooManySeeds);
    }
    if seeds.iter().any(|s| s.len() > MAX_SEED_LEN) {
        return Err(PdaError::SeedTooLong);
    }

    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 2);
    parts.extend_from_slice(seeds);
    parts.push(program_id.as_ref());
    parts.push(PDA_MARKER);

    let candidate = Pubkey::new_from_array(sha256v(&parts));
    if candidate.is_on_curve() {
        return Err(PdaError::OnCurve);
    }
    Ok(candidate)
}

/// Search bumps from 255 down and return the first off-curve address with
/// its bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), PdaError> {
    // One slot is reserved for the bump itself.
    if seeds.len() >= MAX_SEEDS {
        return Err(PdaError::TooManySeeds);
    }
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(PdaError::OnCurve) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(PdaError::NoViableBump)
}

/// The holding account that stores `wallet`'s balance of `mint`.
///
/// Pure: no network call, same inputs always give the same address.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey, PdaError> {
    find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
