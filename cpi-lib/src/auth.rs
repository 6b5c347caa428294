//! Device-lock authentication for CPI containers
//!
//! Every CPI container embeds an 80-byte CSEC blob. Packs that are not tied
//! to a device carry a fixed blob. Device-locked packs carry a blob whose
//! inner key is folded from the target device's identifier, so only a
//! device that folds its own identifier to the same key can open it.
//!
//! # Locked CSEC construction
//!
//! 1. Fold the device identifier into a 16-byte key slot
//! 2. Draw a 16-byte random first block
//! 3. Derive the second block: `second[j] = slot[j] + first[15 - j]` (mod 256)
//! 4. AIRI = DES-CBC(pad(first)) under [`AIRI_KEY`] (24 bytes)
//! 5. AIVF = 3DES-EDE-CBC(second) under the slot expanded to 24 bytes (16 bytes)
//! 6. Wrap as `ABCF(version) ++ ABEI(AIRI ++ AIVF)`, pad, and DES-CBC it
//!    under [`PAYLOAD_KEY`] (80 bytes)
//!
//! # Keys
//!
//! - Payload and CSEC outer layer: [`PAYLOAD_KEY`]
//! - AIRI sub-blob: [`AIRI_KEY`]
//! - AIVF sub-blob: derived per device by [`expand_key`]
//!
//! # Placeholder constants
//!
//! [`PAYLOAD_KEY`], [`AIRI_KEY`], [`KEY_FOLD_PAD`], [`KEY_EXPANSION_INDEX`]
//! and [`UNLOCKED_CSEC`] are fixed stand-ins, not the firmware's values.
//! Containers built with them have the right structure but a device will
//! reject them until the real values are substituted here.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::chunk::{self, Chunk, Tag};
use crate::cipher::{des_cbc_encrypt, triple_des_cbc_encrypt, vendor_pad};
use crate::constants::{
    AIRI_SIZE, AIVF_SIZE, CSEC_BLOCK_SIZE, CSEC_SIZE, CSEC_VERSION, DEVICE_ID_MAX_LEN, KEY_SLOT_SIZE,
    TRIPLE_DES_KEY_SIZE,
};
use crate::des::Key;
use crate::error::CpiError;

/// DES key for the encrypted payload and the outer CSEC layer (placeholder)
pub const PAYLOAD_KEY: Key = [0x24, 0xda, 0x9d, 0x68, 0x32, 0x95, 0xdd, 0xd1];

/// DES key for the AIRI sub-blob (placeholder)
pub const AIRI_KEY: Key = [0x6b, 0xa4, 0x7b, 0x4f, 0x9d, 0xc8, 0xc3, 0xce];

/// Fill table used when folding identifiers shorter than 16 bytes (placeholder)
#[rustfmt::skip]
pub const KEY_FOLD_PAD: [u8; KEY_SLOT_SIZE] = [
    0x58, 0x38, 0xe0, 0xbb, 0x68, 0x94, 0xa2, 0xa3,
    0x99, 0xf9, 0x65, 0x65, 0x74, 0xe6, 0x9e, 0xf3,
];

/// Key-slot byte pairs XORed into each byte of the 24-byte AIVF key.
/// Entries `2n` and `2n + 1` produce output byte `n`. Placeholder values.
#[rustfmt::skip]
pub const KEY_EXPANSION_INDEX: [u8; 2 * TRIPLE_DES_KEY_SIZE] = [
     8,  4, 11, 14,  1,  6,  9, 15,  6, 12,  0,  5, 14,  3,  6,  3,
     7, 11,  6,  3,  6,  4,  8, 10, 11,  4,  0,  4,  6, 11,  9,  3,
     7,  8,  4,  0, 10,  9,  8, 10, 10, 15, 12, 14, 13,  8,  7,  6,
];

/// CSEC blob for packs that are not locked to a device (placeholder)
#[rustfmt::skip]
pub const UNLOCKED_CSEC: [u8; CSEC_SIZE] = [
    0x55, 0x39, 0xd0, 0x0e, 0x58, 0x99, 0xcb, 0xe2, 0xbf, 0x42, 0xc1, 0x47, 0x24, 0x9d, 0xcc, 0xa5,
    0x3e, 0x0c, 0x5f, 0x40, 0xa0, 0xbe, 0x9a, 0xc7, 0xaa, 0x0d, 0x31, 0x1c, 0x63, 0x51, 0x5a, 0xcc,
    0x47, 0xc3, 0xad, 0x3c, 0xab, 0xea, 0x64, 0x1b, 0xc5, 0x0a, 0x6f, 0x3b, 0xd3, 0xb2, 0xd3, 0xd3,
    0x38, 0x21, 0xfa, 0x81, 0x35, 0xdc, 0x72, 0xd7, 0xd9, 0x02, 0x0c, 0x43, 0xd2, 0x93, 0xd3, 0x75,
    0x35, 0x48, 0x1a, 0x91, 0x56, 0xcd, 0x3f, 0x65, 0x1b, 0xc3, 0x94, 0x3f, 0xfe, 0x50, 0xdc, 0x58,
];

/// 16-byte key folded from a device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot {
    pub bytes: [u8; KEY_SLOT_SIZE],
}

impl KeySlot {
    pub fn from_bytes(bytes: [u8; KEY_SLOT_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SLOT_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Display for KeySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.bytes))
    }
}

/// Fold a device identifier into a key slot.
///
/// At most 128 bytes of the identifier are used. Identifiers of 16 bytes
/// or more are zero-padded to 128 bytes and the eight 16-byte slices are
/// XORed together. Shorter identifiers are copied as-is and the remaining
/// bytes are [`KEY_FOLD_PAD`] XORed with the identifier repeated.
pub fn derive_key_slot(device_id: &str) -> Result<KeySlot, CpiError> {
    let mut id = device_id.as_bytes();
    if id.is_empty() {
        return Err(CpiError::EmptyDeviceId);
    }
    if id.len() > DEVICE_ID_MAX_LEN {
        warn!(len = id.len(), "Device identifier longer than {} bytes; truncating", DEVICE_ID_MAX_LEN);
        id = &id[..DEVICE_ID_MAX_LEN];
    }

    let mut slot = [0u8; KEY_SLOT_SIZE];
    if id.len() >= KEY_SLOT_SIZE {
        let mut buffer = [0u8; DEVICE_ID_MAX_LEN];
        buffer[..id.len()].copy_from_slice(id);
        for slice in buffer.chunks_exact(KEY_SLOT_SIZE) {
            for (out, b) in slot.iter_mut().zip(slice) {
                *out ^= b;
            }
        }
    } else {
        slot[..id.len()].copy_from_slice(id);
        for i in id.len()..KEY_SLOT_SIZE {
            slot[i] = KEY_FOLD_PAD[i] ^ id[i % id.len()];
        }
    }
    Ok(KeySlot::from_bytes(slot))
}

/// Spread a key slot into the three DES keys of the AIVF cipher.
pub fn expand_key(slot: &KeySlot) -> [u8; TRIPLE_DES_KEY_SIZE] {
    let mut key = [0u8; TRIPLE_DES_KEY_SIZE];
    for (out, pair) in key.iter_mut().zip(KEY_EXPANSION_INDEX.chunks_exact(2)) {
        *out = slot.bytes[pair[0] as usize] ^ slot.bytes[pair[1] as usize];
    }
    key
}

/// `second[j] = slot[j] + first[15 - j]`, wrapping.
pub fn derive_second_block(slot: &KeySlot, first: &[u8; CSEC_BLOCK_SIZE]) -> [u8; CSEC_BLOCK_SIZE] {
    let mut second = [0u8; CSEC_BLOCK_SIZE];
    for (j, out) in second.iter_mut().enumerate() {
        *out = slot.bytes[j].wrapping_add(first[CSEC_BLOCK_SIZE - 1 - j]);
    }
    second
}

/// A device-locked CSEC blob and the values it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedCsec {
    pub key_slot: KeySlot,
    pub first_block: [u8; CSEC_BLOCK_SIZE],
    pub second_block: [u8; CSEC_BLOCK_SIZE],
    pub airi: [u8; AIRI_SIZE],
    pub aivf: [u8; AIVF_SIZE],
    pub blob: [u8; CSEC_SIZE],
}

impl LockedCsec {
    /// Build from a caller-chosen first block. Deterministic.
    pub fn from_first_block(device_id: &str, first_block: [u8; CSEC_BLOCK_SIZE]) -> Result<Self, CpiError> {
        let key_slot = derive_key_slot(device_id)?;
        let second_block = derive_second_block(&key_slot, &first_block);

        let airi: [u8; AIRI_SIZE] = fixed(des_cbc_encrypt(&vendor_pad(&first_block), &AIRI_KEY)?)?;
        let aivf: [u8; AIVF_SIZE] = fixed(triple_des_cbc_encrypt(&second_block, &expand_key(&key_slot))?)?;

        let plaintext = chunk::encode_all(&[
            Chunk::new(Tag::Abcf, CSEC_VERSION.to_vec()),
            Chunk::container(
                Tag::Abei,
                &[Chunk::new(Tag::Airi, airi.to_vec()), Chunk::new(Tag::Aivf, aivf.to_vec())],
            ),
        ]);
        let blob: [u8; CSEC_SIZE] = fixed(des_cbc_encrypt(&vendor_pad(&plaintext), &PAYLOAD_KEY)?)?;

        debug!(device_id_len = device_id.len(), "Built device-locked CSEC");
        Ok(Self {
            key_slot,
            first_block,
            second_block,
            airi,
            aivf,
            blob,
        })
    }

    /// Build with a first block drawn from `rng`.
    pub fn generate<R: RngCore + CryptoRng>(device_id: &str, rng: &mut R) -> Result<Self, CpiError> {
        if device_id.is_empty() {
            return Err(CpiError::EmptyDeviceId);
        }
        let mut first_block = [0u8; CSEC_BLOCK_SIZE];
        rng.try_fill_bytes(&mut first_block)?;
        Self::from_first_block(device_id, first_block)
    }
}

/// The CSEC blob for one container: the fixed blob when `device_id` is
/// absent, otherwise a fresh device-locked blob keyed by OS randomness.
pub fn csec_blob(device_id: Option<&str>) -> Result<[u8; CSEC_SIZE], CpiError> {
    match device_id {
        None => {
            debug!("Using unlocked CSEC");
            Ok(UNLOCKED_CSEC)
        }
        Some(id) => Ok(LockedCsec::generate(id, &mut OsRng)?.blob),
    }
}

fn fixed<const N: usize>(data: Vec<u8>) -> Result<[u8; N], CpiError> {
    let actual = data.len();
    data.try_into()
        .map_err(|_| CpiError::InvalidLength { expected: N, actual })
}
