//! Vendor padding, CBC chaining and Triple-DES EDE.

use crate::constants::{BLOCK_SIZE, DES_KEY_SIZE, TRIPLE_DES_KEY_SIZE};
use crate::des::{Block, Key, KeySchedule};
use crate::error::CpiError;

/// All-zero IV used by every CBC layer of the format.
pub const ZERO_IV: Block = [0u8; BLOCK_SIZE];

/// A keyed block cipher usable under [`Cbc`].
pub trait BlockCipher {
    fn encrypt_block(&self, block: &Block) -> Block;
}

impl BlockCipher for KeySchedule {
    fn encrypt_block(&self, block: &Block) -> Block {
        KeySchedule::encrypt_block(self, block)
    }
}

/// Three-key Triple-DES: encrypt with K1, decrypt with K2, encrypt with K3.
#[derive(Debug, Clone)]
pub struct TripleDes {
    k1: KeySchedule,
    k2: KeySchedule,
    k3: KeySchedule,
}

impl TripleDes {
    pub fn new(key: &[u8; TRIPLE_DES_KEY_SIZE]) -> Self {
        let sub = |i: usize| -> Key {
            let mut k = [0u8; DES_KEY_SIZE];
            k.copy_from_slice(&key[i * DES_KEY_SIZE..(i + 1) * DES_KEY_SIZE]);
            k
        };
        Self {
            k1: KeySchedule::new(&sub(0)),
            k2: KeySchedule::new(&sub(1)),
            k3: KeySchedule::new(&sub(2)),
        }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self, CpiError> {
        let key: &[u8; TRIPLE_DES_KEY_SIZE] = key.try_into().map_err(|_| CpiError::InvalidLength {
            expected: TRIPLE_DES_KEY_SIZE,
            actual: key.len(),
        })?;
        Ok(Self::new(key))
    }
}

impl BlockCipher for TripleDes {
    fn encrypt_block(&self, block: &Block) -> Block {
        let stage = self.k1.encrypt_block(block);
        let stage = self.k2.decrypt_block(&stage);
        self.k3.encrypt_block(&stage)
    }
}

/// CBC encryption state: the cipher plus the previous ciphertext block.
#[derive(Debug, Clone)]
pub struct Cbc<C> {
    cipher: C,
    chain: Block,
}

impl<C: BlockCipher> Cbc<C> {
    pub fn new(cipher: C, iv: Block) -> Self {
        Self { cipher, chain: iv }
    }

    /// Encrypt block-aligned `data`, continuing the chain from any previous
    /// call.
    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CpiError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CpiError::Unaligned { len: data.len() });
        }

        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks_exact(BLOCK_SIZE) {
            let mut block = self.chain;
            for (b, p) in block.iter_mut().zip(chunk) {
                *b ^= p;
            }
            self.chain = self.cipher.encrypt_block(&block);
            out.extend_from_slice(&self.chain);
        }
        Ok(out)
    }
}

/// Pad to a multiple of 8 bytes. Adds `8 - len % 8` bytes, or a whole block
/// when already aligned. Pad bytes are zero except the last, which holds
/// `len % 8`.
pub fn vendor_pad(data: &[u8]) -> Vec<u8> {
    let overflow = data.len() % BLOCK_SIZE;
    let pad_len = BLOCK_SIZE - overflow;

    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.resize(data.len() + pad_len - 1, 0);
    out.push(overflow as u8);
    out
}

/// Length of the vendor-padded form of `len` bytes.
pub fn padded_len(len: usize) -> usize {
    len + BLOCK_SIZE - len % BLOCK_SIZE
}

/// Single-DES CBC with a zero IV over block-aligned input.
pub fn des_cbc_encrypt(data: &[u8], key: &Key) -> Result<Vec<u8>, CpiError> {
    Cbc::new(KeySchedule::new(key), ZERO_IV).encrypt(data)
}

/// Triple-DES EDE CBC with a zero IV over block-aligned input.
pub fn triple_des_cbc_encrypt(data: &[u8], key: &[u8; TRIPLE_DES_KEY_SIZE]) -> Result<Vec<u8>, CpiError> {
    Cbc::new(TripleDes::new(key), ZERO_IV).encrypt(data)
}

/// Zero-IV DES-CBC decryption, for tests that open produced containers.
/// Trailing bytes past the last whole block are ignored.
#[cfg(any(test, feature = "test-util"))]
pub fn des_cbc_decrypt(data: &[u8], key: &Key) -> Vec<u8> {
    let schedule = KeySchedule::new(key);
    let mut chain = ZERO_IV;
    let mut out = Vec::with_capacity(data.len());
    for block in data.chunks_exact(BLOCK_SIZE) {
        let mut plain = schedule.decrypt_block(&block.try_into().unwrap_or(ZERO_IV));
        for (p, c) in plain.iter_mut().zip(chain.iter()) {
            *p ^= c;
        }
        out.extend_from_slice(&plain);
        chain.copy_from_slice(block);
    }
    out
}
