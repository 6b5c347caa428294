//! Table-driven DES block cipher on 32-bit halves.
//!
//! The initial and final permutations are five masked delta swaps each.
//! The round function reads the eight 6-bit expansion groups straight out
//! of the right half by rotation and looks them up in tables that combine
//! the S-boxes with the P permutation. Output is bit-identical to FIPS 46-3.
//!
//! Keys are parity-normalised before scheduling: the top bit of every key
//! byte is replaced so that the byte has odd parity.

use crate::constants::{DES_KEY_SIZE, DES_ROUNDS};

pub type Key = [u8; DES_KEY_SIZE];
pub type Block = [u8; 8];

/// Permuted choice 1: 64-bit key to 56 bits (1-based source bit positions).
#[rustfmt::skip]
static PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17,  9,
     1, 58, 50, 42, 34, 26, 18,
    10,  2, 59, 51, 43, 35, 27,
    19, 11,  3, 60, 52, 44, 36,
    63, 55, 47, 39, 31, 23, 15,
     7, 62, 54, 46, 38, 30, 22,
    14,  6, 61, 53, 45, 37, 29,
    21, 13,  5, 28, 20, 12,  4,
];

/// Permuted choice 2: 56-bit C||D to a 48-bit round subkey.
#[rustfmt::skip]
static PC2: [u8; 48] = [
    14, 17, 11, 24,  1,  5,
     3, 28, 15,  6, 21, 10,
    23, 19, 12,  4, 26,  8,
    16,  7, 27, 20, 13,  2,
    41, 52, 31, 37, 47, 55,
    30, 40, 51, 45, 33, 48,
    44, 49, 39, 56, 34, 53,
    46, 42, 50, 36, 29, 32,
];

/// Left rotation applied to both key halves before each round.
#[rustfmt::skip]
static ROTATIONS: [u32; DES_ROUNDS] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

/// S-box output already routed through P, indexed by the 6-bit group
/// value (first expansion bit is the most significant).
#[rustfmt::skip]
static SP_BOXES: [[u32; 64]; 8] = [
    // S1
    [
        0x00808200, 0x00000000, 0x00008000, 0x00808202, 0x00808002, 0x00008202, 0x00000002, 0x00008000,
        0x00000200, 0x00808200, 0x00808202, 0x00000200, 0x00800202, 0x00808002, 0x00800000, 0x00000002,
        0x00000202, 0x00800200, 0x00800200, 0x00008200, 0x00008200, 0x00808000, 0x00808000, 0x00800202,
        0x00008002, 0x00800002, 0x00800002, 0x00008002, 0x00000000, 0x00000202, 0x00008202, 0x00800000,
        0x00008000, 0x00808202, 0x00000002, 0x00808000, 0x00808200, 0x00800000, 0x00800000, 0x00000200,
        0x00808002, 0x00008000, 0x00008200, 0x00800002, 0x00000200, 0x00000002, 0x00800202, 0x00008202,
        0x00808202, 0x00008002, 0x00808000, 0x00800202, 0x00800002, 0x00000202, 0x00008202, 0x00808200,
        0x00000202, 0x00800200, 0x00800200, 0x00000000, 0x00008002, 0x00008200, 0x00000000, 0x00808002,
    ],
    // S2
    [
        0x40084010, 0x40004000, 0x00004000, 0x00084010, 0x00080000, 0x00000010, 0x40080010, 0x40004010,
        0x40000010, 0x40084010, 0x40084000, 0x40000000, 0x40004000, 0x00080000, 0x00000010, 0x40080010,
        0x00084000, 0x00080010, 0x40004010, 0x00000000, 0x40000000, 0x00004000, 0x00084010, 0x40080000,
        0x00080010, 0x40000010, 0x00000000, 0x00084000, 0x00004010, 0x40084000, 0x40080000, 0x00004010,
        0x00000000, 0x00084010, 0x40080010, 0x00080000, 0x40004010, 0x40080000, 0x40084000, 0x00004000,
        0x40080000, 0x40004000, 0x00000010, 0x40084010, 0x00084010, 0x00000010, 0x00004000, 0x40000000,
        0x00004010, 0x40084000, 0x00080000, 0x40000010, 0x00080010, 0x40004010, 0x40000010, 0x00080010,
        0x00084000, 0x00000000, 0x40004000, 0x00004010, 0x40000000, 0x40080010, 0x40084010, 0x00084000,
    ],
    // S3
    [
        0x00000104, 0x04010100, 0x00000000, 0x04010004, 0x04000100, 0x00000000, 0x00010104, 0x04000100,
        0x00010004, 0x04000004, 0x04000004, 0x00010000, 0x04010104, 0x00010004, 0x04010000, 0x00000104,
        0x04000000, 0x00000004, 0x04010100, 0x00000100, 0x00010100, 0x04010000, 0x04010004, 0x00010104,
        0x04000104, 0x00010100, 0x00010000, 0x04000104, 0x00000004, 0x04010104, 0x00000100, 0x04000000,
        0x04010100, 0x04000000, 0x00010004, 0x00000104, 0x00010000, 0x04010100, 0x04000100, 0x00000000,
        0x00000100, 0x00010004, 0x04010104, 0x04000100, 0x04000004, 0x00000100, 0x00000000, 0x04010004,
        0x04000104, 0x00010000, 0x04000000, 0x04010104, 0x00000004, 0x00010104, 0x00010100, 0x04000004,
        0x04010000, 0x04000104, 0x00000104, 0x04010000, 0x00010104, 0x00000004, 0x04010004, 0x00010100,
    ],
    // S4
    [
        0x80401000, 0x80001040, 0x80001040, 0x00000040, 0x00401040, 0x80400040, 0x80400000, 0x80001000,
        0x00000000, 0x00401000, 0x00401000, 0x80401040, 0x80000040, 0x00000000, 0x00400040, 0x80400000,
        0x80000000, 0x00001000, 0x00400000, 0x80401000, 0x00000040, 0x00400000, 0x80001000, 0x00001040,
        0x80400040, 0x80000000, 0x00001040, 0x00400040, 0x00001000, 0x00401040, 0x80401040, 0x80000040,
        0x00400040, 0x80400000, 0x00401000, 0x80401040, 0x80000040, 0x00000000, 0x00000000, 0x00401000,
        0x00001040, 0x00400040, 0x80400040, 0x80000000, 0x80401000, 0x80001040, 0x80001040, 0x00000040,
        0x80401040, 0x80000040, 0x80000000, 0x00001000, 0x80400000, 0x80001000, 0x00401040, 0x80400040,
        0x80001000, 0x00001040, 0x00400000, 0x80401000, 0x00000040, 0x00400000, 0x00001000, 0x00401040,
    ],
    // S5
    [
        0x00000080, 0x01040080, 0x01040000, 0x21000080, 0x00040000, 0x00000080, 0x20000000, 0x01040000,
        0x20040080, 0x00040000, 0x01000080, 0x20040080, 0x21000080, 0x21040000, 0x00040080, 0x20000000,
        0x01000000, 0x20040000, 0x20040000, 0x00000000, 0x20000080, 0x21040080, 0x21040080, 0x01000080,
        0x21040000, 0x20000080, 0x00000000, 0x21000000, 0x01040080, 0x01000000, 0x21000000, 0x00040080,
        0x00040000, 0x21000080, 0x00000080, 0x01000000, 0x20000000, 0x01040000, 0x21000080, 0x20040080,
        0x01000080, 0x20000000, 0x21040000, 0x01040080, 0x20040080, 0x00000080, 0x01000000, 0x21040000,
        0x21040080, 0x00040080, 0x21000000, 0x21040080, 0x01040000, 0x00000000, 0x20040000, 0x21000000,
        0x00040080, 0x01000080, 0x20000080, 0x00040000, 0x00000000, 0x20040000, 0x01040080, 0x20000080,
    ],
    // S6
    [
        0x10000008, 0x10200000, 0x00002000, 0x10202008, 0x10200000, 0x00000008, 0x10202008, 0x00200000,
        0x10002000, 0x00202008, 0x00200000, 0x10000008, 0x00200008, 0x10002000, 0x10000000, 0x00002008,
        0x00000000, 0x00200008, 0x10002008, 0x00002000, 0x00202000, 0x10002008, 0x00000008, 0x10200008,
        0x10200008, 0x00000000, 0x00202008, 0x10202000, 0x00002008, 0x00202000, 0x10202000, 0x10000000,
        0x10002000, 0x00000008, 0x10200008, 0x00202000, 0x10202008, 0x00200000, 0x00002008, 0x10000008,
        0x00200000, 0x10002000, 0x10000000, 0x00002008, 0x10000008, 0x10202008, 0x00202000, 0x10200000,
        0x00202008, 0x10202000, 0x00000000, 0x10200008, 0x00000008, 0x00002000, 0x10200000, 0x00202008,
        0x00002000, 0x00200008, 0x10002008, 0x00000000, 0x10202000, 0x10000000, 0x00200008, 0x10002008,
    ],
    // S7
    [
        0x00100000, 0x02100001, 0x02000401, 0x00000000, 0x00000400, 0x02000401, 0x00100401, 0x02100400,
        0x02100401, 0x00100000, 0x00000000, 0x02000001, 0x00000001, 0x02000000, 0x02100001, 0x00000401,
        0x02000400, 0x00100401, 0x00100001, 0x02000400, 0x02000001, 0x02100000, 0x02100400, 0x00100001,
        0x02100000, 0x00000400, 0x00000401, 0x02100401, 0x00100400, 0x00000001, 0x02000000, 0x00100400,
        0x02000000, 0x00100400, 0x00100000, 0x02000401, 0x02000401, 0x02100001, 0x02100001, 0x00000001,
        0x00100001, 0x02000000, 0x02000400, 0x00100000, 0x02100400, 0x00000401, 0x00100401, 0x02100400,
        0x00000401, 0x02000001, 0x02100401, 0x02100000, 0x00100400, 0x00000000, 0x00000001, 0x02100401,
        0x00000000, 0x00100401, 0x02100000, 0x00000400, 0x02000001, 0x02000400, 0x00000400, 0x00100001,
    ],
    // S8
    [
        0x08000820, 0x00000800, 0x00020000, 0x08020820, 0x08000000, 0x08000820, 0x00000020, 0x08000000,
        0x00020020, 0x08020000, 0x08020820, 0x00020800, 0x08020800, 0x00020820, 0x00000800, 0x00000020,
        0x08020000, 0x08000020, 0x08000800, 0x00000820, 0x00020800, 0x00020020, 0x08020020, 0x08020800,
        0x00000820, 0x00000000, 0x00000000, 0x08020020, 0x08000020, 0x08000800, 0x00020820, 0x00020000,
        0x00020820, 0x00020000, 0x08020800, 0x00000800, 0x00000020, 0x08020020, 0x00000800, 0x00020820,
        0x08000800, 0x00000020, 0x08000020, 0x08020000, 0x08020020, 0x08000000, 0x00020000, 0x08000820,
        0x00000000, 0x08020820, 0x00020020, 0x08000020, 0x08020000, 0x08000800, 0x08000820, 0x00000000,
        0x08020820, 0x00020800, 0x00020800, 0x00000820, 0x00000820, 0x00020020, 0x08000000, 0x08020800,
    ],
];

/// One 48-bit round subkey as two 24-bit halves. `hi` holds expansion
/// groups 1-4, `lo` groups 5-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subkey {
    pub hi: u32,
    pub lo: u32,
}

impl Subkey {
    /// The 6 key bits mixed into expansion group `index` (0-based).
    #[inline]
    fn group(&self, index: usize) -> u32 {
        let half = if index < 4 { self.hi } else { self.lo };
        (half >> (18 - 6 * (index % 4))) & 0x3f
    }

    pub fn as_u64(&self) -> u64 {
        (u64::from(self.hi) << 24) | u64::from(self.lo)
    }
}

/// Round subkeys for one key. Derive once and reuse for every block
/// encrypted under that key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchedule {
    subkeys: [Subkey; DES_ROUNDS],
}

impl KeySchedule {
    pub fn new(key: &Key) -> Self {
        let key = u64::from_be_bytes(adjust_parity(key));

        let cd = select_bits(key, 64, &PC1);
        let mut c = ((cd >> 28) as u32) & 0x0fff_ffff;
        let mut d = (cd as u32) & 0x0fff_ffff;

        let mut subkeys = [Subkey::default(); DES_ROUNDS];
        for (subkey, &shift) in subkeys.iter_mut().zip(ROTATIONS.iter()) {
            c = rotate28(c, shift);
            d = rotate28(d, shift);
            let k = select_bits((u64::from(c) << 28) | u64::from(d), 56, &PC2);
            *subkey = Subkey {
                hi: ((k >> 24) as u32) & 0x00ff_ffff,
                lo: (k as u32) & 0x00ff_ffff,
            };
        }
        Self { subkeys }
    }

    pub fn subkeys(&self) -> &[Subkey; DES_ROUNDS] {
        &self.subkeys
    }

    pub fn encrypt_block(&self, block: &Block) -> Block {
        crypt(block, self.subkeys.iter())
    }

    /// Same network with the subkeys applied in reverse order.
    pub fn decrypt_block(&self, block: &Block) -> Block {
        crypt(block, self.subkeys.iter().rev())
    }
}

/// Clear the top bit of each key byte and set it again if that is needed
/// for odd parity.
pub fn adjust_parity(key: &Key) -> Key {
    let mut out = *key;
    for byte in out.iter_mut() {
        *byte &= 0x7f;
        if byte.count_ones() % 2 == 0 {
            *byte |= 0x80;
        }
    }
    out
}

/// Encrypt one block under `key`.
pub fn encrypt_block(block: &Block, key: &Key) -> Block {
    KeySchedule::new(key).encrypt_block(block)
}

/// Decrypt one block under `key`.
pub fn decrypt_block(block: &Block, key: &Key) -> Block {
    KeySchedule::new(key).decrypt_block(block)
}

/// Gather the 1-based bit positions of `table` from a `width`-bit value,
/// most significant first.
fn select_bits(value: u64, width: u32, table: &[u8]) -> u64 {
    table
        .iter()
        .fold(0, |acc, &bit| (acc << 1) | ((value >> (width - u32::from(bit))) & 1))
}

#[inline]
fn rotate28(half: u32, shift: u32) -> u32 {
    ((half << shift) | (half >> (28 - shift))) & 0x0fff_ffff
}

/// Exchange the bits of `b` selected by `mask` with the bits of `a`
/// selected by `mask << shift`.
#[inline]
fn delta_swap(a: &mut u32, b: &mut u32, shift: u32, mask: u32) {
    let t = ((*a >> shift) ^ *b) & mask;
    *b ^= t;
    *a ^= t << shift;
}

fn initial_permutation(mut left: u32, mut right: u32) -> (u32, u32) {
    delta_swap(&mut left, &mut right, 4, 0x0f0f_0f0f);
    delta_swap(&mut left, &mut right, 16, 0x0000_ffff);
    delta_swap(&mut right, &mut left, 2, 0x3333_3333);
    delta_swap(&mut right, &mut left, 8, 0x00ff_00ff);
    delta_swap(&mut left, &mut right, 1, 0x5555_5555);
    (left, right)
}

fn final_permutation(mut left: u32, mut right: u32) -> (u32, u32) {
    delta_swap(&mut left, &mut right, 1, 0x5555_5555);
    delta_swap(&mut right, &mut left, 8, 0x00ff_00ff);
    delta_swap(&mut right, &mut left, 2, 0x3333_3333);
    delta_swap(&mut left, &mut right, 16, 0x0000_ffff);
    delta_swap(&mut left, &mut right, 4, 0x0f0f_0f0f);
    (left, right)
}

/// f(R, K). Expansion group `i` covers bits 4i..4i+5 of R (1-based, bit 0
/// being bit 32), which a left rotation by 4i+5 brings to the low 6 bits.
#[inline]
fn feistel(right: u32, subkey: &Subkey) -> u32 {
    SP_BOXES.iter().enumerate().fold(0, |acc, (index, table)| {
        let group = right.rotate_left((4 * index as u32 + 5) % 32) & 0x3f;
        acc ^ table[(group ^ subkey.group(index)) as usize]
    })
}

fn crypt<'a>(block: &Block, subkeys: impl Iterator<Item = &'a Subkey>) -> Block {
    let left = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
    let right = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
    let (mut left, mut right) = initial_permutation(left, right);

    for subkey in subkeys {
        let next = left ^ feistel(right, subkey);
        left = right;
        right = next;
    }

    // Undo the last exchange before the final permutation.
    let (left, right) = final_permutation(right, left);

    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&left.to_be_bytes());
    out[4..].copy_from_slice(&right.to_be_bytes());
    out
}
