// Container and cipher constants for the CPI format

/// Size of a chunk tag (4 ASCII bytes)
pub const TAG_SIZE: usize = 4;

/// Size of a chunk header: tag + big-endian u32 length (8 bytes)
pub const CHUNK_HEADER_SIZE: usize = 8;

/// DES block size in bytes
pub const BLOCK_SIZE: usize = 8;

/// Size of a single DES key in bytes
pub const DES_KEY_SIZE: usize = 8;

/// Size of a three-key Triple-DES key in bytes
pub const TRIPLE_DES_KEY_SIZE: usize = 24;

/// Number of DES rounds (and round subkeys)
pub const DES_ROUNDS: usize = 16;

/// Size of the encrypted CSEC authentication blob
pub const CSEC_SIZE: usize = 80;

/// Maximum number of device identifier bytes used for key folding
pub const DEVICE_ID_MAX_LEN: usize = 128;

/// Size of a folded device-lock key slot
pub const KEY_SLOT_SIZE: usize = 16;

/// Size of the random and derived CSEC blocks
pub const CSEC_BLOCK_SIZE: usize = 16;

/// Size of the AIRI ciphertext (a padded 16-byte block)
pub const AIRI_SIZE: usize = 24;

/// Size of the AIVF ciphertext
pub const AIVF_SIZE: usize = 16;

/// Version marker carried in the ABCF chunk of the CSEC plaintext
pub const CSEC_VERSION: [u8; 2] = [0x00, 0x01];

/// Size of the install identifier carried in the XPID chunk
pub const INSTALL_ID_SIZE: usize = 4;

/// Deepest container nesting followed when decoding; deeper containers are
/// kept as opaque leaves
pub const MAX_NESTING_DEPTH: usize = 32;
