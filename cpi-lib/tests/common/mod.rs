//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::{Bytes, BytesMut};
#[allow(unused_imports)]
pub use cpi_lib::auth::{self, LockedCsec, PAYLOAD_KEY, UNLOCKED_CSEC};
#[allow(unused_imports)]
pub use cpi_lib::chunk::{self, Chunk, ChunkNode, Tag};
#[allow(unused_imports)]
pub use cpi_lib::cipher::{self, des_cbc_decrypt};
#[allow(unused_imports)]
pub use cpi_lib::des::{self, Block, Key, KeySchedule};
#[allow(unused_imports)]
pub use cpi_lib::{Blob, ConvertConfig, CpiError, CpiParts, Pack};
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use rand::rngs::StdRng;
#[allow(unused_imports)]
pub use rand::{Rng, RngCore, SeedableRng};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Remove vendor padding, checking its shape
#[allow(dead_code)]
pub fn strip_vendor_pad(padded: &[u8]) -> &[u8] {
    let overflow = *padded.last().expect("padded data is never empty") as usize;
    assert!(overflow < 8, "overflow byte out of range: {overflow}");
    let pad_len = 8 - overflow;
    let (data, pad) = padded.split_at(padded.len() - pad_len);
    assert!(pad[..pad_len - 1].iter().all(|&b| b == 0), "pad bytes must be zero");
    assert_eq!(data.len() % 8, overflow);
    data
}

/// The pack used by the end-to-end scenario: one wav sample, no icon
#[allow(dead_code)]
pub fn sample_pack() -> Pack {
    Pack {
        uid: "P1".to_string(),
        title: "Test".to_string(),
        blobs: vec![Blob {
            uid: "B1".to_string(),
            title: "S1".to_string(),
            extension: "wav".to_string(),
            icon_code: None,
            data: Bytes::from_static(&[1, 2, 3]),
        }],
    }
}

/// A pack with `blob_count` blobs of random content
#[allow(dead_code)]
pub fn random_pack(rng: &mut StdRng, blob_count: usize) -> Pack {
    let blobs = (0..blob_count)
        .map(|i| {
            let mut data = vec![0u8; rng.gen_range(0..300)];
            rng.fill_bytes(&mut data);
            Blob {
                uid: format!("BLOB-{i:04}"),
                title: format!("Sample {i}"),
                extension: ["wav", "sty", "mid"][i % 3].to_string(),
                icon_code: rng.gen_bool(0.5).then(|| format!("{}", rng.gen_range(0..100))),
                data: Bytes::from(data),
            }
        })
        .collect();
    Pack {
        uid: format!("PACK-{:08x}", rng.next_u32()),
        title: "Random Pack".to_string(),
        blobs,
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
