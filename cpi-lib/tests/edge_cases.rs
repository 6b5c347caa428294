mod common;
use common::*;
use cpi_lib::constants::MAX_NESTING_DEPTH;

#[test]
fn test_empty_input() {
    assert!(chunk::decode_all(&Bytes::new()).is_empty());
    let pack = Pack::from_bytes(&Bytes::new());
    assert_eq!(pack, Pack::default());
    assert!(!pack.is_complete());
}

#[test]
fn test_input_shorter_than_header() {
    let data = hex_to_bytes("45554944000000");
    assert!(chunk::decode_all(&data).is_empty());
}

#[test]
fn test_truncated_ppf_yields_partial_pack() {
    init_tracing();
    let full = Chunk::container(Tag::Xpfh, &sample_pack().to_chunks()).to_bytes();

    // Cut inside the FBIN payload: the blob survives with clipped data
    let cut = full.slice(..full.len() - 1);
    let pack = Pack::from_bytes(&cut);
    assert_eq!(pack.uid, "P1");
    assert_eq!(pack.blobs.len(), 1);
    assert_eq!(pack.blobs[0].data.as_ref(), &[1, 2]);

    // Cut before the BLOB: identifier and title only
    let cut = full.slice(..8 + 11 + 13);
    let pack = Pack::from_bytes(&cut);
    assert_eq!(pack.title, "Test");
    assert!(pack.blobs.is_empty());
    assert!(!pack.is_complete());
}

#[test]
fn test_padding_invariant_over_lengths() {
    for len in 0..=64usize {
        let data = vec![0xA5; len];
        let padded = cipher::vendor_pad(&data);

        assert_eq!(padded.len() % 8, 0);
        assert!(padded.len() > len);
        assert!(padded.len() - len <= 8);
        assert_eq!(&padded[..len], data.as_slice());
        assert_eq!(*padded.last().unwrap() as usize, len % 8);
        assert!(padded[len..padded.len() - 1].iter().all(|&b| b == 0));
        assert_eq!(padded.len(), cipher::padded_len(len));
    }
}

#[test]
fn test_text_with_embedded_nul() {
    let chunk = Chunk::new(Tag::Etit, b"Pi\0ano\0".to_vec());
    assert_eq!(chunk.as_text(), "Piano");
}

#[test]
fn test_invalid_utf8_text_is_lossy() {
    let chunk = Chunk::new(Tag::Etit, vec![0x41, 0xFF, 0x42, 0x00]);
    assert_eq!(chunk.as_text(), "A\u{FFFD}B");
}

#[test]
fn test_empty_pack_still_converts() {
    let cpi = cpi_lib::build_encrypted_cpi(&Pack::default(), "M", 0, None).unwrap();
    let parts = CpiParts::parse(&cpi).unwrap();

    // EUID and ETIT with empty text: 9 + 9 bytes, padded to 24
    assert_eq!(parts.payload.len(), 24);
    let plain = des_cbc_decrypt(&parts.payload, &PAYLOAD_KEY);
    assert_eq!(strip_vendor_pad(&plain), Pack::default().encode().as_ref());
}

/// `levels` container headers, each claiming the rest of the buffer,
/// around an innermost EUID chunk.
fn nested_headers(tags: &[Tag], levels: usize) -> Bytes {
    let inner = Chunk::text(Tag::Euid, "deep").to_bytes();
    let mut buf = BytesMut::with_capacity(levels * 8 + inner.len());
    for level in 0..levels {
        let remaining = (levels - level - 1) * 8 + inner.len();
        buf.extend_from_slice(&tags[level % tags.len()].fourcc());
        buf.extend_from_slice(&(remaining as u32).to_be_bytes());
    }
    buf.extend_from_slice(&inner);
    buf.freeze()
}

#[test]
fn test_deeply_nested_pack_does_not_overflow() {
    init_tracing();
    let data = nested_headers(&[Tag::Xpfh], 200_000);
    let pack = Pack::from_bytes(&data);

    // The identifier sits far below the nesting limit and is never reached
    assert_eq!(pack, Pack::default());
}

#[test]
fn test_deeply_nested_tree_is_cut_at_limit() {
    let data = nested_headers(&[Tag::Xpfh, Tag::Blob], 200_000);
    let tree = chunk::decode_tree(&data);

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].depth(), MAX_NESTING_DEPTH + 1);
}

#[test]
fn test_shallow_nesting_is_still_followed() {
    let data = nested_headers(&[Tag::Xpfh], 3);
    assert_eq!(Pack::from_bytes(&data).uid, "deep");
    assert_eq!(chunk::decode_tree(&data)[0].depth(), 4);
}
