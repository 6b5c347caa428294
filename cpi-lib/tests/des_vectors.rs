mod common;
use common::*;
use cpi_lib::cipher::{Cbc, TripleDes, ZERO_IV};

fn key(hex_key: &str) -> Key {
    hex_to_bytes(hex_key).as_ref().try_into().unwrap()
}

fn block(hex_block: &str) -> Block {
    hex_to_bytes(hex_block).as_ref().try_into().unwrap()
}

#[test]
fn test_fips_known_answer() {
    let k = key("133457799bbcdff1");
    let ciphertext = des::encrypt_block(&block("0123456789abcdef"), &k);
    assert_eq!(hex::encode(ciphertext), "85e813540f0ab405");
    assert_eq!(hex::encode(des::decrypt_block(&ciphertext, &k)), "0123456789abcdef");
}

#[test]
fn test_additional_known_answers() {
    let cases = [
        ("0e329232ea6d0d73", "8787878787878787", "0000000000000000"),
        ("0101010101010101", "0000000000000000", "8ca64de9c1b123a7"),
        ("123456789abcdef1", "0123456789abcdef", "f799731124e480f2"),
    ];
    for (k, plain, expected) in cases {
        let ciphertext = des::encrypt_block(&block(plain), &key(k));
        assert_eq!(hex::encode(ciphertext), expected, "key {k}");
    }
}

#[test]
fn test_top_bit_is_parity() {
    // 0x00 and 0x80 normalise to the same byte
    let plain = [0u8; 8];
    let a = des::encrypt_block(&plain, &[0x00; 8]);
    let b = des::encrypt_block(&plain, &[0x80; 8]);
    assert_eq!(a, b);
    assert_eq!(hex::encode(a), "0a5f757daf94d539");
}

#[test]
fn test_block_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x00DE5);
    for _ in 0..200 {
        let mut k = [0u8; 8];
        let mut b = [0u8; 8];
        rng.fill_bytes(&mut k);
        rng.fill_bytes(&mut b);

        let schedule = KeySchedule::new(&k);
        assert_eq!(schedule.decrypt_block(&schedule.encrypt_block(&b)), b);
    }
}

#[test]
fn test_des_cbc_known_answer() {
    let plain = hex_to_bytes("000102030405060708090a0b0c0d0e0f");
    let ciphertext = cipher::des_cbc_encrypt(&plain, &PAYLOAD_KEY).unwrap();
    assert_eq!(hex::encode(&ciphertext), "f6cdaf033cc980039c8f5786995d0cff");
    assert_eq!(des_cbc_decrypt(&ciphertext, &PAYLOAD_KEY), plain.as_ref());
}

#[test]
fn test_triple_des_cbc_known_answer() {
    let k: [u8; 24] = core::array::from_fn(|i| i as u8 + 1);
    let plain = hex_to_bytes("000102030405060708090a0b0c0d0e0f");
    let ciphertext = cipher::triple_des_cbc_encrypt(&plain, &k).unwrap();
    assert_eq!(hex::encode(ciphertext), "4e0633cbb0ee135940f4916e2d14b004");
}

#[test]
fn test_cbc_chains_identical_blocks() {
    let ciphertext = cipher::des_cbc_encrypt(&[0x5A; 16], &PAYLOAD_KEY).unwrap();
    assert_ne!(ciphertext[..8], ciphertext[8..]);
}

#[test]
fn test_cbc_state_carries_across_calls() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut data = vec![0u8; 64];
    rng.fill_bytes(&mut data);

    let mut cbc = Cbc::new(TripleDes::from_slice(&[0x3C; 24]).unwrap(), ZERO_IV);
    let mut split = cbc.encrypt(&data[..24]).unwrap();
    split.extend(cbc.encrypt(&data[24..]).unwrap());

    let whole = cipher::triple_des_cbc_encrypt(&data, &[0x3C; 24]).unwrap();
    assert_eq!(split, whole);
}

#[test]
fn test_cbc_empty_input() {
    assert!(cipher::des_cbc_encrypt(&[], &PAYLOAD_KEY).unwrap().is_empty());
}
