mod common;
use common::*;

#[test]
fn test_unlocked_end_to_end() {
    let pack = sample_pack();
    let cpi = cpi_lib::build_encrypted_cpi(&pack, "MODELX", 7, None).unwrap();

    // Output opens with the unencrypted header
    let top = chunk::decode_all(&cpi);
    assert_eq!(top[0].tag, Tag::Xpih);
    let header = top[0].children();
    assert_eq!(header[0].tag, Tag::Xmdl);
    assert_eq!(header[0].as_text(), "MODELX");
    assert_eq!(header[1].tag, Tag::Xpid);
    assert_eq!(header[1].payload.as_ref(), &[0, 0, 0, 7]);

    // Exactly one CSEC, straight after the header
    let parts = CpiParts::parse(&cpi).unwrap();
    assert_eq!(parts.csec.payload.as_ref(), UNLOCKED_CSEC.as_slice());
    let clear_len = parts.header.encoded_len() + parts.csec.encoded_len();
    assert_eq!(
        cpi[..clear_len].windows(4).filter(|w| *w == b"CSEC").count(),
        1,
        "CSEC tag must appear once in the clear region"
    );

    // ceil((plaintext_len + 1) / 8) blocks of payload
    let plaintext = pack.encode();
    assert_eq!(parts.payload.len(), (plaintext.len() + 1).div_ceil(8) * 8);

    let plain = des_cbc_decrypt(&parts.payload, &PAYLOAD_KEY);
    assert_eq!(strip_vendor_pad(&plain), plaintext.as_ref());
    assert_eq!(&plain[plaintext.len()..], &[0, 0, (plaintext.len() % 8) as u8]);
}

#[test]
fn test_locked_end_to_end() {
    let pack = sample_pack();
    let config = ConvertConfig::new("MODELX", 7).with_device_id("SN-00112233");
    let ppf = Chunk::container(Tag::Xpfh, &pack.to_chunks()).to_bytes();

    let cpi = cpi_lib::convert(&ppf, &config).unwrap();
    let parts = CpiParts::parse(&cpi).unwrap();
    assert!(!parts.is_unlocked());
    assert_eq!(parts.model_name().as_deref(), Some("MODELX"));
    assert_eq!(parts.install_id(), Some(7));

    // The payload does not depend on the lock
    let unlocked = cpi_lib::build_encrypted_cpi(&pack, "MODELX", 7, None).unwrap();
    assert_eq!(parts.payload, CpiParts::parse(&unlocked).unwrap().payload);
}

#[test]
fn test_install_id_is_big_endian() {
    let cpi = cpi_lib::build_encrypted_cpi(&sample_pack(), "M", 0x0102_0304, None).unwrap();
    let parts = CpiParts::parse(&cpi).unwrap();
    let xpid = parts.header.children().into_iter().find(|c| c.tag == Tag::Xpid).unwrap();
    assert_eq!(xpid.payload.as_ref(), &[1, 2, 3, 4]);
    assert_eq!(parts.install_id(), Some(0x0102_0304));
}

#[test]
fn test_config_file_round_trip() {
    let path = std::env::temp_dir().join(format!("cpi-lib-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "model_name": "PSR-SX900", "install_id": 305419896, "device_id": "SN-1" }"#).unwrap();

    let config = ConvertConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config, ConvertConfig::new("PSR-SX900", 0x1234_5678).with_device_id("SN-1"));
    assert!(matches!(ConvertConfig::load(&path), Err(CpiError::Io(_))));
}
