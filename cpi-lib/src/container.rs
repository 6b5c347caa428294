//! CPI container assembly.
//!
//! Output layout, with no framing beyond the chunks themselves:
//!
//! ```text
//! XPIH( XMDL(model) XPID(install id) )   unencrypted
//! CSEC( 80-byte authentication blob )
//! DES-CBC( pad( EUID ETIT BLOB... ) )    multiple of 8 bytes
//! ```

use std::path::Path;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{self, PAYLOAD_KEY, UNLOCKED_CSEC};
use crate::chunk::{Chunk, Tag};
use crate::cipher::{des_cbc_encrypt, vendor_pad};
use crate::constants::{CHUNK_HEADER_SIZE, CSEC_SIZE, INSTALL_ID_SIZE, TAG_SIZE};
use crate::error::CpiError;
use crate::pack::Pack;

/// Parameters of one PPF to CPI conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Target keyboard model written to the XMDL chunk.
    pub model_name: String,
    /// Install identifier written to the XPID chunk.
    pub install_id: u32,
    /// Lock the output to this device; `None` produces an unlocked pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl ConvertConfig {
    pub fn new(model_name: impl Into<String>, install_id: u32) -> Self {
        Self {
            model_name: model_name.into(),
            install_id,
            device_id: None,
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, CpiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CpiError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// The unencrypted XPIH header chunk.
pub fn build_header(model_name: &str, install_id: u32) -> Chunk {
    Chunk::container(
        Tag::Xpih,
        &[
            Chunk::text(Tag::Xmdl, model_name),
            Chunk::new(Tag::Xpid, install_id.to_be_bytes().to_vec()),
        ],
    )
}

/// Pad and encrypt the pack-level chunks under the payload key.
pub fn encrypt_payload(pack: &Pack) -> Result<Vec<u8>, CpiError> {
    let plaintext = pack.encode();
    debug!(plaintext_len = plaintext.len(), "Encrypting pack payload");
    des_cbc_encrypt(&vendor_pad(&plaintext), &PAYLOAD_KEY)
}

/// Build the complete CPI stream for `pack`.
///
/// Without a `device_id` the fixed unlocked CSEC blob is embedded; with one,
/// a fresh device-locked blob is generated.
pub fn build_encrypted_cpi(
    pack: &Pack,
    model_name: &str,
    install_id: u32,
    device_id: Option<&str>,
) -> Result<Bytes, CpiError> {
    let header = build_header(model_name, install_id);
    let csec = Chunk::new(Tag::Csec, auth::csec_blob(device_id)?.to_vec());
    let payload = encrypt_payload(pack)?;

    let mut out = BytesMut::with_capacity(header.encoded_len() + csec.encoded_len() + payload.len());
    header.write_to(&mut out);
    csec.write_to(&mut out);
    out.extend_from_slice(&payload);

    info!(
        model = model_name,
        install_id,
        locked = device_id.is_some(),
        blobs = pack.blobs.len(),
        size = out.len(),
        "Built CPI container"
    );
    Ok(out.freeze())
}

/// Decode a PPF pack and re-encode it as a CPI container.
pub fn convert(ppf: &Bytes, config: &ConvertConfig) -> Result<Bytes, CpiError> {
    let pack = Pack::from_bytes(ppf);
    build_encrypted_cpi(&pack, &config.model_name, config.install_id, config.device_id.as_deref())
}

/// A CPI stream split into its three pieces. The payload stays encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpiParts {
    pub header: Chunk,
    pub csec: Chunk,
    pub payload: Bytes,
}

impl CpiParts {
    /// Split strictly: XPIH at offset 0, CSEC straight after it.
    pub fn parse(data: &Bytes) -> Result<Self, CpiError> {
        let (header, offset) = read_chunk_at(data, 0, Tag::Xpih)?;
        let (csec, offset) = read_chunk_at(data, offset, Tag::Csec)?;
        if csec.payload.len() != CSEC_SIZE {
            return Err(CpiError::InvalidLength {
                expected: CSEC_SIZE,
                actual: csec.payload.len(),
            });
        }
        Ok(Self {
            header,
            csec,
            payload: data.slice(offset..),
        })
    }

    pub fn model_name(&self) -> Option<String> {
        self.header
            .children()
            .into_iter()
            .find(|c| c.tag == Tag::Xmdl)
            .map(|c| c.as_text())
    }

    pub fn install_id(&self) -> Option<u32> {
        let xpid = self.header.children().into_iter().find(|c| c.tag == Tag::Xpid)?;
        let bytes: [u8; INSTALL_ID_SIZE] = xpid.payload[..].try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn is_unlocked(&self) -> bool {
        self.csec.payload[..] == UNLOCKED_CSEC[..]
    }
}

fn read_chunk_at(data: &Bytes, offset: usize, expected: Tag) -> Result<(Chunk, usize), CpiError> {
    let header = data
        .get(offset..offset + CHUNK_HEADER_SIZE)
        .ok_or_else(|| CpiError::InvalidContainer(format!("missing {expected} chunk at offset {offset}")))?;

    let fourcc: [u8; TAG_SIZE] = header[..TAG_SIZE].try_into()?;
    if Tag::from_fourcc(fourcc) != Some(expected) {
        return Err(CpiError::InvalidContainer(format!(
            "expected {expected} at offset {offset}, found {}",
            hex::encode(fourcc)
        )));
    }

    let length = u32::from_be_bytes(header[TAG_SIZE..].try_into()?) as usize;
    let body_start = offset + CHUNK_HEADER_SIZE;
    let body_end = body_start + length;
    if body_end > data.len() {
        return Err(CpiError::InvalidContainer(format!(
            "{expected} chunk claims {length} bytes, only {} available",
            data.len() - body_start
        )));
    }
    Ok((Chunk::new(expected, data.slice(body_start..body_end)), body_end))
}
