//! Tag/length/value chunk codec shared by the PPF and CPI formats.
//!
//! A chunk is a 4-byte ASCII tag, a big-endian `u32` payload length and the
//! payload itself. Siblings are concatenated without padding. Container
//! chunks carry further chunks as their payload.
//!
//! Decoding is deliberately lenient: bytes that do not start a recognised
//! tag are skipped one at a time until the scanner resynchronises, and a
//! payload that claims to run past the end of its enclosing container is
//! clipped to that end. Decoding never fails; truncated input just yields
//! fewer chunks.

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use strum_macros::Display;
use tracing::{debug, trace};

use crate::constants::{CHUNK_HEADER_SIZE, MAX_NESTING_DEPTH, TAG_SIZE};

/// Recognised chunk tags. The discriminant is the tag's four ASCII bytes
/// read as a big-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, IntoPrimitive, TryFromPrimitive)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[repr(u32)]
pub enum Tag {
    /// PPF file header
    Xpfh = 0x5850_4648,
    /// CPI install header (unencrypted)
    Xpih = 0x5850_4948,
    /// Target model name
    Xmdl = 0x584D_444C,
    /// 4-byte install identifier
    Xpid = 0x5850_4944,
    /// Unique identifier text
    Euid = 0x4555_4944,
    /// Title text
    Etit = 0x4554_4954,
    /// Blob container
    Blob = 0x424C_4F42,
    /// File extension text
    Eext = 0x4545_5854,
    /// Icon code text
    Eico = 0x4549_434F,
    /// Raw binary payload
    Fbin = 0x4642_494E,
    /// Encrypted authentication blob
    Csec = 0x4353_4543,

    // Only seen inside the CSEC plaintext
    Abcf = 0x4142_4346,
    Airi = 0x4149_5249,
    Aivf = 0x4149_5646,
    Abei = 0x4142_4549,
}

impl Tag {
    /// Recognise a tag from its four wire bytes.
    pub fn from_fourcc(bytes: [u8; TAG_SIZE]) -> Option<Self> {
        Tag::try_from_primitive(u32::from_be_bytes(bytes)).ok()
    }

    /// The four wire bytes of this tag.
    pub fn fourcc(self) -> [u8; TAG_SIZE] {
        u32::from(self).to_be_bytes()
    }

    /// Whether the payload of this tag is itself a sequence of chunks.
    pub fn is_container(self) -> bool {
        matches!(self, Tag::Xpfh | Tag::Xpih | Tag::Blob | Tag::Abei)
    }
}

/// A single decoded or to-be-encoded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub tag: Tag,
    pub payload: Bytes,
}

impl Chunk {
    pub fn new(tag: Tag, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// A text chunk: UTF-8 bytes followed by a NUL terminator.
    pub fn text(tag: Tag, text: &str) -> Self {
        Self::new(tag, encode_text(text))
    }

    /// A container chunk whose payload is the serialised `children`.
    pub fn container(tag: Tag, children: &[Chunk]) -> Self {
        Self::new(tag, encode_all(children))
    }

    /// Decode the payload as nested chunks.
    pub fn children(&self) -> Vec<Chunk> {
        decode(&self.payload, 0, self.payload.len())
    }

    /// Decode the payload as text, dropping every NUL byte.
    pub fn as_text(&self) -> String {
        decode_text(&self.payload)
    }

    /// Serialised size: header plus payload.
    pub fn encoded_len(&self) -> usize {
        CHUNK_HEADER_SIZE + self.payload.len()
    }

    /// Append the serialised chunk to `buf`.
    ///
    /// The payload must fit the 32-bit length field; debug builds assert it.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(&self.tag.fourcc());
        buf.put_u32(length_field(self.payload.len()));
        buf.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

impl From<Chunk> for Bytes {
    fn from(chunk: Chunk) -> Self {
        chunk.to_bytes()
    }
}

/// The wire length for a payload of `len` bytes.
fn length_field(len: usize) -> u32 {
    debug_assert!(
        u32::try_from(len).is_ok(),
        "chunk payload of {len} bytes exceeds the 32-bit length field"
    );
    len as u32
}

/// Serialise one chunk: tag ++ big-endian length ++ payload.
pub fn encode(tag: Tag, payload: &[u8]) -> Bytes {
    Chunk::new(tag, Bytes::copy_from_slice(payload)).to_bytes()
}

/// Serialise sibling chunks back to back.
pub fn encode_all(chunks: &[Chunk]) -> Bytes {
    let total = chunks.iter().map(Chunk::encoded_len).sum();
    let mut buf = BytesMut::with_capacity(total);
    for chunk in chunks {
        chunk.write_to(&mut buf);
    }
    buf.freeze()
}

/// Decode the chunks found in `data[start..end]`.
///
/// Unrecognised bytes are skipped one at a time. Scanning stops once fewer
/// than [`CHUNK_HEADER_SIZE`] bytes remain before `end`.
pub fn decode(data: &Bytes, start: usize, end: usize) -> Vec<Chunk> {
    let end = end.min(data.len());
    let mut chunks = Vec::new();
    let mut pos = start;
    let mut skipped = 0usize;

    while pos < end && end - pos >= CHUNK_HEADER_SIZE {
        let fourcc: [u8; TAG_SIZE] = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        let Some(tag) = Tag::from_fourcc(fourcc) else {
            pos += 1;
            skipped += 1;
            continue;
        };

        if skipped > 0 {
            debug!(offset = pos, skipped, %tag, "Resynchronised on chunk tag");
            skipped = 0;
        }

        let length = u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
        let body_start = pos + CHUNK_HEADER_SIZE;
        let body_end = body_start.saturating_add(length as usize).min(end);
        if body_end - body_start < length as usize {
            debug!(offset = pos, %tag, length, available = body_end - body_start, "Clipping chunk payload");
        }
        trace!(offset = pos, %tag, length = body_end - body_start, "Decoded chunk");

        chunks.push(Chunk {
            tag,
            payload: data.slice(body_start..body_end),
        });
        pos = body_end;
    }

    if skipped > 0 {
        debug!(offset = pos, skipped, "Trailing bytes without a recognised tag");
    }
    chunks
}

/// Decode a whole buffer.
pub fn decode_all(data: &Bytes) -> Vec<Chunk> {
    decode(data, 0, data.len())
}

/// A chunk with its container children decoded recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkNode {
    pub tag: Tag,
    pub length: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChunkNode>,
}

impl ChunkNode {
    /// Build the tree for `chunk`, sitting `depth` containers down.
    /// Containers at [`MAX_NESTING_DEPTH`] become leaves.
    fn build(chunk: &Chunk, depth: usize) -> Self {
        let children = if !chunk.tag.is_container() {
            Vec::new()
        } else if depth >= MAX_NESTING_DEPTH {
            debug!(depth, tag = %chunk.tag, "Container nested too deep; not descending");
            Vec::new()
        } else {
            chunk.children().iter().map(|c| ChunkNode::build(c, depth + 1)).collect()
        };
        Self {
            tag: chunk.tag,
            length: chunk.payload.len(),
            children,
        }
    }

    /// Number of levels in this subtree, counting this node.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ChunkNode::depth).max().unwrap_or(0)
    }
}

impl From<&Chunk> for ChunkNode {
    fn from(chunk: &Chunk) -> Self {
        ChunkNode::build(chunk, 0)
    }
}

/// Decode `data` into a tree, descending into container tags.
pub fn decode_tree(data: &Bytes) -> Vec<ChunkNode> {
    decode_all(data).iter().map(ChunkNode::from).collect()
}

/// Text payload: UTF-8 bytes plus a single NUL terminator.
pub fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    out
}

/// Text payload to string. Every NUL byte is removed, not only the
/// terminator; the vendor tools emit embedded NULs and expect this.
pub fn decode_text(payload: &[u8]) -> String {
    let bytes: Vec<u8> = payload.iter().copied().filter(|&b| b != 0).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
