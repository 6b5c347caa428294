use bytes::Bytes;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::chunk::{self, Chunk, Tag};
use crate::constants::MAX_NESTING_DEPTH;

/// One file carried by a pack: a sample, style, or similar asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Blob {
    pub uid: String,
    pub title: String,
    pub extension: String,
    /// Opaque icon code; not every blob carries one.
    pub icon_code: Option<String>,
    #[serde(rename = "size", serialize_with = "serialize_len")]
    pub data: Bytes,
}

fn serialize_len<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(data.len() as u64)
}

impl Blob {
    /// Build the BLOB container chunk: EUID, ETIT, EEXT, optional EICO, FBIN.
    pub fn to_chunk(&self) -> Chunk {
        let mut children = vec![
            Chunk::text(Tag::Euid, &self.uid),
            Chunk::text(Tag::Etit, &self.title),
            Chunk::text(Tag::Eext, &self.extension),
        ];
        if let Some(icon) = &self.icon_code {
            children.push(Chunk::text(Tag::Eico, icon));
        }
        children.push(Chunk::new(Tag::Fbin, self.data.clone()));
        Chunk::container(Tag::Blob, &children)
    }

    /// Read a blob from the payload of a BLOB chunk. Missing fields stay at
    /// their defaults.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let mut blob = Blob::default();
        for child in chunk.children() {
            match child.tag {
                Tag::Euid => blob.uid = child.as_text(),
                Tag::Etit => blob.title = child.as_text(),
                Tag::Eext => blob.extension = child.as_text(),
                Tag::Eico => blob.icon_code = Some(child.as_text()),
                Tag::Fbin => blob.data = child.payload,
                other => debug!(%other, "Ignoring chunk inside BLOB"),
            }
        }
        blob
    }
}

/// The logical content of a PPF pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pack {
    pub uid: String,
    pub title: String,
    pub blobs: Vec<Blob>,
}

impl Pack {
    /// Decode a pack from raw container bytes.
    ///
    /// Pack fields may sit at the top level or inside an XPFH container.
    /// The first EUID and ETIT win; BLOBs are kept in order. A pack with
    /// missing fields is returned as-is with a warning. XPFH containers
    /// nested deeper than [`MAX_NESTING_DEPTH`] are skipped.
    pub fn from_bytes(data: &Bytes) -> Self {
        let mut pack = Pack::default();
        let mut seen_uid = false;
        let mut seen_title = false;
        pack.collect(&chunk::decode_all(data), 0, &mut seen_uid, &mut seen_title);

        debug!(
            uid = %pack.uid,
            title = %pack.title,
            blobs = pack.blobs.len(),
            "Decoded pack"
        );
        if !pack.is_complete() {
            warn!(
                has_uid = seen_uid,
                has_title = seen_title,
                blobs = pack.blobs.len(),
                "Pack is incomplete; input may be truncated"
            );
        }
        pack
    }

    fn collect(&mut self, chunks: &[Chunk], depth: usize, seen_uid: &mut bool, seen_title: &mut bool) {
        for chunk in chunks {
            match chunk.tag {
                Tag::Euid if !*seen_uid => {
                    self.uid = chunk.as_text();
                    *seen_uid = true;
                }
                Tag::Etit if !*seen_title => {
                    self.title = chunk.as_text();
                    *seen_title = true;
                }
                Tag::Blob => self.blobs.push(Blob::from_chunk(chunk)),
                Tag::Xpfh if depth < MAX_NESTING_DEPTH => {
                    self.collect(&chunk.children(), depth + 1, seen_uid, seen_title)
                }
                Tag::Xpfh => debug!(depth, length = chunk.payload.len(), "XPFH nested too deep; not descending"),
                other => debug!(%other, length = chunk.payload.len(), "Skipping chunk at pack level"),
            }
        }
    }

    /// Whether an identifier, a title and at least one blob were found.
    pub fn is_complete(&self) -> bool {
        !self.uid.is_empty() && !self.title.is_empty() && !self.blobs.is_empty()
    }

    /// Pack-level chunks in output order: EUID, ETIT, then one BLOB each.
    pub fn to_chunks(&self) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(2 + self.blobs.len());
        chunks.push(Chunk::text(Tag::Euid, &self.uid));
        chunks.push(Chunk::text(Tag::Etit, &self.title));
        chunks.extend(self.blobs.iter().map(Blob::to_chunk));
        chunks
    }

    /// Serialised pack-level chunks; this is the CPI plaintext payload.
    pub fn encode(&self) -> Bytes {
        chunk::encode_all(&self.to_chunks())
    }

    pub fn total_data_len(&self) -> usize {
        self.blobs.iter().map(|b| b.data.len()).sum()
    }
}
