#![warn(missing_docs)]

//! Binary project format for gcam documents.
//!
//! # File Format
//!
//! ```text
//! [Header: 12 bytes]
//!   Magic: 'GCAM'
//!   Total length: u32, backpatched after writing
//!   Version: u32
//!
//! [Chunks: variable]
//!   tag: u8 | length: u32 | payload
//!   0xF0  document metadata (nested field chunks)
//!   0xF1  machine metadata (nested field chunks)
//!   kind  node record:
//!           0xFF comment, 0xFE flags, kind fields from 0x00,
//!           containers: 0x80 count, then `count` nested node records
//! ```
//!
//! All numbers are little-endian. Unknown chunks are skipped by length.

pub mod reader;
pub mod record;
pub mod writer;

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use gcam_ir::{Document, ListId, MaterialType, NodeId, Units, MAX_RESOLUTION};
use thiserror::Error;
use tracing::{debug, info, warn};

use constants::*;
pub use reader::ChunkReader;
pub use writer::ChunkWriter;

/// Format constants.
pub mod constants {
    /// File magic.
    pub const MAGIC: [u8; 4] = *b"GCAM";

    /// Current format version.
    pub const VERSION: u32 = 0x0000_0100;

    /// Header size in bytes.
    pub const HEADER_SIZE: usize = 12;

    /// Maximum container nesting.
    pub const MAX_RECURSION_DEPTH: usize = 64;

    /// Document metadata chunk.
    pub const TAG_DOCUMENT: u8 = 0xF0;
    /// Machine metadata chunk.
    pub const TAG_MACHINE: u8 = 0xF1;

    /// Node comment sub-chunk.
    pub const TAG_COMMENT: u8 = 0xFF;
    /// Node flags sub-chunk.
    pub const TAG_FLAGS: u8 = 0xFE;
    /// Container child count sub-chunk.
    pub const TAG_COUNT: u8 = 0x80;

    // Document fields
    pub(crate) const DOC_NAME: u8 = 0;
    pub(crate) const DOC_UNITS: u8 = 1;
    pub(crate) const DOC_MATERIAL: u8 = 2;
    pub(crate) const DOC_SIZE: u8 = 3;
    pub(crate) const DOC_ORIGIN: u8 = 4;
    pub(crate) const DOC_ZTRAVERSE: u8 = 5;
    pub(crate) const DOC_NOTES: u8 = 6;
    pub(crate) const DOC_PROJECT: u8 = 7;
    pub(crate) const DOC_RESOLUTION: u8 = 8;

    // Machine fields
    pub(crate) const MACHINE_NAME: u8 = 0;
    pub(crate) const MACHINE_OPTIONS: u8 = 1;
    pub(crate) const MACHINE_DRIVER: u8 = 2;
    pub(crate) const MACHINE_DECIMALS: u8 = 3;
}

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with the `GCAM` magic.
    #[error("invalid magic: expected {:?}, found {found:?}", MAGIC)]
    BadMagic {
        /// The four bytes actually read.
        found: [u8; 4],
    },

    /// Written by a newer format version.
    #[error("unsupported format version 0x{0:08X}")]
    UnsupportedVersion(u32),

    /// A declared length runs past the available bytes.
    #[error("truncated data: expected {needed} bytes, only {available} available")]
    Truncated {
        /// Bytes the length field asked for.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// Containers nested deeper than [`constants::MAX_RECURSION_DEPTH`].
    #[error("recursion limit exceeded: max depth is {0}")]
    RecursionLimit(usize),

    /// A text chunk is not valid UTF-8.
    #[error("invalid UTF-8 in text chunk: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A count or size field beyond what the decoder accepts.
    #[error("{field} {value} is out of range")]
    OutOfRange {
        /// Which field.
        field: &'static str,
        /// The value read.
        value: u64,
    },

    /// A chunk body does not fit a `u32` length.
    #[error("chunk of {0} bytes exceeds the format limit")]
    ChunkTooLarge(u64),
}

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Write a complete document to a seekable stream.
pub fn write_document<W: Write + Seek>(out: W, doc: &Document) -> Result<W> {
    let mut w = ChunkWriter::new(out);
    let start = w.position()?;
    w.raw(&MAGIC)?;
    let total = w.placeholder()?;
    w.raw(&VERSION.to_le_bytes())?;

    w.chunk(TAG_DOCUMENT, |w| {
        w.str(DOC_NAME, &doc.name)?;
        w.u8(DOC_UNITS, doc.material.units.to_byte())?;
        w.u8(DOC_MATERIAL, doc.material.kind.to_byte())?;
        w.f64s(DOC_SIZE, &doc.material.size)?;
        w.f64s(DOC_ORIGIN, &doc.material.origin)?;
        w.f64(DOC_ZTRAVERSE, doc.material.ztraverse)?;
        w.str(DOC_NOTES, &doc.notes)?;
        w.u32(DOC_PROJECT, doc.project_number)?;
        w.u32(DOC_RESOLUTION, doc.voxels.resolution)
    })?;
    w.chunk(TAG_MACHINE, |w| {
        w.str(MACHINE_NAME, &doc.machine.name)?;
        w.u8(MACHINE_OPTIONS, doc.machine.options)?;
        w.u8(MACHINE_DRIVER, doc.machine.driver.to_byte())?;
        w.u8(MACHINE_DECIMALS, doc.machine.decimals)
    })?;
    for id in doc.tree().iter(doc.root()) {
        record::write_node(&mut w, doc, id)?;
    }

    let end = w.position()?;
    w.patch_len(total, end - start)?;
    Ok(w.into_inner())
}

/// Encode a document to bytes.
pub fn encode(doc: &Document) -> Result<Vec<u8>> {
    Ok(write_document(Cursor::new(Vec::new()), doc)?.into_inner())
}

/// Decode a document from bytes. No partial document is returned on error.
pub fn decode(data: &[u8]) -> Result<Document> {
    if data.len() < HEADER_SIZE {
        if data.len() >= 4 && data[..4] != MAGIC {
            return Err(CodecError::BadMagic {
                found: [data[0], data[1], data[2], data[3]],
            });
        }
        return Err(CodecError::Truncated {
            needed: HEADER_SIZE,
            available: data.len(),
        });
    }
    let mut header = ChunkReader::new(&data[..HEADER_SIZE]);
    let magic = header.take(4)?;
    if magic != MAGIC {
        return Err(CodecError::BadMagic {
            found: [magic[0], magic[1], magic[2], magic[3]],
        });
    }
    let total = header.read_u32()? as usize;
    let version = header.read_u32()?;
    if version > VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    if total > data.len() || total < HEADER_SIZE {
        return Err(CodecError::Truncated {
            needed: total.max(HEADER_SIZE),
            available: data.len(),
        });
    }

    let mut doc = Document::new("");
    let root = doc.root();
    let mut resolution = doc.voxels.resolution;
    let mut body = ChunkReader::new(&data[HEADER_SIZE..total]);
    while let Some((tag, mut chunk)) = body.next_chunk()? {
        match tag {
            TAG_DOCUMENT => {
                while let Some((field, mut r)) = chunk.next_chunk()? {
                    let m = &mut doc.material;
                    match field {
                        DOC_NAME => doc.name = r.read_str()?,
                        DOC_UNITS => m.units = Units::from_byte(r.read_u8()?),
                        DOC_MATERIAL => m.kind = MaterialType::from_byte(r.read_u8()?),
                        DOC_SIZE => m.size = [r.read_f64()?, r.read_f64()?, r.read_f64()?],
                        DOC_ORIGIN => m.origin = [r.read_f64()?, r.read_f64()?, r.read_f64()?],
                        DOC_ZTRAVERSE => m.ztraverse = r.read_f64()?,
                        DOC_NOTES => doc.notes = r.read_str()?,
                        DOC_PROJECT => doc.project_number = r.read_u32()?,
                        DOC_RESOLUTION => resolution = read_resolution(&mut r)?,
                        _ => debug!(field, "skipping unknown document field"),
                    }
                }
            }
            TAG_MACHINE => {
                while let Some((field, mut r)) = chunk.next_chunk()? {
                    let m = &mut doc.machine;
                    match field {
                        MACHINE_NAME => m.name = r.read_str()?,
                        MACHINE_OPTIONS => m.options = r.read_u8()?,
                        MACHINE_DRIVER => m.driver = gcam_ir::Driver::from_byte(r.read_u8()?),
                        MACHINE_DECIMALS => m.decimals = r.read_u8()?,
                        _ => debug!(field, "skipping unknown machine field"),
                    }
                }
            }
            _ => {
                record::read_node(&mut doc, root, tag, chunk, 0)?;
            }
        }
    }
    doc.set_resolution(resolution);
    Ok(doc)
}

fn read_resolution(r: &mut ChunkReader<'_>) -> Result<u32> {
    let value = r.read_u32()?;
    if value == 0 || value > MAX_RESOLUTION {
        return Err(CodecError::OutOfRange {
            field: "voxel resolution",
            value: value.into(),
        });
    }
    Ok(value)
}

/// Encode a node and its subtree without a file header, e.g. for a
/// clipboard.
pub fn encode_subtree(doc: &Document, id: NodeId) -> Result<Vec<u8>> {
    let mut w = ChunkWriter::new(Cursor::new(Vec::new()));
    record::write_node(&mut w, doc, id)?;
    Ok(w.into_inner().into_inner())
}

/// Decode records produced by [`encode_subtree`] and append them to `list`.
pub fn decode_subtree(doc: &mut Document, list: ListId, data: &[u8]) -> Result<Vec<NodeId>> {
    let mut r = ChunkReader::new(data);
    let mut ids = Vec::new();
    while let Some((tag, chunk)) = r.next_chunk()? {
        if let Some(id) = record::read_node(doc, list, tag, chunk, 0)? {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Save a document to `path`.
pub fn save(doc: &Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut out = write_document(BufWriter::new(file), doc)?;
    out.flush()?;
    info!(path = %path.display(), nodes = doc.node_count(), "saved document");
    Ok(())
}

/// Load a document from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let doc = decode(&data)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "load failed"))?;
    info!(path = %path.display(), nodes = doc.node_count(), "loaded document");
    Ok(doc)
}
