//! Chunk writer with length backpatching.

use std::io::{Seek, SeekFrom, Write};

use gcam_kernel_math::Point2;

use crate::{CodecError, Result};

/// Writes `{tag, u32 length, payload}` chunks to a seekable stream.
///
/// Lengths are written as zero and patched once the chunk body is complete,
/// so nested chunks can be streamed without buffering.
pub struct ChunkWriter<W: Write + Seek> {
    out: W,
}

impl<W: Write + Seek> ChunkWriter<W> {
    /// Wrap a stream.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Unwrap the stream.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Current stream position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.out.stream_position()?)
    }

    /// Raw bytes, outside any chunk framing.
    pub fn raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        Ok(())
    }

    /// Write a zero length field and return its position for [`patch_len`].
    ///
    /// [`patch_len`]: ChunkWriter::patch_len
    pub fn placeholder(&mut self) -> Result<u64> {
        let at = self.position()?;
        self.out.write_all(&0u32.to_le_bytes())?;
        Ok(at)
    }

    /// Backpatch the length field at `at` with `value`.
    pub fn patch_len(&mut self, at: u64, value: u64) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| CodecError::ChunkTooLarge(value))?;
        let end = self.position()?;
        self.out.seek(SeekFrom::Start(at))?;
        self.out.write_all(&value.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Open a chunk; returns the position of its length field.
    pub fn begin(&mut self, tag: u8) -> Result<u64> {
        self.out.write_all(&[tag])?;
        self.placeholder()
    }

    /// Close a chunk opened at `at`.
    pub fn end(&mut self, at: u64) -> Result<()> {
        let body = self.position()? - (at + 4);
        self.patch_len(at, body)
    }

    /// Write a chunk whose body is produced by `body`.
    pub fn chunk<F>(&mut self, tag: u8, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let at = self.begin(tag)?;
        body(self)?;
        self.end(at)
    }

    /// Chunk holding raw bytes.
    pub fn bytes(&mut self, tag: u8, bytes: &[u8]) -> Result<()> {
        self.chunk(tag, |w| w.raw(bytes))
    }

    /// Chunk holding UTF-8 text.
    pub fn str(&mut self, tag: u8, text: &str) -> Result<()> {
        self.bytes(tag, text.as_bytes())
    }

    /// Chunk holding one byte.
    pub fn u8(&mut self, tag: u8, v: u8) -> Result<()> {
        self.bytes(tag, &[v])
    }

    /// Chunk holding a boolean byte.
    pub fn bool(&mut self, tag: u8, v: bool) -> Result<()> {
        self.u8(tag, v as u8)
    }

    /// Chunk holding a little-endian `u32`.
    pub fn u32(&mut self, tag: u8, v: u32) -> Result<()> {
        self.bytes(tag, &v.to_le_bytes())
    }

    /// Chunk holding little-endian `u32`s.
    pub fn u32s(&mut self, tag: u8, vs: &[u32]) -> Result<()> {
        self.chunk(tag, |w| {
            for v in vs {
                w.raw(&v.to_le_bytes())?;
            }
            Ok(())
        })
    }

    /// Chunk holding a little-endian `f64`.
    pub fn f64(&mut self, tag: u8, v: f64) -> Result<()> {
        self.bytes(tag, &v.to_le_bytes())
    }

    /// Chunk holding little-endian `f64`s.
    pub fn f64s(&mut self, tag: u8, vs: &[f64]) -> Result<()> {
        self.chunk(tag, |w| {
            for v in vs {
                w.raw(&v.to_le_bytes())?;
            }
            Ok(())
        })
    }

    /// Chunk holding little-endian `f32`s.
    pub fn f32s(&mut self, tag: u8, vs: &[f32]) -> Result<()> {
        self.chunk(tag, |w| {
            for v in vs {
                w.raw(&v.to_le_bytes())?;
            }
            Ok(())
        })
    }

    /// Chunk holding a planar point as two `f64`s.
    pub fn point(&mut self, tag: u8, p: &Point2) -> Result<()> {
        self.f64s(tag, &[p.x, p.y])
    }
}
