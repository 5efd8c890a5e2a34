//! Bounded chunk reader over a byte slice.

use gcam_kernel_math::Point2;

use crate::{CodecError, Result};

/// Cursor over a chunk body. Every nested reader is bounded by its
/// enclosing chunk, so a bad length can never read past it.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    /// Reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(CodecError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Next chunk as `(tag, body)`, or `None` at the end.
    pub fn next_chunk(&mut self) -> Result<Option<(u8, ChunkReader<'a>)>> {
        if self.is_empty() {
            return Ok(None);
        }
        let tag = self.read_u8()?;
        let len = self.read_u32()? as usize;
        let body = self.take(len)?;
        Ok(Some((tag, ChunkReader::new(body))))
    }

    /// One byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Boolean byte; any non-zero value is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Little-endian `f64`.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Little-endian `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Two `f64`s as a point.
    pub fn read_point(&mut self) -> Result<Point2> {
        Ok(Point2::new(self.read_f64()?, self.read_f64()?))
    }

    /// The rest of the body as UTF-8 text.
    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.take(self.remaining())?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// The rest of the body as `f32`s; a trailing partial value is truncation.
    pub fn read_f32s(&mut self) -> Result<Vec<f32>> {
        let n = self.remaining();
        if n % 4 != 0 {
            return Err(CodecError::Truncated {
                needed: n.next_multiple_of(4),
                available: n,
            });
        }
        (0..n / 4).map(|_| self.read_f32()).collect()
    }
}
