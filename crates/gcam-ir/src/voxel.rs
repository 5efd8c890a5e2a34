//! Voxelized stock: a flat byte grid where 1 is uncut material.

/// Default number of cells along the stock's longest axis.
pub const DEFAULT_RESOLUTION: u32 = 64;

/// Largest accepted resolution. Requests above it are clamped.
pub const MAX_RESOLUTION: u32 = 512;

/// Voxel grid covering the stock box.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelField {
    /// Target cell count along the longest stock axis.
    pub resolution: u32,
    size: [f64; 3],
    counts: [usize; 3],
    data: Vec<u8>,
}

impl Default for VoxelField {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION, [1.0, 1.0, 1.0])
    }
}

impl VoxelField {
    /// Allocate a fully solid field for a stock of `size`.
    ///
    /// The longest axis gets `resolution` cells; the others are scaled to
    /// keep cells close to cubic, with at least one cell per axis.
    /// `resolution` is clamped to `1..=MAX_RESOLUTION`.
    pub fn new(resolution: u32, size: [f64; 3]) -> Self {
        let resolution = resolution.clamp(1, MAX_RESOLUTION);
        let longest = size.iter().cloned().fold(0.0_f64, f64::max);
        let max = resolution as usize;
        let counts = size.map(|s| {
            if longest <= 0.0 {
                1
            } else {
                ((resolution as f64 * s / longest).round() as usize).clamp(1, max)
            }
        });
        let (counts, len) = match cell_count(counts) {
            Some(len) => (counts, len),
            None => ([1; 3], 1),
        };
        Self {
            resolution,
            size,
            counts,
            data: vec![1; len],
        }
    }

    /// Reallocate for a new stock size or resolution.
    pub fn realloc(&mut self, resolution: u32, size: [f64; 3]) {
        *self = Self::new(resolution, size);
    }

    /// Restore every cell to uncut.
    pub fn reset(&mut self) {
        self.data.fill(1);
    }

    /// Cells per axis.
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    /// Stock size the field covers.
    pub fn size(&self) -> [f64; 3] {
        self.size
    }

    /// Cell edge lengths per axis.
    pub fn pitch(&self) -> [f64; 3] {
        [
            self.size[0] / self.counts[0] as f64,
            self.size[1] / self.counts[1] as f64,
            self.size[2] / self.counts[2] as f64,
        ]
    }

    /// Flat index of a cell.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.counts[1] + y) * self.counts[0] + x
    }

    /// Cell value, `None` outside the grid.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        if x >= self.counts[0] || y >= self.counts[1] || z >= self.counts[2] {
            return None;
        }
        self.data.get(self.index(x, y, z)).copied()
    }

    /// Clear a cell. Returns true if it held material.
    pub fn clear(&mut self, x: usize, y: usize, z: usize) -> bool {
        if x >= self.counts[0] || y >= self.counts[1] || z >= self.counts[2] {
            return false;
        }
        let i = self.index(x, y, z);
        std::mem::replace(&mut self.data[i], 0) != 0
    }

    /// Number of uncut cells.
    pub fn solid_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Raw cells.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total cell count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-cell field (never produced by [`VoxelField::new`]).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn cell_count(counts: [usize; 3]) -> Option<usize> {
    counts[0].checked_mul(counts[1])?.checked_mul(counts[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_follow_longest_axis() {
        let field = VoxelField::new(64, [4.0, 2.0, 0.5]);
        assert_eq!(field.counts(), [64, 32, 8]);
        assert_eq!(field.len(), 64 * 32 * 8);
        assert_eq!(field.solid_count(), field.len());
    }

    #[test]
    fn test_thin_axis_gets_one_cell() {
        let field = VoxelField::new(10, [10.0, 10.0, 0.01]);
        assert_eq!(field.counts()[2], 1);
    }

    #[test]
    fn test_index_layout() {
        let field = VoxelField::new(10, [10.0, 10.0, 10.0]);
        assert_eq!(field.index(1, 0, 0), 1);
        assert_eq!(field.index(0, 1, 0), 10);
        assert_eq!(field.index(0, 0, 1), 100);
    }

    #[test]
    fn test_clear_and_reset() {
        let mut field = VoxelField::new(4, [1.0, 1.0, 1.0]);
        assert!(field.clear(1, 2, 3));
        assert!(!field.clear(1, 2, 3));
        assert!(!field.clear(9, 0, 0));
        assert_eq!(field.get(1, 2, 3), Some(0));
        assert_eq!(field.solid_count(), 63);
        field.reset();
        assert_eq!(field.solid_count(), 64);
    }

    #[test]
    fn test_resolution_is_clamped() {
        let field = VoxelField::new(u32::MAX, [1.0, 0.001, 0.001]);
        assert_eq!(field.resolution, MAX_RESOLUTION);
        assert_eq!(field.counts(), [MAX_RESOLUTION as usize, 1, 1]);

        let field = VoxelField::new(0, [1.0, 1.0, 1.0]);
        assert_eq!(field.resolution, 1);
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn test_nan_stock_axis_gets_one_cell() {
        let field = VoxelField::new(8, [2.0, f64::NAN, 1.0]);
        assert_eq!(field.counts(), [8, 1, 4]);
    }
}
