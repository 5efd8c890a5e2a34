//! Flat-end tool footprint removal.

use gcam_ir::VoxelField;
use gcam_kernel_math::{Point3, PRECISION};

/// Height of the swept cylinder, in tool radii, above the tip.
const SHANK_RADII: f64 = 10.0;

/// Inclusive index range of cells whose centers lie in `[lo, hi]` along an
/// axis starting at `min` with cell pitch `pitch`, clamped to `count` cells.
fn cell_range(lo: f64, hi: f64, min: f64, pitch: f64, count: usize) -> Option<(usize, usize)> {
    let first = ((lo - min) / pitch - 0.5).ceil().max(0.0);
    let last = ((hi - min) / pitch - 0.5).floor();
    if last < first || first >= count as f64 {
        return None;
    }
    Some((first as usize, (last as usize).min(count - 1)))
}

/// Clear every cell covered by a flat tool of `diameter` whose tip sits at
/// `tip`, in stock coordinates (x in `[0, sx]`, y in `[0, sy]`, z in
/// `[-sz, 0]`). Returns the number of cells that held material.
pub fn carve(field: &mut VoxelField, tip: &Point3, diameter: f64) -> usize {
    let radius = diameter / 2.0 + 100.0 * PRECISION;
    let sz = field.size()[2];
    let [px, py, pz] = field.pitch();
    let [nx, ny, nz] = field.counts();

    let Some((x0, x1)) = cell_range(tip.x - radius, tip.x + radius, 0.0, px, nx) else {
        return 0;
    };
    let Some((y0, y1)) = cell_range(tip.y - radius, tip.y + radius, 0.0, py, ny) else {
        return 0;
    };
    let top = tip.z + SHANK_RADII * radius;
    let Some((z0, z1)) = cell_range(tip.z, top, -sz, pz, nz) else {
        return 0;
    };

    let r2 = radius * radius;
    let mut removed = 0;
    for iy in y0..=y1 {
        let dy = (iy as f64 + 0.5) * py - tip.y;
        for ix in x0..=x1 {
            let dx = (ix as f64 + 0.5) * px - tip.x;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            for iz in z0..=z1 {
                if field.clear(ix, iy, iz) {
                    removed += 1;
                }
            }
        }
    }
    removed
}
