//! Image relief: zig-zag raster over a height map.

use gcam_ir::{Block, ImageData, NodeId};
use gcam_kernel_math::Point2;

use super::{plunge_feed, EmitContext};
use crate::CamError;

/// One row per pixel row, alternating direction. Pixel intensity maps to
/// depth: 1 is the stock surface, 0 the full relief depth. The image's
/// lower-left corner sits at the node origin.
pub(super) fn image(
    ctx: &EmitContext<'_>,
    id: NodeId,
    block: &Block,
    data: &ImageData,
) -> Result<String, CamError> {
    let tool = ctx.tool(id)?;
    let [cols, rows] = data.resolution;
    if cols == 0 || rows == 0 || data.size[0] <= 0.0 || data.size[1] <= 0.0 {
        return Err(CamError::EmptyGeometry(block.kind().name()));
    }
    let offset = ctx.doc.offset_of(id);
    let dx = data.size[0] / cols as f64;
    let dy = data.size[1] / rows as f64;
    let depth = data.size[2];

    let clear = ctx.clearance();
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    prog.rapid_z(clear);
    for j in 0..rows {
        let y = data.size[1] - (j as f64 + 0.5) * dy;
        let columns: Box<dyn Iterator<Item = u32>> = if j % 2 == 0 {
            Box::new(0..cols)
        } else {
            Box::new((0..cols).rev())
        };
        for i in columns {
            let p = offset.apply(&Point2::new((i as f64 + 0.5) * dx, y));
            let z = -(1.0 - data.pixel(i, j).clamp(0.0, 1.0) as f64) * depth;
            if j == 0 && i == 0 {
                prog.rapid_xy(p).feed_z(z, plunge_feed(tool));
            } else {
                prog.feed_xyz(p, z, tool.feed);
            }
        }
    }
    prog.rapid_z(clear);
    Ok(prog.finish())
}

#[cfg(test)]
mod tests {
    use gcam_ir::{Block, BlockData, Document, ImageData, ToolData};

    use crate::synth::generate_fragment;

    #[test]
    fn test_raster_alternates_direction() {
        let mut doc = Document::new("t");
        doc.machine.decimals = 2;
        doc.add(Block::new(BlockData::Tool(ToolData::default())));
        let img = doc.add(Block::new(BlockData::Image(ImageData::new(
            [2, 2],
            [2.0, 2.0, 0.5],
            vec![1.0, 0.0, 0.5, 1.0],
        ))));
        let code = generate_fragment(&doc, img);
        let moves: Vec<&str> = code.lines().filter(|l| l.starts_with("G01 X")).collect();
        assert_eq!(moves.len(), 3);
        assert!(moves[0].starts_with("G01 X1.50 Y1.50 Z-0.50"));
        // Second row runs right to left.
        assert!(moves[1].starts_with("G01 X1.50 Y0.50 Z0.00"));
        assert!(moves[2].starts_with("G01 X0.50 Y0.50 Z-0.25"));
    }
}
