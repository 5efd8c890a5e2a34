//! Lines, arcs and sketches.

use gcam_ir::geometry::{self, EndpointMode, Segment};
use gcam_ir::{Block, NodeId, SketchData};
use gcam_kernel_math::{points_equal, Point2};

use super::{pass_depths, plunge_feed, EmitContext};
use crate::post::Program;
use crate::CamError;

/// Append the cutting move for `seg`, assuming the tool sits at its start.
pub(crate) fn cut(prog: &mut Program<'_>, seg: &Segment, feed: Option<f64>) {
    match *seg {
        Segment::Line { p1, .. } => {
            prog.feed_xy(p1, feed);
        }
        Segment::Arc { center, sweep, .. } => {
            let (start, end) = seg.endpoints();
            prog.arc(sweep < 0.0, end, center - start, feed);
        }
        Segment::Point(_) => {}
    }
}

/// A lone Line or Arc: one feed move from its start point.
pub(super) fn single(
    ctx: &EmitContext<'_>,
    id: NodeId,
    block: &Block,
) -> Result<String, CamError> {
    let tool = ctx.tool(id)?;
    let seg = geometry::segment(ctx.doc, id, EndpointMode::Offset)
        .filter(|s| s.length() > 0.0)
        .ok_or(CamError::EmptyGeometry(block.kind().name()))?;
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    cut(&mut prog, &seg, Some(tool.feed));
    Ok(prog.finish())
}

/// Contour passes from the first step down to the sketch depth.
pub(super) fn sketch(
    ctx: &EmitContext<'_>,
    id: NodeId,
    block: &Block,
    data: &SketchData,
) -> Result<String, CamError> {
    let tool = ctx.tool(id)?;
    let doc = ctx.doc;
    let segments: Vec<Segment> = doc
        .children(id)
        .map(|list| doc.tree().ids(list))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|child| geometry::segment(doc, child, EndpointMode::Offset))
        .filter(|s| !matches!(s, Segment::Point(_)))
        .collect();
    if segments.is_empty() {
        return Err(CamError::EmptyGeometry(block.kind().name()));
    }
    let levels = pass_depths(data.step, data.depth);
    if levels.is_empty() {
        return Err(CamError::InvalidDepth(block.kind().name()));
    }

    let clear = ctx.clearance();
    let plunge = plunge_feed(tool);
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    for level in levels {
        let mut at: Option<Point2> = None;
        for seg in &segments {
            let (start, end) = seg.endpoints();
            if !at.is_some_and(|p| points_equal(&p, &start)) {
                prog.rapid_z(clear).rapid_xy(start).feed_z(-level, plunge);
            }
            cut(&mut prog, seg, Some(tool.feed));
            at = Some(end);
        }
        prog.rapid_z(clear);
    }
    Ok(prog.finish())
}

#[cfg(test)]
mod tests {
    use gcam_ir::{ArcData, Block, BlockData, Document, LineData, SketchData, ToolData};
    use gcam_kernel_math::Point2;

    use crate::synth::{generate, generate_fragment, SynthOptions};

    fn doc_with_tool() -> Document {
        let mut doc = Document::new("t");
        doc.machine.decimals = 2;
        doc.add(Block::new(BlockData::Tool(ToolData {
            diameter: 0.25,
            feed: 10.0,
            plunge_ratio: 0.5,
            ..ToolData::default()
        })));
        doc
    }

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Block {
        Block::new(BlockData::Line(LineData {
            p0: Point2::new(x0, y0),
            p1: Point2::new(x1, y1),
        }))
    }

    #[test]
    fn test_connected_sketch_plunges_once_per_pass() {
        let mut doc = doc_with_tool();
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData {
            depth: 0.2,
            step: 0.1,
            ..SketchData::default()
        })));
        doc.add_child(sketch, line(0.0, 0.0, 1.0, 0.0)).unwrap();
        doc.add_child(sketch, line(1.0, 0.0, 1.0, 1.0)).unwrap();
        let code = generate_fragment(&doc, sketch);
        assert_eq!(code.matches("G01 Z").count(), 2);
        assert!(code.contains("G01 Z-0.10 F5.00\n"));
        assert!(code.contains("G01 Z-0.20"));
        assert!(code.contains("G01 X1.00 Y1.00"));
    }

    #[test]
    fn test_disconnected_segments_replunge() {
        let mut doc = doc_with_tool();
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData {
            depth: 0.1,
            step: 0.1,
            ..SketchData::default()
        })));
        doc.add_child(sketch, line(0.0, 0.0, 1.0, 0.0)).unwrap();
        doc.add_child(sketch, line(2.0, 0.0, 3.0, 0.0)).unwrap();
        let code = generate_fragment(&doc, sketch);
        assert_eq!(code.matches("G01 Z-0.10").count(), 2);
        assert!(code.contains("G00 X2.00 Y0.00\n"));
    }

    #[test]
    fn test_arc_direction_and_center_offset() {
        let mut doc = doc_with_tool();
        let arc = doc.add(Block::new(BlockData::Arc(ArcData {
            p: Point2::new(1.0, 0.0),
            radius: 1.0,
            start_angle: 0.0,
            sweep: -90.0,
        })));
        let code = generate_fragment(&doc, arc);
        assert_eq!(code, "G02 X0.00 Y-1.00 I-1.00 J0.00 F10.00\n");
    }

    #[test]
    fn test_sketch_without_tool_reports_status() {
        let mut doc = Document::new("t");
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData::default())));
        doc.add_child(sketch, line(0.0, 0.0, 1.0, 0.0)).unwrap();
        assert!(generate_fragment(&doc, sketch).is_empty());
    }

    #[test]
    fn test_lone_line_without_tool_reports_status() {
        let mut doc = Document::new("t");
        let lone = doc.add(line(0.0, 0.0, 1.0, 0.0));
        let program = generate(&mut doc, SynthOptions::default());
        assert!(program.is_empty());
        let block = doc.get(lone).unwrap();
        assert!(block.code.is_empty());
        assert!(!block.status.is_empty());
    }
}
