//! Drill and bolt-hole patterns.

use gcam_ir::geometry::{self, EndpointMode, Segment};
use gcam_ir::{Block, BoltHolesData, DrillHolesData, NodeId};
use gcam_kernel_math::{Point2, Vec2, PRECISION};

use super::{pass_depths, plunge_feed, EmitContext};
use crate::path::{plan_order, PathMode};
use crate::CamError;

fn child_segments(ctx: &EmitContext<'_>, id: NodeId) -> Vec<Segment> {
    let doc = ctx.doc;
    doc.children(id)
        .map(|list| doc.tree().ids(list))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|child| geometry::segment(doc, child, EndpointMode::Offset))
        .collect()
}

/// One peck cycle through every Point child, then cancel.
pub(super) fn drill(
    ctx: &EmitContext<'_>,
    id: NodeId,
    block: &Block,
    data: &DrillHolesData,
) -> Result<String, CamError> {
    let tool = ctx.tool(id)?;
    let points: Vec<Point2> = child_segments(ctx, id)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Point(p) => Some(p),
            _ => None,
        })
        .collect();
    if points.is_empty() {
        return Err(CamError::EmptyGeometry(block.kind().name()));
    }
    if data.depth <= PRECISION {
        return Err(CamError::InvalidDepth(block.kind().name()));
    }
    let mode = if data.optimal_path {
        PathMode::Optimal
    } else {
        PathMode::AsListed
    };
    let order = plan_order(&points, mode);
    let increment = if data.increment > PRECISION {
        data.increment
    } else {
        data.depth
    };

    let fmt = ctx.fmt;
    let clear = ctx.clearance();
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    prog.rapid_z(clear);
    for (n, &i) in order.iter().enumerate() {
        let p = points[i];
        if n == 0 {
            prog.rapid_xy(p);
            prog.raw(&format!(
                "G83 {} {} {} {} {} F{}",
                fmt.word('X', p.x),
                fmt.word('Y', p.y),
                fmt.word('Z', -data.depth),
                fmt.word('R', clear),
                fmt.word('Q', increment),
                fmt.coord(plunge_feed(tool)),
            ));
        } else {
            prog.raw(&format!("{} {}", fmt.word('X', p.x), fmt.word('Y', p.y)));
        }
    }
    prog.raw("G80");
    prog.rapid_z(clear);
    Ok(prog.finish())
}

/// Every hole circle: plunged when the tool fills it, otherwise
/// circle-milled in depth passes.
pub(super) fn bolt(
    ctx: &EmitContext<'_>,
    id: NodeId,
    block: &Block,
    data: &BoltHolesData,
) -> Result<String, CamError> {
    let tool = ctx.tool(id)?;
    let holes: Vec<(Point2, f64)> = child_segments(ctx, id)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Arc { center, radius, .. } => Some((center, radius)),
            _ => None,
        })
        .collect();
    if holes.is_empty() {
        return Err(CamError::EmptyGeometry(block.kind().name()));
    }
    let levels = pass_depths(data.step, data.depth);
    if levels.is_empty() {
        return Err(CamError::InvalidDepth(block.kind().name()));
    }
    let centers: Vec<Point2> = holes.iter().map(|h| h.0).collect();
    let order = plan_order(&centers, PathMode::Optimal);

    let clear = ctx.clearance();
    let plunge = plunge_feed(tool);
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    for i in order {
        let (center, radius) = holes[i];
        let mill = radius - tool.radius();
        prog.rapid_z(clear);
        if mill <= PRECISION {
            prog.rapid_xy(center).feed_z(-data.depth, plunge);
        } else {
            let start = Point2::new(center.x + mill, center.y);
            prog.rapid_xy(start);
            for &level in &levels {
                prog.feed_z(-level, plunge);
                prog.arc(false, start, Vec2::new(-mill, 0.0), Some(tool.feed));
            }
        }
        prog.rapid_z(clear);
    }
    Ok(prog.finish())
}
