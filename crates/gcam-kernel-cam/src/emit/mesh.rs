//! Imported meshes, cut slice by slice from the top down.

use gcam_ir::{Block, NodeId, StlData};
use gcam_kernel_math::Point2;

use super::{plunge_feed, EmitContext};
use crate::CamError;

const CHAIN_EPS: f64 = 1e-6;

/// Join unordered segments into polylines by matching endpoints.
fn chain_segments(segments: &[(Point2, Point2)]) -> Vec<Vec<Point2>> {
    let mut remaining = segments.to_vec();
    let mut chains = Vec::new();
    while !remaining.is_empty() {
        let (a, b) = remaining.remove(0);
        let mut chain = vec![a, b];
        let mut grown = true;
        while grown {
            grown = false;
            let mut i = 0;
            while i < remaining.len() {
                let (pa, pb) = remaining[i];
                let head = chain[0];
                let tail = chain[chain.len() - 1];
                if (pa - tail).norm() < CHAIN_EPS {
                    chain.push(pb);
                } else if (pb - tail).norm() < CHAIN_EPS {
                    chain.push(pa);
                } else if (pb - head).norm() < CHAIN_EPS {
                    chain.insert(0, pa);
                } else if (pa - head).norm() < CHAIN_EPS {
                    chain.insert(0, pb);
                } else {
                    i += 1;
                    continue;
                }
                remaining.remove(i);
                grown = true;
            }
        }
        chains.push(chain);
    }
    chains
}

pub(super) fn stl(
    ctx: &EmitContext<'_>,
    id: NodeId,
    block: &Block,
    data: &StlData,
) -> Result<String, CamError> {
    let tool = ctx.tool(id)?;
    if data.contours.iter().all(|s| s.segments.is_empty()) {
        return Err(CamError::EmptyGeometry(block.kind().name()));
    }
    let offset = ctx.doc.offset_of(id);
    let clear = ctx.clearance();
    let plunge = plunge_feed(tool);
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    for slice in &data.contours {
        for chain in chain_segments(&slice.segments) {
            let mut points = chain.iter().map(|p| offset.apply(p));
            let Some(first) = points.next() else {
                continue;
            };
            prog.rapid_z(clear).rapid_xy(first).feed_z(slice.z, plunge);
            for p in points {
                prog.feed_xy(p, Some(tool.feed));
            }
        }
        prog.rapid_z(clear);
    }
    Ok(prog.finish())
}
