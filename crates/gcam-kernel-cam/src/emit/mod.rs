//! Per-kind G-code emission.
//!
//! Every routine builds its fragment with a [`Program`] and assumes absolute
//! mode with Z measured from the stock top. A node that cannot be emitted
//! (no tool in scope, empty geometry) yields an empty fragment and records
//! the reason as its status.

mod contour;
mod group;
mod holes;
mod mesh;
mod relief;
mod setup;

use gcam_ir::{Block, BlockData, Document, NodeId, ToolData};
use gcam_kernel_math::PRECISION;
use tracing::debug;

use crate::post::{Format, PostProcessor, Program};
use crate::CamError;

/// Shared state for one synthesis pass.
pub struct EmitContext<'a> {
    /// Document being emitted.
    pub doc: &'a Document,
    /// Target dialect.
    pub post: &'a dyn PostProcessor,
    /// Numeric format.
    pub fmt: Format,
    statuses: Vec<(NodeId, String)>,
}

impl<'a> EmitContext<'a> {
    /// Context for `doc`.
    pub fn new(doc: &'a Document, post: &'a dyn PostProcessor, fmt: Format) -> Self {
        Self {
            doc,
            post,
            fmt,
            statuses: Vec::new(),
        }
    }

    /// Fresh fragment builder.
    pub fn program(&self) -> Program<'a> {
        Program::new(self.post, self.fmt)
    }

    /// Status strings recorded so far, one per emitted node.
    pub fn into_statuses(self) -> Vec<(NodeId, String)> {
        self.statuses
    }

    /// Clearance height for traverses.
    pub(crate) fn clearance(&self) -> f64 {
        self.doc.material.ztraverse
    }

    /// Tool in scope for `id`.
    pub(crate) fn tool(&self, id: NodeId) -> Result<&'a ToolData, CamError> {
        self.doc.find_tool(id).ok_or(CamError::NoTool)
    }
}

/// Emit one node (and its children). Suppressed nodes emit nothing.
pub fn emit_node(ctx: &mut EmitContext<'_>, id: NodeId) -> String {
    let doc = ctx.doc;
    let Some(block) = doc.get(id) else {
        return String::new();
    };
    if block.flags.suppressed {
        ctx.statuses.push((id, String::new()));
        return String::new();
    }
    match emit_block(ctx, id, block) {
        Ok(code) => {
            ctx.statuses.push((id, String::new()));
            code
        }
        Err(e) => {
            debug!(kind = block.kind().name(), error = %e, "block emitted nothing");
            ctx.statuses.push((id, e.to_string()));
            String::new()
        }
    }
}

fn emit_block(ctx: &mut EmitContext<'_>, id: NodeId, block: &Block) -> Result<String, CamError> {
    match block.data() {
        BlockData::Begin(d) => Ok(setup::begin(ctx, block, d)),
        BlockData::End(d) => Ok(setup::end(ctx, block, d)),
        BlockData::Tool(d) => Ok(setup::tool(ctx, block, d)),
        BlockData::Code(d) => Ok(setup::code(ctx, d)),
        BlockData::Line(_) | BlockData::Arc(_) => contour::single(ctx, id, block),
        BlockData::Sketch(d) => contour::sketch(ctx, id, block, d),
        BlockData::DrillHoles(d) => holes::drill(ctx, id, block, d),
        BlockData::BoltHoles(d) => holes::bolt(ctx, id, block, d),
        BlockData::Template(_)
        | BlockData::Svg(_)
        | BlockData::Gerber(_)
        | BlockData::Excellon(_) => Ok(group::children(ctx, id, block)),
        BlockData::Point(_) => Ok(String::new()),
        BlockData::Image(d) => relief::image(ctx, id, block, d),
        BlockData::Stl(d) => mesh::stl(ctx, id, block, d),
    }
}

/// Cut levels from the first step down to `depth`, both positive.
pub(crate) fn pass_depths(step: f64, depth: f64) -> Vec<f64> {
    if depth <= PRECISION {
        return Vec::new();
    }
    if step <= PRECISION || step >= depth {
        return vec![depth];
    }
    let mut levels = Vec::new();
    let mut level = step;
    while level < depth - PRECISION {
        levels.push(level);
        level += step;
    }
    levels.push(depth);
    levels
}

/// Plunge feed of a tool, falling back to the cutting feed.
pub(crate) fn plunge_feed(tool: &ToolData) -> f64 {
    let f = tool.plunge_feed();
    if f > 0.0 {
        f
    } else {
        tool.feed
    }
}
