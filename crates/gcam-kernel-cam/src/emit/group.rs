//! Templates and import containers.

use gcam_ir::{Block, NodeId};

use super::{emit_node, EmitContext};

/// Comment followed by every child's fragment. Placement comes from the
/// children's offset context, so the container itself emits no motion.
pub(super) fn children(ctx: &mut EmitContext<'_>, id: NodeId, block: &Block) -> String {
    let doc = ctx.doc;
    let mut out = {
        let mut prog = ctx.program();
        prog.comment(&block.comment);
        prog.finish()
    };
    if let Some(list) = doc.children(id) {
        for child in doc.tree().iter(list) {
            out.push_str(&emit_node(ctx, child));
        }
    }
    out
}
