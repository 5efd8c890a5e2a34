//! Program header, footer, tool changes and manual code.

use gcam_ir::{BeginData, Block, CodeData, EndData, SpindleDir, ToolData, Units};

use super::EmitContext;
use crate::{MARKER_ORIGIN, MARKER_TOOL_DIAMETER};

/// Machine option bit: stop for the operator before every tool change.
const OPTION_TOOL_PROMPT: u8 = 0x01;

pub(super) fn begin(ctx: &EmitContext<'_>, block: &Block, data: &BeginData) -> String {
    let doc = ctx.doc;
    let mut prog = ctx.program();
    prog.raw(&ctx.post.program_start(doc));
    if !doc.name.is_empty() {
        prog.comment(&doc.name);
    }
    prog.comment(&block.comment);
    prog.raw("G17 G40 G49 G80 G90");
    prog.raw(match doc.material.units {
        Units::Inch => "G20",
        Units::Millimeter => "G21",
    });
    let wcs = data.coordinate_system.min(5);
    prog.raw(&format!("G{}", 54 + wcs));
    prog.marker(MARKER_ORIGIN, &doc.material.origin);
    prog.rapid_z(ctx.clearance());
    prog.finish()
}

pub(super) fn end(ctx: &EmitContext<'_>, block: &Block, data: &EndData) -> String {
    let mut prog = ctx.program();
    prog.comment(&block.comment);
    prog.rapid_z(ctx.clearance());
    if let Some(p) = data.retract {
        prog.rapid_xy(p);
    }
    prog.raw("M05").raw("M09").program_end();
    prog.finish()
}

pub(super) fn tool(ctx: &EmitContext<'_>, block: &Block, data: &ToolData) -> String {
    let mut prog = ctx.program();
    if block.comment.is_empty() {
        prog.comment(&format!(
            "T{}: {} D{}",
            data.number,
            data.label,
            ctx.fmt.coord(data.diameter)
        ));
    } else {
        prog.comment(&block.comment);
    }
    prog.marker(MARKER_TOOL_DIAMETER, &[data.diameter]);
    prog.rapid_z(ctx.clearance());
    prog.raw("M05");
    if data.prompt || ctx.doc.machine.options & OPTION_TOOL_PROMPT != 0 {
        prog.comment(&format!("Load tool {}", data.number));
        prog.raw("M00");
    }
    prog.tool_change(data.number);
    let dir = match data.spindle_dir {
        SpindleDir::Cw => "M03",
        SpindleDir::Ccw => "M04",
    };
    prog.raw(&format!("S{} {dir}", data.spindle_rpm));
    prog.raw(if data.coolant { "M08" } else { "M09" });
    prog.raw(&format!("F{}", ctx.fmt.coord(data.feed)));
    prog.finish()
}

pub(super) fn code(ctx: &EmitContext<'_>, data: &CodeData) -> String {
    let mut prog = ctx.program();
    prog.raw(&data.text);
    prog.finish()
}
