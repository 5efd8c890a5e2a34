//! Whole-program synthesis.

use gcam_ir::{Document, NodeId};
use tracing::{debug, info};

use crate::emit::{emit_node, EmitContext};
use crate::post::{post_for, Format, LineEnding};

/// Output options for [`generate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthOptions {
    /// Newline sequence.
    pub line_ending: LineEnding,
    /// Overrides the document's decimal setting when set.
    pub decimals: Option<usize>,
}

/// Emit every top-level node, store each fragment and status on its node
/// and return the concatenated program.
///
/// Progress is reported through the document's callback after every
/// top-level node.
pub fn generate(doc: &mut Document, options: SynthOptions) -> String {
    let post = post_for(doc.machine.driver);
    let mut fmt = Format::for_document(doc);
    if let Some(decimals) = options.decimals {
        fmt.decimals = decimals;
    }
    let root = doc.root();
    let mut statuses = Vec::new();

    doc.traverse(root, |doc, id| {
        let mut ctx = EmitContext::new(doc, post, fmt);
        let code = emit_node(&mut ctx, id);
        let code = options.line_ending.apply(&code);
        statuses.extend(ctx.into_statuses());
        if let Some(block) = doc.get_mut(id) {
            debug!(kind = block.kind().name(), bytes = code.len(), "emitted block");
            block.code = code;
        }
    });

    for (id, status) in statuses {
        if let Some(block) = doc.get_mut(id) {
            block.status = status;
        }
    }

    let program: String = doc
        .tree()
        .iter(root)
        .filter_map(|id| doc.get(id))
        .map(|b| b.code.as_str())
        .collect();
    info!(
        driver = post.driver().name(),
        nodes = doc.tree().list_len(root),
        bytes = program.len(),
        "generated program"
    );
    program
}

/// Emit a single node with the document's settings without storing
/// anything.
pub fn generate_fragment(doc: &Document, id: NodeId) -> String {
    let post = post_for(doc.machine.driver);
    let mut ctx = EmitContext::new(doc, post, Format::for_document(doc));
    emit_node(&mut ctx, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcam_ir::{BeginData, Block, BlockData, Driver, EndData, LineData, ToolData};
    use gcam_kernel_math::Point2;
    use std::sync::{Arc, Mutex};

    fn lf() -> SynthOptions {
        SynthOptions {
            line_ending: LineEnding::Lf,
            decimals: None,
        }
    }

    fn sample() -> Document {
        let mut doc = Document::new("plate");
        doc.add(Block::new(BlockData::Begin(BeginData::default())));
        doc.add(Block::new(BlockData::Tool(ToolData {
            diameter: 0.25,
            feed: 10.0,
            ..ToolData::default()
        })));
        doc.add(Block::new(BlockData::Line(LineData {
            p0: Point2::origin(),
            p1: Point2::new(1.0, 1.0),
        })));
        doc.add(Block::new(BlockData::End(EndData::default())));
        doc
    }

    #[test]
    fn test_program_is_concatenation_of_fragments() {
        let mut doc = sample();
        let program = generate(&mut doc, lf());
        let joined: String = doc
            .tree()
            .iter(doc.root())
            .map(|id| doc.get(id).unwrap().code.clone())
            .collect();
        assert_eq!(program, joined);
        assert!(program.starts_with("(plate)\nG17 G40 G49 G80 G90\nG20\nG54\n"));
        assert!(program.contains("(GCAM:ORIGIN:0.00000:0.00000:0.00000)\n"));
        assert!(program.contains("(GCAM:TOOL_DIAMETER:0.25000)\n"));
        assert!(program.contains("T1 M06\n"));
        assert!(program.contains("G01 X1.00000 Y1.00000 F10.00000\n"));
        assert!(program.ends_with("M05\nM09\nM30\n"));
    }

    #[test]
    fn test_suppressed_node_has_empty_fragment() {
        let mut doc = sample();
        let line = doc.tree().ids(doc.root())[2];
        generate(&mut doc, lf());
        assert!(!doc.get(line).unwrap().code.is_empty());

        doc.get_mut(line).unwrap().flags.suppressed = true;
        let program = generate(&mut doc, lf());
        assert!(doc.get(line).unwrap().code.is_empty());
        assert!(!program.contains("G01 X1.00000"));
    }

    #[test]
    fn test_crlf_rewrites_each_fragment() {
        let mut doc = sample();
        let code = doc.add(Block::new(BlockData::Code(gcam_ir::CodeData {
            text: "M08\r\nG04 P1\n".into(),
        })));
        let program = generate(
            &mut doc,
            SynthOptions {
                line_ending: LineEnding::Crlf,
                decimals: None,
            },
        );
        assert!(!program.contains("\r\r"));
        assert_eq!(program.matches('\n').count(), program.matches("\r\n").count());
        assert_eq!(doc.get(code).unwrap().code, "M08\r\nG04 P1\r\n");
    }

    #[test]
    fn test_driver_selects_decimals_and_comments() {
        let mut doc = sample();
        doc.machine.driver = Driver::TurboCnc;
        let program = generate(&mut doc, lf());
        assert!(program.starts_with("; plate\n"));
        assert!(program.contains("G01 X1.0000 Y1.0000"));

        doc.machine.decimals = 2;
        let program = generate(&mut doc, lf());
        assert!(program.contains("G01 X1.00 Y1.00"));
    }

    #[test]
    fn test_missing_tool_sets_status() {
        let mut doc = Document::new("t");
        let sketch = doc.add(Block::new(BlockData::Sketch(Default::default())));
        doc.add_child(sketch, Block::new(BlockData::Line(LineData::default())))
            .unwrap();
        let program = generate(&mut doc, lf());
        assert!(program.is_empty());
        assert!(!doc.get(sketch).unwrap().status.is_empty());
    }

    #[test]
    fn test_progress_reaches_one() {
        let mut doc = sample();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        doc.set_progress(Some(Arc::new(move |f: f64| sink.lock().unwrap().push(f))));
        generate(&mut doc, lf());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&1.0));
    }

    #[test]
    fn test_default_line_ending_is_native() {
        assert_eq!(SynthOptions::default().line_ending, LineEnding::native());

        let mut doc = sample();
        let program = generate(&mut doc, SynthOptions::default());
        let crlf = program.matches("\r\n").count();
        match LineEnding::native() {
            LineEnding::Crlf => assert_eq!(crlf, program.matches('\n').count()),
            LineEnding::Lf => assert_eq!(crlf, 0),
        }
    }
}
