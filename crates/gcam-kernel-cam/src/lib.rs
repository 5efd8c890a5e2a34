#![warn(missing_docs)]

//! G-code synthesis for gcam documents.
//!
//! [`generate`] walks the document's top-level blocks, asks each one for its
//! fragment through the driver's [`PostProcessor`](post::PostProcessor) and
//! joins the fragments into a program. Hole patterns are sequenced with the
//! nearest-neighbor planner in [`path`].
//!
//! # Example
//!
//! ```
//! use gcam_ir::{Block, BlockData, Document, ToolData, BeginData, EndData};
//! use gcam_kernel_cam::{generate, SynthOptions};
//!
//! let mut doc = Document::new("demo");
//! doc.add(Block::new(BlockData::Begin(BeginData::default())));
//! doc.add(Block::new(BlockData::Tool(ToolData::default())));
//! doc.add(Block::new(BlockData::End(EndData::default())));
//!
//! let program = generate(&mut doc, SynthOptions::default());
//! assert!(program.contains("T1 M06"));
//! ```

pub mod emit;
pub mod path;
pub mod post;
mod synth;

pub use path::{plan_order, tour_length, PathMode};
pub use post::{format_coord, post_for, Format, LineEnding, PostProcessor, Program};
pub use synth::{generate, generate_fragment, SynthOptions};

use thiserror::Error;

/// Marker carrying the active tool diameter: `GCAM:TOOL_DIAMETER:<d>`.
pub const MARKER_TOOL_DIAMETER: &str = "TOOL_DIAMETER";

/// Marker carrying the program origin inside the stock:
/// `GCAM:ORIGIN:<x>:<y>:<z>`.
pub const MARKER_ORIGIN: &str = "ORIGIN";

/// Reasons a block produced no code. The message becomes the block status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CamError {
    /// No Tool block precedes this block.
    #[error("no tool selected")]
    NoTool,

    /// The block has nothing to cut.
    #[error("{0} has no geometry")]
    EmptyGeometry(&'static str),

    /// Depth is zero or negative.
    #[error("{0} depth must be positive")]
    InvalidDepth(&'static str),
}
