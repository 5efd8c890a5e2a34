#![warn(missing_docs)]

//! Document model for the gcam toolpath compiler.
//!
//! A [`Document`] owns a [`Tree`] of [`Block`]s: an arena-backed set of
//! doubly-linked lists where container blocks (templates, sketches, hole
//! patterns, import groups) own child lists. Blocks carry a closed set of
//! payloads ([`BlockData`]); G-code emission and persistence live in sibling
//! crates and dispatch on that enum.

pub mod block;
pub mod document;
pub mod geometry;
pub mod offset;
pub mod tree;
pub mod voxel;

pub use block::{
    ArcData, BeginData, Block, BlockData, BlockFlags, BlockKind, BoltHolesData, BoltPattern,
    CodeData, CutSide, DrillHolesData, EndData, ImageData, ImportData, LineData, PointData,
    SketchData, SpindleDir, StlData, StlSlice, TemplateData, ToolData, MAX_STL_SLICES,
};
pub use document::{Document, Driver, Machine, Material, MaterialType, ProgressFn, Units};
pub use geometry::{EndpointMode, Segment};
pub use offset::Offset;
pub use tree::{ListId, NodeId, Tree, TreeItem};
pub use voxel::{VoxelField, DEFAULT_RESOLUTION, MAX_RESOLUTION};

use thiserror::Error;

/// Errors from document editing operations.
#[derive(Debug, Error)]
pub enum IrError {
    /// The node id does not refer to a live node.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The operation needs a container block.
    #[error("{} blocks have no children", .0.name())]
    NotAContainer(BlockKind),
}

/// Result alias for document operations.
pub type Result<T> = std::result::Result<T, IrError>;
