#![warn(missing_docs)]

//! Voxel stock simulation of gcam programs.
//!
//! The simulator reads the G-code that [`gcam_kernel_cam::generate`]
//! produces, follows the tool tip and clears the cells of the document's
//! [`VoxelField`](gcam_ir::VoxelField) swept by a flat-end cutter. The
//! `GCAM:TOOL_DIAMETER` and `GCAM:ORIGIN` markers tell it which tool is
//! loaded and where program zero sits inside the stock.
//!
//! # Example
//!
//! ```
//! use gcam_ir::Document;
//! use gcam_stocksim::{simulate, SimSettings};
//!
//! let mut doc = Document::new("demo");
//! let report = simulate(&mut doc, "G01 X1 Y1 Z-0.25 F10\n", &SimSettings::default()).unwrap();
//! assert!(report.removed > 0);
//! ```

mod carve;
pub mod parse;
mod sim;

pub use carve::carve;
pub use parse::{parse_line, Line, Marker, Word};
pub use sim::{Motion, PeckCycle, SimReport, Simulator};

use gcam_ir::{Document, MAX_RESOLUTION};
use gcam_kernel_math::{Point3, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors from stock simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The stock has a zero, negative or non-finite extent.
    #[error("invalid stock size {0:?}")]
    InvalidStock([f64; 3]),

    /// Zero cells requested along the longest axis.
    #[error("voxel resolution must be at least 1")]
    ZeroResolution,

    /// More cells requested than the voxel field supports.
    #[error("voxel resolution {0} exceeds the maximum of {max}", max = MAX_RESOLUTION)]
    ResolutionTooHigh(u32),
}

/// Result alias for simulation.
pub type Result<T> = std::result::Result<T, SimError>;

/// Simulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Cells along the stock's longest axis; `None` keeps the document's.
    pub resolution: Option<u32>,
    /// Tool diameter used until the program names one with a marker.
    pub tool_diameter: f64,
    /// Restore the stock to solid before running.
    pub reset: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            resolution: None,
            tool_diameter: 0.125,
            reset: true,
        }
    }
}

/// Run `program` against the document's stock.
///
/// The tool starts at program zero, at the clearance height. The step
/// length is one inch divided by the voxel resolution, expressed in the
/// document's units. The field stays carved after the call.
pub fn simulate(doc: &mut Document, program: &str, settings: &SimSettings) -> Result<SimReport> {
    let size = doc.material.size;
    if size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(SimError::InvalidStock(size));
    }
    match settings.resolution {
        Some(0) => return Err(SimError::ZeroResolution),
        Some(r) if r > MAX_RESOLUTION => return Err(SimError::ResolutionTooHigh(r)),
        Some(r) if r != doc.voxels.resolution => doc.set_resolution(r),
        _ if doc.voxels.size() != size => doc.rebuild_voxels(),
        _ => {}
    }
    if settings.reset {
        doc.voxels.reset();
    }

    let step = 1.0 / (doc.voxels.resolution as f64 * doc.material.units.inches());
    let origin = Vec3::from(doc.material.origin);
    let start = Point3::new(0.0, 0.0, doc.material.ztraverse);
    let mut sim = Simulator::new(&mut doc.voxels, step, origin, start, settings.tool_diameter);
    sim.run(program);
    let report = sim.report();
    info!(
        steps = report.steps,
        removed = report.removed,
        elapsed = report.elapsed_seconds,
        "simulated program"
    );
    Ok(report)
}
