//! Program interpretation against the voxel stock.

use std::collections::BTreeSet;

use gcam_ir::VoxelField;
use gcam_kernel_math::{Point3, Vec3, PRECISION, TAU};
use serde::Serialize;
use tracing::{debug, warn};

use crate::carve::carve;
use crate::parse::{parse_line, Line, Marker};

/// G codes that select state the stock does not see (plane, units, offsets,
/// compensation, work coordinate systems, dwell).
const INERT_CODES: &[f64] = &[
    4.0, 17.0, 20.0, 21.0, 40.0, 43.0, 49.0, 54.0, 55.0, 56.0, 57.0, 58.0, 59.0,
];

/// Active interpolation mode for coordinate lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Motion {
    /// G00.
    #[default]
    Rapid,
    /// G01.
    Linear,
    /// G02.
    Clockwise,
    /// G03.
    CounterClockwise,
}

/// Canned drilling cycle parameters (G81/G82/G83).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeckCycle {
    /// R plane.
    pub retract: f64,
    /// Hole bottom.
    pub depth: f64,
}

/// Totals of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimReport {
    /// `60 * distance / feed`, or zero when no feed was programmed.
    pub elapsed_seconds: f64,
    /// Carving calls made.
    pub steps: usize,
    /// Length of one carving step.
    pub step: f64,
    /// Accumulated carving distance.
    pub distance: f64,
    /// Cells that changed from material to air.
    pub removed: usize,
    /// Feed rate in effect at the end.
    pub feed: f64,
}

/// Interprets program lines and carves a [`VoxelField`].
///
/// Positions are tracked in program coordinates; carving adds the current
/// origin to reach stock coordinates.
#[derive(Debug)]
pub struct Simulator<'a> {
    field: &'a mut VoxelField,
    step: f64,
    origin: Vec3,
    position: Point3,
    tool_diameter: f64,
    feed: f64,
    incremental: bool,
    motion: Motion,
    cycle: Option<PeckCycle>,
    distance: f64,
    steps: usize,
    removed: usize,
    ignored: BTreeSet<String>,
}

impl<'a> Simulator<'a> {
    /// Start at `position` (program coordinates) with a fresh accumulator.
    pub fn new(
        field: &'a mut VoxelField,
        step: f64,
        origin: Vec3,
        position: Point3,
        tool_diameter: f64,
    ) -> Self {
        Self {
            field,
            step,
            origin,
            position,
            tool_diameter,
            feed: 0.0,
            incremental: false,
            motion: Motion::Rapid,
            cycle: None,
            distance: 0.0,
            steps: 0,
            removed: 0,
            ignored: BTreeSet::new(),
        }
    }

    /// Current tool tip in program coordinates.
    pub fn position(&self) -> Point3 {
        self.position
    }

    /// Diameter of the tool currently carving.
    pub fn tool_diameter(&self) -> f64 {
        self.tool_diameter
    }

    /// Active canned cycle, if any.
    pub fn cycle(&self) -> Option<PeckCycle> {
        self.cycle
    }

    /// Run every line of `program`.
    pub fn run(&mut self, program: &str) {
        for text in program.lines() {
            self.execute(&parse_line(text));
        }
    }

    /// Apply one parsed line.
    pub fn execute(&mut self, line: &Line) {
        for marker in &line.markers {
            match *marker {
                Marker::ToolDiameter(d) => self.tool_diameter = d,
                Marker::Origin([x, y, z]) => self.origin = Vec3::new(x, y, z),
            }
        }
        if let Some(f) = line.value('F') {
            self.feed = f;
        }

        let mut defines_cycle = false;
        for code in line.values('G') {
            match code as u32 {
                0 if code == 0.0 => self.select(Motion::Rapid),
                1 if code == 1.0 => self.select(Motion::Linear),
                2 if code == 2.0 => self.select(Motion::Clockwise),
                3 if code == 3.0 => self.select(Motion::CounterClockwise),
                80 if code == 80.0 => self.cycle = None,
                81..=83 if code.fract() == 0.0 => {
                    self.define_cycle(line);
                    defines_cycle = true;
                }
                90 if code == 90.0 => self.incremental = false,
                91 if code == 91.0 => self.incremental = true,
                _ if INERT_CODES.contains(&code) => {}
                _ => self.ignore(code),
            }
        }

        if let Some(cycle) = self.cycle {
            if defines_cycle || !line.has_g() {
                if line.has_xy() {
                    let target = self.target(line);
                    self.drill(target.x, target.y, cycle);
                }
                return;
            }
        }
        if !line.has_axis() {
            return;
        }
        let target = self.target(line);
        match self.motion {
            Motion::Rapid | Motion::Linear => self.linear_to(target),
            Motion::Clockwise => self.arc_to(target, line, false),
            Motion::CounterClockwise => self.arc_to(target, line, true),
        }
    }

    /// Totals so far.
    pub fn report(&self) -> SimReport {
        let elapsed_seconds = if self.feed > 0.0 {
            60.0 * self.distance / self.feed
        } else {
            0.0
        };
        SimReport {
            elapsed_seconds,
            steps: self.steps,
            step: self.step,
            distance: self.distance,
            removed: self.removed,
            feed: self.feed,
        }
    }

    fn select(&mut self, motion: Motion) {
        self.motion = motion;
        self.cycle = None;
    }

    fn ignore(&mut self, code: f64) {
        let name = format!("G{code}");
        if self.ignored.insert(name.clone()) {
            warn!(code = %name, "ignoring unsupported G code");
        }
    }

    fn define_cycle(&mut self, line: &Line) {
        let previous = self.cycle;
        let retract = line
            .value('R')
            .or(previous.map(|c| c.retract))
            .unwrap_or(self.position.z);
        let depth = line
            .value('Z')
            .or(previous.map(|c| c.depth))
            .unwrap_or(self.position.z);
        self.cycle = Some(PeckCycle { retract, depth });
    }

    fn target(&self, line: &Line) -> Point3 {
        let mut target = self.position;
        for (axis, letter) in ['X', 'Y', 'Z'].into_iter().enumerate() {
            if let Some(v) = line.value(letter) {
                target[axis] = if self.incremental { target[axis] + v } else { v };
            }
        }
        target
    }

    fn cut(&mut self) {
        let tip = self.position + self.origin;
        self.removed += carve(self.field, &tip, self.tool_diameter);
        self.steps += 1;
        self.distance += self.step;
    }

    fn drill(&mut self, x: f64, y: f64, cycle: PeckCycle) {
        self.linear_to(Point3::new(x, y, cycle.retract));
        self.linear_to(Point3::new(x, y, cycle.depth));
        self.linear_to(Point3::new(x, y, cycle.retract));
    }

    fn linear_to(&mut self, target: Point3) {
        let start = self.position;
        let delta = target - start;
        let len = delta.norm();
        if len < PRECISION {
            return;
        }
        let dir = delta / len;
        let mut travelled = self.step;
        while travelled < len {
            self.position = start + dir * travelled;
            self.cut();
            travelled += self.step;
        }
        self.position = target;
        self.cut();
    }

    // Helical moves in the XY plane; K is not used since gcam only emits G17.
    fn arc_to(&mut self, target: Point3, line: &Line, ccw: bool) {
        let (i, j) = (line.value('I'), line.value('J'));
        if i.is_none() && j.is_none() {
            debug!("arc without IJ offsets, moving without carving");
            self.position = target;
            return;
        }
        let start = self.position;
        let cx = start.x + i.unwrap_or(0.0);
        let cy = start.y + j.unwrap_or(0.0);
        let radius = (start.x - cx).hypot(start.y - cy);
        if radius < PRECISION {
            self.linear_to(target);
            return;
        }

        let a0 = (start.y - cy).atan2(start.x - cx);
        let mut a1 = (target.y - cy).atan2(target.x - cx);
        if ccw {
            if a1 <= a0 {
                a1 += TAU;
            }
        } else if a1 >= a0 {
            a1 -= TAU;
        }
        let sweep = (a1 - a0).abs();
        let dir = if ccw { 1.0 } else { -1.0 };
        let dtheta = self.step / radius;

        let mut travelled = dtheta;
        while travelled < sweep {
            let a = a0 + dir * travelled;
            let z = start.z + (target.z - start.z) * travelled / sweep;
            self.position = Point3::new(cx + radius * a.cos(), cy + radius * a.sin(), z);
            self.cut();
            travelled += dtheta;
        }
        self.position = target;
        self.cut();
    }
}
