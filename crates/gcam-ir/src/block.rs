//! Operation blocks: the nodes of the machining program tree.

use gcam_kernel_math::{on_circle, Point2, TAU};
use serde::{Deserialize, Serialize};

use crate::tree::TreeItem;

/// Kind tag of a block. The discriminant is the persisted tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockKind {
    /// Program header.
    Begin = 0x00,
    /// Program footer.
    End = 0x01,
    /// Named sub-tree with its own position and rotation.
    Template = 0x02,
    /// Closed or open contour of lines and arcs cut in depth passes.
    Sketch = 0x03,
    /// Circular arc segment.
    Arc = 0x04,
    /// Straight segment.
    Line = 0x05,
    /// Bolt-hole pattern.
    BoltHoles = 0x06,
    /// Tool change.
    Tool = 0x07,
    /// Verbatim G-code.
    Code = 0x08,
    /// Image relief (raster carving).
    Image = 0x0A,
    /// Drill-hole pattern.
    DrillHoles = 0x0B,
    /// Single location.
    Point = 0x0C,
    /// Imported triangle mesh.
    Stl = 0x0D,
    /// Container produced by SVG import.
    Svg = 0x0E,
    /// Container produced by Gerber import.
    Gerber = 0x0F,
    /// Container produced by Excellon import.
    Excellon = 0x10,
}

impl BlockKind {
    /// All kinds, in tag order.
    pub const ALL: [BlockKind; 16] = [
        BlockKind::Begin,
        BlockKind::End,
        BlockKind::Template,
        BlockKind::Sketch,
        BlockKind::Arc,
        BlockKind::Line,
        BlockKind::BoltHoles,
        BlockKind::Tool,
        BlockKind::Code,
        BlockKind::Image,
        BlockKind::DrillHoles,
        BlockKind::Point,
        BlockKind::Stl,
        BlockKind::Svg,
        BlockKind::Gerber,
        BlockKind::Excellon,
    ];

    /// Persisted tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Kind for a persisted tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Begin => "Begin",
            BlockKind::End => "End",
            BlockKind::Template => "Template",
            BlockKind::Sketch => "Sketch",
            BlockKind::Arc => "Arc",
            BlockKind::Line => "Line",
            BlockKind::BoltHoles => "Bolt Holes",
            BlockKind::Tool => "Tool",
            BlockKind::Code => "Code",
            BlockKind::Image => "Image",
            BlockKind::DrillHoles => "Drill Holes",
            BlockKind::Point => "Point",
            BlockKind::Stl => "STL",
            BlockKind::Svg => "SVG",
            BlockKind::Gerber => "Gerber",
            BlockKind::Excellon => "Excellon",
        }
    }

    /// Kinds that own a child list.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            BlockKind::Template
                | BlockKind::Sketch
                | BlockKind::BoltHoles
                | BlockKind::DrillHoles
                | BlockKind::Svg
                | BlockKind::Gerber
                | BlockKind::Excellon
        )
    }
}

/// Block flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockFlags {
    /// Cannot be removed or reordered.
    pub locked: bool,
    /// Excluded from emission but kept in the tree.
    pub suppressed: bool,
}

impl BlockFlags {
    const LOCKED: u8 = 0x01;
    const SUPPRESSED: u8 = 0x02;

    /// Pack into the persisted bitset.
    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.locked {
            bits |= Self::LOCKED;
        }
        if self.suppressed {
            bits |= Self::SUPPRESSED;
        }
        bits
    }

    /// Unpack from the persisted bitset; unknown bits are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            locked: bits & Self::LOCKED != 0,
            suppressed: bits & Self::SUPPRESSED != 0,
        }
    }
}

/// One operation node.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Free-text comment, emitted as a G-code comment by most kinds.
    pub comment: String,
    /// Diagnostic status set by the last emission pass.
    pub status: String,
    /// Lock/suppress flags.
    pub flags: BlockFlags,
    /// Fragment produced by the last synthesis pass.
    pub code: String,
    data: BlockData,
}

impl Block {
    /// Create a block around a payload with an empty comment.
    pub fn new(data: BlockData) -> Self {
        Self {
            comment: String::new(),
            status: String::new(),
            flags: BlockFlags::default(),
            code: String::new(),
            data,
        }
    }

    /// Create a block with a comment.
    pub fn with_comment(data: BlockData, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..Self::new(data)
        }
    }

    /// Kind tag, fixed at construction.
    pub fn kind(&self) -> BlockKind {
        self.data.kind()
    }

    /// Kind-specific payload.
    pub fn data(&self) -> &BlockData {
        &self.data
    }

    /// Rescale the payload's lengths. See [`BlockData::scale`].
    pub fn scale(&mut self, factor: f64) {
        self.data.scale(factor);
    }
}

impl TreeItem for Block {
    fn is_locked(&self) -> bool {
        self.flags.locked
    }
}

macro_rules! typed_access {
    ($($variant:ident => $ty:ty, $get:ident, $get_mut:ident;)*) => {
        impl Block {
            $(
                #[doc = concat!("Payload if this is a `", stringify!($variant), "` block.")]
                pub fn $get(&self) -> Option<&$ty> {
                    match &self.data {
                        BlockData::$variant(d) => Some(d),
                        _ => None,
                    }
                }

                #[doc = concat!("Mutable payload if this is a `", stringify!($variant), "` block.")]
                pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                    match &mut self.data {
                        BlockData::$variant(d) => Some(d),
                        _ => None,
                    }
                }
            )*
        }
    };
}

typed_access! {
    Begin => BeginData, as_begin, as_begin_mut;
    End => EndData, as_end, as_end_mut;
    Tool => ToolData, as_tool, as_tool_mut;
    Code => CodeData, as_code, as_code_mut;
    Sketch => SketchData, as_sketch, as_sketch_mut;
    Line => LineData, as_line, as_line_mut;
    Arc => ArcData, as_arc, as_arc_mut;
    BoltHoles => BoltHolesData, as_bolt_holes, as_bolt_holes_mut;
    DrillHoles => DrillHolesData, as_drill_holes, as_drill_holes_mut;
    Template => TemplateData, as_template, as_template_mut;
    Point => PointData, as_point, as_point_mut;
    Image => ImageData, as_image, as_image_mut;
    Stl => StlData, as_stl, as_stl_mut;
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    /// See [`BeginData`].
    Begin(BeginData),
    /// See [`EndData`].
    End(EndData),
    /// See [`ToolData`].
    Tool(ToolData),
    /// See [`CodeData`].
    Code(CodeData),
    /// See [`SketchData`].
    Sketch(SketchData),
    /// See [`LineData`].
    Line(LineData),
    /// See [`ArcData`].
    Arc(ArcData),
    /// See [`BoltHolesData`].
    BoltHoles(BoltHolesData),
    /// See [`DrillHolesData`].
    DrillHoles(DrillHolesData),
    /// See [`TemplateData`].
    Template(TemplateData),
    /// See [`PointData`].
    Point(PointData),
    /// See [`ImageData`].
    Image(ImageData),
    /// See [`StlData`].
    Stl(StlData),
    /// SVG import container.
    Svg(ImportData),
    /// Gerber import container.
    Gerber(ImportData),
    /// Excellon import container.
    Excellon(ImportData),
}

impl BlockData {
    /// Kind tag of this payload.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockData::Begin(_) => BlockKind::Begin,
            BlockData::End(_) => BlockKind::End,
            BlockData::Tool(_) => BlockKind::Tool,
            BlockData::Code(_) => BlockKind::Code,
            BlockData::Sketch(_) => BlockKind::Sketch,
            BlockData::Line(_) => BlockKind::Line,
            BlockData::Arc(_) => BlockKind::Arc,
            BlockData::BoltHoles(_) => BlockKind::BoltHoles,
            BlockData::DrillHoles(_) => BlockKind::DrillHoles,
            BlockData::Template(_) => BlockKind::Template,
            BlockData::Point(_) => BlockKind::Point,
            BlockData::Image(_) => BlockKind::Image,
            BlockData::Stl(_) => BlockKind::Stl,
            BlockData::Svg(_) => BlockKind::Svg,
            BlockData::Gerber(_) => BlockKind::Gerber,
            BlockData::Excellon(_) => BlockKind::Excellon,
        }
    }

    /// Default payload for a kind.
    pub fn default_for(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Begin => BlockData::Begin(BeginData::default()),
            BlockKind::End => BlockData::End(EndData::default()),
            BlockKind::Tool => BlockData::Tool(ToolData::default()),
            BlockKind::Code => BlockData::Code(CodeData::default()),
            BlockKind::Sketch => BlockData::Sketch(SketchData::default()),
            BlockKind::Line => BlockData::Line(LineData::default()),
            BlockKind::Arc => BlockData::Arc(ArcData::default()),
            BlockKind::BoltHoles => BlockData::BoltHoles(BoltHolesData::default()),
            BlockKind::DrillHoles => BlockData::DrillHoles(DrillHolesData::default()),
            BlockKind::Template => BlockData::Template(TemplateData::default()),
            BlockKind::Point => BlockData::Point(PointData::default()),
            BlockKind::Image => BlockData::Image(ImageData::default()),
            BlockKind::Stl => BlockData::Stl(StlData::default()),
            BlockKind::Svg => BlockData::Svg(ImportData::default()),
            BlockKind::Gerber => BlockData::Gerber(ImportData::default()),
            BlockKind::Excellon => BlockData::Excellon(ImportData::default()),
        }
    }

    /// Uniformly rescale every length in the payload. Angles, counts and
    /// ratios are unchanged.
    pub fn scale(&mut self, factor: f64) {
        match self {
            BlockData::Begin(_) | BlockData::Code(_) => {}
            BlockData::End(d) => {
                if let Some(p) = d.retract.as_mut() {
                    *p *= factor;
                }
            }
            BlockData::Tool(d) => {
                d.diameter *= factor;
                d.length *= factor;
                d.feed *= factor;
            }
            BlockData::Sketch(d) => {
                d.depth *= factor;
                d.step *= factor;
            }
            BlockData::Line(d) => {
                d.p0 *= factor;
                d.p1 *= factor;
            }
            BlockData::Arc(d) => {
                d.p *= factor;
                d.radius *= factor;
            }
            BlockData::BoltHoles(d) => {
                d.position *= factor;
                d.pattern_radius *= factor;
                d.hole_diameter *= factor;
                d.spacing = [d.spacing[0] * factor, d.spacing[1] * factor];
                d.depth *= factor;
                d.step *= factor;
            }
            BlockData::DrillHoles(d) => {
                d.depth *= factor;
                d.increment *= factor;
            }
            BlockData::Template(d) => d.position *= factor,
            BlockData::Point(d) => d.p *= factor,
            BlockData::Image(d) => {
                for s in d.size.iter_mut() {
                    *s *= factor;
                }
            }
            BlockData::Stl(d) => {
                for tri in d.triangles.iter_mut() {
                    for v in tri.iter_mut() {
                        *v = (*v as f64 * factor) as f32;
                    }
                }
                d.rebuild_slices();
            }
            BlockData::Svg(_) | BlockData::Gerber(_) | BlockData::Excellon(_) => {}
        }
    }
}

/// Program header settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeginData {
    /// Work coordinate system index: 0 = G54 … 5 = G59.
    pub coordinate_system: u8,
}

/// Program footer settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndData {
    /// XY to park at after retracting, if any.
    pub retract: Option<Point2>,
}

/// Spindle rotation direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpindleDir {
    /// M03.
    #[default]
    Cw,
    /// M04.
    Ccw,
}

/// Tool change and cutting parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolData {
    /// Tool label.
    pub label: String,
    /// Tool table number.
    pub number: u8,
    /// Cutting diameter.
    pub diameter: f64,
    /// Overall length.
    pub length: f64,
    /// Feed rate in units per minute.
    pub feed: f64,
    /// Plunge feed as a fraction of `feed`.
    pub plunge_ratio: f64,
    /// Spindle speed in RPM.
    pub spindle_rpm: u32,
    /// Spindle direction.
    pub spindle_dir: SpindleDir,
    /// Flood coolant on.
    pub coolant: bool,
    /// Emit an operator prompt (M00) before the change.
    pub prompt: bool,
}

impl Default for ToolData {
    fn default() -> Self {
        Self {
            label: "End Mill".into(),
            number: 1,
            diameter: 0.125,
            length: 1.0,
            feed: 10.0,
            plunge_ratio: 0.5,
            spindle_rpm: 3000,
            spindle_dir: SpindleDir::Cw,
            coolant: false,
            prompt: false,
        }
    }
}

impl ToolData {
    /// Tool radius.
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    /// Feed used for plunges.
    pub fn plunge_feed(&self) -> f64 {
        self.feed * self.plunge_ratio
    }
}

/// Verbatim G-code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeData {
    /// Text copied into the program.
    pub text: String,
}

/// Which side of the travel direction the tool rides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutSide {
    /// Tool center on the contour.
    #[default]
    Center,
    /// Tool to the left of the travel direction.
    Left,
    /// Tool to the right of the travel direction.
    Right,
}

impl CutSide {
    /// Signed multiplier along the left normal: +1 left, -1 right, 0 center.
    pub fn sign(self) -> f64 {
        match self {
            CutSide::Center => 0.0,
            CutSide::Left => 1.0,
            CutSide::Right => -1.0,
        }
    }

    /// Persisted byte.
    pub fn to_byte(self) -> u8 {
        match self {
            CutSide::Center => 0,
            CutSide::Left => 1,
            CutSide::Right => 2,
        }
    }

    /// From persisted byte; unknown values fall back to center.
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => CutSide::Left,
            2 => CutSide::Right,
            _ => CutSide::Center,
        }
    }
}

/// Contour cut in depth passes. Segments live in the child list.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchData {
    /// Final depth below the stock surface (positive).
    pub depth: f64,
    /// Depth removed per pass.
    pub step: f64,
    /// Cutter compensation side.
    pub side: CutSide,
}

impl Default for SketchData {
    fn default() -> Self {
        Self {
            depth: 0.1,
            step: 0.05,
            side: CutSide::Center,
        }
    }
}

/// Straight segment.
#[derive(Debug, Clone, PartialEq)]
pub struct LineData {
    /// Start point.
    pub p0: Point2,
    /// End point.
    pub p1: Point2,
}

impl Default for LineData {
    fn default() -> Self {
        Self {
            p0: Point2::origin(),
            p1: Point2::new(1.0, 0.0),
        }
    }
}

/// Circular arc given by its start point, radius and angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcData {
    /// Start point.
    pub p: Point2,
    /// Radius.
    pub radius: f64,
    /// Polar angle of the start point as seen from the center, degrees.
    pub start_angle: f64,
    /// Swept angle in degrees; positive is counter-clockwise.
    pub sweep: f64,
}

impl Default for ArcData {
    fn default() -> Self {
        Self {
            p: Point2::new(1.0, 0.0),
            radius: 1.0,
            start_angle: 0.0,
            sweep: 90.0,
        }
    }
}

impl ArcData {
    /// Full circle of `radius` around `center`, starting at angle 0, CCW.
    pub fn circle(center: Point2, radius: f64) -> Self {
        Self {
            p: Point2::new(center.x + radius, center.y),
            radius,
            start_angle: 0.0,
            sweep: 360.0,
        }
    }

    /// Arc center.
    pub fn center(&self) -> Point2 {
        on_circle(&self.p, -self.radius, self.start_angle.to_radians())
    }

    /// End point.
    pub fn end(&self) -> Point2 {
        on_circle(
            &self.center(),
            self.radius,
            (self.start_angle + self.sweep).to_radians(),
        )
    }

    /// True for a closed circle.
    pub fn is_full_circle(&self) -> bool {
        (self.sweep.abs().to_radians() - TAU).abs() < 1e-9
    }
}

/// Arrangement of a bolt-hole pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoltPattern {
    /// Holes evenly spaced on a circle.
    #[default]
    Radial,
    /// Holes on a rectangular grid.
    Matrix,
}

/// Bolt-hole pattern. Hole circles are regenerated into the child list.
#[derive(Debug, Clone, PartialEq)]
pub struct BoltHolesData {
    /// Pattern center (radial) or first hole (matrix).
    pub position: Point2,
    /// Pattern type.
    pub pattern: BoltPattern,
    /// Number of holes on the circle (radial).
    pub count: u32,
    /// Radius of the bolt circle (radial).
    pub pattern_radius: f64,
    /// Angle of the first hole, degrees (radial).
    pub offset_angle: f64,
    /// Holes along X and Y (matrix).
    pub matrix: [u32; 2],
    /// Hole spacing along X and Y (matrix).
    pub spacing: [f64; 2],
    /// Diameter of every hole.
    pub hole_diameter: f64,
    /// Final depth.
    pub depth: f64,
    /// Depth per pass.
    pub step: f64,
}

impl Default for BoltHolesData {
    fn default() -> Self {
        Self {
            position: Point2::new(1.0, 1.0),
            pattern: BoltPattern::Radial,
            count: 4,
            pattern_radius: 0.5,
            offset_angle: 0.0,
            matrix: [2, 2],
            spacing: [0.5, 0.5],
            hole_diameter: 0.25,
            depth: 0.1,
            step: 0.05,
        }
    }
}

impl BoltHolesData {
    /// Centers of every hole in the pattern.
    pub fn hole_centers(&self) -> Vec<Point2> {
        match self.pattern {
            BoltPattern::Radial => (0..self.count)
                .map(|i| {
                    let angle = self.offset_angle + 360.0 * i as f64 / self.count.max(1) as f64;
                    on_circle(&self.position, self.pattern_radius, angle.to_radians())
                })
                .collect(),
            BoltPattern::Matrix => {
                let mut centers = Vec::new();
                for j in 0..self.matrix[1] {
                    for i in 0..self.matrix[0] {
                        centers.push(Point2::new(
                            self.position.x + i as f64 * self.spacing[0],
                            self.position.y + j as f64 * self.spacing[1],
                        ));
                    }
                }
                centers
            }
        }
    }
}

/// Peck-drilled hole pattern. Hole locations are `Point` children.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillHolesData {
    /// Final depth below the surface (positive).
    pub depth: f64,
    /// Peck increment (Q word).
    pub increment: f64,
    /// Visit holes in nearest-neighbor order instead of listed order.
    pub optimal_path: bool,
}

impl Default for DrillHolesData {
    fn default() -> Self {
        Self {
            depth: 0.1,
            increment: 0.05,
            optimal_path: true,
        }
    }
}

/// Positioned, rotated sub-tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateData {
    /// Translation applied to every child.
    pub position: Point2,
    /// Rotation in degrees applied before the translation.
    pub rotation: f64,
}

impl Default for TemplateData {
    fn default() -> Self {
        Self {
            position: Point2::origin(),
            rotation: 0.0,
        }
    }
}

/// A location.
#[derive(Debug, Clone, PartialEq)]
pub struct PointData {
    /// Coordinates.
    pub p: Point2,
}

impl Default for PointData {
    fn default() -> Self {
        Self {
            p: Point2::origin(),
        }
    }
}

/// Height-map relief carved by raster passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Pixel columns and rows.
    pub resolution: [u32; 2],
    /// Physical width, height and maximum depth.
    pub size: [f64; 3],
    /// Row-major intensities in `[0, 1]`; 1 is the stock surface, 0 the
    /// deepest cut. Row 0 is the top of the image (largest Y).
    pub pixels: Vec<f32>,
}

impl Default for ImageData {
    fn default() -> Self {
        Self {
            resolution: [0, 0],
            size: [1.0, 1.0, 0.05],
            pixels: Vec::new(),
        }
    }
}

impl ImageData {
    /// Build from a pixel buffer; missing pixels read as surface.
    pub fn new(resolution: [u32; 2], size: [f64; 3], mut pixels: Vec<f32>) -> Self {
        pixels.resize(resolution[0] as usize * resolution[1] as usize, 1.0);
        Self {
            resolution,
            size,
            pixels,
        }
    }

    /// Intensity at column `i`, row `j`; surface outside the image.
    pub fn pixel(&self, i: u32, j: u32) -> f32 {
        let [cols, rows] = self.resolution;
        if i >= cols || j >= rows {
            return 1.0;
        }
        (j as usize)
            .checked_mul(cols as usize)
            .and_then(|row| row.checked_add(i as usize))
            .and_then(|k| self.pixels.get(k))
            .copied()
            .unwrap_or(1.0)
    }
}

/// One horizontal cross-section of an imported mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct StlSlice {
    /// Cut height relative to the mesh top (zero or negative).
    pub z: f64,
    /// Unordered contour segments at this height.
    pub segments: Vec<(Point2, Point2)>,
}

/// Most slices an STL block is cut into.
pub const MAX_STL_SLICES: u32 = 4096;

/// Imported triangle mesh cut as stacked contour slices.
#[derive(Debug, Clone, PartialEq)]
pub struct StlData {
    /// Triangles as `[x0, y0, z0, x1, y1, z1, x2, y2, z2]`.
    pub triangles: Vec<[f32; 9]>,
    /// Number of slices between the mesh top and bottom, at most
    /// [`MAX_STL_SLICES`].
    pub slices: u32,
    /// Derived cross-sections; rebuilt, never persisted.
    pub contours: Vec<StlSlice>,
}

impl Default for StlData {
    fn default() -> Self {
        Self {
            triangles: Vec::new(),
            slices: 4,
            contours: Vec::new(),
        }
    }
}

impl StlData {
    /// Build from triangles and derive the slice contours.
    pub fn new(triangles: Vec<[f32; 9]>, slices: u32) -> Self {
        let mut data = Self {
            triangles,
            slices,
            contours: Vec::new(),
        };
        data.rebuild_slices();
        data
    }

    /// Z extent of the mesh.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for tri in &self.triangles {
            for z in [tri[2], tri[5], tri[8]] {
                let z = z as f64;
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(z), hi.max(z)),
                    None => (z, z),
                });
            }
        }
        range
    }

    /// Recompute `contours`: `slices` evenly spaced planes from just below
    /// the top of the mesh down to its bottom, heights relative to the top.
    pub fn rebuild_slices(&mut self) {
        self.contours.clear();
        let Some((z_min, z_max)) = self.z_range() else {
            return;
        };
        let height = z_max - z_min;
        let count = self.slices.min(MAX_STL_SLICES);
        if count == 0 || height <= 0.0 {
            return;
        }
        for i in 1..=count {
            let z = z_max - height * i as f64 / count as f64;
            // Nudge the bottom plane inside the mesh so it still intersects.
            let plane = if i == count { z + height * 1e-6 } else { z };
            let segments = self
                .triangles
                .iter()
                .filter_map(|tri| triangle_plane_intersection(tri, plane))
                .collect();
            self.contours.push(StlSlice {
                z: z - z_max,
                segments,
            });
        }
    }
}

/// Intersect a triangle with the horizontal plane at `z`.
fn triangle_plane_intersection(tri: &[f32; 9], z: f64) -> Option<(Point2, Point2)> {
    let v = [
        [tri[0] as f64, tri[1] as f64, tri[2] as f64],
        [tri[3] as f64, tri[4] as f64, tri[5] as f64],
        [tri[6] as f64, tri[7] as f64, tri[8] as f64],
    ];
    let mut points = Vec::with_capacity(2);
    for (a, b) in [(0, 1), (1, 2), (2, 0)] {
        let da = v[a][2] - z;
        let db = v[b][2] - z;
        if (da < 0.0) != (db < 0.0) {
            let t = da / (da - db);
            points.push(Point2::new(
                v[a][0] + t * (v[b][0] - v[a][0]),
                v[a][1] + t * (v[b][1] - v[a][1]),
            ));
        }
    }
    match points.as_slice() {
        [p0, p1] => Some((*p0, *p1)),
        _ => None,
    }
}

/// Container produced by a file import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportData {
    /// Name of the imported file.
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_tag(kind.tag()), Some(kind));
            assert_eq!(BlockData::default_for(kind).kind(), kind);
        }
        assert_eq!(BlockKind::from_tag(0x09), None);
        assert_eq!(BlockKind::from_tag(0xFE), None);
    }

    #[test]
    fn test_flags_bits() {
        let flags = BlockFlags {
            locked: true,
            suppressed: false,
        };
        assert_eq!(BlockFlags::from_bits(flags.bits()), flags);
        assert_eq!(BlockFlags::from_bits(0xFF).bits(), 0x03);
    }

    #[test]
    fn test_arc_center_and_end() {
        let arc = ArcData {
            p: Point2::new(1.0, 0.0),
            radius: 1.0,
            start_angle: 0.0,
            sweep: 90.0,
        };
        let c = arc.center();
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-12);
        let e = arc.end();
        assert_relative_eq!(e.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.y, 1.0, epsilon = 1e-12);
        assert!(ArcData::circle(Point2::origin(), 2.0).is_full_circle());
    }

    #[test]
    fn test_bolt_hole_centers() {
        let radial = BoltHolesData {
            position: Point2::origin(),
            count: 4,
            pattern_radius: 1.0,
            ..BoltHolesData::default()
        };
        let centers = radial.hole_centers();
        assert_eq!(centers.len(), 4);
        assert_relative_eq!(centers[1].y, 1.0, epsilon = 1e-12);

        let matrix = BoltHolesData {
            pattern: BoltPattern::Matrix,
            position: Point2::origin(),
            matrix: [3, 2],
            spacing: [1.0, 2.0],
            ..BoltHolesData::default()
        };
        let centers = matrix.hole_centers();
        assert_eq!(centers.len(), 6);
        assert_relative_eq!(centers[5].x, 2.0);
        assert_relative_eq!(centers[5].y, 2.0);
    }

    #[test]
    fn test_scale_line_and_tool() {
        let mut data = BlockData::Line(LineData {
            p0: Point2::new(1.0, 2.0),
            p1: Point2::new(3.0, 4.0),
        });
        data.scale(2.0);
        match data {
            BlockData::Line(l) => assert_eq!(l.p1, Point2::new(6.0, 8.0)),
            _ => unreachable!(),
        }

        let mut tool = BlockData::Tool(ToolData::default());
        tool.scale(25.4);
        if let BlockData::Tool(t) = tool {
            assert_relative_eq!(t.diameter, 0.125 * 25.4);
            assert_relative_eq!(t.plunge_ratio, 0.5);
        }
    }

    #[test]
    fn test_stl_slices_cube_side() {
        // Two triangles forming a vertical wall from z=0 to z=1 along x.
        let tris = vec![
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        ];
        let stl = StlData::new(tris, 2);
        assert_eq!(stl.contours.len(), 2);
        assert_relative_eq!(stl.contours[0].z, -0.5);
        assert_relative_eq!(stl.contours[1].z, -1.0);
        for slice in &stl.contours {
            assert!(!slice.segments.is_empty());
        }
    }

    #[test]
    fn test_stl_slice_count_is_capped() {
        let tris = vec![[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0]];
        let stl = StlData::new(tris, u32::MAX);
        assert_eq!(stl.contours.len(), MAX_STL_SLICES as usize);
    }

    #[test]
    fn test_pixel_outside_image_is_surface() {
        let img = ImageData::new([2, 2], [1.0, 1.0, 0.1], vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(img.pixel(1, 0), 0.25);
        assert_eq!(img.pixel(0, 1), 0.5);
        assert_eq!(img.pixel(2, 0), 1.0);
        assert_eq!(img.pixel(0, 2), 1.0);

        let huge = ImageData {
            resolution: [u32::MAX, u32::MAX],
            size: [1.0, 1.0, 0.1],
            pixels: vec![0.0],
        };
        assert_eq!(huge.pixel(0, 0), 0.0);
        assert_eq!(huge.pixel(u32::MAX - 1, u32::MAX - 1), 1.0);
    }
}
