//! Geometry queries for Line, Arc and Point blocks.
//!
//! Segments are resolved either in their stored coordinates or through the
//! node's [`Offset`] context (container transforms plus cutter
//! compensation).

use gcam_kernel_math::{angle_of, on_circle, Point2, Vec2, PRECISION, TAU};

use crate::block::{Block, BlockData};
use crate::document::Document;
use crate::offset::Offset;
use crate::tree::NodeId;

/// How endpoints are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointMode {
    /// Stored coordinates, no transform or compensation.
    Raw,
    /// Through the node's offset context.
    Offset,
}

/// A resolved geometric primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    /// Straight line.
    Line {
        /// Start.
        p0: Point2,
        /// End.
        p1: Point2,
    },
    /// Circular arc; angles in radians, positive sweep is CCW.
    Arc {
        /// Center.
        center: Point2,
        /// Radius.
        radius: f64,
        /// Start angle.
        start: f64,
        /// Signed sweep.
        sweep: f64,
    },
    /// A single location.
    Point(Point2),
}

impl Segment {
    /// Resolve a block. Returns `None` for non-geometric kinds.
    pub fn from_block(block: &Block, offset: &Offset, mode: EndpointMode) -> Option<Self> {
        let seg = match block.data() {
            BlockData::Line(l) => Segment::Line { p0: l.p0, p1: l.p1 },
            BlockData::Arc(a) => Segment::Arc {
                center: a.center(),
                radius: a.radius,
                start: a.start_angle.to_radians(),
                sweep: a.sweep.to_radians(),
            },
            BlockData::Point(p) => Segment::Point(p.p),
            _ => return None,
        };
        Some(match mode {
            EndpointMode::Raw => seg,
            EndpointMode::Offset => seg.transformed(offset).compensated(offset.compensation()),
        })
    }

    fn transformed(self, offset: &Offset) -> Self {
        match self {
            Segment::Line { p0, p1 } => Segment::Line {
                p0: offset.apply(&p0),
                p1: offset.apply(&p1),
            },
            Segment::Arc {
                center,
                radius,
                start,
                sweep,
            } => Segment::Arc {
                center: offset.apply(&center),
                radius,
                start: start + offset.rotation().to_radians(),
                sweep,
            },
            Segment::Point(p) => Segment::Point(offset.apply(&p)),
        }
    }

    /// Shift a line along its left normal by `dist`, or grow/shrink an arc
    /// so the tool rides on the left (`dist > 0`) or right of travel.
    fn compensated(self, dist: f64) -> Self {
        if dist.abs() < PRECISION {
            return self;
        }
        match self {
            Segment::Line { p0, p1 } => {
                let d = p1 - p0;
                let len = d.norm();
                if len < PRECISION {
                    return self;
                }
                let n = Vec2::new(-d.y, d.x) / len * dist;
                Segment::Line {
                    p0: p0 + n,
                    p1: p1 + n,
                }
            }
            Segment::Arc {
                center,
                radius,
                start,
                sweep,
            } => Segment::Arc {
                center,
                radius: (radius - dist * sweep.signum()).max(0.0),
                start,
                sweep,
            },
            Segment::Point(_) => self,
        }
    }

    /// Start and end points.
    pub fn endpoints(&self) -> (Point2, Point2) {
        match *self {
            Segment::Line { p0, p1 } => (p0, p1),
            Segment::Arc {
                center,
                radius,
                start,
                sweep,
            } => (
                on_circle(&center, radius, start),
                on_circle(&center, radius, start + sweep),
            ),
            Segment::Point(p) => (p, p),
        }
    }

    /// Path length.
    pub fn length(&self) -> f64 {
        match *self {
            Segment::Line { p0, p1 } => (p1 - p0).norm(),
            Segment::Arc { radius, sweep, .. } => radius * sweep.abs(),
            Segment::Point(_) => 0.0,
        }
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Point2, Point2) {
        let (a, b) = self.endpoints();
        let mut min = Point2::new(a.x.min(b.x), a.y.min(b.y));
        let mut max = Point2::new(a.x.max(b.x), a.y.max(b.y));
        if let Segment::Arc { center, radius, .. } = *self {
            for k in 0..4 {
                let angle = k as f64 * TAU / 4.0;
                if self.arc_contains(angle) {
                    let p = on_circle(&center, radius, angle);
                    min = Point2::new(min.x.min(p.x), min.y.min(p.y));
                    max = Point2::new(max.x.max(p.x), max.y.max(p.y));
                }
            }
        }
        (min, max)
    }

    /// X coordinates where the segment crosses the horizontal line at `y`.
    ///
    /// Line crossings are half-open in Y so shared vertices of a chain are
    /// counted once.
    pub fn eval(&self, y: f64) -> Vec<f64> {
        match *self {
            Segment::Line { p0, p1 } => {
                let (lo, hi) = if p0.y <= p1.y { (p0, p1) } else { (p1, p0) };
                if (hi.y - lo.y).abs() < PRECISION || y < lo.y || y >= hi.y {
                    return Vec::new();
                }
                let t = (y - lo.y) / (hi.y - lo.y);
                vec![lo.x + t * (hi.x - lo.x)]
            }
            Segment::Arc { center, radius, .. } => {
                let dy = y - center.y;
                if dy.abs() > radius {
                    return Vec::new();
                }
                let dx = (radius * radius - dy * dy).sqrt();
                let mut xs = Vec::with_capacity(2);
                for x in [center.x - dx, center.x + dx] {
                    let angle = angle_of(&Vec2::new(x - center.x, dy));
                    let seen = xs.iter().any(|v: &f64| (v - x).abs() < PRECISION);
                    if self.arc_contains(angle) && !seen {
                        xs.push(x);
                    }
                }
                xs
            }
            Segment::Point(_) => Vec::new(),
        }
    }

    /// True if `angle` lies within the swept span of an arc.
    fn arc_contains(&self, angle: f64) -> bool {
        let Segment::Arc { start, sweep, .. } = *self else {
            return false;
        };
        if sweep.abs() >= TAU - PRECISION {
            return true;
        }
        let rel = if sweep >= 0.0 {
            (angle - start).rem_euclid(TAU)
        } else {
            (start - angle).rem_euclid(TAU)
        };
        rel <= sweep.abs() + PRECISION
    }
}

/// Resolve a node's segment. Suppressed nodes and non-geometric kinds
/// yield `None`.
pub fn segment(doc: &Document, id: NodeId, mode: EndpointMode) -> Option<Segment> {
    let block = doc.get(id)?;
    if block.flags.suppressed {
        return None;
    }
    let offset = match mode {
        EndpointMode::Raw => Offset::identity(),
        EndpointMode::Offset => doc.offset_of(id),
    };
    Segment::from_block(block, &offset, mode)
}

/// Start and end points of a node.
pub fn endpoints(doc: &Document, id: NodeId, mode: EndpointMode) -> Option<(Point2, Point2)> {
    segment(doc, id, mode).map(|s| s.endpoints())
}

/// Path length of a node (offset-aware).
pub fn length(doc: &Document, id: NodeId) -> Option<f64> {
    segment(doc, id, EndpointMode::Offset).map(|s| s.length())
}

/// Bounds of a node (offset-aware).
pub fn bounds(doc: &Document, id: NodeId) -> Option<(Point2, Point2)> {
    segment(doc, id, EndpointMode::Offset).map(|s| s.bounds())
}

/// X crossings of a node at height `y` (offset-aware).
pub fn eval(doc: &Document, id: NodeId, y: f64) -> Vec<f64> {
    segment(doc, id, EndpointMode::Offset)
        .map(|s| s.eval(y))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ArcData, CutSide, LineData, SketchData, TemplateData, ToolData};
    use approx::assert_relative_eq;

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Block {
        Block::new(BlockData::Line(LineData {
            p0: Point2::new(x0, y0),
            p1: Point2::new(x1, y1),
        }))
    }

    #[test]
    fn test_line_queries() {
        let block = line(0.0, 0.0, 3.0, 4.0);
        let seg = Segment::from_block(&block, &Offset::identity(), EndpointMode::Raw).unwrap();
        assert_relative_eq!(seg.length(), 5.0);
        let xs = seg.eval(2.0);
        assert_eq!(xs.len(), 1);
        assert_relative_eq!(xs[0], 1.5);
        assert!(seg.eval(4.0).is_empty());
    }

    #[test]
    fn test_arc_bounds_include_extremes() {
        let block = Block::new(BlockData::Arc(ArcData {
            p: Point2::new(1.0, 0.0),
            radius: 1.0,
            start_angle: 0.0,
            sweep: 180.0,
        }));
        let seg = Segment::from_block(&block, &Offset::identity(), EndpointMode::Raw).unwrap();
        let (min, max) = seg.bounds();
        assert_relative_eq!(max.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(min.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(min.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(seg.length(), std::f64::consts::PI, epsilon = 1e-12);
        assert_eq!(seg.eval(0.5).len(), 2);
        assert!(seg.eval(-0.5).is_empty());
    }

    #[test]
    fn test_compensation_shifts_left_and_shrinks_ccw_arc() {
        let mut doc = Document::new("t");
        doc.add(Block::new(BlockData::Tool(ToolData {
            diameter: 0.2,
            ..ToolData::default()
        })));
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData {
            side: CutSide::Left,
            ..SketchData::default()
        })));
        let l = doc.add_child(sketch, line(0.0, 0.0, 1.0, 0.0)).unwrap();
        let a = doc
            .add_child(sketch, Block::new(BlockData::Arc(ArcData::circle(Point2::origin(), 1.0))))
            .unwrap();

        let (p0, _) = endpoints(&doc, l, EndpointMode::Offset).unwrap();
        assert_relative_eq!(p0.y, 0.1, epsilon = 1e-12);
        let (raw, _) = endpoints(&doc, l, EndpointMode::Raw).unwrap();
        assert_relative_eq!(raw.y, 0.0);

        match segment(&doc, a, EndpointMode::Offset).unwrap() {
            Segment::Arc { radius, .. } => assert_relative_eq!(radius, 0.9, epsilon = 1e-12),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_template_rotation_applies_to_arc() {
        let mut doc = Document::new("t");
        let tpl = doc.add(Block::new(BlockData::Template(TemplateData {
            position: Point2::new(5.0, 0.0),
            rotation: 90.0,
        })));
        let a = doc
            .add_child(
                tpl,
                Block::new(BlockData::Arc(ArcData {
                    p: Point2::new(1.0, 0.0),
                    radius: 1.0,
                    start_angle: 0.0,
                    sweep: 90.0,
                })),
            )
            .unwrap();
        let (start, end) = endpoints(&doc, a, EndpointMode::Offset).unwrap();
        assert_relative_eq!(start.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(start.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(end.x, 4.0, epsilon = 1e-12);
        assert_relative_eq!(end.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_suppressed_skips_queries() {
        let mut doc = Document::new("t");
        let l = doc.add(line(0.0, 0.0, 1.0, 1.0));
        doc.get_mut(l).unwrap().flags.suppressed = true;
        assert!(endpoints(&doc, l, EndpointMode::Raw).is_none());
        assert!(eval(&doc, l, 0.5).is_empty());
    }
}
