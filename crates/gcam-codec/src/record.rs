//! Node records: one chunk per block, kind-specific fields nested inside.

use std::io::{Seek, Write};

use gcam_ir::{
    Block, BlockData, BlockFlags, BlockKind, BoltPattern, CutSide, Document, ListId, NodeId,
    SpindleDir, MAX_STL_SLICES,
};
use tracing::warn;

use crate::constants::*;
use crate::reader::ChunkReader;
use crate::writer::ChunkWriter;
use crate::{CodecError, Result};

/// Write `id` and everything below it as one record.
pub fn write_node<W: Write + Seek>(
    w: &mut ChunkWriter<W>,
    doc: &Document,
    id: NodeId,
) -> Result<()> {
    let Some(block) = doc.get(id) else {
        return Ok(());
    };
    w.chunk(block.kind().tag(), |w| {
        w.str(TAG_COMMENT, &block.comment)?;
        w.u8(TAG_FLAGS, block.flags.bits())?;
        write_fields(w, block.data())?;
        if let Some(list) = doc.children(id) {
            write_list(w, doc, list)?;
        }
        Ok(())
    })
}

/// Write a count chunk followed by one record per node of `list`.
pub fn write_list<W: Write + Seek>(
    w: &mut ChunkWriter<W>,
    doc: &Document,
    list: ListId,
) -> Result<()> {
    w.u32(TAG_COUNT, doc.tree().list_len(list) as u32)?;
    for child in doc.tree().iter(list) {
        write_node(w, doc, child)?;
    }
    Ok(())
}

fn write_fields<W: Write + Seek>(w: &mut ChunkWriter<W>, data: &BlockData) -> Result<()> {
    match data {
        BlockData::Begin(d) => w.u8(0, d.coordinate_system),
        BlockData::End(d) => match &d.retract {
            Some(p) => w.point(0, p),
            None => Ok(()),
        },
        BlockData::Tool(d) => {
            w.str(0, &d.label)?;
            w.u8(1, d.number)?;
            w.f64(2, d.diameter)?;
            w.f64(3, d.length)?;
            w.f64(4, d.feed)?;
            w.f64(5, d.plunge_ratio)?;
            w.u32(6, d.spindle_rpm)?;
            w.u8(7, (d.spindle_dir == SpindleDir::Ccw) as u8)?;
            w.bool(8, d.coolant)?;
            w.bool(9, d.prompt)
        }
        BlockData::Code(d) => w.str(0, &d.text),
        BlockData::Sketch(d) => {
            w.f64(0, d.depth)?;
            w.f64(1, d.step)?;
            w.u8(2, d.side.to_byte())
        }
        BlockData::Line(d) => {
            w.point(0, &d.p0)?;
            w.point(1, &d.p1)
        }
        BlockData::Arc(d) => {
            w.point(0, &d.p)?;
            w.f64(1, d.radius)?;
            w.f64(2, d.start_angle)?;
            w.f64(3, d.sweep)
        }
        BlockData::BoltHoles(d) => {
            w.point(0, &d.position)?;
            w.u8(1, (d.pattern == BoltPattern::Matrix) as u8)?;
            w.u32(2, d.count)?;
            w.f64(3, d.pattern_radius)?;
            w.f64(4, d.offset_angle)?;
            w.u32s(5, &d.matrix)?;
            w.f64s(6, &d.spacing)?;
            w.f64(7, d.hole_diameter)?;
            w.f64(8, d.depth)?;
            w.f64(9, d.step)
        }
        BlockData::DrillHoles(d) => {
            w.f64(0, d.depth)?;
            w.f64(1, d.increment)?;
            w.bool(2, d.optimal_path)
        }
        BlockData::Template(d) => {
            w.point(0, &d.position)?;
            w.f64(1, d.rotation)
        }
        BlockData::Point(d) => w.point(0, &d.p),
        BlockData::Image(d) => {
            w.u32s(0, &d.resolution)?;
            w.f64s(1, &d.size)?;
            w.f32s(2, &d.pixels)
        }
        BlockData::Stl(d) => {
            w.u32(0, d.slices)?;
            w.chunk(1, |w| {
                for tri in &d.triangles {
                    for v in tri {
                        w.raw(&v.to_le_bytes())?;
                    }
                }
                Ok(())
            })
        }
        BlockData::Svg(d) | BlockData::Gerber(d) | BlockData::Excellon(d) => w.str(0, &d.source),
    }
}

/// Read the record with kind `tag` and append it to `list`.
///
/// Unknown kinds are skipped and yield `None`.
pub fn read_node(
    doc: &mut Document,
    list: ListId,
    tag: u8,
    mut body: ChunkReader<'_>,
    depth: usize,
) -> Result<Option<NodeId>> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(CodecError::RecursionLimit(MAX_RECURSION_DEPTH));
    }
    let Some(kind) = BlockKind::from_tag(tag) else {
        warn!(tag, "skipping unknown node kind");
        return Ok(None);
    };

    let mut pending = Some(BlockData::default_for(kind));
    let mut comment = String::new();
    let mut flags = BlockFlags::default();
    let mut id = None;

    while let Some((sub, mut chunk)) = body.next_chunk()? {
        match sub {
            TAG_COMMENT => comment = chunk.read_str()?,
            TAG_FLAGS => flags = BlockFlags::from_bits(chunk.read_u8()?),
            TAG_COUNT => {
                let count = chunk.read_u32()?;
                let node = match pending.take() {
                    Some(data) => create(doc, list, data, &comment, flags)?,
                    None => {
                        warn!(?kind, "duplicate child list, skipping");
                        continue;
                    }
                };
                id = Some(node);
                let children = doc.children(node);
                for _ in 0..count {
                    let Some((child_tag, child)) = body.next_chunk()? else {
                        return Err(CodecError::Truncated {
                            needed: 1,
                            available: 0,
                        });
                    };
                    match children {
                        Some(children) => {
                            read_node(doc, children, child_tag, child, depth + 1)?;
                        }
                        None => warn!(?kind, "children on a non-container, skipping"),
                    }
                }
            }
            _ => match pending.as_mut() {
                Some(data) => read_field(data, sub, &mut chunk)?,
                None => warn!(?kind, sub, "field after child list, skipping"),
            },
        }
    }

    if let Some(data) = pending {
        id = Some(create(doc, list, data, &comment, flags)?);
    }
    Ok(id)
}

fn create(
    doc: &mut Document,
    list: ListId,
    mut data: BlockData,
    comment: &str,
    flags: BlockFlags,
) -> Result<NodeId> {
    match &mut data {
        BlockData::Stl(stl) => {
            if stl.slices > MAX_STL_SLICES {
                return Err(CodecError::OutOfRange {
                    field: "STL slice count",
                    value: stl.slices.into(),
                });
            }
            stl.rebuild_slices();
        }
        BlockData::Image(img) => {
            let [cols, rows] = img.resolution;
            let declared = u64::from(cols) * u64::from(rows);
            if declared > img.pixels.len() as u64 {
                return Err(CodecError::OutOfRange {
                    field: "image pixel count",
                    value: declared,
                });
            }
        }
        _ => {}
    }
    let mut block = Block::with_comment(data, comment);
    block.flags = flags;
    Ok(doc.push(list, block))
}

fn read_field(data: &mut BlockData, tag: u8, r: &mut ChunkReader<'_>) -> Result<()> {
    match data {
        BlockData::Begin(d) => {
            if tag == 0 {
                d.coordinate_system = r.read_u8()?;
            }
        }
        BlockData::End(d) => {
            if tag == 0 {
                d.retract = Some(r.read_point()?);
            }
        }
        BlockData::Tool(d) => match tag {
            0 => d.label = r.read_str()?,
            1 => d.number = r.read_u8()?,
            2 => d.diameter = r.read_f64()?,
            3 => d.length = r.read_f64()?,
            4 => d.feed = r.read_f64()?,
            5 => d.plunge_ratio = r.read_f64()?,
            6 => d.spindle_rpm = r.read_u32()?,
            7 => {
                d.spindle_dir = if r.read_bool()? {
                    SpindleDir::Ccw
                } else {
                    SpindleDir::Cw
                }
            }
            8 => d.coolant = r.read_bool()?,
            9 => d.prompt = r.read_bool()?,
            _ => {}
        },
        BlockData::Code(d) => {
            if tag == 0 {
                d.text = r.read_str()?;
            }
        }
        BlockData::Sketch(d) => match tag {
            0 => d.depth = r.read_f64()?,
            1 => d.step = r.read_f64()?,
            2 => d.side = CutSide::from_byte(r.read_u8()?),
            _ => {}
        },
        BlockData::Line(d) => match tag {
            0 => d.p0 = r.read_point()?,
            1 => d.p1 = r.read_point()?,
            _ => {}
        },
        BlockData::Arc(d) => match tag {
            0 => d.p = r.read_point()?,
            1 => d.radius = r.read_f64()?,
            2 => d.start_angle = r.read_f64()?,
            3 => d.sweep = r.read_f64()?,
            _ => {}
        },
        BlockData::BoltHoles(d) => match tag {
            0 => d.position = r.read_point()?,
            1 => {
                d.pattern = if r.read_bool()? {
                    BoltPattern::Matrix
                } else {
                    BoltPattern::Radial
                }
            }
            2 => d.count = r.read_u32()?,
            3 => d.pattern_radius = r.read_f64()?,
            4 => d.offset_angle = r.read_f64()?,
            5 => d.matrix = [r.read_u32()?, r.read_u32()?],
            6 => d.spacing = [r.read_f64()?, r.read_f64()?],
            7 => d.hole_diameter = r.read_f64()?,
            8 => d.depth = r.read_f64()?,
            9 => d.step = r.read_f64()?,
            _ => {}
        },
        BlockData::DrillHoles(d) => match tag {
            0 => d.depth = r.read_f64()?,
            1 => d.increment = r.read_f64()?,
            2 => d.optimal_path = r.read_bool()?,
            _ => {}
        },
        BlockData::Template(d) => match tag {
            0 => d.position = r.read_point()?,
            1 => d.rotation = r.read_f64()?,
            _ => {}
        },
        BlockData::Point(d) => {
            if tag == 0 {
                d.p = r.read_point()?;
            }
        }
        BlockData::Image(d) => match tag {
            0 => d.resolution = [r.read_u32()?, r.read_u32()?],
            1 => d.size = [r.read_f64()?, r.read_f64()?, r.read_f64()?],
            2 => d.pixels = r.read_f32s()?,
            _ => {}
        },
        BlockData::Stl(d) => match tag {
            0 => d.slices = r.read_u32()?,
            1 => {
                let flat = r.read_f32s()?;
                if flat.len() % 9 != 0 {
                    return Err(CodecError::Truncated {
                        needed: flat.len().next_multiple_of(9) * 4,
                        available: flat.len() * 4,
                    });
                }
                d.triangles = flat
                    .chunks_exact(9)
                    .map(|c| {
                        let mut tri = [0f32; 9];
                        tri.copy_from_slice(c);
                        tri
                    })
                    .collect();
            }
            _ => {}
        },
        BlockData::Svg(d) | BlockData::Gerber(d) | BlockData::Excellon(d) => {
            if tag == 0 {
                d.source = r.read_str()?;
            }
        }
    }
    Ok(())
}
