use gcam_codec::{decode, decode_subtree, encode, encode_subtree, load, save, CodecError};
use gcam_ir::{
    ArcData, BeginData, Block, BlockData, BlockKind, BoltHolesData, BoltPattern, CodeData,
    CutSide, Document, DrillHolesData, Driver, EndData, ImageData, ImportData, LineData,
    MaterialType, PointData, SketchData, SpindleDir, StlData, TemplateData, ToolData, Units,
    MAX_STL_SLICES,
};
use gcam_kernel_math::Point2;

fn sample() -> Document {
    let mut doc = Document::new("bracket");
    doc.notes = "two setups".into();
    doc.project_number = 42;
    doc.machine.name = "mill".into();
    doc.machine.options = 0x05;
    doc.machine.driver = Driver::Haas;
    doc.machine.decimals = 3;
    doc.material.size = [6.0, 3.0, 0.75];
    doc.material.origin = [1.0, 1.5, 0.0];
    doc.material.ztraverse = 0.25;
    doc.material.kind = MaterialType::Wood;
    doc.material.units = Units::Inch;
    doc.set_resolution(32);

    doc.add(Block::with_comment(
        BlockData::Begin(BeginData {
            coordinate_system: 2,
        }),
        "start",
    ));
    doc.add(Block::new(BlockData::Tool(ToolData {
        label: "1/4 flat".into(),
        number: 3,
        diameter: 0.25,
        length: 2.0,
        feed: 12.5,
        plunge_ratio: 0.3,
        spindle_rpm: 9000,
        spindle_dir: SpindleDir::Ccw,
        coolant: true,
        prompt: true,
    })));
    doc.add(Block::new(BlockData::Code(CodeData {
        text: "M08\nG04 P1\n".into(),
    })));

    let tpl = doc.add(Block::new(BlockData::Template(TemplateData {
        position: Point2::new(1.0, 2.0),
        rotation: 30.0,
    })));
    let sketch = doc
        .add_child(
            tpl,
            Block::new(BlockData::Sketch(SketchData {
                depth: 0.2,
                step: 0.05,
                side: CutSide::Right,
            })),
        )
        .unwrap();
    doc.add_child(
        sketch,
        Block::new(BlockData::Line(LineData {
            p0: Point2::new(0.0, 0.0),
            p1: Point2::new(1.0, 0.0),
        })),
    )
    .unwrap();
    doc.add_child(
        sketch,
        Block::new(BlockData::Arc(ArcData {
            p: Point2::new(1.0, 0.0),
            radius: 0.5,
            start_angle: 270.0,
            sweep: -90.0,
        })),
    )
    .unwrap();

    let drill = doc.add(Block::new(BlockData::DrillHoles(DrillHolesData {
        depth: 0.3,
        increment: 0.1,
        optimal_path: false,
    })));
    for (x, y) in [(0.5, 0.5), (1.5, 0.5)] {
        doc.add_child(drill, Block::new(BlockData::Point(PointData { p: Point2::new(x, y) })))
            .unwrap();
    }

    let bolts = doc.add(Block::new(BlockData::BoltHoles(BoltHolesData {
        pattern: BoltPattern::Matrix,
        matrix: [3, 2],
        spacing: [0.4, 0.6],
        ..BoltHolesData::default()
    })));
    doc.rebuild_bolt_holes(bolts).unwrap();

    doc.add(Block::new(BlockData::Image(ImageData::new(
        [2, 2],
        [1.0, 1.0, 0.1],
        vec![0.0, 0.25, 0.5, 1.0],
    ))));
    doc.add(Block::new(BlockData::Stl(StlData::new(
        vec![[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0]],
        3,
    ))));
    let svg = doc.add(Block::new(BlockData::Svg(ImportData {
        source: "logo.svg".into(),
    })));
    doc.add_child(svg, Block::new(BlockData::Line(LineData::default())))
        .unwrap();
    doc.add(Block::new(BlockData::Gerber(ImportData {
        source: "top.gbr".into(),
    })));
    doc.add(Block::new(BlockData::Excellon(ImportData {
        source: "drill.drl".into(),
    })));

    let end = doc.add(Block::new(BlockData::End(EndData {
        retract: Some(Point2::new(0.0, 3.0)),
    })));
    let flags = &mut doc.get_mut(end).unwrap().flags;
    flags.locked = true;
    flags.suppressed = true;
    doc
}

/// Flatten a document into `(depth, block)` pairs in tree order.
fn flatten(doc: &Document) -> Vec<(usize, Block)> {
    fn walk(doc: &Document, list: gcam_ir::ListId, depth: usize, out: &mut Vec<(usize, Block)>) {
        for id in doc.tree().iter(list) {
            out.push((depth, doc.get(id).unwrap().clone()));
            if let Some(children) = doc.children(id) {
                walk(doc, children, depth + 1, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(doc, doc.root(), 0, &mut out);
    out
}

fn assert_same(a: &Document, b: &Document) {
    assert_eq!(a.name, b.name);
    assert_eq!(a.notes, b.notes);
    assert_eq!(a.project_number, b.project_number);
    assert_eq!(a.machine, b.machine);
    assert_eq!(a.material, b.material);
    assert_eq!(a.voxels.counts(), b.voxels.counts());
    assert_eq!(flatten(a), flatten(b));
}

#[test]
fn test_roundtrip_every_kind() {
    let doc = sample();
    let kinds: std::collections::HashSet<BlockKind> =
        flatten(&doc).iter().map(|(_, b)| b.kind()).collect();
    assert_eq!(kinds.len(), BlockKind::ALL.len());

    let decoded = decode(&encode(&doc).unwrap()).unwrap();
    assert_same(&doc, &decoded);
    assert!(decoded.tree().validate(decoded.root()));
}

#[test]
fn test_stl_slices_rebuilt_on_load() {
    let doc = sample();
    let decoded = decode(&encode(&doc).unwrap()).unwrap();
    let stl = flatten(&decoded)
        .into_iter()
        .find_map(|(_, b)| b.as_stl().cloned())
        .unwrap();
    assert_eq!(stl.contours.len(), 3);
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("part.gcam");
    let doc = sample();
    save(&doc, &path).unwrap();
    let loaded = load(&path).unwrap();
    assert_same(&doc, &loaded);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(dir.path().join("absent.gcam")).unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
}

#[test]
fn test_unknown_chunks_skipped() {
    let doc = sample();
    let mut bytes = encode(&doc).unwrap();
    // Append a chunk with an unassigned tag and fix up the total length.
    bytes.push(0x55);
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(&[1, 2, 3]);
    let total = bytes.len() as u32;
    bytes[4..8].copy_from_slice(&total.to_le_bytes());

    let decoded = decode(&bytes).unwrap();
    assert_same(&doc, &decoded);
}

#[test]
fn test_truncated_nested_record() {
    let doc = sample();
    let bytes = encode(&doc).unwrap();
    // Claim the full length but drop the tail of the last record.
    let mut cut = bytes[..bytes.len() - 5].to_vec();
    let total = cut.len() as u32;
    cut[4..8].copy_from_slice(&total.to_le_bytes());
    assert!(matches!(decode(&cut), Err(CodecError::Truncated { .. })));
}

#[test]
fn test_subtree_roundtrip() {
    let mut doc = sample();
    let tpl = doc
        .tree()
        .iter(doc.root())
        .find(|id| doc.get(*id).unwrap().kind() == BlockKind::Template)
        .unwrap();
    let bytes = encode_subtree(&doc, tpl).unwrap();

    let root = doc.root();
    let ids = decode_subtree(&mut doc, root, &bytes).unwrap();
    assert_eq!(ids.len(), 1);
    let pasted = ids[0];
    assert_eq!(doc.tree().tail(root), Some(pasted));

    let original = doc.children(tpl).unwrap();
    let copy = doc.children(pasted).unwrap();
    assert_eq!(doc.tree().list_len(original), doc.tree().list_len(copy));
    let sketch = doc.tree().head(copy).unwrap();
    assert_eq!(doc.tree().parent(sketch), Some(pasted));
    assert_eq!(doc.tree().list_len(doc.children(sketch).unwrap()), 2);
}

#[test]
fn test_oversized_resolution_rejected() {
    let mut doc = sample();
    doc.voxels.resolution = u32::MAX;
    let bytes = encode(&doc).unwrap();
    assert!(matches!(
        decode(&bytes),
        Err(CodecError::OutOfRange { value, .. }) if value == u64::from(u32::MAX)
    ));

    doc.voxels.resolution = 0;
    let bytes = encode(&doc).unwrap();
    assert!(matches!(decode(&bytes), Err(CodecError::OutOfRange { .. })));
}

#[test]
fn test_oversized_stl_slice_count_rejected() {
    let mut doc = Document::new("mesh");
    doc.add(Block::new(BlockData::Stl(StlData {
        triangles: vec![[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0]],
        slices: MAX_STL_SLICES + 1,
        contours: Vec::new(),
    })));
    let bytes = encode(&doc).unwrap();
    assert!(matches!(decode(&bytes), Err(CodecError::OutOfRange { .. })));

    let root = doc.root();
    let id = doc.tree().head(root).unwrap();
    let clip = encode_subtree(&doc, id).unwrap();
    assert!(decode_subtree(&mut doc, root, &clip).is_err());
}

#[test]
fn test_image_without_pixel_data_rejected() {
    let mut doc = Document::new("relief");
    doc.add(Block::new(BlockData::Image(ImageData {
        resolution: [100_000, 100_000],
        size: [1.0, 1.0, 0.1],
        pixels: vec![0.5; 4],
    })));
    let bytes = encode(&doc).unwrap();
    assert!(matches!(
        decode(&bytes),
        Err(CodecError::OutOfRange { value: 10_000_000_000, .. })
    ));
}
