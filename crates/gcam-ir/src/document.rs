//! The project document: metadata, stock, voxel field and the block tree.

use std::fmt;
use std::sync::Arc;

use gcam_kernel_math::{Transform2, MM_PER_INCH};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::{ArcData, Block, BlockData, BlockKind, ToolData};
use crate::offset::Offset;
use crate::tree::{ListId, NodeId, Tree};
use crate::voxel::{VoxelField, DEFAULT_RESOLUTION};
use crate::{IrError, Result};

/// Unit system of every length in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Inches (G20).
    #[default]
    Inch,
    /// Millimeters (G21).
    Millimeter,
}

impl Units {
    /// Persisted byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Units::Inch => 0,
            Units::Millimeter => 1,
        }
    }

    /// From persisted byte; unknown values read as inches.
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Units::Millimeter,
            _ => Units::Inch,
        }
    }

    /// Length of one unit in inches.
    pub fn inches(self) -> f64 {
        match self {
            Units::Inch => 1.0,
            Units::Millimeter => 1.0 / MM_PER_INCH,
        }
    }
}

/// Stock material tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    /// Aluminum.
    #[default]
    Aluminum,
    /// Foam.
    Foam,
    /// Plastic.
    Plastic,
    /// Steel.
    Steel,
    /// Wood.
    Wood,
    /// Brass.
    Brass,
}

impl MaterialType {
    const ALL: [MaterialType; 6] = [
        MaterialType::Aluminum,
        MaterialType::Foam,
        MaterialType::Plastic,
        MaterialType::Steel,
        MaterialType::Wood,
        MaterialType::Brass,
    ];

    /// Persisted byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// From persisted byte; unknown values read as aluminum.
    pub fn from_byte(b: u8) -> Self {
        Self::ALL.get(b as usize).copied().unwrap_or_default()
    }
}

/// Target machine controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// LinuxCNC / EMC2.
    #[default]
    LinuxCnc,
    /// TurboCNC.
    TurboCnc,
    /// Haas.
    Haas,
}

impl Driver {
    /// Decimal places used when the document does not override them.
    pub fn default_decimals(self) -> u8 {
        match self {
            Driver::LinuxCnc | Driver::Haas => 5,
            Driver::TurboCnc => 4,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Driver::LinuxCnc => "LinuxCNC",
            Driver::TurboCnc => "TurboCNC",
            Driver::Haas => "Haas",
        }
    }

    /// Persisted byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Driver::LinuxCnc => 0,
            Driver::TurboCnc => 1,
            Driver::Haas => 2,
        }
    }

    /// From persisted byte; unknown values read as LinuxCNC.
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Driver::TurboCnc,
            2 => Driver::Haas,
            _ => Driver::LinuxCnc,
        }
    }
}

/// Machine settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Machine {
    /// Machine name.
    pub name: String,
    /// Option bits; bit 0 enables the tool-change operator prompt.
    pub options: u8,
    /// Controller dialect.
    pub driver: Driver,
    /// Decimal places for coordinates; 0 selects the driver default.
    pub decimals: u8,
}

impl Machine {
    /// Decimal places actually used for emission.
    pub fn effective_decimals(&self) -> u8 {
        if self.decimals == 0 {
            self.driver.default_decimals()
        } else {
            self.decimals
        }
    }
}

/// Stock description.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Stock extents along X, Y, Z.
    pub size: [f64; 3],
    /// Position of program zero inside the stock, measured from the stock's
    /// minimum X, minimum Y, top corner.
    pub origin: [f64; 3],
    /// Clearance height for rapid traverses.
    pub ztraverse: f64,
    /// Material tag.
    pub kind: MaterialType,
    /// Unit system of every length in the document.
    pub units: Units,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            size: [4.0, 4.0, 0.5],
            origin: [0.0, 0.0, 0.0],
            ztraverse: 0.1,
            kind: MaterialType::Aluminum,
            units: Units::Inch,
        }
    }
}

/// Progress callback; receives the fraction completed in `[0, 1]`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// A machining project.
#[derive(Clone)]
pub struct Document {
    /// Project name.
    pub name: String,
    /// Free-text notes.
    pub notes: String,
    /// Project number.
    pub project_number: u32,
    /// Machine settings.
    pub machine: Machine,
    /// Stock settings.
    pub material: Material,
    /// Simulated stock.
    pub voxels: VoxelField,
    tree: Tree<Block>,
    root: ListId,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("project_number", &self.project_number)
            .field("machine", &self.machine)
            .field("material", &self.material)
            .field("nodes", &self.tree.len())
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl Document {
    /// Create an empty document with default stock.
    pub fn new(name: impl Into<String>) -> Self {
        let mut tree = Tree::new();
        let root = tree.new_list(None);
        let material = Material::default();
        let voxels = VoxelField::new(DEFAULT_RESOLUTION, material.size);
        Self {
            name: name.into(),
            notes: String::new(),
            project_number: 0,
            machine: Machine::default(),
            material,
            voxels,
            tree,
            root,
            progress: None,
        }
    }

    /// The top-level list.
    pub fn root(&self) -> ListId {
        self.root
    }

    /// Underlying tree.
    pub fn tree(&self) -> &Tree<Block> {
        &self.tree
    }

    /// Mutable tree, for reordering and splicing.
    pub fn tree_mut(&mut self) -> &mut Tree<Block> {
        &mut self.tree
    }

    /// Block by id.
    pub fn get(&self, id: NodeId) -> Option<&Block> {
        self.tree.get(id)
    }

    /// Mutable block by id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Block> {
        self.tree.get_mut(id)
    }

    /// Install or clear the progress callback.
    pub fn set_progress(&mut self, progress: Option<ProgressFn>) {
        self.progress = progress;
    }

    /// Create an unlinked node; containers get their child list.
    pub fn create(&mut self, block: Block) -> NodeId {
        let container = block.kind().is_container();
        let id = self.tree.create(block);
        if container {
            self.tree.new_list(Some(id));
        }
        id
    }

    /// Child list of a container node.
    pub fn children(&self, id: NodeId) -> Option<ListId> {
        self.tree.child_lists(id).first().copied()
    }

    /// Create a node and append it to `list`.
    pub fn push(&mut self, list: ListId, block: Block) -> NodeId {
        let id = self.create(block);
        self.tree.push_back(list, id);
        id
    }

    /// Create a node and append it to the top-level list.
    pub fn add(&mut self, block: Block) -> NodeId {
        self.push(self.root, block)
    }

    /// Create a node and append it to a container's children.
    pub fn add_child(&mut self, parent: NodeId, block: Block) -> Result<NodeId> {
        let kind = self
            .get(parent)
            .map(Block::kind)
            .ok_or(IrError::UnknownNode(parent))?;
        let list = self.children(parent).ok_or(IrError::NotAContainer(kind))?;
        Ok(self.push(list, block))
    }

    /// Remove a node and everything it owns. No-op on locked nodes.
    pub fn remove(&mut self, id: NodeId) -> Option<Block> {
        let removed = self.tree.remove(id);
        if removed.is_none() {
            debug!(?id, "remove refused");
        }
        removed
    }

    /// Deep copy a node and link the copy right after the original.
    pub fn duplicate(&mut self, id: NodeId) -> Option<NodeId> {
        let copy = self.tree.duplicate_with(id, &mut |b: &Block| {
            let mut b = b.clone();
            b.code.clear();
            b.status.clear();
            b
        })?;
        self.tree.insert_after(id, copy);
        Some(copy)
    }

    /// Destroy every node.
    pub fn clear(&mut self) {
        self.tree.destroy_list(self.root);
    }

    /// Number of live nodes at every depth.
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// Visit every node of `list` in order, reporting progress after each.
    ///
    /// The callback sees `(i + 1) / n` after node `i` and a final `1.0`.
    pub fn traverse<F>(&mut self, list: ListId, mut visit: F)
    where
        F: FnMut(&mut Document, NodeId),
    {
        let ids = self.tree.ids(list);
        let n = ids.len();
        let progress = self.progress.clone();
        for (i, id) in ids.into_iter().enumerate() {
            visit(self, id);
            if let Some(report) = &progress {
                report((i + 1) as f64 / n as f64);
            }
        }
        if let Some(report) = &progress {
            report(1.0);
        }
    }

    /// Nearest Tool preceding `id`: previous siblings first, then the
    /// parent's previous siblings, and so on up to the top level.
    pub fn find_tool(&self, id: NodeId) -> Option<&ToolData> {
        let mut cur = id;
        loop {
            while let Some(prev) = self.tree.prev(cur) {
                if let Some(tool) = self.tree.get(prev).and_then(Block::as_tool) {
                    return Some(tool);
                }
                cur = prev;
            }
            cur = self.tree.parent(cur)?;
        }
    }

    /// Offset context of `id`: composed transforms of enclosing templates
    /// and the compensation of the nearest enclosing sketch.
    pub fn offset_of(&self, id: NodeId) -> Offset {
        let mut offset = Offset::identity();
        let mut side_set = false;
        let mut cur = id;
        while let Some(parent) = self.tree.parent(cur) {
            match self.tree.get(parent).map(Block::data) {
                Some(BlockData::Template(t)) => {
                    let outer = Transform2::new(t.position.x, t.position.y, t.rotation);
                    offset = offset.within(&outer);
                }
                Some(BlockData::Sketch(s)) if !side_set => {
                    side_set = true;
                    offset.side = s.side.sign();
                    offset.tool = self.find_tool(parent).map(ToolData::radius).unwrap_or(0.0);
                }
                _ => {}
            }
            cur = parent;
        }
        offset
    }

    /// Rescale a node's lengths and everything below it.
    pub fn scale(&mut self, id: NodeId, factor: f64) {
        if let Some(block) = self.tree.get_mut(id) {
            block.scale(factor);
        }
        for list in self.tree.child_lists(id).to_vec() {
            for child in self.tree.ids(list) {
                self.scale(child, factor);
            }
        }
    }

    /// Switch the unit system, converting every length in the document.
    pub fn set_units(&mut self, units: Units) {
        let from = self.material.units;
        if from == units {
            return;
        }
        let factor = from.inches() / units.inches();
        for id in self.tree.ids(self.root) {
            self.scale(id, factor);
        }
        let m = &mut self.material;
        m.size = m.size.map(|v| v * factor);
        m.origin = m.origin.map(|v| v * factor);
        m.ztraverse *= factor;
        m.units = units;
        self.rebuild_voxels();
        debug!(?units, factor, "converted document units");
    }

    /// Reallocate the voxel field for the current stock size.
    pub fn rebuild_voxels(&mut self) {
        let resolution = self.voxels.resolution;
        self.voxels.realloc(resolution, self.material.size);
    }

    /// Change the voxel resolution and reallocate.
    pub fn set_resolution(&mut self, resolution: u32) {
        self.voxels.realloc(resolution.max(1), self.material.size);
    }

    /// Regenerate a bolt-hole pattern's child circles from its payload.
    pub fn rebuild_bolt_holes(&mut self, id: NodeId) -> Result<()> {
        let block = self.get(id).ok_or(IrError::UnknownNode(id))?;
        let data = block
            .as_bolt_holes()
            .ok_or(IrError::NotAContainer(block.kind()))?;
        let radius = data.hole_diameter / 2.0;
        let centers = data.hole_centers();
        let list = self
            .children(id)
            .ok_or(IrError::NotAContainer(BlockKind::BoltHoles))?;
        self.tree.destroy_list(list);
        for c in centers {
            self.push(list, Block::new(BlockData::Arc(ArcData::circle(c, radius))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{CutSide, LineData, SketchData, TemplateData};
    use approx::assert_relative_eq;
    use gcam_kernel_math::Point2;
    use std::sync::Mutex;

    fn tool(diameter: f64) -> Block {
        Block::new(BlockData::Tool(ToolData {
            diameter,
            ..ToolData::default()
        }))
    }

    #[test]
    fn test_containers_get_child_list() {
        let mut doc = Document::new("t");
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData::default())));
        let line = doc.add(Block::new(BlockData::Line(LineData::default())));
        assert!(doc.children(sketch).is_some());
        assert!(doc.children(line).is_none());
        assert!(matches!(
            doc.add_child(line, tool(0.1)),
            Err(IrError::NotAContainer(BlockKind::Line))
        ));
        let child = doc.add_child(sketch, tool(0.1)).unwrap();
        assert_eq!(doc.tree().parent(child), Some(sketch));
    }

    #[test]
    fn test_find_tool_walks_up() {
        let mut doc = Document::new("t");
        doc.add(tool(0.25));
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData::default())));
        let line = doc
            .add_child(sketch, Block::new(BlockData::Line(LineData::default())))
            .unwrap();
        assert_relative_eq!(doc.find_tool(line).unwrap().diameter, 0.25);

        doc.add(tool(0.5));
        let later = doc.add(Block::new(BlockData::Line(LineData::default())));
        assert_relative_eq!(doc.find_tool(later).unwrap().diameter, 0.5);
    }

    #[test]
    fn test_find_tool_missing() {
        let mut doc = Document::new("t");
        let line = doc.add(Block::new(BlockData::Line(LineData::default())));
        assert!(doc.find_tool(line).is_none());
    }

    #[test]
    fn test_offset_composes_templates_and_side() {
        let mut doc = Document::new("t");
        doc.add(tool(0.2));
        let outer = doc.add(Block::new(BlockData::Template(TemplateData {
            position: Point2::new(10.0, 0.0),
            rotation: 90.0,
        })));
        let inner = doc
            .add_child(
                outer,
                Block::new(BlockData::Template(TemplateData {
                    position: Point2::new(1.0, 0.0),
                    rotation: 0.0,
                })),
            )
            .unwrap();
        let sketch = doc
            .add_child(
                inner,
                Block::new(BlockData::Sketch(SketchData {
                    side: CutSide::Right,
                    ..SketchData::default()
                })),
            )
            .unwrap();
        let line = doc
            .add_child(sketch, Block::new(BlockData::Line(LineData::default())))
            .unwrap();

        let off = doc.offset_of(line);
        let p = off.apply(&Point2::origin());
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(off.side, -1.0);
        assert_relative_eq!(off.tool, 0.1);
        assert!(doc.offset_of(outer).transform.is_identity());
    }

    #[test]
    fn test_set_units_scales_everything() {
        let mut doc = Document::new("t");
        let t = doc.add(tool(0.5));
        doc.set_units(Units::Millimeter);
        assert_relative_eq!(doc.get(t).unwrap().as_tool().unwrap().diameter, 12.7);
        assert_relative_eq!(doc.material.size[0], 101.6, epsilon = 1e-9);
        assert_eq!(doc.voxels.counts()[0], DEFAULT_RESOLUTION as usize);
        doc.set_units(Units::Inch);
        assert_relative_eq!(doc.get(t).unwrap().as_tool().unwrap().diameter, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_traverse_reports_progress() {
        let mut doc = Document::new("t");
        for _ in 0..4 {
            doc.add(tool(0.1));
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        doc.set_progress(Some(Arc::new(move |f: f64| sink.lock().unwrap().push(f))));
        let mut visited = 0;
        let root = doc.root();
        doc.traverse(root, |_, _| visited += 1);
        assert_eq!(visited, 4);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn test_rebuild_bolt_holes() {
        let mut doc = Document::new("t");
        let bolts = doc.add(Block::new(BlockData::BoltHoles(Default::default())));
        doc.rebuild_bolt_holes(bolts).unwrap();
        let list = doc.children(bolts).unwrap();
        assert_eq!(doc.tree().list_len(list), 4);
        doc.rebuild_bolt_holes(bolts).unwrap();
        assert_eq!(doc.tree().list_len(list), 4);
        assert!(doc.tree().validate(list));
    }

    #[test]
    fn test_duplicate_links_after_original() {
        let mut doc = Document::new("t");
        let sketch = doc.add(Block::new(BlockData::Sketch(SketchData::default())));
        doc.add_child(sketch, Block::new(BlockData::Line(LineData::default())))
            .unwrap();
        let copy = doc.duplicate(sketch).unwrap();
        assert_eq!(doc.tree().next(sketch), Some(copy));
        let copy_list = doc.children(copy).unwrap();
        let child = doc.tree().head(copy_list).unwrap();
        assert_eq!(doc.tree().parent(child), Some(copy));
        assert_eq!(doc.node_count(), 4);
    }

    #[test]
    fn test_document_is_send() {
        fn assert_send<T: Send + Clone>() {}
        assert_send::<Document>();
    }

    #[test]
    fn test_settings_enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Units::Millimeter).unwrap(), "\"millimeter\"");
        assert_eq!(serde_json::to_string(&Driver::TurboCnc).unwrap(), "\"turbocnc\"");
        let driver: Driver = serde_json::from_str("\"haas\"").unwrap();
        assert_eq!(driver, Driver::Haas);
    }

    #[test]
    fn test_set_resolution_is_bounded() {
        let mut doc = Document::new("t");
        doc.material.size = [4.0, 0.01, 0.01];
        doc.set_resolution(u32::MAX);
        assert_eq!(doc.voxels.resolution, crate::MAX_RESOLUTION);
        assert_eq!(doc.voxels.counts(), [crate::MAX_RESOLUTION as usize, 1, 1]);
    }
}
