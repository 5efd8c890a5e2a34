//! gcam CLI - build, inspect, post and simulate machining projects.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcam_ir::{
    BeginData, Block, BlockData, BoltHolesData, CutSide, Document, DrillHolesData, Driver,
    EndData, LineData, PointData, SketchData, ToolData, Units,
};
use gcam_kernel_cam::{generate, LineEnding};
use gcam_kernel_math::Point2;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "gcam")]
#[command(about = "Block-based CNC toolpath compiler", long_about = None)]
struct Cli {
    /// Settings file (default: ./gcam.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitsArg {
    Inch,
    Mm,
}

#[derive(Clone, Copy, ValueEnum)]
enum DriverArg {
    Linuxcnc,
    Turbocnc,
    Haas,
}

impl From<DriverArg> for Driver {
    fn from(d: DriverArg) -> Self {
        match d {
            DriverArg::Linuxcnc => Driver::LinuxCnc,
            DriverArg::Turbocnc => Driver::TurboCnc,
            DriverArg::Haas => Driver::Haas,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a demo project
    New {
        /// Output .gcam file
        output: PathBuf,
        /// Project name (default: derived from filename)
        #[arg(short, long)]
        name: Option<String>,
        /// Unit system of the project
        #[arg(long, value_enum, default_value = "inch")]
        units: UnitsArg,
        /// Machine driver
        #[arg(long, value_enum, default_value = "linuxcnc")]
        driver: DriverArg,
    },
    /// Display information about a project
    Info {
        /// Path to the .gcam file
        file: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write the G-code program of a project
    Generate {
        /// Input .gcam file
        input: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Use CRLF line endings
        #[arg(long, conflicts_with = "lf")]
        crlf: bool,
        /// Use LF line endings
        #[arg(long)]
        lf: bool,
        /// Decimal places for coordinates
        #[arg(long)]
        decimals: Option<usize>,
    },
    /// Cut the project's stock in the voxel simulator
    Simulate {
        /// Input .gcam file
        input: PathBuf,
        /// Simulate this program instead of the generated one
        #[arg(short, long)]
        program: Option<PathBuf>,
        /// Cells along the stock's longest axis
        #[arg(short, long)]
        resolution: Option<u32>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::New {
            output,
            name,
            units,
            driver,
        } => new_project(&output, name, units, driver.into()),
        Commands::Info { file, json } => show_info(&file, json),
        Commands::Generate {
            input,
            output,
            crlf,
            lf,
            decimals,
        } => {
            let mut out = config.output;
            if crlf {
                out.line_ending = LineEnding::Crlf;
            } else if lf {
                out.line_ending = LineEnding::Lf;
            }
            if decimals.is_some() {
                out.decimals = decimals;
            }
            generate_program(&input, output.as_deref(), &out)
        }
        Commands::Simulate {
            input,
            program,
            resolution,
            json,
        } => {
            let mut settings = config.simulation;
            if resolution.is_some() {
                settings.resolution = resolution;
            }
            simulate_project(&input, program.as_deref(), &config, &settings, json)
        }
    }
}

fn name_from(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}

/// A plate with a profiled square, a bolt circle and a row of drilled holes.
fn demo_document(name: String, driver: Driver) -> Result<Document> {
    let mut doc = Document::new(name);
    doc.machine.driver = driver;

    doc.add(Block::new(BlockData::Begin(BeginData::default())));
    doc.add(Block::with_comment(
        BlockData::Tool(ToolData {
            diameter: 0.125,
            feed: 12.0,
            ..ToolData::default()
        }),
        "1/8 end mill",
    ));

    let sketch = doc.add(Block::with_comment(
        BlockData::Sketch(SketchData {
            depth: 0.2,
            step: 0.1,
            side: CutSide::Right,
        }),
        "outline",
    ));
    let corners = [(0.5, 0.5), (3.5, 0.5), (3.5, 3.5), (0.5, 3.5)];
    for (i, &(x, y)) in corners.iter().enumerate() {
        let (nx, ny) = corners[(i + 1) % corners.len()];
        doc.add_child(
            sketch,
            Block::new(BlockData::Line(LineData {
                p0: Point2::new(x, y),
                p1: Point2::new(nx, ny),
            })),
        )?;
    }

    let bolts = doc.add(Block::with_comment(
        BlockData::BoltHoles(BoltHolesData {
            position: Point2::new(2.0, 2.0),
            count: 6,
            pattern_radius: 0.75,
            hole_diameter: 0.25,
            ..BoltHolesData::default()
        }),
        "bolt circle",
    ));
    doc.rebuild_bolt_holes(bolts)?;

    let drills = doc.add(Block::with_comment(
        BlockData::DrillHoles(DrillHolesData::default()),
        "mounting holes",
    ));
    for x in [3.0, 1.0, 2.0] {
        doc.add_child(
            drills,
            Block::new(BlockData::Point(PointData {
                p: Point2::new(x, 3.2),
            })),
        )?;
    }

    doc.add(Block::new(BlockData::End(EndData {
        retract: Some(Point2::origin()),
    })));
    Ok(doc)
}

fn new_project(output: &Path, name: Option<String>, units: UnitsArg, driver: Driver) -> Result<()> {
    let mut doc = demo_document(name.unwrap_or_else(|| name_from(output)), driver)?;
    if let UnitsArg::Mm = units {
        doc.set_units(Units::Millimeter);
    }
    gcam_codec::save(&doc, output)?;
    println!(
        "Wrote {} ({} blocks) to {}",
        doc.name,
        doc.node_count(),
        output.display()
    );
    Ok(())
}

fn load(path: &Path) -> Result<Document> {
    gcam_codec::load(path).with_context(|| format!("loading {}", path.display()))
}

fn show_info(file: &Path, json: bool) -> Result<()> {
    let doc = load(file)?;
    let root = doc.root();
    let blocks: Vec<serde_json::Value> = doc
        .tree()
        .iter(root)
        .filter_map(|id| {
            let block = doc.get(id)?;
            let children = doc.children(id).map(|l| doc.tree().list_len(l));
            Some(serde_json::json!({
                "kind": block.kind().name(),
                "comment": block.comment,
                "suppressed": block.flags.suppressed,
                "locked": block.flags.locked,
                "children": children,
            }))
        })
        .collect();

    if json {
        let summary = serde_json::json!({
            "name": doc.name,
            "notes": doc.notes,
            "project_number": doc.project_number,
            "units": doc.material.units,
            "driver": doc.machine.driver,
            "stock": doc.material.size,
            "origin": doc.material.origin,
            "nodes": doc.node_count(),
            "blocks": blocks,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let [sx, sy, sz] = doc.material.size;
    println!("gcam project: {}", file.display());
    println!("  Name: {}", doc.name);
    println!("  Units: {:?}", doc.material.units);
    println!("  Driver: {}", doc.machine.driver.name());
    println!("  Stock: {sx} x {sy} x {sz}");
    println!("  Nodes: {}", doc.node_count());
    if !blocks.is_empty() {
        println!("\nBlocks:");
        for (i, id) in doc.tree().iter(root).enumerate() {
            let Some(block) = doc.get(id) else { continue };
            let mut line = format!("  {}: {}", i + 1, block.kind().name());
            if !block.comment.is_empty() {
                line.push_str(&format!(" \"{}\"", block.comment));
            }
            if let Some(list) = doc.children(id) {
                line.push_str(&format!(" [{} children]", doc.tree().list_len(list)));
            }
            if block.flags.suppressed {
                line.push_str(" (suppressed)");
            }
            println!("{line}");
        }
    }
    Ok(())
}

fn report_statuses(doc: &Document) {
    for (i, id) in doc.tree().iter(doc.root()).enumerate() {
        if let Some(block) = doc.get(id) {
            if !block.status.is_empty() {
                warn!(
                    index = i + 1,
                    kind = block.kind().name(),
                    status = %block.status,
                    "block emitted no code"
                );
            }
        }
    }
}

fn generate_program(
    input: &Path,
    output: Option<&Path>,
    out: &config::OutputConfig,
) -> Result<()> {
    let mut doc = load(input)?;
    let program = generate(&mut doc, out.synth_options());
    report_statuses(&doc);
    if program.is_empty() {
        bail!("{} produced no code", input.display());
    }
    match output {
        Some(path) => {
            fs::write(path, &program).with_context(|| format!("writing {}", path.display()))?;
            info!(lines = program.lines().count(), "wrote {}", path.display());
        }
        None => print!("{program}"),
    }
    Ok(())
}

fn simulate_project(
    input: &Path,
    program: Option<&Path>,
    config: &CliConfig,
    settings: &gcam_stocksim::SimSettings,
    json: bool,
) -> Result<()> {
    let mut doc = load(input)?;
    let program = match program {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let program = generate(&mut doc, config.output.synth_options());
            report_statuses(&doc);
            program
        }
    };

    let report = gcam_stocksim::simulate(&mut doc, &program, settings)?;
    let [px, py, pz] = doc.voxels.pitch();
    let volume = report.removed as f64 * px * py * pz;

    if json {
        let mut value = serde_json::to_value(report)?;
        value["removed_volume"] = serde_json::json!(volume);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let secs = report.elapsed_seconds.round() as u64;
    println!("Simulated {}", input.display());
    println!(
        "  Machining time: {}:{:02}:{:02}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60
    );
    println!(
        "  Removed: {} cells ({volume:.4} cubic {})",
        report.removed,
        match doc.material.units {
            Units::Inch => "in",
            Units::Millimeter => "mm",
        }
    );
    println!(
        "  Remaining: {} of {} cells",
        doc.voxels.solid_count(),
        doc.voxels.len()
    );
    Ok(())
}
