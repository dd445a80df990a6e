//! Command line definition.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rk_protocol::config_models::{PersistedMesh, PlyEncoding};
use rk_protocol::display_models::DisplayKind;
use rk_protocol::job_models::{ExportType, PipelineOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recon-kit", version, about = "Photogrammetry pipeline runner and point cloud mesher")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project directory containing `.recon-kit/`
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create `.recon-kit/` with a default configuration
    Init(InitArgs),
    /// Run the pipeline program on a directory of images
    Run(RunArgs),
    /// Build a mesh from a dense point cloud
    Reconstruct(ReconstructArgs),
    /// Open a viewer on the artifacts of an output directory
    View(ViewArgs),
    /// Print statistics of a PLY file
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.recon-kit/`
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding the input images
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving the artifacts
    #[arg(short, long)]
    pub output: PathBuf,

    /// Pipeline program, overriding the configured one
    #[arg(long)]
    pub program: Option<String>,

    /// Reconstruct the mesh once the pipeline succeeds
    #[arg(long)]
    pub mesh: bool,

    #[command(flatten)]
    pub options: OptionArgs,
}

/// Per-run overrides of `[pipeline.options]`.
#[derive(Args, Debug, Default)]
pub struct OptionArgs {
    #[arg(long)]
    pub max_resolution: Option<u32>,
    #[arg(long)]
    pub estimate_roi: Option<u32>,
    #[arg(long)]
    pub pipeline_verbosity: Option<u32>,
    #[arg(long)]
    pub decimation_factor: Option<f64>,
    #[arg(long)]
    pub remove_dense_maps: Option<bool>,
    #[arg(long)]
    pub integrate_roi: Option<bool>,
    #[arg(long)]
    pub smoothing_iterations: Option<u32>,
    #[arg(long)]
    pub min_point_distance: Option<u32>,
    #[arg(long, value_enum)]
    pub export_type: Option<ExportArg>,
}

impl OptionArgs {
    /// Apply the given overrides on top of `base`.
    pub fn apply(&self, mut base: PipelineOptions) -> PipelineOptions {
        if let Some(v) = self.max_resolution {
            base.max_resolution = v;
        }
        if let Some(v) = self.estimate_roi {
            base.estimate_roi = v;
        }
        if let Some(v) = self.pipeline_verbosity {
            base.verbosity = v;
        }
        if let Some(v) = self.decimation_factor {
            base.decimation_factor = v;
        }
        if let Some(v) = self.remove_dense_maps {
            base.remove_dense_maps = v;
        }
        if let Some(v) = self.integrate_roi {
            base.integrate_roi = v;
        }
        if let Some(v) = self.smoothing_iterations {
            base.smoothing_iterations = v;
        }
        if let Some(v) = self.min_point_distance {
            base.min_point_distance = v;
        }
        if let Some(v) = self.export_type {
            base.export_type = v.into();
        }
        base
    }
}

#[derive(Args, Debug)]
pub struct ReconstructArgs {
    /// Pipeline output directory (reads scene_dense.ply, writes scene_dense_mesh.ply)
    #[arg(short, long, conflicts_with_all = ["cloud", "mesh"])]
    pub output: Option<PathBuf>,

    /// Point cloud to read
    #[arg(long, requires = "mesh")]
    pub cloud: Option<PathBuf>,

    /// Mesh to write
    #[arg(long, requires = "cloud")]
    pub mesh: Option<PathBuf>,

    /// Triangle budget of the decimated copy
    #[arg(long)]
    pub target: Option<usize>,

    /// Which mesh to write
    #[arg(long, value_enum)]
    pub persist: Option<PersistArg>,

    /// Write ASCII instead of binary PLY
    #[arg(long)]
    pub ascii: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Pipeline output directory
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// PLY file to read
    pub path: PathBuf,

    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportArg {
    Obj,
    Ply,
}

impl From<ExportArg> for ExportType {
    fn from(value: ExportArg) -> Self {
        match value {
            ExportArg::Obj => ExportType::Obj,
            ExportArg::Ply => ExportType::Ply,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistArg {
    Candidate,
    Cleaned,
}

impl From<PersistArg> for PersistedMesh {
    fn from(value: PersistArg) -> Self {
        match value {
            PersistArg::Candidate => PersistedMesh::Candidate,
            PersistArg::Cleaned => PersistedMesh::Cleaned,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Cloud,
    Mesh,
}

impl From<KindArg> for DisplayKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Cloud => DisplayKind::Cloud,
            KindArg::Mesh => DisplayKind::Mesh,
        }
    }
}

/// Encoding selected by `--ascii`.
pub fn encoding(ascii: bool, configured: PlyEncoding) -> PlyEncoding {
    if ascii {
        PlyEncoding::Ascii
    } else {
        configured
    }
}
