use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "fxtool",
    author,
    version,
    about = "Check .omwfx post-processing techniques and inspect their dispatch plans"
)]
pub struct Cli {
    #[command(flatten)]
    pub env: EnvArgs,
    #[command(subcommand)]
    pub command: Command,
}

/// Where techniques and settings are read from, and which driver to assume.
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Directory scanned recursively for `.omwfx` files. Defaults to the
    /// `shaders` directory under the data dir.
    #[arg(long, global = true, value_name = "DIR", env = "FXTOOL_SHADER_DIR")]
    pub shaders: Option<PathBuf>,

    /// Post-processing config (`postprocess.toml`). Defaults to the config dir.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Persisted uniform overrides (`shader_settings.toml`). Defaults to the
    /// config dir.
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Highest GLSL version the simulated driver supports.
    #[arg(long, global = true, value_name = "VERSION", default_value_t = 330)]
    pub glsl_version: u32,

    /// Simulate a driver without uniform buffer objects.
    #[arg(long, global = true)]
    pub no_ubo: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile techniques and report their status.
    Check(CheckArgs),
    /// Print the generated GLSL of a technique's passes.
    Glsl(GlslArgs),
    /// Print the std140 layout of the shared `omw` uniform block.
    Layout(LayoutArgs),
    /// Simulate one frame of a chain and print the dispatch plan.
    Plan(PlanArgs),
    /// Print resolved config and data directories.
    Where,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Techniques to compile; all discovered techniques when empty.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Emit a JSON report instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct GlslArgs {
    /// Technique name (file stem).
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Only print this pass.
    #[arg(long, value_name = "PASS")]
    pub pass: Option<String>,

    /// Only print this stage.
    #[arg(long, value_enum)]
    pub stage: Option<StageArg>,

    /// Compile with static uniforms turned into live uniforms.
    #[arg(long)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageArg {
    Vertex,
    Fragment,
    Compute,
}

impl From<StageArg> for fx::ShaderStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Vertex => fx::ShaderStage::Vertex,
            StageArg::Fragment => fx::ShaderStage::Fragment,
            StageArg::Compute => fx::ShaderStage::Compute,
        }
    }
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Print the GLSL declaration instead of the offset table.
    #[arg(long, conflicts_with = "json")]
    pub glsl: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Chain to run after `main`; overrides the config file. Accepts a comma
    /// separated list.
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub chain: Option<Vec<String>>,

    /// Back buffer size.
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_size,
        default_value = "1920x1080"
    )]
    pub size: (u32, u32),

    /// Multisample count for the scene attachments.
    #[arg(long, value_name = "SAMPLES")]
    pub antialiasing: Option<u32>,

    /// Render as if the camera were underwater.
    #[arg(long)]
    pub underwater: bool,

    /// Render as if the camera were in an interior cell.
    #[arg(long)]
    pub interior: bool,

    /// Include every recorded backend command.
    #[arg(long)]
    pub commands: bool,

    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((width, height))
}
