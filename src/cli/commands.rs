//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::output::OutputFormat;
use crate::plan::Variant;

/// Container build pipeline for Python WSGI services
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Enable verbose output (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the Dockerfile (or plan) for a build variant
    Render(RenderArgs),

    /// Validate a plan or an existing Dockerfile
    Lint(LintArgs),

    /// Build an image via the local Docker daemon and verify it
    Build(BuildArgs),

    /// List the variant catalog
    Variants(VariantsArgs),
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Build variant to render
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "dockerfile")]
    pub format: OutputFormatArg,

    /// Dependency manifest path, relative to the source tree
    #[arg(long)]
    pub manifest: Option<String>,

    /// Module holding the WSGI callable
    #[arg(long)]
    pub module: Option<String>,

    /// WSGI callable attribute within the module
    #[arg(long)]
    pub callable: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct LintArgs {
    /// Build variant to validate
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Lint an existing Dockerfile instead of a generated plan
    #[arg(long)]
    pub dockerfile: Option<PathBuf>,

    /// Dependency manifest to validate the plan against
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,

    /// Treat warning-level findings as errors
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build variant to execute
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Tag for the built image
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Application source directory (build context root)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Dependency manifest path, relative to the source tree
    #[arg(long)]
    pub manifest: Option<String>,

    /// Skip post-build image verification
    #[arg(long)]
    pub no_verify: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug)]
pub struct VariantsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

/// Build variant CLI argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantArg {
    /// Alpine multi-stage with the full native header set
    AlpineFull,
    /// Debian slim multi-stage
    Slim,
    /// Debian slim single-stage
    SlimSingle,
    /// Alpine multi-stage with a reduced header set
    AlpineMinimal,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::AlpineFull => Variant::AlpineFull,
            VariantArg::Slim => Variant::SlimMultiStage,
            VariantArg::SlimSingle => Variant::SlimSingleStage,
            VariantArg::AlpineMinimal => Variant::AlpineMinimal,
        }
    }
}

/// Output format CLI argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormatArg {
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable output
    Human,
    /// Raw Dockerfile text
    Dockerfile,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Yaml => OutputFormat::Yaml,
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Dockerfile => OutputFormat::Dockerfile,
        }
    }
}
