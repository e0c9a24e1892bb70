//! Command handlers
//!
//! One handler per subcommand. Handlers resolve CLI arguments against the
//! environment-backed configuration, run the pipeline stage and return a
//! process exit code.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use crate::cli::commands::{BuildArgs, LintArgs, RenderArgs, VariantsArgs};
use crate::cli::output::OutputFormatter;
use crate::config::GantryConfig;
use crate::docker;
use crate::manifest::Manifest;
use crate::plan::{AppSpec, BuildPlan, Variant};
use crate::render;
use crate::validation::{lint_dockerfile, Validator};

/// Render a plan for the selected variant
pub fn handle_render(args: RenderArgs, config: &GantryConfig) -> i32 {
    let variant = resolve_variant(args.variant, config);
    let app = AppSpec {
        module: args.module.unwrap_or_else(|| config.app.module.clone()),
        callable: args.callable.unwrap_or_else(|| config.app.callable.clone()),
        source_dir: config.app.source_dir.clone(),
    };
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| config.manifest_path.clone());

    let plan = BuildPlan::for_variant(variant, &app, &manifest_path);
    let formatter = OutputFormatter::new(args.format.into());

    let rendered = match formatter.format_plan(&plan) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to format plan: {:#}", e);
            return 1;
        }
    };

    match args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &rendered) {
                error!("Failed to write {}: {}", path.display(), e);
                return 1;
            }
            info!(path = %path.display(), variant = %variant, "Wrote rendered output");
        }
        None => print!("{}", rendered),
    }

    0
}

/// Validate a generated plan, or lint an existing Dockerfile
pub fn handle_lint(args: LintArgs, config: &GantryConfig) -> i32 {
    let formatter = OutputFormatter::new(args.format.into());

    if let Some(path) = args.dockerfile {
        return lint_dockerfile_file(&path, &formatter, args.strict);
    }

    let variant = resolve_variant(args.variant, config);
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| PathBuf::from(&config.manifest_path));

    let manifest = match Manifest::load(&manifest_path) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to load manifest: {}", e);
            return 1;
        }
    };

    let plan = plan_for_path(variant, &config.app, &manifest_path);
    let validator = Validator::new();

    if let Err(e) = validator.validate(&plan, &manifest) {
        error!("Plan validation failed: {:#}", e);
        return 1;
    }

    let findings = validator.lint(&plan, &manifest);
    match formatter.format_findings(&findings) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            error!("Failed to format findings: {:#}", e);
            return 1;
        }
    }

    if args.strict && !findings.is_empty() {
        return 1;
    }
    0
}

/// Build an image via the Docker daemon, then verify it against the plan
pub async fn handle_build(args: BuildArgs, config: &GantryConfig) -> i32 {
    let variant = resolve_variant(args.variant, config);
    let source_dir = args
        .source
        .unwrap_or_else(|| config.app.source_dir.clone());
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| config.manifest_path.clone());

    let app = AppSpec {
        source_dir: source_dir.clone(),
        ..config.app.clone()
    };
    let plan = BuildPlan::for_variant(variant, &app, &manifest_path);
    let tag = args
        .tag
        .unwrap_or_else(|| format!("{}-{}:latest", app.module, variant.id()));

    match run_build(&plan, &source_dir, &manifest_path, &tag, config, args.no_verify).await {
        Ok(record) => {
            let formatter = OutputFormatter::new(args.format.into());
            match formatter.format_build_record(&record) {
                Ok(text) => {
                    print!("{}", text);
                    0
                }
                Err(e) => {
                    error!("Failed to format build record: {:#}", e);
                    1
                }
            }
        }
        Err(e) => {
            error!("Build failed: {:#}", e);
            1
        }
    }
}

/// List the variant catalog
pub fn handle_variants(args: VariantsArgs) -> i32 {
    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_variants() {
        Ok(text) => {
            print!("{}", text);
            0
        }
        Err(e) => {
            error!("Failed to format variants: {:#}", e);
            1
        }
    }
}

async fn run_build(
    plan: &BuildPlan,
    source_dir: &std::path::Path,
    manifest_path: &str,
    tag: &str,
    config: &GantryConfig,
    no_verify: bool,
) -> Result<docker::BuildRecord> {
    let manifest = Manifest::load(&source_dir.join(manifest_path))?;
    Validator::new().validate(plan, &manifest)?;

    for finding in Validator::new().lint(plan, &manifest) {
        warn!(rule = finding.rule, "{}", finding.message);
    }

    if !docker::check_docker().await? {
        anyhow::bail!("Docker daemon is not available");
    }
    let client = docker::connect()?;

    let dockerfile = render::render(plan);
    let archive = docker::context::build_context(source_dir, &dockerfile)?;
    let digest = plan.digest()?;

    let record = timeout(
        Duration::from_secs(config.build_timeout_secs),
        docker::build_image(&client, archive, tag, &digest),
    )
    .await
    .context("Build timed out")??;

    if !no_verify {
        let violations = docker::verify_image(&client, tag, plan).await?;
        if !violations.is_empty() {
            for violation in &violations {
                error!("{}", violation);
            }
            anyhow::bail!("Image verification failed with {} violation(s)", violations.len());
        }
        info!(tag, "Image verified against plan");
    }

    Ok(record)
}

fn lint_dockerfile_file(path: &std::path::Path, formatter: &OutputFormatter, strict: bool) -> i32 {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return 1;
        }
    };

    let findings = lint_dockerfile(&content);
    match formatter.format_findings(&findings) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            error!("Failed to format findings: {:#}", e);
            return 1;
        }
    }

    if strict && !findings.is_empty() {
        return 1;
    }
    0
}

fn resolve_variant(arg: Option<crate::cli::commands::VariantArg>, config: &GantryConfig) -> Variant {
    arg.map(Variant::from).unwrap_or(config.variant)
}

/// Build the plan the lint run inspects, with the manifest path the manifest
/// itself was loaded from.
fn plan_for_path(variant: Variant, app: &AppSpec, manifest_path: &std::path::Path) -> BuildPlan {
    BuildPlan::for_variant(variant, app, &manifest_path.to_string_lossy())
}
