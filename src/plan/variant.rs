//! The variant catalog
//!
//! Four build definitions target the same deployment: an Alpine multi-stage
//! build with the full X11/GLib native stack, a Debian-slim multi-stage
//! build, a Debian-slim single-stage build for manifests that ship prebuilt
//! wheels, and a minimal Alpine multi-stage build.

use super::{
    site_packages_dir, AppSpec, BuildPlan, BuilderStage, Command, CopySpec, PlanMetadata,
    PortBinding, RuntimeStage, BIN_DIR, DEFAULT_PORT, LIB_DIR, PYTHON_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Compiler toolchain for Alpine builders
const ALPINE_TOOLCHAIN: &[&str] = &["build-base", "python3-dev", "musl-dev", "linux-headers"];

/// Full X11/GLib native stack (Alpine package names), required when the
/// image-processing dependencies are compiled from source
const ALPINE_NATIVE_FULL: &[&str] = &[
    "libx11-dev",
    "libxext-dev",
    "libxrender-dev",
    "libsm-dev",
    "libice-dev",
    "glib-dev",
    "jpeg-dev",
    "zlib-dev",
    "mesa-dev",
];

/// Minimal X11/GLib subset (Alpine package names)
const ALPINE_NATIVE_MINIMAL: &[&str] = &["libx11-dev", "glib-dev", "jpeg-dev", "zlib-dev"];

/// Compiler toolchain for Debian-slim builders
const SLIM_TOOLCHAIN: &[&str] = &["build-essential", "python3-dev"];

/// Minimal X11/GLib subset (Debian package names)
const SLIM_NATIVE_MINIMAL: &[&str] = &[
    "libx11-dev",
    "libglib2.0-dev",
    "libsm6",
    "libxext6",
    "libxrender-dev",
    "libgl1-mesa-glx",
];

/// The four container-build definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Alpine multi-stage, full native stack, 4 gunicorn workers
    AlpineFull,
    /// Debian-slim multi-stage, minimal native subset
    SlimMultiStage,
    /// Debian-slim single-stage, prebuilt wheels, port from `PORT`
    SlimSingleStage,
    /// Alpine multi-stage, minimal native subset
    AlpineMinimal,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::AlpineFull,
        Variant::SlimMultiStage,
        Variant::SlimSingleStage,
        Variant::AlpineMinimal,
    ];

    /// Stable identifier used on the command line and in plan metadata
    pub fn id(&self) -> &'static str {
        match self {
            Variant::AlpineFull => "alpine-full",
            Variant::SlimMultiStage => "slim",
            Variant::SlimSingleStage => "slim-single",
            Variant::AlpineMinimal => "alpine-minimal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Variant::AlpineFull => {
                "Alpine multi-stage build with the full X11/GLib native stack"
            }
            Variant::SlimMultiStage => {
                "Debian-slim multi-stage build with a minimal X11/GLib subset"
            }
            Variant::SlimSingleStage => {
                "Debian-slim single-stage build for dependencies shipping prebuilt wheels"
            }
            Variant::AlpineMinimal => {
                "Alpine multi-stage build with a minimal X11/GLib subset"
            }
        }
    }

    /// Whether the variant separates dependency compilation into its own stage
    pub fn is_multi_stage(&self) -> bool {
        !matches!(self, Variant::SlimSingleStage)
    }

    /// Base image shared by both stages
    pub fn base_image(&self, python: &str) -> String {
        match self {
            Variant::AlpineFull | Variant::AlpineMinimal => format!("python:{}-alpine", python),
            Variant::SlimMultiStage | Variant::SlimSingleStage => {
                format!("python:{}-slim", python)
            }
        }
    }

    /// OS packages installed in the builder stage
    pub fn builder_packages(&self) -> Vec<String> {
        let sets: &[&[&str]] = match self {
            Variant::AlpineFull => &[ALPINE_TOOLCHAIN, ALPINE_NATIVE_FULL],
            Variant::AlpineMinimal => &[ALPINE_TOOLCHAIN, ALPINE_NATIVE_MINIMAL],
            Variant::SlimMultiStage => &[SLIM_TOOLCHAIN, SLIM_NATIVE_MINIMAL],
            Variant::SlimSingleStage => &[],
        };
        sets.iter()
            .flat_map(|s| s.iter())
            .map(|p| p.to_string())
            .collect()
    }

    /// Explicit WSGI worker count; `None` means server defaults
    pub fn workers(&self) -> Option<u32> {
        match self {
            Variant::AlpineFull => Some(4),
            _ => None,
        }
    }

    /// How the service resolves its port
    pub fn port_binding(&self) -> PortBinding {
        match self {
            Variant::SlimSingleStage => PortBinding::FromEnv {
                var: "PORT".to_string(),
                default: DEFAULT_PORT,
            },
            _ => PortBinding::Fixed { port: DEFAULT_PORT },
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .iter()
            .find(|v| v.id() == s)
            .copied()
            .ok_or_else(|| {
                format!(
                    "Unknown variant '{}'. Valid options: alpine-full, slim, slim-single, alpine-minimal",
                    s
                )
            })
    }
}

impl BuildPlan {
    /// Produce the concrete build plan for a variant.
    ///
    /// `manifest_path` is the dependency manifest relative to the build
    /// context root, typically `requirements.txt`.
    pub fn for_variant(variant: Variant, app: &AppSpec, manifest_path: &str) -> Self {
        let base = variant.base_image(PYTHON_VERSION);
        let site_packages = site_packages_dir(PYTHON_VERSION);
        let port = variant.port_binding();

        let mut env = BTreeMap::new();
        env.insert("PYTHONPATH".to_string(), site_packages.clone());
        env.insert("FLASK_APP".to_string(), format!("{}.py", app.module));
        env.insert("FLASK_ENV".to_string(), "production".to_string());
        if let PortBinding::FromEnv { var, default } = &port {
            env.insert(var.clone(), default.to_string());
        }

        let (builder, copies, runtime_setup, runtime_manifest) = if variant.is_multi_stage() {
            let builder = BuilderStage {
                base: base.clone(),
                packages: variant.builder_packages(),
                env: BTreeMap::new(),
                manifest_path: manifest_path.to_string(),
                commands: vec![format!(
                    "pip install --no-cache-dir --no-binary :all: -r {}",
                    manifest_path
                )],
            };
            let copies = vec![
                CopySpec {
                    from_stage: "builder".to_string(),
                    from: site_packages.clone(),
                    to: site_packages.clone(),
                },
                CopySpec {
                    from_stage: "builder".to_string(),
                    from: BIN_DIR.to_string(),
                    to: BIN_DIR.to_string(),
                },
                CopySpec {
                    from_stage: "builder".to_string(),
                    from: LIB_DIR.to_string(),
                    to: LIB_DIR.to_string(),
                },
            ];
            (Some(builder), copies, vec![], None)
        } else {
            let setup = vec![format!("pip install --no-cache-dir -r {}", manifest_path)];
            (None, vec![], setup, Some(manifest_path.to_string()))
        };

        let command = wsgi_command(variant, app, &port);

        Self {
            metadata: PlanMetadata {
                name: app.module.clone(),
                variant: variant.id().to_string(),
                python: PYTHON_VERSION.to_string(),
            },
            builder,
            runtime: RuntimeStage {
                base,
                packages: vec![],
                copies,
                manifest_path: runtime_manifest,
                setup_commands: runtime_setup,
                workdir: "/app".to_string(),
                app_source: app.source_dir.display().to_string(),
                env,
                port: Some(port),
                command: Some(command),
            },
        }
    }
}

/// Gunicorn invocation for the variant. Fixed ports use the exec form;
/// env-bound ports need a shell so the variable expands at container start.
fn wsgi_command(variant: Variant, app: &AppSpec, port: &PortBinding) -> Command {
    match port {
        PortBinding::Fixed { port } => {
            let mut argv = vec![
                "gunicorn".to_string(),
                "--bind".to_string(),
                format!("0.0.0.0:{}", port),
            ];
            if let Some(workers) = variant.workers() {
                argv.push("--workers".to_string());
                argv.push(workers.to_string());
            }
            argv.push(app.wsgi_target());
            Command::Exec(argv)
        }
        PortBinding::FromEnv { var, .. } => Command::Shell(format!(
            "gunicorn --bind 0.0.0.0:${} {}",
            var,
            app.wsgi_target()
        )),
    }
}
