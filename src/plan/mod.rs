//! Build plan data structures
//!
//! A [`BuildPlan`] is the declarative description of one container build:
//! an optional dependency-builder stage that compiles Python packages and
//! installs native libraries, and a runtime stage that receives only the
//! compiled artifacts plus the application source.

pub mod variant;

pub use variant::Variant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Python minor version the pipeline targets
pub const PYTHON_VERSION: &str = "3.10";

/// Default service port
pub const DEFAULT_PORT: u16 = 5000;

/// Well-known builder output directory for installed Python packages
pub fn site_packages_dir(python: &str) -> String {
    format!("/usr/local/lib/python{}/site-packages", python)
}

/// Well-known builder output directory for installed entry-point binaries
pub const BIN_DIR: &str = "/usr/local/bin";

/// Well-known builder output directory for native shared libraries
pub const LIB_DIR: &str = "/usr/lib";

/// The WSGI application as seen by the pipeline: an opaque callable inside a
/// module, plus the source tree that ships into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSpec {
    /// Module holding the WSGI callable, e.g. `app`
    pub module: String,
    /// Attribute name of the callable, e.g. `app`
    pub callable: String,
    /// Application source tree copied into the image
    pub source_dir: PathBuf,
}

impl Default for AppSpec {
    fn default() -> Self {
        Self {
            module: "app".to_string(),
            callable: "app".to_string(),
            source_dir: PathBuf::from("."),
        }
    }
}

impl AppSpec {
    /// The `module:callable` target handed to the WSGI server
    pub fn wsgi_target(&self) -> String {
        format!("{}:{}", self.module, self.callable)
    }
}

/// How the service resolves the port it binds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortBinding {
    /// Port fixed at image build time
    Fixed { port: u16 },
    /// Port read from an environment variable at container start
    FromEnv { var: String, default: u16 },
}

impl PortBinding {
    /// The port declared in image metadata (`EXPOSE`)
    pub fn declared(&self) -> u16 {
        match self {
            PortBinding::Fixed { port } => *port,
            PortBinding::FromEnv { default, .. } => *default,
        }
    }
}

/// Container start command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", content = "value", rename_all = "snake_case")]
pub enum Command {
    /// Exec form, no shell involved
    Exec(Vec<String>),
    /// Shell form, required when the command expands environment variables
    Shell(String),
}

impl Command {
    /// Program name of the invoked process
    pub fn program(&self) -> Option<&str> {
        match self {
            Command::Exec(argv) => argv.first().map(String::as_str),
            Command::Shell(line) => line.split_whitespace().next(),
        }
    }

    /// Flat text rendering, used for port extraction and display
    pub fn display_line(&self) -> String {
        match self {
            Command::Exec(argv) => argv.join(" "),
            Command::Shell(line) => line.clone(),
        }
    }
}

/// Copy of a builder artifact into the runtime stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    /// Stage the artifact comes from
    pub from_stage: String,
    /// Source path inside that stage
    pub from: String,
    /// Destination path in the runtime filesystem
    pub to: String,
}

/// Dependency builder stage: installs native libraries and compiles Python
/// packages into fixed, well-known paths. Discarded after the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderStage {
    /// Base image, e.g. `python:3.10-alpine`
    pub base: String,
    /// OS packages installed before compiling dependencies
    pub packages: Vec<String>,
    /// Stage-local environment variables
    pub env: BTreeMap<String, String>,
    /// Manifest file copied into the stage
    pub manifest_path: String,
    /// Dependency compilation commands, executed in order
    pub commands: Vec<String>,
}

/// Runtime stage: the deployable artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStage {
    /// Base image
    pub base: String,
    /// OS packages installed directly in the runtime stage (single-stage only)
    pub packages: Vec<String>,
    /// Artifacts copied from the builder stage
    pub copies: Vec<CopySpec>,
    /// Manifest copied into the runtime stage (single-stage only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    /// Dependency installation run inside the runtime stage (single-stage only)
    pub setup_commands: Vec<String>,
    /// Working directory the application runs from
    pub workdir: String,
    /// Application source overlay, copied last
    pub app_source: String,
    /// Environment variables baked into the image
    pub env: BTreeMap<String, String>,
    /// Declared network port
    pub port: Option<PortBinding>,
    /// Process entry point
    pub command: Option<Command>,
}

/// Plan identification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Image name, e.g. the application name
    pub name: String,
    /// Variant this plan was derived from
    pub variant: String,
    /// Python version tag baked into the base images
    pub python: String,
}

/// A complete container build plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub metadata: PlanMetadata,
    /// Dependency builder stage; absent for single-stage plans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderStage>,
    pub runtime: RuntimeStage,
}

impl BuildPlan {
    /// Whether this plan builds in two phases
    pub fn is_multi_stage(&self) -> bool {
        self.builder.is_some()
    }

    /// Content digest of the plan.
    ///
    /// Rebuilding with an unchanged manifest and base image tag yields the
    /// same plan and therefore the same digest, which is how rebuild
    /// idempotence is checked.
    pub fn digest(&self) -> anyhow::Result<String> {
        let encoded = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Serialize the plan to YAML
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        use anyhow::Context;
        serde_yaml::to_string(self).context("Failed to serialize build plan to YAML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_spec_wsgi_target() {
        let app = AppSpec::default();
        assert_eq!(app.wsgi_target(), "app:app");

        let custom = AppSpec {
            module: "service".to_string(),
            callable: "application".to_string(),
            source_dir: PathBuf::from("svc"),
        };
        assert_eq!(custom.wsgi_target(), "service:application");
    }

    #[test]
    fn test_port_binding_declared() {
        assert_eq!(PortBinding::Fixed { port: 5000 }.declared(), 5000);
        assert_eq!(
            PortBinding::FromEnv {
                var: "PORT".to_string(),
                default: 5000
            }
            .declared(),
            5000
        );
    }

    #[test]
    fn test_command_program() {
        let exec = Command::Exec(vec!["gunicorn".to_string(), "app:app".to_string()]);
        assert_eq!(exec.program(), Some("gunicorn"));

        let shell = Command::Shell("gunicorn --bind 0.0.0.0:$PORT app:app".to_string());
        assert_eq!(shell.program(), Some("gunicorn"));
    }

    #[test]
    fn test_digest_is_stable() {
        let plan = BuildPlan::for_variant(Variant::AlpineFull, &AppSpec::default(), "requirements.txt");
        let again = BuildPlan::for_variant(Variant::AlpineFull, &AppSpec::default(), "requirements.txt");
        assert_eq!(plan.digest().unwrap(), again.digest().unwrap());
    }

    #[test]
    fn test_digest_changes_with_variant() {
        let app = AppSpec::default();
        let full = BuildPlan::for_variant(Variant::AlpineFull, &app, "requirements.txt");
        let minimal = BuildPlan::for_variant(Variant::AlpineMinimal, &app, "requirements.txt");
        assert_ne!(full.digest().unwrap(), minimal.digest().unwrap());
    }

    #[test]
    fn test_plan_yaml_round_trip() {
        let plan = BuildPlan::for_variant(Variant::SlimMultiStage, &AppSpec::default(), "requirements.txt");
        let yaml = plan.to_yaml().unwrap();
        let parsed: BuildPlan = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(plan, parsed);
    }
}
