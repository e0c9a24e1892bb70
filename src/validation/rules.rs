//! Plan invariants and lints
//!
//! Hard rules make a plan unbuildable when violated. Lints report latent
//! problems (inherited inconsistencies, likely build failures) without
//! failing validation.

use crate::dockerfile::{self, BoundPort};
use crate::manifest::Manifest;
use crate::plan::{site_packages_dir, BuildPlan, PortBinding, BIN_DIR, LIB_DIR};
use anyhow::Result;
use std::path::Path;

/// Packages that only belong in a builder stage. The runtime image must
/// never retain a compiler toolchain.
const TOOLCHAIN_PACKAGES: &[&str] = &[
    "build-base",
    "build-essential",
    "gcc",
    "g++",
    "make",
    "cmake",
    "musl-dev",
    "linux-headers",
];

fn is_toolchain_package(pkg: &str) -> bool {
    TOOLCHAIN_PACKAGES.contains(&pkg) || pkg.ends_with("-dev")
}

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, plan: &BuildPlan, manifest: &Manifest) -> Result<()>;
}

/// A non-fatal observation about a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule: &'static str,
    pub message: String,
}

pub trait LintRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, plan: &BuildPlan, manifest: &Manifest) -> Vec<Finding>;
}

pub struct RequiredFieldsRule;

impl ValidationRule for RequiredFieldsRule {
    fn name(&self) -> &'static str {
        "RequiredFields"
    }

    fn validate(&self, plan: &BuildPlan, _manifest: &Manifest) -> Result<()> {
        if plan.metadata.name.is_empty() {
            anyhow::bail!("Plan name cannot be empty");
        }
        if plan.runtime.base.is_empty() {
            anyhow::bail!("Runtime base image cannot be empty");
        }
        if let Some(builder) = &plan.builder {
            if builder.base.is_empty() {
                anyhow::bail!("Builder base image cannot be empty");
            }
            if builder.commands.is_empty() {
                anyhow::bail!("Builder stage declares no dependency compilation commands");
            }
        }
        if plan.runtime.command.is_none() {
            anyhow::bail!("Runtime command cannot be empty");
        }
        if plan.runtime.port.is_none() {
            anyhow::bail!("Runtime port must be declared");
        }
        Ok(())
    }
}

/// The runtime stage receives exactly the compiled artifact directories:
/// site-packages, binaries and shared libraries. Copying anything else would
/// drag builder-only content into the deployable image.
pub struct ArtifactCopyRule;

impl ValidationRule for ArtifactCopyRule {
    fn name(&self) -> &'static str {
        "ArtifactCopy"
    }

    fn validate(&self, plan: &BuildPlan, _manifest: &Manifest) -> Result<()> {
        if !plan.runtime.copies.is_empty() && plan.builder.is_none() {
            anyhow::bail!("Runtime copies from a builder stage, but no builder stage exists");
        }

        let site_packages = site_packages_dir(&plan.metadata.python);
        let allowed = [site_packages.as_str(), BIN_DIR, LIB_DIR];

        for (i, copy) in plan.runtime.copies.iter().enumerate() {
            if copy.from_stage != "builder" {
                anyhow::bail!(
                    "Runtime copy[{}] references unknown stage '{}'",
                    i,
                    copy.from_stage
                );
            }
            if copy.from == "/" {
                anyhow::bail!(
                    "Runtime copy[{}] copies the whole builder filesystem; only \
                     site-packages, bin and lib may be copied",
                    i
                );
            }
            // Component-wise comparison, so /usr/libexec is not /usr/lib
            if !allowed
                .iter()
                .any(|prefix| Path::new(&copy.to).starts_with(prefix))
            {
                anyhow::bail!(
                    "Runtime copy[{}] targets '{}', outside the allowed artifact \
                     directories ({})",
                    i,
                    copy.to,
                    allowed.join(", ")
                );
            }
        }
        Ok(())
    }
}

/// No compiler toolchain may be installed in the runtime stage
pub struct RuntimeToolchainRule;

impl ValidationRule for RuntimeToolchainRule {
    fn name(&self) -> &'static str {
        "RuntimeToolchain"
    }

    fn validate(&self, plan: &BuildPlan, _manifest: &Manifest) -> Result<()> {
        let offending: Vec<&str> = plan
            .runtime
            .packages
            .iter()
            .filter(|p| is_toolchain_package(p))
            .map(String::as_str)
            .collect();

        if !offending.is_empty() {
            anyhow::bail!(
                "Runtime stage installs build-only toolchain packages: {}",
                offending.join(", ")
            );
        }
        Ok(())
    }
}

/// The declared port must match the port the start command actually binds
pub struct PortConsistencyRule;

impl ValidationRule for PortConsistencyRule {
    fn name(&self) -> &'static str {
        "PortConsistency"
    }

    fn validate(&self, plan: &BuildPlan, _manifest: &Manifest) -> Result<()> {
        let (port, command) = match (&plan.runtime.port, &plan.runtime.command) {
            (Some(port), Some(command)) => (port, command),
            // RequiredFields reports the missing piece
            _ => return Ok(()),
        };

        let bound = dockerfile::parse_bound_port(&command.display_line());
        match (port, bound) {
            (PortBinding::Fixed { port }, Some(BoundPort::Fixed(actual))) => {
                if *port != actual {
                    anyhow::bail!(
                        "Declared port {} does not match the port the command binds ({})",
                        port,
                        actual
                    );
                }
            }
            (PortBinding::FromEnv { var, .. }, Some(BoundPort::Env(actual))) => {
                if *var != actual {
                    anyhow::bail!(
                        "Port is declared from ${} but the command reads ${}",
                        var,
                        actual
                    );
                }
            }
            (PortBinding::Fixed { port }, Some(BoundPort::Env(var))) => {
                anyhow::bail!(
                    "Port {} is declared fixed but the command binds ${}",
                    port,
                    var
                );
            }
            (PortBinding::FromEnv { var, .. }, Some(BoundPort::Fixed(port))) => {
                anyhow::bail!(
                    "Port is declared from ${} but the command binds a fixed {}",
                    var,
                    port
                );
            }
            (_, None) => {
                anyhow::bail!(
                    "Start command does not bind an address; declared port is unverifiable"
                );
            }
        }
        Ok(())
    }
}

/// Header packages required to compile the image-processing dependency stack
/// from source, per base-image family.
const ALPINE_REQUIRED_HEADERS: &[&str] = &[
    "libx11-dev",
    "libxext-dev",
    "libxrender-dev",
    "libsm-dev",
    "libice-dev",
    "glib-dev",
    "jpeg-dev",
    "zlib-dev",
];

const SLIM_REQUIRED_HEADERS: &[&str] = &["libx11-dev", "libglib2.0-dev", "libxrender-dev"];

/// Compiling native extensions from source needs the native header set in
/// the builder stage; with headers missing, the pip compile step fails the
/// whole build. Flagging it here keeps that failure from being discovered
/// minutes into a build.
pub struct NativeHeadersRule;

impl ValidationRule for NativeHeadersRule {
    fn name(&self) -> &'static str {
        "NativeHeaders"
    }

    fn validate(&self, plan: &BuildPlan, manifest: &Manifest) -> Result<()> {
        let builder = match &plan.builder {
            Some(builder) => builder,
            None => return Ok(()),
        };
        let compiles_from_source = builder.commands.iter().any(|c| c.contains("--no-binary"));
        if !compiles_from_source || !manifest.needs_native_libraries() {
            return Ok(());
        }

        let required: &[&str] = if builder.base.contains("alpine") {
            ALPINE_REQUIRED_HEADERS
        } else {
            SLIM_REQUIRED_HEADERS
        };

        let missing: Vec<&str> = required
            .iter()
            .filter(|pkg| !builder.packages.iter().any(|p| p == *pkg))
            .copied()
            .collect();

        if !missing.is_empty() {
            let native: Vec<&str> = manifest
                .native_requirements()
                .iter()
                .map(|r| r.name.as_str())
                .collect();
            anyhow::bail!(
                "Manifest requires native extensions ({}) compiled from source, but the \
                 builder stage lacks headers: {}",
                native.join(", "),
                missing.join(", ")
            );
        }
        Ok(())
    }
}

/// `FLASK_APP` names a framework entry point while the process actually
/// started is a generic WSGI server target. Inherited from the source
/// definitions; harmless at runtime but misleading.
pub struct EntryPointMismatchLint;

impl LintRule for EntryPointMismatchLint {
    fn name(&self) -> &'static str {
        "EntryPointMismatch"
    }

    fn check(&self, plan: &BuildPlan, _manifest: &Manifest) -> Vec<Finding> {
        let flask_app = match plan.runtime.env.get("FLASK_APP") {
            Some(value) => value,
            None => return vec![],
        };
        let command = match &plan.runtime.command {
            Some(command) => command,
            None => return vec![],
        };

        if command.program() == Some("gunicorn") {
            return vec![Finding {
                rule: self.name(),
                message: format!(
                    "FLASK_APP={} declares a Flask entry point, but the container runs \
                     gunicorn against '{}'; the variable is not authoritative",
                    flask_app,
                    command
                        .display_line()
                        .split_whitespace()
                        .last()
                        .unwrap_or_default()
                ),
            }];
        }
        vec![]
    }
}

/// The application reads `FLASK_ENV` at startup to pick its operating mode
pub struct MissingFlaskEnvLint;

impl LintRule for MissingFlaskEnvLint {
    fn name(&self) -> &'static str {
        "MissingFlaskEnv"
    }

    fn check(&self, plan: &BuildPlan, _manifest: &Manifest) -> Vec<Finding> {
        if plan.runtime.env.contains_key("FLASK_ENV") {
            return vec![];
        }
        vec![Finding {
            rule: self.name(),
            message: "FLASK_ENV is not baked into the image; the application falls back to \
                      its default operating mode"
                .to_string(),
        }]
    }
}

/// A single-stage plan installs dependencies with no native toolchain; that
/// only works while every native requirement ships a prebuilt wheel
pub struct SingleStagePrebuiltLint;

impl LintRule for SingleStagePrebuiltLint {
    fn name(&self) -> &'static str {
        "SingleStagePrebuilt"
    }

    fn check(&self, plan: &BuildPlan, manifest: &Manifest) -> Vec<Finding> {
        if plan.builder.is_some() || !manifest.needs_native_libraries() {
            return vec![];
        }
        let native: Vec<&str> = manifest
            .native_requirements()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        vec![Finding {
            rule: self.name(),
            message: format!(
                "Single-stage build relies on prebuilt wheels for native packages: {}",
                native.join(", ")
            ),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AppSpec, CopySpec, Variant};

    fn plan(variant: Variant) -> BuildPlan {
        BuildPlan::for_variant(variant, &AppSpec::default(), "requirements.txt")
    }

    fn native_manifest() -> Manifest {
        Manifest::parse("flask==2.0.1\ngunicorn==20.1.0\ndeepface==0.0.79\npillow==9.5.0\n")
            .unwrap()
    }

    fn pure_manifest() -> Manifest {
        Manifest::parse("flask==2.0.1\ngunicorn==20.1.0\n").unwrap()
    }

    #[test]
    fn test_required_fields_valid_for_all_variants() {
        let rule = RequiredFieldsRule;
        for variant in Variant::ALL {
            assert!(rule.validate(&plan(variant), &pure_manifest()).is_ok());
        }
    }

    #[test]
    fn test_required_fields_missing_command() {
        let mut p = plan(Variant::AlpineFull);
        p.runtime.command = None;
        assert!(RequiredFieldsRule.validate(&p, &pure_manifest()).is_err());
    }

    #[test]
    fn test_artifact_copy_valid() {
        assert!(ArtifactCopyRule
            .validate(&plan(Variant::AlpineFull), &pure_manifest())
            .is_ok());
    }

    #[test]
    fn test_artifact_copy_rejects_whole_filesystem() {
        let mut p = plan(Variant::AlpineFull);
        p.runtime.copies.push(CopySpec {
            from_stage: "builder".to_string(),
            from: "/".to_string(),
            to: "/".to_string(),
        });
        assert!(ArtifactCopyRule.validate(&p, &pure_manifest()).is_err());
    }

    #[test]
    fn test_artifact_copy_rejects_stray_target() {
        let mut p = plan(Variant::AlpineFull);
        p.runtime.copies.push(CopySpec {
            from_stage: "builder".to_string(),
            from: "/root/.cache/pip".to_string(),
            to: "/root/.cache/pip".to_string(),
        });
        let err = ArtifactCopyRule
            .validate(&p, &pure_manifest())
            .unwrap_err()
            .to_string();
        assert!(err.contains("/root/.cache/pip"));
    }

    #[test]
    fn test_artifact_copy_rejects_sibling_of_artifact_directory() {
        for target in ["/usr/libexec", "/usr/local/bin-extra"] {
            let mut p = plan(Variant::AlpineFull);
            p.runtime.copies.push(CopySpec {
                from_stage: "builder".to_string(),
                from: target.to_string(),
                to: target.to_string(),
            });
            let err = ArtifactCopyRule
                .validate(&p, &pure_manifest())
                .unwrap_err()
                .to_string();
            assert!(err.contains(target));
        }
    }

    #[test]
    fn test_artifact_copy_accepts_subdirectories() {
        let mut p = plan(Variant::AlpineFull);
        p.runtime.copies.push(CopySpec {
            from_stage: "builder".to_string(),
            from: "/usr/lib/x86_64-linux-gnu".to_string(),
            to: "/usr/lib/x86_64-linux-gnu".to_string(),
        });
        assert!(ArtifactCopyRule.validate(&p, &pure_manifest()).is_ok());
    }

    #[test]
    fn test_runtime_toolchain_rejected() {
        let mut p = plan(Variant::SlimSingleStage);
        p.runtime.packages.push("build-essential".to_string());
        assert!(RuntimeToolchainRule.validate(&p, &pure_manifest()).is_err());

        let mut p = plan(Variant::SlimSingleStage);
        p.runtime.packages.push("libx11-dev".to_string());
        assert!(RuntimeToolchainRule.validate(&p, &pure_manifest()).is_err());
    }

    #[test]
    fn test_runtime_shared_libs_allowed() {
        let mut p = plan(Variant::SlimSingleStage);
        p.runtime.packages.push("libglib2.0-0".to_string());
        assert!(RuntimeToolchainRule.validate(&p, &pure_manifest()).is_ok());
    }

    #[test]
    fn test_port_consistency_valid_for_all_variants() {
        for variant in Variant::ALL {
            assert!(PortConsistencyRule
                .validate(&plan(variant), &pure_manifest())
                .is_ok());
        }
    }

    #[test]
    fn test_port_consistency_mismatch() {
        let mut p = plan(Variant::AlpineFull);
        p.runtime.port = Some(PortBinding::Fixed { port: 8080 });
        let err = PortConsistencyRule
            .validate(&p, &pure_manifest())
            .unwrap_err()
            .to_string();
        assert!(err.contains("8080"));
        assert!(err.contains("5000"));
    }

    #[test]
    fn test_native_headers_minimal_variant_fails() {
        // Expected outcome: the minimal native-library set cannot compile the
        // image-processing stack from source.
        let err = NativeHeadersRule
            .validate(&plan(Variant::AlpineMinimal), &native_manifest())
            .unwrap_err()
            .to_string();
        assert!(err.contains("deepface"));
        assert!(err.contains("libxext-dev"));
    }

    #[test]
    fn test_native_headers_full_variant_passes() {
        assert!(NativeHeadersRule
            .validate(&plan(Variant::AlpineFull), &native_manifest())
            .is_ok());
    }

    #[test]
    fn test_native_headers_skipped_without_native_requirements() {
        assert!(NativeHeadersRule
            .validate(&plan(Variant::AlpineMinimal), &pure_manifest())
            .is_ok());
    }

    #[test]
    fn test_native_headers_skipped_for_prebuilt_wheels() {
        assert!(NativeHeadersRule
            .validate(&plan(Variant::SlimSingleStage), &native_manifest())
            .is_ok());
    }

    #[test]
    fn test_entry_point_mismatch_reported() {
        let findings = EntryPointMismatchLint.check(&plan(Variant::AlpineFull), &pure_manifest());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("FLASK_APP=app.py"));
        assert!(findings[0].message.contains("app:app"));
    }

    #[test]
    fn test_entry_point_mismatch_silent_without_flask_app() {
        let mut p = plan(Variant::AlpineFull);
        p.runtime.env.remove("FLASK_APP");
        assert!(EntryPointMismatchLint.check(&p, &pure_manifest()).is_empty());
    }

    #[test]
    fn test_missing_flask_env_lint() {
        let mut p = plan(Variant::AlpineFull);
        assert!(MissingFlaskEnvLint.check(&p, &pure_manifest()).is_empty());
        p.runtime.env.remove("FLASK_ENV");
        assert_eq!(MissingFlaskEnvLint.check(&p, &pure_manifest()).len(), 1);
    }

    #[test]
    fn test_single_stage_prebuilt_lint() {
        let findings =
            SingleStagePrebuiltLint.check(&plan(Variant::SlimSingleStage), &native_manifest());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("deepface"));

        assert!(SingleStagePrebuiltLint
            .check(&plan(Variant::SlimMultiStage), &native_manifest())
            .is_empty());
    }
}
