//! Dockerfile rendering
//!
//! Turns a [`BuildPlan`] into Dockerfile text. Rendering is deterministic:
//! the same plan always produces byte-identical output. Each of `EXPOSE` and
//! `CMD` is emitted exactly once, regardless of how the source definitions
//! the plan was derived from declared them.

use crate::plan::{BuildPlan, BuilderStage, Command, RuntimeStage};

/// OS package manager of a base image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apk,
    AptGet,
}

impl PackageManager {
    /// Pick the package manager from the base image name
    pub fn for_base(base: &str) -> Self {
        if base.contains("alpine") {
            PackageManager::Apk
        } else {
            PackageManager::AptGet
        }
    }

    /// Single RUN instruction installing the given packages
    pub fn install_instruction(&self, packages: &[String]) -> String {
        match self {
            PackageManager::Apk => {
                format!("RUN apk add --no-cache {}", packages.join(" "))
            }
            PackageManager::AptGet => format!(
                "RUN apt-get update \\\n    && apt-get install -y --no-install-recommends {} \\\n    && rm -rf /var/lib/apt/lists/*",
                packages.join(" ")
            ),
        }
    }
}

/// Render a build plan to Dockerfile text
pub fn render(plan: &BuildPlan) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# {} image ({} variant, python {})\n",
        plan.metadata.name, plan.metadata.variant, plan.metadata.python
    ));

    if let Some(builder) = &plan.builder {
        render_builder(&mut out, builder);
        out.push('\n');
    }
    render_runtime(&mut out, &plan.runtime);

    out
}

fn render_builder(out: &mut String, builder: &BuilderStage) {
    out.push_str(&format!("FROM {} AS builder\n", builder.base));

    if !builder.packages.is_empty() {
        let pm = PackageManager::for_base(&builder.base);
        out.push('\n');
        out.push_str(&pm.install_instruction(&builder.packages));
        out.push('\n');
    }

    for (key, value) in &builder.env {
        out.push_str(&format!("ENV {}={}\n", key, value));
    }

    out.push_str("\nWORKDIR /build\n");
    out.push_str(&format!("COPY {} .\n", builder.manifest_path));
    for command in &builder.commands {
        out.push_str(&format!("RUN {}\n", command));
    }
}

fn render_runtime(out: &mut String, runtime: &RuntimeStage) {
    out.push_str(&format!("FROM {}\n", runtime.base));

    if !runtime.packages.is_empty() {
        let pm = PackageManager::for_base(&runtime.base);
        out.push('\n');
        out.push_str(&pm.install_instruction(&runtime.packages));
        out.push('\n');
    }

    if !runtime.copies.is_empty() {
        out.push('\n');
        for copy in &runtime.copies {
            out.push_str(&format!(
                "COPY --from={} {} {}\n",
                copy.from_stage, copy.from, copy.to
            ));
        }
    }

    out.push_str(&format!("\nWORKDIR {}\n", runtime.workdir));

    if let Some(manifest) = &runtime.manifest_path {
        out.push_str(&format!("COPY {} .\n", manifest));
    }
    for command in &runtime.setup_commands {
        out.push_str(&format!("RUN {}\n", command));
    }

    out.push_str(&format!("COPY {} {}\n", runtime.app_source, runtime.workdir));

    if !runtime.env.is_empty() {
        out.push('\n');
        for (key, value) in &runtime.env {
            out.push_str(&format!("ENV {}={}\n", key, value));
        }
    }

    if let Some(port) = &runtime.port {
        out.push_str(&format!("\nEXPOSE {}\n", port.declared()));
    }

    if let Some(command) = &runtime.command {
        match command {
            Command::Exec(argv) => {
                let quoted: Vec<String> = argv.iter().map(|a| format!("\"{}\"", a)).collect();
                out.push_str(&format!("CMD [{}]\n", quoted.join(", ")));
            }
            Command::Shell(line) => {
                out.push_str(&format!("CMD {}\n", line));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AppSpec, Variant};

    fn rendered(variant: Variant) -> String {
        render(&BuildPlan::for_variant(
            variant,
            &AppSpec::default(),
            "requirements.txt",
        ))
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(rendered(Variant::AlpineFull), rendered(Variant::AlpineFull));
    }

    #[test]
    fn test_multi_stage_structure() {
        let text = rendered(Variant::AlpineFull);
        assert!(text.contains("FROM python:3.10-alpine AS builder"));
        assert!(text.contains("RUN apk add --no-cache"));
        assert!(text.contains("--no-binary :all:"));
        assert!(text.contains("COPY --from=builder /usr/local/lib/python3.10/site-packages"));
        assert!(text.contains("COPY --from=builder /usr/local/bin /usr/local/bin"));
        assert!(text.contains("COPY --from=builder /usr/lib /usr/lib"));
    }

    #[test]
    fn test_slim_uses_apt_get() {
        let text = rendered(Variant::SlimMultiStage);
        assert!(text.contains("apt-get install -y --no-install-recommends"));
        assert!(text.contains("rm -rf /var/lib/apt/lists/*"));
        assert!(!text.contains("apk add"));
    }

    #[test]
    fn test_single_stage_has_no_builder() {
        let text = rendered(Variant::SlimSingleStage);
        assert!(!text.contains("AS builder"));
        assert!(!text.contains("COPY --from"));
        assert!(text.contains("RUN pip install --no-cache-dir -r requirements.txt"));
    }

    #[test]
    fn test_expose_and_cmd_emitted_exactly_once() {
        for variant in Variant::ALL {
            let text = rendered(variant);
            assert_eq!(text.matches("EXPOSE ").count(), 1, "{}", variant);
            assert_eq!(text.matches("\nCMD ").count(), 1, "{}", variant);
        }
    }

    #[test]
    fn test_fixed_port_uses_exec_form() {
        let text = rendered(Variant::SlimMultiStage);
        assert!(text.contains("CMD [\"gunicorn\", \"--bind\", \"0.0.0.0:5000\", \"app:app\"]"));
    }

    #[test]
    fn test_env_port_uses_shell_form() {
        let text = rendered(Variant::SlimSingleStage);
        assert!(text.contains("CMD gunicorn --bind 0.0.0.0:$PORT app:app"));
        assert!(text.contains("ENV PORT=5000"));
    }

    #[test]
    fn test_env_block_is_sorted() {
        let text = rendered(Variant::AlpineMinimal);
        let flask_app = text.find("ENV FLASK_APP=").unwrap();
        let flask_env = text.find("ENV FLASK_ENV=").unwrap();
        let pythonpath = text.find("ENV PYTHONPATH=").unwrap();
        assert!(flask_app < flask_env && flask_env < pythonpath);
    }

    #[test]
    fn test_package_manager_selection() {
        assert_eq!(
            PackageManager::for_base("python:3.10-alpine"),
            PackageManager::Apk
        );
        assert_eq!(
            PackageManager::for_base("python:3.10-slim"),
            PackageManager::AptGet
        );
    }
}
