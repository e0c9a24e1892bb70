//! Output formatting for multiple formats
//!
//! Formatters for JSON, YAML, Dockerfile and human-readable text. Each
//! formatter implements consistent styling and structure.

use anyhow::{Context, Result};
use std::fmt::Write as _;

use crate::docker::BuildRecord;
use crate::plan::{BuildPlan, Variant};
use crate::render;
use crate::validation::Finding;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
    /// Dockerfile text
    Dockerfile,
}

/// Output formatter for plans, findings and build records
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Creates a new output formatter with the specified format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a build plan according to the configured format
    pub fn format_plan(&self, plan: &BuildPlan) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan)
                .context("Failed to serialize build plan to JSON"),
            OutputFormat::Yaml => plan.to_yaml(),
            OutputFormat::Dockerfile => Ok(render::render(plan)),
            OutputFormat::Human => self.format_plan_human(plan),
        }
    }

    /// Formats lint findings
    pub fn format_findings(&self, findings: &[Finding]) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Dockerfile => {
                let entries: Vec<_> = findings
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "rule": f.rule,
                            "message": f.message,
                        })
                    })
                    .collect();
                serde_json::to_string_pretty(&entries)
                    .context("Failed to serialize findings to JSON")
            }
            OutputFormat::Yaml => {
                let entries: Vec<_> = findings
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "rule": f.rule,
                            "message": f.message,
                        })
                    })
                    .collect();
                serde_yaml::to_string(&entries).context("Failed to serialize findings to YAML")
            }
            OutputFormat::Human => {
                let mut output = String::new();
                if findings.is_empty() {
                    output.push_str("\u{2713} No findings\n");
                } else {
                    writeln!(output, "\u{26A0} {} finding(s):", findings.len())?;
                    for finding in findings {
                        writeln!(output, "  [{}] {}", finding.rule, finding.message)?;
                    }
                }
                Ok(output)
            }
        }
    }

    /// Formats the variant catalog
    pub fn format_variants(&self) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Dockerfile => {
                let entries: Vec<_> = Variant::ALL
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "id": v.id(),
                            "description": v.description(),
                            "multi_stage": v.is_multi_stage(),
                            "builder_packages": v.builder_packages(),
                            "workers": v.workers(),
                        })
                    })
                    .collect();
                serde_json::to_string_pretty(&entries)
                    .context("Failed to serialize variants to JSON")
            }
            OutputFormat::Yaml => {
                let entries: Vec<_> = Variant::ALL
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "id": v.id(),
                            "description": v.description(),
                            "multi_stage": v.is_multi_stage(),
                            "builder_packages": v.builder_packages(),
                            "workers": v.workers(),
                        })
                    })
                    .collect();
                serde_yaml::to_string(&entries).context("Failed to serialize variants to YAML")
            }
            OutputFormat::Human => {
                let mut output = String::new();
                output.push_str("Build Variants\n");
                output.push_str(&"\u{2501}".repeat(42));
                output.push_str("\n\n");
                for variant in Variant::ALL {
                    writeln!(output, "{}", variant.id())?;
                    writeln!(output, "  {}", variant.description())?;
                    writeln!(
                        output,
                        "  Stages:   {}",
                        if variant.is_multi_stage() { "builder + runtime" } else { "runtime only" }
                    )?;
                    let packages = variant.builder_packages();
                    if !packages.is_empty() {
                        writeln!(output, "  Packages: {}", packages.join(", "))?;
                    }
                    if let Some(workers) = variant.workers() {
                        writeln!(output, "  Workers:  {}", workers)?;
                    }
                    output.push('\n');
                }
                Ok(output)
            }
        }
    }

    /// Formats the outcome of an executed build
    pub fn format_build_record(&self, record: &BuildRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Dockerfile => serde_json::to_string_pretty(record)
                .context("Failed to serialize build record to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(record).context("Failed to serialize build record to YAML")
            }
            OutputFormat::Human => {
                let mut output = String::new();
                output.push_str("\u{2713} Image built\n");
                writeln!(output, "  Tag:         {}", record.tag)?;
                if let Some(id) = &record.image_id {
                    writeln!(output, "  Image ID:    {}", id)?;
                }
                writeln!(output, "  Plan digest: {}", record.plan_digest)?;
                let elapsed = record.finished_at - record.started_at;
                writeln!(output, "  Elapsed:     {}ms", elapsed.num_milliseconds())?;
                Ok(output)
            }
        }
    }

    fn format_plan_human(&self, plan: &BuildPlan) -> Result<String> {
        let mut output = String::new();

        output.push_str("Build Plan\n");
        output.push_str(&"\u{2501}".repeat(42));
        output.push_str("\n\n");
        writeln!(output, "Name:    {}", plan.metadata.name)?;
        writeln!(output, "Variant: {}", plan.metadata.variant)?;
        writeln!(output, "Python:  {}", plan.metadata.python)?;
        writeln!(output, "Digest:  {}", plan.digest()?)?;
        output.push('\n');

        if let Some(builder) = &plan.builder {
            output.push_str("Builder Stage:\n");
            writeln!(output, "  Base Image: {}", builder.base)?;
            if !builder.packages.is_empty() {
                writeln!(output, "  Packages:   {}", builder.packages.join(", "))?;
            }
            output.push_str("  Commands:\n");
            for command in &builder.commands {
                writeln!(output, "    - {}", command)?;
            }
            output.push('\n');
        }

        output.push_str("Runtime Stage:\n");
        writeln!(output, "  Base Image: {}", plan.runtime.base)?;
        for copy in &plan.runtime.copies {
            writeln!(output, "  Copy:       {} (from {})", copy.to, copy.from_stage)?;
        }
        for (key, value) in &plan.runtime.env {
            writeln!(output, "  Env:        {}={}", key, value)?;
        }
        if let Some(port) = &plan.runtime.port {
            writeln!(output, "  Port:       {}", port.declared())?;
        }
        if let Some(command) = &plan.runtime.command {
            writeln!(output, "  Command:    {}", command.display_line())?;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::AppSpec;

    fn sample_plan() -> BuildPlan {
        BuildPlan::for_variant(Variant::AlpineFull, &AppSpec::default(), "requirements.txt")
    }

    #[test]
    fn test_json_format_plan() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_plan(&sample_plan())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["metadata"]["variant"], "alpine-full");
        assert_eq!(parsed["builder"]["base"], "python:3.10-alpine");
    }

    #[test]
    fn test_yaml_format_plan() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_plan(&sample_plan())
            .unwrap();
        let parsed: BuildPlan = serde_yaml::from_str(&output).unwrap();
        assert_eq!(parsed, sample_plan());
    }

    #[test]
    fn test_dockerfile_format_plan() {
        let output = OutputFormatter::new(OutputFormat::Dockerfile)
            .format_plan(&sample_plan())
            .unwrap();
        assert!(output.starts_with("# app image"));
        assert!(output.contains("FROM python:3.10-alpine AS builder"));
    }

    #[test]
    fn test_human_format_plan() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_plan(&sample_plan())
            .unwrap();
        assert!(output.contains("Variant: alpine-full"));
        assert!(output.contains("Builder Stage:"));
        assert!(output.contains("Runtime Stage:"));
        assert!(output.contains("Port:       5000"));
    }

    #[test]
    fn test_human_format_findings_empty() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_findings(&[])
            .unwrap();
        assert!(output.contains("No findings"));
    }

    #[test]
    fn test_human_format_findings() {
        let findings = vec![Finding {
            rule: "EntryPointMismatch",
            message: "FLASK_APP is not authoritative".to_string(),
        }];
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_findings(&findings)
            .unwrap();
        assert!(output.contains("[EntryPointMismatch]"));
    }

    #[test]
    fn test_variants_human() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_variants()
            .unwrap();
        for variant in Variant::ALL {
            assert!(output.contains(variant.id()));
        }
    }

    #[test]
    fn test_variants_json() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_variants()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 4);
    }
}
