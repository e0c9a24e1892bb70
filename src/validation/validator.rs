use crate::dockerfile;
use crate::manifest::Manifest;
use crate::plan::BuildPlan;
use crate::validation::rules::{
    ArtifactCopyRule, EntryPointMismatchLint, Finding, LintRule, MissingFlaskEnvLint,
    NativeHeadersRule, PortConsistencyRule, RequiredFieldsRule, RuntimeToolchainRule,
    SingleStagePrebuiltLint, ValidationRule,
};
use anyhow::Result;

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
    lints: Vec<Box<dyn LintRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self {
            rules,
            lints: vec![],
        }
    }

    /// Run every hard rule; the first violation fails validation
    pub fn validate(&self, plan: &BuildPlan, manifest: &Manifest) -> Result<()> {
        for rule in &self.rules {
            if let Err(e) = rule.validate(plan, manifest) {
                anyhow::bail!("[{}] {}", rule.name(), e);
            }
        }
        Ok(())
    }

    /// Collect warning-level findings from every lint
    pub fn lint(&self, plan: &BuildPlan, manifest: &Manifest) -> Vec<Finding> {
        self.lints
            .iter()
            .flat_map(|lint| lint.check(plan, manifest))
            .collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredFieldsRule),
                Box::new(ArtifactCopyRule),
                Box::new(RuntimeToolchainRule),
                Box::new(PortConsistencyRule),
                Box::new(NativeHeadersRule),
            ],
            lints: vec![
                Box::new(EntryPointMismatchLint),
                Box::new(MissingFlaskEnvLint),
                Box::new(SingleStagePrebuiltLint),
            ],
        }
    }
}

/// Lint externally supplied Dockerfile text.
///
/// Reports redundant duplicate directives (harmless, the last occurrence
/// wins) and a declared `EXPOSE` port that no `CMD` actually binds.
pub fn lint_dockerfile(content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for directive in dockerfile::duplicate_directives(content) {
        findings.push(Finding {
            rule: "DuplicateDirective",
            message: format!(
                "{} is declared more than once; the last occurrence overrides the others",
                directive
            ),
        });
    }

    let exposed = dockerfile::parse_expose(content);
    let cmds = dockerfile::parse_cmd(content);
    if let (Some(port), Some(cmd)) = (exposed.first(), cmds.last()) {
        match dockerfile::parse_bound_port(cmd) {
            Some(dockerfile::BoundPort::Fixed(actual)) if actual != *port => {
                findings.push(Finding {
                    rule: "PortConsistency",
                    message: format!(
                        "EXPOSE declares {} but the command binds {}",
                        port, actual
                    ),
                });
            }
            None => {
                findings.push(Finding {
                    rule: "PortConsistency",
                    message: format!(
                        "EXPOSE declares {} but the command binds no address",
                        port
                    ),
                });
            }
            _ => {}
        }
    }

    let env = dockerfile::parse_env(content);
    if let (Some(flask_app), Some(cmd)) = (env.get("FLASK_APP"), cmds.last()) {
        if cmd.contains("gunicorn") {
            findings.push(Finding {
                rule: "EntryPointMismatch",
                message: format!(
                    "FLASK_APP={} declares a Flask entry point, but CMD runs gunicorn",
                    flask_app
                ),
            });
        }
    }

    findings
}
