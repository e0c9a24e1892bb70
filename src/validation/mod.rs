//! Build plan validation

pub mod rules;
pub mod validator;

pub use rules::{Finding, LintRule, ValidationRule};
pub use validator::{lint_dockerfile, Validator};
