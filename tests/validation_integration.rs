//! Validation integration tests
//!
//! Run the full validator over generated plans with realistic dependency
//! manifests, including the native-extension manifest that the reduced
//! Alpine header set cannot compile.

use gantry::manifest::Manifest;
use gantry::plan::{AppSpec, BuildPlan, Variant};
use gantry::validation::Validator;

const WEB_MANIFEST: &str = "\
flask==2.2.2
gunicorn==20.1.0
requests>=2.28
";

const VISION_MANIFEST: &str = "\
flask==2.2.2
gunicorn==20.1.0
deepface==0.0.75
numpy>=1.23
Pillow
";

fn plan_for(variant: Variant) -> BuildPlan {
    BuildPlan::for_variant(variant, &AppSpec::default(), "requirements.txt")
}

#[test]
fn test_pure_python_manifest_passes_everywhere() {
    let manifest = Manifest::parse(WEB_MANIFEST).unwrap();
    let validator = Validator::new();
    for variant in Variant::ALL {
        let plan = plan_for(variant);
        assert!(
            validator.validate(&plan, &manifest).is_ok(),
            "variant {} rejected a pure-python manifest",
            variant.id()
        );
    }
}

#[test]
fn test_native_manifest_passes_on_full_header_variants() {
    let manifest = Manifest::parse(VISION_MANIFEST).unwrap();
    let validator = Validator::new();
    for variant in [Variant::AlpineFull, Variant::SlimMultiStage, Variant::SlimSingleStage] {
        let plan = plan_for(variant);
        assert!(
            validator.validate(&plan, &manifest).is_ok(),
            "variant {} rejected the native manifest",
            variant.id()
        );
    }
}

#[test]
fn test_native_manifest_fails_on_minimal_alpine() {
    let manifest = Manifest::parse(VISION_MANIFEST).unwrap();
    let plan = plan_for(Variant::AlpineMinimal);
    let err = Validator::new()
        .validate(&plan, &manifest)
        .expect_err("reduced header set must be rejected");
    let message = format!("{:#}", err);
    assert!(message.contains("NativeHeaders"), "got: {}", message);
}

#[test]
fn test_entry_point_mismatch_is_a_lint_not_an_error() {
    let manifest = Manifest::parse(WEB_MANIFEST).unwrap();
    let validator = Validator::new();
    for variant in Variant::ALL {
        let plan = plan_for(variant);
        assert!(validator.validate(&plan, &manifest).is_ok());
        let findings = validator.lint(&plan, &manifest);
        assert!(
            findings.iter().any(|f| f.rule == "EntryPointMismatch"),
            "variant {} should surface the FLASK_APP/gunicorn mismatch",
            variant.id()
        );
    }
}

#[test]
fn test_manifest_native_detection() {
    let web = Manifest::parse(WEB_MANIFEST).unwrap();
    assert!(!web.needs_native_libraries());

    let vision = Manifest::parse(VISION_MANIFEST).unwrap();
    assert!(vision.needs_native_libraries());
    let native: Vec<_> = vision
        .native_requirements()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert!(native.contains(&"deepface"));
    assert!(native.contains(&"numpy"));
    assert!(native.contains(&"pillow"));
}

#[test]
fn test_manifest_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requirements.txt");
    std::fs::write(&path, VISION_MANIFEST).unwrap();

    let manifest = Manifest::load(&path).unwrap();
    assert_eq!(manifest.requirements.len(), 5);
    assert!(manifest.needs_native_libraries());
}

#[test]
fn test_validator_accepts_all_generated_plans_structurally() {
    // Rules about stage layout and artifact copies hold for every variant
    // the catalog can produce, independent of the manifest contents.
    let manifest = Manifest::parse("flask\n").unwrap();
    let validator = Validator::new();
    for variant in Variant::ALL {
        let plan = plan_for(variant);
        validator
            .validate(&plan, &manifest)
            .unwrap_or_else(|e| panic!("variant {}: {:#}", variant.id(), e));
    }
}
