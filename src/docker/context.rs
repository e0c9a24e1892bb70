//! Build context assembly
//!
//! Packs the application source tree plus the rendered Dockerfile into a
//! gzipped tar archive the Docker daemon accepts as a build context.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use ignore::WalkBuilder;
use std::path::Path;
use tar::Builder;

/// Canonical name of the injected build definition
pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Assemble a build context from `source_dir` with `dockerfile` injected as
/// the build definition. Ignore rules (`.gitignore`, `.dockerignore`) are
/// honored; a Dockerfile already present in the tree is superseded by the
/// rendered one.
pub fn build_context(source_dir: &Path, dockerfile: &str) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(dockerfile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    archive
        .append_data(&mut header, DOCKERFILE_NAME, dockerfile.as_bytes())
        .context("Failed to add Dockerfile to build context")?;

    let walker = WalkBuilder::new(source_dir)
        .hidden(false)
        .add_custom_ignore_filename(".dockerignore")
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    for entry in walker {
        let entry = entry.context("Failed to walk application source tree")?;
        let path = entry.path();
        if path == source_dir {
            continue;
        }
        let rel = path
            .strip_prefix(source_dir)
            .context("Walked entry outside the source tree")?;
        if rel == Path::new(DOCKERFILE_NAME) {
            continue;
        }

        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            archive
                .append_dir(rel, path)
                .with_context(|| format!("Failed to add directory {}", rel.display()))?;
        } else {
            archive
                .append_path_with_name(path, rel)
                .with_context(|| format!("Failed to add file {}", rel.display()))?;
        }
    }

    let encoder = archive
        .into_inner()
        .context("Failed to finish build context archive")?;
    encoder
        .finish()
        .context("Failed to compress build context")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use tar::Archive;

    fn entry_names(context: &[u8]) -> Vec<String> {
        let mut archive = Archive::new(GzDecoder::new(context));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_context_contains_dockerfile_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "app = object()\n").unwrap();
        fs::write(dir.path().join("requirements.txt"), "flask==2.0.1\n").unwrap();
        fs::create_dir(dir.path().join("utils")).unwrap();
        fs::write(dir.path().join("utils/logger.py"), "pass\n").unwrap();

        let context = build_context(dir.path(), "FROM python:3.10-slim\n").unwrap();
        let names = entry_names(&context);

        assert!(names.contains(&"Dockerfile".to_string()));
        assert!(names.contains(&"app.py".to_string()));
        assert!(names.contains(&"requirements.txt".to_string()));
        assert!(names.contains(&"utils/logger.py".to_string()));
    }

    #[test]
    fn test_rendered_dockerfile_supersedes_existing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        fs::write(dir.path().join("app.py"), "app = object()\n").unwrap();

        let rendered = "FROM python:3.10-alpine\n";
        let context = build_context(dir.path(), rendered).unwrap();

        let mut archive = Archive::new(GzDecoder::new(context.as_slice()));
        let mut dockerfiles = 0;
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap() == Path::new("Dockerfile") {
                dockerfiles += 1;
                let mut content = String::new();
                std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
                assert_eq!(content, rendered);
            }
        }
        assert_eq!(dockerfiles, 1);
    }

    #[test]
    fn test_git_directory_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(dir.path().join("app.py"), "app = object()\n").unwrap();

        let context = build_context(dir.path(), "FROM python:3.10-slim\n").unwrap();
        let names = entry_names(&context);

        assert!(names.contains(&"app.py".to_string()));
        assert!(!names.iter().any(|n| n.starts_with(".git")));
    }
}
