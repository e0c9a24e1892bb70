//! Dependency manifest parsing
//!
//! A manifest lists one requirement per line (`name==version` pairs, or a
//! bare name when any version is acceptable). Blank lines and `#` comments
//! are skipped, trailing `\` continues a requirement on the next line.
//! Malformed lines are fatal and reported with their line number.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Packages known to carry native extensions. Compiling any of these from
/// source requires OS-level headers and shared libraries in the build stage.
const NATIVE_EXTENSION_PACKAGES: &[&str] = &[
    "numpy",
    "scipy",
    "pandas",
    "pillow",
    "opencv-python",
    "opencv-python-headless",
    "opencv-contrib-python",
    "deepface",
    "tensorflow",
    "keras",
    "dlib",
    "matplotlib",
    "lxml",
    "cryptography",
    "psycopg2",
    "pyyaml",
];

/// Manifest parsing errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A line did not parse as a requirement
    #[error("Malformed requirement at line {line}: '{content}'")]
    Malformed { line: usize, content: String },
}

/// A single dependency requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Normalized package name (lowercase, underscores folded to hyphens)
    pub name: String,
    /// Version specifier as written, e.g. `==2.0.1` or `>=1.21,<2`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
}

impl Requirement {
    /// Parse a single (already comment-stripped, non-empty) requirement line
    pub fn parse(line: &str) -> Option<Self> {
        let re = Regex::new(
            r"^(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)(?:\[[A-Za-z0-9,._ -]*\])?\s*(?P<spec>(?:==|>=|<=|~=|!=|>|<)\s*[^\s;]+(?:\s*,\s*(?:==|>=|<=|~=|!=|>|<)\s*[^\s;]+)*)?\s*$",
        )
        .expect("valid regex");

        let caps = re.captures(line.trim())?;
        let name = normalize_name(caps.name("name")?.as_str());
        let specifier = caps
            .name("spec")
            .map(|m| m.as_str().split_whitespace().collect::<String>());

        Some(Self { name, specifier })
    }

    /// Exact pinned version, if the specifier is a plain `==` pin
    pub fn pinned_version(&self) -> Option<&str> {
        let spec = self.specifier.as_deref()?;
        spec.strip_prefix("==").filter(|v| !v.contains(','))
    }

    /// Whether this package is known to compile native extensions
    pub fn has_native_extension(&self) -> bool {
        NATIVE_EXTENSION_PACKAGES.contains(&self.name.as_str())
    }
}

/// Normalize a package name per the PyPI convention
fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

/// A parsed dependency manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub requirements: Vec<Requirement>,
}

impl Manifest {
    /// Parse manifest text
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let mut requirements = Vec::new();
        let mut pending = String::new();
        let mut pending_start = 0usize;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let stripped = strip_comment(raw);

            if let Some(head) = stripped.strip_suffix('\\') {
                if pending.is_empty() {
                    pending_start = line_no;
                }
                pending.push_str(head.trim_end());
                continue;
            }

            let (logical, start) = if pending.is_empty() {
                (stripped.trim().to_string(), line_no)
            } else {
                pending.push_str(stripped.trim());
                (std::mem::take(&mut pending), pending_start)
            };

            if logical.is_empty() {
                continue;
            }

            match Requirement::parse(&logical) {
                Some(req) => requirements.push(req),
                None => {
                    return Err(ManifestError::Malformed {
                        line: start,
                        content: logical,
                    })
                }
            }
        }

        if !pending.is_empty() {
            // Trailing continuation with no following line
            return Err(ManifestError::Malformed {
                line: pending_start,
                content: pending,
            });
        }

        Ok(Self { requirements })
    }

    /// Load and parse a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Whether any requirement needs OS-level native libraries to compile
    pub fn needs_native_libraries(&self) -> bool {
        self.requirements.iter().any(Requirement::has_native_extension)
    }

    /// Requirements known to carry native extensions
    pub fn native_requirements(&self) -> Vec<&Requirement> {
        self.requirements
            .iter()
            .filter(|r| r.has_native_extension())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }
}

/// Strip a `#` comment, honoring only `#` at line start or preceded by whitespace
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(pos) => &line[..pos],
        None => line,
    }
}
