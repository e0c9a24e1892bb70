//! Dockerfile parsing utilities
//!
//! Text-level inspection of Dockerfiles, used to verify rendered output and
//! to lint externally supplied build definitions.

use regex::Regex;
use std::collections::BTreeMap;

/// A `FROM` stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Base image the stage derives from
    pub image: String,
    /// Stage name from `AS <name>`, if any
    pub name: Option<String>,
}

/// Port a start command binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundPort {
    /// Port fixed in the command text
    Fixed(u16),
    /// Port taken from an environment variable at container start
    Env(String),
}

/// Parse `EXPOSE` directives, first occurrence of each port wins
pub fn parse_expose(content: &str) -> Vec<u16> {
    let expose_re = Regex::new(r"(?m)^\s*EXPOSE\s+(\d+)").expect("valid regex");

    let mut ports = Vec::new();
    for cap in expose_re.captures_iter(content) {
        if let Some(port_match) = cap.get(1) {
            if let Ok(port) = port_match.as_str().parse::<u16>() {
                if !ports.contains(&port) {
                    ports.push(port);
                }
            }
        }
    }
    ports
}

/// Parse `ENV KEY=value` directives; later occurrences override earlier ones
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    let env_re =
        Regex::new(r"(?m)^\s*ENV\s+([A-Za-z_][A-Za-z0-9_]*)=(\S*)").expect("valid regex");

    let mut env = BTreeMap::new();
    for cap in env_re.captures_iter(content) {
        if let (Some(key), Some(value)) = (cap.get(1), cap.get(2)) {
            env.insert(key.as_str().to_string(), value.as_str().to_string());
        }
    }
    env
}

/// Parse `CMD` directives, raw text after the keyword, in order of appearance
pub fn parse_cmd(content: &str) -> Vec<String> {
    let cmd_re = Regex::new(r"(?m)^\s*CMD\s+(.+)$").expect("valid regex");

    cmd_re
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .collect()
}

/// Parse `FROM` stages in order
pub fn parse_stages(content: &str) -> Vec<Stage> {
    let from_re =
        Regex::new(r"(?mi)^\s*FROM\s+(\S+)(?:\s+AS\s+(\S+))?").expect("valid regex");

    from_re
        .captures_iter(content)
        .filter_map(|cap| {
            cap.get(1).map(|image| Stage {
                image: image.as_str().to_string(),
                name: cap.get(2).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

/// Directives among `EXPOSE`, `CMD` and `ENTRYPOINT` that appear more than
/// once. A duplicate is harmless (the last occurrence wins) but redundant.
pub fn duplicate_directives(content: &str) -> Vec<String> {
    ["EXPOSE", "CMD", "ENTRYPOINT"]
        .iter()
        .filter_map(|directive| {
            let re = Regex::new(&format!(r"(?m)^\s*{}\b", directive)).expect("valid regex");
            let count = re.find_iter(content).count();
            (count > 1).then(|| directive.to_string())
        })
        .collect()
}

/// Extract the port a start command binds, e.g. from `--bind 0.0.0.0:5000`
/// or `--bind 0.0.0.0:$PORT`
pub fn parse_bound_port(command_line: &str) -> Option<BoundPort> {
    let fixed_re = Regex::new(r"0\.0\.0\.0:(\d+)").expect("valid regex");
    if let Some(cap) = fixed_re.captures(command_line) {
        if let Ok(port) = cap[1].parse::<u16>() {
            return Some(BoundPort::Fixed(port));
        }
    }

    let env_re = Regex::new(r"0\.0\.0\.0:\$\{?([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex");
    env_re
        .captures(command_line)
        .map(|cap| BoundPort::Env(cap[1].to_string()))
}
