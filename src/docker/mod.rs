//! Docker daemon integration
//!
//! Executes build plans against a local Docker daemon and verifies the
//! resulting image metadata. Build failures are binary: any dependency
//! installation or compilation error aborts the build, there is no retry.

pub mod context;

use crate::plan::{BuildPlan, Command};
use anyhow::{Context as _, Result};
use bollard::image::BuildImageOptions;
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Check if a Docker daemon is reachable over the local socket
pub async fn check_docker() -> Result<bool> {
    if !Path::new(DOCKER_SOCKET_PATH).exists() {
        debug!("Docker socket not found at {}", DOCKER_SOCKET_PATH);
        return Ok(false);
    }

    let docker = match Docker::connect_with_local_defaults() {
        Ok(d) => d,
        Err(e) => {
            debug!("Failed to connect to Docker: {}", e);
            return Ok(false);
        }
    };

    match docker.version().await {
        Ok(v) => {
            let api_version = v.api_version.unwrap_or_else(|| "0.0".to_string());
            debug!("Docker API version: {}", api_version);
            Ok(true)
        }
        Err(e) => {
            debug!("Failed to get Docker version: {}", e);
            Ok(false)
        }
    }
}

/// Connect to the local Docker daemon
pub fn connect() -> Result<Docker> {
    Docker::connect_with_local_defaults().context("Failed to connect to Docker daemon")
}

/// Outcome of one executed build
#[derive(Debug, Clone, Serialize)]
pub struct BuildRecord {
    /// Tag the image was built under
    pub tag: String,
    /// Daemon-assigned image id, when the daemon reported one
    pub image_id: Option<String>,
    /// Digest of the plan the image was built from
    pub plan_digest: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Run a daemon build with the given context archive.
///
/// Progress lines are surfaced at debug level; an error reported by the
/// daemon aborts with a non-zero outcome.
pub async fn build_image(
    docker: &Docker,
    build_context: Vec<u8>,
    tag: &str,
    plan_digest: &str,
) -> Result<BuildRecord> {
    let started_at = Utc::now();
    info!(tag, "Starting image build");

    let options = BuildImageOptions {
        dockerfile: context::DOCKERFILE_NAME.to_string(),
        t: tag.to_string(),
        rm: true,
        ..Default::default()
    };

    let mut stream = docker.build_image(options, None, Some(build_context.into()));

    let mut image_id = None;
    while let Some(message) = stream.next().await {
        let build_info = message.context("Docker build stream failed")?;

        if let Some(error) = build_info.error {
            anyhow::bail!("Image build failed: {}", error);
        }
        if let Some(text) = build_info.stream {
            let trimmed = text.trim_end();
            if !trimmed.is_empty() {
                debug!("{}", trimmed);
            }
        }
        if let Some(aux) = build_info.aux {
            image_id = aux.id;
        }
    }

    let finished_at = Utc::now();
    info!(tag, ?image_id, "Image build finished");

    Ok(BuildRecord {
        tag: tag.to_string(),
        image_id,
        plan_digest: plan_digest.to_string(),
        started_at,
        finished_at,
    })
}

/// Inspect a built image and compare its metadata against the plan.
///
/// Returns the list of violations; an empty list means the image matches.
/// Checked: the declared port is present in the exposed-port metadata, every
/// baked environment variable survived into the image config, and the
/// configured command matches the plan's entry point.
pub async fn verify_image(docker: &Docker, tag: &str, plan: &BuildPlan) -> Result<Vec<String>> {
    let inspect = docker
        .inspect_image(tag)
        .await
        .with_context(|| format!("Failed to inspect image {}", tag))?;
    let config = inspect.config.unwrap_or_default();

    let mut violations = Vec::new();

    if let Some(port) = &plan.runtime.port {
        let key = format!("{}/tcp", port.declared());
        let exposed = config
            .exposed_ports
            .as_ref()
            .map(|ports| ports.contains_key(&key))
            .unwrap_or(false);
        if !exposed {
            violations.push(format!(
                "Image does not expose declared port {}",
                port.declared()
            ));
        }
    }

    let image_env = config.env.unwrap_or_default();
    for (key, value) in &plan.runtime.env {
        let expected = format!("{}={}", key, value);
        if !image_env.contains(&expected) {
            violations.push(format!("Image is missing environment variable {}", expected));
        }
    }

    if let Some(command) = &plan.runtime.command {
        let expected = expected_cmd(command);
        match config.cmd {
            Some(actual) if actual == expected => {}
            Some(actual) => violations.push(format!(
                "Image command {:?} differs from planned {:?}",
                actual, expected
            )),
            None => violations.push("Image declares no command".to_string()),
        }
    }

    Ok(violations)
}

/// The argv the daemon stores for a plan command. Shell-form commands are
/// stored behind `/bin/sh -c`.
fn expected_cmd(command: &Command) -> Vec<String> {
    match command {
        Command::Exec(argv) => argv.clone(),
        Command::Shell(line) => vec!["/bin/sh".to_string(), "-c".to_string(), line.clone()],
    }
}
