//! Container engine backed by the `docker` command-line client

use super::{first_tag_matches, ContainerEngine, ExitInfo, RunSpec, EXTRACT_COMMAND};
use crate::error::{EngineError, EngineOperation, PimResult};
use std::io::{Cursor, Read};
use std::path::Path;
use std::process::{Command, Stdio};

/// Drives the engine by shelling out to the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a different docker-compatible client, such as `podman`
    pub fn with_program(program: impl Into<String>) -> Self {
        DockerCli {
            program: program.into(),
        }
    }

    /// Run a captured docker command and return its stdout
    fn capture(&self, operation: EngineOperation, args: &[&str]) -> PimResult<Vec<u8>> {
        tracing::debug!(program = %self.program, ?args, "engine command");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| EngineError::new(operation, format!("could not start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(EngineError::new(operation, message).into());
        }

        Ok(output.stdout)
    }

    fn capture_text(&self, operation: EngineOperation, args: &[&str]) -> PimResult<String> {
        let stdout = self.capture(operation, args)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// ID of the local image whose first tag matches `image`
    fn find_image(&self, image: &str) -> PimResult<Option<String>> {
        let listing = self.capture_text(
            EngineOperation::ListImages,
            &["image", "ls", "--no-trunc", "--format", "{{.ID}}"],
        )?;

        let mut ids: Vec<&str> = Vec::new();
        for id in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Ok(None);
        }

        let mut args = vec!["image", "inspect", "--format", "{{.ID}} {{json .RepoTags}}"];
        args.extend(ids.iter().copied());
        let inspected = self.capture_text(EngineOperation::ListImages, &args)?;

        for line in inspected.lines() {
            let Some((id, tags_json)) = line.trim().split_once(' ') else {
                continue;
            };
            // `null` for dangling images
            let tags: Vec<String> = serde_json::from_str::<Option<Vec<String>>>(tags_json)
                .map_err(|e| EngineError::new(EngineOperation::ListImages, e.to_string()))?
                .unwrap_or_default();
            if first_tag_matches(&tags, image) {
                return Ok(Some(id.to_string()));
            }
        }

        Ok(None)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEngine for DockerCli {
    fn pull_image(&self, image: &str) -> PimResult<()> {
        let output = self.capture_text(EngineOperation::PullImage, &["pull", "--quiet", image])?;
        tracing::info!(image, digest = %output.trim(), "pulled image");
        Ok(())
    }

    fn image_exists(&self, image: &str) -> PimResult<bool> {
        Ok(self.find_image(image)?.is_some())
    }

    fn create_container(&self, image: &str) -> PimResult<String> {
        let id = self.capture_text(EngineOperation::CreateContainer, &["create", image, EXTRACT_COMMAND])?;
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(EngineError::new(EngineOperation::CreateContainer, "engine returned no container id").into());
        }
        tracing::debug!(image, container = %id, "created container");
        Ok(id)
    }

    fn copy_from_container(&self, container_id: &str, source: &str) -> PimResult<Box<dyn Read>> {
        let from = format!("{}:{}", container_id, source);
        let archive = self.capture(EngineOperation::CopyFromContainer, &["cp", &from, "-"])?;
        Ok(Box::new(Cursor::new(archive)))
    }

    fn remove_container(&self, container_id: &str) -> PimResult<()> {
        self.capture(EngineOperation::RemoveContainer, &["rm", "--force", container_id])?;
        Ok(())
    }

    fn remove_image(&self, image: &str) -> PimResult<()> {
        let id = self.find_image(image)?.ok_or_else(|| {
            EngineError::new(EngineOperation::RemoveImage, format!("no local image matches {}", image))
        })?;
        self.capture(EngineOperation::RemoveImage, &["image", "rm", "--force", &id])?;
        Ok(())
    }

    fn run_container(&self, spec: &RunSpec) -> PimResult<ExitInfo> {
        let mut command = Command::new(&self.program);
        command.args(["run", "-it", "--rm", "--name", &spec.name]);

        for port in &spec.ports {
            command.arg("-p").arg(port);
        }

        for (source, mount) in &spec.volumes {
            let source = absolute(source)
                .map_err(|e| EngineError::new(EngineOperation::RunContainer, e.to_string()))?;
            command.arg("-v").arg(format!("{}:{}", source.display(), mount));
        }

        command.arg(&spec.image).args(&spec.args);
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        tracing::debug!(?command, "running container");
        let status = command.status().map_err(|e| {
            EngineError::new(EngineOperation::RunContainer, format!("could not start {}: {}", self.program, e))
        })?;

        Ok(ExitInfo { code: status.code() })
    }
}

fn absolute(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
