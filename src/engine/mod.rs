//! Container engine capability surface
//!
//! The lifecycle only ever talks to a [`ContainerEngine`]. [`DockerCli`]
//! drives a real engine through the `docker` executable; [`InMemoryEngine`]
//! records calls for tests.

pub mod archive;
pub mod docker;
pub mod memory;

pub use archive::extract_archive;
pub use docker::DockerCli;
pub use memory::{EngineCall, InMemoryEngine};

use crate::error::PimResult;
use std::io::Read;
use std::path::PathBuf;

/// Command the throwaway extraction container is created with
pub const EXTRACT_COMMAND: &str = "bash";

/// Everything needed to launch a package's container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    /// `host:container` port pairs
    pub ports: Vec<String>,
    /// Host source and container mount point
    pub volumes: Vec<(PathBuf, String)>,
    /// Arguments appended after the image
    pub args: Vec<String>,
}

/// How a launched container ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait ContainerEngine {
    /// Fetch `image` into the engine's local cache
    fn pull_image(&self, image: &str) -> PimResult<()>;

    /// Whether a local image's first tag matches `image`
    fn image_exists(&self, image: &str) -> PimResult<bool>;

    /// Create, without starting, a container used only for copying files out
    fn create_container(&self, image: &str) -> PimResult<String>;

    /// Tar stream of the tree rooted at `source` inside a stopped container
    fn copy_from_container(&self, container_id: &str, source: &str) -> PimResult<Box<dyn Read>>;

    /// Force-remove a container
    fn remove_container(&self, container_id: &str) -> PimResult<()>;

    fn remove_image(&self, image: &str) -> PimResult<()>;

    /// Run interactively with the caller's terminal attached; blocks until exit
    fn run_container(&self, spec: &RunSpec) -> PimResult<ExitInfo>;
}

/// Match `reference` against the first entry of an image's tag list.
///
/// Only the first tag is consulted and an empty list never matches. A
/// reference without a tag stands for its `latest` tag, so
/// `packageless/python` finds `packageless/python:latest`.
pub fn first_tag_matches(tags: &[String], reference: &str) -> bool {
    let Some(first) = tags.first() else {
        return false;
    };

    if first == reference {
        return true;
    }

    !has_tag(reference) && *first == format!("{}:latest", reference)
}

fn repository_of(tag: &str) -> &str {
    match tag.rfind(':') {
        Some(idx) if !tag[idx + 1..].contains('/') => &tag[..idx],
        _ => tag,
    }
}

fn has_tag(reference: &str) -> bool {
    repository_of(reference) != reference
}
