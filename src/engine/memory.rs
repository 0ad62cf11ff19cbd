//! In-memory container engine for tests and dry runs

use super::{first_tag_matches, ContainerEngine, ExitInfo, RunSpec};
use crate::error::{EngineError, EngineOperation, PimResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// One call made against an [`InMemoryEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    PullImage(String),
    ImageExists(String),
    CreateContainer(String),
    CopyFromContainer { container: String, source: String },
    RemoveContainer(String),
    RemoveImage(String),
    RunContainer(RunSpec),
}

impl EngineCall {
    pub fn operation(&self) -> EngineOperation {
        match self {
            EngineCall::PullImage(_) => EngineOperation::PullImage,
            EngineCall::ImageExists(_) => EngineOperation::ListImages,
            EngineCall::CreateContainer(_) => EngineOperation::CreateContainer,
            EngineCall::CopyFromContainer { .. } => EngineOperation::CopyFromContainer,
            EngineCall::RemoveContainer(_) => EngineOperation::RemoveContainer,
            EngineCall::RemoveImage(_) => EngineOperation::RemoveImage,
            EngineCall::RunContainer(_) => EngineOperation::RunContainer,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    /// Tag lists of the local images, in listing order
    images: Vec<Vec<String>>,
    /// Container id to the image it was created from
    containers: HashMap<String, String>,
    /// (image, source path) to the tar stream `copy_from_container` returns
    archives: HashMap<(String, String), Vec<u8>>,
    calls: Vec<EngineCall>,
    fail_at: Option<EngineOperation>,
    exit_code: i32,
    next_container: usize,
}

/// Engine double that keeps images and containers in memory and records
/// every call made against it
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: RefCell<State>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a local image tagged `image`
    pub fn with_image(self, image: &str) -> Self {
        self.state.borrow_mut().images.push(vec![image.to_string()]);
        self
    }

    /// Seed a local image with an explicit tag list
    pub fn with_tagged_image(self, tags: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .images
            .push(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Register the archive returned when copying `source` out of `image`
    pub fn with_archive(self, image: &str, source: &str, archive: Vec<u8>) -> Self {
        self.state
            .borrow_mut()
            .archives
            .insert((image.to_string(), source.to_string()), archive);
        self
    }

    /// Make every call of `operation` fail
    pub fn fail_at(self, operation: EngineOperation) -> Self {
        self.state.borrow_mut().fail_at = Some(operation);
        self
    }

    /// Exit code reported by `run_container`
    pub fn with_exit_code(self, code: i32) -> Self {
        self.state.borrow_mut().exit_code = code;
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls of `operation`
    pub fn count(&self, operation: EngineOperation) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.state
            .borrow()
            .images
            .iter()
            .any(|tags| first_tag_matches(tags, image))
    }

    /// Containers created and not yet removed
    pub fn live_containers(&self) -> usize {
        self.state.borrow().containers.len()
    }

    fn record(&self, call: EngineCall) -> PimResult<()> {
        let operation = call.operation();
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.fail_at == Some(operation) {
            return Err(EngineError::new(operation, "injected failure").into());
        }
        Ok(())
    }
}

impl ContainerEngine for InMemoryEngine {
    fn pull_image(&self, image: &str) -> PimResult<()> {
        self.record(EngineCall::PullImage(image.to_string()))?;
        if !self.has_image(image) {
            self.state.borrow_mut().images.push(vec![image.to_string()]);
        }
        Ok(())
    }

    fn image_exists(&self, image: &str) -> PimResult<bool> {
        self.record(EngineCall::ImageExists(image.to_string()))?;
        Ok(self.has_image(image))
    }

    fn create_container(&self, image: &str) -> PimResult<String> {
        self.record(EngineCall::CreateContainer(image.to_string()))?;
        if !self.has_image(image) {
            return Err(EngineError::new(EngineOperation::CreateContainer, format!("no such image: {}", image)).into());
        }
        let mut state = self.state.borrow_mut();
        state.next_container += 1;
        let id = format!("container-{}", state.next_container);
        state.containers.insert(id.clone(), image.to_string());
        Ok(id)
    }

    fn copy_from_container(&self, container_id: &str, source: &str) -> PimResult<Box<dyn Read>> {
        self.record(EngineCall::CopyFromContainer {
            container: container_id.to_string(),
            source: source.to_string(),
        })?;
        let state = self.state.borrow();
        let image = state.containers.get(container_id).ok_or_else(|| {
            EngineError::new(EngineOperation::CopyFromContainer, format!("no such container: {}", container_id))
        })?;
        let archive = state
            .archives
            .get(&(image.clone(), source.to_string()))
            .cloned()
            .ok_or_else(|| {
                EngineError::new(EngineOperation::CopyFromContainer, format!("no such path: {}", source))
            })?;
        Ok(Box::new(Cursor::new(archive)))
    }

    fn remove_container(&self, container_id: &str) -> PimResult<()> {
        self.record(EngineCall::RemoveContainer(container_id.to_string()))?;
        match self.state.borrow_mut().containers.remove(container_id) {
            Some(_) => Ok(()),
            None => Err(EngineError::new(EngineOperation::RemoveContainer, format!("no such container: {}", container_id)).into()),
        }
    }

    fn remove_image(&self, image: &str) -> PimResult<()> {
        self.record(EngineCall::RemoveImage(image.to_string()))?;
        let mut state = self.state.borrow_mut();
        match state.images.iter().position(|tags| first_tag_matches(tags, image)) {
            Some(index) => {
                state.images.remove(index);
                Ok(())
            }
            None => Err(EngineError::new(EngineOperation::RemoveImage, format!("no local image matches {}", image)).into()),
        }
    }

    fn run_container(&self, spec: &RunSpec) -> PimResult<ExitInfo> {
        self.record(EngineCall::RunContainer(spec.clone()))?;
        Ok(ExitInfo {
            code: Some(self.state.borrow().exit_code),
        })
    }
}
