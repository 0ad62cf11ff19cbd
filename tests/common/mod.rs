//! Shared fixtures for the lifecycle tests

#![allow(dead_code)]

use packageless::alias::AliasManager;
use packageless::cli::CliContext;
use packageless::engine::InMemoryEngine;
use packageless::error::{PimError, PimResult};
use packageless::package::{LocalManifestStore, ManifestFetcher, ManifestStore};
use packageless::{Config, Orchestrator};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

pub const REPOSITORY: &str = "https://pims.test/pims/";

/// Manifest with one `python:latest` version, one volume and no copies
pub const PYTHON: &str = r#"
pim "python" {
  base_dir = "/python"

  version "latest" {
    image = "packageless/python"
    port  = "8000"

    volume {
      path  = "/py"
      mount = "/app"
    }
  }
}
"#;

/// Two versions, the latest one copying a library tree out of the image
pub const NODE: &str = r#"
pim "node" {
  base_dir = "/node"

  version "latest" {
    image = "packageless/node"

    volume {
      path  = "/node/modules"
      mount = "/usr/lib/node_modules"
    }

    volume {
      mount = "/work"
    }

    copy {
      source = "/usr/lib/node_modules/"
      dest   = "/node/modules"
    }
  }

  version "16" {
    image = "packageless/node:16"
  }
}
"#;

/// Serves manifests from memory and remembers what was requested
#[derive(Clone, Default)]
pub struct StaticFetcher {
    pub files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    pub requests: Rc<RefCell<Vec<String>>>,
}

impl ManifestFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> PimResult<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        self.files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| PimError::Fetch(format!("{} returned 404 Not Found", url)))
    }
}

/// Records alias changes instead of editing shell files
#[derive(Default)]
pub struct RecordingAliases {
    pub registered: RefCell<Vec<(String, String)>>,
    pub deregistered: RefCell<Vec<(String, String)>>,
}

impl AliasManager for RecordingAliases {
    fn register(&self, command: &str, identifier: &str) -> PimResult<()> {
        self.registered
            .borrow_mut()
            .push((command.to_string(), identifier.to_string()));
        Ok(())
    }

    fn deregister(&self, command: &str, identifier: &str) -> PimResult<()> {
        self.deregistered
            .borrow_mut()
            .push((command.to_string(), identifier.to_string()));
        Ok(())
    }
}

pub struct Fixture {
    pub temp: TempDir,
    pub config: Config,
    pub fetcher: StaticFetcher,
    pub store: LocalManifestStore,
    pub aliases: RecordingAliases,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_alias(true)
    }

    pub fn with_alias(alias: bool) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let config = Config {
            base_dir: temp.path().display().to_string(),
            alias,
            repository_host: REPOSITORY.to_string(),
            ..Config::default()
        };
        let fetcher = StaticFetcher::default();
        let store = LocalManifestStore::new(
            config.manifest_dir(),
            config.repository_host.clone(),
            Box::new(fetcher.clone()),
        );

        Fixture {
            temp,
            config,
            fetcher,
            store,
            aliases: RecordingAliases::default(),
        }
    }

    /// Put a manifest straight into the local cache
    pub fn cache(&self, name: &str, manifest: &str) {
        let dir = self.config.manifest_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.hcl", name)), manifest).unwrap();
    }

    /// Make a manifest available from the repository
    pub fn serve(&self, name: &str, manifest: &str) {
        self.fetcher
            .files
            .borrow_mut()
            .insert(format!("{}{}.hcl", REPOSITORY, name), manifest.as_bytes().to_vec());
    }

    pub fn cached(&self, name: &str) -> bool {
        self.config.manifest_dir().join(format!("{}.hcl", name)).exists()
    }

    /// Nothing counts as installed
    pub fn store_is_empty(&self) -> bool {
        self.store.installed().map(|names| names.is_empty()).unwrap_or(false)
    }

    pub fn requests(&self) -> Vec<String> {
        self.fetcher.requests.borrow().clone()
    }

    /// Path under the package root
    pub fn package_path(&self, relative: &str) -> PathBuf {
        self.config.package_root().join(relative)
    }

    pub fn orchestrator<'a>(&'a self, engine: &'a InMemoryEngine) -> Orchestrator<'a> {
        Orchestrator::new(&self.config, engine, &self.store, &self.aliases, CliContext::quiet())
            .with_working_dir(self.temp.path().join("cwd"))
    }
}

/// Tar stream shaped like `docker cp <id>:<dir>/ -`
pub fn directory_archive(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut header = tar::Header::new_gnu();
    header.set_path(format!("{}/", root)).unwrap();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_mode(0o755);
    header.set_size(0);
    header.set_cksum();
    builder.append(&header, &[][..]).unwrap();

    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(format!("{}/{}", root, name)).unwrap();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(content.len() as u64);
        header.set_cksum();
        builder.append(&header, content.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap()
}
