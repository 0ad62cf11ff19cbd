//! Local manifest cache, repository fetch, and the installed set

use super::manifest::{Manifest, MANIFEST_EXTENSION};
use crate::error::{PimError, PimResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source of raw manifest bytes
pub trait ManifestFetcher {
    fn fetch(&self, url: &str) -> PimResult<Vec<u8>>;
}

/// Fetches manifests over HTTP(S)
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> PimResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("packageless/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PimError::Fetch(e.to_string()))?;
        Ok(HttpFetcher { client })
    }
}

impl ManifestFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> PimResult<Vec<u8>> {
        tracing::debug!(url, "fetching manifest");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| PimError::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PimError::Fetch(format!("{} returned {}", url, status)));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| PimError::Fetch(format!("{}: {}", url, e)))
    }
}

/// Access to the manifests known on this host
pub trait ManifestStore {
    /// Raw bytes of the cached manifest for `name`
    fn load(&self, name: &str) -> PimResult<Vec<u8>>;

    /// Where the manifest for `name` is (or would be) cached
    fn location(&self, name: &str) -> PathBuf;

    /// Whether a manifest for `name` is cached
    fn contains(&self, name: &str) -> bool;

    /// Download the manifest for `name`, replacing any cached copy
    fn refresh(&self, name: &str) -> PimResult<()>;

    /// Drop the cached manifest for `name`; absent is not an error
    fn remove(&self, name: &str) -> PimResult<()>;

    /// Names of every cached manifest
    fn installed(&self) -> PimResult<Vec<String>>;

    /// Load, decode and validate the cached manifest for `name`
    fn manifest(&self, name: &str) -> PimResult<Manifest> {
        let manifest = Manifest::decode(&self.load(name)?)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

/// Manifest cache kept as `<dir>/<name>.hcl`
pub struct LocalManifestStore {
    dir: PathBuf,
    repository_host: String,
    fetcher: Box<dyn ManifestFetcher>,
}

impl LocalManifestStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        repository_host: impl Into<String>,
        fetcher: Box<dyn ManifestFetcher>,
    ) -> Self {
        LocalManifestStore {
            dir: dir.into(),
            repository_host: repository_host.into(),
            fetcher,
        }
    }

    /// Cache location of the manifest for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(manifest_file_name(name))
    }

    /// Repository URL of the manifest for `name`
    pub fn url_for(&self, name: &str) -> String {
        format!("{}{}", self.repository_host, manifest_file_name(name))
    }
}

impl ManifestStore for LocalManifestStore {
    fn location(&self, name: &str) -> PathBuf {
        self.path_for(name)
    }

    fn load(&self, name: &str) -> PimResult<Vec<u8>> {
        let path = self.path_for(name);
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PimError::ManifestNotFound(path.clone()),
            _ => PimError::filesystem(&path, e),
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn refresh(&self, name: &str) -> PimResult<()> {
        let bytes = self.fetcher.fetch(&self.url_for(name)).map_err(|e| match e {
            PimError::Fetch(message) => PimError::Fetch(format!(
                "could not fetch pim configuration for '{}': {}",
                name, message
            )),
            other => other,
        })?;

        fs::create_dir_all(&self.dir).map_err(|e| PimError::filesystem(&self.dir, e))?;
        let path = self.path_for(name);
        fs::write(&path, bytes).map_err(|e| PimError::filesystem(&path, e))?;
        tracing::info!(name, path = %path.display(), "cached manifest");
        Ok(())
    }

    fn remove(&self, name: &str) -> PimResult<()> {
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PimError::filesystem(&path, e)),
        }
    }

    fn installed(&self) -> PimResult<Vec<String>> {
        list_installed_package_names(&self.dir)
    }
}

fn manifest_file_name(name: &str) -> String {
    format!("{}.{}", name, MANIFEST_EXTENSION)
}

/// Base names of the manifest files cached in `dir`, sorted.
///
/// This is a filesystem listing only: a package whose image was removed
/// behind our back still shows up here. A missing directory means nothing
/// has been installed yet.
pub fn list_installed_package_names(dir: &Path) -> PimResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PimError::filesystem(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PimError::filesystem(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) != Some(MANIFEST_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }

    names.sort();
    Ok(names)
}
