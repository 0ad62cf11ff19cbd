//! Install, uninstall, upgrade, update and run
//!
//! Every verb is a single synchronous pass: resolve the package against its
//! manifest, check the image against the engine, then mutate engine and host
//! state in lockstep. A failing step aborts the verb and leaves earlier steps
//! in place.

use std::path::PathBuf;

use crate::alias::AliasManager;
use crate::cli::CliContext;
use crate::config::Config;
use crate::engine::{extract_archive, ContainerEngine, ExitInfo, RunSpec};
use crate::error::{PimError, PimResult};
use crate::layout::{self, PackageLayout};
use crate::package::{resolve, Manifest, ManifestStore, PackageEntry, PackageId, VersionEntry};

const UPGRADE_HINT: &str = "It must be installed before it can be upgraded.";
const RUN_HINT: &str = "You must install the package before running it.";

/// Sequences manifest lookups, engine calls and host directory changes
pub struct Orchestrator<'a> {
    config: &'a Config,
    engine: &'a dyn ContainerEngine,
    store: &'a dyn ManifestStore,
    aliases: &'a dyn AliasManager,
    layout: PackageLayout,
    context: CliContext,
    working_dir: Option<PathBuf>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Config,
        engine: &'a dyn ContainerEngine,
        store: &'a dyn ManifestStore,
        aliases: &'a dyn AliasManager,
        context: CliContext,
    ) -> Self {
        Orchestrator {
            config,
            engine,
            store,
            aliases,
            layout: PackageLayout::new(config.package_root()),
            context,
            working_dir: None,
        }
    }

    /// Directory bound for volumes without a path, instead of the process cwd
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Install one package, fetching its manifest when not cached
    pub fn install(&self, identifier: &str) -> PimResult<()> {
        let id = PackageId::parse(identifier);
        let (manifest, _) = self.manifest_for_install(&id)?;
        let resolved = resolve(&manifest, &id)?;
        let (package, version) = (resolved.package, resolved.version);

        if self.engine.image_exists(&version.image)? {
            return Err(PimError::AlreadyInstalled(package.qualified_name(version)));
        }

        self.context.info(&format!("Installing {}", package.qualified_name(version)));
        tracing::info!(package = %package.name, version = %version.version, image = %version.image, "installing");
        self.pull(&version.image)?;

        self.context.verbose("Creating package directories");
        layout::make_dir(&self.layout.base_dir(package))?;
        for volume in &version.volumes {
            if let Some(dir) = self.layout.volume_dir(volume) {
                layout::make_dir(&dir)?;
            }
        }

        self.copy_files(version)?;

        if self.config.alias {
            self.context.verbose("Setting alias");
            self.aliases
                .register(&package.command_name(version), &package.qualified_name(version))?;
        }

        self.context
            .success(&format!("{} successfully installed", package.qualified_name(version)));
        Ok(())
    }

    /// Remove one package's directories and image, using only the cached manifest
    pub fn uninstall(&self, identifier: &str) -> PimResult<()> {
        let id = PackageId::parse(identifier);
        let manifest = self.store.manifest(&id.name)?;
        let resolved = resolve(&manifest, &id)?;
        let (package, version) = (resolved.package, resolved.version);

        if !self.engine.image_exists(&version.image)? {
            return Err(PimError::not_installed(&package.name, ""));
        }

        self.context.info(&format!("Removing package {}", package.qualified_name(version)));
        tracing::info!(package = %package.name, version = %version.version, "uninstalling");

        self.context.verbose("Removing package directories");
        for volume in &version.volumes {
            if let Some(dir) = self.layout.volume_dir(volume) {
                layout::remove_dir(&dir)?;
            }
        }
        layout::remove_dir(&self.layout.base_dir(package))?;

        self.engine.remove_image(&version.image)?;

        if self.config.alias {
            self.context.verbose("Removing alias");
            self.aliases
                .deregister(&package.command_name(version), &package.qualified_name(version))?;

            if !self.any_installed(package)? {
                self.store.remove(&package.name)?;
            }
        }

        self.context
            .success(&format!("{} successfully uninstalled", package.qualified_name(version)));
        Ok(())
    }

    /// Re-pull an installed package and reset its volumes and copied files
    pub fn upgrade(&self, identifier: &str) -> PimResult<()> {
        let id = PackageId::parse(identifier);
        let (manifest, fetched) = self.manifest_for_install(&id)?;
        let resolved = resolve(&manifest, &id)?;

        if !self.engine.image_exists(&resolved.version.image)? {
            if fetched {
                self.store.remove(&id.name)?;
            }
            return Err(PimError::not_installed(&resolved.package.name, UPGRADE_HINT));
        }

        self.upgrade_version(resolved.package, resolved.version)
    }

    /// Upgrade every version, across all cached manifests, whose image is present
    pub fn upgrade_all(&self) -> PimResult<()> {
        for name in self.store.installed()? {
            let manifest = self.store.manifest(&name)?;
            for (package, version) in manifest.entries() {
                if !self.engine.image_exists(&version.image)? {
                    tracing::debug!(package = %package.name, version = %version.version, "not installed, skipping");
                    continue;
                }
                self.upgrade_version(package, version)?;
            }
        }
        Ok(())
    }

    /// Refresh the cached manifest of one installed package
    pub fn update(&self, identifier: &str) -> PimResult<()> {
        let id = PackageId::parse(identifier);
        if !self.store.installed()?.iter().any(|name| *name == id.name) {
            return Err(PimError::ManifestNotFound(self.store.location(&id.name)));
        }
        self.refresh(&id.name)
    }

    /// Refresh every cached manifest
    pub fn update_all(&self) -> PimResult<()> {
        for name in self.store.installed()? {
            self.refresh(&name)?;
        }
        Ok(())
    }

    /// Launch an installed package with the caller's terminal attached
    pub fn run(&self, identifier: &str, args: &[String]) -> PimResult<ExitInfo> {
        let id = PackageId::parse(identifier);
        let manifest = self.store.manifest(&id.name)?;
        let resolved = resolve(&manifest, &id)?;
        let (package, version) = (resolved.package, resolved.version);

        if !self.engine.image_exists(&version.image)? {
            return Err(PimError::not_installed(&package.name, RUN_HINT));
        }

        let spec = self.run_spec(package, version, args)?;
        tracing::info!(image = %spec.image, name = %spec.name, "running container");
        self.engine.run_container(&spec)
    }

    /// Container settings `run` would use for a resolved version
    pub fn run_spec(&self, package: &PackageEntry, version: &VersionEntry, args: &[String]) -> PimResult<RunSpec> {
        let mut ports = Vec::new();
        if !version.port.is_empty() {
            ports.push(format!("{}:{}", self.config.start_port, version.port));
        }

        let mut volumes = Vec::with_capacity(version.volumes.len());
        for volume in &version.volumes {
            let source = match self.layout.volume_dir(volume) {
                Some(dir) => dir,
                None => self.working_dir()?,
            };
            volumes.push((source, volume.mount.clone()));
        }

        Ok(RunSpec {
            image: version.image.clone(),
            name: package.command_name(version),
            ports,
            volumes,
            args: args.to_vec(),
        })
    }

    fn upgrade_version(&self, package: &PackageEntry, version: &VersionEntry) -> PimResult<()> {
        self.context.info(&format!("Upgrading {}", package.qualified_name(version)));
        tracing::info!(package = %package.name, version = %version.version, image = %version.image, "upgrading");
        self.pull(&version.image)?;

        self.context.verbose("Updating package directories");
        for volume in &version.volumes {
            if let Some(dir) = self.layout.volume_dir(volume) {
                layout::reset_dir(&dir)?;
            }
        }

        self.copy_files(version)?;

        self.context
            .success(&format!("{} successfully upgraded", package.qualified_name(version)));
        Ok(())
    }

    fn pull(&self, image: &str) -> PimResult<()> {
        let spinner = self.context.spinner(&format!("Pulling {}", image));
        let result = self.engine.pull_image(image);
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result
    }

    /// Copy declared files out of a throwaway container. Nothing is created
    /// when the version declares no copies.
    fn copy_files(&self, version: &VersionEntry) -> PimResult<()> {
        if version.copies.is_empty() {
            return Ok(());
        }

        self.context.verbose("Copying necessary files 1/3");
        let container = self.engine.create_container(&version.image)?;

        self.context.verbose("Copying necessary files 2/3");
        if let Err(err) = self.extract_copies(&container, version) {
            if let Err(cleanup) = self.engine.remove_container(&container) {
                tracing::warn!(container = %container, error = %cleanup, "could not remove extraction container");
                self.context
                    .warn(&format!("Could not remove container {}: {}", container, cleanup));
            }
            return Err(err);
        }

        self.context.verbose("Copying necessary files 3/3");
        self.engine.remove_container(&container)
    }

    fn extract_copies(&self, container: &str, version: &VersionEntry) -> PimResult<()> {
        for copy in &version.copies {
            let dest = self.layout.copy_dest(copy);
            tracing::debug!(source = %copy.source, dest = %dest.display(), "copying from container");
            let stream = self.engine.copy_from_container(container, &copy.source)?;
            extract_archive(stream, &dest, &copy.source)?;
        }
        Ok(())
    }

    /// Cached manifest for `id`, fetched first when absent, and whether it
    /// was fetched. A manifest fetched here is dropped again if `id` does
    /// not resolve in it.
    fn manifest_for_install(&self, id: &PackageId) -> PimResult<(Manifest, bool)> {
        if self.store.contains(&id.name) {
            return Ok((self.store.manifest(&id.name)?, false));
        }

        self.context.verbose(&format!("Fetching pim configuration for {}", id.name));
        self.store.refresh(&id.name)?;

        let manifest = self.store.manifest(&id.name);
        let usable = match &manifest {
            Ok(m) => resolve(m, id).is_ok(),
            Err(_) => false,
        };
        if !usable {
            self.store.remove(&id.name)?;
        }
        Ok((manifest?, true))
    }

    fn refresh(&self, name: &str) -> PimResult<()> {
        self.context.info(&format!("Updating pim: {}", name));
        self.store.refresh(name)
    }

    /// Whether any version of `package` still has its image locally
    fn any_installed(&self, package: &PackageEntry) -> PimResult<bool> {
        for version in &package.versions {
            if self.engine.image_exists(&version.image)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn working_dir(&self) -> PimResult<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().map_err(|e| PimError::filesystem(".", e)),
        }
    }
}
