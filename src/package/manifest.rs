//! Pim manifest model and decoding
//!
//! A manifest describes one or more packages, each with an ordered list of
//! versions pinned to a container image. Manifests are HCL files:
//!
//! ```hcl
//! pim "python" {
//!   base_dir = "/python"
//!
//!   version "latest" {
//!     image = "packageless/python"
//!     port  = "3000"
//!
//!     volume {
//!       path  = "/python/app"
//!       mount = "/app"
//!     }
//!
//!     copy {
//!       source = "/usr/local/lib/"
//!       dest   = "/python/lib"
//!     }
//!   }
//! }
//! ```

use crate::config::is_contained;
use crate::error::{PimError, PimResult};
use hcl::{Attribute, Block, Body, Expression, Structure};
use std::collections::HashSet;

/// Extension of cached and fetched manifest files
pub const MANIFEST_EXTENSION: &str = "hcl";

/// Version tag assumed when an identifier carries none
pub const DEFAULT_VERSION: &str = "latest";

/// Root of a decoded manifest file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub packages: Vec<PackageEntry>,
}

/// One named package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    /// Persistent package state, relative to the package root
    pub base_dir: String,
    pub versions: Vec<VersionEntry>,
}

/// One installable version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: String,
    /// Image reference, also the install identity of this version
    pub image: String,
    pub port: String,
    pub volumes: Vec<Volume>,
    pub copies: Vec<Copy>,
}

/// Host directory bound into the container.
///
/// An empty `path` binds the caller's working directory instead of a
/// package-local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub path: String,
    pub mount: String,
}

/// File or directory tree copied out of the image at install time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Copy {
    pub source: String,
    pub dest: String,
}

impl Manifest {
    /// Decode manifest bytes.
    ///
    /// Only structural validation happens here: missing required attributes
    /// are rejected, missing optional ones default to empty. Host paths must
    /// stay below the package root.
    pub fn decode(bytes: &[u8]) -> PimResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PimError::Decode(format!("manifest is not valid UTF-8: {}", e)))?;
        Self::from_hcl(text)
    }

    /// Decode a manifest from HCL text
    pub fn from_hcl(content: &str) -> PimResult<Self> {
        let body = hcl::parse(content).map_err(|e| PimError::Decode(e.to_string()))?;

        let mut packages = Vec::new();
        for structure in body.iter() {
            match structure {
                Structure::Block(block) if block.identifier.as_str() == "pim" => {
                    packages.push(decode_package(block)?);
                }
                other => return Err(unexpected(other, "manifest")),
            }
        }

        Ok(Manifest { packages })
    }

    /// Reject manifests declaring the same package name twice
    pub fn validate(&self) -> PimResult<()> {
        let mut seen = HashSet::new();
        for package in &self.packages {
            if !seen.insert(package.name.as_str()) {
                return Err(PimError::DuplicatePackage(package.name.clone()));
            }
        }
        Ok(())
    }

    /// Iterate every (package, version) pair in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&PackageEntry, &VersionEntry)> {
        self.packages
            .iter()
            .flat_map(|p| p.versions.iter().map(move |v| (p, v)))
    }
}

impl PackageEntry {
    /// Identifier of `version` as typed on the command line
    pub fn qualified_name(&self, version: &VersionEntry) -> String {
        if version.version == DEFAULT_VERSION {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, version.version)
        }
    }

    /// Name used for the container and the shell alias of `version`
    pub fn command_name(&self, version: &VersionEntry) -> String {
        if version.version == DEFAULT_VERSION {
            self.name.clone()
        } else {
            format!("{}-{}", self.name, version.version)
        }
    }
}

fn decode_package(block: &Block) -> PimResult<PackageEntry> {
    let name = single_label(block, "pim")?;
    let context = format!("pim \"{}\"", name);

    let mut base_dir = None;
    let mut versions = Vec::new();
    for structure in block.body.iter() {
        match structure {
            Structure::Attribute(attr) if attr.key.as_str() == "base_dir" => {
                base_dir = Some(string_value(attr, &context)?);
            }
            Structure::Block(inner) if inner.identifier.as_str() == "version" => {
                versions.push(decode_version(inner, &context)?);
            }
            other => return Err(unexpected(other, &context)),
        }
    }

    let base_dir = required(base_dir, "base_dir", &context)?;
    host_path(&base_dir, "base_dir", &context)?;

    Ok(PackageEntry {
        name,
        base_dir,
        versions,
    })
}

fn decode_version(block: &Block, package: &str) -> PimResult<VersionEntry> {
    let version = single_label(block, "version")?;
    let context = format!("{} version \"{}\"", package, version);

    let mut image = None;
    let mut port = String::new();
    let mut volumes = Vec::new();
    let mut copies = Vec::new();
    for structure in block.body.iter() {
        match structure {
            Structure::Attribute(attr) if attr.key.as_str() == "image" => {
                image = Some(string_value(attr, &context)?);
            }
            Structure::Attribute(attr) if attr.key.as_str() == "port" => {
                port = string_value(attr, &context)?;
            }
            Structure::Block(inner) if inner.identifier.as_str() == "volume" => {
                volumes.push(decode_volume(&inner.body, &context)?);
            }
            Structure::Block(inner) if inner.identifier.as_str() == "copy" => {
                copies.push(decode_copy(&inner.body, &context)?);
            }
            other => return Err(unexpected(other, &context)),
        }
    }

    Ok(VersionEntry {
        version,
        image: required(image, "image", &context)?,
        port,
        volumes,
        copies,
    })
}

fn decode_volume(body: &Body, version: &str) -> PimResult<Volume> {
    let context = format!("volume of {}", version);
    let mut path = String::new();
    let mut mount = None;
    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) if attr.key.as_str() == "path" => {
                path = string_value(attr, &context)?;
            }
            Structure::Attribute(attr) if attr.key.as_str() == "mount" => {
                mount = Some(string_value(attr, &context)?);
            }
            other => return Err(unexpected(other, &context)),
        }
    }

    if !path.is_empty() {
        host_path(&path, "path", &context)?;
    }

    Ok(Volume {
        path,
        mount: required(mount, "mount", &context)?,
    })
}

fn decode_copy(body: &Body, version: &str) -> PimResult<Copy> {
    let context = format!("copy of {}", version);
    let mut source = None;
    let mut dest = None;
    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) if attr.key.as_str() == "source" => {
                source = Some(string_value(attr, &context)?);
            }
            Structure::Attribute(attr) if attr.key.as_str() == "dest" => {
                dest = Some(string_value(attr, &context)?);
            }
            other => return Err(unexpected(other, &context)),
        }
    }

    let dest = required(dest, "dest", &context)?;
    host_path(&dest, "dest", &context)?;

    Ok(Copy {
        source: required(source, "source", &context)?,
        dest,
    })
}

fn single_label(block: &Block, kind: &str) -> PimResult<String> {
    match block.labels.as_slice() {
        [label] if !label.as_str().is_empty() => Ok(label.as_str().to_string()),
        _ => Err(PimError::Decode(format!("{} block needs exactly one non-empty label", kind))),
    }
}

fn string_value(attr: &Attribute, context: &str) -> PimResult<String> {
    match &attr.expr {
        Expression::String(value) => Ok(value.clone()),
        Expression::Number(value) => Ok(value.to_string()),
        _ => Err(PimError::Decode(format!(
            "{} of {} must be a string",
            attr.key.as_str(),
            context
        ))),
    }
}

fn required(value: Option<String>, key: &str, context: &str) -> PimResult<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(PimError::Decode(format!("{} is missing required attribute {}", context, key))),
    }
}

/// Host paths are joined under the package root and must not leave it
fn host_path(path: &str, key: &str, context: &str) -> PimResult<()> {
    if is_contained(path) {
        Ok(())
    } else {
        Err(PimError::Decode(format!(
            "{} of {} must name a directory below the package root, got '{}'",
            key, context, path
        )))
    }
}

fn unexpected(structure: &Structure, context: &str) -> PimError {
    let what = match structure {
        Structure::Attribute(attr) => format!("attribute {}", attr.key.as_str()),
        Structure::Block(block) => format!("block {}", block.identifier.as_str()),
    };
    PimError::Decode(format!("unsupported {} in {}", what, context))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON: &str = r#"
pim "python" {
  base_dir = "/python"

  version "latest" {
    image = "packageless/python"
    port  = 3000

    volume {
      path  = "/python/app"
      mount = "/app"
    }

    volume {
      mount = "/run"
    }

    copy {
      source = "/usr/local/lib/"
      dest   = "/python/lib"
    }
  }

  version "3.9" {
    image = "packageless/python:3.9"
  }
}
"#;

    fn decode_err(text: &str) -> String {
        match Manifest::from_hcl(text) {
            Err(PimError::Decode(message)) => message,
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn decodes_full_manifest() {
        let manifest = Manifest::from_hcl(PYTHON).unwrap();
        assert_eq!(manifest.packages.len(), 1);

        let python = &manifest.packages[0];
        assert_eq!(python.name, "python");
        assert_eq!(python.base_dir, "/python");
        assert_eq!(python.versions.len(), 2);

        let latest = &python.versions[0];
        assert_eq!(latest.port, "3000");
        assert_eq!(latest.volumes[0].path, "/python/app");
        assert_eq!(latest.volumes[1].path, "");
        assert_eq!(latest.copies[0].dest, "/python/lib");
    }

    #[test]
    fn optional_attributes_default_empty() {
        let manifest = Manifest::from_hcl(PYTHON).unwrap();
        let v39 = &manifest.packages[0].versions[1];
        assert!(v39.port.is_empty());
        assert!(v39.volumes.is_empty());
        assert!(v39.copies.is_empty());
    }

    #[test]
    fn missing_image_is_rejected() {
        let message = decode_err("pim \"a\" {\n base_dir = \"/a\"\n version \"latest\" {}\n}\n");
        assert!(message.contains("image"));
    }

    #[test]
    fn missing_mount_is_rejected() {
        let message = decode_err(
            "pim \"a\" {\n base_dir = \"/a\"\n version \"latest\" {\n image = \"x\"\n volume {\n path = \"/a\"\n }\n }\n}\n",
        );
        assert!(message.contains("mount"));
    }

    #[test]
    fn unknown_attributes_are_rejected() {
        let message = decode_err("pim \"a\" {\n base_dir = \"/a\"\n colour = \"blue\"\n}\n");
        assert!(message.contains("colour"));
    }

    #[test]
    fn paths_leaving_the_package_root_are_rejected() {
        let message = decode_err("pim \"a\" {\n base_dir = \"/a/../../etc\"\n}\n");
        assert!(message.contains("base_dir"));

        let message = decode_err("pim \"a\" {\n base_dir = \"/\"\n}\n");
        assert!(message.contains("base_dir"));

        let message = decode_err(
            "pim \"a\" {\n base_dir = \"/a\"\n version \"latest\" {\n image = \"x\"\n volume {\n path = \"/../victim\"\n mount = \"/m\"\n }\n }\n}\n",
        );
        assert!(message.contains("victim"));

        let message = decode_err(
            "pim \"a\" {\n base_dir = \"/a\"\n version \"latest\" {\n image = \"x\"\n copy {\n source = \"/s\"\n dest = \"/a/./../..\"\n }\n }\n}\n",
        );
        assert!(message.contains("dest"));
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let text = "pim \"a\" {\n base_dir = \"/a\"\n}\npim \"a\" {\n base_dir = \"/b\"\n}\n";
        let manifest = Manifest::from_hcl(text).unwrap();
        assert!(matches!(manifest.validate(), Err(PimError::DuplicatePackage(name)) if name == "a"));
    }

    #[test]
    fn qualified_and_command_names() {
        let manifest = Manifest::from_hcl(PYTHON).unwrap();
        let python = &manifest.packages[0];
        assert_eq!(python.qualified_name(&python.versions[0]), "python");
        assert_eq!(python.qualified_name(&python.versions[1]), "python:3.9");
        assert_eq!(python.command_name(&python.versions[1]), "python-3.9");
    }
}
