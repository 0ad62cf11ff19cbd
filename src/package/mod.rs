//! Package manifests for packageless
//!
//! This module provides functionality for:
//! - Pim manifest decoding and validation
//! - Identifier parsing and version selection
//! - The local manifest cache and the installed set derived from it

pub mod manifest;
pub mod resolve;
pub mod store;

pub use manifest::{Copy, Manifest, PackageEntry, VersionEntry, Volume, DEFAULT_VERSION, MANIFEST_EXTENSION};
pub use resolve::{resolve, resolve_identifier, PackageId, Resolved};
pub use store::{list_installed_package_names, HttpFetcher, LocalManifestStore, ManifestFetcher, ManifestStore};
