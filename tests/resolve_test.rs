//! Tests for package identifiers and manifest resolution

use packageless::error::PimError;
use packageless::package::{resolve, resolve_identifier, Manifest, PackageId, DEFAULT_VERSION};
use quickcheck_macros::quickcheck;

const MANIFEST: &str = r#"
pim "python" {
  base_dir = "/python"

  version "latest" {
    image = "packageless/python"
  }

  version "3.9" {
    image = "packageless/python:3.9"
  }
}

pim "node" {
  base_dir = "/node"

  version "latest" {
    image = "packageless/node"
  }
}
"#;

fn manifest() -> Manifest {
    Manifest::from_hcl(MANIFEST).expect("Failed to parse manifest")
}

#[quickcheck]
fn parse_without_colon_defaults_to_latest(name: String) -> bool {
    if name.contains(':') {
        return true;
    }
    let id = PackageId::parse(&name);
    id.name == name && id.version == DEFAULT_VERSION
}

#[quickcheck]
fn parse_splits_on_first_colon(name: String, version: String) -> bool {
    if name.contains(':') {
        return true;
    }
    let id = PackageId::parse(&format!("{}:{}", name, version));
    id.name == name && id.version == version
}

#[quickcheck]
fn resolution_is_deterministic(identifier: String) -> bool {
    let manifest = manifest();
    let first = resolve_identifier(&manifest, &identifier).map(|r| r.version.image.clone());
    let second = resolve_identifier(&manifest, &identifier).map(|r| r.version.image.clone());
    match (first, second) {
        (Ok(a), Ok(b)) => a == b,
        (Err(_), Err(_)) => true,
        _ => false,
    }
}

#[test]
fn test_bare_name_is_latest() {
    let manifest = manifest();
    let bare = resolve_identifier(&manifest, "python").unwrap();
    let tagged = resolve_identifier(&manifest, "python:latest").unwrap();

    assert_eq!(bare, tagged);
    assert_eq!(bare.version.image, "packageless/python");
}

#[test]
fn test_resolve_explicit_version() {
    let manifest = manifest();
    let resolved = resolve(&manifest, &PackageId::parse("python:3.9")).unwrap();

    assert_eq!(resolved.package.name, "python");
    assert_eq!(resolved.version.image, "packageless/python:3.9");
}

#[test]
fn test_missing_version() {
    let manifest = manifest();
    let err = resolve_identifier(&manifest, "python:3.8").unwrap_err();

    match &err {
        PimError::PackageNotFound { name, version } => {
            assert_eq!(name, "python");
            assert_eq!(version, "3.8");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("'3.8'"));
}

#[test]
fn test_missing_package() {
    let manifest = manifest();
    let err = resolve_identifier(&manifest, "ruby").unwrap_err();

    assert!(matches!(err, PimError::PackageNotFound { ref version, .. } if version == "latest"));
}

#[test]
fn test_identifier_display() {
    assert_eq!(PackageId::parse("node").to_string(), "node");
    assert_eq!(PackageId::parse("node:16").to_string(), "node:16");
    assert_eq!(PackageId::parse("node:latest").to_string(), "node");
}

#[test]
fn test_duplicate_packages_rejected() {
    let doubled = format!("{}{}", MANIFEST, MANIFEST);
    let manifest = Manifest::from_hcl(&doubled).unwrap();

    assert!(matches!(manifest.validate(), Err(PimError::DuplicatePackage(ref name)) if name == "python"));
}
