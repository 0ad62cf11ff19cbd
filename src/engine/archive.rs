//! Extraction of the tar streams produced by copying out of a container

use crate::error::{EngineError, EngineOperation, PimError, PimResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

/// Write the contents of a container archive under `dest`.
///
/// When `source` names a directory (trailing `/`) the archive's first entry
/// is that directory itself: it is skipped and its name stripped from every
/// following entry. A single-file source keeps every entry as-is. Existing
/// directories are left untouched; files are overwritten.
///
/// Nothing is ever written outside `dest`: entries with `..` or absolute
/// components are refused, and so is any entry whose parent inside `dest`
/// is a symlink.
pub fn extract_archive<R: Read>(reader: R, dest: &Path, source: &str) -> PimResult<()> {
    let is_dir = source.ends_with('/');
    make_dir(dest)?;

    let mut archive = Archive::new(reader);
    let entries = archive.entries().map_err(extract_error)?;

    for (index, entry) in entries.enumerate() {
        let mut entry = entry.map_err(extract_error)?;
        if is_dir && index == 0 {
            continue;
        }

        let entry_path = entry.path().map_err(extract_error)?.into_owned();
        let Some(relative) = archive_relative(&entry_path, is_dir, dest)? else {
            continue;
        };
        check_parents(dest, &relative)?;

        let target = dest.join(&relative);
        let mode = entry.header().mode().ok();

        match entry.header().entry_type() {
            EntryType::Directory => make_dir(&target)?,
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                if let Some(parent) = target.parent() {
                    make_dir(parent)?;
                }
                clear_target(&target)?;
                write_file(&mut entry, &target, mode)?;
            }
            EntryType::Symlink => {
                let link = entry.link_name().map_err(extract_error)?;
                if let Some(link) = link {
                    if let Some(parent) = target.parent() {
                        make_dir(parent)?;
                    }
                    make_symlink(&link, &target)?;
                }
            }
            EntryType::Link => {
                let link = entry.link_name().map_err(extract_error)?.map(|l| l.into_owned());
                let original = match link {
                    Some(link) => archive_relative(&link, is_dir, dest)?,
                    None => None,
                };
                let Some(original) = original else {
                    return Err(EngineError::new(
                        EngineOperation::ExtractArchive,
                        format!("hard link {} has no target", relative.display()),
                    )
                    .into());
                };
                check_parents(dest, &original)?;
                if let Some(parent) = target.parent() {
                    make_dir(parent)?;
                }
                clear_target(&target)?;
                let original = dest.join(original);
                fs::hard_link(&original, &target).map_err(|e| PimError::filesystem(&target, e))?;
            }
            other => {
                tracing::debug!(path = %relative.display(), kind = ?other, "skipping archive entry");
            }
        }
    }

    Ok(())
}

/// Path of an archive member relative to `dest`; `None` for the root itself
fn archive_relative(path: &Path, is_dir: bool, dest: &Path) -> PimResult<Option<PathBuf>> {
    let skip = if is_dir { 1 } else { 0 };
    let mut relative = PathBuf::new();
    for component in path.components().skip(skip) {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(EngineError::new(
                    EngineOperation::ExtractArchive,
                    format!("refusing to extract {} outside of {}", path.display(), dest.display()),
                )
                .into())
            }
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

/// Refuse `relative` when any existing directory above it is a symlink
fn check_parents(dest: &Path, relative: &Path) -> PimResult<()> {
    let mut current = dest.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if is_symlink(&current) {
            return Err(EngineError::new(
                EngineOperation::ExtractArchive,
                format!("refusing to extract {} through symlink {}", relative.display(), current.display()),
            )
            .into());
        }
    }
    Ok(())
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Drop a symlink or file about to be replaced so writes never follow it
fn clear_target(target: &Path) -> PimResult<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(target).map_err(|e| PimError::filesystem(target, e)),
        _ => Ok(()),
    }
}

fn make_dir(path: &Path) -> PimResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PimError::filesystem(path, e))
}

fn write_file<R: Read>(reader: &mut R, target: &Path, mode: Option<u32>) -> PimResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(target)
        .map_err(|e| PimError::filesystem(target, e))?;

    io::copy(reader, &mut file).map_err(|e| PimError::filesystem(target, e))?;
    set_mode(target, mode)
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: Option<u32>) -> PimResult<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| PimError::filesystem(target, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_target: &Path, _mode: Option<u32>) -> PimResult<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> PimResult<()> {
    clear_target(target)?;
    std::os::unix::fs::symlink(link, target).map_err(|e| PimError::filesystem(target, e))
}

#[cfg(not(unix))]
fn make_symlink(_link: &Path, target: &Path) -> PimResult<()> {
    tracing::debug!(path = %target.display(), "symlinks are not extracted on this platform");
    Ok(())
}

fn extract_error(err: io::Error) -> PimError {
    EngineError::new(EngineOperation::ExtractArchive, err.to_string()).into()
}
