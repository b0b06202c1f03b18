use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{ApplyError, ApplyStage};

pub(super) fn extract_zip(zip_path: &Path, dest: &Path) -> Result<(), ApplyError> {
    let file = std::fs::File::open(zip_path).map_err(|error| {
        ApplyError::io_with_path(ApplyStage::Replace, "failed to open zip file", zip_path, &error)
    })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| ApplyError::zip("failed to read zip archive", error))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| ApplyError::zip("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.join(name);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                ApplyError::io_with_path(
                    ApplyStage::Replace,
                    "failed to create extraction directory",
                    &out_path,
                    &error,
                )
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                ApplyError::io_with_path(
                    ApplyStage::Replace,
                    "failed to create extraction parent directory",
                    parent,
                    &error,
                )
            })?;
        }
        let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
            ApplyError::io_with_path(
                ApplyStage::Replace,
                "failed to create extracted file",
                &out_path,
                &error,
            )
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|error| {
            ApplyError::io_with_path(
                ApplyStage::Replace,
                "failed to extract archive entry",
                &out_path,
                &error,
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    debug!("Extraction complete to {}", dest.display());
    Ok(())
}

/// Breadth-first search for a regular file called `file_name` under `dir`.
pub(super) fn find_entry(dir: &Path, file_name: &std::ffi::OsStr) -> Option<PathBuf> {
    let mut pending = vec![dir.to_path_buf()];
    while !pending.is_empty() {
        let mut next = Vec::new();
        for current in pending {
            let Ok(entries) = std::fs::read_dir(&current) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    next.push(path);
                } else if entry.file_name() == file_name {
                    return Some(path);
                }
            }
        }
        pending = next;
    }
    None
}
