use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::error::OperationError;

const DISK_IMAGE_EXTENSIONS: &[&str] = &["img", "raw", "vmdk", "vhd", "vhdx", "qcow2"];

/// Disk images stored directly under `dir`, sorted by file name.
///
/// # Errors
///
/// Returns `OperationError::NoDiskImages` if the directory holds none.
pub(crate) fn disk_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DISK_IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image && path.is_file() {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(OperationError::NoDiskImages(dir.to_path_buf()));
    }
    images.sort();
    Ok(images)
}
