use std::path::{Path, PathBuf};

use recovery_core::ImageType;

use crate::Result;

/// Produces portable disk images and delivers them.
pub trait ImageExporter: Send + Sync {
    /// Expose `source` through a transparent overlay at `overlay`.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay cannot be mounted.
    fn create_overlay(&self, source: &Path, overlay: &Path) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the overlay cannot be unmounted.
    fn remove_overlay(&self, overlay: &Path) -> Result<()>;

    /// Convert every disk image under `source` into `image_type`, writing
    /// the results into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if no disk images are found or a conversion fails.
    fn convert(&self, source: &Path, image_type: ImageType, output_dir: &Path)
    -> Result<Vec<PathBuf>>;

    /// Copy `files` into `destination`, returning the copied paths.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be copied.
    fn copy(&self, files: &[PathBuf], destination: &Path) -> Result<Vec<PathBuf>>;

    /// Remove files, ignoring ones that are already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    fn remove_files(&self, files: &[PathBuf]) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the share cannot be published.
    fn create_share(&self, name: &str, path: &Path) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the share cannot be removed.
    fn remove_share(&self, name: &str) -> Result<()>;
}
