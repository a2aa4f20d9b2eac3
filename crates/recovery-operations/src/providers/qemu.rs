use std::fs;
use std::path::{Path, PathBuf};

use recovery_core::ImageType;
use tracing::{debug, info, warn};

use super::disk::disk_images;
use super::state_file::remove_if_exists;
use crate::Result;
use crate::error::OperationError;
use crate::traits::{CommandRunner, ImageExporter};

/// Image conversion with `qemu-img`, overlays with overlayfs and network
/// shares with Samba user shares.
pub struct QemuImageExporter<R> {
    runner: R,
}

impl<R: CommandRunner> QemuImageExporter<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove what a conversion or copy wrote before it failed. The stage never
/// committed, so nothing else will.
fn discard_partial(files: &[PathBuf]) {
    for file in files {
        if let Err(e) = remove_if_exists(file) {
            warn!(file = %file.display(), error = %e, "failed to remove partial image");
        }
    }
}

impl<R: CommandRunner> ImageExporter for QemuImageExporter<R> {
    fn create_overlay(&self, source: &Path, overlay: &Path) -> Result<()> {
        let upper = sibling(overlay, ".upper");
        let work = sibling(overlay, ".work");
        for dir in [overlay, upper.as_path(), work.as_path()] {
            fs::create_dir_all(dir)?;
        }

        let options = format!(
            "lowerdir={},upperdir={},workdir={}",
            source.display(),
            upper.display(),
            work.display()
        );
        let target = overlay.display().to_string();
        self.runner
            .run_checked("mount", &["-t", "overlay", "overlay", "-o", &options, &target])?;
        Ok(())
    }

    fn remove_overlay(&self, overlay: &Path) -> Result<()> {
        let target = overlay.display().to_string();
        self.runner.run_checked("umount", &[&target])?;
        remove_dir_if_exists(&sibling(overlay, ".upper"))?;
        remove_dir_if_exists(&sibling(overlay, ".work"))?;
        remove_dir_if_exists(overlay)?;
        Ok(())
    }

    fn convert(
        &self,
        source: &Path,
        image_type: ImageType,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let images = disk_images(source)?;
        fs::create_dir_all(output_dir)?;

        let mut outputs = Vec::with_capacity(images.len());
        let result = images.iter().try_for_each(|image| -> Result<()> {
            let stem = image
                .file_stem()
                .ok_or_else(|| OperationError::NoDiskImages(source.to_path_buf()))?;
            let output = output_dir
                .join(stem)
                .with_extension(image_type.extension());
            outputs.push(output.clone());

            let input = image.display().to_string();
            let target = output.display().to_string();
            info!(input = %input, output = %target, format = %image_type, "converting disk image");
            self.runner.run_checked(
                "qemu-img",
                &["convert", "-O", image_type.qemu_format(), &input, &target],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            discard_partial(&outputs);
            return Err(e);
        }
        Ok(outputs)
    }

    fn copy(&self, files: &[PathBuf], destination: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(destination)?;

        let mut copied = Vec::with_capacity(files.len());
        let result = files.iter().try_for_each(|file| -> Result<()> {
            let Some(name) = file.file_name() else {
                return Ok(());
            };
            let target = destination.join(name);
            copied.push(target.clone());
            let bytes = fs::copy(file, &target)?;
            debug!(from = %file.display(), to = %target.display(), bytes, "copied image");
            Ok(())
        });
        if let Err(e) = result {
            discard_partial(&copied);
            return Err(e);
        }
        Ok(copied)
    }

    fn remove_files(&self, files: &[PathBuf]) -> Result<()> {
        for file in files {
            remove_if_exists(file)?;
        }
        Ok(())
    }

    fn create_share(&self, name: &str, path: &Path) -> Result<()> {
        let target = path.display().to_string();
        self.runner.run_checked(
            "net",
            &["usershare", "add", name, &target, "", "Everyone:R", "guest_ok=y"],
        )?;
        Ok(())
    }

    fn remove_share(&self, name: &str) -> Result<()> {
        self.runner
            .run_checked("net", &["usershare", "delete", name])?;
        Ok(())
    }
}
