//! Write a rendered site to the output directory.
//!
//! Not transactional: a failure part-way leaves earlier files in place.

use crate::{
    config::is_contained,
    error::{Result, SiteError},
    site::Site,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// What one export wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    pub files_copied: usize,
    pub pages_written: usize,
    pub images_written: usize,
}

/// Copy static files, then write pages and notebook images.
pub fn export(site: &Site, copy: &[PathBuf], root: &Path, output_dir: &Path) -> Result<ExportStats> {
    let mut stats = ExportStats::default();
    create_dir(output_dir)?;

    for rel in copy {
        let src = root.join(rel);
        let dst = output_file(output_dir, rel)?;
        ensure_parent(&dst)?;
        fs::copy(&src, &dst).map_err(|err| SiteError::io(&src, err))?;
        stats.files_copied += 1;
    }

    for page in site.pages.values() {
        let dst = output_file(output_dir, &page.path)?;
        ensure_parent(&dst)?;
        fs::write(&dst, &page.output).map_err(|err| SiteError::io(&dst, err))?;
        stats.pages_written += 1;

        for (rel, bytes) in &page.images {
            // Images live next to the notebook's source directory
            let dst = output_file(output_dir, &Path::new(&page.parent).join(rel))?;
            ensure_parent(&dst)?;
            fs::write(&dst, bytes).map_err(|err| SiteError::io(&dst, err))?;
            stats.images_written += 1;
        }
    }

    Ok(stats)
}

/// `output_dir/rel`, refusing anything that would land outside `output_dir`.
fn output_file(output_dir: &Path, rel: &Path) -> Result<PathBuf> {
    if !is_contained(rel) {
        return Err(SiteError::io(
            rel,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "destination is outside the output directory",
            ),
        ));
    }
    Ok(output_dir.join(rel))
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| SiteError::io(path, err))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}
