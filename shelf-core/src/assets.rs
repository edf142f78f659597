use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::mesh_relative_path;
use crate::error::{Result, ShelfError};
use crate::layout::{ContentRoot, PREVIEWS_DIR};
use crate::policy::{MESH_FILE_NAME, check_mesh_name, preview_extension};

const PREVIEW_NAME_ATTEMPTS: usize = 3;

static LAST_STAMP_MS: AtomicU64 = AtomicU64::new(0);

/// Where the bytes of an upload come from.
#[derive(Clone, Debug)]
pub enum AssetSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// An uploaded file; `original_name` only matters for its extension.
#[derive(Clone, Debug)]
pub struct Upload {
    pub original_name: String,
    pub source: AssetSource,
}

impl Upload {
    pub fn from_bytes(original_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            source: AssetSource::Bytes(bytes),
        }
    }

    /// The original name defaults to the file name of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            original_name,
            source: AssetSource::File(path),
        }
    }
}

/// File placement for a single asset. Knows nothing about the catalog.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: ContentRoot,
}

impl AssetStore {
    pub fn new(root: ContentRoot) -> Self {
        Self { root }
    }

    /// Write `models/<name>/scene.glb`, replacing any previous mesh.
    pub fn write_mesh(&self, name: &str, mesh: &Upload) -> Result<String> {
        check_mesh_name(&mesh.original_name)?;
        let models = self.root.models_dir();
        fs::create_dir_all(&models)?;
        // `models/<name>/` only appears once the source has been copied.
        let tmp = stage(&mesh.source, &models)?;
        let dir = self.root.mesh_dir(name);
        fs::create_dir_all(&dir)?;
        tmp.persist(dir.join(MESH_FILE_NAME)).map_err(|e| e.error)?;
        let rel = mesh_relative_path(name);
        debug!(name, path = %rel, "mesh written");
        Ok(rel)
    }

    /// Write the preview under a freshly generated name and return its
    /// catalog-relative path.
    pub fn write_preview(&self, preview: &Upload) -> Result<String> {
        let ext = preview_extension(&preview.original_name)?;
        let dir = self.root.previews_dir();
        fs::create_dir_all(&dir)?;
        let mut tmp = stage(&preview.source, &dir)?;
        let mut attempt = 0;
        loop {
            let file_name = format!("{}.{ext}", preview_stem()?);
            match tmp.persist_noclobber(dir.join(&file_name)) {
                Ok(_) => {
                    let rel = format!("{PREVIEWS_DIR}/{file_name}");
                    debug!(path = %rel, "preview written");
                    return Ok(rel);
                }
                Err(e)
                    if e.error.kind() == ErrorKind::AlreadyExists
                        && attempt + 1 < PREVIEW_NAME_ATTEMPTS =>
                {
                    attempt += 1;
                    tmp = e.file;
                }
                Err(e) => return Err(e.error.into()),
            }
        }
    }

    /// Remove `models/<name>/` and everything below it. Missing entries are fine.
    pub fn remove_asset_tree(&self, name: &str) -> Result<()> {
        remove_tree(&self.root.mesh_dir(name))?;
        debug!(name, "asset tree removed");
        Ok(())
    }

    /// Absolute location of a catalog-relative preview path.
    ///
    /// Only paths below `previews/` qualify.
    pub fn preview_location(&self, image_path: &str) -> Result<PathBuf> {
        let abs = self.root.resolve(image_path)?;
        if !abs.starts_with(self.root.previews_dir()) {
            return Err(ShelfError::Validation(format!(
                "not a preview path: {image_path:?}"
            )));
        }
        Ok(abs)
    }

    /// Remove a preview given its catalog-relative path. Missing files are fine.
    pub fn remove_preview(&self, image_path: &str) -> Result<()> {
        let abs = self.preview_location(image_path)?;
        ignore_missing(fs::remove_file(&abs))?;
        debug!(path = image_path, "preview removed");
        Ok(())
    }
}

/// Copy the source into a temp file inside `dir`, ready to be renamed into place.
fn stage(source: &AssetSource, dir: &Path) -> io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    match source {
        AssetSource::Bytes(bytes) => tmp.write_all(bytes)?,
        AssetSource::File(path) => {
            let mut src = File::open(path)?;
            io::copy(&mut src, tmp.as_file_mut())?;
        }
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// `<millis>-<random>`; the millisecond stamp never goes backwards within the process.
fn preview_stem() -> io::Result<String> {
    let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).max(0) as u64;
    let prev = LAST_STAMP_MS.fetch_max(now, Ordering::SeqCst);
    let stamp = prev.max(now);

    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf)
        .map_err(|e| io::Error::new(ErrorKind::Other, format!("random source: {e}")))?;
    Ok(format!("{stamp}-{}", u64::from_le_bytes(buf)))
}

/// Contents-first walk: files go before the directories that hold them.
fn remove_tree(dir: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dir) {
        Ok(md) if !md.is_dir() => return ignore_missing(fs::remove_file(dir)),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }
    for entry in WalkDir::new(dir).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) {
                    continue;
                }
                return Err(e.into());
            }
        };
        let res = if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())
        } else {
            fs::remove_file(entry.path())
        };
        if let Err(e) = ignore_missing(res) {
            warn!(path = %entry.path().display(), error = %e, "could not remove");
            return Err(e);
        }
    }
    Ok(())
}

fn ignore_missing(res: io::Result<()>) -> io::Result<()> {
    match res {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
