use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::Catalog;
use crate::error::{Result, ShelfError};
use crate::repo::CatalogRepo;

/// Catalog stored as one pretty-printed JSON document on disk.
pub struct FsCatalogRepo {
    path: PathBuf,
}

impl FsCatalogRepo {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogRepo for FsCatalogRepo {
    fn load(&self) -> Result<Catalog> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Catalog::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| ShelfError::CorruptCatalog {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut body = serde_json::to_vec_pretty(catalog)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        body.push(b'\n');

        // Same directory as the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), entries = catalog.len(), "catalog saved");
        Ok(())
    }
}
