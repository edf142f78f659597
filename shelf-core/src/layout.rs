use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::domain::Catalog;
use crate::error::{Result, ShelfError};
use crate::repo::CatalogRepo;
use crate::repo_fs::FsCatalogRepo;

pub const MODELS_DIR: &str = "models";
pub const PREVIEWS_DIR: &str = "previews";
pub const CATALOG_FILE: &str = "models.json";

/// Directory tree the service owns:
///
/// ```text
/// <root>/models/<name>/scene.glb
/// <root>/previews/<generated>.<ext>
/// <root>/models.json
/// ```
#[derive(Clone, Debug)]
pub struct ContentRoot {
    root: PathBuf,
}

impl ContentRoot {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(MODELS_DIR)
    }

    pub fn previews_dir(&self) -> PathBuf {
        self.root.join(PREVIEWS_DIR)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    /// Absolute directory holding the mesh of `name`. The name must already be sanitised.
    pub fn mesh_dir(&self, name: &str) -> PathBuf {
        self.models_dir().join(name)
    }

    /// Create the directory skeleton and an empty catalog when missing.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.models_dir(), self.previews_dir()] {
            fs::create_dir_all(&dir)?;
        }
        let catalog = self.catalog_path();
        if !catalog.exists() {
            FsCatalogRepo::new(catalog.clone()).save(&Catalog::default())?;
            info!(path = %catalog.display(), "initial catalog created");
        }
        Ok(())
    }

    /// Map a catalog-relative path such as `previews/1-2.png` onto disk.
    ///
    /// Only plain components below `models/` or `previews/` are accepted.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        if relative.contains('\\') {
            return Err(invalid_path(relative));
        }
        let rel = Path::new(relative);
        let mut components = rel.components();
        match components.next() {
            Some(Component::Normal(top)) if top == MODELS_DIR || top == PREVIEWS_DIR => {}
            _ => return Err(invalid_path(relative)),
        }
        let mut depth = 0;
        for c in components {
            match c {
                Component::Normal(_) => depth += 1,
                _ => return Err(invalid_path(relative)),
            }
        }
        if depth == 0 {
            return Err(invalid_path(relative));
        }
        Ok(self.root.join(rel))
    }
}

fn invalid_path(relative: &str) -> ShelfError {
    ShelfError::Validation(format!("path outside content root: {relative:?}"))
}
