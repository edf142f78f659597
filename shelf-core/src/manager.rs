use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

use crate::assets::{AssetStore, Upload};
use crate::domain::{AssetRecord, Catalog};
use crate::error::{Result, ShelfError};
use crate::layout::ContentRoot;
use crate::policy::{check_mesh_name, preview_extension};
use crate::repo::CatalogRepo;
use crate::repo_factory::{Backend, open_repo};
use crate::util::sanitize::validate_asset_name;

#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub name: String,
    pub mesh: Upload,
    pub preview: Upload,
}

/// `mesh_path` / `image_path` are what the caller believes is recorded.
/// They are compared against the catalog but never used to locate files.
#[derive(Clone, Debug, Default)]
pub struct DeleteRequest {
    pub name: String,
    pub mesh_path: Option<String>,
    pub image_path: Option<String>,
}

impl DeleteRequest {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Keeps the file tree and the catalog document consistent.
///
/// Every create/update and delete runs its whole sequence while holding
/// `repo`, so at most one load-mutate-save is in flight and two uploads of
/// the same name cannot interleave their file writes.
pub struct CatalogManager {
    root: ContentRoot,
    assets: AssetStore,
    repo: Mutex<Box<dyn CatalogRepo>>,
}

impl CatalogManager {
    /// Bootstrap the content root and use the on-disk catalog.
    pub fn open(root: ContentRoot) -> Result<Self> {
        root.ensure()?;
        let repo = open_repo(Backend::Fs, &root);
        Ok(Self::with_repo(root, repo))
    }

    pub fn with_repo(root: ContentRoot, repo: Box<dyn CatalogRepo>) -> Self {
        Self {
            assets: AssetStore::new(root.clone()),
            root,
            repo: Mutex::new(repo),
        }
    }

    pub fn content_root(&self) -> &ContentRoot {
        &self.root
    }

    /// Read-only snapshot of the persisted catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        self.writer().load()
    }

    pub fn create_or_update(&self, req: UploadRequest) -> Result<AssetRecord> {
        // Validating: no side effects past this block on failure.
        let name = validate_asset_name(&req.name)?;
        check_mesh_name(&req.mesh.original_name)?;
        preview_extension(&req.preview.original_name)?;

        let repo = self.writer();
        let catalog = repo.load()?;
        let existing = catalog.find_by_name(name).cloned();
        // The first casing a name was stored under owns the mesh directory.
        let name = existing
            .as_ref()
            .map_or_else(|| name.to_string(), |r| r.name.clone());
        validate_asset_name(&name)?;

        // Writing files: preview first, a failed mesh write takes it back out.
        let image_path = self.assets.write_preview(&req.preview)?;
        let model_path = match self.assets.write_mesh(&name, &req.mesh) {
            Ok(path) => path,
            Err(e) => {
                warn!(name = %name, image_path = %image_path, error = %e, "mesh write failed, removing new preview");
                self.discard_preview(&image_path);
                return Err(e);
            }
        };

        // Updating catalog.
        let record = AssetRecord {
            name: name.clone(),
            model_path,
            image_path,
        };
        let catalog = catalog.upsert(record.clone());
        if let Err(e) = repo.save(&catalog) {
            warn!(name = %name, error = %e, "catalog save failed, removing new preview");
            self.discard_preview(&record.image_path);
            return Err(ShelfError::Persistence {
                name,
                source: Box::new(e),
            });
        }

        let updated = existing.is_some();
        if let Some(old) = existing.filter(|old| old.image_path != record.image_path) {
            self.discard_preview(&old.image_path);
        }
        info!(name = %name, image_path = %record.image_path, updated, "asset stored");
        Ok(record)
    }

    pub fn delete(&self, req: DeleteRequest) -> Result<AssetRecord> {
        if req.name.trim().is_empty() {
            return Err(ShelfError::Validation("asset name is required".into()));
        }

        let repo = self.writer();
        let catalog = repo.load()?;
        let record = catalog
            .find_by_name(&req.name)
            .cloned()
            .ok_or_else(|| ShelfError::NotFound(req.name.clone()))?;

        let claimed = [
            ("modelPath", req.mesh_path.as_deref(), record.model_path.as_str()),
            ("imagePath", req.image_path.as_deref(), record.image_path.as_str()),
        ];
        for (field, supplied, recorded) in claimed {
            if let Some(supplied) = supplied.filter(|s| *s != recorded) {
                warn!(name = %record.name, field, supplied, recorded, "ignoring caller-supplied path");
            }
        }

        // Everything is checked before the first removal. A hand-edited catalog
        // must not steer the tree removal outside `models/`. An unusable preview
        // path is skipped and the entry still goes.
        validate_asset_name(&record.name)?;
        let preview = match self.assets.preview_location(&record.image_path) {
            Ok(_) => Some(record.image_path.as_str()),
            Err(e) => {
                warn!(name = %record.name, image_path = %record.image_path, error = %e, "skipping unusable preview path");
                None
            }
        };
        self.assets.remove_asset_tree(&record.name)?;
        if let Some(image_path) = preview {
            self.assets.remove_preview(image_path)?;
        }

        let (catalog, _) = catalog.remove(&record.name);
        repo.save(&catalog).map_err(|e| ShelfError::Persistence {
            name: record.name.clone(),
            source: Box::new(e),
        })?;
        info!(name = %record.name, "asset deleted");
        Ok(record)
    }

    fn writer(&self) -> MutexGuard<'_, Box<dyn CatalogRepo>> {
        // Nothing in memory outlives an operation, so a poisoned lock is still usable.
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn discard_preview(&self, image_path: &str) {
        if let Err(e) = self.assets.remove_preview(image_path) {
            warn!(image_path, error = %e, "could not remove preview");
        }
    }
}
