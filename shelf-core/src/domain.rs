use serde::{Deserialize, Serialize};

use crate::layout::{MODELS_DIR, PREVIEWS_DIR};
use crate::policy::MESH_FILE_NAME;
use crate::util::sanitize::same_name;

/// One catalog entry. Field names follow the persisted document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub name: String,
    pub model_path: String,
    pub image_path: String,
}

impl AssetRecord {
    pub fn new(name: &str, preview_file: &str) -> Self {
        Self {
            name: name.to_string(),
            model_path: mesh_relative_path(name),
            image_path: format!("{PREVIEWS_DIR}/{preview_file}"),
        }
    }
}

pub fn mesh_relative_path(name: &str) -> String {
    format!("{MODELS_DIR}/{name}/{MESH_FILE_NAME}")
}

/// The whole catalog document: `{"models": [...]}`.
///
/// Ordered; keyed by name without regard to case. The operations here are
/// pure, persistence lives behind [`crate::repo::CatalogRepo`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub models: Vec<AssetRecord>,
}

impl Catalog {
    pub fn find_by_name(&self, name: &str) -> Option<&AssetRecord> {
        self.models.iter().find(|m| same_name(&m.name, name))
    }

    /// Replace the first entry matching `record.name`, or append.
    pub fn upsert(mut self, record: AssetRecord) -> Self {
        match self.models.iter().position(|m| same_name(&m.name, &record.name)) {
            Some(i) => self.models[i] = record,
            None => self.models.push(record),
        }
        self
    }

    pub fn remove(mut self, name: &str) -> (Self, Option<AssetRecord>) {
        let removed = self
            .models
            .iter()
            .position(|m| same_name(&m.name, name))
            .map(|i| self.models.remove(i));
        (self, removed)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
