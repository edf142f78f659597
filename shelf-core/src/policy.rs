use std::path::Path;

use crate::error::{Result, ShelfError};

/// Meshes are always stored as `scene.glb`.
pub const MESH_EXTENSION: &str = "glb";
pub const MESH_FILE_NAME: &str = "scene.glb";

pub const PREVIEW_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Lowercased extension of an uploaded file's original name, empty when there is none.
pub fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn check_mesh_name(original_name: &str) -> Result<()> {
    let ext = extension_of(original_name);
    if ext != MESH_EXTENSION {
        return Err(ShelfError::Validation(format!(
            "invalid model file type: {ext:?} (expected .{MESH_EXTENSION})"
        )));
    }
    Ok(())
}

/// Returns the normalised extension the stored preview will carry.
pub fn preview_extension(original_name: &str) -> Result<String> {
    let ext = extension_of(original_name);
    if !PREVIEW_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ShelfError::Validation(format!(
            "invalid preview file type: {ext:?} (expected one of {})",
            PREVIEW_EXTENSIONS.join(", ")
        )));
    }
    Ok(ext)
}
