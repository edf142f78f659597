use crate::error::{Result, ShelfError};

pub const MAX_NAME_LEN: usize = 128;

/// Asset names become directory names under `models/`, so anything that
/// could step outside that directory is refused.
pub fn validate_asset_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(ShelfError::Validation("asset name is required".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ShelfError::Validation(format!(
            "asset name longer than {MAX_NAME_LEN} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(ShelfError::Validation(format!("invalid asset name: {name:?}")));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(ShelfError::Validation(format!(
            "asset name contains a path separator or control character: {name:?}"
        )));
    }
    Ok(name)
}

/// Case-insensitive key comparison used for catalog lookups.
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}
