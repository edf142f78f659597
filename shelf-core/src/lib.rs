#![forbid(unsafe_code)]

pub mod error;
pub mod layout;
pub mod policy;

pub mod util {
    pub mod sanitize;
}

pub mod domain;
pub mod repo;
pub mod repo_factory;
pub mod repo_fs;

pub mod assets;
pub mod manager;

pub mod auth {
    pub mod credentials;
    pub mod gate;
}

// Re-exports: stable API surface
pub use assets::{AssetSource, AssetStore, Upload};
pub use auth::credentials::{CredentialVerifier, StaticCredentials, hash_password};
pub use auth::gate::{AuthGate, Principal};
pub use domain::{AssetRecord, Catalog};
pub use layout::ContentRoot;
pub use manager::{CatalogManager, DeleteRequest, UploadRequest};
