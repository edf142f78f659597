use crate::layout::ContentRoot;
use crate::repo::CatalogRepo;
use crate::repo_fs::FsCatalogRepo;

pub enum Backend {
    Fs,
}

pub fn open_repo(backend: Backend, root: &ContentRoot) -> Box<dyn CatalogRepo> {
    match backend {
        Backend::Fs => Box::new(FsCatalogRepo::new(root.catalog_path())),
    }
}
