use crate::domain::Catalog;
use crate::error::Result;

/// Persistence seam for the single catalog document.
///
/// `load` of a missing document yields an empty catalog; unreadable
/// content is [`crate::error::ShelfError::CorruptCatalog`]. `save` must
/// replace the document as a whole so readers never see a partial write.
pub trait CatalogRepo: Send + Sync {
    fn load(&self) -> Result<Catalog>;

    fn save(&self, catalog: &Catalog) -> Result<()>;
}
