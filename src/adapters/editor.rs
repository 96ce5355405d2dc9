//! Item-editor surface boundary

use async_trait::async_trait;

use crate::domain::CatalogItem;

/// Opens the edit view for a created catalog entry.
///
/// Receives the full cached snapshot, so no additional fetch is needed to
/// render the editor.
#[async_trait]
pub trait ItemEditor: Send + Sync {
    async fn open(&self, item: &CatalogItem);
}
