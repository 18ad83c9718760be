use modelfilter_core::{NewSavedQuery, Result, SavedQuery, SavedQueryPatch};

#[async_trait::async_trait]
pub trait SavedQueryStore: Send + Sync + 'static {
    /// Newest first.
    async fn list(&self) -> Result<Vec<SavedQuery>>;
    async fn insert(&self, req: NewSavedQuery) -> Result<SavedQuery>;
    async fn get(&self, id: &str) -> Result<SavedQuery>;
    async fn update(&self, id: &str, patch: SavedQueryPatch) -> Result<SavedQuery>;
    /// Returns the removed query.
    async fn delete(&self, id: &str) -> Result<SavedQuery>;
}
