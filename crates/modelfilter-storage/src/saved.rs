use crate::traits::SavedQueryStore;
use chrono::Utc;
use modelfilter_core::{
    default_created_by, NewSavedQuery, QueryError, Result, SavedQuery, SavedQueryPatch,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Saved queries keyed by their client-chosen id. Names are unique after trimming.
#[derive(Clone, Default)]
pub struct InMemorySavedQueries {
    inner: Arc<RwLock<HashMap<String, SavedQuery>>>,
}

impl InMemorySavedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn name_taken(queries: &HashMap<String, SavedQuery>, name: &str, except_id: Option<&str>) -> bool {
    queries
        .values()
        .any(|q| q.name == name && Some(q.id.as_str()) != except_id)
}

fn not_found() -> QueryError {
    QueryError::NotFound("Query not found".into())
}

#[async_trait::async_trait]
impl SavedQueryStore for InMemorySavedQueries {
    async fn list(&self) -> Result<Vec<SavedQuery>> {
        let mut out: Vec<SavedQuery> = self.inner.read().values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn insert(&self, req: NewSavedQuery) -> Result<SavedQuery> {
        let id = req.id.trim().to_string();
        let name = req.name.trim().to_string();
        if id.is_empty() || name.is_empty() || req.query.is_null() {
            return Err(QueryError::Invalid(
                "ID, name and query are required".into(),
            ));
        }
        let mut inner = self.inner.write();
        if inner.contains_key(&id) {
            return Err(QueryError::Conflict(format!(
                "A query with the ID \"{id}\" already exists"
            )));
        }
        if name_taken(&inner, &name, None) {
            return Err(QueryError::Conflict(format!(
                "A query with the name \"{name}\" already exists"
            )));
        }
        let now = Utc::now();
        let saved = SavedQuery {
            id: id.clone(),
            name,
            query: req.query,
            created_by: req
                .created_by
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(default_created_by),
            created_at: now,
            updated_at: now,
        };
        inner.insert(id, saved.clone());
        info!(id = %saved.id, name = %saved.name, "saved query stored");
        Ok(saved)
    }

    async fn get(&self, id: &str) -> Result<SavedQuery> {
        self.inner.read().get(id).cloned().ok_or_else(not_found)
    }

    async fn update(&self, id: &str, patch: SavedQueryPatch) -> Result<SavedQuery> {
        let mut inner = self.inner.write();
        if !inner.contains_key(id) {
            return Err(not_found());
        }
        let name = match patch.name {
            Some(n) => {
                let n = n.trim().to_string();
                if n.is_empty() {
                    return Err(QueryError::Invalid("name must not be empty".into()));
                }
                if name_taken(&inner, &n, Some(id)) {
                    return Err(QueryError::Conflict(format!(
                        "A query with the name \"{n}\" already exists"
                    )));
                }
                Some(n)
            }
            None => None,
        };
        if patch.query.as_ref().is_some_and(|q| q.is_null()) {
            return Err(QueryError::Invalid("query must not be null".into()));
        }
        let saved = inner.get_mut(id).ok_or_else(not_found)?;
        if let Some(n) = name {
            saved.name = n;
        }
        if let Some(q) = patch.query {
            saved.query = q;
        }
        if let Some(c) = patch.created_by {
            saved.created_by = c;
        }
        saved.updated_at = Utc::now();
        Ok(saved.clone())
    }

    async fn delete(&self, id: &str) -> Result<SavedQuery> {
        let removed = self.inner.write().remove(id).ok_or_else(not_found)?;
        info!(id = %removed.id, name = %removed.name, "saved query deleted");
        Ok(removed)
    }
}
