use modelfilter_core::{Catalog, CategoryName, Item};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Holder of the loaded item collection. Readers take an `Arc` snapshot;
/// a load swaps the whole collection at once.
#[derive(Clone)]
pub struct ItemCollection {
    inner: Arc<RwLock<Loaded>>,
}

struct Loaded {
    items: Arc<[Item]>,
    catalog: Arc<Catalog>,
    source: Option<String>,
}

impl Default for Loaded {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::<Item>::new()),
            catalog: Arc::new(Catalog::default()),
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub item_count: usize,
    pub categories: Vec<CategoryName>,
    pub source: String,
}

/// Where a loaded collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    File,
    TestData,
    /// Test data served because the requested collection does not exist.
    Fallback,
}

impl LoadSummary {
    pub fn message(&self, origin: LoadOrigin) -> String {
        let (items, categories) = (self.item_count, self.categories.len());
        match origin {
            LoadOrigin::File => {
                format!("Successfully loaded {items} items with {categories} categories")
            }
            LoadOrigin::TestData => {
                format!("Successfully loaded {items} test items with {categories} categories")
            }
            LoadOrigin::Fallback => {
                format!("Fallback: Using test data with {items} items and {categories} categories")
            }
        }
    }
}

impl Default for ItemCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemCollection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Loaded::default())),
        }
    }

    pub fn with_items(items: Vec<Item>, source: impl Into<String>) -> Self {
        let collection = Self::new();
        collection.replace(items, source);
        collection
    }

    /// Swaps in a new collection and rebuilds its catalog.
    pub fn replace(&self, items: Vec<Item>, source: impl Into<String>) -> LoadSummary {
        let source = source.into();
        let catalog = Catalog::from_items(&items);
        let summary = LoadSummary {
            item_count: items.len(),
            categories: catalog.categories(),
            source: source.clone(),
        };
        let loaded = Loaded {
            items: Arc::from(items),
            catalog: Arc::new(catalog),
            source: Some(source),
        };
        *self.inner.write() = loaded;
        info!(
            items = summary.item_count,
            categories = summary.categories.len(),
            source = %summary.source,
            "item collection replaced"
        );
        summary
    }

    pub fn snapshot(&self) -> Arc<[Item]> {
        self.inner.read().items.clone()
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.inner.read().catalog.clone()
    }

    pub fn source(&self) -> Option<String> {
        self.inner.read().source.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unloaded() {
        let items = ItemCollection::new();
        assert!(items.is_empty());
        assert!(items.snapshot().is_empty());
        assert!(items.catalog().is_empty());
        assert_eq!(items.source(), None);
    }

    #[test]
    fn replace_swaps_whole_collection() {
        let items = ItemCollection::new();
        let summary = items.replace(
            vec![
                Item::new("a").with_property("Constraints", "Level", "Level 1"),
                Item::new("b").with_property("Dimensions", "Area", "5"),
            ],
            "first",
        );
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.categories, vec!["Constraints", "Dimensions"]);

        let before = items.snapshot();
        items.replace(vec![Item::new("c")], "second");
        assert_eq!(before.len(), 2);
        assert_eq!(items.snapshot().len(), 1);
        assert_eq!(items.snapshot()[0].external_id, "c");
        assert!(items.catalog().is_empty());
        assert_eq!(items.source().as_deref(), Some("second"));
    }

    #[test]
    fn summary_message_counts_categories() {
        let summary = LoadSummary {
            item_count: 15,
            categories: vec!["Constraints".into(), "Dimensions".into()],
            source: "fixture".into(),
        };
        assert_eq!(
            summary.message(LoadOrigin::TestData),
            "Successfully loaded 15 test items with 2 categories"
        );
        assert_eq!(
            summary.message(LoadOrigin::File),
            "Successfully loaded 15 items with 2 categories"
        );
        assert_eq!(
            summary.message(LoadOrigin::Fallback),
            "Fallback: Using test data with 15 items and 2 categories"
        );
    }
}
