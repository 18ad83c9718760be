use crate::model::{CategoryName, FieldName, Item};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Every category seen in a collection with the sorted set of its field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog(pub BTreeMap<CategoryName, BTreeSet<FieldName>>);

impl Catalog {
    pub fn from_items(items: &[Item]) -> Self {
        let mut map: BTreeMap<CategoryName, BTreeSet<FieldName>> = BTreeMap::new();
        for props in items.iter().filter_map(|i| i.properties.as_ref()) {
            for (category, fields) in props {
                map.entry(category.clone())
                    .or_default()
                    .extend(fields.keys().cloned());
            }
        }
        Catalog(map)
    }

    pub fn categories(&self) -> Vec<CategoryName> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
