use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::document::Document;

/// Completed documents kept for dependant models until they are released.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    inner: Arc<RwLock<BTreeMap<String, Arc<Vec<Document>>>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, model: &str, documents: Vec<Document>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.to_string(), Arc::new(documents));
    }

    pub fn get(&self, model: &str) -> Option<Arc<Vec<Document>>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .cloned()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(model)
    }

    /// Drop a model's documents; returns how many were held.
    pub fn release(&self, model: &str) -> usize {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(model)
            .map_or(0, |documents| documents.len())
    }

    pub fn models(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
