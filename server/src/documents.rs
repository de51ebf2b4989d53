//! Open-document text store, keyed by URI.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

/// Latest known text of every open document. Cheap to clone; clones share
/// the same store.
#[derive(Clone, Default)]
pub struct DocumentStore {
    docs: Arc<DashMap<Url, String>>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, uri: Url, text: String) {
        self.docs.insert(uri, text);
    }

    pub fn close(&self, uri: &Url) {
        self.docs.remove(uri);
    }

    #[must_use]
    pub fn text(&self, uri: &Url) -> Option<String> {
        self.docs.get(uri).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
