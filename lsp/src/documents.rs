//! Open-document table fed by `didOpen` / `didChange` / `didClose`.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Document {
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Default)]
pub(crate) struct DocumentStore {
    docs: HashMap<String, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, uri: String, version: i32, text: String) {
        self.docs.insert(uri, Document { version, text });
    }

    /// Replace the text of a document. Changes older than the stored version
    /// are ignored; an unknown URI is treated as an open.
    ///
    /// Returns whether the store was updated.
    pub fn change(&mut self, uri: &str, version: i32, text: String) -> bool {
        match self.docs.get_mut(uri) {
            Some(doc) if version < doc.version => {
                tracing::debug!(
                    uri,
                    stored = doc.version,
                    received = version,
                    "Ignoring stale change"
                );
                false
            }
            Some(doc) => {
                doc.version = version;
                doc.text = text;
                true
            }
            None => {
                self.docs
                    .insert(uri.to_string(), Document { version, text });
                true
            }
        }
    }

    pub fn close(&mut self, uri: &str) -> Option<Document> {
        self.docs.remove(uri)
    }

    #[cfg(test)]
    pub fn get(&self, uri: &str) -> Option<&Document> {
        self.docs.get(uri)
    }

    /// All open documents, sorted by URI so re-validation order is stable.
    pub fn iter(&self) -> Vec<(&str, &Document)> {
        let mut all: Vec<(&str, &Document)> = self
            .docs
            .iter()
            .map(|(uri, doc)| (uri.as_str(), doc))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }
}
