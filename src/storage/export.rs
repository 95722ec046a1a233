//! Multi-language export document

use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::storage::KnowledgeStore;
use crate::utils::error::StoreError;

/// Mapping from language code to that language's knowledge store
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Export {
    stores: IndexMap<String, KnowledgeStore>,
}

impl Export {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new language variant rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateLanguage` if the language is already present.
    pub fn add_language(
        &mut self,
        language: &str,
        base_url: &str,
    ) -> std::result::Result<&mut KnowledgeStore, StoreError> {
        if self.stores.contains_key(language) {
            return Err(StoreError::DuplicateLanguage(language.to_string()));
        }
        info!(language = %language, base_url = %base_url, "Added language");
        Ok(self
            .stores
            .entry(language.to_string())
            .or_insert_with(|| KnowledgeStore::new(language, base_url)))
    }

    #[must_use]
    pub fn get(&self, language: &str) -> Option<&KnowledgeStore> {
        self.stores.get(language)
    }

    pub fn get_mut(&mut self, language: &str) -> Option<&mut KnowledgeStore> {
        self.stores.get_mut(language)
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Serialize the whole export
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Write the export to `path`
    ///
    /// The document is fully serialized before anything touches the disk and
    /// lands through a rename, so a failed run never leaves a truncated file.
    ///
    /// # Errors
    ///
    /// Returns serialization or I/O errors.
    pub fn write_to(&self, path: &Path, pretty: bool) -> Result<()> {
        let body = self.to_json(pretty)?;

        let mut staging = path.as_os_str().to_owned();
        staging.push(".partial");
        fs::write(&staging, body)?;
        fs::rename(&staging, path)?;

        info!(path = %path.display(), languages = self.len(), "Export written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCategory;

    #[test]
    fn test_duplicate_language_is_rejected() {
        let mut export = Export::new();
        export.add_language("en", "https://x.io/en/").unwrap();

        assert_eq!(
            export.add_language("en", "https://x.io/en/").unwrap_err(),
            StoreError::DuplicateLanguage("en".to_string())
        );
    }

    #[test]
    fn test_export_is_keyed_by_language() {
        let mut export = Export::new();
        export
            .add_language("en", "https://x.io/en/")
            .unwrap()
            .add_category(None, NewCategory::titled("Start"))
            .unwrap();
        export.add_language("fr", "https://x.io/fr/").unwrap();

        let value: serde_json::Value = serde_json::from_str(&export.to_json(false).unwrap()).unwrap();
        assert_eq!(value["en"]["language"], "en");
        assert_eq!(value["fr"]["base_url"], "https://x.io/fr/");
        assert_eq!(value["en"]["categories"].as_object().unwrap().len(), 1);
        assert_eq!(export.languages().collect::<Vec<_>>(), vec!["en", "fr"]);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        let mut export = Export::new();
        export.add_language("en", "https://x.io/").unwrap();
        export.write_to(&path, true).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"base_url\": \"https://x.io/\""));
        assert!(!dir.path().join("export.json.partial").exists());
    }
}
