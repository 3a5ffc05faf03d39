//! Preprocessor registry and lookup

use crate::error::{PreprocessorError, RegistryError};
use crate::Preprocessor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of every preprocessor available to the host
///
/// Populated explicitly at process init; nothing registers itself on load.
pub struct PreprocessorRegistry {
    /// All registered preprocessors by name
    preprocessors: HashMap<String, Arc<dyn Preprocessor>>,

    /// Preprocessor names indexed by capability tag
    by_tag: HashMap<String, Vec<String>>,
}

impl PreprocessorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            preprocessors: HashMap::with_capacity(16),
            by_tag: HashMap::with_capacity(16),
        }
    }

    /// Register a preprocessor, replacing any earlier one with the same name
    pub fn register(&mut self, preprocessor: Arc<dyn Preprocessor>) {
        let name = preprocessor.name().to_string();

        if let Some(previous) = self.preprocessors.remove(&name) {
            warn!("Replacing already registered preprocessor: {}", name);
            for tag in &previous.descriptor().tags {
                if let Some(names) = self.by_tag.get_mut(tag) {
                    names.retain(|n| n != &name);
                }
            }
        }

        info!("Registering preprocessor: {}", name);

        for tag in &preprocessor.descriptor().tags {
            self.by_tag.entry(tag.clone()).or_default().push(name.clone());
        }

        self.preprocessors.insert(name, preprocessor);
    }

    /// Get preprocessor by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Preprocessor>, RegistryError> {
        self.preprocessors
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All names, highest sorting priority first, ties broken by name
    pub fn names(&self) -> Vec<String> {
        let mut entries: Vec<&Arc<dyn Preprocessor>> = self.preprocessors.values().collect();
        Self::sort(&mut entries);
        entries.iter().map(|p| p.name().to_string()).collect()
    }

    /// Preprocessors carrying `tag`, in list order
    pub fn with_tag(&self, tag: &str) -> Vec<Arc<dyn Preprocessor>> {
        let mut entries: Vec<&Arc<dyn Preprocessor>> = self
            .by_tag
            .get(tag)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| self.preprocessors.get(n))
                    .collect()
            })
            .unwrap_or_default();
        Self::sort(&mut entries);
        debug!("{} preprocessors tagged '{}'", entries.len(), tag);
        entries.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.preprocessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preprocessors.is_empty()
    }

    /// Unload every preprocessor, returning the first failure after trying all of them
    pub fn unload_all(&self) -> Result<(), PreprocessorError> {
        let mut first_error = None;
        for preprocessor in self.preprocessors.values() {
            if let Err(e) = preprocessor.unload() {
                warn!("Failed to unload {}: {}", preprocessor.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn sort(entries: &mut [&Arc<dyn Preprocessor>]) {
        entries.sort_by(|a, b| {
            b.descriptor()
                .sorting_priority
                .cmp(&a.descriptor().sorting_priority)
                .then_with(|| a.name().cmp(b.name()))
        });
    }
}

impl Default for PreprocessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
