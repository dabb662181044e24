//! Fuser registry
//!
//! Provides [`FuserRegistry`] mapping field names to their [`FieldFuser`].

use crate::fuser::{
    AuthorFuser, ContainerTitleFuser, FieldFuser, FileFuser, PagesFuser, TitleFuser, UrlFuser,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Registry of field fusers, keyed by field name
///
/// Registering a fuser for a field that already has one replaces it.
#[derive(Debug, Default, Clone)]
pub struct FuserRegistry {
    fusers: IndexMap<&'static str, Arc<dyn FieldFuser>>,
}

impl FuserRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with the built-in fusers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AuthorFuser));
        registry.register(Arc::new(TitleFuser));
        registry.register(Arc::new(PagesFuser));
        registry.register(Arc::new(ContainerTitleFuser));
        registry.register(Arc::new(FileFuser));
        registry.register(Arc::new(UrlFuser));
        registry
    }

    /// Register a fuser for each of its fields
    pub fn register(&mut self, fuser: Arc<dyn FieldFuser>) {
        for field in fuser.fields() {
            self.fusers.insert(*field, Arc::clone(&fuser));
        }
    }

    /// Fuser for a field
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Arc<dyn FieldFuser>> {
        self.fusers.get(field)
    }

    /// Check if a field has a fuser
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fusers.contains_key(field)
    }

    /// Remove the fuser of a field
    #[inline]
    pub fn remove(&mut self, field: &str) -> bool {
        self.fusers.shift_remove(field).is_some()
    }

    /// Fields with a fuser, in registration order
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.fusers.keys().copied().collect()
    }

    /// Number of fields with a fuser
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fusers.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fusers.is_empty()
    }
}
