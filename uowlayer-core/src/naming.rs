//! Collection name resolution.
//!
//! Repositories never hard-code physical collection names. They ask a
//! [`CollectionNameSelector`] to turn a document's type name into the name of
//! the collection it is stored in. The default convention camel-cases the type
//! name; [`OverrideCollectionNameSelector`] lets callers pin explicit names for
//! some types and fall back to another selector for the rest.
//!
//! # Example
//!
//! ```ignore
//! use uowlayer::naming::{CollectionNameSelector, DefaultCollectionNameSelector, OverrideCollectionNameSelector};
//!
//! let convention = DefaultCollectionNameSelector;
//! assert_eq!(convention.collection_name("OrderBase"), "orderBase");
//!
//! let selector = OverrideCollectionNameSelector::new().with_override("OrderBase", "orders");
//! assert_eq!(selector.collection_name("OrderBase"), "orders");
//! ```

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use crate::error::{UnitOfWorkError, UnitOfWorkResult};

static LEAD_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z])([A-Z]+|[a-z0-9]+)($|[A-Z]\w*)").expect("lead word pattern is valid")
});

/// Maps a document type name to a physical collection name.
///
/// Implementations must be pure: the same type name always yields the same
/// collection name.
pub trait CollectionNameSelector: Send + Sync + Debug {
    /// Returns the collection name for `type_name`. May be empty, in which case
    /// [`resolve_collection_name`] rejects it.
    fn collection_name(&self, type_name: &str) -> String;
}

/// Resolves the collection name for `type_name`, rejecting empty results.
///
/// # Errors
///
/// Returns [`UnitOfWorkError::Configuration`] when the selector produced an
/// empty name.
pub fn resolve_collection_name(
    selector: &dyn CollectionNameSelector,
    type_name: &str,
) -> UnitOfWorkResult<String> {
    let name = selector.collection_name(type_name);

    if name.is_empty() {
        return Err(UnitOfWorkError::Configuration(format!(
            "collection name resolved for type `{}` is empty",
            type_name
        )));
    }

    Ok(name)
}

/// The naming convention used when nothing else is configured.
///
/// The type name is split on `_` and spaces. In the leading word every run
/// of an upper-case letter followed by upper-case letters or lower-case
/// letters/digits is lower-cased when it ends the word or precedes another
/// capital (`OrderBase` becomes `orderBase`, `HTTPServer` becomes
/// `httpServer`). Each following word gets an upper-case first letter and is
/// appended (`order_line item` becomes `orderLineItem`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollectionNameSelector;

impl CollectionNameSelector for DefaultCollectionNameSelector {
    fn collection_name(&self, type_name: &str) -> String {
        let mut words = type_name.split(['_', ' ']).filter(|word| !word.is_empty());

        let Some(lead) = words.next() else {
            return String::new();
        };

        let mut name = LEAD_WORD
            .replace_all(lead, |caps: &Captures| {
                format!(
                    "{}{}{}",
                    caps[1].to_lowercase(),
                    caps[2].to_lowercase(),
                    &caps[3]
                )
            })
            .into_owned();

        for word in words {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(chars.as_str());
            }
        }

        name
    }
}

/// A selector consulting an explicit table before delegating to another selector.
///
/// Overrides always win over the fallback.
#[derive(Debug, Clone)]
pub struct OverrideCollectionNameSelector {
    overrides: HashMap<String, String>,
    fallback: Arc<dyn CollectionNameSelector>,
}

impl OverrideCollectionNameSelector {
    /// Creates an empty override table falling back to [`DefaultCollectionNameSelector`].
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(DefaultCollectionNameSelector))
    }

    /// Creates an empty override table falling back to `fallback`.
    pub fn with_fallback(fallback: Arc<dyn CollectionNameSelector>) -> Self {
        Self {
            overrides: HashMap::new(),
            fallback,
        }
    }

    /// Pins the collection name for `type_name`.
    ///
    /// # Arguments
    ///
    /// * `type_name` - The exact type name to match
    /// * `collection_name` - The collection the type is stored in
    pub fn with_override(
        mut self,
        type_name: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        self.overrides.insert(type_name.into(), collection_name.into());
        self
    }
}

impl Default for OverrideCollectionNameSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionNameSelector for OverrideCollectionNameSelector {
    fn collection_name(&self, type_name: &str) -> String {
        match self.overrides.get(type_name) {
            Some(name) => name.clone(),
            None => self.fallback.collection_name(type_name),
        }
    }
}
