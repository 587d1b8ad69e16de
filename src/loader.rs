use crate::error::{CatalogError, LoadError};
use crate::format::Format;
use crate::model::CatalogDocument;
use crate::reference::{PackageLocator, SearchPathLocator};
use crate::resolver::Resolver;
use crate::validate::validate;
use log::{debug, trace};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Parsed documents keyed by their canonical location.
///
/// Cloning shares the underlying map, so one cache can back several loaders. Documents are
/// immutable once parsed, which is what makes sharing them safe.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    entries: Arc<Mutex<HashMap<PathBuf, Arc<CatalogDocument>>>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &Path) -> Option<Arc<CatalogDocument>> {
        self.lock().get(location).cloned()
    }

    pub fn insert(&self, location: PathBuf, document: Arc<CatalogDocument>) {
        self.lock().insert(location, document);
    }

    pub fn contains(&self, location: &Path) -> bool {
        self.lock().contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<CatalogDocument>>> {
        // A panic while holding the lock cannot leave a half-inserted document behind.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads catalog documents from disk and resolves their `extends` chains.
#[derive(Debug, Clone)]
pub struct Loader {
    cache: DocumentCache,
    locator: Arc<dyn PackageLocator>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// A loader with a fresh cache that finds packages through `TAGSPECS_PATH`.
    pub fn new() -> Self {
        Self::with_locator(SearchPathLocator::from_env())
    }

    pub fn with_locator(locator: impl PackageLocator + 'static) -> Self {
        Loader {
            cache: DocumentCache::new(),
            locator: Arc::new(locator),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: DocumentCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn locator(&self) -> &dyn PackageLocator {
        self.locator.as_ref()
    }

    /// Loads the document at `path`, resolving its `extends` chain unless
    /// `resolve_extends` is false. Either way the result passes structural validation.
    ///
    /// # Errors
    /// Returns a [`CatalogError`] describing the first failure encountered.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        resolve_extends: bool,
    ) -> Result<CatalogDocument, CatalogError> {
        if resolve_extends {
            self.resolve(path)
        } else {
            self.load_raw(path)
        }
    }

    /// Loads a single document without following `extends`.
    pub fn load_raw(&self, path: impl AsRef<Path>) -> Result<CatalogDocument, CatalogError> {
        let location = self.locate(path.as_ref())?;
        let document = self.read_document(&location)?;
        validate(&document)?;
        Ok(document.as_ref().clone())
    }

    /// Loads a document and folds in every document it extends.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<CatalogDocument, CatalogError> {
        Resolver::new(self).resolve(path.as_ref())
    }

    /// Canonicalizes `path`, reporting a missing document as [`LoadError::NotFound`].
    pub(crate) fn locate(&self, path: &Path) -> Result<PathBuf, LoadError> {
        fs::canonicalize(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                location: path.to_path_buf(),
            },
            _ => LoadError::Unreadable {
                location: path.to_path_buf(),
                source,
            },
        })
    }

    /// Reads and parses the document at an already-canonical `location`, going through
    /// the cache.
    pub(crate) fn read_document(
        &self,
        location: &Path,
    ) -> Result<Arc<CatalogDocument>, CatalogError> {
        if let Some(document) = self.cache.get(location) {
            trace!("cache hit for {}", location.display());
            return Ok(document);
        }
        let format = Format::from_path(location)?;
        debug!("reading {} catalog {}", format, location.display());
        let source = fs::read_to_string(location).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                location: location.to_path_buf(),
            },
            _ => LoadError::Unreadable {
                location: location.to_path_buf(),
                source,
            },
        })?;
        let name = location.display().to_string();
        let document = format.decode(&source, &name).map_err(|err| match err {
            CatalogError::Decode(source) => CatalogError::Load(LoadError::Syntax {
                location: location.to_path_buf(),
                source,
            }),
            CatalogError::Model(source) => CatalogError::Load(LoadError::Invalid {
                location: location.to_path_buf(),
                source,
            }),
            other => other,
        })?;
        let document = Arc::new(document);
        self.cache.insert(location.to_path_buf(), Arc::clone(&document));
        Ok(document)
    }
}
