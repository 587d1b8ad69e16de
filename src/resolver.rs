use crate::error::{CatalogError, LoadError, ResolutionError};
use crate::loader::Loader;
use crate::merge::merge;
use crate::model::CatalogDocument;
use crate::reference::resolve_reference;
use crate::validate::validate;
use log::debug;
use std::path::{Path, PathBuf};

/// Walks an `extends` graph depth-first and folds every ancestor into one document.
///
/// A resolver is cheap and meant to be created per top-level call; the loader it borrows
/// holds the (optionally shared) document cache.
pub struct Resolver<'l> {
    loader: &'l Loader,
    // Locations currently being resolved, outermost first. Used to detect cycles.
    resolving_stack: Vec<PathBuf>,
}

impl<'l> Resolver<'l> {
    pub fn new(loader: &'l Loader) -> Self {
        Resolver {
            loader,
            resolving_stack: Vec::new(),
        }
    }

    /// Resolves the document at `path` and validates the composite.
    ///
    /// # Errors
    /// Any load failure along the chain, a cycle, or a duplicate identifier in the result.
    /// There is no partial result: a failure in any ancestor aborts the whole resolution.
    pub fn resolve(&mut self, path: &Path) -> Result<CatalogDocument, CatalogError> {
        let location = self.loader.locate(path)?;
        let resolved = self.resolve_location(location)?;
        validate(&resolved)?;
        Ok(resolved)
    }

    fn resolve_location(&mut self, location: PathBuf) -> Result<CatalogDocument, CatalogError> {
        if self.resolving_stack.contains(&location) {
            let mut cycle = self.resolving_stack.clone();
            cycle.push(location);
            return Err(ResolutionError::Cycle { cycle }.into());
        }
        self.resolving_stack.push(location.clone());
        let result = self.fold_ancestors(&location);
        self.resolving_stack.pop();
        result
    }

    fn fold_ancestors(&mut self, location: &Path) -> Result<CatalogDocument, CatalogError> {
        let document = self.loader.read_document(location)?;
        let mut base: Option<CatalogDocument> = None;
        for reference in document.extends() {
            let target = resolve_reference(reference, location, self.loader.locator())?;
            let target = self.loader.locate(&target).map_err(|err| match err {
                LoadError::NotFound { location: missing } => LoadError::MissingReference {
                    reference: reference.clone(),
                    referrer: location.to_path_buf(),
                    location: missing,
                },
                other => other,
            })?;
            let ancestor = self.resolve_location(target)?;
            base = Some(match base {
                None => ancestor,
                Some(folded) => merge(&folded, &ancestor)?,
            });
        }
        match base {
            None => Ok(document.as_ref().clone()),
            Some(folded) => {
                debug!(
                    "folding {} over {} ancestor(s)",
                    location.display(),
                    document.extends().len()
                );
                Ok(merge(&folded, &document)?.without_extends())
            }
        }
    }
}
