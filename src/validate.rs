use crate::error::ResolutionError;
use crate::model::CatalogDocument;
use std::collections::HashSet;

/// Structural checks that only matter once documents have been combined: library modules
/// and, within each library, tag names must be unique.
///
/// Construction already enforces both rules for a single document, so a failure here means
/// a merge produced the duplicate.
pub fn validate(document: &CatalogDocument) -> Result<(), ResolutionError> {
    let mut modules = HashSet::new();
    for library in document.libraries() {
        if !modules.insert(library.module()) {
            return Err(ResolutionError::DuplicateModule {
                module: library.module().to_string(),
            });
        }
        let mut names = HashSet::new();
        for tag in library.tags() {
            if !names.insert(tag.name()) {
                return Err(ResolutionError::DuplicateTag {
                    module: library.module().to_string(),
                    tag: tag.name().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Whether `document` has a library `module` that defines a tag called `tag_name`.
///
/// A single lookup scans the document directly. Callers asking many questions of the same
/// catalog should build a [`TagIndex`] once and query its hash set; both give the same answers.
pub fn document_defines(document: &CatalogDocument, module: &str, tag_name: &str) -> bool {
    document
        .library(module)
        .is_some_and(|library| library.tag(tag_name).is_some())
}

/// A `(module, tag)` set built once from a catalog, for answering many membership
/// queries against the same document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    entries: HashSet<(String, String)>,
}

impl TagIndex {
    pub fn new(document: &CatalogDocument) -> Self {
        let entries = document
            .libraries()
            .iter()
            .flat_map(|library| {
                library
                    .tags()
                    .iter()
                    .map(move |tag| (library.module().to_string(), tag.name().to_string()))
            })
            .collect();
        TagIndex { entries }
    }

    pub fn contains(&self, module: &str, tag_name: &str) -> bool {
        self.entries
            .contains(&(module.to_string(), tag_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
