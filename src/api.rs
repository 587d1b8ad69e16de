use crate::error::{CatalogError, EncodeError, ResolutionError};
use crate::format::Format;
use crate::loader::Loader;
use crate::merge::merge;
use crate::model::CatalogDocument;
use crate::validate::validate;
use std::path::Path;

pub use crate::serialization::catalog_schema;

/// Loads the catalog at `path` with a default [`Loader`] (fresh cache, packages found
/// through `TAGSPECS_PATH`).
///
/// With `resolve_extends` the whole `extends` chain is folded in; without it only the one
/// document is read. The result is structurally validated either way.
///
/// # Errors
/// Returns a [`CatalogError`] if the document or any ancestor cannot be loaded, or if the
/// result fails validation.
pub fn load_catalog(
    path: impl AsRef<Path>,
    resolve_extends: bool,
) -> Result<CatalogDocument, CatalogError> {
    Loader::new().load(path, resolve_extends)
}

/// Decodes catalog text that did not come from a file. `name` is only used in
/// diagnostics. `extends` entries are kept as written and not followed.
///
/// # Errors
/// Returns a [`CatalogError`] if the text is malformed or describes an invalid catalog.
pub fn parse_catalog(
    source: &str,
    name: &str,
    format: Format,
) -> Result<CatalogDocument, CatalogError> {
    let document = format.decode(source, name)?;
    validate(&document)?;
    Ok(document)
}

/// Encodes `document` in `format`.
///
/// # Errors
/// Returns a [`CatalogError::Encode`] if the target format cannot represent the document.
pub fn dump_catalog(document: &CatalogDocument, format: Format) -> Result<String, CatalogError> {
    Ok(format.encode(document)?)
}

/// Folds `documents` left to right, each later one overlaying the accumulated result,
/// then validates the composite. An empty slice yields an empty catalog.
///
/// # Errors
/// Returns a [`CatalogError::Resolution`] if the composite has duplicate modules or tags.
pub fn merge_catalogs(documents: &[CatalogDocument]) -> Result<CatalogDocument, CatalogError> {
    let mut iter = documents.iter();
    let Some(first) = iter.next() else {
        return Ok(CatalogDocument::default());
    };
    let mut merged = first.clone();
    for overlay in iter {
        merged = merge(&merged, overlay)?;
    }
    validate(&merged)?;
    Ok(merged)
}

/// The catalog JSON Schema as pretty-printed text.
///
/// # Errors
/// Returns a [`CatalogError::Encode`] if the schema cannot be serialized.
pub fn catalog_schema_json() -> Result<String, CatalogError> {
    serde_json::to_string_pretty(&catalog_schema()).map_err(|e| {
        CatalogError::Encode(EncodeError {
            format: Format::Json,
            message: e.to_string(),
        })
    })
}

/// Checks a document that was built or combined in memory.
///
/// # Errors
/// Returns the first duplicate library module or tag name found.
pub fn validate_catalog(document: &CatalogDocument) -> Result<(), ResolutionError> {
    validate(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        engine = "django"

        [[libraries]]
        module = "django.template.defaulttags"

        [[libraries.tags]]
        name = "if"
        type = "block"

        [[libraries.tags.intermediates]]
        name = "elif"

        [[libraries.tags.intermediates]]
        name = "else"
        max = 1
        position = "last"

        [[libraries.tags]]
        name = "csrf_token"
        type = "standalone"
    "#;

    #[test]
    fn test_parse_catalog_from_text() {
        let doc = parse_catalog(CATALOG, "inline.toml", Format::Toml).unwrap();
        let library = doc.library("django.template.defaulttags").unwrap();
        let tag = library.tag("if").unwrap();
        assert_eq!(tag.end().map(|end| end.name()), Some("endif"));
        assert_eq!(tag.intermediates().len(), 2);
        assert!(library.tag("csrf_token").unwrap().end().is_none());
    }

    #[test]
    fn test_dump_then_parse_in_another_format() {
        let doc = parse_catalog(CATALOG, "inline.toml", Format::Toml).unwrap();
        let json = dump_catalog(&doc, Format::Json).unwrap();
        let reparsed = parse_catalog(&json, "inline.json", Format::Json).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_merge_catalogs_folds_in_order() {
        let base = parse_catalog(CATALOG, "base.toml", Format::Toml).unwrap();
        let overlay = parse_catalog(
            r#"{"engine": "custom", "libraries": [{"module": "extra", "tags": []}]}"#,
            "overlay.json",
            Format::Json,
        )
        .unwrap();
        let merged = merge_catalogs(&[base, overlay]).unwrap();
        assert_eq!(merged.engine(), "custom");
        assert_eq!(merged.libraries().len(), 2);
        assert!(merge_catalogs(&[]).unwrap().libraries().is_empty());
    }

    #[test]
    fn test_schema_names_the_wire_fields() {
        let schema = catalog_schema();
        assert!(schema.get("$schema").is_some());
        let text = schema.to_string();
        assert!(text.contains("libraries"));
        assert!(text.contains("requires_engine"));
    }
}
