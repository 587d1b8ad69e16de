//! Layering one catalog document on top of another.
//!
//! The overlay wins wherever it explicitly sets a field; presence in the source decides,
//! not value equality. Libraries are matched by module and tags by name; matched entries
//! keep the base's position and overlay-only entries are appended in overlay order.
//!
//! Tags are replaced wholesale: an overlay tag named like a base tag discards every field
//! of the base tag, including ones the overlay does not mention. Partial tag overrides are
//! not supported.

use crate::error::ResolutionError;
use crate::model::{CatalogDocument, ExtraMap, Library, Setting, Tag};
use log::debug;
use std::collections::HashMap;

/// Merges `overlay` on top of `base`. The result's `extends` is always empty, since the
/// chain it described has been folded in.
///
/// The output is not checked for duplicates here; [`crate::validate::validate`] does that.
pub fn merge(
    base: &CatalogDocument,
    overlay: &CatalogDocument,
) -> Result<CatalogDocument, ResolutionError> {
    debug!(
        "merging {} libraries over {} libraries",
        overlay.libraries().len(),
        base.libraries().len()
    );
    let version = overlay
        .declared_version()
        .or(base.declared_version())
        .map(str::to_string);
    let engine = overlay
        .declared_engine()
        .or(base.declared_engine())
        .map(str::to_string);
    let requires_engine = layer(base.requires_engine_setting(), overlay.requires_engine_setting());
    let extra = merge_extra(base.extra_setting(), overlay.extra_setting());
    let libraries = merge_libraries(base.libraries(), overlay.libraries())?;
    Ok(CatalogDocument::assemble(
        version,
        engine,
        requires_engine,
        libraries,
        extra,
    ))
}

/// Merges two definitions of the same library.
///
/// # Errors
/// [`ResolutionError::ModuleMismatch`] when the modules differ; callers are expected to
/// pair libraries by module before calling this.
pub fn merge_library(base: &Library, overlay: &Library) -> Result<Library, ResolutionError> {
    if base.module() != overlay.module() {
        return Err(ResolutionError::ModuleMismatch {
            base: base.module().to_string(),
            overlay: overlay.module().to_string(),
        });
    }
    Ok(Library::assemble(
        overlay.module().to_string(),
        layer(base.requires_engine_setting(), overlay.requires_engine_setting()),
        merge_tags(base.tags(), overlay.tags()),
        merge_extra(base.extra_setting(), overlay.extra_setting()),
    ))
}

fn merge_libraries(base: &[Library], overlay: &[Library]) -> Result<Vec<Library>, ResolutionError> {
    let index: HashMap<&str, usize> = base
        .iter()
        .enumerate()
        .map(|(i, lib)| (lib.module(), i))
        .collect();
    let mut merged = base.to_vec();
    let mut appended = Vec::new();
    for library in overlay {
        match index.get(library.module()) {
            Some(&i) => merged[i] = merge_library(&merged[i], library)?,
            None => appended.push(library.clone()),
        }
    }
    merged.extend(appended);
    Ok(merged)
}

fn merge_tags(base: &[Tag], overlay: &[Tag]) -> Vec<Tag> {
    let index: HashMap<&str, usize> = base
        .iter()
        .enumerate()
        .map(|(i, tag)| (tag.name(), i))
        .collect();
    let mut merged = base.to_vec();
    let mut appended = Vec::new();
    for tag in overlay {
        match index.get(tag.name()) {
            Some(&i) => merged[i] = tag.clone(),
            None => appended.push(tag.clone()),
        }
    }
    merged.extend(appended);
    merged
}

/// The overlay's setting when it has one (including an explicit `null`), otherwise the base's.
fn layer<T: Clone>(base: &Setting<T>, overlay: &Setting<T>) -> Setting<T> {
    if overlay.is_absent() {
        base.clone()
    } else {
        overlay.clone()
    }
}

/// Shallow merge: overlay keys win, `null` clears, absence inherits.
fn merge_extra(base: &Setting<ExtraMap>, overlay: &Setting<ExtraMap>) -> Setting<ExtraMap> {
    match overlay {
        Setting::Absent => base.clone(),
        Setting::Null => Setting::Null,
        Setting::Value(overlay_map) => {
            let mut merged = base.value().cloned().unwrap_or_default();
            merged.extend(overlay_map.iter().map(|(k, v)| (k.clone(), v.clone())));
            Setting::Value(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extra(value: serde_json::Value) -> ExtraMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("extra must be an object"),
        }
    }

    fn document(libraries: Vec<Library>) -> CatalogDocument {
        CatalogDocument::new(libraries).unwrap()
    }

    #[test]
    fn test_tags_keep_base_position_and_append_new() {
        let base = document(vec![Library::new(
            "example",
            vec![Tag::standalone("hello"), Tag::standalone("base_only")],
        )
        .unwrap()]);
        let overlay = document(vec![Library::new(
            "example",
            vec![
                Tag::standalone("hello").with_extra(extra(json!({"source": "overlay"}))),
                Tag::standalone("overlay_only"),
            ],
        )
        .unwrap()]);

        let merged = merge(&base, &overlay).unwrap();
        let tags = merged.libraries()[0].tags();
        let names: Vec<&str> = tags.iter().map(Tag::name).collect();
        assert_eq!(names, vec!["hello", "base_only", "overlay_only"]);
        assert_eq!(tags[0].extra(), Some(&extra(json!({"source": "overlay"}))));
    }

    #[test]
    fn test_tag_is_replaced_wholesale() {
        let base_tag = Tag::block("cache").with_extra(extra(json!({"a": 1})));
        let base = document(vec![Library::new("lib", vec![base_tag]).unwrap()]);
        let overlay = document(vec![Library::new("lib", vec![Tag::standalone("cache")]).unwrap()]);

        let merged = merge(&base, &overlay).unwrap();
        let tag = &merged.libraries()[0].tags()[0];
        assert_eq!(tag, &Tag::standalone("cache"));
        assert!(tag.extra().is_none());
    }

    #[test]
    fn test_new_libraries_are_appended() {
        let base = document(vec![Library::new("example", vec![Tag::standalone("hello")]).unwrap()]);
        let overlay = document(vec![Library::new("other", vec![Tag::standalone("bye")]).unwrap()]);
        let merged = merge(&base, &overlay).unwrap();
        let modules: Vec<&str> = merged.libraries().iter().map(Library::module).collect();
        assert_eq!(modules, vec!["example", "other"]);
    }

    #[test]
    fn test_presence_decides_scalar_fields() {
        let base = document(vec![])
            .with_engine("jinja2")
            .with_version("1.0")
            .with_requires_engine(Setting::Value(">=3".to_string()));
        let silent = document(vec![]);
        let merged = merge(&base, &silent).unwrap();
        assert_eq!(merged.engine(), "jinja2");
        assert_eq!(merged.version(), "1.0");
        assert_eq!(merged.requires_engine(), Some(">=3"));

        let explicit = document(vec![])
            .with_engine("django")
            .with_requires_engine(Setting::Null);
        let merged = merge(&base, &explicit).unwrap();
        assert_eq!(merged.declared_engine(), Some("django"));
        assert_eq!(merged.requires_engine(), None);
        assert_eq!(merged.version(), "1.0");
    }

    #[test]
    fn test_extra_merge_policy() {
        let base = document(vec![]).with_extra(Setting::Value(extra(json!({"a": 1, "b": 1}))));

        let inherit = merge(&base, &document(vec![])).unwrap();
        assert_eq!(inherit.extra(), Some(&extra(json!({"a": 1, "b": 1}))));

        let cleared = merge(&base, &document(vec![]).with_extra(Setting::Null)).unwrap();
        assert_eq!(cleared.extra_setting(), &Setting::Null);

        let overlay = document(vec![]).with_extra(Setting::Value(extra(json!({"b": 2, "c": 3}))));
        let merged = merge(&base, &overlay).unwrap();
        assert_eq!(merged.extra(), Some(&extra(json!({"a": 1, "b": 2, "c": 3}))));
    }

    #[test]
    fn test_library_level_override_policy() {
        let base = Library::new("lib", vec![])
            .unwrap()
            .with_requires_engine(Setting::Value(">=4".to_string()))
            .with_extra(Setting::Value(extra(json!({"k": "base"}))));
        let overlay = Library::new("lib", vec![]).unwrap();
        let merged = merge_library(&base, &overlay).unwrap();
        assert_eq!(merged.requires_engine(), Some(">=4"));
        assert_eq!(merged.extra(), Some(&extra(json!({"k": "base"}))));
    }

    #[test]
    fn test_merge_always_clears_extends() {
        let base = document(vec![]).with_extends(vec!["a.toml".to_string()]);
        let overlay = document(vec![]).with_extends(vec!["b.toml".to_string()]);
        assert!(merge(&base, &overlay).unwrap().extends().is_empty());
    }

    #[test]
    fn test_module_mismatch() {
        let err = merge_library(
            &Library::new("a", vec![]).unwrap(),
            &Library::new("b", vec![]).unwrap(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::ModuleMismatch {
                base: "a".to_string(),
                overlay: "b".to_string()
            }
        );
    }
}
