use crate::format::Format;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the catalog engine can surface to a caller.
///
/// Each kind is terminal for the operation that raised it; the engine never retries.
#[derive(Error, Debug, Diagnostic)]
pub enum CatalogError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Encode(#[from] EncodeError),
}

/// Malformed source text for the selected format.
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("failed to parse {format} document {name}: {message}")]
#[diagnostic(
    code(tagspecs::decode),
    help("Fix the syntax near the highlighted position.")
)]
pub struct DecodeError {
    pub format: Format,
    pub name: String,
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("parser stopped here")]
    pub span: Option<SourceSpan>,
}

/// A decoded tree that does not describe a valid catalog.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("block tag '{tag}' has an end tag without a name: a name is required")]
    #[diagnostic(
        code(model::empty_end_name),
        help("Give the end tag a name, or omit `end` entirely to get `end{tag}`.")
    )]
    EmptyEndName { tag: String },

    #[error("standalone tag '{tag}' must not define an end tag")]
    #[diagnostic(code(model::standalone_end))]
    StandaloneWithEnd { tag: String },

    #[error("standalone tag '{tag}' must not define intermediate tags")]
    #[diagnostic(code(model::standalone_intermediates))]
    StandaloneWithIntermediates { tag: String },

    #[error("duplicate argument names in {owner}: {}", .names.join(", "))]
    #[diagnostic(code(model::duplicate_arguments))]
    DuplicateArguments { owner: String, names: Vec<String> },

    #[error("duplicate tag names in library {module}: {}", .names.join(", "))]
    #[diagnostic(code(model::duplicate_tags))]
    DuplicateTags { module: String, names: Vec<String> },

    #[error("duplicate library modules: {}", .names.join(", "))]
    #[diagnostic(code(model::duplicate_modules))]
    DuplicateModules { names: Vec<String> },

    #[error("intermediate tag '{name}': max ({max}) must be >= min ({min})")]
    #[diagnostic(code(model::invalid_bounds))]
    InvalidBounds { name: String, min: u64, max: u64 },

    #[error("intermediate tag '{name}': {field} must be non-negative (found {value})")]
    #[diagnostic(code(model::negative_bound))]
    NegativeBound {
        name: String,
        field: &'static str,
        value: i64,
    },

    #[error("argument '{argument}': count must be non-negative (found {count})")]
    #[diagnostic(
        code(model::negative_count),
        help("Omit `count` to leave the cardinality unconstrained; `0` is a valid count.")
    )]
    NegativeCount { argument: String, count: i64 },

    #[error("invalid catalog structure: {message}")]
    #[diagnostic(code(model::schema))]
    Schema { message: String },
}

/// A document or one of its references could not be read.
#[derive(Error, Debug, Diagnostic)]
pub enum LoadError {
    #[error("catalog document not found: {}", .location.display())]
    #[diagnostic(code(load::not_found))]
    NotFound { location: PathBuf },

    #[error("'{reference}' extended by {} does not exist: {}", .referrer.display(), .location.display())]
    #[diagnostic(code(load::missing_reference))]
    MissingReference {
        reference: String,
        referrer: PathBuf,
        location: PathBuf,
    },

    #[error("failed to read catalog document {}", .location.display())]
    #[diagnostic(code(load::unreadable))]
    Unreadable {
        location: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document {} is not well-formed", .location.display())]
    #[diagnostic(code(load::syntax))]
    Syntax {
        location: PathBuf,
        #[source]
        #[diagnostic_source]
        source: DecodeError,
    },

    #[error("document {} is not a valid catalog", .location.display())]
    #[diagnostic(code(load::invalid))]
    Invalid {
        location: PathBuf,
        #[source]
        #[diagnostic_source]
        source: ModelError,
    },

    #[error("package '{package}' referenced as '{reference}' from {} is not installed", .referrer.display())]
    #[diagnostic(
        code(load::package_not_found),
        help("Add the directory that contains the package to TAGSPECS_PATH.")
    )]
    PackageNotFound {
        package: String,
        reference: String,
        referrer: PathBuf,
    },

    #[error("invalid reference '{reference}' in {}: {reason}", .referrer.display())]
    #[diagnostic(code(load::invalid_reference))]
    InvalidReference {
        reference: String,
        referrer: PathBuf,
        reason: String,
    },
}

/// Composition failed after every document was individually valid.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("circular extends chain detected: {}", format_cycle(.cycle))]
    #[diagnostic(
        code(resolution::cycle),
        help("Remove one of the `extends` entries so the chain terminates.")
    )]
    Cycle { cycle: Vec<PathBuf> },

    #[error("duplicate library module detected after merge: {module}")]
    #[diagnostic(code(resolution::duplicate_module))]
    DuplicateModule { module: String },

    #[error("duplicate tag detected in library {module}: {tag}")]
    #[diagnostic(code(resolution::duplicate_tag))]
    DuplicateTag { module: String, tag: String },

    #[error("cannot merge libraries with different modules: {base} vs {overlay}")]
    #[diagnostic(code(resolution::module_mismatch))]
    ModuleMismatch { base: String, overlay: String },
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<String>>()
        .join(" -> ")
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum UnsupportedFormatError {
    #[error("unknown format: cannot infer a catalog format from extension '{extension}' of {}", .location.display())]
    #[diagnostic(
        code(format::unknown_extension),
        help("Use one of the extensions .json, .toml, .yaml or .yml.")
    )]
    Extension { extension: String, location: PathBuf },

    #[error("unknown format '{name}'; choose one of: {choices}")]
    #[diagnostic(code(format::unknown_name))]
    Name { name: String, choices: String },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("failed to encode catalog as {format}: {message}")]
#[diagnostic(code(tagspecs::encode))]
pub struct EncodeError {
    pub format: Format,
    pub message: String,
}
