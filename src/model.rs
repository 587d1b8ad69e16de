//! Typed catalog documents.
//!
//! Every constructor here validates the rules that can be checked by looking at a single
//! value, so an invalid tag, argument or library is never observable. Rules that only show
//! up after several documents are merged live in [`crate::validate`].

use crate::error::ModelError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Caller-defined metadata. Never interpreted, only merged shallowly.
pub type ExtraMap = serde_json::Map<String, serde_json::Value>;

/// The engine a catalog targets when the document does not say otherwise.
pub const DEFAULT_ENGINE: &str = "django";

/// The version a catalog reports when the document does not declare one.
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A field whose absence and explicit `null` mean different things when layering documents.
///
/// `Absent` inherits from the base document, `Null` clears the inherited value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Absent
    }
}

impl<T> Setting<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Setting::Absent)
    }

    /// True when there is nothing to write out: both `Absent` and `Null` are omitted.
    pub fn is_omitted(&self) -> bool {
        !matches!(self, Setting::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Value(v) => Some(v),
            Setting::Absent | Setting::Null => None,
        }
    }
}

impl<T> From<Option<T>> for Setting<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Setting::Value(v),
            None => Setting::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Block,
    Loader,
    Standalone,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::Block => "block",
            TagKind::Loader => "loader",
            TagKind::Standalone => "standalone",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Any,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentPlacement {
    #[default]
    Both,
    Positional,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentKind {
    Any,
    Assignment,
    Choice,
    Literal,
    Modifier,
    Syntax,
    Variable,
}

/// Returns the names that occur more than once, sorted and deduplicated.
fn duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut repeated = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            repeated.insert(name);
        }
    }
    repeated.into_iter().map(str::to_string).collect()
}

fn check_arguments(owner: impl FnOnce() -> String, args: &[TagArgument]) -> Result<(), ModelError> {
    let names = duplicates(args.iter().map(|a| a.name.as_str()));
    if names.is_empty() {
        Ok(())
    } else {
        Err(ModelError::DuplicateArguments {
            owner: owner(),
            names,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagArgument {
    name: String,
    required: bool,
    placement: ArgumentPlacement,
    kind: ArgumentKind,
    count: Option<u64>,
    extra: Option<ExtraMap>,
}

impl TagArgument {
    pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
        TagArgument {
            name: name.into(),
            required: true,
            placement: ArgumentPlacement::Both,
            kind,
            count: None,
            extra: None,
        }
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: ArgumentPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Constrains how many tokens the argument consumes. `0` is meaningful and distinct
    /// from leaving the count unset.
    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn placement(&self) -> ArgumentPlacement {
        self.placement
    }

    pub fn kind(&self) -> ArgumentKind {
        self.kind
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn extra(&self) -> Option<&ExtraMap> {
        self.extra.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndTag {
    name: String,
    args: Vec<TagArgument>,
    required: bool,
    extra: Option<ExtraMap>,
}

impl EndTag {
    pub fn new(name: impl Into<String>) -> Self {
        EndTag {
            name: name.into(),
            args: Vec::new(),
            required: true,
            extra: None,
        }
    }

    /// The end tag a block tag gets when it does not declare one: `end<name>`.
    pub fn implicit_for(tag_name: &str) -> Self {
        EndTag::new(format!("end{tag_name}"))
    }

    pub fn with_args(mut self, args: Vec<TagArgument>) -> Result<Self, ModelError> {
        check_arguments(|| format!("end tag '{}'", self.name), &args)?;
        self.args = args;
        Ok(self)
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TagArgument] {
        &self.args
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn extra(&self) -> Option<&ExtraMap> {
        self.extra.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateTag {
    name: String,
    args: Vec<TagArgument>,
    min: Option<u64>,
    max: Option<u64>,
    position: Position,
    extra: Option<ExtraMap>,
}

impl IntermediateTag {
    pub fn new(name: impl Into<String>) -> Self {
        IntermediateTag {
            name: name.into(),
            args: Vec::new(),
            min: None,
            max: None,
            position: Position::Any,
            extra: None,
        }
    }

    pub fn with_bounds(mut self, min: Option<u64>, max: Option<u64>) -> Result<Self, ModelError> {
        if let (Some(min), Some(max)) = (min, max) {
            if max < min {
                return Err(ModelError::InvalidBounds {
                    name: self.name,
                    min,
                    max,
                });
            }
        }
        self.min = min;
        self.max = max;
        Ok(self)
    }

    pub fn with_args(mut self, args: Vec<TagArgument>) -> Result<Self, ModelError> {
        check_arguments(|| format!("intermediate tag '{}'", self.name), &args)?;
        self.args = args;
        Ok(self)
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TagArgument] {
        &self.args
    }

    pub fn min(&self) -> Option<u64> {
        self.min
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn extra(&self) -> Option<&ExtraMap> {
        self.extra.as_ref()
    }
}

/// The kind-specific structure of a tag. Each variant carries only what its kind allows,
/// so a standalone tag with an end tag cannot be represented.
#[derive(Debug, Clone, PartialEq)]
pub enum TagShape {
    Block {
        end: EndTag,
        intermediates: Vec<IntermediateTag>,
    },
    Loader {
        end: Option<EndTag>,
        intermediates: Vec<IntermediateTag>,
    },
    Standalone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    name: String,
    shape: TagShape,
    args: Vec<TagArgument>,
    extra: Option<ExtraMap>,
}

impl Tag {
    /// Builds a tag from loosely-typed parts, enforcing the per-kind rules.
    ///
    /// # Errors
    /// Returns a [`ModelError`] when the parts are inconsistent with `kind`, when an explicit
    /// end tag has an empty name, or when argument names repeat.
    pub fn new(
        name: impl Into<String>,
        kind: TagKind,
        end: Option<EndTag>,
        intermediates: Vec<IntermediateTag>,
        args: Vec<TagArgument>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if let Some(end) = &end {
            if end.name.is_empty() {
                return Err(ModelError::EmptyEndName { tag: name });
            }
        }
        let shape = match kind {
            TagKind::Block => TagShape::Block {
                end: end.unwrap_or_else(|| EndTag::implicit_for(&name)),
                intermediates,
            },
            TagKind::Loader => TagShape::Loader { end, intermediates },
            TagKind::Standalone => {
                if end.is_some() {
                    return Err(ModelError::StandaloneWithEnd { tag: name });
                }
                if !intermediates.is_empty() {
                    return Err(ModelError::StandaloneWithIntermediates { tag: name });
                }
                TagShape::Standalone
            }
        };
        check_arguments(|| format!("tag '{name}'"), &args)?;
        Ok(Tag {
            name,
            shape,
            args,
            extra: None,
        })
    }

    pub fn standalone(name: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            shape: TagShape::Standalone,
            args: Vec::new(),
            extra: None,
        }
    }

    /// A block tag closed by its implicit `end<name>` tag.
    pub fn block(name: impl Into<String>) -> Self {
        let name = name.into();
        Tag {
            shape: TagShape::Block {
                end: EndTag::implicit_for(&name),
                intermediates: Vec::new(),
            },
            name,
            args: Vec::new(),
            extra: None,
        }
    }

    pub fn with_args(mut self, args: Vec<TagArgument>) -> Result<Self, ModelError> {
        check_arguments(|| format!("tag '{}'", self.name), &args)?;
        self.args = args;
        Ok(self)
    }

    #[must_use]
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TagKind {
        match self.shape {
            TagShape::Block { .. } => TagKind::Block,
            TagShape::Loader { .. } => TagKind::Loader,
            TagShape::Standalone => TagKind::Standalone,
        }
    }

    pub fn shape(&self) -> &TagShape {
        &self.shape
    }

    pub fn end(&self) -> Option<&EndTag> {
        match &self.shape {
            TagShape::Block { end, .. } => Some(end),
            TagShape::Loader { end, .. } => end.as_ref(),
            TagShape::Standalone => None,
        }
    }

    pub fn intermediates(&self) -> &[IntermediateTag] {
        match &self.shape {
            TagShape::Block { intermediates, .. } | TagShape::Loader { intermediates, .. } => {
                intermediates
            }
            TagShape::Standalone => &[],
        }
    }

    pub fn args(&self) -> &[TagArgument] {
        &self.args
    }

    pub fn extra(&self) -> Option<&ExtraMap> {
        self.extra.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    module: String,
    requires_engine: Setting<String>,
    tags: Vec<Tag>,
    extra: Setting<ExtraMap>,
}

impl Library {
    /// # Errors
    /// Fails with [`ModelError::DuplicateTags`] when two tags share a name.
    pub fn new(module: impl Into<String>, tags: Vec<Tag>) -> Result<Self, ModelError> {
        let module = module.into();
        let names = duplicates(tags.iter().map(|t| t.name.as_str()));
        if !names.is_empty() {
            return Err(ModelError::DuplicateTags { module, names });
        }
        Ok(Library::assemble(
            module,
            Setting::Absent,
            tags,
            Setting::Absent,
        ))
    }

    /// Builds a library without checking tag uniqueness. Used by the merge engine, whose
    /// output is checked afterwards by [`crate::validate::validate`].
    pub(crate) fn assemble(
        module: String,
        requires_engine: Setting<String>,
        tags: Vec<Tag>,
        extra: Setting<ExtraMap>,
    ) -> Self {
        Library {
            module,
            requires_engine,
            tags,
            extra,
        }
    }

    #[must_use]
    pub fn with_requires_engine(mut self, requires_engine: Setting<String>) -> Self {
        self.requires_engine = requires_engine;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: Setting<ExtraMap>) -> Self {
        self.extra = extra;
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn requires_engine(&self) -> Option<&str> {
        self.requires_engine.value().map(String::as_str)
    }

    pub fn requires_engine_setting(&self) -> &Setting<String> {
        &self.requires_engine
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn extra(&self) -> Option<&ExtraMap> {
        self.extra.value()
    }

    pub fn extra_setting(&self) -> &Setting<ExtraMap> {
        &self.extra
    }
}

/// One catalog document: a set of tag libraries plus the documents it extends.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogDocument {
    version: Option<String>,
    engine: Option<String>,
    requires_engine: Setting<String>,
    extends: Vec<String>,
    libraries: Vec<Library>,
    extra: Setting<ExtraMap>,
}

impl CatalogDocument {
    /// # Errors
    /// Fails with [`ModelError::DuplicateModules`] when two libraries share a module.
    pub fn new(libraries: Vec<Library>) -> Result<Self, ModelError> {
        let names = duplicates(libraries.iter().map(|l| l.module.as_str()));
        if !names.is_empty() {
            return Err(ModelError::DuplicateModules { names });
        }
        Ok(CatalogDocument {
            libraries,
            ..CatalogDocument::default()
        })
    }

    pub(crate) fn assemble(
        version: Option<String>,
        engine: Option<String>,
        requires_engine: Setting<String>,
        libraries: Vec<Library>,
        extra: Setting<ExtraMap>,
    ) -> Self {
        CatalogDocument {
            version,
            engine,
            requires_engine,
            extends: Vec::new(),
            libraries,
            extra,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    #[must_use]
    pub fn with_requires_engine(mut self, requires_engine: Setting<String>) -> Self {
        self.requires_engine = requires_engine;
        self
    }

    #[must_use]
    pub fn with_extends(mut self, extends: Vec<String>) -> Self {
        self.extends = extends;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: Setting<ExtraMap>) -> Self {
        self.extra = extra;
        self
    }

    /// The same document with its `extends` chain dropped, as after resolution.
    #[must_use]
    pub fn without_extends(mut self) -> Self {
        self.extends.clear();
        self
    }

    /// The declared version, or the crate's own version when the document has none.
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    pub fn declared_version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn engine(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    pub fn declared_engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn requires_engine(&self) -> Option<&str> {
        self.requires_engine.value().map(String::as_str)
    }

    pub fn requires_engine_setting(&self) -> &Setting<String> {
        &self.requires_engine
    }

    pub fn extends(&self) -> &[String] {
        &self.extends
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn library(&self, module: &str) -> Option<&Library> {
        self.libraries.iter().find(|l| l.module == module)
    }

    pub fn extra(&self) -> Option<&ExtraMap> {
        self.extra.value()
    }

    pub fn extra_setting(&self) -> &Setting<ExtraMap> {
        &self.extra
    }
}
