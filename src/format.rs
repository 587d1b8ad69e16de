use crate::error::{CatalogError, DecodeError, EncodeError, ModelError, UnsupportedFormatError};
use crate::model::CatalogDocument;
use crate::serialization::DocumentRecord;
use crate::utils::{get_line_and_column, get_offset};
use miette::{NamedSource, SourceSpan};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A serialized encoding of a catalog document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Toml,
    Yaml,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Json, Format::Toml, Format::Yaml];

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Toml => "toml",
            Format::Yaml => "yaml",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Json => &["json"],
            Format::Toml => &["toml"],
            Format::Yaml => &["yaml", "yml"],
        }
    }

    /// Picks the format from a file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, UnsupportedFormatError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Format::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&extension.as_str()))
            .ok_or_else(|| UnsupportedFormatError::Extension {
                extension: if extension.is_empty() {
                    String::new()
                } else {
                    format!(".{extension}")
                },
                location: path.to_path_buf(),
            })
    }

    /// Picks the format from an explicit, case-insensitive name such as `"TOML"`.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedFormatError> {
        let lowered = name.to_lowercase();
        Format::ALL
            .into_iter()
            .find(|format| {
                format.name() == lowered || format.extensions().contains(&lowered.as_str())
            })
            .ok_or_else(|| UnsupportedFormatError::Name {
                name: name.to_string(),
                choices: Format::ALL.map(Format::name).join(", "),
            })
    }

    /// Parses `source` into a generic tree, then converts the tree into a validated document.
    ///
    /// Syntax problems surface as [`CatalogError::Decode`]; a well-formed tree that breaks a
    /// model rule surfaces as [`CatalogError::Model`].
    pub fn decode(self, source: &str, name: &str) -> Result<CatalogDocument, CatalogError> {
        let record: DocumentRecord = match self {
            Format::Json => {
                let tree: serde_json::Value = serde_json::from_str(source).map_err(|e| {
                    let span = (e.line() > 0)
                        .then(|| point(get_offset(source, e.line(), e.column())));
                    self.decode_error(source, name, e.to_string(), span)
                })?;
                from_tree(serde_json::from_value(tree))?
            }
            Format::Toml => {
                let tree: toml::Table = toml::from_str(source).map_err(|e| {
                    let (message, span) = match e.span() {
                        Some(range) => {
                            let (line, column) = get_line_and_column(source, range.start);
                            (
                                format!(
                                    "{} at line {line} column {column}",
                                    e.message().trim_end()
                                ),
                                Some(SourceSpan::from(range)),
                            )
                        }
                        None => (e.message().trim_end().to_string(), None),
                    };
                    self.decode_error(source, name, message, span)
                })?;
                from_tree(toml::Value::Table(tree).try_into())?
            }
            Format::Yaml => {
                let tree: serde_yaml::Value = serde_yaml::from_str(source).map_err(|e| {
                    let span = e.location().map(|loc| point(loc.index()));
                    self.decode_error(source, name, e.to_string(), span)
                })?;
                from_tree(serde_yaml::from_value(tree))?
            }
        };
        Ok(CatalogDocument::try_from(record)?)
    }

    /// Serializes a document in canonical form. JSON is pretty-printed with two-space
    /// indentation and sorted keys.
    ///
    /// An explicit `null` for `requires_engine` or `extra` is omitted like an absent value,
    /// so such a document decodes back with the field absent rather than null. Every other
    /// document round-trips exactly.
    pub fn encode(self, document: &CatalogDocument) -> Result<String, EncodeError> {
        let record = DocumentRecord::from(document);
        let encoded = match self {
            Format::Json => serde_json::to_value(&record)
                .and_then(|tree| serde_json::to_string_pretty(&tree))
                .map_err(|e| e.to_string()),
            Format::Toml => toml::to_string_pretty(&record).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::to_string(&record).map_err(|e| e.to_string()),
        };
        encoded.map_err(|message| EncodeError {
            format: self,
            message,
        })
    }

    fn decode_error(
        self,
        source: &str,
        name: &str,
        message: String,
        span: Option<SourceSpan>,
    ) -> DecodeError {
        DecodeError {
            format: self,
            name: name.to_string(),
            message,
            src: NamedSource::new(name, source.to_string()),
            span,
        }
    }
}

fn point(offset: usize) -> SourceSpan {
    SourceSpan::from((offset, 0))
}

/// Maps a tree-to-record failure (missing field, unknown variant, wrong type) to a model error.
fn from_tree<T: DeserializeOwned, E: fmt::Display>(result: Result<T, E>) -> Result<T, ModelError> {
    result.map_err(|e| ModelError::Schema {
        message: e.to_string(),
    })
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_name(s)
    }
}
