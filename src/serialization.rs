//! Wire records: the shape a catalog takes inside JSON, TOML and YAML trees.
//!
//! Records are plain serde structs with no invariants of their own. Converting a record
//! into the model is where validation happens, so a record that deserialized cleanly can
//! still be rejected with a [`ModelError`].

use crate::error::ModelError;
use crate::model::{
    ArgumentKind, ArgumentPlacement, CatalogDocument, EndTag, ExtraMap, IntermediateTag, Library,
    Position, Setting, Tag, TagArgument, TagKind,
};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value().serialize(serializer)
    }
}

/// Only called when the key is present, so a missing key stays `Absent` through
/// `#[serde(default)]` and an explicit `null` becomes `Null`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Setting::from)
    }
}

impl<T: JsonSchema> JsonSchema for Setting<T> {
    fn is_referenceable() -> bool {
        false
    }

    fn schema_name() -> String {
        Option::<T>::schema_name()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        Option::<T>::json_schema(gen)
    }
}

fn default_true() -> bool {
    true
}

/// A TagSpec catalog document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "TagSpec")]
pub struct DocumentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(
        default,
        alias = "requiresEngineVersion",
        skip_serializing_if = "Setting::is_omitted"
    )]
    pub requires_engine: Setting<String>,
    #[serde(default)]
    pub extends: Vec<String>,
    pub libraries: Vec<LibraryRecord>,
    #[serde(default, skip_serializing_if = "Setting::is_omitted")]
    pub extra: Setting<ExtraMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LibraryRecord {
    pub module: String,
    #[serde(
        default,
        alias = "requiresEngineVersion",
        skip_serializing_if = "Setting::is_omitted"
    )]
    pub requires_engine: Setting<String>,
    pub tags: Vec<TagRecord>,
    #[serde(default, skip_serializing_if = "Setting::is_omitted")]
    pub extra: Setting<ExtraMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TagKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EndRecord>,
    #[serde(default)]
    pub intermediates: Vec<IntermediateRecord>,
    #[serde(default)]
    pub args: Vec<ArgumentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EndRecord {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgumentRecord>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntermediateRecord {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgumentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArgumentRecord {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub placement: ArgumentPlacement,
    pub kind: ArgumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraMap>,
}

fn non_negative(
    value: Option<i64>,
    err: impl FnOnce(i64) -> ModelError,
) -> Result<Option<u64>, ModelError> {
    match value {
        None => Ok(None),
        Some(v) => u64::try_from(v).map(Some).map_err(|_| err(v)),
    }
}

fn convert_args(records: Vec<ArgumentRecord>) -> Result<Vec<TagArgument>, ModelError> {
    records.into_iter().map(TagArgument::try_from).collect()
}

impl TryFrom<ArgumentRecord> for TagArgument {
    type Error = ModelError;

    fn try_from(record: ArgumentRecord) -> Result<Self, Self::Error> {
        let count = non_negative(record.count, |count| ModelError::NegativeCount {
            argument: record.name.clone(),
            count,
        })?;
        let mut arg = TagArgument::new(record.name, record.kind)
            .with_required(record.required)
            .with_placement(record.placement);
        if let Some(count) = count {
            arg = arg.with_count(count);
        }
        if let Some(extra) = record.extra {
            arg = arg.with_extra(extra);
        }
        Ok(arg)
    }
}

impl TryFrom<EndRecord> for EndTag {
    type Error = ModelError;

    fn try_from(record: EndRecord) -> Result<Self, Self::Error> {
        let mut end = EndTag::new(record.name)
            .with_required(record.required)
            .with_args(convert_args(record.args)?)?;
        if let Some(extra) = record.extra {
            end = end.with_extra(extra);
        }
        Ok(end)
    }
}

impl TryFrom<IntermediateRecord> for IntermediateTag {
    type Error = ModelError;

    fn try_from(record: IntermediateRecord) -> Result<Self, Self::Error> {
        let bound = |field: &'static str| {
            let name = record.name.clone();
            move |value| ModelError::NegativeBound { name, field, value }
        };
        let min = non_negative(record.min, bound("min"))?;
        let max = non_negative(record.max, bound("max"))?;
        let mut intermediate = IntermediateTag::new(record.name)
            .with_position(record.position)
            .with_bounds(min, max)?
            .with_args(convert_args(record.args)?)?;
        if let Some(extra) = record.extra {
            intermediate = intermediate.with_extra(extra);
        }
        Ok(intermediate)
    }
}

impl TryFrom<TagRecord> for Tag {
    type Error = ModelError;

    fn try_from(record: TagRecord) -> Result<Self, Self::Error> {
        let end = record.end.map(EndTag::try_from).transpose()?;
        let intermediates = record
            .intermediates
            .into_iter()
            .map(IntermediateTag::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let mut tag = Tag::new(
            record.name,
            record.kind,
            end,
            intermediates,
            convert_args(record.args)?,
        )?;
        if let Some(extra) = record.extra {
            tag = tag.with_extra(extra);
        }
        Ok(tag)
    }
}

impl TryFrom<LibraryRecord> for Library {
    type Error = ModelError;

    fn try_from(record: LibraryRecord) -> Result<Self, Self::Error> {
        let tags = record
            .tags
            .into_iter()
            .map(Tag::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Library::new(record.module, tags)?
            .with_requires_engine(record.requires_engine)
            .with_extra(record.extra))
    }
}

impl TryFrom<DocumentRecord> for CatalogDocument {
    type Error = ModelError;

    fn try_from(record: DocumentRecord) -> Result<Self, Self::Error> {
        let libraries = record
            .libraries
            .into_iter()
            .map(Library::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let mut document = CatalogDocument::new(libraries)?
            .with_requires_engine(record.requires_engine)
            .with_extends(record.extends)
            .with_extra(record.extra);
        if let Some(version) = record.version {
            document = document.with_version(version);
        }
        if let Some(engine) = record.engine {
            document = document.with_engine(engine);
        }
        Ok(document)
    }
}

fn args_record(args: &[TagArgument]) -> Vec<ArgumentRecord> {
    args.iter().map(ArgumentRecord::from).collect()
}

fn count_record(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl From<&TagArgument> for ArgumentRecord {
    fn from(arg: &TagArgument) -> Self {
        ArgumentRecord {
            name: arg.name().to_string(),
            required: arg.required(),
            placement: arg.placement(),
            kind: arg.kind(),
            count: arg.count().map(count_record),
            extra: arg.extra().cloned(),
        }
    }
}

impl From<&EndTag> for EndRecord {
    fn from(end: &EndTag) -> Self {
        EndRecord {
            name: end.name().to_string(),
            args: args_record(end.args()),
            required: end.required(),
            extra: end.extra().cloned(),
        }
    }
}

impl From<&IntermediateTag> for IntermediateRecord {
    fn from(intermediate: &IntermediateTag) -> Self {
        IntermediateRecord {
            name: intermediate.name().to_string(),
            args: args_record(intermediate.args()),
            min: intermediate.min().map(count_record),
            max: intermediate.max().map(count_record),
            position: intermediate.position(),
            extra: intermediate.extra().cloned(),
        }
    }
}

impl From<&Tag> for TagRecord {
    fn from(tag: &Tag) -> Self {
        TagRecord {
            name: tag.name().to_string(),
            kind: tag.kind(),
            end: tag.end().map(EndRecord::from),
            intermediates: tag
                .intermediates()
                .iter()
                .map(IntermediateRecord::from)
                .collect(),
            args: args_record(tag.args()),
            extra: tag.extra().cloned(),
        }
    }
}

impl From<&Library> for LibraryRecord {
    fn from(library: &Library) -> Self {
        LibraryRecord {
            module: library.module().to_string(),
            requires_engine: library.requires_engine_setting().clone(),
            tags: library.tags().iter().map(TagRecord::from).collect(),
            extra: library.extra_setting().clone(),
        }
    }
}

impl From<&CatalogDocument> for DocumentRecord {
    fn from(document: &CatalogDocument) -> Self {
        DocumentRecord {
            version: document.declared_version().map(str::to_string),
            engine: document.declared_engine().map(str::to_string),
            requires_engine: document.requires_engine_setting().clone(),
            extends: document.extends().to_vec(),
            libraries: document.libraries().iter().map(LibraryRecord::from).collect(),
            extra: document.extra_setting().clone(),
        }
    }
}

/// The JSON Schema describing a catalog document, including the `$schema` dialect key.
pub fn catalog_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(DocumentRecord);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<CatalogDocument, ModelError> {
        let record: DocumentRecord = serde_json::from_value(value).map_err(|e| ModelError::Schema {
            message: e.to_string(),
        })?;
        CatalogDocument::try_from(record)
    }

    #[test]
    fn test_extra_null_and_absent_are_distinct() {
        let absent = decode(json!({"libraries": []})).unwrap();
        let null = decode(json!({"libraries": [], "extra": null})).unwrap();
        assert_eq!(absent.extra_setting(), &Setting::Absent);
        assert_eq!(null.extra_setting(), &Setting::Null);
    }

    #[test]
    fn test_negative_count_has_dedicated_error() {
        let err = decode(json!({
            "libraries": [{
                "module": "m",
                "tags": [{
                    "name": "t",
                    "type": "standalone",
                    "args": [{"name": "a", "kind": "variable", "count": -1}]
                }]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, ModelError::NegativeCount { .. }));
        assert!(err.to_string().contains("count must be non-negative"));
    }

    #[test]
    fn test_negative_bound_is_rejected() {
        let err = decode(json!({
            "libraries": [{
                "module": "m",
                "tags": [{
                    "name": "if",
                    "type": "block",
                    "intermediates": [{"name": "else", "max": -2}]
                }]
            }]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::NegativeBound {
                name: "else".to_string(),
                field: "max",
                value: -2
            }
        );
    }

    #[test]
    fn test_count_zero_is_written_and_absent_count_is_not() {
        let zero = ArgumentRecord::from(&TagArgument::new("a", ArgumentKind::Any).with_count(0));
        let unset = ArgumentRecord::from(&TagArgument::new("a", ArgumentKind::Any));
        assert_eq!(serde_json::to_value(&zero).unwrap()["count"], json!(0));
        assert!(serde_json::to_value(&unset).unwrap().get("count").is_none());
    }

    #[test]
    fn test_camel_case_alias_is_accepted() {
        let doc = decode(json!({"libraries": [], "requiresEngineVersion": ">=4.2"})).unwrap();
        assert_eq!(doc.requires_engine(), Some(">=4.2"));
        let record = DocumentRecord::from(&doc);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["requires_engine"], json!(">=4.2"));
        assert!(value.get("requiresEngineVersion").is_none());
    }

    #[test]
    fn test_schema_has_dialect_and_title() {
        let schema = catalog_schema();
        assert!(schema.get("$schema").is_some());
        assert_eq!(schema["title"], json!("TagSpec"));
    }
}
