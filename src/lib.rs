pub mod api;
pub mod coverage;
pub mod error;
pub mod format;
pub mod loader;
pub mod merge;
pub mod model;
pub mod reference;
pub mod resolver;
pub mod serialization;
pub mod utils;
pub mod validate;

pub use api::{
    catalog_schema, catalog_schema_json, dump_catalog, load_catalog, merge_catalogs, parse_catalog,
    validate_catalog,
};
pub use error::CatalogError;
pub use format::Format;
pub use loader::{DocumentCache, Loader};
pub use model::{CatalogDocument, Library, Tag};
pub use validate::document_defines;
