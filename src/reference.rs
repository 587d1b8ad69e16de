//! Turning `extends` entries into document locations.
//!
//! An entry is either a filesystem path, resolved against the directory of the document
//! that contains it, or a package-scoped locator `pkg://<package>/<path>` resolved against
//! the root directory of an installed package.

use crate::error::LoadError;
use log::debug;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const PACKAGE_SCHEME: &str = "pkg://";

/// Environment variable holding the package search path used by [`SearchPathLocator::from_env`].
pub const SEARCH_PATH_VAR: &str = "TAGSPECS_PATH";

/// Finds the installed root directory of a package by name.
pub trait PackageLocator: fmt::Debug + Send + Sync {
    fn package_root(&self, name: &str) -> Option<PathBuf>;
}

/// Looks packages up as `<dir>/<name>` across an ordered list of directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPathLocator {
    roots: Vec<PathBuf>,
}

impl SearchPathLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        SearchPathLocator { roots }
    }

    /// Reads the search list from `TAGSPECS_PATH` using the platform's path-list syntax.
    pub fn from_env() -> Self {
        let roots = env::var_os(SEARCH_PATH_VAR)
            .map(|value| env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default();
        SearchPathLocator { roots }
    }

    /// Adds directories that take precedence over the existing ones.
    #[must_use]
    pub fn with_priority_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut combined: Vec<PathBuf> = roots.into_iter().collect();
        combined.append(&mut self.roots);
        self.roots = combined;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl PackageLocator for SearchPathLocator {
    fn package_root(&self, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(name))
            .find(|candidate| candidate.is_dir())
    }
}

/// A fixed name-to-root table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticLocator {
    packages: HashMap<String, PathBuf>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_package(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.packages.insert(name.into(), root.into());
        self
    }
}

impl PackageLocator for StaticLocator {
    fn package_root(&self, name: &str) -> Option<PathBuf> {
        self.packages.get(name).cloned()
    }
}

/// A parsed `extends` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    Path(&'a Path),
    Package { name: &'a str, path: &'a str },
}

impl<'a> Reference<'a> {
    /// Parses an entry, returning the reason when the entry is malformed.
    pub fn parse(raw: &'a str) -> Result<Self, &'static str> {
        if raw.trim().is_empty() {
            return Err("reference is empty");
        }
        let Some(locator) = raw.strip_prefix(PACKAGE_SCHEME) else {
            return Ok(Reference::Path(Path::new(raw)));
        };
        let (name, path) = locator
            .split_once('/')
            .ok_or("package locator must have the form pkg://<package>/<path>")?;
        if name.is_empty() {
            return Err("package locator is missing a package name");
        }
        if path.is_empty() {
            return Err("package locator is missing a path inside the package");
        }
        Ok(Reference::Package { name, path })
    }
}

/// Joins `relative` onto `root`, refusing anything that would leave `root`.
fn join_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut depth = 0usize;
    let mut joined = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1)?;
                joined.pop();
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}

/// Resolves one `extends` entry of the document at `referrer` to a location.
///
/// The returned path is not checked for existence; the loader reports missing documents.
pub fn resolve_reference(
    raw: &str,
    referrer: &Path,
    locator: &dyn PackageLocator,
) -> Result<PathBuf, LoadError> {
    let invalid = |reason: &str| LoadError::InvalidReference {
        reference: raw.to_string(),
        referrer: referrer.to_path_buf(),
        reason: reason.to_string(),
    };
    let location = match Reference::parse(raw).map_err(invalid)? {
        Reference::Path(path) if path.is_absolute() => path.to_path_buf(),
        Reference::Path(path) => referrer
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(path),
        Reference::Package { name, path } => {
            let root = locator
                .package_root(name)
                .ok_or_else(|| LoadError::PackageNotFound {
                    package: name.to_string(),
                    reference: raw.to_string(),
                    referrer: referrer.to_path_buf(),
                })?;
            join_within(&root, path)
                .ok_or_else(|| invalid("path escapes the package root"))?
        }
    };
    debug!("resolved reference '{}' from {} to {}", raw, referrer.display(), location.display());
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_references() {
        assert_eq!(
            Reference::parse("../base.toml"),
            Ok(Reference::Path(Path::new("../base.toml")))
        );
        assert_eq!(
            Reference::parse("pkg://mypkg/specs/catalog.toml"),
            Ok(Reference::Package {
                name: "mypkg",
                path: "specs/catalog.toml"
            })
        );
        assert!(Reference::parse("pkg://mypkg").is_err());
        assert!(Reference::parse("pkg:///catalog.toml").is_err());
        assert!(Reference::parse("pkg://mypkg/").is_err());
        assert!(Reference::parse("  ").is_err());
    }

    #[test]
    fn test_relative_path_uses_referrer_directory() {
        let locator = StaticLocator::new();
        let resolved =
            resolve_reference("base.toml", Path::new("/specs/app/overlay.toml"), &locator).unwrap();
        assert_eq!(resolved, PathBuf::from("/specs/app/base.toml"));

        let resolved =
            resolve_reference("/abs/base.json", Path::new("/specs/app/overlay.toml"), &locator)
                .unwrap();
        assert_eq!(resolved, PathBuf::from("/abs/base.json"));
    }

    #[test]
    fn test_package_reference() {
        let locator = StaticLocator::new().with_package("mypkg", "/site-packages/mypkg");
        let resolved =
            resolve_reference("pkg://mypkg/catalog.toml", Path::new("/x/overlay.toml"), &locator)
                .unwrap();
        assert_eq!(resolved, PathBuf::from("/site-packages/mypkg/catalog.toml"));

        let err = resolve_reference(
            "pkg://missing/catalog.toml",
            Path::new("/x/overlay.toml"),
            &locator,
        )
        .unwrap_err();
        match err {
            LoadError::PackageNotFound {
                package,
                reference,
                referrer,
            } => {
                assert_eq!(package, "missing");
                assert_eq!(reference, "pkg://missing/catalog.toml");
                assert_eq!(referrer, PathBuf::from("/x/overlay.toml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_package_reference_cannot_escape_root() {
        let locator = StaticLocator::new().with_package("mypkg", "/site-packages/mypkg");
        let ok =
            resolve_reference("pkg://mypkg/a/../b.toml", Path::new("/x.toml"), &locator).unwrap();
        assert_eq!(ok, PathBuf::from("/site-packages/mypkg/b.toml"));

        let err = resolve_reference("pkg://mypkg/../other/b.toml", Path::new("/x.toml"), &locator)
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidReference { .. }));
    }

    #[test]
    fn test_search_path_locator() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("mypkg")).unwrap();
        let locator = SearchPathLocator::new(vec![PathBuf::from("/does/not/exist")])
            .with_priority_roots([dir.path().to_path_buf()]);
        assert_eq!(locator.roots().len(), 2);
        assert_eq!(locator.package_root("mypkg"), Some(dir.path().join("mypkg")));
        assert_eq!(locator.package_root("other"), None);
    }
}
