//! Comparing a resolved catalog against the tags an engine actually registers.
//!
//! The registry listing itself comes from outside (typically an introspection script run
//! inside the engine's environment); this module only annotates, filters, counts and
//! renders it.

use crate::model::CatalogDocument;
use crate::validate::TagIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

/// One tag registered in a running engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredTag {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub library: Option<String>,
    /// Whether the catalog documents this tag; `None` when no catalog was consulted.
    #[serde(default)]
    pub has_spec: Option<bool>,
}

impl RegisteredTag {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        library: Option<&str>,
    ) -> Self {
        RegisteredTag {
            name: name.into(),
            module: module.into(),
            library: library.map(str::to_string),
            has_spec: None,
        }
    }

    #[must_use]
    pub fn with_spec(mut self, has_spec: Option<bool>) -> Self {
        self.has_spec = has_spec;
        self
    }

    /// The top-level package of the tag's module: `django` for `django.template.defaulttags`.
    pub fn package(&self) -> &str {
        self.module.split('.').next().unwrap_or(&self.module)
    }
}

/// Sets `has_spec` on every tag according to whether `catalog` defines it.
pub fn annotate(tags: &mut [RegisteredTag], catalog: &CatalogDocument) {
    let index = TagIndex::new(catalog);
    for tag in tags {
        tag.has_spec = Some(index.contains(&tag.module, &tag.name));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageStats {
    pub total: usize,
    pub documented: usize,
}

impl CoverageStats {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.documented as f64 / self.total as f64 * 100.0
        }
    }

    fn record(&mut self, tag: &RegisteredTag) {
        self.total += 1;
        if tag.has_spec == Some(true) {
            self.documented += 1;
        }
    }
}

/// Overall coverage plus coverage per module.
pub fn coverage_stats(
    tags: &[RegisteredTag],
) -> (CoverageStats, BTreeMap<String, CoverageStats>) {
    let mut overall = CoverageStats::default();
    let mut by_module: BTreeMap<String, CoverageStats> = BTreeMap::new();
    for tag in tags {
        overall.record(tag);
        by_module.entry(tag.module.clone()).or_default().record(tag);
    }
    (overall, by_module)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpecStatus {
    #[default]
    All,
    Documented,
    Missing,
}

impl FromStr for SpecStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(SpecStatus::All),
            "documented" => Ok(SpecStatus::Documented),
            "missing" => Ok(SpecStatus::Missing),
            other => Err(format!(
                "unknown status '{other}'; choose one of: all, documented, missing"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupBy {
    #[default]
    Module,
    Package,
}

impl GroupBy {
    pub fn key<'a>(&self, tag: &'a RegisteredTag) -> &'a str {
        match self {
            GroupBy::Module => &tag.module,
            GroupBy::Package => tag.package(),
        }
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module" => Ok(GroupBy::Module),
            "package" => Ok(GroupBy::Package),
            other => Err(format!(
                "unknown grouping '{other}'; choose one of: module, package"
            )),
        }
    }
}

/// Case-insensitive substring filters; an unset criterion matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub module: Option<String>,
    pub library: Option<String>,
    pub name: Option<String>,
    pub status: SpecStatus,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl TagFilter {
    pub fn matches(&self, tag: &RegisteredTag) -> bool {
        if let Some(module) = &self.module {
            if !contains_ignore_case(&tag.module, module) {
                return false;
            }
        }
        if let Some(library) = &self.library {
            match &tag.library {
                Some(tag_library) if contains_ignore_case(tag_library, library) => {}
                _ => return false,
            }
        }
        if let Some(name) = &self.name {
            if !contains_ignore_case(&tag.name, name) {
                return false;
            }
        }
        match self.status {
            SpecStatus::All => true,
            SpecStatus::Documented => tag.has_spec == Some(true),
            SpecStatus::Missing => tag.has_spec == Some(false),
        }
    }

    pub fn apply(&self, tags: &[RegisteredTag]) -> Vec<RegisteredTag> {
        tags.iter().filter(|tag| self.matches(tag)).cloned().collect()
    }
}

/// JSON rendering: a flat array, or an object keyed by package when grouping by package.
pub fn to_json(tags: &[RegisteredTag], group_by: GroupBy) -> Result<String, serde_json::Error> {
    match group_by {
        GroupBy::Module => serde_json::to_string_pretty(tags),
        GroupBy::Package => {
            let mut grouped: BTreeMap<&str, Vec<&RegisteredTag>> = BTreeMap::new();
            for tag in tags {
                grouped.entry(tag.package()).or_default().push(tag);
            }
            serde_json::to_string_pretty(&grouped)
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn spec_label(has_spec: Option<bool>) -> &'static str {
    match has_spec {
        Some(true) => "True",
        Some(false) => "False",
        None => "",
    }
}

/// CSV rendering with a header row; grouping by package adds a leading `package` column.
pub fn to_csv(tags: &[RegisteredTag], group_by: GroupBy) -> String {
    let mut out = String::new();
    let mut header = vec!["name", "module", "library", "has_spec"];
    if group_by == GroupBy::Package {
        header.insert(0, "package");
    }
    out.push_str(&header.join(","));
    out.push_str("\r\n");
    for tag in tags {
        let mut row = vec![
            csv_field(&tag.name),
            csv_field(&tag.module),
            csv_field(tag.library.as_deref().unwrap_or_default()),
            spec_label(tag.has_spec).to_string(),
        ];
        if group_by == GroupBy::Package {
            row.insert(0, csv_field(tag.package()));
        }
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Plain-text tables, one per group, sorted by group then tag name. Spec and coverage
/// columns appear only when `with_coverage` is set.
pub fn to_table(tags: &[RegisteredTag], group_by: GroupBy, with_coverage: bool) -> String {
    let mut groups: BTreeMap<&str, Vec<&RegisteredTag>> = BTreeMap::new();
    for tag in tags {
        groups.entry(group_by.key(tag)).or_default().push(tag);
    }

    let mut out = String::new();
    for (key, mut members) in groups {
        members.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.module.cmp(&b.module)));
        let show_library = members.iter().any(|t| t.library.is_some());
        let show_module = group_by == GroupBy::Package;

        let mut headers = vec!["Name"];
        if show_module {
            headers.push("Module");
        }
        if show_library {
            headers.push("Library");
        }
        if with_coverage {
            headers.push("Spec");
        }
        let rows: Vec<Vec<String>> = members
            .iter()
            .map(|tag| {
                let mut row = vec![tag.name.clone()];
                if show_module {
                    row.push(tag.module.clone());
                }
                if show_library {
                    row.push(tag.library.clone().unwrap_or_default());
                }
                if with_coverage {
                    let mark = if tag.has_spec == Some(true) { "yes" } else { "no" };
                    row.push(mark.to_string());
                }
                row
            })
            .collect();

        let _ = writeln!(out, "{key}");
        if with_coverage {
            let mut stats = CoverageStats::default();
            for tag in &members {
                stats.record(tag);
            }
            let _ = writeln!(
                out,
                "Coverage: {}/{} ({:.1}%)",
                stats.documented,
                stats.total,
                stats.percentage()
            );
        }
        write_rows(&mut out, &headers, &rows);
        out.push('\n');
    }

    if with_coverage && !tags.is_empty() {
        let (overall, _) = coverage_stats(tags);
        let _ = writeln!(
            out,
            "Overall Coverage: {}/{} ({:.1}%)",
            overall.documented,
            overall.total,
            overall.percentage()
        );
    }
    out
}

fn write_rows(out: &mut String, headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<String>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let _ = writeln!(out, "  {}", line(headers.to_vec()));
    let _ = writeln!(
        out,
        "  {}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<String>>().join("  ")
    );
    for row in rows {
        let _ = writeln!(out, "  {}", line(row.iter().map(String::as_str).collect()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_is_zero_division_safe() {
        assert_eq!(CoverageStats { total: 0, documented: 0 }.percentage(), 0.0);
        assert_eq!(CoverageStats { total: 10, documented: 5 }.percentage(), 50.0);
    }

    #[test]
    fn test_package_is_first_segment() {
        let tag = RegisteredTag::new("static", "django.templatetags.static", Some("static"));
        assert_eq!(tag.package(), "django");
        assert_eq!(RegisteredTag::new("x", "flat", None).package(), "flat");
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Documented".parse::<SpecStatus>(), Ok(SpecStatus::Documented));
        assert!("unknown".parse::<SpecStatus>().is_err());
        assert_eq!("package".parse::<GroupBy>(), Ok(GroupBy::Package));
    }

    #[test]
    fn test_table_counts_each_group() {
        let tags = vec![
            RegisteredTag::new("if", "django.template.defaulttags", None).with_spec(Some(true)),
            RegisteredTag::new("for", "django.template.defaulttags", None).with_spec(Some(false)),
            RegisteredTag::new("static", "django.templatetags.static", None).with_spec(Some(true)),
        ];
        let table = to_table(&tags, GroupBy::Module, true);
        assert!(table.contains("django.template.defaulttags\nCoverage: 1/2 (50.0%)"), "{table}");
        assert!(table.contains("django.templatetags.static\nCoverage: 1/1 (100.0%)"), "{table}");
        assert!(table.contains("Overall Coverage: 2/3 (66.7%)"), "{table}");
    }
}
