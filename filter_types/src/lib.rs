//! Filter Types - Foundation Types
//!
//! Pure data structures shared by the filter controller and its remote
//! service clients. Everything here is constructed fresh per request from
//! remote reads and discarded once the request finishes.
//!
//! ## Rules
//!
//! 1. **NO I/O** - Only data structures and set algebra over them
//! 2. **NO WORKSPACE DEPENDENCIES** - Cannot depend on other workspace crates
//! 3. **SERIALIZABLE** - All types support serde

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// OPTIONS
// ============================================================================

/// One selectable value within a dimension.
///
/// `code` is the stable identifier used in every remote mutation call.
/// Labels are for display and are not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionOption {
    pub code: String,
    pub label: String,
}

impl DimensionOption {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }

    /// Option whose label is its code (the filter service only reports codes)
    pub fn code_only(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            label: code.clone(),
            code,
        }
    }
}

/// A set of option codes with no duplicates and no meaningful order.
///
/// Iteration is lexicographic so logs and request bodies are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(BTreeSet<String>);

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// Returns false if the code was already present
    pub fn insert(&mut self, code: impl Into<String>) -> bool {
        self.0.insert(code.into())
    }

    pub fn remove(&mut self, code: &str) -> bool {
        self.0.remove(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Codes in `self` but not in `other`
    pub fn difference(&self, other: &OptionSet) -> OptionSet {
        OptionSet(self.0.difference(&other.0).cloned().collect())
    }

    pub fn union(&self, other: &OptionSet) -> OptionSet {
        OptionSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn intersection(&self, other: &OptionSet) -> OptionSet {
        OptionSet(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn extend<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(codes.into_iter().map(Into::into));
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for OptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        OptionSet(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for OptionSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a OptionSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// VERSIONING
// ============================================================================

/// Opaque revision marker (eTag) of a remote resource.
///
/// Changes whenever the resource is mutated. Two tokens are consistent iff equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// FILTER JOB
// ============================================================================

/// Dataset / edition / version triple that owns a dimension catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    #[serde(rename = "id")]
    pub dataset_id: String,
    pub edition: String,
    pub version: String,
}

impl DatasetRef {
    pub fn new(
        dataset_id: impl Into<String>,
        edition: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            edition: edition.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dataset_id, self.edition, self.version)
    }
}

/// Read-only snapshot of a filter job owned by the remote filtering service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterJob {
    pub filter_id: String,
    /// Filled from the response `ETag`, never from the body
    #[serde(skip)]
    pub version_token: Option<VersionToken>,
    pub dataset: DatasetRef,
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Names of the dimensions currently on the job
    #[serde(default)]
    pub dimensions: Vec<String>,
}

impl FilterJob {
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d == name)
    }
}

/// One page of a paged option collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsPage {
    pub items: Vec<DimensionOption>,
    pub offset: usize,
    pub limit: usize,
    pub total_count: usize,
    /// Present when the page came from a versioned resource
    #[serde(skip)]
    pub token: Option<VersionToken>,
}

// ============================================================================
// HIERARCHY
// ============================================================================

/// Node of a multi-level hierarchy (e.g. country → nation → region)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    pub label: String,
    pub has_children: bool,
    #[serde(default)]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn leaf(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            has_children: false,
            children: Vec::new(),
        }
    }

    pub fn child(&self, id: &str) -> Option<&HierarchyNode> {
        self.children.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_set_deduplicates() {
        let set: OptionSet = ["b", "a", "b", "a"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.into_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_option_set_algebra() {
        let left: OptionSet = ["a", "b", "c"].into_iter().collect();
        let right: OptionSet = ["b", "c", "d"].into_iter().collect();

        assert_eq!(left.difference(&right), OptionSet::from_iter(["a"]));
        assert_eq!(left.intersection(&right), OptionSet::from_iter(["b", "c"]));
        assert_eq!(left.union(&right).len(), 4);
    }

    #[test]
    fn test_option_set_serializes_as_array() {
        let set: OptionSet = ["Feb-00", "Jan-00"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Feb-00","Jan-00"]"#);
    }

    #[test]
    fn test_filter_job_token_not_read_from_body() {
        let job: FilterJob = serde_json::from_value(serde_json::json!({
            "filter_id": "f1",
            "dataset": {"id": "cpih01", "edition": "time-series", "version": "1"},
            "dimensions": ["time", "aggregate"]
        }))
        .unwrap();

        assert!(job.version_token.is_none());
        assert!(job.has_dimension("time"));
        assert_eq!(job.dataset.to_string(), "cpih01/time-series/1");
    }

    #[test]
    fn test_hierarchy_child_lookup() {
        let node = HierarchyNode {
            id: "root".into(),
            label: "Root".into(),
            has_children: true,
            children: vec![HierarchyNode::leaf("a", "A")],
        };
        assert_eq!(node.child("a").map(|c| c.label.as_str()), Some("A"));
        assert!(node.child("b").is_none());
    }
}
