use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Type assigned when classification fails
pub const FALLBACK_TYPE: &str = "autre";
/// Date assigned when classification fails
pub const FALLBACK_DATE: &str = "unknown";

pub(crate) fn fallback_type() -> String {
    FALLBACK_TYPE.to_string()
}

pub(crate) fn fallback_date() -> String {
    FALLBACK_DATE.to_string()
}

/// Classification metadata for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub path: String,
    #[serde(rename = "type", default = "fallback_type")]
    pub doc_type: String,
    #[serde(default = "fallback_date")]
    pub date: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Canonical grouping key: type plus the sorted set of normalized keywords
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub doc_type: String,
    pub keywords: Vec<String>,
}

impl GroupKey {
    pub fn new(doc_type: &str, keywords: &[String]) -> Self {
        let keywords: BTreeSet<String> = keywords
            .iter()
            .map(|k| normalize_keyword(k))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            doc_type: doc_type.to_string(),
            keywords: keywords.into_iter().collect(),
        }
    }
}

/// Files sharing a group key.
///
/// `keywords` are those of the first member, normalized and deduplicated but
/// in the order the classifier gave them, so the leading keyword stays the
/// most relevant one for naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Trimmed and lowercased; empty means "drop"
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Normalized keywords in original order, duplicates and blanks removed
pub fn ordered_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    keywords
        .iter()
        .map(|k| normalize_keyword(k))
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

/// Merge results whose keys match, keeping first-seen order of groups and
/// of files within each group
pub fn group_documents(results: &[ClassificationResult]) -> Vec<Group> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for result in results {
        let key = GroupKey::new(&result.doc_type, &result.keywords);
        match index.get(&key) {
            Some(&position) => groups[position].files.push(result.path.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(Group {
                    doc_type: result.doc_type.clone(),
                    keywords: ordered_keywords(&result.keywords),
                    files: vec![result.path.clone()],
                });
            }
        }
    }

    groups
}
