//! Conversion of a restructured crawl tree into the canonical tree
//!
//! The canonical tree is what the packaging stage consumes: every kind comes
//! from the closed canonical set and every source id is present and unique.

use crate::config::UnknownKindPolicy;
use crate::site::Language;
use crate::tree::{CanonicalKind, CrawlNode, NodeKind};
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A node of the canonical tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub url: String,
    pub kind: CanonicalKind,
    pub title: String,
    pub language: Language,
    pub source_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_subspan_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,

    /// Original kind tag of an unclassified node kept for review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_kind: Option<String>,

    #[serde(default)]
    pub children: Vec<CanonicalNode>,
}

impl CanonicalNode {
    /// Iterates over this node and all descendants in document order
    pub fn iter(&self) -> impl Iterator<Item = &CanonicalNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

// Canonical kinds serialize as their tag
impl Serialize for CanonicalKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CanonicalKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        CanonicalKind::from_tag(&tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown canonical kind '{}'", tag)))
    }
}

/// Converts a restructured tree into the canonical tree
///
/// # Errors
///
/// Returns `InvariantViolation` if the root is not a language tree, if a raw
/// crawl kind survived restructuring, or if a node is missing its language or
/// source id. These indicate restructuring was skipped, not site drift.
///
/// Nodes with an unknown kind are dropped together with their subtree under
/// `UnknownKindPolicy::Exclude` and kept as `unclassified` under `Keep`.
/// Colliding source ids get a numeric suffix.
pub fn to_canonical(root: &CrawlNode, policy: UnknownKindPolicy) -> Result<CanonicalNode> {
    if root.kind != NodeKind::Canonical(CanonicalKind::LanguageTree) {
        return Err(HarvestError::InvariantViolation(format!(
            "canonical tree root {} has kind '{}', expected language_tree",
            root.url, root.kind
        )));
    }

    // Pre-order flattening; parents always precede their children
    let mut flat: Vec<Option<CanonicalNode>> = Vec::new();
    let mut child_ids: Vec<Vec<usize>> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut stack: Vec<(&CrawlNode, Option<usize>)> = vec![(root, None)];

    while let Some((node, parent)) = stack.pop() {
        let (kind, raw_kind) = match &node.kind {
            NodeKind::Canonical(kind) => (*kind, None),
            NodeKind::Raw(kind) => {
                return Err(HarvestError::InvariantViolation(format!(
                    "node {} still has raw kind '{}' after restructuring",
                    node.url,
                    kind.as_str()
                )));
            }
            NodeKind::Unknown(tag) => match policy {
                UnknownKindPolicy::Exclude => {
                    tracing::warn!(
                        "Excluding node {} with unknown kind '{}' and its {} descendants",
                        node.url,
                        tag,
                        node.len() - 1
                    );
                    continue;
                }
                UnknownKindPolicy::Keep => {
                    tracing::warn!("Keeping node {} with unknown kind '{}' as unclassified", node.url, tag);
                    (CanonicalKind::Unclassified, Some(tag.clone()))
                }
            },
        };

        let language = node.language.ok_or_else(|| {
            HarvestError::InvariantViolation(format!("node {} has no language", node.url))
        })?;
        let base_id = node.source_id.clone().ok_or_else(|| {
            HarvestError::InvariantViolation(format!("node {} has no source id", node.url))
        })?;
        let source_id = unique_id(&base_id, &mut seen_ids);
        if source_id != base_id {
            tracing::warn!("Duplicate source id {} at {}, renamed to {}", base_id, node.url, source_id);
        }

        let index = flat.len();
        flat.push(Some(CanonicalNode {
            url: node.url.clone(),
            kind,
            title: node.title.clone(),
            language,
            source_id,
            hidden_subspan_text: node.hidden_subspan_text.clone(),
            description: node.description.clone(),
            content_type: node.content_type.clone(),
            file_url: node.file_url.clone(),
            raw_kind,
            children: Vec::new(),
        }));
        child_ids.push(Vec::new());
        if let Some(parent) = parent {
            child_ids[parent].push(index);
        }

        for child in node.children.iter().rev() {
            stack.push((child, Some(index)));
        }
    }

    for index in (0..flat.len()).rev() {
        let children: Vec<CanonicalNode> = child_ids[index]
            .iter()
            .filter_map(|child| flat[*child].take())
            .collect();
        if let Some(node) = flat[index].as_mut() {
            node.children = children;
        }
    }

    flat.into_iter()
        .next()
        .flatten()
        .ok_or_else(|| HarvestError::InvariantViolation("canonical tree lost its root".to_string()))
}

fn unique_id(base: &str, seen: &mut HashSet<String>) -> String {
    if seen.insert(base.to_string()) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{restructure, PageKind};

    const BASE: &str = "http://www.open.edu/openlearncreate";

    fn raw_tree() -> CrawlNode {
        CrawlNode::new(format!("{}/course/view.php?id=2042", BASE), PageKind::LanguageRoot, "TESSA (EN)")
            .with_child(
                CrawlNode::new(format!("{}/mod/subpage/view.php?id=20", BASE), PageKind::Subpage, "Literacy")
                    .with_child(CrawlNode::new(
                        format!("{}/mod/oucontent/view.php?id=11", BASE),
                        PageKind::Oucontent,
                        "Module 1",
                    ))
                    .with_child(CrawlNode::new(
                        format!("{}/mod/quiz/view.php?id=5", BASE),
                        NodeKind::Unknown("quiz".to_string()),
                        "Quiz",
                    )),
            )
    }

    #[test]
    fn test_exclude_policy_drops_unknown() {
        let mut tree = raw_tree();
        restructure(&mut tree, Language::En);
        let canonical = to_canonical(&tree, UnknownKindPolicy::Exclude).unwrap();

        assert_eq!(canonical.len(), 3);
        assert!(canonical.iter().all(|n| n.kind != CanonicalKind::Unclassified));
        assert_eq!(canonical.children[0].children[0].kind, CanonicalKind::ContentModule);
    }

    #[test]
    fn test_keep_policy_marks_unclassified() {
        let mut tree = raw_tree();
        restructure(&mut tree, Language::En);
        let canonical = to_canonical(&tree, UnknownKindPolicy::Keep).unwrap();

        let quiz = &canonical.children[0].children[1];
        assert_eq!(quiz.kind, CanonicalKind::Unclassified);
        assert_eq!(quiz.raw_kind.as_deref(), Some("quiz"));
    }

    #[test]
    fn test_unrestructured_tree_rejected() {
        let result = to_canonical(&raw_tree(), UnknownKindPolicy::Exclude);
        assert!(matches!(result, Err(HarvestError::InvariantViolation(_))));
    }

    #[test]
    fn test_duplicate_source_ids_suffixed() {
        let module = format!("{}/mod/oucontent/view.php?id=11", BASE);
        let mut tree = CrawlNode::new(format!("{}/course/view.php?id=2042", BASE), PageKind::LanguageRoot, "T")
            .with_child(
                CrawlNode::new(format!("{}/mod/subpage/view.php?id=1", BASE), PageKind::Subpage, "A")
                    .with_child(CrawlNode::new(module.clone(), PageKind::Oucontent, "M")),
            )
            .with_child(
                CrawlNode::new(format!("{}/mod/subpage/view.php?id=2", BASE), PageKind::Subpage, "B")
                    .with_child(CrawlNode::new(module, PageKind::Oucontent, "M")),
            );
        restructure(&mut tree, Language::En);
        let canonical = to_canonical(&tree, UnknownKindPolicy::Exclude).unwrap();

        let ids: Vec<&str> = canonical.iter().map(|n| n.source_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "language_tree_2042",
                "subpage_topic_1",
                "content_module_11",
                "subpage_topic_2",
                "content_module_11_2",
            ]
        );
    }

    #[test]
    fn test_canonical_json_kind_tags() {
        let mut tree = raw_tree();
        restructure(&mut tree, Language::Ar);
        let canonical = to_canonical(&tree, UnknownKindPolicy::Exclude).unwrap();

        let json = serde_json::to_value(&canonical).unwrap();
        assert_eq!(json["kind"], "language_tree");
        assert_eq!(json["language"], "ar");
        assert_eq!(json["children"][0]["kind"], "subpage_topic");

        let back: CanonicalNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, canonical);
    }
}
