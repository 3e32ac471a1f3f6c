// ABOUTME: Serde data models for Notion API responses and the page tree
// ABOUTME: Tolerant parsing with optional fields; PageNode is immutable once built

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One page of results from a paginated list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    pub id: String,
    #[serde(default)]
    pub last_edited_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl RawPage {
    /// Plain text of whichever property has type `title`.
    pub fn title(&self) -> String {
        self.properties
            .values()
            .find(|prop| prop.get("type").and_then(Value::as_str) == Some("title"))
            .and_then(|prop| prop.get("title"))
            .and_then(|runs| serde_json::from_value::<Vec<RawRichText>>(runs.clone()).ok())
            .map(|runs| runs.iter().map(|r| r.plain_text.as_str()).collect::<String>())
            .unwrap_or_default()
    }

    pub fn is_trashed(&self) -> bool {
        self.archived || self.in_trash
    }
}

#[cfg(test)]
mod page_tests {
    use super::*;

    #[test]
    fn test_raw_page_title_from_title_property() {
        let json = r#"{
            "id": "page-1",
            "last_edited_time": "2025-03-01T10:00:00.000Z",
            "properties": {
                "Name": {"id": "title", "type": "title", "title": [
                    {"plain_text": "Release ", "annotations": {}},
                    {"plain_text": "Notes"}
                ]},
                "Tags": {"type": "multi_select", "multi_select": []}
            }
        }"#;
        let page: RawPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.title(), "Release Notes");
        assert!(page.last_edited_time.is_some());
        assert!(!page.is_trashed());
    }

    #[test]
    fn test_raw_page_minimal() {
        let page: RawPage = serde_json::from_str(r#"{"id": "page-2", "archived": true}"#).unwrap();
        assert_eq!(page.title(), "");
        assert!(page.last_edited_time.is_none());
        assert!(page.is_trashed());
    }
}

/// A block as the API returns it; the variant payload stays untyped until
/// `block::decode` turns it into a `Block`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawBlock {
    pub fn payload(&self) -> Option<&Value> {
        self.fields.get(&self.kind)
    }

    /// Blocks whose children belong to another page or database.
    pub fn is_subpage(&self) -> bool {
        matches!(self.kind.as_str(), "child_page" | "child_database")
    }

    pub fn child_page_title(&self) -> Option<String> {
        if self.kind != "child_page" {
            return None;
        }
        self.payload()
            .and_then(|p| p.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRichText {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub annotations: RawAnnotations,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAnnotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
}


/// A page discovered during traversal. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNode {
    pub id: String,
    pub title: String,
    pub last_edited: Option<DateTime<Utc>>,
    pub url: Option<String>,
    /// Lookup only; the tree owns every node.
    pub parent: Option<String>,
    pub children: Vec<String>,
}

/// The root page plus every accessible descendant, in breadth-first source order.
#[derive(Debug, Clone)]
pub struct PageTree {
    pub root: PageNode,
    pub pages: Vec<PageNode>,
    /// Top-level blocks already fetched during discovery, keyed by page id.
    pub top_blocks: HashMap<String, Vec<RawBlock>>,
    pub skipped: Vec<SkippedPage>,
    index: HashMap<String, usize>,
}

/// A child page that could not be read (403/404).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub page_id: String,
    pub title: Option<String>,
    pub reason: String,
}

impl PageTree {
    pub fn new(root: PageNode) -> Self {
        PageTree {
            root,
            pages: Vec::new(),
            top_blocks: HashMap::new(),
            skipped: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn push(&mut self, node: PageNode, top_blocks: Vec<RawBlock>) {
        self.index.insert(node.id.clone(), self.pages.len());
        self.top_blocks.insert(node.id.clone(), top_blocks);
        self.pages.push(node);
    }

    pub fn get(&self, id: &str) -> Option<&PageNode> {
        if id == self.root.id {
            return Some(&self.root);
        }
        self.index.get(id).map(|&i| &self.pages[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// YAML frontmatter written at the top of every page README.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontmatter {
    pub page_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_edited: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_url: Option<String>,
    pub generator: String,
}
