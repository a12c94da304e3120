//! Bookmark enumeration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A bookmark leaf: anything in the tree carrying a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Node of a browser-style bookmark export.
#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub children: Vec<BookmarkNode>,
}

/// Depth-first, preserving tree order.
pub fn flatten(nodes: &[BookmarkNode]) -> Vec<Bookmark> {
    fn walk(nodes: &[BookmarkNode], out: &mut Vec<Bookmark>) {
        for node in nodes {
            if let Some(url) = &node.url {
                out.push(Bookmark {
                    id: node.id.clone(),
                    url: url.clone(),
                    title: node.title.clone(),
                });
            }
            walk(&node.children, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

#[async_trait]
pub trait BookmarkSource: Send + Sync {
    async fn bookmarks(&self) -> Result<Vec<Bookmark>>;
}

/// Reads an exported tree: either a single root node or an array of them.
pub struct JsonBookmarkSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Forest(Vec<BookmarkNode>),
    Root(BookmarkNode),
}

impl JsonBookmarkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BookmarkSource for JsonBookmarkSource {
    async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read bookmarks from {}", self.path.display()))?;
        let export: ExportFile = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed bookmark export {}", self.path.display()))?;
        let nodes = match export {
            ExportFile::Forest(nodes) => nodes,
            ExportFile::Root(root) => vec![root],
        };
        Ok(flatten(&nodes))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBookmarkSource {
    bookmarks: Vec<Bookmark>,
}

impl MemoryBookmarkSource {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        Self { bookmarks }
    }
}

#[async_trait]
impl BookmarkSource for MemoryBookmarkSource {
    async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        Ok(self.bookmarks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "id": "root________",
        "title": "",
        "children": [
            {"id": "toolbar", "title": "Toolbar", "children": [
                {"id": "a1", "title": "Rust", "url": "https://www.rust-lang.org/"},
                {"id": "f1", "title": "Folder", "children": [
                    {"id": "a2", "title": "Docs", "url": "https://docs.rs/"}
                ]}
            ]},
            {"id": "a3", "url": "about:blank"}
        ]
    }"#;

    #[tokio::test]
    async fn test_json_export_leaves_in_order() {
        let dir = std::env::temp_dir().join(format!("linkvet-bookmarks-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("bookmarks.json");
        tokio::fs::write(&path, EXPORT).await.unwrap();

        let bookmarks = JsonBookmarkSource::new(&path).bookmarks().await.unwrap();
        let ids: Vec<&str> = bookmarks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
        assert_eq!(bookmarks[0].title, "Rust");
        assert_eq!(bookmarks[2].title, "");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_export_is_an_error() {
        let source = JsonBookmarkSource::new("/nonexistent/linkvet/bookmarks.json");
        assert!(source.bookmarks().await.is_err());
    }
}
