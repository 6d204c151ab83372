use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a piece of markup compares and serializes names.
///
/// `Svg` and `Vml` are foreign fragments: element and attribute names keep
/// their case and the HTML void/autoclose tables do not apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Html,
    Svg,
    Vml,
}

impl ContentType {
    pub fn is_foreign(self) -> bool {
        !matches!(self, ContentType::Html)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "html",
            ContentType::Svg => "svg",
            ContentType::Vml => "vml",
        }
    }

    /// Folds a tag or attribute name to the form stored in the tree.
    pub fn fold_name(self, name: &str) -> String {
        if self.is_foreign() {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }
}

/// One child slot of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    Element(Node),
    Text(String),
    Comment(String),
}

impl Content {
    pub fn as_element(&self) -> Option<&Node> {
        match self {
            Content::Element(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Node> {
        match self {
            Content::Element(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A parsed element.
///
/// Text runs live in `children` as [`Content::Text`]; the run before the
/// first element is the element's leading text and the run right after a
/// child element is that child's trailing text. `properties` holds DOM
/// state that markup cannot express (`value`, `checked`, ...). The parser
/// never fills it and the serializer never writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Content>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self::with_attrs(tag, BTreeMap::new())
    }

    pub fn with_attrs(tag: impl Into<String>, attrs: BTreeMap<String, String>) -> Self {
        Self {
            tag: tag.into(),
            attrs,
            children: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.remove(name)
    }

    pub fn push_element(&mut self, node: Node) {
        self.children.push(Content::Element(node));
    }

    /// Appends a text run, merging it into the preceding text slot when only
    /// comments sit between them.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let slot = self
            .children
            .iter_mut()
            .rev()
            .find(|child| !matches!(child, Content::Comment(_)));
        match slot {
            Some(Content::Text(existing)) => existing.push_str(text),
            _ => self.children.push(Content::Text(text.to_string())),
        }
    }

    pub fn push_comment(&mut self, text: impl Into<String>) {
        self.children.push(Content::Comment(text.into()));
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(Content::as_element)
    }

    pub fn leading_text(&self) -> Option<&str> {
        self.children
            .iter()
            .take_while(|child| !matches!(child, Content::Element(_)))
            .find_map(Content::as_text)
    }

    /// Text immediately following the child at `index`.
    pub fn trailing_text(&self, index: usize) -> Option<&str> {
        self.children.get(index + 1).and_then(Content::as_text)
    }

    /// Concatenated text of the whole subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Walks child indices from this node. An empty path is the node itself.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &index in path {
            node = node.children.get(index)?.as_element()?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &index in path {
            node = node.children.get_mut(index)?.as_element_mut()?;
        }
        Some(node)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.tag.eq_ignore_ascii_case(name)
    }
}

fn collect_text(node: &Node, out: &mut String) {
    for child in &node.children {
        match child {
            Content::Element(el) => collect_text(el, out),
            Content::Text(text) => out.push_str(text),
            Content::Comment(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_coalesces_across_comments() {
        let mut div = Node::new("div");
        div.push_text("a");
        div.push_comment("c");
        div.push_text("b");
        assert_eq!(
            div.children,
            vec![Content::Text("ab".into()), Content::Comment("c".into())]
        );
    }

    #[test]
    fn trailing_text_follows_element() {
        let mut div = Node::new("div");
        div.push_text("lead");
        div.push_element(Node::new("br"));
        div.push_text("tail");
        assert_eq!(div.leading_text(), Some("lead"));
        assert_eq!(div.trailing_text(1), Some("tail"));
        assert_eq!(div.text_content(), "leadtail");
    }

    #[test]
    fn node_at_rejects_text_slots() {
        let mut div = Node::new("div");
        div.push_text("x");
        div.push_element(Node::new("span"));
        assert_eq!(div.node_at(&[1]).map(|n| n.tag.as_str()), Some("span"));
        assert!(div.node_at(&[0]).is_none());
        assert!(div.node_at(&[2]).is_none());
    }

    #[test]
    fn foreign_names_keep_case() {
        assert_eq!(ContentType::Svg.fold_name("viewBox"), "viewBox");
        assert_eq!(ContentType::Html.fold_name("viewBox"), "viewbox");
    }
}
