use std::collections::BTreeMap;

use mirror_markup::ContentType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session-wide change identifier. Real changes are numbered from 1.
pub type ChangeId = u64;

/// Child-index path from a frame's root element.
pub type NodePath = Vec<usize>;

/// New DOM property values for one element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropsDiff {
    pub path: NodePath,
    #[serde(default)]
    pub props: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

impl PropsDiff {
    pub fn new(path: NodePath) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// The node at `path` and every sibling after it are replaced by
    /// `markup` followed by `tail` text. `props` paths are relative to the
    /// new node.
    NodeReplace {
        path: NodePath,
        markup: String,
        #[serde(default)]
        tail: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        props: Vec<PropsDiff>,
    },
    PropsChange(PropsDiff),
    AttribsChange {
        path: NodePath,
        #[serde(default)]
        attribs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<String>,
    },
    /// The node at `path` and every sibling after it are gone.
    Deleted { path: NodePath },
    /// The element's content becomes `text` and the text following it
    /// becomes `tail`.
    TextChange {
        path: NodePath,
        text: String,
        #[serde(default)]
        tail: String,
    },
}

impl Change {
    pub fn path(&self) -> &[usize] {
        match self {
            Change::NodeReplace { path, .. }
            | Change::AttribsChange { path, .. }
            | Change::Deleted { path }
            | Change::TextChange { path, .. } => path,
            Change::PropsChange(diff) => &diff.path,
        }
    }
}

/// One incremental change to a frame's tree, tagged with the markup dialect
/// of any fragment it carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(flatten)]
    pub change: Change,
}

impl DiffRecord {
    pub fn new(change: Change) -> Self {
        Self {
            content_type: ContentType::Html,
            change,
        }
    }

    pub fn foreign(content_type: ContentType, change: Change) -> Self {
        Self {
            content_type,
            change,
        }
    }

    pub fn node_replace(path: NodePath, markup: impl Into<String>, tail: impl Into<String>) -> Self {
        Self::new(Change::NodeReplace {
            path,
            markup: markup.into(),
            tail: tail.into(),
            props: Vec::new(),
        })
    }

    pub fn props(diff: PropsDiff) -> Self {
        Self::new(Change::PropsChange(diff))
    }

    pub fn attribs(path: NodePath, attribs: BTreeMap<String, String>, removed: Vec<String>) -> Self {
        Self::new(Change::AttribsChange {
            path,
            attribs,
            removed,
        })
    }

    pub fn deleted(path: NodePath) -> Self {
        Self::new(Change::Deleted { path })
    }

    pub fn text(path: NodePath, text: impl Into<String>, tail: impl Into<String>) -> Self {
        Self::new(Change::TextChange {
            path,
            text: text.into(),
            tail: tail.into(),
        })
    }
}
