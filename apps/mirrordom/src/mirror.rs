//! Viewer-side replay of update responses onto owned node trees.
//!
//! This is what a viewer does with the data [`crate::protocol::get_update`]
//! hands out. It also lets tests check that a late joiner and a viewer that
//! followed every step end up with the same tree.

use std::collections::{BTreeMap, HashSet};

use mirror_markup::{Content, MarkupError, Node, parse_with};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Change, ChangeId, DiffRecord, FramePath, PropsDiff};
use crate::protocol::{Changeset, UpdateRequest, UpdateResponse};
use crate::session::FrameUpdate;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("no node at path {path:?}")]
    InvalidPath { path: Vec<usize> },

    #[error("frame {frame} received diffs before a snapshot")]
    MissingSnapshot { frame: FramePath },

    #[error("malformed markup in update: {0}")]
    Markup(#[from] MarkupError),
}

/// Reconstructed state of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameMirror {
    pub root: Option<Node>,
    pub url: Option<String>,
    pub last_change_id: ChangeId,
}

impl FrameMirror {
    /// Starts from a snapshot's markup.
    pub fn from_snapshot(markup: &str, url: Option<String>) -> Result<Self, ApplyError> {
        Ok(Self {
            root: parse_with(markup, Default::default())?,
            url,
            last_change_id: 0,
        })
    }

    pub fn apply_all<'a>(
        &mut self,
        diffs: impl IntoIterator<Item = &'a DiffRecord>,
    ) -> Result<(), ApplyError> {
        for diff in diffs {
            self.apply(diff).inspect_err(|err| {
                warn!(path = ?diff.change.path(), error = %err, "diff did not apply");
            })?;
        }
        Ok(())
    }

    pub fn apply(&mut self, diff: &DiffRecord) -> Result<(), ApplyError> {
        match &diff.change {
            Change::NodeReplace {
                path,
                markup,
                tail,
                props,
            } => {
                let replacement = parse_with(markup, diff.content_type)?;
                let Some((index, parent_path)) = path.split_last() else {
                    self.root = replacement;
                    if let Some(root) = self.root.as_mut() {
                        apply_nested_props(root, props)?;
                    }
                    return Ok(());
                };
                let parent = self.node_mut(parent_path)?;
                truncate_at(parent, *index, path)?;
                if let Some(mut node) = replacement {
                    apply_nested_props(&mut node, props)?;
                    parent.push_element(node);
                }
                parent.push_text(tail);
            }
            Change::PropsChange(props) => {
                let node = self.node_mut(&props.path)?;
                set_props(node, props);
            }
            Change::AttribsChange {
                path,
                attribs,
                removed,
            } => {
                let node = self.node_mut(path)?;
                for name in removed {
                    node.remove_attr(name);
                }
                for (name, value) in attribs {
                    node.set_attr(name.clone(), value.clone());
                }
            }
            Change::Deleted { path } => match path.split_last() {
                None => self.root = None,
                Some((index, parent_path)) => {
                    let parent = self.node_mut(parent_path)?;
                    truncate_at(parent, *index, path)?;
                }
            },
            Change::TextChange { path, text, tail } => {
                let node = self.node_mut(path)?;
                node.children.clear();
                node.push_text(text);
                if let Some((index, parent_path)) = path.split_last() {
                    let parent = self.node_mut(parent_path)?;
                    set_tail(parent, *index, tail);
                }
            }
        }
        Ok(())
    }

    fn node_mut(&mut self, path: &[usize]) -> Result<&mut Node, ApplyError> {
        self.root
            .as_mut()
            .and_then(|root| root.node_at_mut(path))
            .ok_or_else(|| ApplyError::InvalidPath {
                path: path.to_vec(),
            })
    }

    pub fn to_markup(&self) -> Option<String> {
        self.root
            .as_ref()
            .map(|root| root.to_markup(Default::default()))
    }
}

fn truncate_at(parent: &mut Node, index: usize, path: &[usize]) -> Result<(), ApplyError> {
    if index > parent.children.len() {
        return Err(ApplyError::InvalidPath {
            path: path.to_vec(),
        });
    }
    parent.children.truncate(index);
    Ok(())
}

fn set_tail(parent: &mut Node, index: usize, tail: &str) {
    let slot = index + 1;
    let has_tail = matches!(parent.children.get(slot), Some(Content::Text(_)));
    match (has_tail, tail.is_empty()) {
        (true, true) => {
            parent.children.remove(slot);
        }
        (true, false) => parent.children[slot] = Content::Text(tail.to_string()),
        (false, false) => {
            let slot = slot.min(parent.children.len());
            parent.children.insert(slot, Content::Text(tail.to_string()));
        }
        (false, true) => {}
    }
}

fn set_props(node: &mut Node, diff: &PropsDiff) {
    for name in &diff.removed {
        node.properties.remove(name);
    }
    for (name, value) in &diff.props {
        node.properties.insert(name.clone(), value.clone());
    }
}

fn apply_nested_props(node: &mut Node, props: &[PropsDiff]) -> Result<(), ApplyError> {
    for diff in props {
        let target = node
            .node_at_mut(&diff.path)
            .ok_or_else(|| ApplyError::InvalidPath {
                path: diff.path.clone(),
            })?;
        set_props(target, diff);
    }
    Ok(())
}

/// A polling viewer: keeps one [`FrameMirror`] per frame and knows what to
/// ask for next.
#[derive(Debug, Default)]
pub struct Viewer {
    frames: BTreeMap<FramePath, FrameMirror>,
    errors: BTreeMap<FramePath, String>,
    since: Option<ChangeId>,
    init_required: bool,
}

impl Viewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request to send on the next poll.
    pub fn next_request(&self) -> UpdateRequest {
        UpdateRequest {
            since: self.since,
            init_required: self.init_required,
        }
    }

    pub fn frame(&self, path: &FramePath) -> Option<&FrameMirror> {
        self.frames.get(path)
    }

    pub fn frame_paths(&self) -> impl Iterator<Item = &FramePath> {
        self.frames.keys()
    }

    pub fn error(&self, path: &FramePath) -> Option<&str> {
        self.errors.get(path).map(String::as_str)
    }

    pub fn render(&self, path: &FramePath) -> Option<String> {
        self.frames.get(path).and_then(FrameMirror::to_markup)
    }

    /// Applies one response. Changesets arrive outer frames first.
    ///
    /// Every changeset is replayed onto a copy before anything is committed,
    /// so a response that fails part way leaves the viewer where it was and
    /// the next poll asks for the same changes again.
    pub fn apply(&mut self, response: &UpdateResponse) -> Result<(), ApplyError> {
        let mut staged = Vec::with_capacity(response.changesets.len());
        for changeset in &response.changesets {
            staged.push((&changeset.frame, self.stage(changeset)?));
        }

        let withheld = self.init_required && response.changesets.is_empty();
        if !withheld {
            let present: HashSet<&FramePath> =
                response.changesets.iter().map(|set| &set.frame).collect();
            self.frames.retain(|path, _| present.contains(path));
            self.errors.retain(|path, _| present.contains(path));
        }

        for (frame, step) in staged {
            match step {
                Staged::Failed(error) => {
                    self.frames.remove(frame);
                    self.errors.insert(frame.clone(), error);
                    self.init_required = true;
                }
                Staged::Loaded(mirror) => {
                    self.errors.remove(frame);
                    self.frames.insert(frame.clone(), mirror);
                    if frame.is_main() {
                        self.init_required = false;
                    }
                }
                Staged::Updated(mirror) => {
                    self.frames.insert(frame.clone(), mirror);
                }
                Staged::Unchanged => {}
            }
        }

        // A withheld poll must be repeated from the same point.
        if !withheld {
            self.since = Some(response.last_change_id + 1);
        }
        Ok(())
    }

    fn stage(&self, changeset: &Changeset) -> Result<Staged, ApplyError> {
        let frame = &changeset.frame;
        let step = match &changeset.update {
            FrameUpdate::Error {
                error_kind,
                error_message,
                ..
            } => {
                warn!(frame = %frame, kind = %error_kind, "frame reported an error");
                Staged::Failed(format!("{error_kind}: {error_message}"))
            }
            FrameUpdate::Snapshot {
                init_snapshot,
                url,
                diffs,
                last_change_id,
            } => {
                let mut mirror = FrameMirror::from_snapshot(init_snapshot, url.clone())?;
                mirror.apply_all(diffs)?;
                mirror.last_change_id = *last_change_id;
                debug!(frame = %frame, change_id = *last_change_id, "staged snapshot");
                Staged::Loaded(mirror)
            }
            FrameUpdate::Diffs {
                diffs,
                last_change_id,
            } => {
                let mut mirror = self
                    .frames
                    .get(frame)
                    .cloned()
                    .ok_or_else(|| ApplyError::MissingSnapshot {
                        frame: frame.clone(),
                    })?;
                mirror.apply_all(diffs)?;
                mirror.last_change_id = *last_change_id;
                Staged::Updated(mirror)
            }
            FrameUpdate::Unchanged { .. } => Staged::Unchanged,
        };
        Ok(step)
    }
}

/// Outcome of replaying one changeset, not yet committed to the viewer.
enum Staged {
    Failed(String),
    Loaded(FrameMirror),
    Updated(FrameMirror),
    Unchanged,
}
