//! The per-session changelog engine.
//!
//! A [`Session`] tracks one [`Changelog`] per frame of the mirrored page. All
//! frames draw change ids from one counter so a viewer can describe how far
//! it has caught up with a single number.

mod changelog;
mod error;
pub mod registry;
mod shared;

use std::collections::{BTreeMap, HashSet};

use mirror_markup::{ContentType, sanitize, sanitize_attributes};
use tracing::{debug, warn};

use crate::model::{Change, ChangeId, DiffRecord, FramePath};

pub use changelog::{BadState, Batch, Changelog, FrameState, FrameUpdate, Snapshot};
pub use error::SessionError;
pub use registry::{RegistryError, SessionConfig, SessionRegistry};
pub use shared::SharedSession;

#[derive(Debug, Default)]
pub struct Session {
    frames: BTreeMap<FramePath, Changelog>,
    last_change_id: ChangeId,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_change_id(&mut self) -> ChangeId {
        self.last_change_id += 1;
        self.last_change_id
    }

    /// Most recently allocated id, 0 before anything was recorded.
    pub fn last_change_id(&self) -> ChangeId {
        self.last_change_id
    }

    pub fn frame(&self, path: &FramePath) -> Option<&Changelog> {
        self.frames.get(path)
    }

    pub fn frame_paths(&self) -> impl Iterator<Item = &FramePath> {
        self.frames.keys()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Drops every frame. The id counter keeps going so viewers never see an
    /// id reused.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Starts (or restarts) a frame from a full document dump.
    ///
    /// The frame's old log and every frame nested inside it are discarded;
    /// nested frames re-register on their own. Returns the id of the batch
    /// holding `initial_props`.
    pub fn init_frame(
        &mut self,
        path: FramePath,
        markup: &str,
        url: Option<String>,
        initial_props: Vec<DiffRecord>,
    ) -> Result<ChangeId, SessionError> {
        let markup = sanitize(markup, ContentType::Html).map_err(|source| {
            SessionError::MalformedMarkup {
                path: path.clone(),
                source,
            }
        })?;
        let initial_props = sanitize_diffs(&path, initial_props)?;

        let first_change_id = self.next_change_id();
        let mut changelog = Changelog::new(first_change_id, Snapshot { markup, url });
        let props_id = self.next_change_id();
        changelog.push(props_id, initial_props.into());

        let before = self.frames.len();
        self.frames
            .retain(|tracked, _| !tracked.is_strict_descendant_of(&path));
        let pruned = before - self.frames.len();

        debug!(frame = %path, change_id = first_change_id, pruned, "initialized frame");
        self.frames.insert(path, changelog);
        Ok(props_id)
    }

    /// Appends a batch of diffs to a tracked frame.
    pub fn record_diffs(
        &mut self,
        path: &FramePath,
        diffs: Vec<DiffRecord>,
    ) -> Result<ChangeId, SessionError> {
        if !self.frames.contains_key(path) {
            return Err(SessionError::FrameNotFound { path: path.clone() });
        }
        let diffs = sanitize_diffs(path, diffs)?;
        let count = diffs.len();

        let id = self.next_change_id();
        if let Some(changelog) = self.frames.get_mut(path) {
            changelog.push(id, diffs.into());
        }
        debug!(frame = %path, change_id = id, count, "recorded diffs");
        Ok(id)
    }

    /// Forgets every frame missing from `known`, the producer's full list of
    /// frames that still exist.
    pub fn reconcile_frames(&mut self, known: &[FramePath]) {
        let known: HashSet<&FramePath> = known.iter().collect();
        self.frames.retain(|path, _| {
            let keep = known.contains(path);
            if !keep {
                debug!(frame = %path, "frame disappeared");
            }
            keep
        });
    }

    /// Puts a frame into the bad state, creating its log if needed.
    pub fn set_error(
        &mut self,
        path: FramePath,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> ChangeId {
        let bad = BadState {
            kind: kind.into(),
            message: message.into(),
        };
        warn!(frame = %path, kind = %bad.kind, message = %bad.message, "frame entered bad state");
        match self.frames.get_mut(&path) {
            Some(changelog) => changelog.mark_bad(bad),
            None => {
                let id = self.next_change_id();
                self.frames.insert(path, Changelog::failed(id, bad));
            }
        }
        self.last_change_id
    }

    /// Catch-up data for every tracked frame, outer frames first.
    pub fn query(&self, since: Option<ChangeId>) -> Vec<(FramePath, FrameUpdate)> {
        let mut updates: Vec<_> = self
            .frames
            .iter()
            .map(|(path, changelog)| (path.clone(), changelog.updates_since(since)))
            .collect();
        updates.sort_by_key(|(path, _)| path.len());
        updates
    }
}

fn sanitize_diffs(path: &FramePath, diffs: Vec<DiffRecord>) -> Result<Vec<DiffRecord>, SessionError> {
    diffs
        .into_iter()
        .map(|mut diff| -> Result<DiffRecord, SessionError> {
            match &mut diff.change {
                Change::NodeReplace { markup, .. } => {
                    *markup = sanitize(markup, diff.content_type).map_err(|source| {
                        SessionError::MalformedMarkup {
                            path: path.clone(),
                            source,
                        }
                    })?;
                }
                Change::AttribsChange { attribs, .. } => sanitize_attributes(attribs),
                Change::PropsChange(_) | Change::Deleted { .. } | Change::TextChange { .. } => {}
            }
            Ok(diff)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn page(session: &mut Session, path: FramePath) -> ChangeId {
        session
            .init_frame(path, "<html><body></body></html>", None, Vec::new())
            .unwrap()
    }

    #[test]
    fn fresh_session_has_no_changes() {
        let session = Session::new();
        assert_eq!(session.last_change_id(), 0);
        assert!(session.query(None).is_empty());
    }

    #[test]
    fn init_consumes_two_ids() {
        let mut session = Session::new();
        assert_eq!(page(&mut session, FramePath::main()), 2);
        let log = session.frame(&FramePath::main()).unwrap();
        assert_eq!(log.first_change_id(), 1);
        assert_eq!(log.last_change_id(), 2);
        assert_eq!(log.batch_count(), 1);
    }

    #[test]
    fn init_sanitizes_markup() {
        let mut session = Session::new();
        session
            .init_frame(
                FramePath::main(),
                r#"<html><body onload="x()"><script>x()</script></body></html>"#,
                Some("http://example.test/".into()),
                Vec::new(),
            )
            .unwrap();
        let FrameState::Ready(snapshot) = session.frame(&FramePath::main()).unwrap().state() else {
            panic!("frame should be ready");
        };
        assert_eq!(snapshot.markup, "<html><body></body></html>");
        assert_eq!(snapshot.url.as_deref(), Some("http://example.test/"));
    }

    #[test]
    fn malformed_init_consumes_no_id() {
        let mut session = Session::new();
        let err = session
            .init_frame(FramePath::main(), "<html><body></html>", None, Vec::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::MalformedMarkup { .. }));
        assert_eq!(session.last_change_id(), 0);
        assert!(session.frame(&FramePath::main()).is_none());
    }

    #[test]
    fn record_on_unknown_frame_consumes_no_id() {
        let mut session = Session::new();
        page(&mut session, FramePath::main());
        let ghost = FramePath::main().child(0).frame();
        let err = session
            .record_diffs(&ghost, vec![DiffRecord::deleted(vec![0])])
            .unwrap_err();
        assert!(matches!(err, SessionError::FrameNotFound { ref path } if *path == ghost));
        assert_eq!(session.last_change_id(), 2);
    }

    #[test]
    fn record_sanitizes_fragments_and_attributes() {
        let mut session = Session::new();
        page(&mut session, FramePath::main());
        let id = session
            .record_diffs(
                &FramePath::main(),
                vec![
                    DiffRecord::node_replace(vec![1, 0], r#"<a href="/x" onclick="y()">x</a>"#, ""),
                    DiffRecord::attribs(
                        vec![1],
                        BTreeMap::from([
                            ("onmouseover".to_string(), "y()".to_string()),
                            ("title".to_string(), "t".to_string()),
                        ]),
                        Vec::new(),
                    ),
                ],
            )
            .unwrap();
        assert_eq!(id, 3);
        let FrameUpdate::Diffs { diffs, .. } = &session.query(Some(3))[0].1 else {
            panic!("expected diffs");
        };
        assert_eq!(diffs[0], DiffRecord::node_replace(vec![1, 0], r##"<a href="#">x</a>"##, ""));
        assert_eq!(
            diffs[1],
            DiffRecord::attribs(
                vec![1],
                BTreeMap::from([("title".to_string(), "t".to_string())]),
                Vec::new()
            )
        );
    }

    #[test]
    fn reinit_prunes_nested_frames_only() {
        let mut session = Session::new();
        page(&mut session, FramePath::main());
        let outer = FramePath::main().child(1).frame();
        let inner = outer.clone().child(0).frame();
        let sibling = FramePath::main().child(2).frame();
        page(&mut session, outer.clone());
        page(&mut session, inner.clone());
        page(&mut session, sibling.clone());

        page(&mut session, outer.clone());
        let paths: Vec<_> = session.frame_paths().cloned().collect();
        assert_eq!(paths.len(), 3);
        assert!(!paths.contains(&inner));
        assert!(paths.contains(&sibling));
    }

    #[test]
    fn set_error_on_unknown_frame_creates_it() {
        let mut session = Session::new();
        let frame = FramePath::main().child(0).frame();
        assert_eq!(session.set_error(frame.clone(), "junk_in_tag", "bad"), 1);
        assert!(session.frame(&frame).unwrap().is_bad());

        page(&mut session, FramePath::main());
        // Marking an existing frame allocates nothing.
        assert_eq!(session.set_error(FramePath::main(), "junk_in_tag", "bad"), 3);
    }

    #[test]
    fn clear_keeps_counter() {
        let mut session = Session::new();
        page(&mut session, FramePath::main());
        session.clear();
        assert_eq!(session.frame_count(), 0);
        assert_eq!(page(&mut session, FramePath::main()), 4);
    }
}
