//! Messages exchanged with the producer and with viewers, and the two calls
//! that route them into a [`Session`].
//!
//! Producer side, one batch per update cycle:
//!
//! ```json
//! {"messages": [{"frame": ["m"], "kind": "new_page",
//!                "body": {"html": "<html>...</html>", "url": "http://..."}}],
//!  "frames": [["m"]]}
//! ```
//!
//! Viewer side, one response per poll: `{"changesets": [...], "last_change_id": 7}`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{ChangeId, DiffRecord, FramePath};
use crate::session::{FrameUpdate, Session, SessionError};

/// A frame's document was loaded from scratch (the producer just started).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceLoad {
    pub html: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub props: Vec<DiffRecord>,
}

/// A frame navigated to a new page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageLoad {
    pub html: String,
    pub url: String,
    #[serde(default)]
    pub props: Vec<DiffRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffBatch {
    pub diffs: Vec<DiffRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameMessage {
    NewInstance { frame: FramePath, body: InstanceLoad },
    NewPage { frame: FramePath, body: PageLoad },
    DiffBatch { frame: FramePath, body: DiffBatch },
}

impl FrameMessage {
    pub fn frame(&self) -> &FramePath {
        match self {
            FrameMessage::NewInstance { frame, .. }
            | FrameMessage::NewPage { frame, .. }
            | FrameMessage::DiffBatch { frame, .. } => frame,
        }
    }

    /// Wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameMessage::NewInstance { .. } => "new_instance",
            FrameMessage::NewPage { .. } => "new_page",
            FrameMessage::DiffBatch { .. } => "diff_batch",
        }
    }
}

/// Everything the producer sends in one update cycle.
///
/// `frames` lists every frame that still exists; frames missing from it are
/// forgotten. A batch without the list leaves tracked frames alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBatch {
    #[serde(default)]
    pub messages: Vec<FrameMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<FramePath>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// First change id the viewer has not seen; absent for a fresh viewer.
    #[serde(default)]
    pub since: Option<ChangeId>,
    /// Set by a viewer recovering from an error: hold everything back until
    /// the main frame has been reloaded at or after `since`.
    #[serde(default)]
    pub init_required: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    pub frame: FramePath,
    pub update: FrameUpdate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub changesets: Vec<Changeset>,
    pub last_change_id: ChangeId,
}

/// Applies one producer batch.
///
/// Failures stay local to the frame they concern: unparsable markup puts
/// that frame in the bad state and diffs for an unknown frame are dropped.
/// Returns the session's last change id afterwards.
pub fn submit_update(session: &mut Session, batch: UpdateBatch) -> ChangeId {
    debug!(messages = batch.messages.len(), "applying update batch");
    for message in batch.messages {
        debug!(frame = %message.frame(), kind = message.kind(), "applying message");
        let result = match message {
            FrameMessage::NewInstance { frame, body } => {
                session.init_frame(frame, &body.html, body.url, body.props)
            }
            FrameMessage::NewPage { frame, body } => {
                session.init_frame(frame, &body.html, Some(body.url), body.props)
            }
            FrameMessage::DiffBatch { frame, body } => session.record_diffs(&frame, body.diffs),
        };
        match result {
            Ok(_) => {}
            Err(err @ SessionError::FrameNotFound { .. }) => {
                warn!(frame = %err.path(), "dropping diffs for unknown frame");
            }
            Err(SessionError::MalformedMarkup { path, source }) => {
                session.set_error(path, source.kind(), source.to_string());
            }
        }
    }

    if let Some(frames) = batch.frames {
        session.reconcile_frames(&frames);
    }
    session.last_change_id()
}

/// Collects what a viewer needs to catch up.
pub fn get_update(session: &Session, request: &UpdateRequest) -> UpdateResponse {
    let last_change_id = session.last_change_id();
    if request.init_required && !main_frame_reloaded(session, request.since) {
        debug!(since = ?request.since, "withholding updates until the main frame reloads");
        return UpdateResponse {
            changesets: Vec::new(),
            last_change_id,
        };
    }

    let changesets = session
        .query(request.since)
        .into_iter()
        .map(|(frame, update)| Changeset { frame, update })
        .collect();
    UpdateResponse {
        changesets,
        last_change_id,
    }
}

fn main_frame_reloaded(session: &Session, since: Option<ChangeId>) -> bool {
    session
        .frame(&FramePath::main())
        .is_some_and(|main| since.is_none_or(|since| main.first_change_id() >= since))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_producer_batch() {
        let batch: UpdateBatch = serde_json::from_value(json!({
            "messages": [
                {"frame": ["m"], "kind": "new_instance", "body": {"html": "<html></html>", "props": []}},
                {"frame": ["m"], "kind": "diff_batch", "body": {"diffs": [
                    {"kind": "text_change", "path": [0], "text": "hi", "tail": ""}
                ]}}
            ],
            "frames": [["m"]]
        }))
        .unwrap();
        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.messages[1].kind(), "diff_batch");
        assert!(batch.messages.iter().all(|m| m.frame().is_main()));
        assert!(matches!(
            &batch.messages[0],
            FrameMessage::NewInstance { body, .. } if body.url.is_none()
        ));
        assert_eq!(batch.frames, Some(vec![FramePath::main()]));
    }

    #[test]
    fn new_page_requires_url() {
        let parsed = serde_json::from_value::<FrameMessage>(json!({
            "frame": ["m"], "kind": "new_page", "body": {"html": "<html></html>"}
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn response_wire_form() {
        let mut session = Session::new();
        session
            .init_frame(FramePath::main(), "<html></html>", None, Vec::new())
            .unwrap();
        let response = get_update(&session, &UpdateRequest { since: Some(3), init_required: false });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "changesets": [
                    {"frame": ["m"], "update": {"status": "unchanged", "last_change_id": 2}}
                ],
                "last_change_id": 2
            })
        );
    }

    #[test]
    fn malformed_diff_marks_frame_bad() {
        let mut session = Session::new();
        let batch = UpdateBatch {
            messages: vec![
                FrameMessage::NewInstance {
                    frame: FramePath::main(),
                    body: InstanceLoad {
                        html: "<html><body></body></html>".into(),
                        url: None,
                        props: Vec::new(),
                    },
                },
                FrameMessage::DiffBatch {
                    frame: FramePath::main(),
                    body: DiffBatch {
                        diffs: vec![DiffRecord::node_replace(vec![0, 0], "<div><span></div>", "")],
                    },
                },
            ],
            frames: None,
        };
        assert_eq!(submit_update(&mut session, batch), 2);
        let response = get_update(&session, &UpdateRequest::default());
        assert!(matches!(
            &response.changesets[0].update,
            FrameUpdate::Error { error_kind, .. } if error_kind == "mismatched_close_tag"
        ));
    }
}
