use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{ChangeId, DiffRecord};

/// An immutable, cheaply cloned batch of diffs.
pub type Batch = Arc<[DiffRecord]>;

/// The sanitized document a frame was (re)initialized with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub markup: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadState {
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameState {
    Ready(Snapshot),
    /// Ingestion failed; cleared only by reinitializing the frame.
    Bad(BadState),
}

/// What one frame has to say to a viewer that has seen everything before
/// some change id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameUpdate {
    Error {
        last_change_id: ChangeId,
        error_kind: String,
        error_message: String,
    },
    Snapshot {
        init_snapshot: String,
        url: Option<String>,
        diffs: Vec<DiffRecord>,
        last_change_id: ChangeId,
    },
    Diffs {
        diffs: Vec<DiffRecord>,
        last_change_id: ChangeId,
    },
    Unchanged {
        last_change_id: ChangeId,
    },
}

impl FrameUpdate {
    pub fn last_change_id(&self) -> ChangeId {
        match self {
            FrameUpdate::Error { last_change_id, .. }
            | FrameUpdate::Snapshot { last_change_id, .. }
            | FrameUpdate::Diffs { last_change_id, .. }
            | FrameUpdate::Unchanged { last_change_id } => *last_change_id,
        }
    }
}

/// Per-frame change log: a snapshot plus the diff batches recorded since,
/// keyed by change id.
#[derive(Debug, Clone)]
pub struct Changelog {
    state: FrameState,
    first_change_id: ChangeId,
    batches: BTreeMap<ChangeId, Batch>,
}

impl Changelog {
    pub fn new(first_change_id: ChangeId, snapshot: Snapshot) -> Self {
        Self {
            state: FrameState::Ready(snapshot),
            first_change_id,
            batches: BTreeMap::new(),
        }
    }

    pub fn failed(first_change_id: ChangeId, bad: BadState) -> Self {
        Self {
            state: FrameState::Bad(bad),
            first_change_id,
            batches: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn is_bad(&self) -> bool {
        matches!(self.state, FrameState::Bad(_))
    }

    pub fn mark_bad(&mut self, bad: BadState) {
        self.state = FrameState::Bad(bad);
    }

    pub fn first_change_id(&self) -> ChangeId {
        self.first_change_id
    }

    pub fn last_change_id(&self) -> ChangeId {
        self.batches
            .last_key_value()
            .map_or(self.first_change_id, |(id, _)| *id)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Appends a batch under a freshly allocated id.
    ///
    /// # Panics
    ///
    /// If `id` does not come after every id already in the log.
    pub fn push(&mut self, id: ChangeId, batch: Batch) {
        let last = self.last_change_id();
        assert!(id > last, "change id {id} does not follow {last}");
        self.batches.insert(id, batch);
    }

    /// Everything a viewer needs to catch up from `since` (inclusive).
    pub fn updates_since(&self, since: Option<ChangeId>) -> FrameUpdate {
        let last_change_id = self.last_change_id();
        let snapshot = match &self.state {
            FrameState::Bad(bad) => {
                return FrameUpdate::Error {
                    last_change_id,
                    error_kind: bad.kind.clone(),
                    error_message: bad.message.clone(),
                };
            }
            FrameState::Ready(snapshot) => snapshot,
        };

        match since {
            Some(since) if since > self.first_change_id => {
                if since > last_change_id {
                    FrameUpdate::Unchanged { last_change_id }
                } else {
                    FrameUpdate::Diffs {
                        diffs: flatten(self.batches.range(since..).map(|(_, batch)| batch)),
                        last_change_id,
                    }
                }
            }
            _ => FrameUpdate::Snapshot {
                init_snapshot: snapshot.markup.clone(),
                url: snapshot.url.clone(),
                diffs: flatten(self.batches.values()),
                last_change_id,
            },
        }
    }
}

fn flatten<'a>(batches: impl Iterator<Item = &'a Batch>) -> Vec<DiffRecord> {
    batches.flat_map(|batch| batch.iter().cloned()).collect()
}
