use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::ChangeId;
use crate::protocol::{self, UpdateBatch, UpdateRequest, UpdateResponse};

use super::Session;

/// A [`Session`] shared between one producer and any number of viewers.
///
/// Each submitted batch is applied under the write lock as a unit; viewer
/// queries take the read lock and copy out batch pointers only.
#[derive(Clone, Debug, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write()
    }

    pub fn last_change_id(&self) -> ChangeId {
        self.inner.read().last_change_id()
    }

    pub fn submit_update(&self, batch: UpdateBatch) -> ChangeId {
        let mut session = self.inner.write();
        protocol::submit_update(&mut session, batch)
    }

    pub fn get_update(&self, request: &UpdateRequest) -> UpdateResponse {
        let session = self.inner.read();
        protocol::get_update(&session, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FramePath;
    use std::thread;

    #[test]
    fn readers_see_whole_batches() {
        let shared = SharedSession::default();
        shared
            .write()
            .init_frame(FramePath::main(), "<html></html>", None, Vec::new())
            .unwrap();

        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let _ = shared.write().record_diffs(&FramePath::main(), Vec::new());
                }
            })
        };
        let reader = {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut seen = 0;
                for _ in 0..50 {
                    let response = shared.get_update(&UpdateRequest::default());
                    assert!(response.last_change_id >= seen);
                    seen = response.last_change_id;
                    let main = &response.changesets[0];
                    assert_eq!(main.update.last_change_id(), response.last_change_id);
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(shared.last_change_id(), 52);
    }
}
