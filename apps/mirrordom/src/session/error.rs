use mirror_markup::MarkupError;
use thiserror::Error;

use crate::model::FramePath;

/// Why the engine refused an update for one frame.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("frame {path} is not tracked")]
    FrameNotFound { path: FramePath },

    #[error("malformed markup for frame {path}: {source}")]
    MalformedMarkup {
        path: FramePath,
        #[source]
        source: MarkupError,
    },
}

impl SessionError {
    pub fn path(&self) -> &FramePath {
        match self {
            SessionError::FrameNotFound { path } | SessionError::MalformedMarkup { path, .. } => {
                path
            }
        }
    }
}
