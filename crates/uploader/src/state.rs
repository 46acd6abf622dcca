//! Upload session state machine.
//!
//! ```text
//! pending --start--> uploading --pause--> paused --resume/start--> uploading
//! uploading --complete--> completed
//! uploading --fail--> failed
//! pending | uploading | paused --cancel--> cancelled
//! ```

use std::fmt;

use folio_protocol::UploadStatus;

use crate::error::UploadError;

/// An event that may move a session to another [`UploadStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadAction {
    Start,
    Pause,
    Resume,
    Complete,
    Fail,
    Cancel,
}

impl fmt::Display for UploadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        })
    }
}

/// Returns the state reached by applying `action` in state `from`.
pub fn transition(from: UploadStatus, action: UploadAction) -> Result<UploadStatus, UploadError> {
    use UploadAction as A;
    use UploadStatus as S;

    let next = match (from, action) {
        (S::Pending | S::Paused, A::Start) => S::Uploading,
        (S::Uploading, A::Pause) => S::Paused,
        (S::Paused, A::Resume) => S::Uploading,
        (S::Uploading, A::Complete) => S::Completed,
        (S::Uploading, A::Fail) => S::Failed,
        (S::Pending | S::Uploading | S::Paused, A::Cancel) => S::Cancelled,
        _ => return Err(UploadError::InvalidTransition { from, action }),
    };
    Ok(next)
}
