//! Mutable bridge state

use crate::stream::Status;
use std::path::PathBuf;

/// Per-bridge state. Owned by one controller and reset on restart.
///
/// The active session id lives in the [`SessionRouter`](crate::session::SessionRouter),
/// which is the only writer of it.
#[derive(Debug, Clone)]
pub struct BridgeState {
    /// Status of the most recent agent turn
    pub latest_status: Status,
    /// Directory the agent runs in
    pub working_dir: PathBuf,
}

impl BridgeState {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            latest_status: Status::Idle,
            working_dir: working_dir.into(),
        }
    }
}
