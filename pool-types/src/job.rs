// SPDX-License-Identifier: GPL-3.0-only

//! Per-device job state reported by the daemon's JobChanged signal.

use serde::{Deserialize, Serialize};

/// The last known job state for a device (e.g. an ongoing format or
/// self-test). Updated from the daemon's JobChanged signal and carried on
/// the matching pool events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub in_progress: bool,

    /// Daemon job kind string, e.g. `FilesystemCreate`.
    pub kind: String,

    /// UID of the user that initiated the job.
    pub initiated_by_uid: u32,

    pub cancellable: bool,

    /// Completion percentage, or a negative value when unknown.
    pub percentage: f64,
}
