// SPDX-License-Identifier: GPL-3.0-only

//! Error types for pool construction and daemon traffic.

use thiserror::Error;

/// Failures that can abort pool construction or a daemon call.
///
/// Recomputation itself never fails; referential inconsistencies in daemon
/// data are logged and the offending device is skipped for that pass.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] zbus::Error),

    #[error("Error enumerating {kind}: {source}")]
    Enumerate {
        kind: &'static str,
        #[source]
        source: zbus::Error,
    },

    #[error("Error retrieving properties for {path}: {source}")]
    Properties {
        path: String,
        #[source]
        source: zbus::Error,
    },

    #[error("Missing daemon property: {0}")]
    MissingDaemonProperty(&'static str),

    #[error("Zbus Error")]
    ZbusError(#[from] zbus::Error),
}
