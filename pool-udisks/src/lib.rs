// SPDX-License-Identifier: GPL-3.0-only

//! Client-side pool for a udisks-style storage daemon.
//!
//! The pool mirrors the daemon's device, adapter, expander and port
//! objects, synthesizes the user-facing presentable topology (machine,
//! hubs, drives, volumes, holes, LVM2 groups) and keeps both current from
//! daemon signals, reporting every change on an event stream.

pub mod daemon;
pub mod error;
pub mod events;
pub mod pool;
pub mod transport;

pub use error::PoolError;
pub use events::{PoolEvent, PoolEventStream};
pub use pool::{Pool, PoolSnapshot};
pub use transport::Transport;
