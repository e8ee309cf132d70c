// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the storage presentable pool.
//!
//! This crate defines the data types shared between the pool and its
//! clients:
//!
//! - **Descriptors** mirror the raw attribute snapshots the storage daemon
//!   reports for block devices, adapters, expanders and ports. They are
//!   immutable per recomputation and replaced wholesale on daemon signals.
//! - **Presentables** are nodes in the synthesized, user-facing topology
//!   (hubs, drives, volumes, holes, LVM groups/volumes). A presentable
//!   references its enclosing parent by identifier, never by pointer, so
//!   the enclosing graph is a forest rooted at the Machine node by
//!   construction.
//!
//! No I/O happens here; the `pool-udisks` crate owns all daemon traffic.

pub mod device;
pub mod hardware;
pub mod job;
pub mod lvm;
pub mod presentable;

pub use device::{
    DeviceDescriptor, LinuxMdComponentInfo, LinuxMdInfo, LuksCleartextInfo, Lvm2PvInfo,
    PartitionInfo, PartitionTableInfo,
};
pub use hardware::{AdapterDescriptor, ExpanderDescriptor, PortDescriptor};
pub use job::JobStatus;
pub use lvm::LogicalVolumeSpec;
pub use presentable::{HubKind, MACHINE_ID, Presentable, PresentableKind};
