// SPDX-License-Identifier: GPL-3.0-only

//! Presentable nodes: the synthesized, user-facing storage topology.

use serde::{Deserialize, Serialize};

/// Category of a [`PresentableKind::Hub`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubKind {
    /// A physical host bus adapter.
    Adapter,
    /// A SAS expander or similar fan-out device.
    Expander,
    /// Virtual grouping for RAID, LVM and other logical drives.
    MultiDisk,
    /// Virtual grouping for drives with multiple I/O paths.
    Multipath,
    /// Virtual grouping for USB/FireWire/SDIO drives the daemon reports no
    /// adapter for.
    Peripheral,
}

/// Kind tag of a presentable, a closed sum over every node variant the
/// synthesizer can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PresentableKind {
    /// The root of the topology; exactly one per pool.
    Machine,
    Hub {
        kind: HubKind,
        /// Display name, populated for adapter hubs.
        name: Option<String>,
    },
    Drive,
    /// A Linux MD (RAID) array, present even when not assembled.
    LinuxMdDrive {
        /// Array UUID; `None` for clear/inactive arrays identified by
        /// device file only.
        array_uuid: Option<String>,
    },
    /// A partition, whole-disk filesystem, LUKS cleartext mapping or other
    /// device-backed volume.
    Volume,
    /// Unallocated space within a partitioned drive or extended partition.
    /// No backing device.
    VolumeHole { offset: u64, size: u64 },
    Lvm2VolumeGroup { group_uuid: String },
    Lvm2Volume {
        group_uuid: String,
        lv_uuid: String,
        name: String,
        size: u64,
    },
    /// Unallocated extent space in an LVM2 volume group. No backing device.
    Lvm2VolumeHole { group_uuid: String },
}

/// A node in the presentable topology.
///
/// The identifier is derived deterministically from device attributes, so
/// an unchanged device yields the same id on every recomputation and the
/// set diff recognizes it as a no-op. The enclosing parent is a weak
/// reference by id into the same generation; only the Machine root has
/// none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentable {
    pub id: String,
    pub kind: PresentableKind,

    /// Object path of the backing device. Holes, groups, the machine and
    /// virtual hubs have none.
    pub device_path: Option<String>,

    /// Identifier of the enclosing presentable.
    pub enclosed_by: Option<String>,
}

pub const MACHINE_ID: &str = "machine";

impl Presentable {
    pub fn machine() -> Self {
        Self {
            id: MACHINE_ID.to_string(),
            kind: PresentableKind::Machine,
            device_path: None,
            enclosed_by: None,
        }
    }

    pub fn adapter_hub(adapter_path: &str, name: &str, parent_id: &str) -> Self {
        Self {
            id: format!("hub_{adapter_path}_enclosed_by_{parent_id}"),
            kind: PresentableKind::Hub {
                kind: HubKind::Adapter,
                name: Some(name.to_string()),
            },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn expander_hub(expander_path: &str, parent_id: &str) -> Self {
        Self {
            id: format!("hub_{expander_path}_enclosed_by_{parent_id}"),
            kind: PresentableKind::Hub {
                kind: HubKind::Expander,
                name: None,
            },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    /// A lazily-created virtual hub (multipath / multi-disk / peripheral),
    /// always enclosed by the machine.
    pub fn virtual_hub(kind: HubKind, parent_id: &str) -> Self {
        let tag = match kind {
            HubKind::Multipath => "multipath",
            HubKind::MultiDisk => "multi_disk",
            HubKind::Peripheral => "peripheral",
            HubKind::Adapter | HubKind::Expander => {
                unreachable!("physical hubs are keyed by object path")
            }
        };
        Self {
            id: format!("hub_{tag}_enclosed_by_{parent_id}"),
            kind: PresentableKind::Hub { kind, name: None },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn drive(device_file: &str, device_path: &str, parent_id: &str) -> Self {
        Self {
            id: format!("drive_{device_file}_enclosed_by_{parent_id}"),
            kind: PresentableKind::Drive,
            device_path: Some(device_path.to_string()),
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    /// An MD array drive keyed by array UUID. Stable across assemble/stop,
    /// which is what keeps inactive arrays visible under the same node.
    pub fn linux_md_drive(array_uuid: &str, device_path: Option<&str>, parent_id: &str) -> Self {
        Self {
            id: format!("linux_md_{array_uuid}"),
            kind: PresentableKind::LinuxMdDrive {
                array_uuid: Some(array_uuid.to_string()),
            },
            device_path: device_path.map(str::to_string),
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    /// A clear/inactive MD array with no UUID, keyed by device file.
    pub fn linux_md_drive_without_uuid(
        device_file: &str,
        device_path: &str,
        parent_id: &str,
    ) -> Self {
        Self {
            id: format!("linux_md_{device_file}_enclosed_by_{parent_id}"),
            kind: PresentableKind::LinuxMdDrive { array_uuid: None },
            device_path: Some(device_path.to_string()),
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn volume(device_file: &str, device_path: &str, parent_id: &str) -> Self {
        Self {
            id: format!("volume_{device_file}_enclosed_by_{parent_id}"),
            kind: PresentableKind::Volume,
            device_path: Some(device_path.to_string()),
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn volume_hole(offset: u64, size: u64, parent_id: &str) -> Self {
        Self {
            id: format!("hole_{offset}_{size}_enclosed_by_{parent_id}"),
            kind: PresentableKind::VolumeHole { offset, size },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn lvm2_volume_group(group_uuid: &str, parent_id: &str) -> Self {
        Self {
            id: format!("lvm2_volume_group_{group_uuid}_enclosed_by_{parent_id}"),
            kind: PresentableKind::Lvm2VolumeGroup {
                group_uuid: group_uuid.to_string(),
            },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn lvm2_volume(
        group_uuid: &str,
        lv: &crate::lvm::LogicalVolumeSpec,
        parent_id: &str,
    ) -> Self {
        Self {
            id: format!("lvm2_volume_{}_enclosed_by_{parent_id}", lv.uuid),
            kind: PresentableKind::Lvm2Volume {
                group_uuid: group_uuid.to_string(),
                lv_uuid: lv.uuid.clone(),
                name: lv.name.clone(),
                size: lv.size,
            },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn lvm2_volume_hole(group_uuid: &str, parent_id: &str) -> Self {
        Self {
            id: format!("lvm2_volume_hole_enclosed_by_{parent_id}"),
            kind: PresentableKind::Lvm2VolumeHole {
                group_uuid: group_uuid.to_string(),
            },
            device_path: None,
            enclosed_by: Some(parent_id.to_string()),
        }
    }

    pub fn is_hub(&self) -> bool {
        matches!(self.kind, PresentableKind::Hub { .. })
    }

    pub fn is_drive(&self) -> bool {
        matches!(
            self.kind,
            PresentableKind::Drive | PresentableKind::LinuxMdDrive { .. }
        )
    }

    pub fn is_volume(&self) -> bool {
        matches!(self.kind, PresentableKind::Volume)
    }
}
