// SPDX-License-Identifier: GPL-3.0-only

//! Block device descriptors mirrored from the storage daemon.

use serde::{Deserialize, Serialize};

/// Raw attribute snapshot for one block device, as reported by the daemon.
///
/// Kind-specific attributes live in the `Option` sub-structs; a populated
/// option is the kind tag (e.g. `partition.is_some()` means the device is a
/// partition). The descriptor is immutable for the lifetime of one
/// recomputation and replaced wholesale when the daemon signals a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Opaque daemon object identifier (D-Bus object path).
    pub object_path: String,

    /// UNIX block special device file, e.g. `/dev/sda`.
    pub device_file: String,

    /// Total size in bytes.
    pub size: u64,

    /// Whether media is currently present in the device.
    pub media_available: bool,

    /// Devices the daemon marks as hidden (e.g. paths of a multipath
    /// device) must not synthesize presentables of their own.
    pub should_ignore: bool,

    /// Whether this device is a drive (as opposed to a partition or a
    /// device-mapper product).
    pub is_drive: bool,

    /// Whether this drive is a multipath device (dm-multipath).
    pub is_multipath: bool,

    /// Object paths of the ports the drive is connected through. Upstream
    /// guarantees all ports stem from the same adapter or expander.
    pub drive_ports: Vec<String>,

    pub partition_table: Option<PartitionTableInfo>,
    pub partition: Option<PartitionInfo>,
    pub luks_cleartext: Option<LuksCleartextInfo>,
    pub linux_md: Option<LinuxMdInfo>,
    pub linux_md_component: Option<LinuxMdComponentInfo>,
    pub lvm2_pv: Option<Lvm2PvInfo>,

    /// Whether this device is an LVM2 logical volume. LVs are synthesized
    /// from their PV's group metadata, not from the LV device itself.
    pub is_lvm2_lv: bool,
}

/// Partition-table attributes of a partitioned device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionTableInfo {
    /// Partitioning scheme, e.g. `mbr` or `gpt`.
    pub scheme: String,

    /// Number of partition entries.
    pub count: i32,
}

/// Partition attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Object path of the device holding the partition table.
    pub slave: String,

    /// Scheme of the containing table, e.g. `mbr`.
    pub scheme: String,

    /// Partition number (1-based; ≥ 5 means logical under `mbr`).
    pub number: i32,

    /// Type identifier as reported by the daemon, e.g. `0x05` or a GPT
    /// type GUID.
    pub type_id: String,

    /// Byte offset of the partition within the parent device.
    pub offset: u64,

    /// Partition size in bytes.
    pub size: u64,
}

/// LUKS cleartext mapping attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LuksCleartextInfo {
    /// Object path of the backing encrypted device.
    pub slave: String,
}

/// Attributes of an assembled Linux MD (RAID) array device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinuxMdInfo {
    /// Array UUID; empty for `clear`/`inactive` arrays.
    pub uuid: String,

    /// Object paths of the member devices.
    pub slaves: Vec<String>,
}

/// Attributes of a Linux MD member device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinuxMdComponentInfo {
    /// UUID of the array this component belongs to.
    pub uuid: String,

    /// Object path of the assembled array device, if running.
    pub holder: String,
}

/// Attributes of an LVM2 physical volume, including the group metadata the
/// daemon embeds on every PV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lvm2PvInfo {
    pub uuid: String,
    pub group_uuid: String,
    pub group_name: String,

    /// Total size of the volume group in bytes.
    pub group_size: u64,

    /// Unallocated extent space in the group, in bytes.
    pub group_unallocated_size: u64,

    /// Extent size in bytes.
    pub group_extent_size: u64,

    /// One metadata string per logical volume in the group
    /// (semicolon-delimited `key=value` tokens, see [`crate::lvm`]).
    pub group_logical_volumes: Vec<String>,
}

impl DeviceDescriptor {
    pub fn is_partition(&self) -> bool {
        self.partition.is_some()
    }

    pub fn is_partition_table(&self) -> bool {
        self.partition_table.is_some()
    }

    pub fn is_luks_cleartext(&self) -> bool {
        self.luks_cleartext.is_some()
    }

    pub fn is_linux_md(&self) -> bool {
        self.linux_md.is_some()
    }

    pub fn is_linux_md_component(&self) -> bool {
        self.linux_md_component.is_some()
    }

    pub fn is_lvm2_pv(&self) -> bool {
        self.lvm2_pv.is_some()
    }

    /// Whether this is an MS-DOS extended partition (type 0x05, 0x0f or
    /// 0x85 under the `mbr` scheme), i.e. a container for logical
    /// partitions.
    pub fn is_msdos_extended_partition(&self) -> bool {
        let Some(part) = &self.partition else {
            return false;
        };
        if part.scheme != "mbr" {
            return false;
        }
        matches!(parse_partition_type(&part.type_id), Some(0x05 | 0x0f | 0x85))
    }

    /// Whether this is a logical partition inside an MS-DOS extended
    /// partition.
    pub fn is_logical_partition(&self) -> bool {
        self.partition
            .as_ref()
            .is_some_and(|p| p.scheme == "mbr" && p.number >= 5)
    }
}

/// Parse a partition type identifier the way `strtol(s, NULL, 0)` would:
/// `0x` prefix means hex, leading `0` means octal, otherwise decimal.
pub fn parse_partition_type(type_id: &str) -> Option<u32> {
    let s = type_id.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}
