// SPDX-License-Identifier: GPL-3.0-only

//! Unallocated-gap detection on partitioned drives.
//!
//! A gap between partition entries only surfaces as a hole when it is at
//! least one percent of the drive's size; smaller slivers are alignment
//! artifacts nobody can usefully partition.

use std::collections::BTreeMap;

use pool_types::DeviceDescriptor;

/// A byte range on a drive covered by no partition entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub offset: u64,
    pub size: u64,
}

/// Find material gaps inside `[start, start + range_size)` of the table
/// device at `table_path`.
///
/// `ignore_logical` skips logical partitions, which live inside the
/// extended partition's entry and would otherwise punch spurious holes in
/// the primary layout. `exclude` names a partition device (the extended
/// partition, when scanning inside it) whose own entry spans the range
/// and must not count as occupied space.
pub fn find_holes(
    devices: &BTreeMap<String, DeviceDescriptor>,
    table_path: &str,
    drive_size: u64,
    start: u64,
    range_size: u64,
    ignore_logical: bool,
    exclude: Option<&str>,
) -> Vec<Hole> {
    let end = start.saturating_add(range_size);
    let threshold = drive_size / 100;

    let mut entries: Vec<(u64, u64)> = devices
        .values()
        .filter(|d| exclude != Some(d.object_path.as_str()))
        .filter(|d| !(ignore_logical && d.is_logical_partition()))
        .filter_map(|d| d.partition.as_ref())
        .filter(|p| p.slave == table_path)
        .map(|p| (p.offset, p.size))
        .filter(|&(offset, _)| offset >= start && offset < end)
        .collect();
    entries.sort_unstable();

    let mut holes = Vec::new();
    let mut cursor = start;
    for (offset, size) in entries {
        let gap = offset.saturating_sub(cursor);
        if gap >= threshold && gap > 0 {
            holes.push(Hole {
                offset: cursor,
                size: gap,
            });
        }
        cursor = cursor.max(offset.saturating_add(size));
    }

    let tail = end.saturating_sub(cursor);
    if tail >= threshold && tail > 0 {
        holes.push(Hole {
            offset: cursor,
            size: tail,
        });
    }

    holes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_types::PartitionInfo;

    fn partition(path: &str, number: i32, type_id: &str, offset: u64, size: u64) -> DeviceDescriptor {
        DeviceDescriptor {
            object_path: path.to_string(),
            partition: Some(PartitionInfo {
                slave: "/devices/sda".to_string(),
                scheme: "mbr".to_string(),
                number,
                type_id: type_id.to_string(),
                offset,
                size,
            }),
            ..Default::default()
        }
    }

    fn device_map(devices: Vec<DeviceDescriptor>) -> BTreeMap<String, DeviceDescriptor> {
        devices
            .into_iter()
            .map(|d| (d.object_path.clone(), d))
            .collect()
    }

    #[test]
    fn gaps_between_and_after_partitions() {
        let devices = device_map(vec![
            partition("/devices/sda1", 1, "0x83", 0, 100),
            partition("/devices/sda2", 2, "0x83", 200, 100),
        ]);
        let holes = find_holes(&devices, "/devices/sda", 1000, 0, 1000, true, None);
        assert_eq!(
            holes,
            vec![
                Hole { offset: 100, size: 100 },
                Hole { offset: 300, size: 700 },
            ]
        );
    }

    #[test]
    fn immaterial_gap_is_suppressed() {
        let devices = device_map(vec![
            partition("/devices/sda1", 1, "0x83", 0, 995),
        ]);
        // Trailing 5 bytes of a 1000-byte drive sit under the 1% bar.
        let holes = find_holes(&devices, "/devices/sda", 1000, 0, 1000, true, None);
        assert!(holes.is_empty());
    }

    #[test]
    fn fully_covered_drive_has_no_holes() {
        let devices = device_map(vec![
            partition("/devices/sda1", 1, "0x83", 0, 500),
            partition("/devices/sda2", 2, "0x83", 500, 500),
        ]);
        let holes = find_holes(&devices, "/devices/sda", 1000, 0, 1000, true, None);
        assert!(holes.is_empty());
    }

    #[test]
    fn empty_table_is_one_big_hole() {
        let devices = device_map(vec![]);
        let holes = find_holes(&devices, "/devices/sda", 1000, 0, 1000, true, None);
        assert_eq!(holes, vec![Hole { offset: 0, size: 1000 }]);
    }

    #[test]
    fn logical_partitions_are_invisible_to_the_primary_scan() {
        let devices = device_map(vec![
            partition("/devices/sda1", 1, "0x83", 0, 400),
            partition("/devices/sda4", 4, "0x05", 400, 600),
            partition("/devices/sda5", 5, "0x83", 410, 100),
        ]);
        let holes = find_holes(&devices, "/devices/sda", 1000, 0, 1000, true, None);
        assert!(holes.is_empty());
    }

    #[test]
    fn extended_scan_sees_gaps_between_logicals() {
        let extended = partition("/devices/sda4", 4, "0x05", 400, 600);
        let devices = device_map(vec![
            partition("/devices/sda1", 1, "0x83", 0, 400),
            extended,
            partition("/devices/sda5", 5, "0x83", 400, 100),
        ]);
        let holes = find_holes(
            &devices,
            "/devices/sda",
            1000,
            400,
            600,
            false,
            Some("/devices/sda4"),
        );
        assert_eq!(holes, vec![Hole { offset: 500, size: 500 }]);
    }

    #[test]
    fn entries_outside_the_range_are_ignored() {
        let devices = device_map(vec![
            partition("/devices/sda1", 1, "0x83", 0, 400),
            partition("/devices/sda5", 5, "0x83", 400, 200),
        ]);
        let holes = find_holes(
            &devices,
            "/devices/sda",
            1000,
            400,
            600,
            false,
            None,
        );
        assert_eq!(holes, vec![Hole { offset: 600, size: 400 }]);
    }
}
