// SPDX-License-Identifier: GPL-3.0-only

//! Topological ordering of device descriptors.
//!
//! Synthesis walks devices in an order where every device's enclosing
//! device has already been seen: a partition table before its partitions,
//! an extended partition before the logicals inside it, a LUKS backing
//! device before its cleartext device, and an MD array before the
//! component devices it assembles from.

use std::collections::{BTreeMap, HashSet};

use pool_types::DeviceDescriptor;
use tracing::warn;

const MAX_TOPOLOGY_DEPTH: usize = 100;

/// Sort devices so that enclosing devices precede enclosed ones.
///
/// A partition whose table device is absent from the map is dropped for
/// this pass with a warning; it will reappear once the daemon announces
/// the table. Panics if the dependency chain exceeds 100 levels, which
/// can only happen with cyclic daemon data.
pub fn sorted_devices(devices: &BTreeMap<String, DeviceDescriptor>) -> Vec<DeviceDescriptor> {
    let mut out = Vec::with_capacity(devices.len());
    let mut seen = HashSet::new();

    for path in devices.keys() {
        visit(path, devices, &mut seen, &mut out, 0);
    }

    out
}

fn visit(
    path: &str,
    devices: &BTreeMap<String, DeviceDescriptor>,
    seen: &mut HashSet<String>,
    out: &mut Vec<DeviceDescriptor>,
    depth: usize,
) {
    assert!(
        depth < MAX_TOPOLOGY_DEPTH,
        "device dependency chain deeper than {MAX_TOPOLOGY_DEPTH} at {path}"
    );

    if seen.contains(path) {
        return;
    }

    let Some(device) = devices.get(path) else {
        return;
    };

    if let Some(partition) = &device.partition {
        if !is_no_path(&partition.slave) {
            if !devices.contains_key(&partition.slave) {
                warn!(
                    device = %device.object_path,
                    slave = %partition.slave,
                    "partition references an unknown table device, dropping for this pass"
                );
                // Marking the orphan seen keeps it out of the output and
                // silences repeat diagnostics from dependents.
                seen.insert(path.to_string());
                return;
            }
            visit(&partition.slave, devices, seen, out, depth + 1);

            // A logical partition also depends on the extended partition
            // that contains it.
            if device.is_logical_partition() {
                if let Some(extended) = find_extended_partition(devices, &partition.slave) {
                    let extended_path = extended.object_path.clone();
                    visit(&extended_path, devices, seen, out, depth + 1);
                }
            }
        }
    }

    if let Some(luks) = &device.luks_cleartext {
        if !is_no_path(&luks.slave) {
            visit(&luks.slave, devices, seen, out, depth + 1);
        }
    }

    // The assembled array sorts before its components.
    if let Some(component) = &device.linux_md_component {
        if !is_no_path(&component.holder) {
            visit(&component.holder, devices, seen, out, depth + 1);
        }
    }

    seen.insert(path.to_string());
    out.push(device.clone());
}

/// The MS-DOS extended partition sitting directly on the given table
/// device, if any.
pub fn find_extended_partition<'a>(
    devices: &'a BTreeMap<String, DeviceDescriptor>,
    table_path: &str,
) -> Option<&'a DeviceDescriptor> {
    devices.values().find(|d| {
        d.is_msdos_extended_partition()
            && d.partition
                .as_ref()
                .is_some_and(|p| p.slave == table_path)
    })
}

fn is_no_path(path: &str) -> bool {
    path.is_empty() || path == "/"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_types::{LinuxMdComponentInfo, LinuxMdInfo, LuksCleartextInfo, PartitionInfo, PartitionTableInfo};

    fn table(path: &str, scheme: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            object_path: path.to_string(),
            device_file: format!("/dev{}", path.rsplit('/').next().map(|s| format!("/{s}")).unwrap_or_default()),
            size: 1000,
            is_drive: true,
            partition_table: Some(PartitionTableInfo {
                scheme: scheme.to_string(),
                count: 0,
            }),
            ..Default::default()
        }
    }

    fn partition(path: &str, slave: &str, number: i32, type_id: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            object_path: path.to_string(),
            device_file: format!("/dev{}", path.rsplit('/').next().map(|s| format!("/{s}")).unwrap_or_default()),
            partition: Some(PartitionInfo {
                slave: slave.to_string(),
                scheme: "mbr".to_string(),
                number,
                type_id: type_id.to_string(),
                offset: number as u64 * 100,
                size: 50,
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

    fn position(out: &[DeviceDescriptor], path: &str) -> usize {
        out.iter().position(|d| d.object_path == path).unwrap()
    }

    #[test]
    fn table_sorts_before_partitions() {
        let devices = device_map(vec![
            partition("/devices/sda1", "/devices/sda", 1, "0x83"),
            table("/devices/sda", "mbr"),
        ]);
        let out = sorted_devices(&devices);
        assert!(position(&out, "/devices/sda") < position(&out, "/devices/sda1"));
    }

    #[test]
    fn extended_sorts_before_logical() {
        let devices = device_map(vec![
            partition("/devices/sda5", "/devices/sda", 5, "0x83"),
            partition("/devices/sda9", "/devices/sda", 4, "0x05"),
            table("/devices/sda", "mbr"),
        ]);
        let out = sorted_devices(&devices);
        assert!(position(&out, "/devices/sda9") < position(&out, "/devices/sda5"));
    }

    #[test]
    fn luks_backing_sorts_before_cleartext() {
        let mut cleartext = DeviceDescriptor {
            object_path: "/devices/dm_0".to_string(),
            ..Default::default()
        };
        cleartext.luks_cleartext = Some(LuksCleartextInfo {
            slave: "/devices/sda1".to_string(),
        });
        let devices = device_map(vec![
            cleartext,
            partition("/devices/sda1", "/devices/sda", 1, "0x83"),
            table("/devices/sda", "mbr"),
        ]);
        let out = sorted_devices(&devices);
        assert!(position(&out, "/devices/sda1") < position(&out, "/devices/dm_0"));
    }

    #[test]
    fn md_array_sorts_before_components() {
        let array = DeviceDescriptor {
            object_path: "/devices/md0".to_string(),
            device_file: "/dev/md0".to_string(),
            is_drive: true,
            linux_md: Some(LinuxMdInfo {
                uuid: "d8cc70d8".to_string(),
                slaves: vec!["/devices/sdb".to_string(), "/devices/sdc".to_string()],
            }),
            ..Default::default()
        };
        let component = |path: &str| DeviceDescriptor {
            object_path: path.to_string(),
            linux_md_component: Some(LinuxMdComponentInfo {
                uuid: "d8cc70d8".to_string(),
                holder: "/devices/md0".to_string(),
            }),
            ..Default::default()
        };
        let devices = device_map(vec![
            component("/devices/sdb"),
            component("/devices/sdc"),
            array,
        ]);
        let out = sorted_devices(&devices);
        assert!(position(&out, "/devices/md0") < position(&out, "/devices/sdb"));
        assert!(position(&out, "/devices/md0") < position(&out, "/devices/sdc"));
    }

    #[test]
    fn partition_with_unknown_table_is_dropped() {
        let devices = device_map(vec![partition("/devices/sda1", "/devices/gone", 1, "0x83")]);
        let out = sorted_devices(&devices);
        assert!(out.is_empty());
    }

    #[test]
    fn orphan_partition_stays_dropped_for_its_dependents() {
        let mut cleartext = DeviceDescriptor {
            object_path: "/devices/dm_0".to_string(),
            ..Default::default()
        };
        cleartext.luks_cleartext = Some(LuksCleartextInfo {
            slave: "/devices/sda1".to_string(),
        });
        let devices = device_map(vec![
            cleartext,
            partition("/devices/sda1", "/devices/gone", 1, "0x83"),
        ]);

        // The orphan is visited twice (via the cleartext device and via
        // the outer walk); it must be dropped both times while the
        // cleartext device still comes through.
        let out = sorted_devices(&devices);
        let paths: Vec<&str> = out.iter().map(|d| d.object_path.as_str()).collect();
        assert_eq!(paths, vec!["/devices/dm_0"]);
    }

    #[test]
    #[should_panic(expected = "device dependency chain deeper than")]
    fn cyclic_slave_references_hit_the_depth_bound() {
        let devices = device_map(vec![
            partition("/devices/a", "/devices/b", 1, "0x83"),
            partition("/devices/b", "/devices/a", 1, "0x83"),
        ]);
        sorted_devices(&devices);
    }

    #[test]
    fn sort_is_idempotent_over_its_output() {
        let devices = device_map(vec![
            partition("/devices/sda5", "/devices/sda", 5, "0x83"),
            partition("/devices/sda1", "/devices/sda", 1, "0x83"),
            partition("/devices/sda4", "/devices/sda", 4, "0x0f"),
            table("/devices/sda", "mbr"),
        ]);
        let first = sorted_devices(&devices);
        let second = sorted_devices(&device_map(first.clone()));
        assert_eq!(
            first.iter().map(|d| &d.object_path).collect::<Vec<_>>(),
            second.iter().map(|d| &d.object_path).collect::<Vec<_>>()
        );
    }
}
