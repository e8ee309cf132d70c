// SPDX-License-Identifier: GPL-3.0-only

//! Brute-force synthesis of the presentable topology.
//!
//! Every recomputation rebuilds the whole set from the current descriptor
//! snapshot; the diff against the previous generation turns the rebuild
//! into incremental add/remove notifications. Referential inconsistencies
//! in daemon data never abort a pass, the offending device is skipped
//! with a warning and picked up again once the daemon settles.

use std::collections::{BTreeMap, HashMap};

use pool_types::{DeviceDescriptor, HubKind, Presentable, MACHINE_ID};
use tracing::{debug, warn};

use super::holes::find_holes;
use super::set::PresentableSet;
use super::sort::{find_extended_partition, sorted_devices};
use super::PoolSnapshot;

/// Minimum unallocated extent space, in bytes, before a volume group gets
/// a hole node.
const LVM2_HOLE_THRESHOLD: u64 = 1_000_000;

/// Lazily-created virtual hubs; at most one of each per generation.
struct VirtualHubs {
    multipath: Option<String>,
    multi_disk: Option<String>,
    peripheral: Option<String>,
}

impl VirtualHubs {
    fn new() -> Self {
        Self {
            multipath: None,
            multi_disk: None,
            peripheral: None,
        }
    }

    fn ensure(&mut self, kind: HubKind, set: &mut PresentableSet) -> String {
        let slot = match kind {
            HubKind::Multipath => &mut self.multipath,
            HubKind::MultiDisk => &mut self.multi_disk,
            HubKind::Peripheral => &mut self.peripheral,
            HubKind::Adapter | HubKind::Expander => {
                unreachable!("physical hubs are created eagerly")
            }
        };
        if let Some(id) = slot {
            return id.clone();
        }
        let hub = Presentable::virtual_hub(kind, MACHINE_ID);
        let id = hub.id.clone();
        set.insert(hub);
        *slot = Some(id.clone());
        id
    }
}

/// Rebuild the complete presentable set from the snapshot.
pub fn synthesize(snapshot: &PoolSnapshot) -> PresentableSet {
    let mut set = PresentableSet::new();
    set.insert(Presentable::machine());

    let mut hub_id_by_path = HashMap::new();

    for adapter in snapshot.adapters.values() {
        let hub = Presentable::adapter_hub(&adapter.object_path, &adapter.name, MACHINE_ID);
        hub_id_by_path.insert(adapter.object_path.clone(), hub.id.clone());
        set.insert(hub);
    }

    for expander in snapshot.expanders.values() {
        let parent_id = expander
            .upstream_ports
            .first()
            .and_then(|port_path| snapshot.ports.get(port_path))
            .and_then(|port| hub_id_by_path.get(&port.adapter))
            .cloned()
            .unwrap_or_else(|| {
                warn!(
                    expander = %expander.object_path,
                    "cannot resolve upstream adapter, attaching to machine"
                );
                MACHINE_ID.to_string()
            });
        let hub = Presentable::expander_hub(&expander.object_path, &parent_id);
        hub_id_by_path.insert(expander.object_path.clone(), hub.id.clone());
        set.insert(hub);
    }

    let mut virtual_hubs = VirtualHubs::new();
    let mut drive_id_by_path: HashMap<String, String> = HashMap::new();
    let mut volume_id_by_path: HashMap<String, String> = HashMap::new();

    for device in sorted_devices(&snapshot.devices) {
        if device.should_ignore {
            continue;
        }

        if device.is_drive {
            let drive = synthesize_drive(
                &device,
                snapshot,
                &hub_id_by_path,
                &mut virtual_hubs,
                &mut set,
            );
            drive_id_by_path.insert(device.object_path.clone(), drive.id.clone());

            // A drive carrying media but no partition table is used as one
            // big volume.
            if device.media_available && !device.is_partition_table() {
                let volume =
                    Presentable::volume(&device.device_file, &device.object_path, &drive.id);
                volume_id_by_path.insert(device.object_path.clone(), volume.id.clone());
                set.insert(volume);
            }

            set.insert(drive);
            continue;
        }

        if let Some(partition) = &device.partition {
            let parent_id = if device.is_logical_partition() {
                // Logicals nest inside the extended partition's volume,
                // never directly in the drive.
                let Some(parent_id) = find_extended_partition(&snapshot.devices, &partition.slave)
                    .and_then(|ext| volume_id_by_path.get(&ext.object_path))
                else {
                    warn!(
                        device = %device.object_path,
                        slave = %partition.slave,
                        "logical partition without an extended partition, skipping"
                    );
                    continue;
                };
                parent_id.clone()
            } else {
                // The table can sit on a non-drive device, e.g. a LUKS
                // cleartext volume.
                let Some(parent_id) = drive_id_by_path
                    .get(&partition.slave)
                    .or_else(|| volume_id_by_path.get(&partition.slave))
                else {
                    warn!(
                        device = %device.object_path,
                        slave = %partition.slave,
                        "partition's table device is not presentable, skipping"
                    );
                    continue;
                };
                parent_id.clone()
            };
            let volume = Presentable::volume(&device.device_file, &device.object_path, &parent_id);
            volume_id_by_path.insert(device.object_path.clone(), volume.id.clone());
            set.insert(volume);
            continue;
        }

        if let Some(luks) = &device.luks_cleartext {
            let Some(parent_id) = volume_id_by_path.get(&luks.slave).cloned() else {
                warn!(
                    device = %device.object_path,
                    slave = %luks.slave,
                    "cleartext device's encrypted volume is not presentable, skipping"
                );
                continue;
            };
            let volume = Presentable::volume(&device.device_file, &device.object_path, &parent_id);
            volume_id_by_path.insert(device.object_path.clone(), volume.id.clone());
            set.insert(volume);
            continue;
        }

        if device.is_lvm2_lv || device.is_linux_md_component() || device.is_lvm2_pv() {
            // LVs are synthesized from group metadata; components and PVs
            // are covered by the array / group passes below (a PV that is
            // a partition or drive was already presented above).
            continue;
        }

        debug!(device = %device.object_path, "device kind not presentable, skipping");
    }

    synthesize_inactive_md_arrays(snapshot, &mut virtual_hubs, &mut set);
    synthesize_lvm2_groups(snapshot, &mut virtual_hubs, &mut set);
    synthesize_holes(snapshot, &drive_id_by_path, &volume_id_by_path, &mut set);

    set
}

fn synthesize_drive(
    device: &DeviceDescriptor,
    snapshot: &PoolSnapshot,
    hub_id_by_path: &HashMap<String, String>,
    virtual_hubs: &mut VirtualHubs,
    set: &mut PresentableSet,
) -> Presentable {
    if let Some(md) = &device.linux_md {
        let parent_id = virtual_hubs.ensure(HubKind::MultiDisk, set);
        return if md.uuid.is_empty() {
            Presentable::linux_md_drive_without_uuid(
                &device.device_file,
                &device.object_path,
                &parent_id,
            )
        } else {
            Presentable::linux_md_drive(&md.uuid, Some(&device.object_path), &parent_id)
        };
    }

    if device.is_multipath {
        let parent_id = virtual_hubs.ensure(HubKind::Multipath, set);
        return Presentable::drive(&device.device_file, &device.object_path, &parent_id);
    }

    let parent_id = device
        .drive_ports
        .first()
        .and_then(|port_path| snapshot.ports.get(port_path))
        .and_then(|port| {
            // A port parented by an expander hangs the drive under that
            // expander's hub, otherwise under the adapter's.
            hub_id_by_path
                .get(&port.parent)
                .or_else(|| hub_id_by_path.get(&port.adapter))
        })
        .cloned()
        .unwrap_or_else(|| virtual_hubs.ensure(HubKind::Peripheral, set));

    Presentable::drive(&device.device_file, &device.object_path, &parent_id)
}

/// Arrays known only through their member devices (not currently
/// assembled) still get a drive node, keyed by array UUID.
fn synthesize_inactive_md_arrays(
    snapshot: &PoolSnapshot,
    virtual_hubs: &mut VirtualHubs,
    set: &mut PresentableSet,
) {
    let mut uuids: BTreeMap<&str, ()> = BTreeMap::new();
    for device in snapshot.devices.values() {
        if device.should_ignore {
            continue;
        }
        if let Some(component) = &device.linux_md_component {
            if !component.uuid.is_empty() {
                uuids.insert(&component.uuid, ());
            }
        }
    }

    for device in snapshot.devices.values() {
        if let Some(md) = &device.linux_md {
            uuids.remove(md.uuid.as_str());
        }
    }

    for uuid in uuids.keys() {
        let parent_id = virtual_hubs.ensure(HubKind::MultiDisk, set);
        set.insert(Presentable::linux_md_drive(uuid, None, &parent_id));
    }
}

fn synthesize_lvm2_groups(
    snapshot: &PoolSnapshot,
    virtual_hubs: &mut VirtualHubs,
    set: &mut PresentableSet,
) {
    // One group node per group UUID, no matter how many PVs report it.
    let mut groups: BTreeMap<&str, &pool_types::Lvm2PvInfo> = BTreeMap::new();
    for device in snapshot.devices.values() {
        if device.should_ignore {
            continue;
        }
        if let Some(pv) = &device.lvm2_pv {
            if pv.group_uuid.is_empty() {
                warn!(device = %device.object_path, "physical volume without group uuid, skipping");
                continue;
            }
            groups.entry(&pv.group_uuid).or_insert(pv);
        }
    }

    for (group_uuid, pv) in groups {
        let parent_id = virtual_hubs.ensure(HubKind::MultiDisk, set);
        let group = Presentable::lvm2_volume_group(group_uuid, &parent_id);
        let group_id = group.id.clone();
        set.insert(group);

        for metadata in &pv.group_logical_volumes {
            match pool_types::LogicalVolumeSpec::parse(metadata) {
                Some(lv) => {
                    set.insert(Presentable::lvm2_volume(group_uuid, &lv, &group_id));
                }
                None => {
                    warn!(group = group_uuid, metadata, "unparsable logical volume metadata");
                }
            }
        }

        if pv.group_unallocated_size >= LVM2_HOLE_THRESHOLD {
            set.insert(Presentable::lvm2_volume_hole(group_uuid, &group_id));
        }
    }
}

fn synthesize_holes(
    snapshot: &PoolSnapshot,
    drive_id_by_path: &HashMap<String, String>,
    volume_id_by_path: &HashMap<String, String>,
    set: &mut PresentableSet,
) {
    for device in snapshot.devices.values() {
        let Some(table) = &device.partition_table else {
            continue;
        };
        if device.should_ignore || !device.media_available {
            continue;
        }
        // Partitioned non-drive devices (a table on a cleartext volume)
        // grow their holes on the volume node.
        let Some(parent_id) = drive_id_by_path
            .get(&device.object_path)
            .or_else(|| volume_id_by_path.get(&device.object_path))
        else {
            continue;
        };

        let ignore_logical = table.scheme == "mbr";
        for hole in find_holes(
            &snapshot.devices,
            &device.object_path,
            device.size,
            0,
            device.size,
            ignore_logical,
            None,
        ) {
            set.insert(Presentable::volume_hole(hole.offset, hole.size, parent_id));
        }

        if table.scheme != "mbr" {
            continue;
        }
        let Some(extended) = find_extended_partition(&snapshot.devices, &device.object_path)
        else {
            continue;
        };
        let Some(part) = &extended.partition else {
            continue;
        };
        let Some(extended_volume_id) = volume_id_by_path.get(&extended.object_path) else {
            continue;
        };
        for hole in find_holes(
            &snapshot.devices,
            &device.object_path,
            device.size,
            part.offset,
            part.size,
            false,
            Some(&extended.object_path),
        ) {
            set.insert(Presentable::volume_hole(
                hole.offset,
                hole.size,
                extended_volume_id,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_types::{
        AdapterDescriptor, LinuxMdComponentInfo, LinuxMdInfo, PartitionInfo, PartitionTableInfo,
        PortDescriptor, PresentableKind,
    };

    fn snapshot_with_devices(devices: Vec<DeviceDescriptor>) -> PoolSnapshot {
        PoolSnapshot {
            devices: devices
                .into_iter()
                .map(|d| (d.object_path.clone(), d))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_snapshot_yields_only_the_machine() {
        let set = synthesize(&PoolSnapshot::default());
        assert_eq!(set.len(), 1);
        assert!(set.contains(MACHINE_ID));
    }

    #[test]
    fn drive_with_ports_hangs_under_its_adapter_hub() {
        let mut snapshot = snapshot_with_devices(vec![DeviceDescriptor {
            object_path: "/devices/sda".to_string(),
            device_file: "/dev/sda".to_string(),
            is_drive: true,
            drive_ports: vec!["/ports/0".to_string()],
            ..Default::default()
        }]);
        snapshot.adapters.insert(
            "/adapters/ahci".to_string(),
            AdapterDescriptor {
                object_path: "/adapters/ahci".to_string(),
                name: "AHCI Controller".to_string(),
            },
        );
        snapshot.ports.insert(
            "/ports/0".to_string(),
            PortDescriptor {
                object_path: "/ports/0".to_string(),
                adapter: "/adapters/ahci".to_string(),
                parent: "/adapters/ahci".to_string(),
            },
        );

        let set = synthesize(&snapshot);
        let drive = set.find_by_device_path("/devices/sda").unwrap();
        let parent = set.get(drive.enclosed_by.as_deref().unwrap()).unwrap();
        assert!(parent.is_hub());
        assert!(parent.id.contains("/adapters/ahci"));
    }

    #[test]
    fn portless_drive_falls_back_to_the_peripheral_hub() {
        let snapshot = snapshot_with_devices(vec![DeviceDescriptor {
            object_path: "/devices/sdb".to_string(),
            device_file: "/dev/sdb".to_string(),
            is_drive: true,
            ..Default::default()
        }]);

        let set = synthesize(&snapshot);
        let drive = set.find_by_device_path("/devices/sdb").unwrap();
        assert_eq!(
            drive.enclosed_by.as_deref(),
            Some("hub_peripheral_enclosed_by_machine")
        );
    }

    #[test]
    fn media_without_table_becomes_a_whole_disk_volume() {
        let snapshot = snapshot_with_devices(vec![DeviceDescriptor {
            object_path: "/devices/sdb".to_string(),
            device_file: "/dev/sdb".to_string(),
            is_drive: true,
            media_available: true,
            ..Default::default()
        }]);

        let set = synthesize(&snapshot);
        let drive_id = set.find_by_device_path("/devices/sdb").unwrap().id.clone();
        let volume = set
            .all_by_device_path("/devices/sdb")
            .find(|p| p.is_volume())
            .unwrap();
        assert_eq!(volume.enclosed_by.as_deref(), Some(drive_id.as_str()));
    }

    #[test]
    fn hidden_devices_synthesize_nothing() {
        let snapshot = snapshot_with_devices(vec![DeviceDescriptor {
            object_path: "/devices/sdb".to_string(),
            device_file: "/dev/sdb".to_string(),
            is_drive: true,
            should_ignore: true,
            ..Default::default()
        }]);

        let set = synthesize(&snapshot);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn inactive_array_is_keyed_by_component_uuid() {
        let component = |path: &str| DeviceDescriptor {
            object_path: path.to_string(),
            linux_md_component: Some(LinuxMdComponentInfo {
                uuid: "aa11".to_string(),
                holder: String::new(),
            }),
            ..Default::default()
        };
        let snapshot =
            snapshot_with_devices(vec![component("/devices/sdb"), component("/devices/sdc")]);

        let set = synthesize(&snapshot);
        let array = set.get("linux_md_aa11").unwrap();
        assert!(matches!(
            &array.kind,
            PresentableKind::LinuxMdDrive { array_uuid: Some(u) } if u == "aa11"
        ));
        assert!(array.device_path.is_none());
    }

    #[test]
    fn assembled_array_suppresses_the_inactive_node() {
        let array = DeviceDescriptor {
            object_path: "/devices/md0".to_string(),
            device_file: "/dev/md0".to_string(),
            is_drive: true,
            linux_md: Some(LinuxMdInfo {
                uuid: "aa11".to_string(),
                slaves: vec!["/devices/sdb".to_string()],
            }),
            ..Default::default()
        };
        let component = DeviceDescriptor {
            object_path: "/devices/sdb".to_string(),
            linux_md_component: Some(LinuxMdComponentInfo {
                uuid: "aa11".to_string(),
                holder: "/devices/md0".to_string(),
            }),
            ..Default::default()
        };
        let snapshot = snapshot_with_devices(vec![array, component]);

        let set = synthesize(&snapshot);
        let node = set.get("linux_md_aa11").unwrap();
        assert_eq!(node.device_path.as_deref(), Some("/devices/md0"));
    }

    #[test]
    fn logical_partition_without_an_extended_partition_is_dropped() {
        let table = DeviceDescriptor {
            object_path: "/devices/sda".to_string(),
            device_file: "/dev/sda".to_string(),
            size: 1000,
            is_drive: true,
            media_available: true,
            partition_table: Some(PartitionTableInfo {
                scheme: "mbr".to_string(),
                count: 1,
            }),
            ..Default::default()
        };
        let logical = DeviceDescriptor {
            object_path: "/devices/sda5".to_string(),
            device_file: "/dev/sda5".to_string(),
            partition: Some(PartitionInfo {
                slave: "/devices/sda".to_string(),
                scheme: "mbr".to_string(),
                number: 5,
                type_id: "0x83".to_string(),
                offset: 400,
                size: 100,
            }),
            ..Default::default()
        };
        let snapshot = snapshot_with_devices(vec![table, logical]);

        // The logical must not fall back to the drive as its parent.
        let set = synthesize(&snapshot);
        assert!(set.find_by_device_path("/devices/sda5").is_none());
        assert!(set.find_by_device_path("/devices/sda").is_some());
    }

    #[test]
    fn partitioned_drive_grows_holes() {
        let table = DeviceDescriptor {
            object_path: "/devices/sda".to_string(),
            device_file: "/dev/sda".to_string(),
            size: 1000,
            is_drive: true,
            media_available: true,
            partition_table: Some(PartitionTableInfo {
                scheme: "gpt".to_string(),
                count: 1,
            }),
            ..Default::default()
        };
        let part = DeviceDescriptor {
            object_path: "/devices/sda1".to_string(),
            device_file: "/dev/sda1".to_string(),
            partition: Some(PartitionInfo {
                slave: "/devices/sda".to_string(),
                scheme: "gpt".to_string(),
                number: 1,
                type_id: String::new(),
                offset: 0,
                size: 600,
            }),
            ..Default::default()
        };
        let snapshot = snapshot_with_devices(vec![table, part]);

        let set = synthesize(&snapshot);
        let drive_id = set.find_by_device_path("/devices/sda").unwrap().id.clone();
        let hole = set.get(&format!("hole_600_400_enclosed_by_{drive_id}"));
        assert!(hole.is_some());
    }

    #[test]
    fn rebuild_is_deterministic() {
        let snapshot = snapshot_with_devices(vec![DeviceDescriptor {
            object_path: "/devices/sda".to_string(),
            device_file: "/dev/sda".to_string(),
            is_drive: true,
            media_available: true,
            ..Default::default()
        }]);
        assert_eq!(synthesize(&snapshot), synthesize(&snapshot));
    }
}
