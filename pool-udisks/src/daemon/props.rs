// SPDX-License-Identifier: GPL-3.0-only

//! Generic property-map fetch and descriptor decoding.
//!
//! The daemon exposes every attribute through `org.freedesktop.DBus.Properties`
//! `GetAll`; descriptors are decoded from the resulting string → variant map.
//! Decoding is tolerant: a missing or mistyped property yields the field's
//! default, so partial daemon data never aborts a fetch.

use std::collections::HashMap;

use pool_types::{
    AdapterDescriptor, DeviceDescriptor, ExpanderDescriptor, LinuxMdComponentInfo, LinuxMdInfo,
    LuksCleartextInfo, Lvm2PvInfo, PartitionInfo, PartitionTableInfo, PortDescriptor,
};
use zbus::Connection;
use zbus::names::InterfaceName;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use super::{ADAPTER_INTERFACE, DAEMON_SERVICE, DEVICE_INTERFACE, EXPANDER_INTERFACE, PORT_INTERFACE};
use crate::error::PoolError;

pub(crate) type PropertyMap = HashMap<String, OwnedValue>;

pub(crate) async fn get_all(
    connection: &Connection,
    path: &str,
    interface: &str,
) -> Result<PropertyMap, PoolError> {
    let proxy = zbus::fdo::PropertiesProxy::builder(connection)
        .destination(DAEMON_SERVICE)?
        .path(path.to_string())?
        .build()
        .await?;

    let interface = InterfaceName::try_from(interface).map_err(zbus::Error::from)?;
    proxy
        .get_all(interface)
        .await
        .map_err(|e| PoolError::Properties {
            path: path.to_string(),
            source: e.into(),
        })
}

fn string_prop(map: &PropertyMap, key: &str) -> String {
    map.get(key)
        .and_then(|v| String::try_from(v.clone()).ok())
        .unwrap_or_default()
}

fn bool_prop(map: &PropertyMap, key: &str) -> bool {
    map.get(key)
        .and_then(|v| bool::try_from(v.clone()).ok())
        .unwrap_or_default()
}

fn u64_prop(map: &PropertyMap, key: &str) -> u64 {
    map.get(key)
        .and_then(|v| u64::try_from(v.clone()).ok())
        .unwrap_or_default()
}

fn i32_prop(map: &PropertyMap, key: &str) -> i32 {
    map.get(key)
        .and_then(|v| i32::try_from(v.clone()).ok())
        .unwrap_or_default()
}

fn path_prop(map: &PropertyMap, key: &str) -> String {
    map.get(key)
        .and_then(|v| OwnedObjectPath::try_from(v.clone()).ok())
        .map(|p| p.to_string())
        .unwrap_or_default()
}

fn path_list_prop(map: &PropertyMap, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(|v| Vec::<OwnedObjectPath>::try_from(v.clone()).ok())
        .map(|paths| paths.into_iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

fn string_list_prop(map: &PropertyMap, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(|v| Vec::<String>::try_from(v.clone()).ok())
        .unwrap_or_default()
}

pub(crate) async fn fetch_device(
    connection: &Connection,
    object_path: &str,
) -> Result<DeviceDescriptor, PoolError> {
    let map = get_all(connection, object_path, DEVICE_INTERFACE).await?;
    Ok(device_from_map(object_path, &map))
}

pub(crate) fn device_from_map(object_path: &str, map: &PropertyMap) -> DeviceDescriptor {
    let mut desc = DeviceDescriptor {
        object_path: object_path.to_string(),
        device_file: string_prop(map, "DeviceFile"),
        size: u64_prop(map, "DeviceSize"),
        media_available: bool_prop(map, "DeviceIsMediaAvailable"),
        should_ignore: bool_prop(map, "DevicePresentationHide")
            || bool_prop(map, "DeviceIsLinuxDmmpComponent"),
        is_drive: bool_prop(map, "DeviceIsDrive"),
        is_multipath: bool_prop(map, "DeviceIsLinuxDmmp"),
        drive_ports: path_list_prop(map, "DrivePorts"),
        is_lvm2_lv: bool_prop(map, "DeviceIsLinuxLvm2LV"),
        ..Default::default()
    };

    if bool_prop(map, "DeviceIsPartitionTable") {
        desc.partition_table = Some(PartitionTableInfo {
            scheme: string_prop(map, "PartitionTableScheme"),
            count: i32_prop(map, "PartitionTableCount"),
        });
    }

    if bool_prop(map, "DeviceIsPartition") {
        desc.partition = Some(PartitionInfo {
            slave: path_prop(map, "PartitionSlave"),
            scheme: string_prop(map, "PartitionScheme"),
            number: i32_prop(map, "PartitionNumber"),
            type_id: string_prop(map, "PartitionType"),
            offset: u64_prop(map, "PartitionOffset"),
            size: u64_prop(map, "PartitionSize"),
        });
    }

    if bool_prop(map, "DeviceIsLuksCleartext") {
        desc.luks_cleartext = Some(LuksCleartextInfo {
            slave: path_prop(map, "LuksCleartextSlave"),
        });
    }

    if bool_prop(map, "DeviceIsLinuxMd") {
        desc.linux_md = Some(LinuxMdInfo {
            uuid: string_prop(map, "LinuxMdUuid"),
            slaves: path_list_prop(map, "LinuxMdSlaves"),
        });
    }

    if bool_prop(map, "DeviceIsLinuxMdComponent") {
        desc.linux_md_component = Some(LinuxMdComponentInfo {
            uuid: string_prop(map, "LinuxMdComponentUuid"),
            holder: path_prop(map, "LinuxMdComponentHolder"),
        });
    }

    if bool_prop(map, "DeviceIsLinuxLvm2PV") {
        desc.lvm2_pv = Some(Lvm2PvInfo {
            uuid: string_prop(map, "LinuxLvm2PVUuid"),
            group_uuid: string_prop(map, "LinuxLvm2PVGroupUuid"),
            group_name: string_prop(map, "LinuxLvm2PVGroupName"),
            group_size: u64_prop(map, "LinuxLvm2PVGroupSize"),
            group_unallocated_size: u64_prop(map, "LinuxLvm2PVGroupUnallocatedSize"),
            group_extent_size: u64_prop(map, "LinuxLvm2PVGroupExtentSize"),
            group_logical_volumes: string_list_prop(map, "LinuxLvm2PVGroupLogicalVolumes"),
        });
    }

    desc
}

pub(crate) async fn fetch_adapter(
    connection: &Connection,
    object_path: &str,
) -> Result<AdapterDescriptor, PoolError> {
    let map = get_all(connection, object_path, ADAPTER_INTERFACE).await?;
    let vendor = string_prop(&map, "Vendor");
    let model = string_prop(&map, "Model");
    let name = format!("{vendor} {model}").trim().to_string();
    Ok(AdapterDescriptor {
        object_path: object_path.to_string(),
        name,
    })
}

pub(crate) async fn fetch_expander(
    connection: &Connection,
    object_path: &str,
) -> Result<ExpanderDescriptor, PoolError> {
    let map = get_all(connection, object_path, EXPANDER_INTERFACE).await?;
    Ok(ExpanderDescriptor {
        object_path: object_path.to_string(),
        upstream_ports: path_list_prop(&map, "UpstreamPorts"),
    })
}

pub(crate) async fn fetch_port(
    connection: &Connection,
    object_path: &str,
) -> Result<PortDescriptor, PoolError> {
    let map = get_all(connection, object_path, PORT_INTERFACE).await?;
    Ok(PortDescriptor {
        object_path: object_path.to_string(),
        adapter: path_prop(&map, "Adapter"),
        parent: path_prop(&map, "Parent"),
    })
}

/// Daemon-level properties fetched once at construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct DaemonProperties {
    pub daemon_version: String,
    pub supports_luks_devices: bool,
}

pub(crate) async fn fetch_daemon_properties(
    connection: &Connection,
) -> Result<DaemonProperties, PoolError> {
    let map = get_all(connection, super::DAEMON_PATH, super::DAEMON_INTERFACE).await?;

    if !map.contains_key("DaemonVersion") {
        return Err(PoolError::MissingDaemonProperty("DaemonVersion"));
    }

    Ok(DaemonProperties {
        daemon_version: string_prop(&map, "DaemonVersion"),
        supports_luks_devices: bool_prop(&map, "SupportsLuksDevices"),
    })
}
