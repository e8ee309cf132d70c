// SPDX-License-Identifier: GPL-3.0-only

//! Proxies for the storage daemon's D-Bus interface.

pub(crate) mod props;

use zbus::zvariant::OwnedObjectPath;
use zbus_macros::proxy;

pub const DAEMON_SERVICE: &str = "org.freedesktop.UDisks";
pub const DAEMON_PATH: &str = "/org/freedesktop/UDisks";
pub const DAEMON_INTERFACE: &str = "org.freedesktop.UDisks";
pub const DEVICE_INTERFACE: &str = "org.freedesktop.UDisks.Device";
pub const ADAPTER_INTERFACE: &str = "org.freedesktop.UDisks.Adapter";
pub const EXPANDER_INTERFACE: &str = "org.freedesktop.UDisks.Expander";
pub const PORT_INTERFACE: &str = "org.freedesktop.UDisks.Port";

#[proxy(
    default_service = "org.freedesktop.UDisks",
    default_path = "/org/freedesktop/UDisks",
    interface = "org.freedesktop.UDisks"
)]
pub trait StorageDaemon {
    fn enumerate_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn enumerate_adapters(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn enumerate_expanders(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn enumerate_ports(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    #[zbus(signal)]
    fn device_added(&self, device: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn device_removed(&self, device: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn device_changed(&self, device: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn device_job_changed(
        &self,
        device: OwnedObjectPath,
        job_in_progress: bool,
        job_id: String,
        job_initiated_by_uid: u32,
        job_is_cancellable: bool,
        job_percentage: f64,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn adapter_added(&self, adapter: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn adapter_removed(&self, adapter: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn adapter_changed(&self, adapter: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn expander_added(&self, expander: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn expander_removed(&self, expander: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn expander_changed(&self, expander: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn port_added(&self, port: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn port_removed(&self, port: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn port_changed(&self, port: OwnedObjectPath) -> zbus::Result<()>;
}
