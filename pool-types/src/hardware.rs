// SPDX-License-Identifier: GPL-3.0-only

//! Adapter, expander and port descriptors.
//!
//! These mirror the daemon's host-bus-adapter topology objects. Drives and
//! expanders resolve their enclosing hub through the port map: a port knows
//! its adapter and its parent (which is the adapter itself unless the port
//! hangs off an expander).

use serde::{Deserialize, Serialize};

/// A host bus adapter (HBA / storage controller).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub object_path: String,

    /// Vendor/product name, for display only.
    pub name: String,
}

/// A SAS expander or similar fan-out device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpanderDescriptor {
    pub object_path: String,

    /// Object paths of the ports the expander is connected through; all
    /// stem from the same adapter or upstream expander.
    pub upstream_ports: Vec<String>,
}

/// A single port on an adapter or expander.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub object_path: String,

    /// Object path of the owning adapter.
    pub adapter: String,

    /// Object path of the immediate parent; equals `adapter` for ports
    /// directly on the adapter, otherwise the expander object path.
    pub parent: String,
}
