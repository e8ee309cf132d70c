// SPDX-License-Identifier: GPL-3.0-only

//! Pool event stream.

use futures::stream::Stream;
use futures::task::{Context, Poll};
use serde::Serialize;
use tokio::sync::mpsc;

use pool_types::{
    AdapterDescriptor, DeviceDescriptor, ExpanderDescriptor, JobStatus, PortDescriptor,
    Presentable,
};

/// Everything the pool can tell a listener.
///
/// Raw daemon object events (`Device*`, `Adapter*`, ...) report descriptor
/// changes; `Presentable*` events report the synthesized topology. After a
/// raw event, presentable removals arrive before additions; removals are
/// ordered children-first and additions parents-first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PoolEvent {
    /// The daemon connection is gone. Terminal; the stream ends after this.
    Disconnected,

    DeviceAdded(DeviceDescriptor),
    DeviceRemoved { object_path: String },
    DeviceChanged(DeviceDescriptor),
    DeviceJobChanged {
        object_path: String,
        job: JobStatus,
    },

    AdapterAdded(AdapterDescriptor),
    AdapterRemoved { object_path: String },
    AdapterChanged(AdapterDescriptor),

    ExpanderAdded(ExpanderDescriptor),
    ExpanderRemoved { object_path: String },
    ExpanderChanged(ExpanderDescriptor),

    PortAdded(PortDescriptor),
    PortRemoved { object_path: String },
    PortChanged(PortDescriptor),

    PresentableAdded(Presentable),
    PresentableRemoved(Presentable),
    /// The backing device of an existing presentable changed attributes
    /// without changing identity.
    PresentableChanged(Presentable),
    /// Job state changed on the backing device of this presentable.
    PresentableJobChanged(Presentable),
}

pub struct PoolEventStream {
    pub(crate) receiver: mpsc::Receiver<PoolEvent>,
}

impl Stream for PoolEventStream {
    type Item = PoolEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
