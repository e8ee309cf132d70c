// SPDX-License-Identifier: GPL-3.0-only

//! The device pool: descriptor cache, presentable topology and the signal
//! loop that keeps both current.

pub mod diff;
pub mod holes;
pub mod set;
pub mod sort;
pub mod synthesize;

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use futures::stream::{SelectAll, Stream};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use zbus::Connection;

use pool_types::{
    AdapterDescriptor, DeviceDescriptor, ExpanderDescriptor, JobStatus, PortDescriptor,
    Presentable,
};

use crate::daemon::{StorageDaemonProxy, props};
use crate::error::PoolError;
use crate::events::{PoolEvent, PoolEventStream};
use crate::transport::Transport;

use self::diff::{PresentableDiff, diff_sets};
use self::set::PresentableSet;
use self::sort::sorted_devices;
use self::synthesize::synthesize;

/// Raw descriptor state mirrored from the daemon, keyed by object path.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pub devices: BTreeMap<String, DeviceDescriptor>,
    pub adapters: BTreeMap<String, AdapterDescriptor>,
    pub expanders: BTreeMap<String, ExpanderDescriptor>,
    pub ports: BTreeMap<String, PortDescriptor>,
}

struct PoolState {
    snapshot: PoolSnapshot,
    presentables: PresentableSet,
    jobs: HashMap<String, JobStatus>,
    daemon_version: String,
    supports_luks_devices: bool,
}

/// Signals after argument decoding, fanned into one stream.
enum Incoming {
    DeviceAdded(String),
    DeviceRemoved(String),
    DeviceChanged(String),
    DeviceJobChanged(String, JobStatus),
    AdapterAdded(String),
    AdapterRemoved(String),
    AdapterChanged(String),
    ExpanderAdded(String),
    ExpanderRemoved(String),
    ExpanderChanged(String),
    PortAdded(String),
    PortRemoved(String),
    PortChanged(String),
}

type IncomingStream = Pin<Box<dyn Stream<Item = Incoming> + Send>>;

/// Live client-side model of the storage daemon.
///
/// All state sits behind one lock and is only written by the spawned
/// signal task; accessors return snapshots by value. Dropping the matching
/// [`PoolEventStream`] stops the signal task.
#[derive(Clone)]
pub struct Pool {
    state: Arc<Mutex<PoolState>>,
}

impl Pool {
    /// Connect over the given transport and build the initial topology.
    ///
    /// Construction is all-or-nothing: a failure to enumerate or describe
    /// any daemon object fails the whole call.
    pub async fn connect(transport: &Transport) -> Result<(Self, PoolEventStream), PoolError> {
        let connection = transport.connect().await?;
        Self::connect_with(connection).await
    }

    /// Build a pool on an already-established connection.
    pub async fn connect_with(
        connection: Connection,
    ) -> Result<(Self, PoolEventStream), PoolError> {
        let proxy = StorageDaemonProxy::new(&connection).await?;

        // Subscribe before enumerating so nothing slips between the two.
        let incoming = subscribe(&proxy).await?;

        let daemon = props::fetch_daemon_properties(&connection).await?;

        let mut snapshot = PoolSnapshot::default();
        for path in proxy
            .enumerate_adapters()
            .await
            .map_err(|e| PoolError::Enumerate { kind: "adapters", source: e })?
        {
            let adapter = props::fetch_adapter(&connection, path.as_str()).await?;
            snapshot.adapters.insert(path.to_string(), adapter);
        }
        for path in proxy
            .enumerate_expanders()
            .await
            .map_err(|e| PoolError::Enumerate { kind: "expanders", source: e })?
        {
            let expander = props::fetch_expander(&connection, path.as_str()).await?;
            snapshot.expanders.insert(path.to_string(), expander);
        }
        for path in proxy
            .enumerate_ports()
            .await
            .map_err(|e| PoolError::Enumerate { kind: "ports", source: e })?
        {
            let port = props::fetch_port(&connection, path.as_str()).await?;
            snapshot.ports.insert(path.to_string(), port);
        }
        for path in proxy
            .enumerate_devices()
            .await
            .map_err(|e| PoolError::Enumerate { kind: "devices", source: e })?
        {
            let device = props::fetch_device(&connection, path.as_str()).await?;
            snapshot.devices.insert(path.to_string(), device);
        }

        let presentables = synthesize(&snapshot);
        let state = Arc::new(Mutex::new(PoolState {
            snapshot,
            presentables,
            jobs: HashMap::new(),
            daemon_version: daemon.daemon_version,
            supports_luks_devices: daemon.supports_luks_devices,
        }));

        let (sender, receiver) = mpsc::channel(64);
        tokio::spawn(event_loop(connection, state.clone(), sender, incoming));

        Ok((Self { state }, PoolEventStream { receiver }))
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All devices in topological order (enclosing devices first).
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        sorted_devices(&self.lock().snapshot.devices)
    }

    pub fn device_by_object_path(&self, object_path: &str) -> Option<DeviceDescriptor> {
        self.lock().snapshot.devices.get(object_path).cloned()
    }

    pub fn device_by_device_file(&self, device_file: &str) -> Option<DeviceDescriptor> {
        self.lock()
            .snapshot
            .devices
            .values()
            .find(|d| d.device_file == device_file)
            .cloned()
    }

    pub fn adapters(&self) -> Vec<AdapterDescriptor> {
        self.lock().snapshot.adapters.values().cloned().collect()
    }

    pub fn expanders(&self) -> Vec<ExpanderDescriptor> {
        self.lock().snapshot.expanders.values().cloned().collect()
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        self.lock().snapshot.ports.values().cloned().collect()
    }

    /// The current presentable topology in canonical order.
    pub fn presentables(&self) -> Vec<Presentable> {
        self.lock()
            .presentables
            .in_canonical_order()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn presentable_by_id(&self, id: &str) -> Option<Presentable> {
        self.lock().presentables.get(id).cloned()
    }

    /// Direct children of a presentable, in canonical order.
    pub fn enclosed_presentables(&self, id: &str) -> Vec<Presentable> {
        self.lock()
            .presentables
            .enclosed(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn daemon_version(&self) -> String {
        self.lock().daemon_version.clone()
    }

    pub fn supports_luks_devices(&self) -> bool {
        self.lock().supports_luks_devices
    }

    /// Last known job state for a device, if any was ever reported.
    pub fn job_status(&self, object_path: &str) -> Option<JobStatus> {
        self.lock().jobs.get(object_path).cloned()
    }
}

macro_rules! path_signal {
    ($proxy:expr, $receive:ident, $field:ident, $variant:expr) => {{
        let stream = $proxy.$receive().await?;
        Box::pin(stream.filter_map(|signal| {
            futures::future::ready(match signal.args() {
                Ok(args) => Some($variant(args.$field.to_string())),
                Err(e) => {
                    warn!("cannot decode signal arguments: {e}");
                    None
                }
            })
        })) as IncomingStream
    }};
}

async fn subscribe(proxy: &StorageDaemonProxy<'_>) -> Result<SelectAll<IncomingStream>, PoolError> {
    let job_stream = proxy.receive_device_job_changed().await?;
    let streams: Vec<IncomingStream> = vec![
        path_signal!(proxy, receive_device_added, device, Incoming::DeviceAdded),
        path_signal!(proxy, receive_device_removed, device, Incoming::DeviceRemoved),
        path_signal!(proxy, receive_device_changed, device, Incoming::DeviceChanged),
        path_signal!(proxy, receive_adapter_added, adapter, Incoming::AdapterAdded),
        path_signal!(proxy, receive_adapter_removed, adapter, Incoming::AdapterRemoved),
        path_signal!(proxy, receive_adapter_changed, adapter, Incoming::AdapterChanged),
        path_signal!(proxy, receive_expander_added, expander, Incoming::ExpanderAdded),
        path_signal!(proxy, receive_expander_removed, expander, Incoming::ExpanderRemoved),
        path_signal!(proxy, receive_expander_changed, expander, Incoming::ExpanderChanged),
        path_signal!(proxy, receive_port_added, port, Incoming::PortAdded),
        path_signal!(proxy, receive_port_removed, port, Incoming::PortRemoved),
        path_signal!(proxy, receive_port_changed, port, Incoming::PortChanged),
        Box::pin(job_stream.filter_map(|signal| {
            futures::future::ready(match signal.args() {
                Ok(args) => Some(Incoming::DeviceJobChanged(
                    args.device.to_string(),
                    JobStatus {
                        in_progress: args.job_in_progress,
                        kind: args.job_id,
                        initiated_by_uid: args.job_initiated_by_uid,
                        cancellable: args.job_is_cancellable,
                        percentage: args.job_percentage,
                    },
                )),
                Err(e) => {
                    warn!("cannot decode job signal arguments: {e}");
                    None
                }
            })
        })) as IncomingStream,
    ];

    Ok(futures::stream::select_all(streams))
}

async fn event_loop(
    connection: Connection,
    state: Arc<Mutex<PoolState>>,
    sender: mpsc::Sender<PoolEvent>,
    mut incoming: SelectAll<IncomingStream>,
) {
    while let Some(signal) = incoming.next().await {
        for event in handle_signal(&connection, &state, signal).await {
            if sender.send(event).await.is_err() {
                return;
            }
        }
    }
    let _ = sender.send(PoolEvent::Disconnected).await;
}

fn lock_state(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Rebuild the topology against the updated snapshot; the returned diff is
/// relative to the previous generation.
fn recompute(state: &mut PoolState) -> PresentableDiff {
    let next = synthesize(&state.snapshot);
    let diff = diff_sets(&state.presentables, &next);
    state.presentables = next;
    diff
}

fn push_diff_events(events: &mut Vec<PoolEvent>, diff: PresentableDiff) {
    events.extend(diff.removed.into_iter().map(PoolEvent::PresentableRemoved));
    events.extend(diff.added.into_iter().map(PoolEvent::PresentableAdded));
}

async fn handle_signal(
    connection: &Connection,
    state: &Mutex<PoolState>,
    signal: Incoming,
) -> Vec<PoolEvent> {
    // Fetches happen before taking the lock; the lock is never held across
    // an await point.
    match signal {
        Incoming::DeviceAdded(path) => {
            let known = lock_state(state).snapshot.devices.contains_key(&path);
            if known {
                warn!(device = %path, "add for a known device, treating as change");
                return handle_device_changed(connection, state, path).await;
            }
            let descriptor = match props::fetch_device(connection, &path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(device = %path, "cannot describe added device: {e}");
                    return Vec::new();
                }
            };
            let diff = {
                let mut st = lock_state(state);
                st.snapshot.devices.insert(path, descriptor.clone());
                recompute(&mut st)
            };
            let mut events = vec![PoolEvent::DeviceAdded(descriptor)];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::DeviceRemoved(path) => {
            let diff = {
                let mut st = lock_state(state);
                if st.snapshot.devices.remove(&path).is_none() {
                    debug!(device = %path, "remove for an unknown device, ignoring");
                    return Vec::new();
                }
                st.jobs.remove(&path);
                recompute(&mut st)
            };
            let mut events = vec![PoolEvent::DeviceRemoved { object_path: path }];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::DeviceChanged(path) => {
            if !lock_state(state).snapshot.devices.contains_key(&path) {
                warn!(device = %path, "change for an unknown device, ignoring");
                return Vec::new();
            }
            handle_device_changed(connection, state, path).await
        }

        Incoming::DeviceJobChanged(path, job) => {
            let presentables: Vec<Presentable> = {
                let mut st = lock_state(state);
                if !st.snapshot.devices.contains_key(&path) {
                    debug!(device = %path, "job change for an unknown device, ignoring");
                    return Vec::new();
                }
                st.jobs.insert(path.clone(), job.clone());
                st.presentables
                    .all_by_device_path(&path)
                    .cloned()
                    .collect()
            };
            let mut events = vec![PoolEvent::DeviceJobChanged {
                object_path: path,
                job,
            }];
            events.extend(presentables.into_iter().map(PoolEvent::PresentableJobChanged));
            events
        }

        Incoming::AdapterAdded(path) | Incoming::AdapterChanged(path) => {
            let changed = lock_state(state).snapshot.adapters.contains_key(&path);
            let descriptor = match props::fetch_adapter(connection, &path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(adapter = %path, "cannot describe adapter: {e}");
                    return Vec::new();
                }
            };
            let diff = {
                let mut st = lock_state(state);
                st.snapshot.adapters.insert(path, descriptor.clone());
                recompute(&mut st)
            };
            let mut events = vec![if changed {
                PoolEvent::AdapterChanged(descriptor)
            } else {
                PoolEvent::AdapterAdded(descriptor)
            }];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::AdapterRemoved(path) => {
            let diff = {
                let mut st = lock_state(state);
                if st.snapshot.adapters.remove(&path).is_none() {
                    debug!(adapter = %path, "remove for an unknown adapter, ignoring");
                    return Vec::new();
                }
                recompute(&mut st)
            };
            let mut events = vec![PoolEvent::AdapterRemoved { object_path: path }];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::ExpanderAdded(path) | Incoming::ExpanderChanged(path) => {
            let changed = lock_state(state).snapshot.expanders.contains_key(&path);
            let descriptor = match props::fetch_expander(connection, &path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(expander = %path, "cannot describe expander: {e}");
                    return Vec::new();
                }
            };
            let diff = {
                let mut st = lock_state(state);
                st.snapshot.expanders.insert(path, descriptor.clone());
                recompute(&mut st)
            };
            let mut events = vec![if changed {
                PoolEvent::ExpanderChanged(descriptor)
            } else {
                PoolEvent::ExpanderAdded(descriptor)
            }];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::ExpanderRemoved(path) => {
            let diff = {
                let mut st = lock_state(state);
                if st.snapshot.expanders.remove(&path).is_none() {
                    debug!(expander = %path, "remove for an unknown expander, ignoring");
                    return Vec::new();
                }
                recompute(&mut st)
            };
            let mut events = vec![PoolEvent::ExpanderRemoved { object_path: path }];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::PortAdded(path) | Incoming::PortChanged(path) => {
            let changed = lock_state(state).snapshot.ports.contains_key(&path);
            let descriptor = match props::fetch_port(connection, &path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(port = %path, "cannot describe port: {e}");
                    return Vec::new();
                }
            };
            let diff = {
                let mut st = lock_state(state);
                st.snapshot.ports.insert(path, descriptor.clone());
                recompute(&mut st)
            };
            let mut events = vec![if changed {
                PoolEvent::PortChanged(descriptor)
            } else {
                PoolEvent::PortAdded(descriptor)
            }];
            push_diff_events(&mut events, diff);
            events
        }

        Incoming::PortRemoved(path) => {
            let diff = {
                let mut st = lock_state(state);
                if st.snapshot.ports.remove(&path).is_none() {
                    debug!(port = %path, "remove for an unknown port, ignoring");
                    return Vec::new();
                }
                recompute(&mut st)
            };
            let mut events = vec![PoolEvent::PortRemoved { object_path: path }];
            push_diff_events(&mut events, diff);
            events
        }
    }
}

/// Refetch a device, swap its descriptor and notify. Presentables that
/// survive the recomputation under the same id are reported as changed.
async fn handle_device_changed(
    connection: &Connection,
    state: &Mutex<PoolState>,
    path: String,
) -> Vec<PoolEvent> {
    let descriptor = match props::fetch_device(connection, &path).await {
        Ok(d) => d,
        Err(e) => {
            warn!(device = %path, "cannot describe changed device: {e}");
            return Vec::new();
        }
    };

    let (diff, surviving) = {
        let mut st = lock_state(state);
        st.snapshot.devices.insert(path.clone(), descriptor.clone());
        let diff = recompute(&mut st);
        let surviving: Vec<Presentable> = st
            .presentables
            .all_by_device_path(&path)
            .filter(|p| !diff.added.iter().any(|a| a.id == p.id))
            .cloned()
            .collect();
        (diff, surviving)
    };

    let mut events = vec![PoolEvent::DeviceChanged(descriptor)];
    push_diff_events(&mut events, diff);
    events.extend(surviving.into_iter().map(PoolEvent::PresentableChanged));
    events
}
