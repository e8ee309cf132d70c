// SPDX-License-Identifier: GPL-3.0-only

//! Pluggable daemon transport.
//!
//! The default is the local system bus. A forwarded session (e.g. a D-Bus
//! bridge carried over an SSH tunnel) is reached by peer address; setting
//! up such a tunnel is the caller's business, the pool only consumes the
//! resulting address.

use zbus::Connection;

use crate::error::PoolError;

#[derive(Debug, Clone)]
pub enum Transport {
    /// Direct connection to the local system bus.
    SystemBus,

    /// A D-Bus peer address, e.g. `unix:path=/tmp/bridged-socket`.
    Address(String),
}

impl Transport {
    pub async fn connect(&self) -> Result<Connection, PoolError> {
        let connection = match self {
            Transport::SystemBus => Connection::system().await,
            Transport::Address(address) => {
                zbus::connection::Builder::address(address.as_str())
                    .map_err(PoolError::ConnectionFailed)?
                    .build()
                    .await
            }
        };
        connection.map_err(PoolError::ConnectionFailed)
    }
}
