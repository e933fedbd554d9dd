//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use parley_protocol::constants::{DEFAULT_PORT, MAX_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port to listen on (0 = OS-assigned).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of registered clients.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Maximum number of simultaneous channels.
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,

    /// Largest accepted payload in bytes.
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,

    /// Outbound frames queued per connection before new ones are dropped.
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_clients() -> usize {
    100
}

fn default_max_channels() -> usize {
    100
}

fn default_max_payload() -> usize {
    MAX_PAYLOAD_LEN
}

fn default_send_buffer() -> usize {
    crate::SEND_BUFFER_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_clients: default_max_clients(),
            max_channels: default_max_channels(),
            max_payload: default_max_payload(),
            send_buffer: default_send_buffer(),
        }
    }
}

impl ServerConfig {
    /// Address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Rejects limits the server cannot honour.
    pub fn validate(&self) -> Result<(), ServerError> {
        let invalid = |msg: String| Err(ServerError::InvalidConfig(msg));

        if self.max_clients == 0 {
            return invalid("max_clients must be at least 1".into());
        }
        if self.max_channels == 0 {
            return invalid("max_channels must be at least 1".into());
        }
        if self.send_buffer == 0 {
            return invalid("send_buffer must be at least 1".into());
        }
        if self.max_payload > MAX_PAYLOAD_LEN {
            return invalid(format!(
                "max_payload {} exceeds the protocol limit of {MAX_PAYLOAD_LEN} bytes",
                self.max_payload
            ));
        }
        Ok(())
    }
}
