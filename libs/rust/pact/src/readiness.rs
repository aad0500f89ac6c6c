//! Readiness Waiter
//!
//! Polls a TCP address until something accepts connections. The verifier
//! blocks on this before handing the proxy port to the verification engine,
//! which starts issuing requests immediately.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, error};

use crate::error::ReadinessError;

/// Interval between connection attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Address family to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Any resolved address
    #[default]
    Tcp,
    /// IPv4 addresses only
    Tcp4,
    /// IPv6 addresses only
    Tcp6,
}

impl Network {
    const fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Tcp => true,
            Self::Tcp4 => addr.is_ipv4(),
            Self::Tcp6 => addr.is_ipv6(),
        }
    }
}

/// Waits for a port to accept connections.
#[async_trait]
pub trait ReadinessWaiter: Send + Sync {
    /// Wait until `address:port` accepts a connection or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::Timeout`] carrying `message` when nothing
    /// accepted a connection in time.
    async fn wait(
        &self,
        port: u16,
        network: Network,
        address: &str,
        timeout: Duration,
        message: &str,
    ) -> Result<(), ReadinessError>;
}

/// Polls with real TCP connections every [`POLL_INTERVAL`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpReadinessWaiter;

#[async_trait]
impl ReadinessWaiter for TcpReadinessWaiter {
    async fn wait(
        &self,
        port: u16,
        network: Network,
        address: &str,
        timeout: Duration,
        message: &str,
    ) -> Result<(), ReadinessError> {
        debug!(port, "waiting for port to become available");

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut deadline => {
                    error!(?timeout, %message, "expected server to start in time");
                    return Err(ReadinessError::Timeout {
                        timeout,
                        message: message.to_string(),
                    });
                }
                accepted = dial_after(POLL_INTERVAL, network, address, port) => {
                    if accepted {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Sleep for `interval`, then try one connection.
async fn dial_after(interval: Duration, network: Network, address: &str, port: u16) -> bool {
    tokio::time::sleep(interval).await;

    let Ok(addrs) = lookup_host((address, port)).await else {
        return false;
    };

    for addr in addrs.filter(|addr| network.accepts(addr)) {
        if TcpStream::connect(addr).await.is_ok() {
            return true;
        }
    }
    false
}
