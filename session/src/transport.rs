//! Socket setup and raw datagram sends.

use crate::error::SessionError;
use log::debug;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Binds a UDP socket on all interfaces with the given receive timeout.
///
/// Port 0 requests an ephemeral port; callers read the real port back from
/// `local_addr`. The timeout is what lets the receive loop poll its stop
/// flag instead of blocking indefinitely.
pub(crate) fn bind(port: u16, recv_timeout: Duration) -> Result<UdpSocket, SessionError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
    socket.set_read_timeout(Some(recv_timeout))?;
    Ok(socket)
}

/// Resolves a host string to a v4 target matching the v4 bind. Accepts
/// literal addresses and DNS names alike.
pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr, SessionError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| SessionError::Resolve(host.to_string()))?;
    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| SessionError::Resolve(host.to_string()))
}

/// Sends one datagram. Delivery is best-effort; failures are logged and
/// otherwise ignored.
pub(crate) fn send(socket: &UdpSocket, target: SocketAddr, bytes: &[u8]) {
    if let Err(e) = socket.send_to(bytes, target) {
        debug!("send to {} failed: {}", target, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_on_port_zero_yields_a_real_port() {
        let socket = bind(0, Duration::from_millis(50)).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
        assert_eq!(
            socket.read_timeout().unwrap(),
            Some(Duration::from_millis(50))
        );
    }

    #[test]
    fn resolve_accepts_literal_addresses() {
        let addr = resolve("127.0.0.1", 27015).unwrap();
        assert_eq!(addr.port(), 27015);
        assert!(addr.is_ipv4());
    }

    #[test]
    fn resolve_accepts_hostnames() {
        let addr = resolve("localhost", 27015).unwrap();
        assert!(addr.is_ipv4());
    }

    #[test]
    fn resolve_rejects_nonsense() {
        assert!(matches!(
            resolve("no.such.host.invalid", 27015),
            Err(SessionError::Resolve(_))
        ));
    }
}
