//! Server discovery: fire-and-forget info queries.
//!
//! Each ping runs on its own short-lived thread against a throwaway
//! socket, entirely independent of any live session. Replies land in a
//! lock-guarded result buffer that the session drains on its next update
//! tick; a server that never answers simply produces nothing. Ping threads
//! are not cancellable; the receive timeout bounds their lifetime.

use crate::transport;
use log::debug;
use shared::wire::{self, Packet};
use shared::MAX_DATAGRAM;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// One discovered server, as reported by its info response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// The host string the ping was aimed at, echoed back verbatim.
    pub host: String,
    pub port: u16,
    pub player_count: u8,
    pub max_players: u8,
    pub pak_name: String,
    pub server_name: String,
    pub game_version: String,
    pub pak_version: String,
}

/// Buffer ping threads report into, drained by the session's update tick.
#[derive(Debug, Default)]
pub(crate) struct ResultBuffer {
    inner: Mutex<Vec<ServerInfo>>,
}

impl ResultBuffer {
    pub(crate) fn push(&self, info: ServerInfo) {
        self.lock().push(info);
    }

    /// Takes every buffered result in one swap.
    pub(crate) fn take_all(&self) -> Vec<ServerInfo> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ServerInfo>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Queries `host:port` from a detached thread. The reply, if one arrives
/// within `timeout`, lands in `results`.
pub(crate) fn spawn_ping(host: String, port: u16, timeout: Duration, results: Arc<ResultBuffer>) {
    let spawned = thread::Builder::new().name("net-ping".into()).spawn(move || {
        if let Some(info) = query(&host, port, timeout) {
            results.push(info);
        }
    });
    if let Err(e) = spawned {
        debug!("could not spawn ping thread: {}", e);
    }
}

fn query(host: &str, port: u16, timeout: Duration) -> Option<ServerInfo> {
    let target = match transport::resolve(host, port) {
        Ok(addr) => addr,
        Err(e) => {
            debug!("ping {}:{}: {}", host, port, e);
            return None;
        }
    };
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.set_read_timeout(Some(timeout)).ok()?;

    let request = wire::encode(0, &Packet::ServerInfoReq).ok()?;
    socket.send_to(&request, target).ok()?;

    let mut buf = [0u8; MAX_DATAGRAM];
    let (len, _) = socket.recv_from(&mut buf).ok()?;
    match wire::decode(&buf[..len]) {
        Some((_, Packet::ServerInfoResp(body))) => Some(ServerInfo {
            host: host.to_string(),
            port,
            player_count: body.player_count,
            max_players: body.max_players,
            pak_name: wire::unpack_str(&body.pak_name),
            server_name: wire::unpack_str(&body.server_name),
            game_version: wire::unpack_str(&body.game_version),
            pak_version: wire::unpack_str(&body.pak_version),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::wire::ServerInfoBody;

    /// A one-shot fake server answering the first info request it sees.
    fn fake_server(body: ServerInfoBody) -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        thread::spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            if let Ok((len, from)) = socket.recv_from(&mut buf) {
                if let Some((_, Packet::ServerInfoReq)) = wire::decode(&buf[..len]) {
                    let reply = wire::encode(0, &Packet::ServerInfoResp(body)).unwrap();
                    let _ = socket.send_to(&reply, from);
                }
            }
        });
        port
    }

    #[test]
    fn query_parses_a_live_server() {
        let port = fake_server(ServerInfoBody {
            player_count: 2,
            max_players: 16,
            port: 27015,
            pak_name: wire::pack_str("MyPak"),
            server_name: wire::pack_str("Attic"),
            game_version: wire::pack_str("0.1.0"),
            pak_version: wire::pack_str(""),
        });

        let info = query("127.0.0.1", port, Duration::from_secs(2)).expect("reply expected");
        assert_eq!(info.host, "127.0.0.1");
        assert_eq!(info.port, port);
        assert_eq!(info.player_count, 2);
        assert_eq!(info.max_players, 16);
        assert_eq!(info.pak_name, "MyPak");
        assert_eq!(info.server_name, "Attic");
        assert_eq!(info.game_version, "0.1.0");
        assert_eq!(info.pak_version, "");
    }

    #[test]
    fn query_times_out_against_a_dead_port() {
        // Bind and immediately drop to find a port nothing listens on.
        let port = {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.local_addr().unwrap().port()
        };

        assert!(query("127.0.0.1", port, Duration::from_millis(100)).is_none());
    }

    #[test]
    fn query_gives_up_on_unresolvable_hosts() {
        assert!(query("no.such.host.invalid", 27015, Duration::from_millis(100)).is_none());
    }

    #[test]
    fn result_buffer_drains_in_one_swap() {
        let buffer = ResultBuffer::default();
        buffer.push(ServerInfo {
            host: "127.0.0.1".into(),
            port: 1,
            player_count: 0,
            max_players: 16,
            pak_name: String::new(),
            server_name: String::new(),
            game_version: String::new(),
            pak_version: String::new(),
        });

        assert_eq!(buffer.take_all().len(), 1);
        assert!(buffer.take_all().is_empty());
    }
}
