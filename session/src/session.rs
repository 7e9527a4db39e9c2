//! The session object: role lifecycle, per-tick dispatch, callbacks.

use crate::config::SessionConfig;
use crate::discovery::{self, ResultBuffer, ServerInfo};
use crate::error::SessionError;
use crate::queue::{PacketQueue, RawPacket};
use crate::receiver::{ConnectRetry, ReceiveLoop};
use crate::slots::SlotTable;
use crate::transport;
use log::{debug, error, info, warn};
use shared::wire::{self, ConnectAckBody, ConnectBody, Packet, PlayerUpdateBody, ServerInfoBody};
use shared::{RemotePlayer, GAME_VERSION};
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Which role a session currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    None,
    Server,
    Client,
}

type PlayerJoinedFn = Box<dyn FnMut(u8, &str) + Send>;
type PlayerLeftFn = Box<dyn FnMut(u8) + Send>;
type ServerInfoFn = Box<dyn FnMut(&ServerInfo) + Send>;

/// A network session owning its socket, receive thread, and role state.
///
/// Construct one per logical session; starting a role while another is
/// active is refused. All state mutation and every callback happens inside
/// [`update`](Self::update), which the owning application calls once per
/// tick.
pub struct NetworkSession {
    config: SessionConfig,
    mode: Mode,
    socket: Option<Arc<UdpSocket>>,
    queue: Arc<PacketQueue>,
    running: Arc<AtomicBool>,
    recv_thread: Option<JoinHandle<()>>,
    bound_port: u16,

    // Server role
    slots: SlotTable,
    hosted_pak_name: String,
    hosted_pak_version: String,

    // Client role
    server_addr: Option<SocketAddr>,
    local_name: String,
    local_id: u8,
    /// Shared with the receive loop, which stops retrying the handshake
    /// once the dispatcher flips it.
    connected: Arc<AtomicBool>,

    // Both roles
    remote_players: HashMap<u8, RemotePlayer>,

    ping_results: Arc<ResultBuffer>,

    on_player_joined: Option<PlayerJoinedFn>,
    on_player_left: Option<PlayerLeftFn>,
    on_server_info: Option<ServerInfoFn>,
}

impl NetworkSession {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let slots = SlotTable::new(config.max_players);
        Self {
            config,
            mode: Mode::None,
            socket: None,
            queue: Arc::new(PacketQueue::new()),
            running: Arc::new(AtomicBool::new(false)),
            recv_thread: None,
            bound_port: 0,
            slots,
            hosted_pak_name: String::new(),
            hosted_pak_version: String::new(),
            server_addr: None,
            local_name: String::new(),
            local_id: 0,
            connected: Arc::new(AtomicBool::new(false)),
            remote_players: HashMap::new(),
            ping_results: Arc::new(ResultBuffer::default()),
            on_player_joined: None,
            on_player_left: None,
            on_server_info: None,
        }
    }

    // ── Server role ──────────────────────────────────────────────────────

    /// Binds `port` (0 picks an ephemeral port) and starts accepting
    /// clients.
    pub fn start_server(&mut self, port: u16) -> Result<(), SessionError> {
        if self.mode != Mode::None {
            return Err(SessionError::AlreadyActive);
        }
        let socket = Arc::new(transport::bind(port, self.config.recv_timeout)?);
        self.bound_port = socket.local_addr().map(|a| a.port()).unwrap_or(port);
        self.slots = SlotTable::new(self.config.max_players);
        self.remote_players.clear();
        self.spawn_receive_loop(Arc::clone(&socket), None)?;
        self.socket = Some(socket);
        self.mode = Mode::Server;
        info!("server listening on port {}", self.bound_port);
        Ok(())
    }

    pub fn stop_server(&mut self) {
        if self.mode != Mode::Server {
            return;
        }
        self.shutdown_io();
        self.slots.clear();
        self.remote_players.clear();
        self.mode = Mode::None;
        info!("server stopped");
    }

    pub fn is_server_running(&self) -> bool {
        self.mode == Mode::Server && self.running.load(Ordering::Acquire)
    }

    // ── Client role ──────────────────────────────────────────────────────

    /// Resolves `host`, binds an ephemeral socket, and begins the join
    /// handshake. Acknowledgement arrives asynchronously: keep pumping
    /// [`update`](Self::update) and poll [`is_connected`](Self::is_connected).
    pub fn connect(&mut self, host: &str, port: u16, player_name: &str) -> Result<(), SessionError> {
        if self.mode != Mode::None {
            return Err(SessionError::AlreadyActive);
        }
        let server_addr = transport::resolve(host, port)?;
        let socket = Arc::new(transport::bind(0, self.config.recv_timeout)?);

        self.local_name = player_name.to_string();
        self.local_id = 0;
        self.connected.store(false, Ordering::Release);
        self.bound_port = socket.local_addr().map(|a| a.port()).unwrap_or(0);

        let datagram = wire::encode(
            0,
            &Packet::Connect(ConnectBody {
                name: wire::pack_str(player_name),
            }),
        )?;
        transport::send(&socket, server_addr, &datagram);
        info!("connecting to {}:{} as \"{}\"", host, port, player_name);

        let retry = ConnectRetry {
            server_addr,
            datagram,
            interval: self.config.connect_retry_interval,
            max_attempts: self.config.max_connect_attempts,
            attempts: 1,
            last_attempt: Instant::now(),
            acknowledged: Arc::clone(&self.connected),
        };
        self.spawn_receive_loop(Arc::clone(&socket), Some(retry))?;
        self.server_addr = Some(server_addr);
        self.socket = Some(socket);
        self.mode = Mode::Client;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.mode != Mode::Client {
            return;
        }
        if self.is_connected() {
            if let Some(addr) = self.server_addr {
                self.send_packet(addr, self.local_id, &Packet::Disconnect);
            }
        }
        self.shutdown_io();
        self.connected.store(false, Ordering::Release);
        self.local_id = 0;
        self.server_addr = None;
        self.remote_players.clear();
        self.mode = Mode::None;
        info!("disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // ── Shared API ───────────────────────────────────────────────────────

    /// Routes the local player transform: a connected client sends it to
    /// the server, a hosting server broadcasts it under the reserved id 0.
    /// A no-op in any other state.
    pub fn send_player_update(&self, pos_x: f32, pos_y: f32, pos_z: f32, yaw: f32, pitch: f32) {
        let body = PlayerUpdateBody {
            pos_x,
            pos_y,
            pos_z,
            rot_x: yaw,
            rot_y: pitch,
        };
        match self.mode {
            Mode::Client if self.is_connected() => {
                if let Some(addr) = self.server_addr {
                    self.send_packet(addr, self.local_id, &Packet::PlayerUpdate(body));
                }
            }
            Mode::Server => self.broadcast_packet(0, &Packet::PlayerUpdate(body), None),
            _ => {}
        }
    }

    /// Drains and dispatches every queued packet, expires silent clients
    /// (server role), then delivers completed discovery results. Every
    /// callback the session ever fires, fires inside this call.
    pub fn update(&mut self) {
        for raw in self.queue.take_all() {
            self.dispatch(&raw);
        }
        if self.mode == Mode::Server {
            self.expire_clients();
        }
        self.deliver_ping_results();
    }

    /// Queries a server's advertised info without holding a session.
    /// Callable in any mode; the reply, if any, surfaces through the
    /// server-info callback on a later [`update`](Self::update).
    pub fn ping_server(&self, host: &str, port: u16) {
        discovery::spawn_ping(
            host.to_string(),
            port,
            self.config.ping_timeout,
            Arc::clone(&self.ping_results),
        );
    }

    /// Sets the pack name advertised in info responses. Empty means no
    /// pack loaded.
    pub fn set_hosted_pak_name(&mut self, name: &str) {
        self.hosted_pak_name = name.to_string();
    }

    /// Sets the pack version advertised alongside the pack name.
    pub fn set_hosted_pak_version(&mut self, version: &str) {
        self.hosted_pak_version = version.to_string();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The id the server assigned to this client; 0 until acknowledged.
    pub fn local_id(&self) -> u8 {
        self.local_id
    }

    /// The locally bound UDP port, or 0 when no role is active.
    pub fn bound_port(&self) -> u16 {
        self.bound_port
    }

    /// Number of registered clients (server role).
    pub fn player_count(&self) -> usize {
        self.slots.active_count()
    }

    /// Last-known snapshots of every remote participant.
    pub fn remote_players(&self) -> &HashMap<u8, RemotePlayer> {
        &self.remote_players
    }

    pub fn set_on_player_joined(&mut self, callback: impl FnMut(u8, &str) + Send + 'static) {
        self.on_player_joined = Some(Box::new(callback));
    }

    pub fn set_on_player_left(&mut self, callback: impl FnMut(u8) + Send + 'static) {
        self.on_player_left = Some(Box::new(callback));
    }

    pub fn set_on_server_info(&mut self, callback: impl FnMut(&ServerInfo) + Send + 'static) {
        self.on_server_info = Some(Box::new(callback));
    }

    // ── Dispatch ─────────────────────────────────────────────────────────

    fn dispatch(&mut self, raw: &RawPacket) {
        let Some((sender_id, packet)) = wire::decode(raw.bytes()) else {
            return;
        };
        match self.mode {
            Mode::Server => self.dispatch_server(sender_id, packet, raw.source()),
            Mode::Client => self.dispatch_client(sender_id, packet),
            Mode::None => {}
        }
    }

    fn dispatch_server(&mut self, sender_id: u8, packet: Packet, from: SocketAddr) {
        match packet {
            Packet::ServerInfoReq => self.handle_info_request(from),
            Packet::Connect(body) => self.handle_connect(&body, from),
            Packet::Disconnect => self.handle_client_disconnect(from),
            Packet::PlayerUpdate(body) => self.handle_client_update(sender_id, body, from),
            other => debug!("ignoring {:?} in server mode", other.packet_type()),
        }
    }

    fn dispatch_client(&mut self, sender_id: u8, packet: Packet) {
        match packet {
            Packet::ConnectAck(body) => self.handle_connect_ack(body.assigned_id),
            Packet::Disconnect => self.handle_peer_disconnect(sender_id),
            Packet::PlayerUpdate(body) => {
                // The server echoes nothing back, but guard anyway: a
                // snapshot of ourselves must never shadow local state.
                if sender_id != self.local_id {
                    self.record_remote(sender_id, String::new(), &body);
                }
            }
            other => debug!("ignoring {:?} in client mode", other.packet_type()),
        }
    }

    // ── Server handlers ──────────────────────────────────────────────────

    fn handle_info_request(&self, from: SocketAddr) {
        let body = ServerInfoBody {
            player_count: self.slots.active_count() as u8,
            max_players: self.config.max_players as u8,
            port: self.bound_port,
            pak_name: wire::pack_str(&self.hosted_pak_name),
            server_name: wire::pack_str(&self.config.server_name),
            game_version: wire::pack_str(GAME_VERSION),
            pak_version: wire::pack_str(&self.hosted_pak_version),
        };
        self.send_packet(from, 0, &Packet::ServerInfoResp(body));
    }

    fn handle_connect(&mut self, body: &ConnectBody, from: SocketAddr) {
        // An already-registered address just gets its ack again: the
        // client's retries must converge without duplicating the join.
        if let Some(id) = self.slots.find_by_addr(from).map(|slot| slot.id) {
            self.slots.touch(from);
            self.send_packet(from, id, &Packet::ConnectAck(ConnectAckBody { assigned_id: id }));
            return;
        }

        let name = wire::unpack_str(&body.name);
        let Some(id) = self.slots.insert(from, name.clone()) else {
            warn!("refusing connect from {}: server full", from);
            return;
        };
        self.send_packet(from, id, &Packet::ConnectAck(ConnectAckBody { assigned_id: id }));

        // Introduce the newcomer to everyone else with a zeroed transform,
        // so peers know the id before its first real update.
        let intro = Packet::PlayerUpdate(PlayerUpdateBody::default());
        self.broadcast_packet(id, &intro, Some(id));

        if let Some(cb) = self.on_player_joined.as_mut() {
            cb(id, &name);
        }
    }

    fn handle_client_disconnect(&mut self, from: SocketAddr) {
        let Some(slot) = self.slots.release_by_addr(from) else {
            return;
        };
        self.remote_players.remove(&slot.id);
        self.broadcast_packet(slot.id, &Packet::Disconnect, Some(slot.id));
        if let Some(cb) = self.on_player_left.as_mut() {
            cb(slot.id);
        }
    }

    fn handle_client_update(&mut self, sender_id: u8, body: PlayerUpdateBody, from: SocketAddr) {
        // The claimed id must belong to the address it came from.
        let Some(slot) = self.slots.find_by_addr(from) else {
            return;
        };
        if slot.id != sender_id {
            debug!("dropping update claiming id {} from {}", sender_id, from);
            return;
        }
        let name = slot.name.clone();
        self.slots.touch(from);
        // Server-side snapshot, so a hosting player can render clients.
        self.record_remote(sender_id, name, &body);
        self.broadcast_packet(sender_id, &Packet::PlayerUpdate(body), Some(sender_id));
    }

    fn expire_clients(&mut self) {
        for slot in self.slots.expire(self.config.client_timeout) {
            warn!("client {} (\"{}\") timed out", slot.id, slot.name);
            self.remote_players.remove(&slot.id);
            // Kick notice to the silent address, in case it is still
            // listening, then the usual leave broadcast to everyone else.
            self.send_packet(slot.addr, slot.id, &Packet::Disconnect);
            self.broadcast_packet(slot.id, &Packet::Disconnect, Some(slot.id));
            if let Some(cb) = self.on_player_left.as_mut() {
                cb(slot.id);
            }
        }
    }

    // ── Client handlers ──────────────────────────────────────────────────

    fn handle_connect_ack(&mut self, assigned_id: u8) {
        if self.is_connected() {
            // Retries can cross with the first ack; the duplicates carry
            // the same id and change nothing.
            return;
        }
        if assigned_id == 0 {
            debug!("ignoring acknowledgement carrying id 0");
            return;
        }
        self.local_id = assigned_id;
        self.connected.store(true, Ordering::Release);
        info!("connected with player id {}", assigned_id);

        let name = self.local_name.clone();
        if let Some(cb) = self.on_player_joined.as_mut() {
            cb(assigned_id, &name);
        }
    }

    fn handle_peer_disconnect(&mut self, id: u8) {
        if id == self.local_id {
            if !self.is_connected() {
                return;
            }
            // Server-initiated kick. Clearing `connected` also restarts
            // the receive loop's retry clock with its remaining budget.
            warn!("kicked by server");
            self.connected.store(false, Ordering::Release);
            self.remote_players.clear();
            let local = self.local_id;
            self.local_id = 0;
            if let Some(cb) = self.on_player_left.as_mut() {
                cb(local);
            }
        } else {
            info!("player {} left", id);
            self.remote_players.remove(&id);
            if let Some(cb) = self.on_player_left.as_mut() {
                cb(id);
            }
        }
    }

    fn record_remote(&mut self, id: u8, name: String, body: &PlayerUpdateBody) {
        let player = self.remote_players.entry(id).or_default();
        player.id = id;
        if !name.is_empty() {
            player.name = name;
        }
        player.pos_x = body.pos_x;
        player.pos_y = body.pos_y;
        player.pos_z = body.pos_z;
        player.rot_x = body.rot_x;
        player.rot_y = body.rot_y;
    }

    // ── Discovery delivery ───────────────────────────────────────────────

    fn deliver_ping_results(&mut self) {
        // Drained every tick; results arriving before a callback is
        // registered are dropped, not held forever.
        for info in self.ping_results.take_all() {
            if let Some(cb) = self.on_server_info.as_mut() {
                cb(&info);
            }
        }
    }

    // ── Plumbing ─────────────────────────────────────────────────────────

    fn send_packet(&self, target: SocketAddr, sender_id: u8, packet: &Packet) {
        let Some(socket) = &self.socket else {
            return;
        };
        match wire::encode(sender_id, packet) {
            Ok(bytes) => transport::send(socket, target, &bytes),
            Err(e) => error!("failed to encode {:?}: {}", packet.packet_type(), e),
        }
    }

    /// Sends `packet` to every active client except `exclude`; the origin
    /// of a relayed packet never gets its own bytes back.
    fn broadcast_packet(&self, sender_id: u8, packet: &Packet, exclude: Option<u8>) {
        let Some(socket) = &self.socket else {
            return;
        };
        let bytes = match wire::encode(sender_id, packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("failed to encode {:?}: {}", packet.packet_type(), e);
                return;
            }
        };
        for (id, addr) in self.slots.endpoints() {
            if Some(id) == exclude {
                continue;
            }
            transport::send(socket, addr, &bytes);
        }
    }

    fn spawn_receive_loop(
        &mut self,
        socket: Arc<UdpSocket>,
        retry: Option<ConnectRetry>,
    ) -> Result<(), SessionError> {
        self.running.store(true, Ordering::Release);
        let recv_loop = ReceiveLoop::new(
            socket,
            Arc::clone(&self.queue),
            Arc::clone(&self.running),
            retry,
        );
        match std::thread::Builder::new()
            .name("net-recv".into())
            .spawn(move || recv_loop.run())
        {
            Ok(handle) => {
                self.recv_thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Stops the receive thread, then drops the socket. The join happens
    /// first so no read can race a closed descriptor.
    fn shutdown_io(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.recv_thread.take() {
            if handle.join().is_err() {
                error!("receive thread panicked");
            }
        }
        self.socket = None;
        self.bound_port = 0;
        // Anything still queued belongs to the finished role.
        self.queue.take_all();
    }
}

impl Default for NetworkSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NetworkSession {
    fn drop(&mut self) {
        match self.mode {
            Mode::Server => self.stop_server(),
            Mode::Client => self.disconnect(),
            Mode::None => {}
        }
    }
}
