//! Types and constants shared by everything that speaks the session
//! protocol: wire-format packets, field helpers, and the remote-player
//! snapshot exchanged between roles.

pub mod wire;

/// Default UDP port servers bind and clients target.
pub const DEFAULT_PORT: u16 = 27015;

/// Hard cap on simultaneously connected players. A constant, not a
/// negotiated value; peers with mismatched caps interoperate up to the
/// server's advertised limit.
pub const MAX_PLAYERS: usize = 16;

/// Upper bound on any datagram this protocol produces or accepts.
pub const MAX_DATAGRAM: usize = 512;

/// Version string advertised in server info responses.
pub const GAME_VERSION: &str = "0.1.0";

/// Width of the player-name field, terminator included.
pub const NAME_LEN: usize = 16;

/// Width of the pack-name and server-name fields, terminator included.
pub const PAK_NAME_LEN: usize = 32;

/// Width of the version fields, terminator included.
pub const VERSION_LEN: usize = 16;

/// Last-known snapshot of one remote participant, keyed by id in a
/// session's player map. Created on the first update naming the id,
/// removed when that id disconnects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemotePlayer {
    pub id: u8,
    /// Display name, when known. Only the server learns names (from the
    /// join handshake); clients see an empty string.
    pub name: String,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    /// Yaw.
    pub rot_x: f32,
    /// Pitch.
    pub rot_y: f32,
}
