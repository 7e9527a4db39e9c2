//! Fixed-layout packet encoding and decoding.
//!
//! Every datagram opens with a two-byte header: a one-byte type tag and the
//! sender's player id (0 = unassigned or server/host). Body layouts are
//! fixed per tag and encoded with bincode's default configuration
//! (fixed-width little-endian fields, no padding), so each variant has a
//! wire size known at build time. Decoding reads the header, branches on
//! the tag, and refuses any buffer shorter than the declared size before a
//! variant is constructed.

use crate::{NAME_LEN, PAK_NAME_LEN, VERSION_LEN};
use serde::{Deserialize, Serialize};

/// Bytes occupied by the packet header on the wire.
pub const HEADER_LEN: usize = 2;

/// One-byte packet type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Client → server: request to join.
    Connect = 0x01,
    /// Server → client: join accepted, id assigned.
    ConnectAck = 0x02,
    /// Either direction: graceful leave; the header names who left.
    Disconnect = 0x03,
    /// Client → server own transform, or server broadcast.
    PlayerUpdate = 0x10,
    /// Anyone → server: request server info, no session required.
    ServerInfoReq = 0x30,
    /// Server → requester: server info response.
    ServerInfoResp = 0x31,
}

impl PacketType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Connect),
            0x02 => Some(Self::ConnectAck),
            0x03 => Some(Self::Disconnect),
            0x10 => Some(Self::PlayerUpdate),
            0x30 => Some(Self::ServerInfoReq),
            0x31 => Some(Self::ServerInfoResp),
            _ => None,
        }
    }

    /// Total wire size, header included, of a packet bearing this tag.
    pub fn wire_len(self) -> usize {
        let body = match self {
            Self::Connect => NAME_LEN,
            Self::ConnectAck => 1,
            Self::Disconnect => 0,
            Self::PlayerUpdate => 5 * 4,
            Self::ServerInfoReq => 0,
            Self::ServerInfoResp => 1 + 1 + 2 + 2 * PAK_NAME_LEN + 2 * VERSION_LEN,
        };
        HEADER_LEN + body
    }
}

/// Join request body. `name` is null-terminated and at most
/// [`NAME_LEN`]` - 1` characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectBody {
    pub name: [u8; NAME_LEN],
}

/// Join grant. The assigned id is never 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectAckBody {
    pub assigned_id: u8,
}

/// Position and yaw/pitch snapshot for the sender's player.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerUpdateBody {
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    /// Yaw.
    pub rot_x: f32,
    /// Pitch.
    pub rot_y: f32,
}

/// Server advertisement sent in reply to [`Packet::ServerInfoReq`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfoBody {
    pub player_count: u8,
    pub max_players: u8,
    /// The server's bound port, mirroring what was queried.
    pub port: u16,
    /// Hosted pack display name; empty = no pack loaded.
    pub pak_name: [u8; PAK_NAME_LEN],
    /// Optional server display name.
    pub server_name: [u8; PAK_NAME_LEN],
    pub game_version: [u8; VERSION_LEN],
    pub pak_version: [u8; VERSION_LEN],
}

/// A decoded packet. The sender id travels alongside it, not inside it.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect(ConnectBody),
    ConnectAck(ConnectAckBody),
    Disconnect,
    PlayerUpdate(PlayerUpdateBody),
    ServerInfoReq,
    ServerInfoResp(ServerInfoBody),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnectAck(_) => PacketType::ConnectAck,
            Packet::Disconnect => PacketType::Disconnect,
            Packet::PlayerUpdate(_) => PacketType::PlayerUpdate,
            Packet::ServerInfoReq => PacketType::ServerInfoReq,
            Packet::ServerInfoResp(_) => PacketType::ServerInfoResp,
        }
    }
}

/// Encodes a packet into a fresh datagram carrying `sender_id`.
pub fn encode(sender_id: u8, packet: &Packet) -> bincode::Result<Vec<u8>> {
    let ty = packet.packet_type();
    let mut buf = Vec::with_capacity(ty.wire_len());
    buf.push(ty as u8);
    buf.push(sender_id);
    match packet {
        Packet::Connect(body) => bincode::serialize_into(&mut buf, body)?,
        Packet::ConnectAck(body) => bincode::serialize_into(&mut buf, body)?,
        Packet::PlayerUpdate(body) => bincode::serialize_into(&mut buf, body)?,
        Packet::ServerInfoResp(body) => bincode::serialize_into(&mut buf, body)?,
        Packet::Disconnect | Packet::ServerInfoReq => {}
    }
    Ok(buf)
}

/// Decodes one datagram into its sender id and typed packet.
///
/// Returns `None` for anything undersized, unknown, or shorter than the
/// size its tag declares; callers drop such buffers without side effects.
/// Trailing bytes beyond the declared size are ignored.
pub fn decode(buf: &[u8]) -> Option<(u8, Packet)> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let ty = PacketType::from_u8(buf[0])?;
    let sender_id = buf[1];
    if buf.len() < ty.wire_len() {
        return None;
    }
    let body = &buf[HEADER_LEN..];
    let packet = match ty {
        PacketType::Connect => Packet::Connect(bincode::deserialize(body).ok()?),
        PacketType::ConnectAck => Packet::ConnectAck(bincode::deserialize(body).ok()?),
        PacketType::Disconnect => Packet::Disconnect,
        PacketType::PlayerUpdate => Packet::PlayerUpdate(bincode::deserialize(body).ok()?),
        PacketType::ServerInfoReq => Packet::ServerInfoReq,
        PacketType::ServerInfoResp => Packet::ServerInfoResp(bincode::deserialize(body).ok()?),
    };
    Some((sender_id, packet))
}

/// Packs a string into a fixed-width field, truncated to `N - 1` bytes and
/// always null-terminated.
pub fn pack_str<const N: usize>(s: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let len = s.len().min(N - 1);
    field[..len].copy_from_slice(&s.as_bytes()[..len]);
    field
}

/// Reads a fixed-width field back out, stopping at the first NUL.
pub fn unpack_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn encoded_lengths_match_declared_wire_lengths() {
        let packets = vec![
            Packet::Connect(ConnectBody {
                name: pack_str("Alice"),
            }),
            Packet::ConnectAck(ConnectAckBody { assigned_id: 1 }),
            Packet::Disconnect,
            Packet::PlayerUpdate(PlayerUpdateBody::default()),
            Packet::ServerInfoReq,
            Packet::ServerInfoResp(ServerInfoBody {
                player_count: 0,
                max_players: 16,
                port: 27015,
                pak_name: [0; PAK_NAME_LEN],
                server_name: [0; PAK_NAME_LEN],
                game_version: [0; VERSION_LEN],
                pak_version: [0; VERSION_LEN],
            }),
        ];

        for packet in packets {
            let bytes = encode(0, &packet).unwrap();
            assert_eq!(
                bytes.len(),
                packet.packet_type().wire_len(),
                "wrong length for {:?}",
                packet.packet_type()
            );
        }
    }

    #[test]
    fn connect_roundtrip_preserves_name() {
        let packet = Packet::Connect(ConnectBody {
            name: pack_str("Alice"),
        });
        let bytes = encode(0, &packet).unwrap();
        let (sender_id, decoded) = decode(&bytes).unwrap();

        assert_eq!(sender_id, 0);
        match decoded {
            Packet::Connect(body) => assert_eq!(unpack_str(&body.name), "Alice"),
            _ => panic!("wrong packet type after decode"),
        }
    }

    #[test]
    fn connect_roundtrip_with_name_filling_the_field() {
        // 15 characters exactly, leaving only the terminator.
        let name = "ABCDEFGHIJKLMNO";
        assert_eq!(name.len(), NAME_LEN - 1);

        let packet = Packet::Connect(ConnectBody {
            name: pack_str(name),
        });
        let bytes = encode(0, &packet).unwrap();
        match decode(&bytes).unwrap().1 {
            Packet::Connect(body) => assert_eq!(unpack_str(&body.name), name),
            _ => panic!("wrong packet type after decode"),
        }
    }

    #[test]
    fn player_update_roundtrip_preserves_transform() {
        let packet = Packet::PlayerUpdate(PlayerUpdateBody {
            pos_x: 1.0,
            pos_y: 2.0,
            pos_z: 3.0,
            rot_x: 0.1,
            rot_y: 0.2,
        });
        let bytes = encode(7, &packet).unwrap();
        let (sender_id, decoded) = decode(&bytes).unwrap();

        assert_eq!(sender_id, 7);
        match decoded {
            Packet::PlayerUpdate(body) => {
                assert_approx_eq!(body.pos_x, 1.0);
                assert_approx_eq!(body.pos_y, 2.0);
                assert_approx_eq!(body.pos_z, 3.0);
                assert_approx_eq!(body.rot_x, 0.1);
                assert_approx_eq!(body.rot_y, 0.2);
            }
            _ => panic!("wrong packet type after decode"),
        }
    }

    #[test]
    fn server_info_roundtrip_preserves_metadata() {
        let packet = Packet::ServerInfoResp(ServerInfoBody {
            player_count: 3,
            max_players: 16,
            port: 27015,
            pak_name: pack_str("MyPak"),
            server_name: pack_str("Basement Box"),
            game_version: pack_str("0.1.0"),
            pak_version: pack_str("2.4"),
        });
        let bytes = encode(0, &packet).unwrap();
        match decode(&bytes).unwrap().1 {
            Packet::ServerInfoResp(body) => {
                assert_eq!(body.player_count, 3);
                assert_eq!(body.max_players, 16);
                assert_eq!(body.port, 27015);
                assert_eq!(unpack_str(&body.pak_name), "MyPak");
                assert_eq!(unpack_str(&body.server_name), "Basement Box");
                assert_eq!(unpack_str(&body.game_version), "0.1.0");
                assert_eq!(unpack_str(&body.pak_version), "2.4");
            }
            _ => panic!("wrong packet type after decode"),
        }
    }

    #[test]
    fn buffers_shorter_than_the_header_are_rejected() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[0x01]).is_none());
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(decode(&[0xFF, 0]).is_none());
        assert!(decode(&[0x20, 0]).is_none());
        assert!(decode(&[0x00, 0]).is_none());
    }

    #[test]
    fn truncated_bodies_are_rejected() {
        let packet = Packet::Connect(ConnectBody {
            name: pack_str("Alice"),
        });
        let bytes = encode(0, &packet).unwrap();
        assert!(decode(&bytes[..bytes.len() - 1]).is_none());
        assert!(decode(&bytes[..HEADER_LEN]).is_none());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = encode(4, &Packet::Disconnect).unwrap();
        bytes.extend_from_slice(&[0xAA; 8]);

        let (sender_id, decoded) = decode(&bytes).unwrap();
        assert_eq!(sender_id, 4);
        assert_eq!(decoded, Packet::Disconnect);
    }

    #[test]
    fn pack_str_truncates_and_terminates() {
        let field: [u8; NAME_LEN] = pack_str("this name is far too long to fit");
        assert_eq!(field[NAME_LEN - 1], 0);
        assert_eq!(unpack_str(&field), "this name is fa");
    }

    #[test]
    fn unpack_str_handles_unterminated_fields() {
        let field = [b'x'; 4];
        assert_eq!(unpack_str(&field), "xxxx");
    }
}
