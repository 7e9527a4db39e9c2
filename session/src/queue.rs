//! Thread-safe inbound packet queue.
//!
//! The receive thread pushes; the dispatcher takes the whole backlog in a
//! single swap, so the lock is held O(1) regardless of batch size.

use shared::MAX_DATAGRAM;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One received datagram, bounded at [`MAX_DATAGRAM`] bytes.
///
/// Oversized datagrams are truncated at construction, not rejected. A raw
/// packet lives exactly one trip: created by the receive loop, consumed
/// and discarded by one dispatch.
#[derive(Debug, Clone)]
pub struct RawPacket {
    data: [u8; MAX_DATAGRAM],
    len: usize,
    from: SocketAddr,
}

impl RawPacket {
    pub fn new(bytes: &[u8], from: SocketAddr) -> Self {
        let len = bytes.len().min(MAX_DATAGRAM);
        let mut data = [0u8; MAX_DATAGRAM];
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data, len, from }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn source(&self) -> SocketAddr {
        self.from
    }
}

/// FIFO bridging the receive thread to the per-tick dispatch.
#[derive(Debug, Default)]
pub struct PacketQueue {
    inner: Mutex<VecDeque<RawPacket>>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, packet: RawPacket) {
        self.lock().push_back(packet);
    }

    /// Takes the entire backlog in one swap, leaving the queue empty for
    /// the producer.
    pub fn take_all(&self) -> VecDeque<RawPacket> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RawPacket>> {
        // A panic on one side of the bridge must not wedge the other.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:27015".parse().unwrap()
    }

    #[test]
    fn packets_come_back_in_arrival_order() {
        let queue = PacketQueue::new();
        queue.push(RawPacket::new(&[1, 0], addr()));
        queue.push(RawPacket::new(&[2, 0], addr()));
        queue.push(RawPacket::new(&[3, 0], addr()));

        let drained: Vec<u8> = queue.take_all().iter().map(|p| p.bytes()[0]).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn take_all_leaves_the_queue_empty() {
        let queue = PacketQueue::new();
        queue.push(RawPacket::new(&[1, 0], addr()));

        assert_eq!(queue.take_all().len(), 1);
        assert!(queue.take_all().is_empty());

        // The producer keeps working after a swap.
        queue.push(RawPacket::new(&[4, 0], addr()));
        assert_eq!(queue.take_all().len(), 1);
    }

    #[test]
    fn oversized_payloads_are_truncated_silently() {
        let oversized = vec![0xAB; MAX_DATAGRAM + 100];
        let packet = RawPacket::new(&oversized, addr());

        assert_eq!(packet.bytes().len(), MAX_DATAGRAM);
        assert!(packet.bytes().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn source_address_is_preserved() {
        let packet = RawPacket::new(&[1, 2, 3], addr());
        assert_eq!(packet.source(), addr());
        assert_eq!(packet.bytes(), &[1, 2, 3]);
    }
}
