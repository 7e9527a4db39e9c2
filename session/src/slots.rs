//! Server-side client registry.
//!
//! A fixed table of slots, one per connected client, matching the
//! protocol's hard player cap. Ids come from a monotonic counter starting
//! at 1: id 0 stays reserved for the host, and an id is never handed out
//! twice within a process lifetime, so two simultaneously active slots can
//! never share one. Running the one-byte id space dry refuses further
//! joins rather than recycling.

use log::{info, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected client.
#[derive(Debug, Clone)]
pub struct ClientSlot {
    pub id: u8,
    pub addr: SocketAddr,
    pub name: String,
    /// Last time any packet arrived from `addr`.
    pub last_seen: Instant,
}

pub struct SlotTable {
    slots: Vec<Option<ClientSlot>>,
    /// Next id to hand out; wider than the wire id so exhaustion is
    /// detectable instead of wrapping.
    next_id: u16,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_id: 1,
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<&ClientSlot> {
        self.slots.iter().flatten().find(|slot| slot.addr == addr)
    }

    /// Refreshes the activity clock for whichever slot owns `addr`.
    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|slot| slot.addr == addr)
        {
            slot.last_seen = Instant::now();
        }
    }

    /// Registers a new client, returning its assigned id. `None` means the
    /// table is full or the id space is spent; either way the caller
    /// refuses the join.
    pub fn insert(&mut self, addr: SocketAddr, name: String) -> Option<u8> {
        if self.next_id > u8::MAX as u16 {
            warn!("player id space exhausted, refusing {}", addr);
            return None;
        }
        let free = self.slots.iter_mut().find(|slot| slot.is_none())?;
        let id = self.next_id as u8;
        self.next_id += 1;

        info!("client {} (\"{}\") registered from {}", id, name, addr);
        *free = Some(ClientSlot {
            id,
            addr,
            name,
            last_seen: Instant::now(),
        });
        Some(id)
    }

    /// Releases the slot bound to `addr`, returning the freed entry.
    pub fn release_by_addr(&mut self, addr: SocketAddr) -> Option<ClientSlot> {
        let entry = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|c| c.addr == addr))?;
        let slot = entry.take();
        if let Some(slot) = &slot {
            info!("client {} (\"{}\") released", slot.id, slot.name);
        }
        slot
    }

    /// Removes every slot that has been silent for longer than `timeout`
    /// and returns the freed entries.
    pub fn expire(&mut self, timeout: Duration) -> Vec<ClientSlot> {
        let mut expired = Vec::new();
        for entry in &mut self.slots {
            if entry
                .as_ref()
                .is_some_and(|c| c.last_seen.elapsed() > timeout)
            {
                if let Some(slot) = entry.take() {
                    expired.push(slot);
                }
            }
        }
        expired
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// `(id, addr)` pairs of every active slot, for broadcast fan-out.
    pub fn endpoints(&self) -> Vec<(u8, SocketAddr)> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (slot.id, slot.addr))
            .collect()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}
