//! The background receive loop.
//!
//! Runs on a dedicated thread while a role is active: a timed socket read
//! feeds the shared queue, and on the client side the connect retry clock
//! is checked between reads. The loop exits within one read-timeout of the
//! shared running flag clearing; the session joins the thread before it
//! drops the socket.

use crate::queue::{PacketQueue, RawPacket};
use crate::transport;
use log::{debug, info, warn};
use shared::wire::HEADER_LEN;
use shared::MAX_DATAGRAM;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client-side connect retry state, owned by the receive loop.
///
/// Re-sends the pre-encoded `Connect` datagram until the dispatcher flips
/// `acknowledged`, or the attempt cap is reached. A kick clears
/// `acknowledged` again, which resumes the clock with whatever attempt
/// budget remains.
pub(crate) struct ConnectRetry {
    pub server_addr: SocketAddr,
    pub datagram: Vec<u8>,
    pub interval: Duration,
    pub max_attempts: u32,
    pub attempts: u32,
    pub last_attempt: Instant,
    pub acknowledged: Arc<AtomicBool>,
}

impl ConnectRetry {
    fn tick(&mut self, socket: &UdpSocket) {
        if self.acknowledged.load(Ordering::Acquire) || self.attempts >= self.max_attempts {
            return;
        }
        if self.last_attempt.elapsed() < self.interval {
            return;
        }
        transport::send(socket, self.server_addr, &self.datagram);
        self.attempts += 1;
        self.last_attempt = Instant::now();
        info!("connect attempt {}/{}", self.attempts, self.max_attempts);
        if self.attempts == self.max_attempts {
            warn!("connect attempts exhausted; giving up until the next connect call");
        }
    }
}

pub(crate) struct ReceiveLoop {
    socket: Arc<UdpSocket>,
    queue: Arc<PacketQueue>,
    running: Arc<AtomicBool>,
    retry: Option<ConnectRetry>,
}

impl ReceiveLoop {
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        queue: Arc<PacketQueue>,
        running: Arc<AtomicBool>,
        retry: Option<ConnectRetry>,
    ) -> Self {
        Self {
            socket,
            queue,
            running,
            retry,
        }
    }

    pub(crate) fn run(mut self) {
        let mut buf = [0u8; MAX_DATAGRAM];
        while self.running.load(Ordering::Acquire) {
            if let Some(retry) = self.retry.as_mut() {
                retry.tick(&self.socket);
            }
            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    // Anything shorter than a header cannot be dispatched.
                    if len >= HEADER_LEN {
                        self.queue.push(RawPacket::new(&buf[..len], from));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => debug!("transient receive error: {}", e),
            }
        }
    }
}
