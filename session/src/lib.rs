//! # Session Core
//!
//! Connection-oriented sessions over raw UDP: a server registering up to a
//! fixed cap of clients, clients joining with a retried handshake, periodic
//! player-transform fan-out, and a fire-and-forget server-discovery ping.
//!
//! ## Threading model
//!
//! One [`NetworkSession`] owns a socket, a background receive thread, and
//! the per-role session state. The receive thread only ever pushes raw
//! datagrams into a lock-guarded queue; [`NetworkSession::update`], called
//! once per application tick, swaps the whole queue out in O(1), dispatches
//! every buffered packet, and fires the registered callbacks. Session state
//! is therefore touched from exactly one thread, despite the background
//! I/O.
//!
//! Discovery pings run on their own short-lived threads against throwaway
//! sockets and park replies in a second lock-guarded buffer, drained by the
//! next `update`; a session never blocks on a slow or silent server.
//!
//! ## Delivery guarantees
//!
//! None beyond UDP's: packets are dispatched in the order the socket
//! produced them, and the connect/disconnect exchange is retried, but state
//! updates are fire-and-forget. Malformed or undersized datagrams are
//! dropped without side effects.

pub mod config;
pub mod discovery;
pub mod error;
pub mod queue;
pub mod session;
pub mod slots;

mod receiver;
mod transport;

pub use config::SessionConfig;
pub use discovery::ServerInfo;
pub use error::SessionError;
pub use session::{Mode, NetworkSession};
