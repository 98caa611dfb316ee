//! Server discovery on the local network
//!
//! A server periodically sends an [`AnnouncePacket`] to a well-known
//! broadcast or multicast address. Clients wait on that address with a
//! [`Listener`] until a packet arrives or their timeout runs out.

mod announcer;
mod listener;
mod packet;


pub use announcer::Announcer;
pub use listener::{DiscoveredServer, Listener};
pub use packet::{AnnouncePacket, PacketKind, ServerIdentity};
