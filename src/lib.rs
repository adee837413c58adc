//! In-memory DNS record cache and a minimal multicast DNS responder.
//!
//! The [`cache`] module holds resolved records keyed by their `(name, type, value)` identity, the
//! [`responder`] module answers A/AAAA queries for `.local.` names, and [`packet`] is the wire
//! codec both of them share.

use std::net::Ipv4Addr;

mod hex;
mod num;

pub mod cache;
pub mod command;
pub mod packet;
pub mod responder;

pub use packet::{name, Error};

/// Size of multicast DNS message buffers.
///
/// mDNS works entirely within a local network, so messages may exceed the 512 bytes of unicast
/// DNS. This is the size of the receive buffers and does not have to fit IP and UDP headers.
pub const MDNS_BUFFER_SIZE: usize = 1500;

/// The IPv4 multicast group mDNS queries are sent to.
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The port registered for mDNS.
///
/// [`responder::ResponderConfig`] defaults to a different port so that the responder does not
/// fight with the system's mDNS daemon.
pub const MDNS_PORT: u16 = 5353;
