//! # UDP DNS Link
//!
//! Host [`WifiLink`] that sends real DNS queries to a resolver over UDP.
//!
//! Answers are never needed: the collection authority logs the query names it
//! sees. Any responses that arrive are drained and discarded so the socket
//! buffer does not fill up.

use bytes::{BufMut, BytesMut};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tracing::{debug, info};

use super::link_trait::{TransportError, WifiLink};
use crate::dns::protocol::{DNS_MAX_LABEL_LENGTH, DNS_MAX_NAME_LENGTH};
use crate::error::Result;

/// DNS header length
pub const DNS_HEADER_SIZE: usize = 12;

/// Header flags: standard query, recursion desired
pub const DNS_FLAGS_RD: u16 = 0x0100;

/// QTYPE A
pub const DNS_QTYPE_A: u16 = 1;

/// QCLASS IN
pub const DNS_QCLASS_IN: u16 = 1;

/// Build an RFC 1035 query packet for `name`
///
/// # Arguments
///
/// * `id` - Transaction id
/// * `name` - Query name in presentation form, without trailing dot
/// * `qtype` - Record type to ask for
///
/// # Errors
///
/// Returns `TransportError::InvalidName` for empty labels or names exceeding
/// DNS length limits.
pub fn build_query(id: u16, name: &str, qtype: u16) -> std::result::Result<BytesMut, TransportError> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > DNS_MAX_NAME_LENGTH {
        return Err(TransportError::InvalidName(format!("name length {}", name.len())));
    }

    let mut packet = BytesMut::with_capacity(DNS_HEADER_SIZE + name.len() + 2 + 4);

    // Header
    packet.put_u16(id);
    packet.put_u16(DNS_FLAGS_RD);
    packet.put_u16(1); // QDCOUNT
    packet.put_u16(0); // ANCOUNT
    packet.put_u16(0); // NSCOUNT
    packet.put_u16(0); // ARCOUNT

    // QNAME as length-prefixed labels
    for label in name.split('.') {
        if label.is_empty() || label.len() > DNS_MAX_LABEL_LENGTH {
            return Err(TransportError::InvalidName(format!("label '{}'", label)));
        }
        packet.put_u8(label.len() as u8);
        packet.put_slice(label.as_bytes());
    }
    packet.put_u8(0);

    packet.put_u16(qtype);
    packet.put_u16(DNS_QCLASS_IN);

    Ok(packet)
}

/// Non-blocking UDP socket aimed at one resolver
#[derive(Debug)]
pub struct UdpDnsLink {
    socket: UdpSocket,
    resolver: SocketAddr,
    next_id: u16,
}

impl UdpDnsLink {
    /// Bind an ephemeral local port matching the resolver's address family
    ///
    /// # Errors
    ///
    /// Returns `TowlError::Io` if the socket cannot be created.
    pub fn bind(resolver: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match resolver {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        info!("DNS uplink bound to {} for resolver {}", socket.local_addr()?, resolver);

        Ok(Self { socket, resolver, next_id: 1 })
    }

    pub fn resolver(&self) -> SocketAddr {
        self.resolver
    }

    /// Discard any answers waiting in the receive buffer
    fn drain_responses(&self) {
        let mut buf = [0u8; 512];
        let mut drained = 0;
        while self.socket.recv_from(&mut buf).is_ok() {
            drained += 1;
        }
        if drained > 0 {
            debug!("Discarded {} resolver responses", drained);
        }
    }
}

impl WifiLink for UdpDnsLink {
    /// Connecting a UDP socket only performs a route lookup, so this fails fast
    /// when no interface can reach the resolver.
    fn network_reachable(&mut self) -> bool {
        self.socket.connect(self.resolver).is_ok()
    }

    fn send_query(&mut self, name: &str) -> std::result::Result<(), TransportError> {
        self.drain_responses();

        let packet = build_query(self.next_id, name, DNS_QTYPE_A)?;
        self.next_id = self.next_id.wrapping_add(1);

        self.socket.connect(self.resolver).map_err(classify)?;
        self.socket.send(&packet).map_err(classify)?;

        debug!("Sent DNS query ({} bytes) to {}", packet.len(), self.resolver);
        Ok(())
    }
}

fn classify(error: io::Error) -> TransportError {
    if error.kind() == io::ErrorKind::WouldBlock {
        TransportError::WouldBlock
    } else if is_unreachable(&error) {
        TransportError::Unreachable
    } else {
        TransportError::Io(error)
    }
}

/// ENETUNREACH / EHOSTUNREACH
fn is_unreachable(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(101) | Some(113))
}
