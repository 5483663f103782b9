//! Socket adapters that present both IPK24-CHAT transports behind one
//! interface. Neither adapter knows the wire grammar — they move whole
//! frames (a CRLF-delimited line, or a UDP datagram) as bytes; the codec
//! crate turns those into `Message` values.

mod datagram;
mod error;
mod stream;

pub use datagram::DatagramTransport;
pub use error::TransportError;
pub use stream::StreamTransport;

use std::net::SocketAddr;

use bytes::Bytes;

/// Uniform send/receive surface over a connected TCP stream or an
/// unconnected UDP socket. Grounded on `Transport` in
/// `rust-legacy/rapace-core/src/transport/stream.rs`, narrowed to the one
/// frame shape this protocol needs (no descriptor header, no payload pool).
pub trait Transport {
    /// Sends one complete frame.
    async fn send_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Receives one complete frame. `Ok(None)` means the peer closed
    /// cleanly with no partial frame outstanding.
    async fn recv_frame(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// The endpoint frames are currently sent to.
    fn peer_addr(&self) -> SocketAddr;

    /// Redirects outgoing datagrams to `addr`. A no-op on the stream
    /// transport, which has no notion of a peer distinct from its
    /// connection.
    fn rebind_peer(&mut self, addr: SocketAddr);
}
