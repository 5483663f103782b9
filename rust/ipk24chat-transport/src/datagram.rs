use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::error::TransportError;
use crate::Transport;

/// Maximum UDP payload this protocol ever sends; comfortably under the
/// practical IPv4/IPv6 UDP ceiling without fragmentation.
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// An unconnected UDP socket. Outgoing datagrams target `peer`; `peer` is
/// updated after the first server reply arrives from a different port
/// (§3's dynamic port rebind), and again whenever the reliability engine
/// calls [`Transport::rebind_peer`].
pub struct DatagramTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl DatagramTransport {
    pub fn new(socket: UdpSocket, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl Transport for DatagramTransport {
    async fn send_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.socket.send_to(bytes, self.peer).await?;
        Ok(())
    }

    /// Receives at most one datagram and records its source as the new
    /// peer. A UDP datagram is never partial, so this never buffers
    /// anything across calls and never returns `Ok(None)` — an empty
    /// datagram is a valid (if useless) zero-length frame, not EOF.
    async fn recv_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (n, from) = self.socket.recv_from(&mut buf).await?;
        self.peer = from;
        Ok(Some(Bytes::copy_from_slice(&buf[..n])))
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn rebind_peer(&mut self, addr: SocketAddr) {
        self.peer = addr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    async fn bound_socket() -> UdpSocket {
        UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_a_datagram() {
        let server = bound_socket().await;
        let server_addr = server.local_addr().unwrap();
        let client_socket = bound_socket().await;
        let mut client = DatagramTransport::new(client_socket, server_addr);

        client.send_frame(&[0x02, 0x00, 0x01]).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x02, 0x00, 0x01]);

        server.send_to(&[0x00, 0x00, 0x01], from).await.unwrap();
        let frame = client.recv_frame().await.unwrap().unwrap();
        assert_eq!(&frame[..], &[0x00, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn receiving_rebinds_the_peer_to_the_datagrams_source() {
        // The client starts out pointed at the well-known listener port, but
        // the reply arrives from a different, ephemeral server socket — the
        // post-AUTH dynamic port rebind. The client must use that source
        // address for every subsequent send.
        let listener_addr = bound_socket().await.local_addr().unwrap();
        let client_socket = bound_socket().await;
        let client_addr = client_socket.local_addr().unwrap();
        let mut client = DatagramTransport::new(client_socket, listener_addr);

        let responder = bound_socket().await;
        let responder_addr = responder.local_addr().unwrap();
        responder.send_to(&[0xFD, 0x00, 0x01], client_addr).await.unwrap();

        client.recv_frame().await.unwrap();
        assert_eq!(client.peer_addr(), responder_addr);
    }

    #[tokio::test]
    async fn rebind_peer_redirects_subsequent_sends() {
        let a = bound_socket().await;
        let a_addr = a.local_addr().unwrap();
        let b = bound_socket().await;
        let b_addr = b.local_addr().unwrap();
        let client_socket = bound_socket().await;
        let mut client = DatagramTransport::new(client_socket, a_addr);

        client.rebind_peer(b_addr);
        client.send_frame(&[0x00, 0x00, 0x00]).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 3);
    }
}
