use std::net::SocketAddr;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::TransportError;
use crate::Transport;

const READ_CHUNK: usize = 4096;

/// A CRLF-framed stream transport over any `AsyncRead + AsyncWrite`.
/// Partial lines are retained in `buf` across reads, the way
/// `rust-legacy/rapace-core/src/transport/stream.rs::recv_frame` retains a
/// partially-read varint-prefixed frame — here the delimiter is `\r\n`
/// rather than a varint length.
pub struct StreamTransport<S = TcpStream> {
    io: S,
    peer: SocketAddr,
    buf: BytesMut,
}

impl StreamTransport<TcpStream> {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            io: stream,
            peer,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Builds a transport over an arbitrary duplex stream; used by tests to
    /// exercise the framing logic without a real socket.
    pub fn from_io(io: S, peer: SocketAddr) -> Self {
        Self {
            io,
            peer,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    fn take_buffered_line(&mut self) -> Option<Bytes> {
        let pos = self
            .buf
            .windows(2)
            .position(|w| w == b"\r\n")?;
        let line = self.buf.split_to(pos);
        self.buf.advance(2);
        Some(line.freeze())
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.io.read(&mut chunk).await?;
            if n == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(TransportError::TruncatedFrame)
                };
            }
            self.buf.extend_from_slice(&chunk[..n]);
            if let Some(line) = self.take_buffered_line() {
                return Ok(Some(line));
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn rebind_peer(&mut self, _addr: SocketAddr) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::duplex;

    fn peer() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 4567))
    }

    #[tokio::test]
    async fn round_trips_a_single_line() {
        let (client_io, mut server_io) = duplex(256);
        let mut client = StreamTransport::from_io(client_io, peer());

        server_io.write_all(b"REPLY OK IS welcome\r\n").await.unwrap();
        let line = client.recv_frame().await.unwrap().unwrap();
        assert_eq!(&line[..], b"REPLY OK IS welcome");
    }

    #[tokio::test]
    async fn splits_two_lines_delivered_in_one_read() {
        let (client_io, mut server_io) = duplex(256);
        let mut client = StreamTransport::from_io(client_io, peer());

        server_io.write_all(b"BYE FROM Al\r\nBYE FROM Bo\r\n").await.unwrap();
        let first = client.recv_frame().await.unwrap().unwrap();
        let second = client.recv_frame().await.unwrap().unwrap();
        assert_eq!(&first[..], b"BYE FROM Al");
        assert_eq!(&second[..], b"BYE FROM Bo");
    }

    #[tokio::test]
    async fn reassembles_a_line_split_across_reads() {
        let (client_io, mut server_io) = duplex(256);
        let mut client = StreamTransport::from_io(client_io, peer());

        server_io.write_all(b"BYE FR").await.unwrap();
        tokio::task::yield_now().await;
        server_io.write_all(b"OM Al\r\n").await.unwrap();
        let line = client.recv_frame().await.unwrap().unwrap();
        assert_eq!(&line[..], b"BYE FROM Al");
    }

    #[tokio::test]
    async fn clean_close_with_no_partial_line_is_ok_none() {
        let (client_io, server_io) = duplex(256);
        let mut client = StreamTransport::from_io(client_io, peer());
        drop(server_io);
        assert!(client.recv_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_with_a_partial_line_buffered_is_an_error() {
        let (client_io, mut server_io) = duplex(256);
        let mut client = StreamTransport::from_io(client_io, peer());
        server_io.write_all(b"BYE FROM Al").await.unwrap();
        drop(server_io);
        assert!(matches!(
            client.recv_frame().await,
            Err(TransportError::TruncatedFrame)
        ));
    }
}
