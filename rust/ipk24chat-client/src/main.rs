//! Binary entry point: parse the CLI, resolve the server address, wire up
//! the chosen transport, and run the matching event loop to completion.

use clap::Parser;
use ipk24chat_client::{datagram_loop, stream_loop, ClientError, Cli, TransportKind};
use ipk24chat_reliability::{ReliabilityConfig, ReliabilityEngine};
use ipk24chat_transport::{DatagramTransport, StreamTransport};
use tokio::io::BufReader;
use tokio::net::{TcpStream, UdpSocket};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create the tokio runtime");

    let result = rt.block_on(run(cli));

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "client exited with an error");
            eprintln!("ipk24chat-client: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let transport_kind = cli.transport;
    let config = ipk24chat_client::cli::resolve(cli).await?;

    let stdin = BufReader::new(tokio::io::stdin());

    match transport_kind {
        TransportKind::Tcp => {
            tracing::info!(addr = %config.server_addr, "connecting over TCP");
            let stream = TcpStream::connect(config.server_addr)
                .await
                .map_err(|e| ClientError::Transport(ipk24chat_transport::TransportError::Io(e)))?;
            let transport = StreamTransport::new(stream, config.server_addr);
            stream_loop::run(transport, stdin).await
        }
        TransportKind::Udp => {
            tracing::info!(addr = %config.server_addr, "starting over UDP");
            let socket = UdpSocket::bind((std::net::Ipv4Addr::UNSPECIFIED, 0))
                .await
                .map_err(|e| ClientError::Transport(ipk24chat_transport::TransportError::Io(e)))?;
            let transport = DatagramTransport::new(socket, config.server_addr);
            let reliability = ReliabilityConfig {
                confirm_timeout: config.confirm_timeout,
                max_retransmissions: config.max_retransmissions,
                ..ReliabilityConfig::default()
            };
            let engine = ReliabilityEngine::new(transport, reliability);
            datagram_loop::run(engine, stdin).await
        }
    }
}
