//! CLI surface (§6) and the "parsed configuration record" external
//! collaborator the distilled spec's §1 says the core is handed. Argument
//! parsing and hostname resolution live here, outside the three core
//! subsystems, per the explicit out-of-scope carve-out.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

/// Command-line arguments, matching the `-t/-s/-p/-d/-r/-h` table verbatim.
/// `-h` is clap's own built-in help flag — clap prints help and exits 0
/// without any custom code, so no handler is written for it here.
#[derive(Parser, Debug)]
#[command(name = "ipk24chat-client", about = "IPK24-CHAT terminal client")]
pub struct Cli {
    /// Transport variant: tcp or udp.
    #[arg(short = 't', value_enum)]
    pub transport: TransportKind,

    /// Server address: an IPv4 literal, an IPv6 literal, or a hostname to
    /// resolve to an IPv4 address.
    #[arg(short = 's')]
    pub server: String,

    /// Server port.
    #[arg(short = 'p', default_value_t = 4567)]
    pub port: u16,

    /// Datagram confirmation timeout, in milliseconds.
    #[arg(short = 'd', default_value_t = 250)]
    pub timeout_ms: u64,

    /// Datagram retransmission attempts.
    #[arg(short = 'r', default_value_t = 3)]
    pub max_retransmissions: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
}

/// The configuration record §1 describes as supplied to the core by an
/// external collaborator, after `-s` has been resolved to a concrete
/// address.
#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportKind,
    pub server_addr: SocketAddr,
    pub confirm_timeout: Duration,
    pub max_retransmissions: u8,
}

#[derive(Debug)]
pub enum CliError {
    Resolution(io::Error),
    NoAddressFound(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Resolution(e) => write!(f, "failed to resolve server address: {e}"),
            CliError::NoAddressFound(host) => {
                write!(f, "no address found for host {host}")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Resolution(e) => Some(e),
            CliError::NoAddressFound(_) => None,
        }
    }
}

/// Resolves `cli.server` (an IPv4 literal, an IPv6 literal, or a hostname)
/// and builds the `Config` the event loop runs against.
pub async fn resolve(cli: Cli) -> Result<Config, CliError> {
    let ip = resolve_host(&cli.server).await?;
    Ok(Config {
        transport: cli.transport,
        server_addr: SocketAddr::new(ip, cli.port),
        confirm_timeout: Duration::from_millis(cli.timeout_ms),
        max_retransmissions: cli.max_retransmissions,
    })
}

async fn resolve_host(host: &str) -> Result<IpAddr, CliError> {
    if let Ok(v4) = host.parse::<Ipv4Addr>() {
        return Ok(IpAddr::V4(v4));
    }
    if let Ok(v6) = host.parse::<Ipv6Addr>() {
        return Ok(IpAddr::V6(v6));
    }
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(CliError::Resolution)?;
    addrs
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(IpAddr::V4(v4)),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| CliError::NoAddressFound(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ipv4_literal_resolves_to_itself() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn ipv6_literal_resolves_to_itself() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }
}
