// SPDX-License-Identifier: MPL-2.0

//! Bounded-fanout network camera discovery
//!
//! Scans a `/24`-sized subnet for hosts answering on any of the
//! configured ports, capping concurrent in-flight probes at `fanout` with
//! a [`tokio::sync::Semaphore`]. Hosts that accept a TCP connection are
//! further classified by [`super::onvif::probe_onvif`]; everything else
//! reachable is still reported as a plain RTSP candidate, since many IP
//! cameras expose RTSP without ONVIF.

use super::onvif::probe_onvif;
use crate::config::SourceKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredCamera {
    pub address: SocketAddr,
    pub onvif: bool,
    pub source: SourceKind,
    /// `(width, height)`, when known. Always `None` for network cameras:
    /// getting it would require an ONVIF `GetProfiles` SOAP call, which
    /// `probe_onvif` deliberately doesn't make (see its module docs).
    pub resolution: Option<(u32, u32)>,
    /// Frames per second, when known. See `resolution`'s note.
    pub fps: Option<f32>,
    /// Whether the host accepted the discovery probe's connection
    pub reachable: bool,
    pub probed_at_unix_ms: i64,
}

/// All host addresses in `base/prefix_len`, excluding network and
/// broadcast addresses for prefixes shorter than /31.
pub fn hosts_in_cidr(base: Ipv4Addr, prefix_len: u8) -> Vec<Ipv4Addr> {
    let prefix_len = prefix_len.min(32);
    let host_bits = 32 - prefix_len;
    if host_bits == 0 {
        return vec![base];
    }

    let base_u32 = u32::from(base);
    let network = base_u32 & (!0u32 << host_bits);
    let count = 1u32 << host_bits;

    let (start, end) = if host_bits >= 2 { (1, count - 1) } else { (0, count) };
    (start..end).map(|offset| Ipv4Addr::from(network + offset)).collect()
}

/// Probe every host/port combination in `subnet`, bounded to `fanout`
/// concurrent connection attempts.
pub async fn discover_network(
    subnet: (Ipv4Addr, u8),
    ports: &[u16],
    timeout: Duration,
    fanout: usize,
) -> Vec<DiscoveredCamera> {
    let hosts = hosts_in_cidr(subnet.0, subnet.1);
    let semaphore = Arc::new(Semaphore::new(fanout.max(1)));
    let mut tasks = Vec::with_capacity(hosts.len() * ports.len());

    for host in hosts {
        for &port in ports {
            let semaphore = Arc::clone(&semaphore);
            let addr = SocketAddr::new(IpAddr::V4(host), port);
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                probe_host(addr, timeout).await
            }));
        }
    }

    let mut found = Vec::new();
    for task in tasks {
        if let Ok(Some(camera)) = task.await {
            found.push(camera);
        }
    }
    found
}

async fn probe_host(addr: SocketAddr, timeout: Duration) -> Option<DiscoveredCamera> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            debug!(%addr, "discovery probe connected");
            let onvif = tokio::task::spawn_blocking(move || probe_onvif(addr, Duration::from_millis(500)))
                .await
                .unwrap_or(false);
            Some(DiscoveredCamera {
                address: addr,
                onvif,
                source: SourceKind::Rtsp { url: format!("rtsp://{}/", addr), username: None, password: None },
                resolution: None,
                fps: None,
                reachable: true,
                probed_at_unix_ms: chrono::Utc::now().timestamp_millis(),
            })
        }
        _ => None,
    }
}

/// Guess the host's primary subnet by opening a UDP socket "connected" to
/// a public address and reading back the local address the kernel chose
/// for it — no packet is actually sent. Assumes a `/24` since the
/// connect trick does not expose the interface's real netmask.
pub fn detect_local_subnet() -> Option<(Ipv4Addr, u8)> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let local_addr = socket.local_addr().ok()?;
    match local_addr.ip() {
        IpAddr::V4(ip) => Some((ip, 24)),
        IpAddr::V6(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts_in_cidr_slash_24_excludes_network_and_broadcast() {
        let hosts = hosts_in_cidr(Ipv4Addr::new(192, 168, 1, 0), 24);
        assert_eq!(hosts.len(), 254);
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 255)));
    }

    #[test]
    fn test_hosts_in_cidr_slash_30() {
        let hosts = hosts_in_cidr(Ipv4Addr::new(10, 0, 0, 0), 30);
        assert_eq!(hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_network_empty_subnet_returns_no_hosts() {
        let found = discover_network((Ipv4Addr::new(198, 51, 100, 0), 30), &[1], Duration::from_millis(50), 4).await;
        assert!(found.is_empty());
    }
}
