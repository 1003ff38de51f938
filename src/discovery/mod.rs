// SPDX-License-Identifier: MPL-2.0

//! Camera discovery: local V4L2 enumeration plus bounded-fanout network
//! scanning, merged into one candidate list for the operator to review.

pub mod local;
pub mod network;
pub mod onvif;

use crate::config::DiscoveryConfig;
use crate::errors::DiscoveryError;
use local::DiscoveredLocalDevice;
use network::DiscoveredCamera;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub enum CandidateCamera {
    Local(DiscoveredLocalDevice),
    Network(DiscoveredCamera),
}

/// Run local and network discovery according to `config`, returning
/// whatever was found within the overall deadline.
pub async fn discover(config: &DiscoveryConfig, deadline: Duration) -> Result<Vec<CandidateCamera>, DiscoveryError> {
    let local_count = config.local_device_count;
    let local_devices =
        tokio::task::spawn_blocking(move || local::discover_local_devices(local_count));

    let subnet = config
        .discover_subnet
        .as_deref()
        .and_then(parse_cidr)
        .or_else(network::detect_local_subnet);

    let ports = config.discover_ports.clone();
    let timeout = Duration::from_millis(config.probe_timeout_ms);
    let fanout = config.network_fanout;

    let network_future = async {
        match subnet {
            Some(subnet) => network::discover_network(subnet, &ports, timeout, fanout).await,
            None => {
                warn!("no subnet configured and auto-detection failed; skipping network discovery");
                Vec::new()
            }
        }
    };

    let result = tokio::time::timeout(deadline, async {
        let (local, network) = tokio::join!(local_devices, network_future);
        (local.unwrap_or_default(), network)
    })
    .await;

    let (local, network) = result.map_err(|_| DiscoveryError::Timeout)?;

    info!(local = local.len(), network = network.len(), "discovery complete");

    let mut candidates: Vec<CandidateCamera> = local.into_iter().map(CandidateCamera::Local).collect();
    candidates.extend(network.into_iter().map(CandidateCamera::Network));
    Ok(candidates)
}

fn parse_cidr(spec: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = spec.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    Some((addr, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr_valid() {
        assert_eq!(parse_cidr("192.168.1.0/24"), Some((Ipv4Addr::new(192, 168, 1, 0), 24)));
    }

    #[test]
    fn test_parse_cidr_rejects_malformed() {
        assert_eq!(parse_cidr("not-an-address"), None);
    }

    #[tokio::test]
    async fn test_discover_respects_deadline() {
        let config = DiscoveryConfig {
            discover_subnet: Some("198.51.100.0/30".to_string()),
            discover_ports: vec![1],
            probe_timeout_ms: 50,
            local_device_count: 1,
            network_fanout: 4,
        };
        let result = discover(&config, Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }
}
