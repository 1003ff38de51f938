// SPDX-License-Identifier: MPL-2.0

//! Minimal ONVIF reachability probe
//!
//! Full ONVIF device discovery (WS-Discovery multicast, SOAP device
//! management calls) would pull in a SOAP/XML client stack this crate has
//! no other use for. Instead this issues a raw HTTP GET against the
//! well-known `/onvif/device_service` path over a plain
//! [`std::net::TcpStream`] and treats any HTTP response at all as
//! evidence of an ONVIF-capable device — good enough to classify a
//! reachable host for the operator to finish configuring by hand.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

const ONVIF_PATH: &str = "/onvif/device_service";

/// Attempt an ONVIF device-service GET against `addr`. Returns `true` if
/// the host accepted the connection and returned an HTTP response.
pub fn probe_onvif(addr: SocketAddr, timeout: Duration) -> bool {
    let mut stream = match TcpStream::connect_timeout(&addr, timeout) {
        Ok(s) => s,
        Err(_) => return false,
    };
    if stream.set_read_timeout(Some(timeout)).is_err() || stream.set_write_timeout(Some(timeout)).is_err() {
        return false;
    }

    let request = format!(
        "GET {ONVIF_PATH} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        addr.ip()
    );
    if stream.write_all(request.as_bytes()).is_err() {
        return false;
    }

    let mut response = [0u8; 64];
    matches!(stream.read(&mut response), Ok(n) if n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_probe_onvif_unreachable_host_returns_false() {
        // TEST-NET-1 reserved range, guaranteed not to route here.
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 554);
        assert!(!probe_onvif(addr, Duration::from_millis(100)));
    }
}
