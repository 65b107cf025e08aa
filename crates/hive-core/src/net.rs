//! Sequential port allocation
//!
//! Finds the next free TCP port from a starting point by probing with a
//! connect attempt: a successful connect means something is listening,
//! so the port is occupied.
//!
//! The probe is inherently racy against a concurrent bind; callers that
//! need an allocation *sequence* to be correct serialize the
//! probe-and-bind under the shared lock (see the claim protocol in
//! `hived`). This function alone only guarantees the returned port was
//! free at probe time.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

/// How long a single connect probe may take
const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Whether something is currently listening on `127.0.0.1:port`
pub fn is_port_in_use(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok()
}

/// Find the first free port at or after `start`.
///
/// Probes sequentially; errors only if the entire remaining u16 range is
/// occupied (callers bound the search by choosing sane bases).
pub fn next_available_port(start: u16) -> io::Result<u16> {
    let mut port = start;
    loop {
        if !is_port_in_use(port) {
            return Ok(port);
        }
        port = port.checked_add(1).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no free port at or after {}", start),
            )
        })?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_free_port_is_returned_as_is() {
        // Grab an OS-assigned port, then release it; it should probe free.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert_eq!(next_available_port(port).unwrap(), port);
    }

    #[test]
    fn test_occupied_port_is_skipped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(is_port_in_use(port));
        let found = next_available_port(port).unwrap();
        assert!(found > port);
        assert!(!is_port_in_use(found));
    }

    #[test]
    fn test_is_port_in_use_reflects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(is_port_in_use(port));
        drop(listener);
        assert!(!is_port_in_use(port));
    }
}
