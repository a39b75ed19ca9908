//! Transient TCP bind/close probe used before starting a listener.

use std::net::TcpListener;

/// Check whether a port can currently be bound on all interfaces. The probe
/// socket is closed immediately; a small bind race with another process
/// remains possible and is reported by the real bind instead.
pub fn port_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_port_is_reported_unavailable() {
        let holder = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let port = holder.local_addr().unwrap().port();
        assert!(!port_available(port));
        drop(holder);
        assert!(port_available(port));
    }
}
