//! Policy constants and connection settings shared by the server and client.
//!
//! The server is stateless across restarts and has no persisted
//! configuration, so unlike a config file this module holds only values
//! resolved once at process startup from CLI flags, plus the protocol's
//! own policy constants.

/// Default port both binaries fall back to when none is given on the CLI.
pub const DEFAULT_PORT: u16 = 4433;

/// Default maximum number of simultaneously registered sessions.
///
/// A policy constant, not a wire value. `Registry::new` takes this as a
/// parameter rather than hardcoding it.
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Reference QUIC idle timeout, in seconds.
pub const IDLE_TIMEOUT_SECS: u64 = 600;

/// Timeout applied to the initial QUIC connect attempt on the client side.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// ALPN protocol token negotiated during the TLS handshake.
pub const ALPN_PROTOCOL: &[u8] = b"scp-v1";

/// Settings resolved from the server's command line.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cert_path: std::path::PathBuf,
    pub key_path: std::path::PathBuf,
    pub max_clients: usize,
}

/// Settings resolved from the client's command line.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub username: String,
    pub server_host: String,
    pub server_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_matches_reference() {
        assert_eq!(DEFAULT_PORT, 4433);
    }

    #[test]
    fn default_max_clients_matches_reference() {
        assert_eq!(DEFAULT_MAX_CLIENTS, 10);
    }
}
