//! TLS and QUIC transport configuration for the server side.
//!
//! Grounded on the client-side config construction in
//! `SimaoMoreira5228-chatty`'s `make_insecure_client_config` (provider
//! install, ALPN token, wrapping a `rustls::ServerConfig` in a
//! `quinn::crypto::rustls::QuicServerConfig`), mirrored here for a real
//! certificate chain instead of a no-verify client.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rustls_pemfile::Item;

use scp_core::config::{ALPN_PROTOCOL, IDLE_TIMEOUT_SECS};

/// Loads a PEM-encoded certificate chain from `path`.
fn load_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening certificate file {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing certificate file {}", path.display()))?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in {}", path.display());
    }
    Ok(certs)
}

/// Loads a single PEM-encoded private key from `path`. Accepts PKCS#8, PKCS#1
/// (RSA) and SEC1 (EC) forms, matching what `rustls-pemfile` distinguishes
/// via [`Item`].
fn load_key(path: &Path) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening key file {}", path.display()))?;
    let mut reader = BufReader::new(file);
    for item in rustls_pemfile::read_all(&mut reader) {
        match item.with_context(|| format!("parsing key file {}", path.display()))? {
            Item::Pkcs8Key(key) => return Ok(key.into()),
            Item::Pkcs1Key(key) => return Ok(key.into()),
            Item::Sec1Key(key) => return Ok(key.into()),
            _ => continue,
        }
    }
    anyhow::bail!("no private key found in {}", path.display())
}

/// Builds the `quinn::ServerConfig` used to bind the QUIC endpoint: a
/// `rustls::ServerConfig` carrying the given certificate chain and key, with
/// ALPN pinned to [`ALPN_PROTOCOL`].
pub fn server_config(cert_path: &Path, key_path: &Path) -> Result<quinn::ServerConfig> {
    // Idempotent: a second install in the same process (e.g. repeated test
    // calls) just errors, which we ignore.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("building TLS server config")?;
    tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic_tls = quinn::crypto::rustls::QuicServerConfig::try_from(tls)
        .context("adapting rustls::ServerConfig for QUIC")?;

    let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_tls));
    let mut transport = quinn::TransportConfig::default();
    transport
        .max_idle_timeout(Some(Duration::from_secs(IDLE_TIMEOUT_SECS)))
        .context("idle timeout out of range")?;
    server_config.transport_config(Arc::new(transport));

    Ok(server_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Self-signed cert/key generated once via `rcgen` at test time, so this
    // module has no checked-in fixture files to keep in sync.
    fn write_self_signed(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let rcgen::CertifiedKey { cert, signing_key } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        File::create(&cert_path).unwrap().write_all(cert.pem().as_bytes()).unwrap();
        File::create(&key_path).unwrap().write_all(signing_key.serialize_pem().as_bytes()).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn loads_a_self_signed_cert_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, key_path) = write_self_signed(dir.path());

        let certs = load_certs(&cert_path).unwrap();
        assert_eq!(certs.len(), 1);
        load_key(&key_path).unwrap();
    }

    #[test]
    fn server_config_sets_alpn() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, key_path) = write_self_signed(dir.path());
        server_config(&cert_path, &key_path).unwrap();
    }

    #[test]
    fn missing_cert_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (_, key_path) = write_self_signed(dir.path());
        let missing = dir.path().join("nope.pem");
        assert!(server_config(&missing, &key_path).is_err());
    }
}
