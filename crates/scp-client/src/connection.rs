//! QUIC client connection setup.
//!
//! Builds an ephemeral client endpoint plus a `rustls::ClientConfig` with its
//! certificate verifier disabled — server certificate validation is a
//! deployment concern left to operators, not this reference client. The SCP
//! session opens its one bidirectional stream itself (the server side
//! accepts it; see `scp-server::server::handle_connection`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, SendStream};
use scp_core::config::{ALPN_PROTOCOL, CONNECT_TIMEOUT_SECS};

/// A connected SCP session: the QUIC connection plus its one bidirectional
/// stream, already opened.
pub struct SessionStreams {
    pub connection: Connection,
    pub send: SendStream,
    pub recv: RecvStream,
}

/// Connects to `host:port`, completes the TLS/QUIC handshake with ALPN
/// `scp-v1`, and opens the session's bidirectional stream.
pub async fn connect(host: &str, port: u16) -> Result<SessionStreams> {
    let endpoint = make_client_endpoint().context("failed to create QUIC client endpoint")?;
    let client_config = make_insecure_client_config().context("failed to build TLS client config")?;

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("resolving {host}:{port}"))?;

    let connecting = endpoint
        .connect_with(client_config, addr, host)
        .with_context(|| format!("connect_with({addr}, sni={host})"))?;

    let connection = tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), connecting)
        .await
        .with_context(|| format!("timed out connecting to {addr}"))?
        .with_context(|| format!("failed to connect to {addr}"))?;

    let (send, recv) = connection
        .open_bi()
        .await
        .context("failed to open the SCP session stream")?;

    Ok(SessionStreams { connection, send, recv })
}

fn make_client_endpoint() -> Result<Endpoint> {
    let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
    Endpoint::client(addr).context("binding ephemeral client endpoint")
}

/// Dev-only TLS config that skips server certificate validation; operators
/// deploying this client for real traffic should swap in a proper
/// verifier.
fn make_insecure_client_config() -> Result<ClientConfig> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut tls = rustls::ClientConfig::builder()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth();
    tls.dangerous().set_certificate_verifier(Arc::new(NoVerifier));
    tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic_tls = quinn::crypto::rustls::QuicClientConfig::try_from(tls)
        .context("adapting rustls::ClientConfig for QUIC")?;
    Ok(ClientConfig::new(Arc::new(quic_tls)))
}

#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Err(rustls::Error::General("TLS 1.2 is not supported".into()))
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
