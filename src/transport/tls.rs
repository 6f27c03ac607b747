use std::sync::Arc;

use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::BoxedStream;
use crate::error::ClientError;

/// The configured TLS settings, or one trusting the webpki roots.
pub(crate) fn client_config(
    custom: Option<&Arc<rustls::ClientConfig>>,
) -> Arc<rustls::ClientConfig> {
    if let Some(config) = custom {
        return Arc::clone(config);
    }

    let _ = rustls::crypto::ring::default_provider().install_default();
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
}

/// Run a client handshake over `stream`, verifying `host`.
pub(crate) async fn handshake(
    stream: BoxedStream,
    host: &str,
    config: Arc<rustls::ClientConfig>,
) -> Result<BoxedStream, ClientError> {
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| ClientError::Tls(format!("invalid server name {}: {}", host, e)))?;

    let connector = TlsConnector::from(config);
    let tls = connector
        .connect(server_name, stream)
        .await
        .map_err(|e| ClientError::Tls(format!("handshake with {} failed: {}", host, e)))?;

    debug!(%host, "TLS handshake complete");
    Ok(Box::new(tls))
}
