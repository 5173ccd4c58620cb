//! Mutual TLS setup for the etcd connection.

use etcd_client::{Certificate, Identity, TlsOptions};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::RouteSyncConfig;
use crate::error::{Result, RouteSyncError};

/// PEM material for a mutually authenticated etcd channel.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
    pub ca_pem: Vec<u8>,
}

impl TlsMaterial {
    /// Read the client certificate, key and CA bundle named in `config`.
    pub fn load(config: &RouteSyncConfig) -> Result<Self> {
        Ok(Self {
            cert_pem: read_pem(&config.etcd_cert)?,
            key_pem: read_pem(&config.etcd_cert_key)?,
            ca_pem: read_pem(&config.etcd_ca)?,
        })
    }

    /// Build the client TLS options.
    pub fn into_options(self) -> TlsOptions {
        TlsOptions::new()
            .ca_certificate(Certificate::from_pem(self.ca_pem))
            .identity(Identity::from_pem(self.cert_pem, self.key_pem))
    }
}

/// Load credentials from disk and build the client TLS options.
pub fn load_tls_options(config: &RouteSyncConfig) -> Result<TlsOptions> {
    TlsMaterial::load(config).map(TlsMaterial::into_options)
}

fn read_pem(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let pem = fs::read(path).map_err(|source| RouteSyncError::Tls {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = pem.len(), "Loaded PEM file");
    Ok(pem)
}
