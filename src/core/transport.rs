//! Purpose: Build HTTP transports that bound every exchange with deadlines.
//! Exports: `TransportConfig`, `DeadlineMode`, `deadline_agent`, `DEFAULT_TIMEOUT`.
//! Role: Transport factory shared by the one-shot request function and `ApiClient`.
//! Invariants: Connect is always bounded by `connect_timeout`.
//! Invariants: `Sliding` re-arms the read/write deadline before every socket read/write.
//! Invariants: `Total` applies one absolute deadline to the whole exchange.

use crate::core::error::{Error, ErrorKind};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DeadlineMode {
    /// Each socket read and write gets `io_timeout` from the moment it starts.
    #[default]
    Sliding,
    /// The whole exchange, body included, must finish within `io_timeout`.
    Total,
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub deadline: DeadlineMode,
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            deadline: DeadlineMode::Sliding,
            tls: None,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets connect and read/write timeouts to the same value.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.io_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: DeadlineMode) -> Self {
        self.deadline = deadline;
        self
    }

    /// Trusts only the PEM certificates in `path` for https endpoints.
    pub fn with_tls_ca_file(mut self, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "failed to read TLS CA file {}",
                    path.display()
                ))
                .with_source(err)
        })?;
        let certs = rustls_pemfile::certs(&mut Cursor::new(cert_bytes))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!(
                        "failed to parse TLS CA file {}",
                        path.display()
                    ))
                    .with_source(err)
            })?;
        if certs.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "TLS CA file {} contains no certificates",
                    path.display()
                ))
                .with_hint("Pass a PEM file with one or more CERTIFICATE blocks."));
        }

        let mut root_store = rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "TLS CA file {} contains no parsable certificates",
                path.display()
            )));
        }

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let tls_config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to configure TLS")
                    .with_source(err)
            })?
            .with_root_certificates(root_store)
            .with_no_client_auth();
        self.tls = Some(Arc::new(tls_config));
        Ok(self)
    }

    pub fn has_custom_tls(&self) -> bool {
        self.tls.is_some()
    }
}

/// Produces an agent whose connections enforce `config`'s deadlines.
pub fn deadline_agent(config: &TransportConfig) -> ureq::Agent {
    let builder = ureq::AgentBuilder::new().timeout_connect(config.connect_timeout);
    let builder = match config.deadline {
        DeadlineMode::Sliding => builder
            .timeout_read(config.io_timeout)
            .timeout_write(config.io_timeout),
        DeadlineMode::Total => builder.timeout(config.io_timeout),
    };
    let builder = match &config.tls {
        Some(tls) => builder.tls_config(Arc::clone(tls)),
        None => builder,
    };
    builder.build()
}
