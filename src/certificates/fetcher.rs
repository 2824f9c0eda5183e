// Certificate Fetcher - Retrieve and parse the leaf certificate of a TLS endpoint
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::error::FetchError;
use crate::monitor::types::ProbeResult;
use crate::utils::network::{Target, connect_with_timeout, resolve_hostname};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, ServerName};
use serde::Serialize;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::pem::Pem;
use x509_parser::prelude::*;
use x509_parser::time::ASN1Time;

/// Source of probe results for a target
///
/// One call is one network round trip; implementations never retry.
#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    async fn fetch(&self, target: &Target, timeout: Duration) -> ProbeResult;
}

/// Leaf certificate details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafCertificate {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub san: Vec<String>, // Subject Alternative Names
}

/// Fetcher that performs a verified TLS handshake with rustls
#[derive(Clone)]
pub struct TlsCertificateFetcher {
    connector: TlsConnector,
}

impl TlsCertificateFetcher {
    /// Fetcher trusting the Mozilla root program (webpki-roots)
    pub fn new() -> anyhow::Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_root_certificates(root_store)
    }

    /// Fetcher trusting exactly the given roots
    pub fn with_root_certificates(root_store: RootCertStore) -> anyhow::Result<Self> {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .context("Failed to configure TLS protocol versions")?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Fetcher trusting the webpki roots plus every certificate in a PEM bundle
    pub fn with_extra_roots<P: AsRef<Path>>(ca_file: P) -> anyhow::Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let added = add_pem_roots(&mut root_store, ca_file.as_ref())?;
        tracing::info!(
            "Loaded {} extra trust anchors from {}",
            added,
            ca_file.as_ref().display()
        );

        Self::with_root_certificates(root_store)
    }

    /// Connect, handshake and parse the leaf certificate
    pub async fn fetch_leaf(
        &self,
        target: &Target,
        probe_timeout: Duration,
    ) -> Result<LeafCertificate, FetchError> {
        let ips = match timeout(probe_timeout, resolve_hostname(target.host())).await {
            Ok(Ok(ips)) => ips,
            Ok(Err(e)) => return Err(FetchError::unreachable(format!("{:#}", e))),
            Err(_) => {
                return Err(FetchError::unreachable(format!(
                    "DNS resolution for {} timed out after {:?}",
                    target.host(),
                    probe_timeout
                )));
            }
        };

        let ip = ips
            .first()
            .copied()
            .ok_or_else(|| FetchError::unreachable(format!("No IP addresses found for {}", target.host())))?;
        let addr = SocketAddr::new(ip, target.port());

        let stream = connect_with_timeout(addr, probe_timeout)
            .await
            .map_err(|e| FetchError::unreachable(format!("Failed to connect to {}: {}", target, e)))?;

        let server_name = ServerName::try_from(target.host().to_string())
            .map_err(|e| FetchError::unknown(format!("Invalid server name {}: {}", target.host(), e)))?;

        let tls_stream = match timeout(probe_timeout, self.connector.connect(server_name, stream)).await {
            Ok(Ok(tls_stream)) => tls_stream,
            Ok(Err(e)) => return Err(classify_handshake_error(e)),
            Err(_) => {
                return Err(FetchError::unreachable(format!(
                    "TLS handshake with {} timed out after {:?}",
                    target, probe_timeout
                )));
            }
        };

        let (_io, connection) = tls_stream.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| FetchError::cert_error("No certificates received from server"))?;

        parse_certificate(leaf.as_ref())
    }
}

#[async_trait]
impl CertificateFetcher for TlsCertificateFetcher {
    async fn fetch(&self, target: &Target, probe_timeout: Duration) -> ProbeResult {
        match self.fetch_leaf(target, probe_timeout).await {
            Ok(leaf) => ProbeResult::success(leaf.not_after),
            Err(e) => e.into(),
        }
    }
}

/// Map a handshake I/O error to a failure class
///
/// tokio-rustls surfaces rustls errors wrapped in `io::Error`; those are
/// certificate-level. Connection drops mid-handshake are network-level.
fn classify_handshake_error(err: io::Error) -> FetchError {
    if let Some(tls_err) = err.get_ref().and_then(|e| e.downcast_ref::<rustls::Error>()) {
        return FetchError::cert_error(tls_err.to_string());
    }

    match err.kind() {
        io::ErrorKind::TimedOut
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => {
            FetchError::unreachable(format!("Connection lost during TLS handshake: {}", err))
        }
        _ => FetchError::unknown(format!("TLS handshake failed: {}", err)),
    }
}

/// Parse a DER certificate into leaf details
pub fn parse_certificate(der_bytes: &[u8]) -> Result<LeafCertificate, FetchError> {
    let (_, cert) = X509Certificate::from_der(der_bytes)
        .map_err(|e| FetchError::cert_error(format!("Failed to parse certificate: {}", e)))?;

    let mut san = Vec::new();
    if let Ok(Some(ext)) = cert.subject_alternative_name() {
        for name in &ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => san.push(dns.to_string()),
                GeneralName::IPAddress(ip) => san.push(format_ip_san(ip)),
                _ => {}
            }
        }
    }

    Ok(LeafCertificate {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: cert.raw_serial_as_string(),
        not_before: asn1_to_utc(cert.validity().not_before)?,
        not_after: asn1_to_utc(cert.validity().not_after)?,
        san,
    })
}

/// "Not valid after" instant of a DER certificate
pub fn parse_expiry(der_bytes: &[u8]) -> Result<DateTime<Utc>, FetchError> {
    parse_certificate(der_bytes).map(|leaf| leaf.not_after)
}

fn asn1_to_utc(time: ASN1Time) -> Result<DateTime<Utc>, FetchError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| FetchError::cert_error(format!("Certificate time out of range: {}", time)))
}

fn format_ip_san(bytes: &[u8]) -> String {
    let ip = match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    };
    match ip {
        Some(ip) => format!("IP:{}", ip),
        None => format!("IP:{:02x?}", bytes),
    }
}

/// Add every certificate of a PEM bundle to a root store. Returns how many were added.
fn add_pem_roots(root_store: &mut RootCertStore, path: &Path) -> anyhow::Result<usize> {
    let contents = std::fs::read(path)
        .with_context(|| format!("Failed to read CA file {}", path.display()))?;

    let mut added = 0;
    for pem in Pem::iter_from_buffer(&contents) {
        let pem = pem.with_context(|| format!("Invalid PEM in {}", path.display()))?;
        if pem.label != "CERTIFICATE" {
            continue;
        }
        root_store
            .add(CertificateDer::from(pem.contents))
            .with_context(|| format!("Invalid trust anchor in {}", path.display()))?;
        added += 1;
    }

    if added == 0 {
        anyhow::bail!("No certificates found in {}", path.display());
    }

    Ok(added)
}

/// Human-readable countdown to expiry, e.g. "expires in 2 months and 28 days"
pub fn format_expiry_countdown(not_after: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (not_after - now).num_days();

    if days < 0 {
        return match -days {
            1 => "expired 1 day ago".to_string(),
            d => format!("expired {} days ago", d),
        };
    }

    match days {
        0 => "expires today".to_string(),
        1 => "expires in 1 day".to_string(),
        d if d < 30 => format!("expires in {} days", d),
        d if d < 365 => {
            let (months, rest) = (d / 30, d % 30);
            let months = plural(months, "month");
            if rest == 0 {
                format!("expires in {}", months)
            } else {
                format!("expires in {} and {}", months, plural(rest, "day"))
            }
        }
        d => {
            let (years, months) = (d / 365, (d % 365) / 30);
            let years = plural(years, "year");
            if months == 0 {
                format!("expires in {}", years)
            } else {
                format!("expires in {} and {}", years, plural(months, "month"))
            }
        }
    }
}

pub(crate) fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
