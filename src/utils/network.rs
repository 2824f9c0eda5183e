// Network utilities - Target parsing, DNS resolution, socket helpers
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::error::MonitorError;
use anyhow::{Context, Result};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::*;
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default TLS port when none is given
pub const DEFAULT_PORT: u16 = 443;

/// One monitored endpoint, identified by `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    /// Build a target from a host and a port, rejecting malformed input
    pub fn new(host: impl Into<String>, port: u16) -> std::result::Result<Self, MonitorError> {
        let host: String = host.into();
        let host = host.trim();
        let invalid = |reason: &str| MonitorError::InvalidTarget {
            input: format!("{}:{}", host, port),
            reason: reason.to_string(),
        };

        if host.is_empty() {
            return Err(invalid("empty hostname"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(invalid("hostname contains whitespace"));
        }
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        Ok(Self {
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    /// Parse target from string (host, host:port, [v6]:port or https URL)
    pub fn parse(input: &str) -> std::result::Result<Self, MonitorError> {
        let input = input.trim();
        let invalid = |reason: String| MonitorError::InvalidTarget {
            input: input.to_string(),
            reason,
        };

        // Bare IPv6 literals contain colons but no port
        if input.parse::<IpAddr>().is_ok() {
            return Self::new(input, DEFAULT_PORT);
        }

        if input.contains("://") {
            let url = url::Url::parse(input).map_err(|e| invalid(e.to_string()))?;
            let host = url
                .host_str()
                .ok_or_else(|| invalid("no hostname in URL".to_string()))?;
            let port = url.port().unwrap_or(DEFAULT_PORT);
            return Self::new(host, port);
        }

        match input.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = parse_port(port_str).map_err(|e| invalid(e.to_string()))?;
                Self::new(host, port)
            }
            None => Self::new(input, DEFAULT_PORT),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Uniqueness key
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the host is an IP literal (no DNS and no SNI hostname)
    pub fn is_ip_literal(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Resolve hostname to IP addresses
pub async fn resolve_hostname(hostname: &str) -> Result<Vec<IpAddr>> {
    // Check if it's already an IP address
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let response = resolver
        .lookup_ip(hostname)
        .await
        .with_context(|| format!("DNS resolution failed for {}", hostname))?;

    let ips: Vec<IpAddr> = response.iter().collect();

    if ips.is_empty() {
        anyhow::bail!("No IP addresses found for {}", hostname);
    }

    Ok(ips)
}

/// Connect to target with timeout
pub async fn connect_with_timeout(
    addr: SocketAddr,
    connect_timeout: Duration,
) -> std::io::Result<TcpStream> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("Connection to {} timed out after {:?}", addr, connect_timeout),
        )),
    }
}

/// Parse port from string
pub fn parse_port(port_str: &str) -> Result<u16> {
    port_str.parse::<u16>().context("Invalid port number")
}
