// Certificates module - Leaf certificate retrieval and parsing
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod fetcher;

pub use fetcher::{CertificateFetcher, LeafCertificate, TlsCertificateFetcher};
