//! Transport trust resolution.
//!
//! Verification is only ever disabled for hosts the configuration declares
//! insecure. It is never inferred from missing certificates or failed
//! handshakes.

use std::sync::Arc;

use rustls_pki_types::CertificateDer;
use url::{Position, Url};

use crate::certs::ClientIdentity;
use crate::config::RegistryConfig;
use crate::error::{CertificateError, ResolveError, ResolveResult};

/// The TLS decision for one host.
#[derive(Debug, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Verify the server against system trust plus enrolled material.
    Verify(VerifiedTrust),

    /// Skip certificate verification. Also signals that plaintext HTTP is
    /// acceptable for the host.
    SkipVerify,
}

/// Material layered on top of system trust for a verified host.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifiedTrust {
    roots: Vec<CertificateDer<'static>>,
    identities: Vec<ClientIdentity>,
}

impl VerifiedTrust {
    /// Extra root certificates enrolled for the host
    pub fn roots(&self) -> &[CertificateDer<'static>] {
        &self.roots
    }

    /// Client certificates to present to the host
    pub fn identities(&self) -> &[ClientIdentity] {
        &self.identities
    }
}

impl TrustPolicy {
    /// Verify with system trust only; used for the canonical registry.
    pub fn server_default() -> Self {
        TrustPolicy::Verify(VerifiedTrust::default())
    }

    /// Whether certificate verification is active
    pub fn is_secure(&self) -> bool {
        matches!(self, TrustPolicy::Verify(_))
    }

    /// Whether certificate verification is skipped
    pub fn insecure_skip_verify(&self) -> bool {
        !self.is_secure()
    }

    /// Enrolled material, when verifying
    pub fn verified(&self) -> Option<&VerifiedTrust> {
        match self {
            TrustPolicy::Verify(trust) => Some(trust),
            TrustPolicy::SkipVerify => None,
        }
    }
}

/// Resolves [`TrustPolicy`] values against one configuration snapshot.
#[derive(Debug)]
pub struct TrustResolver<'c, C: ?Sized> {
    config: &'c C,
}

impl<'c, C> TrustResolver<'c, C>
where
    C: RegistryConfig + ?Sized,
{
    /// Resolve against `config`
    pub fn new(config: &'c C) -> Self {
        Self { config }
    }

    /// Resolve the policy for a bare `host[:port]`.
    pub fn resolve(&self, hostname: &str) -> ResolveResult<Arc<TrustPolicy>> {
        if hostname.is_empty() {
            return Err(ResolveError::EmptyHostname);
        }

        if !self.config.is_secure(hostname) {
            tracing::debug!(hostname, "insecure registry, skipping verification");
            return Ok(Arc::new(TrustPolicy::SkipVerify));
        }

        let Some(bundle) = self.config.certificate_bundle(hostname) else {
            return Ok(Arc::new(TrustPolicy::server_default()));
        };

        let certificate_error = |source: CertificateError| ResolveError::Certificate {
            hostname: hostname.to_owned(),
            source,
        };
        let trust = VerifiedTrust {
            roots: bundle.decode_roots().map_err(certificate_error)?,
            identities: bundle.decode_identities().map_err(certificate_error)?,
        };
        tracing::trace!(
            hostname,
            roots = trust.roots.len(),
            identities = trust.identities.len(),
            "using enrolled certificates"
        );
        Ok(Arc::new(TrustPolicy::Verify(trust)))
    }

    /// Parse a mirror URL and resolve the policy for its host.
    ///
    /// The host is taken as written, so `https://mirror:443` resolves for
    /// `mirror:443` even though the URL itself elides the default port.
    pub fn resolve_mirror(&self, mirror: &str) -> ResolveResult<(Url, Arc<TrustPolicy>)> {
        let url = Url::parse(mirror).map_err(|source| ResolveError::MirrorUrl {
            mirror: mirror.to_owned(),
            source,
        })?;
        if url.host_str().is_none() {
            return Err(ResolveError::MirrorHost(mirror.to_owned()));
        }

        let trust = self.resolve(&literal_authority(&url, raw_authority(mirror)))?;
        Ok((url, trust))
    }
}

/// `host[:port]` of a URL, without user info
pub(crate) fn authority(url: &Url) -> &str {
    &url[Position::BeforeHost..Position::AfterPort]
}

/// `host[:port]` of `url`, keeping a default port that `raw` spelled out.
pub(crate) fn literal_authority(url: &Url, raw: &str) -> String {
    let authority = authority(url);
    match url.port_or_known_default() {
        Some(port) if url.port().is_none() && raw.ends_with(&format!(":{port}")) => {
            format!("{authority}:{port}")
        }
        _ => authority.to_owned(),
    }
}

/// Authority of an unparsed URL string, without user info
fn raw_authority(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}
