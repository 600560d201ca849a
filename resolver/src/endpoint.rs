//! Endpoint candidates and API version descriptors

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use http::{HeaderMap, HeaderName};
use url::Url;

use crate::trust::TrustPolicy;

/// Registry wire protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApiVersion {
    /// Legacy protocol
    V1,
    /// Modern protocol
    V2,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => f.write_str("v1"),
            ApiVersion::V2 => f.write_str("v2"),
        }
    }
}

/// An API version advertised by a registry, such as `registry/2.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiVersionDescriptor {
    kind: String,
    version: String,
}

impl ApiVersionDescriptor {
    /// Create a descriptor
    pub fn new(kind: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: version.into(),
        }
    }

    /// The modern registry API, `registry/2.0`
    pub fn registry_v2() -> Self {
        Self::new(crate::REGISTRY_API_TYPE, crate::REGISTRY_API_V2)
    }

    /// Descriptor type, e.g. `registry`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Version string, e.g. `2.0`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Collect the descriptors advertised in `header`.
    ///
    /// Values may be repeated across header lines, and separated by spaces
    /// or commas within a line. Unparseable entries are skipped.
    pub fn from_headers(headers: &HeaderMap, header: &HeaderName) -> Vec<Self> {
        headers
            .get_all(header)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split([' ', ',']))
            .filter_map(|entry| entry.parse().ok())
            .collect()
    }
}

impl fmt::Display for ApiVersionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.version)
    }
}

/// The string was not of the form `type/version`.
#[derive(Debug, thiserror::Error)]
#[error("invalid API version descriptor: {0:?}")]
pub struct InvalidApiVersion(String);

impl FromStr for ApiVersionDescriptor {
    type Err = InvalidApiVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((kind, version)) if !kind.is_empty() && !version.is_empty() => {
                Ok(Self::new(kind, version))
            }
            _ => Err(InvalidApiVersion(s.to_owned())),
        }
    }
}

/// A registry API endpoint to attempt, in a caller-iterated preference list.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointCandidate {
    url: Url,
    version: ApiVersion,
    mirror: bool,
    official: bool,
    trim_hostname: bool,
    trust: Arc<TrustPolicy>,
    version_header: Option<HeaderName>,
    versions: Vec<ApiVersionDescriptor>,
}

impl EndpointCandidate {
    pub(crate) fn new(url: Url, version: ApiVersion, trust: Arc<TrustPolicy>) -> Self {
        Self {
            url,
            version,
            mirror: false,
            official: false,
            trim_hostname: true,
            trust,
            version_header: None,
            versions: Vec::new(),
        }
    }

    pub(crate) fn mirror(mut self) -> Self {
        self.mirror = true;
        self
    }

    pub(crate) fn official(mut self) -> Self {
        self.official = true;
        self
    }

    pub(crate) fn negotiate(
        mut self,
        header: HeaderName,
        versions: Vec<ApiVersionDescriptor>,
    ) -> Self {
        self.version_header = Some(header);
        self.versions = versions;
        self
    }

    /// Base URL, not yet joined with any API path
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Protocol generation spoken at this endpoint
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Sourced from a configured pull-through mirror
    pub fn is_mirror(&self) -> bool {
        self.mirror
    }

    /// Targets the canonical registry
    pub fn is_official(&self) -> bool {
        self.official
    }

    /// Whether the hostname is stripped when building repository paths
    pub fn trim_hostname(&self) -> bool {
        self.trim_hostname
    }

    /// Transport trust for this endpoint's host
    pub fn trust(&self) -> &Arc<TrustPolicy> {
        &self.trust
    }

    /// Header the registry uses to advertise supported API versions
    pub fn version_header(&self) -> Option<&HeaderName> {
        self.version_header.as_ref()
    }

    /// API versions this endpoint is expected to advertise
    pub fn versions(&self) -> &[ApiVersionDescriptor] {
        &self.versions
    }

    /// Whether any `advertised` descriptor matches one this endpoint expects.
    ///
    /// Endpoints without a version list accept anything.
    pub fn accepts(&self, advertised: &[ApiVersionDescriptor]) -> bool {
        self.versions.is_empty() || advertised.iter().any(|v| self.versions.contains(v))
    }
}

impl fmt::Display for EndpointCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.version)
    }
}
