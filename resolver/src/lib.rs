//! # Registry endpoint resolution
//!
//! Decides *which* registry endpoints a container image client should try,
//! in *which* order, and with *which* TLS trust policy.
//!
//! ## Features
//!
//! - Configured pull-through mirrors before the registry itself
//! - Protocol v2 before legacy v1, HTTPS before plain HTTP
//! - Plain HTTP only for hosts explicitly declared insecure
//! - Per-host certificate enrollment for registries behind private CAs
//! - Hot-swappable configuration with consistent per-call snapshots
//!
//! ## Example
//!
//! ```
//! use registry_resolver::{Service, ServiceConfig, ServiceOptions};
//!
//! let options = ServiceOptions {
//!     mirrors: vec!["https://mirror.example.com".into()],
//!     insecure_registries: vec!["registry.local:5000".into()],
//!     legacy_protocol: true,
//!     ..Default::default()
//! };
//! let service = Service::new(ServiceConfig::new(options));
//!
//! let endpoints = service.lookup_push_endpoints("registry.local:5000/team/app")?;
//! assert_eq!(endpoints.len(), 4);
//! assert_eq!(endpoints[0].url().as_str(), "https://registry.local:5000/");
//! assert_eq!(endpoints[2].url().as_str(), "http://registry.local:5000/");
//! # Ok::<(), registry_resolver::ResolveError>(())
//! ```

use http::HeaderName;

mod certs;
mod config;
mod endpoint;
mod error;
mod lookup;
mod service;
mod trust;

pub use certs::{CertificateBundle, ClientIdentity};
pub use config::{IndexInfo, RegistryConfig, ServiceConfig, ServiceOptions};
pub use endpoint::{ApiVersion, ApiVersionDescriptor, EndpointCandidate, InvalidApiVersion};
pub use error::{CertificateError, ConfigError, ErrorKind, ResolveError, ResolveResult};
pub use lookup::{EndpointResolver, is_official};
pub use service::Service;
pub use trust::{TrustPolicy, TrustResolver, VerifiedTrust};

/// Namespace of official images, served by the canonical registry
pub const DEFAULT_NAMESPACE: &str = "library";

/// Name of the official index
pub const INDEX_NAME: &str = "docker.io";

/// Legacy alias of [`INDEX_NAME`]
pub const LEGACY_INDEX_NAME: &str = "index.docker.io";

/// Canonical v2 registry
pub const DEFAULT_V2_REGISTRY: &str = "https://registry-1.docker.io";

/// Canonical v1 registry
pub const DEFAULT_V1_REGISTRY: &str = "https://index.docker.io";

/// Header a registry uses to advertise the API versions it speaks
pub const REGISTRY_VERSION_HEADER: HeaderName =
    HeaderName::from_static("docker-distribution-api-version");

/// Canonical spelling of [`REGISTRY_VERSION_HEADER`]
pub const REGISTRY_VERSION_HEADER_NAME: &str = "Docker-Distribution-Api-Version";

/// Type of the registry API version descriptor
pub const REGISTRY_API_TYPE: &str = "registry";

/// Version of the v2 registry API descriptor
pub const REGISTRY_API_V2: &str = "2.0";

/// Default certificates directory
pub const DEFAULT_CERTS_DIR: &str = "/etc/docker/certs.d";
