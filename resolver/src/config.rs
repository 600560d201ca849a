//! Registry service configuration.
//!
//! [`ServiceOptions`] is the deserialized form (usually a TOML file);
//! [`ServiceConfig`] is the read-only snapshot the resolvers consult through
//! the [`RegistryConfig`] trait.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use camino::{Utf8Path, Utf8PathBuf};
use ipnet::IpNet;
use serde::Deserialize;

use crate::certs::CertificateBundle;
use crate::error::{ConfigError, ResolveError, ResolveResult};
use crate::{INDEX_NAME, LEGACY_INDEX_NAME};

/// Read access to the registry configuration.
///
/// Implementations must answer consistently for the duration of a single
/// resolution call.
pub trait RegistryConfig {
    /// Pull-through mirrors, in preference order
    fn mirrors(&self) -> &[String];

    /// Whether `hostname` (`host[:port]`) requires verified TLS
    fn is_secure(&self, hostname: &str) -> bool;

    /// Custom certificate material enrolled for exactly `hostname`
    fn certificate_bundle(&self, hostname: &str) -> Option<&CertificateBundle>;

    /// Whether the legacy v1 protocol may be offered for the canonical registry
    fn legacy_protocol_supported(&self) -> bool;
}

/// User supplied options for the registry service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServiceOptions {
    /// Pull-through mirrors for the official index
    pub mirrors: Vec<String>,

    /// Registries that may be reached without verified TLS.
    ///
    /// Each entry is either a CIDR (`10.0.0.0/8`) or a `host[:port]`.
    pub insecure_registries: Vec<String>,

    /// Directory holding per-host certificate directories
    pub certs_dir: Option<Utf8PathBuf>,

    /// Offer the legacy v1 protocol for the canonical registry
    pub legacy_protocol: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            mirrors: Vec::new(),
            insecure_registries: Vec::new(),
            certs_dir: None,
            legacy_protocol: cfg!(target_os = "linux"),
        }
    }
}

impl ServiceOptions {
    /// Parse options from a TOML document
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        Ok(toml_edit::de::from_str(document)?)
    }

    /// Read options from a TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path).map_err(ConfigError::io(path))?;
        Self::from_toml(&document)
    }
}

/// Metadata about a registry index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Normalized index name
    pub name: String,
    /// Mirrors that serve this index
    pub mirrors: Vec<String>,
    /// Whether the index requires verified TLS
    pub secure: bool,
    /// Whether this is the official index
    pub official: bool,
}

/// A read-only snapshot of the registry configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    mirrors: Vec<String>,
    insecure_cidrs: Vec<IpNet>,
    index_configs: BTreeMap<String, IndexInfo>,
    certificates: BTreeMap<String, CertificateBundle>,
    legacy_protocol: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(ServiceOptions::default())
    }
}

impl ServiceConfig {
    /// Build a configuration from options, without reading the certificates directory.
    ///
    /// Loopback (`127.0.0.0/8`) is always insecure.
    pub fn new(options: ServiceOptions) -> Self {
        let loopback = IpNet::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8)
            .expect("8 is a valid IPv4 prefix length");
        let mut insecure_cidrs = vec![loopback];
        let mut index_configs = BTreeMap::new();

        for registry in options.insecure_registries {
            match registry.parse::<IpNet>() {
                Ok(cidr) => {
                    if !insecure_cidrs.contains(&cidr) {
                        insecure_cidrs.push(cidr);
                    }
                }
                Err(_) => {
                    index_configs.insert(
                        registry.clone(),
                        IndexInfo {
                            name: registry,
                            mirrors: Vec::new(),
                            secure: false,
                            official: false,
                        },
                    );
                }
            }
        }

        index_configs.insert(
            INDEX_NAME.to_owned(),
            IndexInfo {
                name: INDEX_NAME.to_owned(),
                mirrors: options.mirrors.clone(),
                secure: true,
                official: true,
            },
        );

        Self {
            mirrors: options.mirrors,
            insecure_cidrs,
            index_configs,
            certificates: BTreeMap::new(),
            legacy_protocol: options.legacy_protocol,
        }
    }

    /// Build a configuration and load certificates from `options.certs_dir`.
    pub fn from_options(options: ServiceOptions) -> Result<Self, ConfigError> {
        let certs_dir = options.certs_dir.clone();
        let config = Self::new(options);
        match certs_dir {
            Some(dir) => config.with_certificates_dir(&dir),
            None => Ok(config),
        }
    }

    /// Read a TOML options file and build a configuration from it.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        Self::from_options(ServiceOptions::from_file(path)?)
    }

    /// Enroll every host directory under `certs_dir`
    pub fn with_certificates_dir(mut self, certs_dir: &Utf8Path) -> Result<Self, ConfigError> {
        self.certificates.extend(CertificateBundle::load_all(certs_dir)?);
        Ok(self)
    }

    /// Enroll a bundle for exactly `hostname`
    pub fn with_certificates(
        mut self,
        hostname: impl Into<String>,
        bundle: CertificateBundle,
    ) -> Self {
        self.certificates.insert(hostname.into(), bundle);
        self
    }

    /// Set whether the legacy v1 protocol is offered for the canonical registry
    pub fn with_legacy_protocol(mut self, supported: bool) -> Self {
        self.legacy_protocol = supported;
        self
    }

    /// Describe the index called `name`.
    ///
    /// `index.docker.io` is an alias of the official index.
    pub fn index_info(&self, name: &str) -> ResolveResult<IndexInfo> {
        let name = validate_index_name(name)?;
        if let Some(index) = self.index_configs.get(name) {
            return Ok(index.clone());
        }

        Ok(IndexInfo {
            name: name.to_owned(),
            mirrors: Vec::new(),
            secure: self.is_secure(name),
            official: false,
        })
    }
}

impl RegistryConfig for ServiceConfig {
    fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    fn is_secure(&self, hostname: &str) -> bool {
        if let Some(index) = self.index_configs.get(hostname) {
            return index.secure;
        }

        // Only literal addresses are classified; no DNS lookups happen here.
        let host = strip_port(hostname);
        let addresses = if host.eq_ignore_ascii_case("localhost") {
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)]
        } else if let Ok(address) = host.parse::<IpAddr>() {
            vec![address]
        } else {
            return true;
        };

        !addresses
            .iter()
            .any(|address| self.insecure_cidrs.iter().any(|cidr| cidr.contains(address)))
    }

    fn certificate_bundle(&self, hostname: &str) -> Option<&CertificateBundle> {
        self.certificates.get(hostname)
    }

    fn legacy_protocol_supported(&self) -> bool {
        self.legacy_protocol
    }
}

fn validate_index_name(name: &str) -> ResolveResult<&str> {
    let name = if name == LEGACY_INDEX_NAME {
        INDEX_NAME
    } else {
        name
    };

    if name.is_empty() || name.starts_with('-') || name.ends_with('-') {
        return Err(ResolveError::InvalidIndexName(name.to_owned()));
    }
    Ok(name)
}

/// Strip a trailing `:port`, and the brackets of an IPv6 literal.
fn strip_port(hostname: &str) -> &str {
    if let Some(rest) = hostname.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }

    if hostname.parse::<IpAddr>().is_ok() {
        return hostname;
    }

    match hostname.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => hostname,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn config(insecure: &[&str]) -> ServiceConfig {
        ServiceConfig::new(ServiceOptions {
            insecure_registries: insecure.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn strip_ports() {
        assert_eq!(strip_port("registry.example.com"), "registry.example.com");
        assert_eq!(strip_port("registry.example.com:5000"), "registry.example.com");
        assert_eq!(strip_port("10.1.2.3:5000"), "10.1.2.3");
        assert_eq!(strip_port("[::1]:5000"), "::1");
        assert_eq!(strip_port("::1"), "::1");
    }

    #[test]
    fn classification() {
        let config = config(&["10.0.0.0/8", "registry.local:5000"]);

        assert!(config.is_secure("registry.example.com"));
        assert!(config.is_secure("192.168.1.10:5000"));
        assert!(config.is_secure("[::1]:5000"));
        assert!(config.is_secure("registry.local"));

        assert!(!config.is_secure("registry.local:5000"));
        assert!(!config.is_secure("10.20.30.40"));
        assert!(!config.is_secure("10.20.30.40:5000"));
        assert!(!config.is_secure("127.0.0.1"));
        assert!(!config.is_secure("localhost:5000"));
    }

    #[test]
    fn official_index_stays_secure() {
        let config = config(&[]);
        assert!(config.is_secure(INDEX_NAME));
    }

    #[test]
    fn index_info() {
        let config = ServiceConfig::new(ServiceOptions {
            mirrors: vec!["https://mirror.example.com".into()],
            insecure_registries: vec!["registry.local:5000".into()],
            ..Default::default()
        });

        let official = config.index_info(LEGACY_INDEX_NAME).unwrap();
        assert_eq!(official.name, INDEX_NAME);
        assert!(official.official);
        assert!(official.secure);
        assert_eq!(official.mirrors, vec!["https://mirror.example.com"]);

        let local = config.index_info("registry.local:5000").unwrap();
        assert!(!local.secure);
        assert!(!local.official);

        let other = config.index_info("127.0.0.1:5000").unwrap();
        assert!(!other.secure);
        assert!(other.mirrors.is_empty());

        assert!(matches!(
            config.index_info("-bad.example.com").unwrap_err(),
            ResolveError::InvalidIndexName(_)
        ));
    }

    #[test]
    fn options_from_toml() {
        let options = ServiceOptions::from_toml(indoc! {r#"
            mirrors = ["https://mirror.example.com"]
            insecure-registries = ["10.0.0.0/8", "registry.local:5000"]
            certs-dir = "/etc/registry/certs.d"
            legacy-protocol = false
        "#})
        .unwrap();

        assert_eq!(options.mirrors, vec!["https://mirror.example.com"]);
        assert_eq!(options.insecure_registries.len(), 2);
        assert_eq!(
            options.certs_dir.as_deref(),
            Some(Utf8Path::new("/etc/registry/certs.d"))
        );
        assert!(!options.legacy_protocol);
    }

    #[test]
    fn options_defaults() {
        let options = ServiceOptions::from_toml("").unwrap();
        assert!(options.mirrors.is_empty());
        assert!(options.certs_dir.is_none());
        assert_eq!(options.legacy_protocol, cfg!(target_os = "linux"));
    }

    #[test]
    fn options_reject_unknown_types() {
        assert!(ServiceOptions::from_toml("mirrors = 5").is_err());
    }
}
