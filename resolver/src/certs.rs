//! Per-host certificate bundles.
//!
//! Registries behind a private CA are enrolled one host at a time, by placing
//! PEM files in a directory named after the host (including the port, when
//! the registry is addressed with one) under the certificates directory:
//!
//! ```text
//! certs.d/
//!   registry.example.com:5000/
//!     ca.crt          extra root certificate(s)
//!     client.cert     client certificate chain
//!     client.key      private key for client.cert
//! ```
//!
//! Files are read when configuration is built. Decoding happens during trust
//! resolution, so a malformed bundle only fails lookups for its own host.

use std::collections::BTreeMap;
use std::fmt;

use camino::Utf8Path;
use rustls_pki_types::pem::PemObject as _;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{CertificateError, ConfigError};

const ROOT_EXTENSION: &str = "crt";
const CLIENT_CERT_EXTENSION: &str = "cert";
const CLIENT_KEY_EXTENSION: &str = "key";

/// Raw PEM material enrolled for one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateBundle {
    roots: Vec<PemFile>,
    identities: Vec<ClientIdentityFiles>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PemFile {
    name: String,
    contents: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq)]
struct ClientIdentityFiles {
    certificate: PemFile,
    key: PemFile,
}

impl fmt::Debug for ClientIdentityFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentityFiles")
            .field("certificate", &self.certificate.name)
            .field("key", &self.key.name)
            .finish()
    }
}

/// A decoded client certificate chain and its private key.
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    /// Certificate chain, leaf first
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Private key for the leaf certificate
    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("chain", &self.chain.len())
            .field("key", &"****")
            .finish()
    }
}

impl PartialEq for ClientIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain && self.key.secret_der() == other.key.secret_der()
    }
}

impl Eq for ClientIdentity {}

impl CertificateBundle {
    /// An empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add PEM encoded root certificate(s), labelled `name` in error messages
    pub fn with_root(mut self, name: impl Into<String>, pem: impl Into<Vec<u8>>) -> Self {
        self.roots.push(PemFile {
            name: name.into(),
            contents: pem.into(),
        });
        self
    }

    /// Add a PEM encoded client certificate chain and private key
    pub fn with_client_identity(
        mut self,
        name: impl Into<String>,
        certificate: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
    ) -> Self {
        let name = name.into();
        self.identities.push(ClientIdentityFiles {
            certificate: PemFile {
                name: format!("{name}.{CLIENT_CERT_EXTENSION}"),
                contents: certificate.into(),
            },
            key: PemFile {
                name: format!("{name}.{CLIENT_KEY_EXTENSION}"),
                contents: key.into(),
            },
        });
        self
    }

    /// True when no material is enrolled
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.identities.is_empty()
    }

    /// Read the bundle for a single host directory.
    ///
    /// Files are visited in name order so that the decoded roots come out in
    /// a stable order. Files with other extensions are ignored.
    pub fn from_dir(dir: &Utf8Path) -> Result<Self, ConfigError> {
        let mut names = Vec::new();
        for entry in dir.read_dir_utf8().map_err(ConfigError::io(dir))? {
            let entry = entry.map_err(ConfigError::io(dir))?;
            let file_type = entry.file_type().map_err(ConfigError::io(entry.path()))?;
            if !file_type.is_dir() {
                names.push(entry.path().to_path_buf());
            }
        }
        names.sort();

        let mut bundle = CertificateBundle::new();
        for path in &names {
            match path.extension() {
                Some(ROOT_EXTENSION) => {
                    tracing::trace!(%path, "root certificate");
                    bundle.roots.push(read_pem(path)?);
                }
                Some(CLIENT_CERT_EXTENSION) => {
                    let key = path.with_extension(CLIENT_KEY_EXTENSION);
                    if !names.contains(&key) {
                        return Err(ConfigError::UnpairedClientFile {
                            path: path.clone(),
                            missing: key,
                        });
                    }
                    tracing::trace!(%path, "client certificate");
                    bundle.identities.push(ClientIdentityFiles {
                        certificate: read_pem(path)?,
                        key: read_pem(&key)?,
                    });
                }
                Some(CLIENT_KEY_EXTENSION) => {
                    let certificate = path.with_extension(CLIENT_CERT_EXTENSION);
                    if !names.contains(&certificate) {
                        return Err(ConfigError::UnpairedClientFile {
                            path: path.clone(),
                            missing: certificate,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(bundle)
    }

    /// Read every host directory under `certs_dir`, keyed by directory name.
    ///
    /// A missing `certs_dir` is not an error: no host is enrolled.
    pub fn load_all(certs_dir: &Utf8Path) -> Result<BTreeMap<String, Self>, ConfigError> {
        let mut bundles = BTreeMap::new();
        if !certs_dir.is_dir() {
            tracing::debug!(%certs_dir, "certificates directory not found");
            return Ok(bundles);
        }

        for entry in certs_dir
            .read_dir_utf8()
            .map_err(ConfigError::io(certs_dir))?
        {
            let entry = entry.map_err(ConfigError::io(certs_dir))?;
            let file_type = entry.file_type().map_err(ConfigError::io(entry.path()))?;
            if !file_type.is_dir() {
                continue;
            }

            let bundle = Self::from_dir(entry.path())?;
            if !bundle.is_empty() {
                tracing::debug!(host = entry.file_name(), "enrolled certificates");
                bundles.insert(entry.file_name().to_owned(), bundle);
            }
        }

        Ok(bundles)
    }

    /// Decode every enrolled root certificate
    pub(crate) fn decode_roots(&self) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
        let mut roots = Vec::new();
        for file in &self.roots {
            roots.extend(file.certificates()?);
        }
        Ok(roots)
    }

    /// Decode every enrolled client identity
    pub(crate) fn decode_identities(&self) -> Result<Vec<ClientIdentity>, CertificateError> {
        self.identities
            .iter()
            .map(|files| {
                let chain = files.certificate.certificates()?;
                let key = PrivateKeyDer::from_pem_slice(&files.key.contents).map_err(|source| {
                    CertificateError::Pem {
                        file: files.key.name.clone(),
                        source,
                    }
                })?;
                Ok(ClientIdentity { chain, key })
            })
            .collect()
    }
}

impl PemFile {
    fn certificates(&self) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
        let certificates = CertificateDer::pem_slice_iter(&self.contents)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CertificateError::Pem {
                file: self.name.clone(),
                source,
            })?;

        if certificates.is_empty() {
            return Err(CertificateError::Empty(self.name.clone()));
        }
        Ok(certificates)
    }
}

fn read_pem(path: &Utf8Path) -> Result<PemFile, ConfigError> {
    let contents = std::fs::read(path).map_err(ConfigError::io(path))?;
    Ok(PemFile {
        name: path
            .file_name()
            .map(str::to_owned)
            .unwrap_or_else(|| path.to_string()),
        contents,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rcgen::{CertifiedKey, generate_simple_self_signed};

    /// A self signed certificate and key in PEM form
    pub(crate) fn self_signed(host: &str) -> (String, String) {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec![host.to_owned()]).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }
}
