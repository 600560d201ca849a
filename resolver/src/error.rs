//! Error types for endpoint and trust resolution

use camino::Utf8PathBuf;

/// Categorizes resolution errors by how a caller should treat them.
///
/// Both kinds are hard failures of the pull or push operation: the caller
/// cannot determine where to connect. They are distinct from per-endpoint
/// connection failures, which fall through to the next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The repository reference or hostname supplied by the caller is malformed.
    ///
    /// **Retryable:** No - the input itself is invalid.
    InvalidInput,

    /// The registry configuration is faulty (bad mirror URL, unreadable or
    /// malformed certificate material).
    ///
    /// **Retryable:** No - until the configuration is fixed.
    Configuration,
}

/// Result of endpoint or trust resolution
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while resolving endpoints or transport trust.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Repository name has no host segment, or the host segment is not a valid authority
    #[error("invalid repository name, expected host/name: {0}")]
    InvalidRepositoryName(String),

    /// Index name is empty, or begins or ends with a hyphen
    #[error("invalid index name: {0}")]
    InvalidIndexName(String),

    /// Trust was requested for an empty hostname
    #[error("hostname must not be empty")]
    EmptyHostname,

    /// A configured mirror is not a valid URL
    #[error("invalid mirror URL {mirror:?}")]
    MirrorUrl {
        /// The mirror as configured
        mirror: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// A configured mirror URL has no host to derive trust from
    #[error("mirror URL has no host: {0}")]
    MirrorHost(String),

    /// Certificate material registered for a host could not be used
    #[error("certificate material for {hostname}")]
    Certificate {
        /// Host the bundle is registered for
        hostname: String,
        /// Underlying certificate error
        #[source]
        source: CertificateError,
    },
}

impl ResolveError {
    /// The taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::InvalidRepositoryName(_)
            | ResolveError::InvalidIndexName(_)
            | ResolveError::EmptyHostname => ErrorKind::InvalidInput,
            ResolveError::MirrorUrl { .. }
            | ResolveError::MirrorHost(_)
            | ResolveError::Certificate { .. } => ErrorKind::Configuration,
        }
    }
}

/// A single certificate or key file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// PEM decoding failed
    #[error("{file}: {source}")]
    Pem {
        /// File the material was read from
        file: String,
        /// Decoder error
        #[source]
        source: rustls_pki_types::pem::Error,
    },

    /// The file decoded, but holds no certificate
    #[error("{0}: no certificates found")]
    Empty(String),
}

/// Errors raised while building a [`crate::ServiceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading configuration or certificate files
    #[error("reading {path}")]
    Io {
        /// Path that failed
        path: Utf8PathBuf,
        /// IO error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::ServiceOptions`]
    #[error("parsing configuration")]
    Parse(#[from] toml_edit::de::Error),

    /// A client certificate has no matching key, or a key has no certificate
    #[error("missing {missing} for {path}")]
    UnpairedClientFile {
        /// File that was found
        path: Utf8PathBuf,
        /// The expected companion file
        missing: Utf8PathBuf,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        move |source| ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
