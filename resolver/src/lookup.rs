//! Endpoint resolution.
//!
//! Candidates come out in strict preference order: configured mirrors before
//! the registry itself, v2 before v1, HTTPS before plain HTTP. Plain HTTP is
//! only offered for hosts the configuration declares insecure.

use std::sync::Arc;

use url::Url;

use crate::config::RegistryConfig;
use crate::endpoint::{ApiVersion, ApiVersionDescriptor, EndpointCandidate};
use crate::error::{ResolveError, ResolveResult};
use crate::trust::{TrustPolicy, TrustResolver, literal_authority};
use crate::{
    DEFAULT_NAMESPACE, DEFAULT_V1_REGISTRY, DEFAULT_V2_REGISTRY, REGISTRY_VERSION_HEADER,
};

/// Computes endpoint candidates against one configuration snapshot.
#[derive(Debug)]
pub struct EndpointResolver<'c, C: ?Sized> {
    config: &'c C,
    trust: TrustResolver<'c, C>,
}

impl<'c, C> EndpointResolver<'c, C>
where
    C: RegistryConfig + ?Sized,
{
    /// Resolve against `config`
    pub fn new(config: &'c C) -> Self {
        Self {
            config,
            trust: TrustResolver::new(config),
        }
    }

    /// Endpoints to try when pulling `repo_name`, most preferred first.
    ///
    /// Either every candidate is returned, or an error: a failure part way
    /// through never yields a truncated list.
    pub fn pull_endpoints(&self, repo_name: &str) -> ResolveResult<Vec<EndpointCandidate>> {
        let mut endpoints = Vec::new();

        for mirror in self.config.mirrors() {
            let (url, trust) = self.trust.resolve_mirror(mirror)?;
            tracing::debug!(%url, "mirror endpoint");
            // Mirrors are assumed to speak v2.
            endpoints.push(EndpointCandidate::new(url, ApiVersion::V2, trust).mirror());
        }

        if is_official(repo_name) {
            self.official_endpoints(&mut endpoints);
            return Ok(endpoints);
        }

        let hostname = match repo_name.split_once('/') {
            Some((hostname, _)) if !hostname.is_empty() => hostname,
            _ => return Err(ResolveError::InvalidRepositoryName(repo_name.to_owned())),
        };
        let secure_url = host_url("https", hostname, repo_name)?;
        let trust = self.trust.resolve(hostname)?;
        let insecure = !trust.is_secure();

        tracing::debug!(url = %secure_url, "registry endpoint");
        self.host_endpoints(&mut endpoints, secure_url, &trust);

        if insecure {
            let plain_url = host_url("http", hostname, repo_name)?;
            tracing::debug!(url = %plain_url, "insecure registry endpoint");
            self.host_endpoints(&mut endpoints, plain_url, &trust);
        }

        Ok(endpoints)
    }

    /// Endpoints to try when pushing `repo_name`: the pull endpoints without mirrors.
    pub fn push_endpoints(&self, repo_name: &str) -> ResolveResult<Vec<EndpointCandidate>> {
        let mut endpoints = self.pull_endpoints(repo_name)?;
        endpoints.retain(|endpoint| !endpoint.is_mirror());
        Ok(endpoints)
    }

    fn official_endpoints(&self, endpoints: &mut Vec<EndpointCandidate>) {
        let trust = Arc::new(TrustPolicy::server_default());

        let v2 = Url::parse(DEFAULT_V2_REGISTRY).expect("default v2 registry is a valid URL");
        tracing::debug!(url = %v2, "official endpoint");
        endpoints.push(EndpointCandidate::new(v2, ApiVersion::V2, trust.clone()).official());

        if self.config.legacy_protocol_supported() {
            let v1 = Url::parse(DEFAULT_V1_REGISTRY).expect("default v1 registry is a valid URL");
            tracing::debug!(url = %v1, "official legacy endpoint");
            endpoints.push(EndpointCandidate::new(v1, ApiVersion::V1, trust).official());
        }
    }

    /// v2 then v1 at `url`, sharing one trust policy.
    fn host_endpoints(
        &self,
        endpoints: &mut Vec<EndpointCandidate>,
        url: Url,
        trust: &Arc<TrustPolicy>,
    ) {
        endpoints.push(
            EndpointCandidate::new(url.clone(), ApiVersion::V2, trust.clone()).negotiate(
                REGISTRY_VERSION_HEADER,
                vec![ApiVersionDescriptor::registry_v2()],
            ),
        );
        endpoints.push(EndpointCandidate::new(url, ApiVersion::V1, trust.clone()));
    }
}

/// Whether `repo_name` lives in the default (official) namespace
pub fn is_official(repo_name: &str) -> bool {
    repo_name
        .strip_prefix(DEFAULT_NAMESPACE)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// `scheme://hostname`, rejecting host segments that are not a bare authority.
///
/// The URL must name the same host trust is resolved for: a segment that URL
/// parsing would rewrite (stripped tabs or newlines, a normalized port) is
/// rejected rather than silently changed. Only ASCII case may differ.
fn host_url(scheme: &str, hostname: &str, repo_name: &str) -> ResolveResult<Url> {
    let invalid = || ResolveError::InvalidRepositoryName(repo_name.to_owned());
    let url = Url::parse(&format!("{scheme}://{hostname}")).map_err(|_| invalid())?;

    let bare = url.host_str().is_some_and(|host| !host.is_empty())
        && url.username().is_empty()
        && url.password().is_none()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && literal_authority(&url, hostname).eq_ignore_ascii_case(hostname);
    if !bare {
        return Err(invalid());
    }
    Ok(url)
}
