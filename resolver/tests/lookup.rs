//! Integration tests for endpoint and trust resolution

use std::sync::Arc;

use camino::Utf8PathBuf;
use registry_resolver::{
    ApiVersion, DEFAULT_V1_REGISTRY, DEFAULT_V2_REGISTRY, EndpointCandidate, ErrorKind,
    ResolveError, Service, ServiceConfig, ServiceOptions, TrustPolicy,
};

const MIRRORS: &[&str] = &[
    "https://mirror-a.example.com",
    "https://mirror-b.example.com:8443",
    "http://10.1.2.3:5000",
];

/// Helper to create a service with mirrors and an insecure network
fn test_service(mirrors: &[&str], legacy: bool) -> Service {
    let options = ServiceOptions {
        mirrors: mirrors.iter().map(|m| m.to_string()).collect(),
        insecure_registries: vec!["10.0.0.0/8".into(), "registry.local:5000".into()],
        certs_dir: None,
        legacy_protocol: legacy,
    };
    Service::new(ServiceConfig::new(options))
}

fn summary(endpoints: &[EndpointCandidate]) -> Vec<String> {
    endpoints
        .iter()
        .map(|e| format!("{} {}", e.version(), e.url()))
        .collect()
}

fn base(url: &str) -> String {
    format!("{url}/")
}

#[test]
fn test_mirrors_lead_pull_endpoints() {
    let service = test_service(MIRRORS, true);

    for name in ["library/ubuntu", "registry.example.com/app", "registry.local:5000/app"] {
        let endpoints = service.lookup_pull_endpoints(name).unwrap();
        let (mirrors, rest) = endpoints.split_at(MIRRORS.len());

        for (endpoint, mirror) in mirrors.iter().zip(MIRRORS) {
            assert_eq!(endpoint.url().as_str(), base(mirror));
            assert_eq!(endpoint.version(), ApiVersion::V2);
            assert!(endpoint.is_mirror());
            assert!(endpoint.trim_hostname());
        }
        assert!(rest.iter().all(|e| !e.is_mirror()));
    }

    let endpoints = service.lookup_pull_endpoints("library/ubuntu").unwrap();
    assert!(endpoints[0].trust().is_secure());
    assert!(endpoints[1].trust().is_secure());
    assert!(!endpoints[2].trust().is_secure());
}

#[test]
fn test_push_is_pull_without_mirrors() {
    let service = test_service(MIRRORS, true);

    for name in ["library/ubuntu", "registry.example.com/app", "registry.local:5000/app"] {
        let pull = service.lookup_pull_endpoints(name).unwrap();
        let push = service.lookup_push_endpoints(name).unwrap();

        let expected: Vec<_> = pull.into_iter().filter(|e| !e.is_mirror()).collect();
        assert_eq!(push, expected);
    }
}

#[test]
fn test_official_endpoints() {
    for legacy in [true, false] {
        let service = test_service(MIRRORS, legacy);
        let endpoints = service.lookup_pull_endpoints("library/busybox").unwrap();
        let official = &endpoints[MIRRORS.len()..];

        let mut expected = vec![format!("v2 {}", base(DEFAULT_V2_REGISTRY))];
        if legacy {
            expected.push(format!("v1 {}", base(DEFAULT_V1_REGISTRY)));
        }
        assert_eq!(summary(official), expected);
        assert!(official.iter().all(|e| e.is_official()));
        assert!(
            official
                .iter()
                .all(|e| **e.trust() == TrustPolicy::server_default())
        );
    }
}

#[test]
fn test_secure_registry() {
    let service = test_service(&[], true);
    let endpoints = service
        .lookup_pull_endpoints("registry.example.com/team/app")
        .unwrap();

    assert_eq!(
        summary(&endpoints),
        vec![
            "v2 https://registry.example.com/",
            "v1 https://registry.example.com/",
        ]
    );
    assert!(endpoints.iter().all(|e| e.url().scheme() == "https"));
    assert!(endpoints.iter().all(|e| !e.is_official()));
}

#[test]
fn test_insecure_registry() {
    let service = test_service(&[], true);

    for (name, host) in [
        ("registry.local:5000/app", "registry.local:5000"),
        ("10.20.30.40:5000/team/app", "10.20.30.40:5000"),
        ("localhost:5000/app", "localhost:5000"),
    ] {
        let endpoints = service.lookup_pull_endpoints(name).unwrap();
        assert_eq!(
            summary(&endpoints),
            vec![
                format!("v2 https://{host}/"),
                format!("v1 https://{host}/"),
                format!("v2 http://{host}/"),
                format!("v1 http://{host}/"),
            ]
        );

        let trust = endpoints[0].trust();
        assert!(trust.insecure_skip_verify());
        assert!(endpoints.iter().all(|e| Arc::ptr_eq(e.trust(), trust)));
        assert!(endpoints[0].version_header().is_some());
        assert!(endpoints[2].version_header().is_some());
    }
}

#[test]
fn test_invalid_repository_names() {
    let service = test_service(MIRRORS, true);

    for name in ["noSlashHere", "/leadingslash"] {
        let err = service.lookup_pull_endpoints(name).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRepositoryName(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert!(service.lookup_push_endpoints(name).is_err());
    }
}

#[test]
fn test_bad_mirror_fails_whole_lookup() {
    let service = test_service(&["https://mirror.example.com", "not a url"], true);

    let err = service.lookup_pull_endpoints("library/ubuntu").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // Pushes never use mirrors, but a bad mirror is still a configuration fault.
    assert!(service.lookup_push_endpoints("library/ubuntu").is_err());
}

#[test]
fn test_lookups_are_idempotent() {
    let service = test_service(MIRRORS, true);
    for name in ["library/ubuntu", "registry.example.com/app", "registry.local:5000/app"] {
        assert_eq!(
            service.lookup_pull_endpoints(name).unwrap(),
            service.lookup_pull_endpoints(name).unwrap()
        );
    }
}

#[test]
fn test_config_file_with_certificates() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

    let ca = rcgen::generate_simple_self_signed(vec!["private.example.com".to_owned()]).unwrap();
    let certs_dir = root.join("certs.d");
    std::fs::create_dir_all(certs_dir.join("private.example.com")).unwrap();
    std::fs::write(
        certs_dir.join("private.example.com").join("ca.crt"),
        ca.cert.pem(),
    )
    .unwrap();

    std::fs::create_dir_all(certs_dir.join("broken.example.com")).unwrap();
    std::fs::write(
        certs_dir.join("broken.example.com").join("ca.crt"),
        "this is not PEM",
    )
    .unwrap();

    let config_path = root.join("registry.toml");
    std::fs::write(
        &config_path,
        format!(
            "mirrors = [\"https://mirror.example.com\"]\n\
             insecure-registries = [\"registry.local:5000\"]\n\
             certs-dir = \"{certs_dir}\"\n\
             legacy-protocol = false\n"
        ),
    )
    .unwrap();

    let service = Service::new(ServiceConfig::from_file(&config_path).unwrap());

    let trust = service.resolve_trust("private.example.com").unwrap();
    let verified = trust.verified().expect("enrolled host verifies");
    assert_eq!(verified.roots().len(), 1);

    let endpoints = service
        .lookup_push_endpoints("private.example.com/app")
        .unwrap();
    assert_eq!(endpoints.len(), 2);
    assert!(endpoints.iter().all(|e| Arc::ptr_eq(e.trust(), endpoints[0].trust())));
    assert_eq!(endpoints[0].trust().verified().unwrap().roots().len(), 1);

    let err = service
        .lookup_pull_endpoints("broken.example.com/app")
        .unwrap_err();
    assert!(matches!(err, ResolveError::Certificate { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let official = service.lookup_pull_endpoints("library/ubuntu").unwrap();
    assert_eq!(
        summary(&official),
        vec![
            "v2 https://mirror.example.com/".to_owned(),
            format!("v2 {}", base(DEFAULT_V2_REGISTRY)),
        ]
    );
}

#[test]
fn test_resolve_trust_rejects_empty_hostname() {
    let service = test_service(&[], true);
    let err = service.resolve_trust("").unwrap_err();
    assert!(matches!(err, ResolveError::EmptyHostname));
}
