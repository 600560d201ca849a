//! Print the endpoints a client would try for a repository.
//!
//! ```text
//! registry-endpoints --config registry.toml pull registry.local:5000/team/app
//! ```

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use eyre::WrapErr as _;
use registry_resolver::{
    DEFAULT_CERTS_DIR, EndpointCandidate, Service, ServiceConfig, ServiceOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Resolve registry endpoints and transport trust")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "REGISTRY_RESOLVER_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Certificates directory, overriding the configuration file
    #[arg(long)]
    certs_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Endpoints to pull a repository from
    Pull {
        /// Repository name, e.g. `library/ubuntu` or `registry.local:5000/app`
        repository: String,
    },

    /// Endpoints to push a repository to
    Push {
        /// Repository name
        repository: String,
    },

    /// Transport trust for a host
    Trust {
        /// `host[:port]`
        hostname: String,
    },

    /// Index metadata for a registry name
    Index {
        /// Index name, e.g. `docker.io`
        name: String,
    },
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => ServiceOptions::from_file(path)
            .wrap_err_with(|| format!("loading configuration from {path}"))?,
        None => ServiceOptions::default(),
    };
    if let Some(certs_dir) = args.certs_dir {
        options.certs_dir = Some(certs_dir);
    }
    options
        .certs_dir
        .get_or_insert_with(|| Utf8PathBuf::from(DEFAULT_CERTS_DIR));

    let config = ServiceConfig::from_options(options).wrap_err("building configuration")?;
    let service = Service::new(config);

    match args.command {
        Command::Pull { repository } => {
            let endpoints = service
                .lookup_pull_endpoints(&repository)
                .wrap_err_with(|| format!("resolving pull endpoints for {repository}"))?;
            print_endpoints(&endpoints);
        }
        Command::Push { repository } => {
            let endpoints = service
                .lookup_push_endpoints(&repository)
                .wrap_err_with(|| format!("resolving push endpoints for {repository}"))?;
            print_endpoints(&endpoints);
        }
        Command::Trust { hostname } => {
            let trust = service
                .resolve_trust(&hostname)
                .wrap_err_with(|| format!("resolving trust for {hostname}"))?;
            match trust.verified() {
                Some(verified) => println!(
                    "verify roots={} identities={}",
                    verified.roots().len(),
                    verified.identities().len()
                ),
                None => println!("skip-verify"),
            }
        }
        Command::Index { name } => {
            let index = service
                .resolve_index(&name)
                .wrap_err_with(|| format!("resolving index {name}"))?;
            println!(
                "{} secure={} official={} mirrors={}",
                index.name,
                index.secure,
                index.official,
                index.mirrors.join(",")
            );
        }
    }

    Ok(())
}

fn print_endpoints(endpoints: &[EndpointCandidate]) {
    for endpoint in endpoints {
        let mut flags = Vec::new();
        if endpoint.is_mirror() {
            flags.push("mirror");
        }
        if endpoint.is_official() {
            flags.push("official");
        }
        if endpoint.trust().insecure_skip_verify() {
            flags.push("skip-verify");
        }
        println!(
            "{}\t{}\t{}",
            endpoint.version(),
            endpoint.url(),
            flags.join(",")
        );
    }
}
