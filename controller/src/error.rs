use eviction_autoscaler_types::error::Error as TypesError;

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to create client: '{}'", source))]
    ClientCreate { source: kube::Error },

    #[snafu(display("Error configuring tracing: '{}'", source))]
    TracingConfiguration {
        source: eviction_autoscaler_types::telemetry::TelemetryConfigError,
    },

    #[snafu(display("Missing required environment variable '{}': '{}'", variable, source))]
    MissingEnvVar {
        variable: String,
        source: std::env::VarError,
    },

    #[snafu(display("Invalid value for environment variable '{}': '{}'", variable, value))]
    InvalidEnvVar { variable: String, value: String },

    #[snafu(display("Error running HTTP server: '{}'", source))]
    HttpServerError { source: std::io::Error },

    #[snafu(display("Kubernetes API error: '{}'", source))]
    KubeApi { source: kube::Error },

    #[snafu(display("Domain type error: '{}'", source))]
    Types { source: TypesError },

    #[snafu(display("Failed to acquire or renew leader election lease: '{}'", source))]
    LeaderElection { source: kube::Error },

    #[snafu(display("PDB '{}' has no matching pods (leaky PDB)", pdb))]
    LeakyPdb { pdb: String },

    #[snafu(display("PDB '{}' covers pods with no resolvable Deployment or StatefulSet owner", pdb))]
    OwnerNotFound { pdb: String },

    #[snafu(display("Error configuring Prometheus metrics exporter: '{}'", source))]
    MetricsExporter { source: opentelemetry::metrics::MetricsError },
}
