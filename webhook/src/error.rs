use actix_web::error::ResponseError;
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

    #[snafu(display("Error running HTTP server: '{}'", source))]
    HttpServerError { source: std::io::Error },

    #[snafu(display("Error loading TLS materials: '{}'", source))]
    TlsConfig { source: std::io::Error },

    #[snafu(display("Missing TLS private key at '{}'", path))]
    TlsMissingKey { path: String },

    #[snafu(display("Invalid TLS certificate or key material: '{}'", source))]
    TlsMaterial { source: rustls::Error },

    #[snafu(display("Kubernetes API error: '{}'", source))]
    KubeApi { source: kube::Error },

    #[snafu(display("Domain type error: '{}'", source))]
    Types { source: TypesError },

    #[snafu(display("Error configuring Prometheus metrics exporter: '{}'", source))]
    MetricsExporter { source: opentelemetry::metrics::MetricsError },

    #[snafu(display("Admission review request carried no object"))]
    MissingAdmissionObject,

    #[snafu(display("Failed to decode admission review object: '{}'", source))]
    AdmissionObjectDecode { source: serde_json::Error },
}

impl ResponseError for Error {}
