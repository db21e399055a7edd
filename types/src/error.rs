use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Could not parse boolean annotation value: '{}'", value))]
    InvalidBoolAnnotation { value: String },

    #[snafu(display("Could not parse surge replica annotation value: '{}'", value))]
    InvalidSurgeAnnotation { value: String },

    #[snafu(display("Object '{}' is missing a namespace", name))]
    MissingNamespace { name: String },

    #[snafu(display("Object '{}' is missing an owner reference", name))]
    MissingOwnerReference { name: String },

    #[snafu(display("Unsupported target kind: '{}'", kind))]
    UnsupportedTargetKind { kind: String },

    #[snafu(display("Target '{}' has no pod template selector", name))]
    MissingSelector { name: String },

    #[snafu(display("Could not parse eviction timestamp: '{}'", value))]
    InvalidEvictionTimestamp { value: String },
}
