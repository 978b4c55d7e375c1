use snafu::Snafu;

/// The `Result` type returned by the YAML parser.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by the YAML parser.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub(crate) enum InnerError {
    #[snafu(display("duplicate mapping for kind '{}'", kind))]
    DuplicateMapping { kind: String },

    #[snafu(display("invalid yaml document {}: {}", index, source))]
    Yaml {
        index: usize,
        source: serde_yaml::Error,
    },

    #[snafu(display("yaml document {} is not a kubernetes object: {}", index, source))]
    Envelope {
        index: usize,
        source: serde_yaml::Error,
    },

    #[snafu(display("yaml document {} is missing '{}'", index, field))]
    MissingField { index: usize, field: &'static str },

    #[snafu(display("unable to decode {} '{}': {}", kind, name, source))]
    Decode {
        kind: String,
        name: String,
        source: serde_yaml::Error,
    },

    #[snafu(display(
        "the mapping for kind '{}' produced a '{}' when decoding '{}'",
        expected,
        actual,
        name
    ))]
    KindMismatch {
        expected: String,
        actual: String,
        name: String,
    },

    #[snafu(display("yaml document {} could not be converted to an object: {}", index, source))]
    Unstructured {
        index: usize,
        source: serde_yaml::Error,
    },
}
