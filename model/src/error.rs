use snafu::Snafu;

#[derive(Debug, Snafu)]
pub struct Error(OpaqueError);
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum OpaqueError {
    #[snafu(display("Error converting {} '{}' to a dynamic object: {}", kind, name, source))]
    ToDynamic {
        kind: String,
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Error serializing {} '{}' to YAML: {}", kind, name, source))]
    ToYaml {
        kind: String,
        name: String,
        source: serde_yaml::Error,
    },
}
