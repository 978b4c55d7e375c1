use snafu::Snafu;

/// The `Result` type returned by `providers`.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by `providers`.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub(crate) enum InnerError {
    #[snafu(display("no provider for datacenter kind '{}'", kind))]
    UnsupportedDatacenter { kind: String },

    #[snafu(display("reading {} '{}': {}", kind, name, source))]
    ReadConfig {
        kind: String,
        name: String,
        source: crate::clients::Error,
    },

    #[snafu(display("{} '{}' not found in namespace '{}'", kind, name, namespace))]
    MissingConfig {
        kind: String,
        name: String,
        namespace: String,
    },

    #[snafu(display("{} has no machine group reference", what))]
    MissingMachineGroupRef { what: String },

    #[snafu(display("generating {} YAML: {}", what, source))]
    Generate {
        what: &'static str,
        source: crate::Error,
    },

    #[snafu(display("creating {} parser: {}", what, source))]
    CreateParser {
        what: &'static str,
        source: crate::clusterapi::Error,
    },

    #[snafu(display("parsing {} YAML: {}", what, source))]
    Parse {
        what: &'static str,
        source: crate::yaml::Error,
    },

    #[snafu(display("updating {} object names: {}", what, source))]
    UpdateNames {
        what: &'static str,
        source: crate::clusterapi::Error,
    },
}
