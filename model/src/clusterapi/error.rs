use snafu::Snafu;

/// The `Result` type returned by `clusterapi`.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by `clusterapi`.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub(crate) enum InnerError {
    #[snafu(display("registering {} mappings: {}", what, source))]
    RegisterMappings {
        what: &'static str,
        source: crate::yaml::Error,
    },

    #[snafu(display("invalid format of name [{}]", name))]
    InvalidName { name: String },

    #[snafu(display("reading {} {}/{} from API: {}", kind, namespace, name, source))]
    ReadObject {
        kind: String,
        namespace: String,
        name: String,
        source: crate::clients::Error,
    },

    #[snafu(display("incrementing name for {} {}/{}: {}", kind, namespace, name, source))]
    IncrementName {
        kind: String,
        namespace: String,
        name: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("reading current {} from API: {}", what, source))]
    ReadCurrent {
        what: &'static str,
        source: crate::clients::Error,
    },

    #[snafu(display("updating {} name: {}", what, source))]
    UpdateName {
        what: &'static str,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}
