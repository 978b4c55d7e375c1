use snafu::Snafu;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display(
        "Multiple errors during reconciliation of '{}': {}",
        name,
        display_all(errors)
    ))]
    Aggregate { name: String, errors: Vec<Error> },

    #[snafu(display(
        "Expected one {} for cluster '{}' but found {}",
        kind,
        cluster_name,
        count
    ))]
    Ambiguous {
        kind: String,
        cluster_name: String,
        count: usize,
    },

    #[snafu(display("Unable to apply {} '{}': {}", kind, name, source))]
    Apply {
        kind: String,
        name: String,
        source: model::clients::Error,
    },

    #[snafu(display("Unable to read the controller configuration: {}", source))]
    Config { source: envy::Error },

    #[snafu(display("Unable to convert {} '{}': {}", kind, name, source))]
    Convert {
        kind: String,
        name: String,
        source: model::Error,
    },

    #[snafu(display("Unable to create {} '{}': {}", kind, name, source))]
    Create {
        kind: String,
        name: String,
        source: model::clients::Error,
    },

    #[snafu(display("Unable to delete {} '{}': {}", kind, name, source))]
    Delete {
        kind: String,
        name: String,
        source: model::clients::Error,
    },

    #[snafu(display("Unable to generate {} objects for cluster '{}': {}", what, name, source))]
    Generate {
        what: &'static str,
        name: String,
        source: model::providers::Error,
    },

    #[snafu(display("Kubeconfig secret '{}' has no '{}' key", secret, key))]
    KubeconfigMissing { secret: String, key: String },

    #[snafu(display("Kubeconfig secret '{}' not found in namespace '{}'", secret, namespace))]
    KubeconfigSecretMissing { secret: String, namespace: String },

    #[snafu(display("Unable to parse the kubeconfig of cluster '{}': {}", name, source))]
    KubeconfigParse {
        name: String,
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to create a client for cluster '{}': {}", name, source))]
    KubeClient { name: String, source: kube::Error },

    #[snafu(display("Unable to read manifest '{}': {}", path, source))]
    ManifestRead {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse manifest '{}': {}", path, source))]
    ManifestParse {
        path: String,
        source: model::yaml::Error,
    },

    #[snafu(display("Reconciliation of cluster '{}' panicked", name))]
    Panicked { name: String },

    #[snafu(display("Unable to patch cluster '{}': {}", name, source))]
    Patch {
        name: String,
        source: model::clients::Error,
    },

    #[snafu(display("Unable to read {} for cluster '{}': {}", what, name, source))]
    Read {
        what: String,
        name: String,
        source: model::clients::Error,
    },

    #[snafu(display("{}", source))]
    UnsupportedProvider { source: model::providers::Error },
}

fn display_all(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Combines the outcome of a reconciliation with the outcome of the step that always runs after
/// it. Neither error is dropped.
pub(crate) fn aggregate<T>(name: &str, outcome: Result<T>, after: Result<()>) -> Result<T> {
    match (outcome, after) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(e)) => Err(e),
        (Err(first), Err(second)) => AggregateSnafu {
            name,
            errors: vec![first, second],
        }
        .fail(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn panicked(name: &str) -> Error {
        Error::Panicked {
            name: name.to_string(),
        }
    }

    #[test]
    fn aggregate_keeps_both_errors() {
        let combined = aggregate::<()>("c", Err(panicked("a")), Err(panicked("b"))).unwrap_err();
        assert_eq!(
            combined.to_string(),
            "Multiple errors during reconciliation of 'c': Reconciliation of cluster 'a' panicked; \
             Reconciliation of cluster 'b' panicked"
        );
        assert!(matches!(
            aggregate::<()>("c", Ok(()), Err(panicked("b"))),
            Err(Error::Panicked { .. })
        ));
        assert!(matches!(
            aggregate::<()>("c", Err(panicked("a")), Ok(())),
            Err(Error::Panicked { .. })
        ));
        assert_eq!(aggregate("c", Ok(5), Ok(())).unwrap(), 5);
    }
}
