/*!

This [controller] runs in a management cluster and drives each workload `Cluster` to its desired
state. It generates the Cluster API objects of the cluster's infrastructure provider, waits for
CAPI to bring up the control plane, installs the CNI, then brings up the workers.

[controller]: https://kubernetes.io/docs/concepts/architecture/controller/

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

use crate::cluster_controller::run_cluster_controller;
use crate::config::ControllerConfig;
use env_logger::Builder;
use kube::Client;
use log::{error, info, LevelFilter};

mod cluster_controller;
mod config;
mod constants;
mod error;

#[tokio::main]
async fn main() {
    init_logger();
    info!("Starting");

    let config = match ControllerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize the k8s client from in-cluster variables or KUBECONFIG.
    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to create k8s client: {}", e);
            std::process::exit(1);
        }
    };

    run_cluster_controller(client, config).await;
}

/// The log level used when the `RUST_LOG` environment variable does not exist.
const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Extract the value of `RUST_LOG` if it exists, otherwise log this crate at
/// `DEFAULT_LEVEL_FILTER`.
fn init_logger() {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), DEFAULT_LEVEL_FILTER)
                .filter(Some("model"), DEFAULT_LEVEL_FILTER)
                .init();
        }
    }
}
