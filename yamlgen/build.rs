/*!

The custom resource definitions are modeled as Rust structs in the model crate. Here we generate
the corresponding k8s yaml file. It is needed when setting up a management cluster. Crates that
depend on it can add yamlgen as a build dependency to ensure the file is current. Scripts can call
`cargo build --package yamlgen`.

!*/

use kube::CustomResourceExt;
use model::{
    CloudStackDatacenterConfig, CloudStackMachineConfig, Cluster, DockerDatacenterConfig,
    VSphereDatacenterConfig, VSphereMachineConfig,
};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

const YAMLGEN_DIR: &str = env!("CARGO_MANIFEST_DIR");
const HEADER: &str = "# This file is generated. Do not edit.\n";

fn main() {
    // Re-run this build script if the model changes.
    println!("cargo:rerun-if-changed=../model/src");

    let dir = PathBuf::from(YAMLGEN_DIR).join("deploy");
    std::fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("unable to create '{}': {}", dir.display(), e));
    let path = dir.join("cluster-crds.yaml");

    let mut f = File::create(&path)
        .unwrap_or_else(|e| panic!("unable to open '{}' for writing: {}", path.display(), e));

    f.write_all(HEADER.as_bytes())
        .expect("unable to write file header");
    let crds = [
        ("Cluster", Cluster::crd()),
        ("DockerDatacenterConfig", DockerDatacenterConfig::crd()),
        ("VSphereDatacenterConfig", VSphereDatacenterConfig::crd()),
        ("VSphereMachineConfig", VSphereMachineConfig::crd()),
        ("CloudStackDatacenterConfig", CloudStackDatacenterConfig::crd()),
        ("CloudStackMachineConfig", CloudStackMachineConfig::crd()),
    ];
    for (kind, crd) in crds {
        serde_yaml::to_writer(&f, &crd)
            .unwrap_or_else(|e| panic!("unable to write {} CRD: {}", kind, e));
    }
}
