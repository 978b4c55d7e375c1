/*!

This crate is used to write out the YAML representation of the cluster and provider config CRDs.
They are defined in Rust in the `model` crate, and the YAML is what gets installed in a
management cluster before the controller is started.

This `lib.rs` file is intentionally empty as `yamlgen` provides a `build.rs` that is invoked during
builds of other crates that specify `yamlgen` as a `build-dependency`.

!*/
