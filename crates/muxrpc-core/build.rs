/// Builds the gRPC client and server code for the `testservice.proto`
/// definition using `tonic-prost-build`.
///
/// The Protocol Buffer definitions in the `proto` directory are compiled into
/// Rust modules with gRPC bindings inside the crate's `OUT_DIR`. An encoded
/// file descriptor set is written next to them so the server can expose gRPC
/// reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/testservice.proto`
/// - Includes: `proto/`
/// - Descriptor: `$OUT_DIR/testservice_descriptor.bin`
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or if code generation fails.
///
/// # Output
///
/// Generated code is accessible in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("testservice");
/// }
/// ```
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("testservice_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/testservice.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/testservice.proto"], &["proto"])
        .unwrap();
}
