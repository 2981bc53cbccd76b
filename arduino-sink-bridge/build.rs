fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Server stubs are only used by the integration tests' in-process sink.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/well.proto"], &["proto/"])?;
    Ok(())
}
