fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Builds must not depend on a system protoc.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    println!("cargo:rerun-if-changed=proto/realworld.proto");
    tonic_build::compile_protos("proto/realworld.proto")?;
    Ok(())
}
