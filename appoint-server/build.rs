fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Let a packaging environment pin the reported version
    println!("cargo:rerun-if-env-changed=APPOINT_GIT_HASH");
    if let Ok(hash) = std::env::var("APPOINT_GIT_HASH") {
        println!("cargo:rustc-env=APPOINT_GIT_HASH={}", hash);
    }
}
