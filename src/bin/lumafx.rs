//! lumafx CLI
//!
//! Applies image filters to files or serves them over HTTP, with the learned
//! operators running on ONNX Runtime or Tract.

#[cfg(feature = "cli")]
use lumafx::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("lumafx was built without the \"cli\" feature; rebuild with --features cli");
    std::process::exit(2);
}
