//! Build script for the site crate.
//!
//! Fingerprints the stylesheet and the comments script so templates can
//! append a content hash to their URLs and the static handler can serve
//! them with long-lived cache headers.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR is not set");
        return;
    };
    let root = Path::new(&manifest_dir);

    fingerprint(&root.join("static/css/main.css"), "CSS_HASH");
    fingerprint(&root.join("static/js/comments.js"), "JS_HASH");
}

/// Set `var` to the first 8 hex chars of the file's SHA-256.
fn fingerprint(path: &Path, var: &str) {
    println!("cargo:rerun-if-changed={}", path.display());

    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", path.display());
            println!("cargo:rustc-env={var}=");
            return;
        }
    };

    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = hash.get(..8).unwrap_or(&hash);

    println!("cargo:rustc-env={var}={short_hash}");
}
