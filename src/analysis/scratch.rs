//! Scratch-file cleanup guard. Rust has no `finally`, so deleting the
//! temporary before/after blobs on every exit path from an analysis (spec
//! §4.G step 3, §6 "scratch analysis inputs ... deleted on exit") is modeled
//! as an RAII guard whose `Drop` removes the files regardless of how the
//! enclosing scope exits.

use std::path::PathBuf;

pub struct ScratchGuard {
    paths: Vec<PathBuf>,
}

impl ScratchGuard {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
    }
}
