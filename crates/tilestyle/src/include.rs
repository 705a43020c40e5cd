//! Resolution of `include "file"` statements

use std::io;
use std::path::Path;

/// Supplies the text of an included file
pub trait IncludeResolver: Send + Sync {
    fn resolve(&self, base_dir: &Path, filename: &str) -> io::Result<String>;
}

/// Reads includes from disk, relative to the base directory
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl IncludeResolver for FsResolver {
    fn resolve(&self, base_dir: &Path, filename: &str) -> io::Result<String> {
        std::fs::read_to_string(base_dir.join(filename))
    }
}
