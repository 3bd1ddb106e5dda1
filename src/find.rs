//! Resolution of command names to executable paths.

use std::env;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Resolves a command name to the path of an executable.
///
/// A name containing a `/` is taken as a literal path; anything else is
/// looked up in the directories of `$PATH`, first match wins.  The result
/// is suitable as the first element of a command passed to
/// [`pipeline`](crate::pipeline), which execs without a search-path lookup
/// of its own.
pub fn find_command(name: &str) -> Result<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        if is_executable(&path) {
            return Ok(path);
        }
    } else if let Some(path_var) = env::var_os("PATH") {
        for dir in env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
    }
    Err(io::Error::new(
        ErrorKind::NotFound,
        format!("command not found: {}", name),
    )
    .into())
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
