//! Command splitting and executable resolution
//!
//! 쉘을 거치지 않는다: 공백으로만 토큰을 나누고 따옴표/이스케이프는 해석하지 않음.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;
use tsp_foundation::{Error, Result};

/// Split a command line into program and arguments on whitespace
pub fn split_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut tokens = command.split_whitespace().map(str::to_string);
    let program = tokens
        .next()
        .ok_or_else(|| Error::InvalidCommand("command must not be empty".to_string()))?;
    Ok((program, tokens.collect()))
}

/// Resolve `program` against the process `PATH`
pub fn find_executable(program: &str) -> Result<PathBuf> {
    find_executable_in(program, std::env::var_os("PATH"))
}

/// Resolve `program`: an existing path is used as is, otherwise its file name
/// is looked up in each directory of `search_path`.
pub fn find_executable_in(program: &str, search_path: Option<OsString>) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let base = path
        .file_name()
        .ok_or_else(|| Error::ExecutableNotFound(program.to_string()))?;

    let cwd = std::env::current_dir()?;
    let resolved = which::which_in(base, search_path, cwd)
        .map_err(|_| Error::ExecutableNotFound(base.to_string_lossy().into_owned()))?;

    debug!("Resolved {} -> {}", program, resolved.display());
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_whitespace_only() {
        let (program, args) = split_command("  grep -r  'a b'   src ").unwrap();
        assert_eq!(program, "grep");
        // quotes are not interpreted
        assert_eq!(args, vec!["-r", "'a", "b'", "src"]);
    }

    #[test]
    fn test_split_empty_is_invalid() {
        assert!(matches!(split_command(""), Err(Error::InvalidCommand(_))));
        assert!(matches!(split_command(" \t "), Err(Error::InvalidCommand(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_path_is_used_directly() {
        let resolved = find_executable_in("/bin/sh", None).unwrap();
        assert_eq!(resolved, PathBuf::from("/bin/sh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_basename_searched_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hello-tsp");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let search = Some(OsString::from(dir.path()));
        assert_eq!(find_executable_in("hello-tsp", search.clone()).unwrap(), script);
        // a missing directory prefix falls back to the basename
        assert_eq!(
            find_executable_in("/does/not/exist/hello-tsp", search).unwrap(),
            script
        );
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_executable_in("/no/such/binary", Some(OsString::from(dir.path())))
            .unwrap_err();
        match err {
            Error::ExecutableNotFound(name) => assert_eq!(name, "binary"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
