//! Singleton lock for the daemon process.
//!
//! 잘 알려진 파일 경로에 대한 배타적, 논블로킹 advisory lock (`flock`).
//! 락을 잡은 프로세스만 태스크를 Running 으로 전이시킬 수 있으므로
//! "Running 태스크는 최대 하나" 불변식이 여기서 보장된다.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;
use tsp_foundation::{Error, Result};

/// Exclusive lock held for the lifetime of the daemon; released on drop.
pub struct SingletonLock {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
}

impl SingletonLock {
    /// Try to acquire the lock without blocking.
    ///
    /// Returns `LockHeld` if another process (or another handle in this
    /// process) already holds it.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        Self::lock(path, file)
    }

    #[cfg(unix)]
    fn lock(path: PathBuf, file: File) -> Result<Self> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                info!("Singleton lock acquired: {}", path.display());
                Ok(Self { path, _lock: lock })
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(Error::LockHeld(path)),
            Err((_, errno)) => Err(Error::Io(errno.into())),
        }
    }

    #[cfg(not(unix))]
    fn lock(_path: PathBuf, _file: File) -> Result<Self> {
        Err(Error::Internal(
            "Singleton lock is only supported on Unix".to_string(),
        ))
    }

    /// Get the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SingletonLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonLock")
            .field("path", &self.path)
            .finish()
    }
}
