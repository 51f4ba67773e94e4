//! 스냅샷 파일의 프로세스 간 배타 잠금
//!
//! 잠금은 스냅샷 옆의 `<파일명>.lock` 파일에 `flock(2)`으로 겁니다.
//! `flock`은 열린 파일 단위이므로 같은 프로세스 안의 서로 다른 핸들도 직렬화됩니다.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// 해제 시 잠금이 풀리는 가드
#[derive(Debug)]
pub(super) struct SnapshotLock {
    #[cfg(unix)]
    _guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

/// 스냅샷 경로에 대응하는 잠금 파일 경로
pub(super) fn lock_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl SnapshotLock {
    /// 배타 잠금을 얻을 때까지 기다립니다.
    ///
    /// 블로킹 호출이므로 blocking 스레드에서 실행합니다.
    pub(super) async fn acquire(path: PathBuf) -> Result<Self, StorageError> {
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&path))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }

    fn acquire_blocking(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        #[cfg(unix)]
        {
            use nix::fcntl::{Flock, FlockArg};
            let guard = Flock::lock(file, FlockArg::LockExclusive)
                .map_err(|(_, errno)| StorageError::Io(std::io::Error::from(errno)))?;
            Ok(Self { _guard: guard })
        }

        #[cfg(not(unix))]
        {
            tracing::warn!(
                path = %path.display(),
                "file locking unsupported on this platform, concurrent writers are not serialized"
            );
            Ok(Self { _file: file })
        }
    }
}
