//! JSON 스냅샷 파일 저장소 어댑터
//!
//! 모든 변경은 스냅샷 잠금을 잡은 상태에서 디스크의 최신 스냅샷을 다시 읽고,
//! 그 위에 연산을 적용한 뒤 고유한 임시 파일과 rename으로 교체합니다.
//! 따라서 같은 파일을 여는 CLI와 데몬이 서로의 기록을 덮어쓰지 않고
//! 제품 키 유일성도 프로세스 경계를 넘어 유지됩니다.
//!
//! 읽기는 파일의 (inode, 크기, 수정 시각)이 바뀐 경우에만 다시 로드합니다.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::lock::{SnapshotLock, lock_path};
use super::{HierarchyState, Repository};
use crate::error::StorageError;
use crate::status::ScenarioStatus;
use crate::types::{Channel, Product, TestCase, TestPlan, TestScenario};

/// 디스크 스냅샷의 버전 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    inode: u64,
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        let inode = {
            use std::os::unix::fs::MetadataExt;
            meta.ino()
        };
        #[cfg(not(unix))]
        let inode = 0;

        Self {
            inode,
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }

    /// 파일이 없으면 `None`
    async fn of(path: &Path) -> Result<Option<Self>, StorageError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[derive(Debug)]
struct Cached {
    state: HierarchyState,
    stamp: Option<FileStamp>,
    /// 기록 실패 후에는 디스크와 다를 수 있으므로 다음 접근에서 다시 읽음
    valid: bool,
}

/// JSON 스냅샷 파일 기반 저장소
///
/// 같은 경로를 여는 모든 핸들 (같은 프로세스든 다른 프로세스든)은
/// `<파일명>.lock` 잠금으로 변경이 직렬화됩니다.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    lock_path: PathBuf,
    cache: RwLock<Cached>,
}

impl FileRepository {
    /// 스냅샷 파일을 열거나, 없으면 빈 저장소로 시작합니다.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let (state, stamp) = load(&path).await?;
        info!(
            path = %path.display(),
            products = state.products.len(),
            plans = state.plans.len(),
            "file repository opened"
        );
        Ok(Self {
            lock_path: lock_path(&path),
            path,
            cache: RwLock::new(Cached {
                state,
                stamp,
                valid: true,
            }),
        })
    }

    /// 스냅샷 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T>(&self, f: impl FnOnce(&HierarchyState) -> T) -> Result<T, StorageError> {
        let current = FileStamp::of(&self.path).await?;
        {
            let cache = self.cache.read().await;
            if cache.valid && cache.stamp == current {
                return Ok(f(&cache.state));
            }
        }

        let mut cache = self.cache.write().await;
        let current = FileStamp::of(&self.path).await?;
        if !cache.valid || cache.stamp != current {
            let (state, stamp) = load(&self.path).await?;
            debug!(path = %self.path.display(), "storage file changed on disk, reloaded");
            *cache = Cached {
                state,
                stamp,
                valid: true,
            };
        }
        Ok(f(&cache.state))
    }

    /// 잠금 아래에서 최신 스냅샷을 읽고 `f`를 적용합니다.
    ///
    /// `changed`가 `false`를 돌려주면 파일을 다시 쓰지 않습니다.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut HierarchyState) -> Result<T, StorageError>,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T, StorageError> {
        let mut cache = self.cache.write().await;
        let _lock = SnapshotLock::acquire(self.lock_path.clone()).await?;

        let (state, stamp) = load(&self.path).await?;
        *cache = Cached {
            state,
            stamp,
            valid: true,
        };

        // HierarchyState 연산은 에러 시 상태를 바꾸지 않음
        let out = f(&mut cache.state)?;
        if !changed(&out) {
            return Ok(out);
        }

        match self.persist(&cache.state).await {
            Ok(stamp) => {
                cache.stamp = stamp;
                Ok(out)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to write storage snapshot");
                cache.valid = false;
                Err(e)
            }
        }
    }

    async fn persist(&self, state: &HierarchyState) -> Result<Option<FileStamp>, StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "testgrid.json".to_owned());
        let tmp = self
            .path
            .with_file_name(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

        if let Err(e) = write_then_rename(&tmp, &self.path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        FileStamp::of(&self.path).await
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, target).await?;
    Ok(())
}

/// 스냅샷을 읽습니다. 같은 핸들의 메타데이터로 버전을 기록합니다.
async fn load(path: &Path) -> Result<(HierarchyState, Option<FileStamp>), StorageError> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "storage file not found, starting empty");
            return Ok((HierarchyState::default(), None));
        }
        Err(e) => return Err(StorageError::Io(e)),
    };
    let meta = file.metadata().await?;
    let mut bytes = Vec::with_capacity(usize::try_from(meta.len()).unwrap_or(0));
    file.read_to_end(&mut bytes).await?;

    let mut state = serde_json::from_slice::<HierarchyState>(&bytes)
        .map_err(|e| StorageError::Serialization(format!("{}: {e}", path.display())))?;
    state.rebuild_indexes();
    Ok((state, Some(FileStamp::from_metadata(&meta))))
}

impl Repository for FileRepository {
    async fn find_product_by_key(
        &self,
        name: &str,
        version: &str,
        channel: Channel,
    ) -> Result<Option<Product>, StorageError> {
        self.read(|s| s.find_product_by_key(name, version, channel))
            .await
    }

    async fn insert_product(&self, product: Product) -> Result<Product, StorageError> {
        self.mutate(|s| s.insert_product(product), |_| true).await
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>, StorageError> {
        self.read(|s| s.products.get(id).cloned()).await
    }

    async fn delete_product(&self, id: &str) -> Result<bool, StorageError> {
        self.mutate(|s| Ok(s.delete_product(id)), |deleted| *deleted)
            .await
    }

    async fn insert_test_plan(&self, plan: TestPlan) -> Result<TestPlan, StorageError> {
        self.mutate(|s| s.insert_test_plan(plan), |_| true).await
    }

    async fn find_test_plan(&self, id: &str) -> Result<Option<TestPlan>, StorageError> {
        self.read(|s| s.plans.get(id).cloned()).await
    }

    async fn list_test_plans(&self, product_id: &str) -> Result<Vec<TestPlan>, StorageError> {
        self.read(|s| s.list_test_plans(product_id)).await
    }

    async fn find_scenario(&self, id: &str) -> Result<Option<TestScenario>, StorageError> {
        self.read(|s| s.scenario(id).cloned()).await
    }

    async fn list_scenarios(&self, plan_id: &str) -> Result<Vec<TestScenario>, StorageError> {
        self.read(|s| s.list_scenarios(plan_id)).await
    }

    async fn update_scenario_status(
        &self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
    ) -> Result<bool, StorageError> {
        self.mutate(
            |s| s.update_scenario_status(id, expected, new),
            |applied| *applied,
        )
        .await
    }

    async fn complete_scenario(
        &self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
        cases: Vec<TestCase>,
    ) -> Result<bool, StorageError> {
        self.mutate(
            |s| s.complete_scenario(id, expected, new, cases),
            |applied| *applied,
        )
        .await
    }

    async fn mark_scenario_skipped(&self, id: &str) -> Result<bool, StorageError> {
        self.mutate(|s| s.mark_scenario_skipped(id), |marked| *marked)
            .await
    }

    async fn insert_test_cases(
        &self,
        scenario_id: &str,
        cases: Vec<TestCase>,
    ) -> Result<(), StorageError> {
        let empty = cases.is_empty();
        self.mutate(|s| s.insert_test_cases(scenario_id, cases), |_| !empty)
            .await
    }

    async fn find_test_case(&self, id: &str) -> Result<Option<TestCase>, StorageError> {
        self.read(|s| s.test_cases.get(id).cloned()).await
    }

    async fn list_test_cases(&self, scenario_id: &str) -> Result<Vec<TestCase>, StorageError> {
        self.read(|s| s.list_test_cases(scenario_id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registration::{Registration, RegistrationService};
    use crate::repository::test_support::seeded;
    use crate::types::{ScenarioDefinition, TestEngine};

    #[tokio::test]
    async fn file_repository_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("testgrid.json");

        let (product, plan) = {
            let repo = FileRepository::open(&path).await.expect("open");
            seeded(&repo).await
        };

        let reopened = FileRepository::open(&path).await.expect("reopen");
        let found = reopened
            .find_product_by_key("ProductX", "1.0.0", Channel::Lts)
            .await
            .expect("find")
            .expect("persisted");
        assert_eq!(found.id, product.id);
        let scenarios = reopened.list_scenarios(plan.id()).await.expect("list");
        assert_eq!(scenarios.len(), 2);

        // 인덱스가 다시 만들어져 유일성이 유지되어야 함
        let err = reopened
            .insert_product(Product::new("ProductX", "1.0.0", Channel::Lts).expect("valid"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn file_repository_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("testgrid.json");
        tokio::fs::write(&path, b"{not json").await.expect("write");
        let err = FileRepository::open(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn two_handles_register_one_product() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("testgrid.json");

        let daemon = RegistrationService::new(Arc::new(FileRepository::open(&path).await.expect("open")));
        let cli = RegistrationService::new(Arc::new(FileRepository::open(&path).await.expect("open")));

        let first = daemon.register("ProductX", "1.0.0", "LTS").await.expect("register");
        let second = cli.register("ProductX", "1.0.0", "LTS").await.expect("register");
        assert!(matches!(first, Registration::Created(_)));
        assert!(matches!(second, Registration::Existing(_)));
        assert_eq!(first.product().id, second.product().id);

        let reopened = FileRepository::open(&path).await.expect("reopen");
        let found = reopened
            .find_product_by_key("ProductX", "1.0.0", Channel::Lts)
            .await
            .expect("find")
            .expect("persisted");
        assert_eq!(found.id, first.product().id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_handles_create_exactly_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("testgrid.json");

        let a = RegistrationService::new(Arc::new(FileRepository::open(&path).await.expect("open")));
        let b = RegistrationService::new(Arc::new(FileRepository::open(&path).await.expect("open")));

        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.register("ProductX", "1.0.0", "LTS").await }),
            tokio::spawn(async move { b.register("ProductX", "1.0.0", "LTS").await }),
        );
        let ra = ra.expect("join").expect("register");
        let rb = rb.expect("join").expect("register");

        let created = [&ra, &rb]
            .iter()
            .filter(|r| matches!(r, Registration::Created(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(ra.product().id, rb.product().id);
    }

    #[tokio::test]
    async fn writes_from_another_handle_survive_status_updates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("testgrid.json");

        let daemon = FileRepository::open(&path).await.expect("open");
        let (_, daemon_plan) = seeded(&daemon).await;

        let cli = FileRepository::open(&path).await.expect("open");
        let other = cli
            .insert_product(Product::new("ProductY", "2.0.0", Channel::Released).expect("valid"))
            .await
            .expect("insert");
        let cli_plan = cli
            .insert_test_plan(
                TestPlan::new(&other, vec![ScenarioDefinition::new("smoke", TestEngine::Testng)])
                    .expect("valid plan"),
            )
            .await
            .expect("insert plan");

        // 데몬 핸들이 CLI 기록을 조회할 수 있어야 함
        let seen = daemon
            .find_test_plan(cli_plan.id())
            .await
            .expect("find")
            .expect("visible");
        assert_eq!(seen.product_id(), other.id);

        let scenario_id = daemon_plan.scenarios()[0].id().to_owned();
        assert!(
            daemon
                .update_scenario_status(&scenario_id, ScenarioStatus::Pending, ScenarioStatus::Running)
                .await
                .expect("cas")
        );

        let reopened = FileRepository::open(&path).await.expect("reopen");
        assert!(reopened.find_product(&other.id).await.expect("find").is_some());
        assert!(reopened.find_test_plan(cli_plan.id()).await.expect("find").is_some());
        assert_eq!(
            reopened
                .find_scenario(&scenario_id)
                .await
                .expect("find")
                .expect("exists")
                .status(),
            ScenarioStatus::Running
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_compare_and_set_does_not_rewrite_snapshot() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("testgrid.json");
        let repo = FileRepository::open(&path).await.expect("open");
        let (_, plan) = seeded(&repo).await;
        let before = std::fs::metadata(&path).expect("stat").ino();

        let scenario_id = plan.scenarios()[0].id().to_owned();
        let applied = repo
            .update_scenario_status(&scenario_id, ScenarioStatus::Running, ScenarioStatus::Completed)
            .await
            .expect("cas");
        assert!(!applied);
        assert!(!repo.delete_product("missing").await.expect("delete"));

        assert_eq!(std::fs::metadata(&path).expect("stat").ino(), before);
    }

    #[tokio::test]
    async fn snapshot_directory_holds_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("testgrid.json");
        let repo = FileRepository::open(&path).await.expect("open");
        seeded(&repo).await;

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["testgrid.json", "testgrid.json.lock"]);
    }
}
