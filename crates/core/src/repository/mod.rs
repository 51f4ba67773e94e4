//! 저장소 계약: 영속성 협력자 인터페이스와 저장 어댑터
//!
//! [`Repository`] trait은 코어 로직이 소비하는 최소 기능 집합입니다:
//! 키 조회, 유일성 제약이 있는 삽입, 전제 조건 기반 상태 갱신(CAS),
//! ID/부모별 조회, 명시적 연쇄 삭제.
//!
//! # 구현체
//! - [`MemoryRepository`]: 프로세스 내 저장 (테스트, `backend = "memory"`)
//! - [`FileRepository`]: 변경마다 JSON 스냅샷을 원자적으로 기록 (`backend = "file"`).
//!   CLI와 데몬처럼 같은 파일을 여는 여러 프로세스가 파일 잠금으로 직렬화됩니다.
//!
//! 두 구현 모두 전체 계층을 하나의 `RwLock`으로 보호하므로
//! 읽기는 항상 일관된 스냅샷을 관찰합니다.

mod file;
mod lock;
mod memory;

pub use file::FileRepository;
pub use memory::MemoryRepository;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, StorageError};
use crate::status::ScenarioStatus;
use crate::types::{Channel, Product, ProductKey, TestCase, TestPlan, TestScenario};

/// 영속성 협력자 계약
///
/// 모든 연산은 비동기이며 `Send` future를 반환합니다.
pub trait Repository: Send + Sync + 'static {
    /// `(name, version, channel)`로 제품을 찾습니다.
    fn find_product_by_key(
        &self,
        name: &str,
        version: &str,
        channel: Channel,
    ) -> impl Future<Output = Result<Option<Product>, StorageError>> + Send;

    /// 제품을 저장합니다. 키가 겹치면 [`StorageError::DuplicateProduct`]로 실패합니다.
    fn insert_product(
        &self,
        product: Product,
    ) -> impl Future<Output = Result<Product, StorageError>> + Send;

    fn find_product(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Product>, StorageError>> + Send;

    /// 제품과 그 아래 플랜/시나리오/케이스를 모두 삭제합니다.
    fn delete_product(&self, id: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// 플랜과 시나리오를 함께 저장합니다. 소유 제품이 있어야 합니다.
    fn insert_test_plan(
        &self,
        plan: TestPlan,
    ) -> impl Future<Output = Result<TestPlan, StorageError>> + Send;

    fn find_test_plan(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<TestPlan>, StorageError>> + Send;

    fn list_test_plans(
        &self,
        product_id: &str,
    ) -> impl Future<Output = Result<Vec<TestPlan>, StorageError>> + Send;

    fn find_scenario(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<TestScenario>, StorageError>> + Send;

    fn list_scenarios(
        &self,
        plan_id: &str,
    ) -> impl Future<Output = Result<Vec<TestScenario>, StorageError>> + Send;

    /// 현재 상태가 `expected`일 때만 `new`로 갱신합니다 (compare-and-set).
    ///
    /// 전제 조건이 맞지 않으면 `Ok(false)`를 반환하고 아무것도 바꾸지 않습니다.
    fn update_scenario_status(
        &self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// CAS 상태 갱신과 테스트 케이스 기록을 하나의 원자적 단계로 수행합니다.
    ///
    /// CAS가 실패하면 케이스도 기록되지 않습니다.
    fn complete_scenario(
        &self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
        cases: Vec<TestCase>,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// PENDING 시나리오를 건너뜀으로 표시합니다.
    fn mark_scenario_skipped(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// 시작된 시나리오 아래에 테스트 케이스를 기록합니다.
    fn insert_test_cases(
        &self,
        scenario_id: &str,
        cases: Vec<TestCase>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn find_test_case(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<TestCase>, StorageError>> + Send;

    fn list_test_cases(
        &self,
        scenario_id: &str,
    ) -> impl Future<Output = Result<Vec<TestCase>, StorageError>> + Send;
}

// ─── HierarchyState ──────────────────────────────────────────────────

/// 저장된 전체 엔티티 계층
///
/// 인덱스는 직렬화하지 않고 로드 시 다시 만듭니다.
/// 변경 연산은 전제 조건을 모두 확인한 뒤에만 상태를 바꾸므로
/// 에러를 반환한 연산은 아무것도 남기지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct HierarchyState {
    products: BTreeMap<String, Product>,
    plans: BTreeMap<String, TestPlan>,
    test_cases: BTreeMap<String, TestCase>,
    #[serde(skip)]
    product_keys: HashMap<ProductKey, String>,
    #[serde(skip)]
    scenario_plans: HashMap<String, String>,
    #[serde(skip)]
    scenario_cases: HashMap<String, Vec<String>>,
}

impl HierarchyState {
    fn rebuild_indexes(&mut self) {
        self.product_keys = self
            .products
            .values()
            .map(|p| (p.key(), p.id.clone()))
            .collect();
        self.scenario_plans = self
            .plans
            .values()
            .flat_map(|plan| {
                plan.scenarios()
                    .iter()
                    .map(move |s| (s.id().to_owned(), plan.id().to_owned()))
            })
            .collect();
        let mut cases: Vec<&TestCase> = self.test_cases.values().collect();
        cases.sort_by_key(|c| c.created_at);
        self.scenario_cases.clear();
        for case in cases {
            self.scenario_cases
                .entry(case.test_scenario_id.clone())
                .or_default()
                .push(case.id.clone());
        }
    }

    fn find_product_by_key(&self, name: &str, version: &str, channel: Channel) -> Option<Product> {
        let key = ProductKey {
            name: name.to_owned(),
            version: version.to_owned(),
            channel,
        };
        self.product_keys
            .get(&key)
            .and_then(|id| self.products.get(id))
            .cloned()
    }

    fn insert_product(&mut self, product: Product) -> Result<Product, StorageError> {
        let key = product.key();
        if self.product_keys.contains_key(&key) {
            return Err(StorageError::DuplicateProduct {
                name: key.name,
                version: key.version,
                channel: key.channel.to_string(),
            });
        }
        if self.products.contains_key(&product.id) {
            return Err(StorageError::Constraint(format!(
                "product id already exists: {}",
                product.id
            )));
        }
        self.product_keys.insert(key, product.id.clone());
        self.products.insert(product.id.clone(), product.clone());
        Ok(product)
    }

    fn delete_product(&mut self, id: &str) -> bool {
        let Some(product) = self.products.remove(id) else {
            return false;
        };
        self.product_keys.remove(&product.key());

        let plan_ids: Vec<String> = self
            .plans
            .values()
            .filter(|p| p.product_id() == id)
            .map(|p| p.id().to_owned())
            .collect();
        for plan_id in plan_ids {
            if let Some(plan) = self.plans.remove(&plan_id) {
                for scenario in plan.scenarios() {
                    self.scenario_plans.remove(scenario.id());
                    for case_id in self.scenario_cases.remove(scenario.id()).unwrap_or_default() {
                        self.test_cases.remove(&case_id);
                    }
                }
            }
        }
        true
    }

    fn insert_test_plan(&mut self, plan: TestPlan) -> Result<TestPlan, StorageError> {
        if !self.products.contains_key(plan.product_id()) {
            return Err(StorageError::NotFound {
                entity: "Product",
                id: plan.product_id().to_owned(),
            });
        }
        if self.plans.contains_key(plan.id()) {
            return Err(StorageError::Constraint(format!(
                "test plan id already exists: {}",
                plan.id()
            )));
        }
        if let Some(dup) = plan
            .scenarios()
            .iter()
            .find(|s| self.scenario_plans.contains_key(s.id()))
        {
            return Err(StorageError::Constraint(format!(
                "test scenario already belongs to a plan: {}",
                dup.id()
            )));
        }
        for scenario in plan.scenarios() {
            self.scenario_plans
                .insert(scenario.id().to_owned(), plan.id().to_owned());
        }
        self.plans.insert(plan.id().to_owned(), plan.clone());
        Ok(plan)
    }

    fn list_test_plans(&self, product_id: &str) -> Vec<TestPlan> {
        let mut plans: Vec<TestPlan> = self
            .plans
            .values()
            .filter(|p| p.product_id() == product_id)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.created_at());
        plans
    }

    fn scenario(&self, id: &str) -> Option<&TestScenario> {
        let plan_id = self.scenario_plans.get(id)?;
        self.plans.get(plan_id)?.scenario(id)
    }

    fn scenario_mut(&mut self, id: &str) -> Result<&mut TestScenario, StorageError> {
        let not_found = || StorageError::NotFound {
            entity: "TestScenario",
            id: id.to_owned(),
        };
        let plan_id = self.scenario_plans.get(id).ok_or_else(not_found)?;
        self.plans
            .get_mut(plan_id)
            .and_then(|plan| plan.scenario_mut(id))
            .ok_or_else(not_found)
    }

    fn list_scenarios(&self, plan_id: &str) -> Vec<TestScenario> {
        self.plans
            .get(plan_id)
            .map(|p| p.scenarios().to_vec())
            .unwrap_or_default()
    }

    fn update_scenario_status(
        &mut self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
    ) -> Result<bool, StorageError> {
        let scenario = self.scenario_mut(id)?;
        if scenario.status() != expected {
            return Ok(false);
        }
        // 건너뜀 표시된 시나리오는 디스패치하지 않음
        if new == ScenarioStatus::Running && scenario.is_skipped() {
            return Ok(false);
        }
        scenario
            .transition_to(new)
            .map_err(|e| StorageError::Constraint(e.to_string()))?;
        Ok(true)
    }

    fn mark_scenario_skipped(&mut self, id: &str) -> Result<bool, StorageError> {
        Ok(self.scenario_mut(id)?.mark_skipped())
    }

    fn insert_test_cases(&mut self, scenario_id: &str, cases: Vec<TestCase>) -> Result<(), StorageError> {
        let scenario = self.scenario(scenario_id).ok_or_else(|| StorageError::NotFound {
            entity: "TestScenario",
            id: scenario_id.to_owned(),
        })?;
        if scenario.status() == ScenarioStatus::Pending {
            return Err(StorageError::Constraint(
                ModelError::NotStarted(scenario_id.to_owned()).to_string(),
            ));
        }
        check_case_owner(scenario_id, &cases)?;
        self.store_cases(scenario_id, cases);
        Ok(())
    }

    fn store_cases(&mut self, scenario_id: &str, cases: Vec<TestCase>) {
        let index = self.scenario_cases.entry(scenario_id.to_owned()).or_default();
        for case in cases {
            index.push(case.id.clone());
            self.test_cases.insert(case.id.clone(), case);
        }
    }

    /// 케이스 소유자와 전이를 먼저 검증한 뒤 제자리에서 적용합니다.
    fn complete_scenario(
        &mut self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
        cases: Vec<TestCase>,
    ) -> Result<bool, StorageError> {
        let scenario = self.scenario_mut(id)?;
        if scenario.status() != expected {
            return Ok(false);
        }
        if !expected.can_transition_to(new) {
            return Err(StorageError::Constraint(
                ModelError::InvalidStateTransition { from: expected, to: new }.to_string(),
            ));
        }
        check_case_owner(id, &cases)?;
        scenario
            .transition_to(new)
            .map_err(|e| StorageError::Constraint(e.to_string()))?;
        self.store_cases(id, cases);
        Ok(true)
    }

    fn list_test_cases(&self, scenario_id: &str) -> Vec<TestCase> {
        self.scenario_cases
            .get(scenario_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.test_cases.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn check_case_owner(scenario_id: &str, cases: &[TestCase]) -> Result<(), StorageError> {
    match cases.iter().find(|c| c.test_scenario_id != scenario_id) {
        Some(bad) => Err(StorageError::Constraint(format!(
            "test case {} belongs to scenario {}",
            bad.id, bad.test_scenario_id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Repository;
    use crate::types::{Channel, Product, ScenarioDefinition, TestEngine, TestPlan};

    /// 제품 하나와 활성 시나리오 두 개짜리 플랜을 저장합니다.
    pub(crate) async fn seeded(repo: &impl Repository) -> (Product, TestPlan) {
        let product = repo
            .insert_product(Product::new("ProductX", "1.0.0", Channel::Lts).expect("valid"))
            .await
            .expect("insert product");
        let plan = TestPlan::new(
            &product,
            vec![
                ScenarioDefinition::new("api", TestEngine::Testng),
                ScenarioDefinition::new("ui", TestEngine::Selenium),
            ],
        )
        .expect("valid plan");
        let plan = repo.insert_test_plan(plan).await.expect("insert plan");
        (product, plan)
    }
}
