//! 프로세스 내 저장소 어댑터

use tokio::sync::RwLock;

use super::{HierarchyState, Repository};
use crate::error::StorageError;
use crate::status::ScenarioStatus;
use crate::types::{Channel, Product, TestCase, TestPlan, TestScenario};

/// 프로세스 내 저장소
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<HierarchyState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    async fn find_product_by_key(
        &self,
        name: &str,
        version: &str,
        channel: Channel,
    ) -> Result<Option<Product>, StorageError> {
        Ok(self.state.read().await.find_product_by_key(name, version, channel))
    }

    async fn insert_product(&self, product: Product) -> Result<Product, StorageError> {
        self.state.write().await.insert_product(product)
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>, StorageError> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn delete_product(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.state.write().await.delete_product(id))
    }

    async fn insert_test_plan(&self, plan: TestPlan) -> Result<TestPlan, StorageError> {
        self.state.write().await.insert_test_plan(plan)
    }

    async fn find_test_plan(&self, id: &str) -> Result<Option<TestPlan>, StorageError> {
        Ok(self.state.read().await.plans.get(id).cloned())
    }

    async fn list_test_plans(&self, product_id: &str) -> Result<Vec<TestPlan>, StorageError> {
        Ok(self.state.read().await.list_test_plans(product_id))
    }

    async fn find_scenario(&self, id: &str) -> Result<Option<TestScenario>, StorageError> {
        Ok(self.state.read().await.scenario(id).cloned())
    }

    async fn list_scenarios(&self, plan_id: &str) -> Result<Vec<TestScenario>, StorageError> {
        Ok(self.state.read().await.list_scenarios(plan_id))
    }

    async fn update_scenario_status(
        &self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
    ) -> Result<bool, StorageError> {
        self.state
            .write()
            .await
            .update_scenario_status(id, expected, new)
    }

    async fn complete_scenario(
        &self,
        id: &str,
        expected: ScenarioStatus,
        new: ScenarioStatus,
        cases: Vec<TestCase>,
    ) -> Result<bool, StorageError> {
        self.state
            .write()
            .await
            .complete_scenario(id, expected, new, cases)
    }

    async fn mark_scenario_skipped(&self, id: &str) -> Result<bool, StorageError> {
        self.state.write().await.mark_scenario_skipped(id)
    }

    async fn insert_test_cases(
        &self,
        scenario_id: &str,
        cases: Vec<TestCase>,
    ) -> Result<(), StorageError> {
        self.state.write().await.insert_test_cases(scenario_id, cases)
    }

    async fn find_test_case(&self, id: &str) -> Result<Option<TestCase>, StorageError> {
        Ok(self.state.read().await.test_cases.get(id).cloned())
    }

    async fn list_test_cases(&self, scenario_id: &str) -> Result<Vec<TestCase>, StorageError> {
        Ok(self.state.read().await.list_test_cases(scenario_id))
    }
}
