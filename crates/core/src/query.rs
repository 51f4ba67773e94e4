//! 조회 파사드: CLI와 REST 계층을 위한 읽기 전용 조회
//!
//! 존재하지 않는 ID는 [`QueryError::NotFound`]로, 저장소 장애는
//! [`QueryError::Infrastructure`]로 구분하여 반환합니다.

use std::sync::Arc;

use crate::error::QueryError;
use crate::repository::Repository;
use crate::types::{Product, TestCase, TestPlan, TestScenario};

/// 읽기 전용 조회 서비스
pub struct QueryService<R: Repository> {
    repository: Arc<R>,
}

impl<R: Repository> Clone for QueryService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: Repository> QueryService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub async fn product(&self, id: &str) -> Result<Product, QueryError> {
        self.repository
            .find_product(id)
            .await?
            .ok_or_else(|| not_found("Product", id))
    }

    pub async fn test_plan(&self, id: &str) -> Result<TestPlan, QueryError> {
        self.repository
            .find_test_plan(id)
            .await?
            .ok_or_else(|| not_found("TestPlan", id))
    }

    /// 제품의 플랜 목록 (생성 순)
    pub async fn test_plans_for_product(&self, product_id: &str) -> Result<Vec<TestPlan>, QueryError> {
        Ok(self.repository.list_test_plans(product_id).await?)
    }

    /// 플랜의 시나리오 목록. 플랜이 없으면 `NotFound`입니다.
    pub async fn test_scenarios_for_plan(&self, plan_id: &str) -> Result<Vec<TestScenario>, QueryError> {
        let plan = self.test_plan(plan_id).await?;
        Ok(plan.scenarios().to_vec())
    }

    pub async fn test_scenario(&self, id: &str) -> Result<TestScenario, QueryError> {
        self.repository
            .find_scenario(id)
            .await?
            .ok_or_else(|| not_found("TestScenario", id))
    }

    pub async fn test_case(&self, id: &str) -> Result<TestCase, QueryError> {
        self.repository
            .find_test_case(id)
            .await?
            .ok_or_else(|| not_found("TestCase", id))
    }

    /// 시나리오의 테스트 케이스 목록. 없으면 빈 목록입니다.
    pub async fn test_cases_for_scenario(&self, scenario_id: &str) -> Result<Vec<TestCase>, QueryError> {
        Ok(self.repository.list_test_cases(scenario_id).await?)
    }
}

fn not_found(entity: &'static str, id: &str) -> QueryError {
    QueryError::NotFound {
        entity,
        id: id.to_owned(),
    }
}
