//! 등록 서비스: (name, version, channel) 제품의 멱등 등록
//!
//! # 프로토콜
//! 1. 채널 검증 (저장소 접근 전)
//! 2. 키로 기존 제품 조회 → 있으면 그대로 반환
//! 3. 없으면 삽입
//! 4. 동시 삽입으로 `DuplicateProduct`가 나면 재조회하여 기존 레코드 반환
//!
//! 같은 인자로 동시에 호출해도 저장되는 제품은 정확히 하나입니다.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{StorageError, TestGridError, ValidationError};
use crate::metrics as m;
use crate::repository::Repository;
use crate::types::{Channel, Product, ScenarioDefinition, TestPlan};

/// 등록 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// 새로 저장됨
    Created(Product),
    /// 이미 존재하던 레코드
    Existing(Product),
}

impl Registration {
    pub fn product(&self) -> &Product {
        match self {
            Self::Created(p) | Self::Existing(p) => p,
        }
    }

    pub fn into_product(self) -> Product {
        match self {
            Self::Created(p) | Self::Existing(p) => p,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// 제품/플랜 등록 서비스
pub struct RegistrationService<R: Repository> {
    repository: Arc<R>,
}

impl<R: Repository> Clone for RegistrationService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: Repository> RegistrationService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// 제품을 멱등하게 등록합니다.
    ///
    /// `channel`은 닫힌 채널 집합에 대해 검증되며, 알 수 없는 값은
    /// 저장소에 접근하기 전에 [`ValidationError::UnknownChannel`]로 실패합니다.
    pub async fn register_product(
        &self,
        name: &str,
        version: &str,
        channel: &str,
    ) -> Result<Product, TestGridError> {
        Ok(self.register(name, version, channel).await?.into_product())
    }

    /// [`register_product`](Self::register_product)와 같지만 신규 생성 여부를 함께 반환합니다.
    pub async fn register(
        &self,
        name: &str,
        version: &str,
        channel: &str,
    ) -> Result<Registration, TestGridError> {
        let channel: Channel = channel.parse()?;
        let candidate = Product::new(name, version, channel)?;

        info!(product = name, version, channel = %channel, "registering product");

        if let Some(existing) = self
            .repository
            .find_product_by_key(name, version, channel)
            .await?
        {
            info!(product_id = %existing.id, "product already registered");
            return Ok(Registration::Existing(existing));
        }

        match self.repository.insert_product(candidate).await {
            Ok(product) => {
                metrics::counter!(m::PRODUCTS_REGISTERED_TOTAL).increment(1);
                info!(product_id = %product.id, "product registered");
                Ok(Registration::Created(product))
            }
            Err(StorageError::DuplicateProduct { .. }) => {
                // 조회와 삽입 사이에 다른 호출이 먼저 저장함
                metrics::counter!(m::PRODUCTS_DUPLICATE_RECOVERED_TOTAL).increment(1);
                warn!(product = name, version, channel = %channel, "concurrent registration detected, returning existing product");
                let existing = self
                    .repository
                    .find_product_by_key(name, version, channel)
                    .await?
                    .ok_or_else(|| {
                        StorageError::Constraint(format!(
                            "product {name} {version} {channel} reported duplicate but is missing"
                        ))
                    })?;
                Ok(Registration::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 제품 아래에 새 테스트 플랜을 만들고 시나리오와 함께 저장합니다.
    ///
    /// 실행할 때마다 새 플랜을 만듭니다. 기존 플랜은 재설정하지 않습니다.
    pub async fn create_test_plan(
        &self,
        product: &Product,
        scenarios: Vec<ScenarioDefinition>,
    ) -> Result<TestPlan, TestGridError> {
        let plan = TestPlan::new(product, scenarios)?;
        debug!(plan_id = %plan.id(), scenarios = plan.scenarios().len(), "creating test plan");
        let plan = self.repository.insert_test_plan(plan).await?;
        info!(
            plan_id = %plan.id(),
            product_id = %product.id,
            scenarios = plan.scenarios().len(),
            "test plan created"
        );
        Ok(plan)
    }

    /// 제품 등록과 플랜 생성을 한 번에 수행합니다.
    pub async fn register_test_plan(
        &self,
        name: &str,
        version: &str,
        channel: &str,
        scenarios: Vec<ScenarioDefinition>,
    ) -> Result<(Product, TestPlan), TestGridError> {
        let product = self.register_product(name, version, channel).await?;
        let plan = self.create_test_plan(&product, scenarios).await?;
        Ok((product, plan))
    }
}

/// 채널 문자열만 검증합니다. 저장소에 접근하지 않습니다.
pub fn validate_channel(channel: &str) -> Result<Channel, ValidationError> {
    channel.parse()
}
