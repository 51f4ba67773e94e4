//! `testgrid plan` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use testgrid_core::{
    PlanFile, PlanStatus, QueryService, Registration, RegistrationService, Repository,
    ScenarioStatus, TestPlanView,
};

use crate::cli::{PlanAction, PlanArgs, ProductArgs};
use crate::commands::create_product::ProductReport;
use crate::commands::{Store, load_config};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `plan` command.
pub async fn execute(
    args: PlanArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let store = Store::open(&config).await?;

    let report = match args.action {
        PlanAction::Create { product, file } => {
            let plan = PlanFile::from_file(&file).await?;
            info!(
                file = %file.display(),
                scenarios = plan.scenarios.len(),
                "plan definition loaded"
            );
            match store {
                Store::Memory(repo) => create(repo, &product, plan).await?,
                Store::File(repo) => create(repo, &product, plan).await?,
            }
        }
        PlanAction::Show { plan_id } => match store {
            Store::Memory(repo) => show(repo, &plan_id).await?,
            Store::File(repo) => show(repo, &plan_id).await?,
        },
    };

    writer.render(&report)?;
    Ok(())
}

/// Register the product (idempotent) and create a new plan under it.
pub async fn create<R: Repository>(
    repo: Arc<R>,
    product: &ProductArgs,
    definition: PlanFile,
) -> Result<PlanReport, CliError> {
    let service = RegistrationService::new(repo);
    let registration = service
        .register(&product.product, &product.product_version, &product.channel)
        .await?;
    let plan = service
        .create_test_plan(registration.product(), definition.into_definitions())
        .await?;
    Ok(PlanReport {
        product: ProductReport::from(&registration),
        plan: TestPlanView::from(&plan),
    })
}

/// Load a plan and its product for display.
pub async fn show<R: Repository>(repo: Arc<R>, plan_id: &str) -> Result<PlanReport, CliError> {
    let query = QueryService::new(repo);
    let plan = query.test_plan(plan_id).await?;
    let product = query.product(plan.product_id()).await?;
    Ok(PlanReport {
        product: ProductReport::from(&Registration::Existing(product)),
        plan: TestPlanView::from(&plan),
    })
}

/// Plan with its owning product.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub product: ProductReport,
    pub plan: TestPlanView,
}

impl Render for PlanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let status = self.plan.status.as_str();
        let status = match self.plan.status {
            PlanStatus::Completed => status.green().bold(),
            PlanStatus::Error => status.red().bold(),
            PlanStatus::Running => status.cyan().bold(),
            PlanStatus::Pending => status.normal(),
        };

        writeln!(w, "Test Plan: {}", self.plan.id.bold())?;
        writeln!(
            w,
            "  Product: {} {} ({})",
            self.product.name, self.product.version, self.product.channel
        )?;
        writeln!(w, "  Created: {}", self.plan.created_at.to_rfc3339())?;
        writeln!(w, "  Status:  {}", status)?;
        writeln!(w)?;

        if self.plan.scenarios.is_empty() {
            writeln!(w, "  (no scenarios)")?;
            return Ok(());
        }

        writeln!(
            w,
            "  {:<36}  {:<24}  {:<9}  {:<10}  Flags",
            "ID", "NAME", "ENGINE", "STATUS"
        )?;
        for s in &self.plan.scenarios {
            let mut flags = Vec::new();
            if !s.enabled {
                flags.push("disabled");
            }
            if s.skipped {
                flags.push("skipped");
            }
            let scenario_status = format!("{:<10}", s.status.as_str());
            let scenario_status = match s.status {
                ScenarioStatus::Completed => scenario_status.green(),
                ScenarioStatus::Error => scenario_status.red(),
                ScenarioStatus::Running => scenario_status.cyan(),
                ScenarioStatus::Pending => scenario_status.normal(),
            };
            writeln!(
                w,
                "  {:<36}  {:<24}  {:<9}  {}  {}",
                s.id,
                s.name,
                s.test_engine.as_str(),
                scenario_status,
                flags.join(",")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgrid_core::MemoryRepository;

    const PLAN: &str = r#"
[[scenario]]
name = "api"
test_engine = "testng"

[[scenario]]
name = "ui"
test_engine = "SELENIUM"

[[scenario]]
name = "soak"
test_engine = "jmeter"
enabled = false
"#;

    fn product() -> ProductArgs {
        ProductArgs {
            product: "ProductX".to_owned(),
            product_version: "1.0.0".to_owned(),
            channel: "LTS".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_registers_product_once_and_new_plan_each_time() {
        let repo = Arc::new(MemoryRepository::new());
        let first = create(Arc::clone(&repo), &product(), PlanFile::parse(PLAN).expect("parse"))
            .await
            .expect("first plan");
        let second = create(Arc::clone(&repo), &product(), PlanFile::parse(PLAN).expect("parse"))
            .await
            .expect("second plan");

        assert!(first.product.created);
        assert!(!second.product.created);
        assert_eq!(first.product.id, second.product.id);
        assert_ne!(first.plan.id, second.plan.id);
        assert_eq!(first.plan.scenarios.len(), 3);
        assert_eq!(first.plan.status, PlanStatus::Pending);
    }

    #[tokio::test]
    async fn test_show_round_trips_created_plan() {
        let repo = Arc::new(MemoryRepository::new());
        let created = create(Arc::clone(&repo), &product(), PlanFile::parse(PLAN).expect("parse"))
            .await
            .expect("create");
        let shown = show(repo, &created.plan.id).await.expect("show");
        assert_eq!(shown.product.id, created.product.id);
        assert_eq!(shown.plan.scenarios[2].name, "soak");
        assert!(!shown.plan.scenarios[2].enabled);
    }

    #[tokio::test]
    async fn test_show_unknown_plan_is_command_error() {
        let repo = Arc::new(MemoryRepository::new());
        let err = show(repo, "missing").await.expect_err("not found");
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "Unable to find the requested TestPlan by id : 'missing'"
        );
    }

    #[tokio::test]
    async fn test_plan_report_text_lists_scenarios() {
        colored::control::set_override(false);
        let repo = Arc::new(MemoryRepository::new());
        let report = create(repo, &product(), PlanFile::parse(PLAN).expect("parse"))
            .await
            .expect("create");
        let mut buf = Vec::new();
        report.render_text(&mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf-8");
        assert!(text.contains("Product: ProductX 1.0.0 (LTS)"));
        assert!(text.contains("SELENIUM"));
        assert!(text.contains("disabled"));
        assert!(text.contains("PENDING"));
    }
}
