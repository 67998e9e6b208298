mod args;

use std::io;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use stockval_infra::{
    BackendSession, DiscrepancyAnalyzer, PriceCorrectionCoordinator, RelayTransport, Settings, ValuationService,
};
use stockval_inventory::{Cutoff, Valuation, write_report};

use crate::args::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    stockval_observability::init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid configuration")?;

    let transport = RelayTransport::new(settings.relay_url.clone(), settings.timeout)?;
    let mut session = BackendSession::new(transport);
    if let Some(version) = &settings.backend_version {
        session = session.with_version(version.clone());
    }
    let adapter = session
        .adapter()
        .await
        .with_context(|| format!("failed to reach backend through {}", settings.relay_url))?;
    let classifier = settings.classifier_config();

    match cli.command {
        Command::Value { products, as_of } => {
            let cutoff = as_of.map_or(Cutoff::Unbounded, Cutoff::EndOfDay);
            let service = ValuationService::new(adapter, classifier);
            let batch = service.value_products(&products, cutoff).await?;

            for product in &batch.products {
                match &product.valuation {
                    Valuation::Computed(state) => info!(
                        product_id = %state.product_id,
                        quantity = state.net_quantity,
                        cump = state.cump,
                        stock_value = state.stock_value,
                        "valued"
                    ),
                    Valuation::Estimated(estimate) => info!(
                        product_id = %estimate.product_id,
                        quantity = estimate.quantity,
                        stock_value = estimate.stock_value,
                        "no movement history, estimated from backend"
                    ),
                }
            }
            if !batch.missing.is_empty() {
                warn!(missing = ?batch.missing, "some products were not found");
            }

            write_report(&batch.report_rows(), &settings.export_locale, io::stdout().lock())?;
        }

        Command::Reconcile { products, apply } => {
            let analyzer = DiscrepancyAnalyzer::new(adapter, classifier)
                .with_adjustment_location(settings.adjustment_location_id);
            let report = analyzer.analyze_products(&products).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if apply {
                let applied = analyzer.apply_adjustments(&report.adjustments()).await?;
                println!("{}", serde_json::to_string_pretty(&applied)?);
                if applied.failed_count > 0 {
                    bail!("{} of {} adjustments failed", applied.failed_count, applied.failed_count + applied.success_count);
                }
            }
        }

        Command::Correct { movement, cost } => {
            let coordinator = PriceCorrectionCoordinator::new(adapter, classifier);
            let outcome = coordinator.correct_unit_cost(movement, cost).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
