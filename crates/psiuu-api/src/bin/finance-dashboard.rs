//! # Finance Dashboard
//!
//! Prints the finance KPIs and the payout queue, and optionally pays a
//! batch of approved payouts.
//!
//! ## Usage
//! ```bash
//! # Summary and payout queue from the configured API
//! cargo run -p psiuu-api --bin finance-dashboard
//!
//! # Seeded demo data only, no network
//! cargo run -p psiuu-api --bin finance-dashboard -- --offline
//!
//! # Pay approved payouts
//! cargo run -p psiuu-api --bin finance-dashboard -- --pay pay_1a2b --pay pay_3c4d
//!
//! # Show the commission extract of one payout
//! cargo run -p psiuu-api --bin finance-dashboard -- --extract pay_1a2b
//! ```
//!
//! ## Environment
//! - `PSIUU_API_URL`, `PSIUU_API_TOKEN`: remote API
//! - `PSIUU_USD_BRL_RATE`, `PSIUU_STORE_FEE_PERCENT`: rule overrides
//! - `PSIUU_MOCK_FALLBACK`: `false` to surface API failures instead of mock data
//! - `RUST_LOG`: log filter (default `info`)

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use psiuu_api::{
    build_source, DashboardLoader, FinanceConfig, FinanceSource, MockDataset, PayoutGateway,
    PayoutManager,
};
use psiuu_core::query::PayoutFilter;
use psiuu_core::{Money, PayoutStatus, LOCAL_CURRENCY};
use tracing::{error, Subscriber};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut offline = false;
    let mut to_pay: Vec<String> = Vec::new();
    let mut extract_id: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--offline" => offline = true,
            "--pay" | "-p" => {
                if i + 1 < args.len() {
                    to_pay.push(args[i + 1].clone());
                    i += 1;
                }
            }
            "--extract" | "-e" => {
                if i + 1 < args.len() {
                    extract_id = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Psiuu Finance Dashboard");
                println!();
                println!("Usage: finance-dashboard [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("      --offline         Use seeded demo data, no network");
                println!("  -p, --pay <ID>        Pay an approved payout (repeatable)");
                println!("  -e, --extract <ID>    Show the commission extract of a payout");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    let config = FinanceConfig::load(config_path)?;
    let (source, client): (Arc<dyn FinanceSource>, Arc<dyn PayoutGateway>) = if offline {
        let dataset = Arc::new(MockDataset::generate(
            &config.rules,
            config.fallback.seed,
            config.fallback.sales_count,
            Utc::now(),
        )?);
        (dataset as Arc<dyn FinanceSource>, Arc::new(OfflineGateway) as Arc<dyn PayoutGateway>)
    } else {
        let (source, client) = build_source(&config)?;
        (source, client as Arc<dyn PayoutGateway>)
    };

    println!("Psiuu Finance");
    println!("=============");
    println!("API: {}", if offline { "offline (demo data)" } else { config.base_url() });
    println!();

    // Summary
    let snapshot = DashboardLoader::new(source, config.rules.clone()).load().await;
    let s = &snapshot.summary;
    println!("Receita aprovada      {:>16}", s.approved_revenue);
    println!("Custo de infra        {:>16}", s.infra_cost);
    println!("Despesas operacionais {:>16}", s.operating_expense);
    println!("Receitas lançadas     {:>16}", s.ledger_revenue);
    println!("Saldo consolidado     {:>16}", s.cash_balance);
    println!("Lucro líquido proj.   {:>16}", s.projected_net_profit);
    for failure in &snapshot.failures {
        if failure.mocked {
            println!("  ⚠ {} com dados de demonstração: {}", failure.source, failure.message);
        } else {
            println!("  ⚠ {} indisponível: {}", failure.source, failure.message);
        }
    }

    // Payout queue
    println!();
    println!("Repasses");
    for status in [
        PayoutStatus::AwaitingInvoice,
        PayoutStatus::UnderReview,
        PayoutStatus::Approved,
        PayoutStatus::Paid,
        PayoutStatus::Rejected,
    ] {
        let filter = PayoutFilter {
            status: Some(status),
            ..Default::default()
        };
        let listed = filter.apply(&snapshot.payouts);
        let total: Money = listed.iter().map(|p| p.amount).sum();
        println!("  {:<16} {:>3}  {}", status.label(), listed.len(), total.format(LOCAL_CURRENCY));
        for payout in listed {
            println!("    {}  {:<24} {}", payout.id, payout.beneficiary_name, payout.amount);
        }
    }

    if extract_id.is_none() && to_pay.is_empty() {
        return Ok(());
    }

    // Refused when any collection is mock data.
    let store = Arc::new(snapshot.payout_store()?);
    let manager = PayoutManager::new(client, store, config.rules.clone())
        .with_call_timeout(config.payouts.call_timeout());

    if let Some(payout_id) = extract_id {
        println!();
        match manager.extract(&payout_id, &snapshot.sales).await {
            Ok(extract) => {
                println!("Extrato {} ({} itens)", payout_id, extract.items.len());
                for item in &extract.items {
                    println!(
                        "  {}  {:<12} {:<12} {:>12} {}",
                        item.date.format("%d/%m/%Y"),
                        item.buyer_id,
                        item.package_label,
                        item.amount,
                        item.rate_label
                    );
                }
                println!("  Total {}", extract.total());
            }
            Err(e) => error!(payout_id = %payout_id, error = %e, "Could not build extract"),
        }
    }

    if !to_pay.is_empty() {
        println!();
        let report = manager.process_batch(&to_pay).await?;
        for paid in &report.paid {
            println!("  ✓ {} pago", paid.id);
        }
        for failure in &report.failed {
            println!("  ✗ {}: {}", failure.payout_id, failure.error);
        }
        for unrecorded in &report.unrecorded {
            println!(
                "  ⚠ {} pago na API, registro local não atualizado: {}",
                unrecorded.payout_id, unrecorded.error
            );
        }
    }

    Ok(())
}

/// Gateway for `--offline`: every remote call is refused.
struct OfflineGateway;

#[async_trait::async_trait]
impl PayoutGateway for OfflineGateway {
    async fn approve(&self, _payout_id: &str) -> psiuu_api::ApiResult<()> {
        Err(psiuu_api::ApiError::InvalidConfig("offline mode makes no payout calls".into()))
    }

    async fn reject(&self, _payout_id: &str, _reason: &str) -> psiuu_api::ApiResult<()> {
        Err(psiuu_api::ApiError::InvalidConfig("offline mode makes no payout calls".into()))
    }

    async fn pay(&self, _payout_id: &str) -> psiuu_api::ApiResult<()> {
        Err(psiuu_api::ApiError::InvalidConfig("offline mode makes no payout calls".into()))
    }
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=psiuu_api=trace` - Trace the API layer only
/// - Default: INFO level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    build_subscriber(filter).init();
}

/// The env filter is the only level control.
fn build_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_env_filter_sets_levels() {
        tracing::subscriber::with_default(build_subscriber(EnvFilter::new("warn")), || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn test_env_filter_per_target() {
        let filter = EnvFilter::new("info,psiuu_api=trace");
        tracing::subscriber::with_default(build_subscriber(filter), || {
            assert!(tracing::enabled!(target: "psiuu_api::client", Level::TRACE));
            assert!(!tracing::enabled!(target: "reqwest", Level::DEBUG));
        });
    }
}
