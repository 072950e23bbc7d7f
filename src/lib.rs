//! Compare latency to popular domains as resolved by competing DNS providers.
//!
//! Every domain is resolved through every server of every provider with
//! `dig`, the answer is pinged, and the best-of-N latencies are averaged per
//! (domain, provider) into a comparison table.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod gate;
pub mod measurement;
pub mod ping;
pub mod ping_executor;
pub mod report;
pub mod resolver;
pub mod scheduler;

use chrono::Utc;

pub use aggregate::{AggregateCell, Aggregator, Table};
pub use config::{AppConfig, ProviderConfig};
pub use error::{RunError, Stage};
pub use gate::{ConcurrencyGate, Gate};
pub use measurement::{Measurement, MeasurementOutcome, Target};
pub use ping::ProbeResult;
pub use ping_executor::{IcmpProber, PingExecutor, Probe, ProbeBackend, ProberKind};
pub use report::{OutputFormat, Report};
pub use resolver::{DigResolver, Resolve};
pub use scheduler::Scheduler;

/// Run every measurement and fold the outcomes into a table.
pub async fn compare<R, P, G>(
    scheduler: &Scheduler<R, P, G>,
    domains: &[String],
    providers: &[ProviderConfig],
) -> Result<Table, RunError>
where
    R: Resolve + 'static,
    P: Probe + 'static,
    G: Gate + 'static,
{
    let measurements = scheduler.run(domains, providers).await?;
    let mut aggregator = Aggregator::new(domains, providers);
    for measurement in &measurements {
        aggregator.record(measurement)?;
    }
    Ok(aggregator.finish())
}

/// The production scheduler for a validated config.
pub fn build_scheduler(config: &AppConfig) -> Scheduler<DigResolver, ProbeBackend, ConcurrencyGate> {
    let prober = match config.prober {
        ProberKind::External => ProbeBackend::External(PingExecutor::new(&config.ping_program)),
        ProberKind::Icmp => ProbeBackend::Icmp(IcmpProber::new(config.icmp_timeout())),
    };
    Scheduler::new(
        DigResolver::new(&config.resolver_program),
        prober,
        ConcurrencyGate::new(config.max_in_flight),
        config.best_of,
    )
}

/// Measure the configured domains and wrap the table with the run parameters.
pub async fn run(config: &AppConfig) -> Result<Report, RunError> {
    let scheduler = build_scheduler(config);
    let table = compare(&scheduler, config.selected_domains(), &config.providers).await?;
    Ok(Report {
        generated_at: Utc::now(),
        best_of: config.best_of,
        max_in_flight: config.max_in_flight,
        prober: config.prober,
        table,
    })
}
