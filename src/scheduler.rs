use std::panic;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use tokio::task::JoinSet;

use crate::config::ProviderConfig;
use crate::error::SchedulerError;
use crate::gate::Gate;
use crate::measurement::{Measurement, MeasurementOutcome, Target, measure};
use crate::ping_executor::Probe;
use crate::resolver::Resolve;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAssignment {
    pub provider: String,
    pub server: String,
}

/// Interleave providers' servers: every provider's first server, then every second one, and so on.
pub fn server_assignments(providers: &[ProviderConfig]) -> Vec<ServerAssignment> {
    let depth = providers
        .iter()
        .map(|p| p.servers.len())
        .max()
        .unwrap_or(0);

    (0..depth)
        .flat_map(|i| {
            providers.iter().filter_map(move |p| {
                p.servers.get(i).map(|server| ServerAssignment {
                    provider: p.name.clone(),
                    server: server.clone(),
                })
            })
        })
        .collect()
}

/// One target per domain and server assignment, domain-major.
pub fn plan(domains: &[String], providers: &[ProviderConfig]) -> Vec<Target> {
    let assignments = server_assignments(providers);
    domains
        .iter()
        .flat_map(|domain| {
            assignments.iter().map(move |a| Target {
                domain: domain.clone(),
                provider: a.provider.clone(),
                server: a.server.clone(),
            })
        })
        .collect()
}

pub struct Scheduler<R, P, G> {
    resolver: Arc<R>,
    prober: Arc<P>,
    gate: Arc<G>,
    count: u32,
}

impl<R, P, G> Scheduler<R, P, G>
where
    R: Resolve + 'static,
    P: Probe + 'static,
    G: Gate + 'static,
{
    /// `count` is the number of echo requests per probe.
    pub fn new(resolver: R, prober: P, gate: G, count: u32) -> Self {
        Self {
            resolver: Arc::new(resolver),
            prober: Arc::new(prober),
            gate: Arc::new(gate),
            count,
        }
    }

    /// Measure every domain through every provider server and return all outcomes.
    ///
    /// Individual failures are kept as outcomes. Dropping the returned future
    /// aborts every task and kills any child process still running.
    pub async fn run(
        &self,
        domains: &[String],
        providers: &[ProviderConfig],
    ) -> Result<Vec<Measurement>, SchedulerError> {
        let targets = plan(domains, providers);
        let total = targets.len();
        let started = Instant::now();
        info!("measuring {total} targets");

        let mut tasks = JoinSet::new();
        for target in targets {
            let resolver = Arc::clone(&self.resolver);
            let prober = Arc::clone(&self.prober);
            let gate = Arc::clone(&self.gate);
            let count = self.count;
            tasks.spawn(async move {
                let _permit = gate.acquire().await?;
                Ok::<_, SchedulerError>(measure(&*resolver, &*prober, target, count).await)
            });
        }

        let mut measurements = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let measurement = match joined {
                Ok(result) => result?,
                Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
                Err(_) => return Err(SchedulerError::Cancelled),
            };
            if let MeasurementOutcome::Failure(err) = &measurement.outcome {
                warn!("{}: {err}", measurement.target);
            }
            measurements.push(measurement);
        }

        info!(
            "finished {} measurements in {:.1}s",
            measurements.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(measurements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, servers: &[&str]) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            servers: servers.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn pairs(assignments: &[ServerAssignment]) -> Vec<(&str, &str)> {
        assignments
            .iter()
            .map(|a| (a.provider.as_str(), a.server.as_str()))
            .collect()
    }

    #[test]
    fn assignments_are_index_major() {
        let providers = [provider("A", &["a1", "a2"]), provider("B", &["b1"])];
        assert_eq!(
            pairs(&server_assignments(&providers)),
            [("A", "a1"), ("B", "b1"), ("A", "a2")]
        );
    }

    #[test]
    fn assignments_cover_every_server_once() {
        let providers = [
            provider("cloudflare", &["1.1.1.1", "1.0.0.1"]),
            provider("google", &["8.8.8.8", "8.8.4.4"]),
            provider("quad9", &["9.9.9.9"]),
        ];
        assert_eq!(
            pairs(&server_assignments(&providers)),
            [
                ("cloudflare", "1.1.1.1"),
                ("google", "8.8.8.8"),
                ("quad9", "9.9.9.9"),
                ("cloudflare", "1.0.0.1"),
                ("google", "8.8.4.4"),
            ]
        );
    }

    #[test]
    fn no_providers_no_assignments() {
        assert!(server_assignments(&[]).is_empty());
    }

    #[test]
    fn plan_is_domains_times_servers() {
        let providers = [provider("A", &["a1", "a2"]), provider("B", &["b1"])];
        let domains = ["one.example".to_string(), "two.example".to_string()];
        let targets = plan(&domains, &providers);

        assert_eq!(targets.len(), 6);
        assert_eq!(targets[0].domain, "one.example");
        assert_eq!(targets[3].domain, "two.example");
        assert_eq!(targets[4].provider, "B");
        assert_eq!(targets[4].server, "b1");
    }
}
