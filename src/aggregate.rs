use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::config::ProviderConfig;
use crate::error::AggregateError;
use crate::measurement::Measurement;

/// Mean best-of-N latency for one (domain, provider) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateCell {
    pub attempted: usize,
    pub usable: usize,
    /// `None` when no sample was usable.
    pub mean: Option<f64>,
}

impl AggregateCell {
    pub fn from_samples(samples: &[Option<f64>]) -> Self {
        let present: Vec<f64> = samples.iter().flatten().copied().collect();
        let mean = (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64);
        Self {
            attempted: samples.len(),
            usable: present.len(),
            mean,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.usable == self.attempted
    }
}

impl fmt::Display for AggregateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mean {
            Some(mean) => write!(f, "{mean:.3}")?,
            None => f.write_str("∞")?,
        }
        if !self.is_complete() {
            write!(f, " ({}/{})", self.usable, self.attempted)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub domain: String,
    /// One cell per provider, in provider order.
    pub cells: Vec<AggregateCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub providers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Collects best-of-N samples into a fixed (domain, provider) grid.
///
/// The grid is laid out up front from the configuration; samples for pairs
/// outside it are rejected rather than creating new rows or columns.
#[derive(Debug)]
pub struct Aggregator {
    domains: Vec<String>,
    providers: Vec<String>,
    domain_index: HashMap<String, usize>,
    provider_index: HashMap<String, usize>,
    samples: Vec<Vec<Vec<Option<f64>>>>,
}

impl Aggregator {
    /// A name listed more than once gets a single row or column, at its first position.
    pub fn new(domains: &[String], providers: &[ProviderConfig]) -> Self {
        let domains = first_occurrences(domains.iter());
        let providers = first_occurrences(providers.iter().map(|p| &p.name));
        let index = |names: &[String]| {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>()
        };
        Self {
            domain_index: index(&domains),
            provider_index: index(&providers),
            samples: vec![vec![Vec::new(); providers.len()]; domains.len()],
            domains,
            providers,
        }
    }

    pub fn record(&mut self, measurement: &Measurement) -> Result<(), AggregateError> {
        self.record_sample(
            &measurement.target.domain,
            &measurement.target.provider,
            measurement.min_latency(),
        )
    }

    /// `None` counts as an attempt without a usable latency.
    pub fn record_sample(
        &mut self,
        domain: &str,
        provider: &str,
        min_latency: Option<f64>,
    ) -> Result<(), AggregateError> {
        let unknown = || AggregateError::UnknownKey {
            domain: domain.to_string(),
            provider: provider.to_string(),
        };
        let row = *self.domain_index.get(domain).ok_or_else(unknown)?;
        let col = *self.provider_index.get(provider).ok_or_else(unknown)?;
        self.samples[row][col].push(min_latency);
        Ok(())
    }

    pub fn finish(self) -> Table {
        let rows = self
            .domains
            .into_iter()
            .zip(self.samples)
            .map(|(domain, cells)| Row {
                domain,
                cells: cells.iter().map(|s| AggregateCell::from_samples(s)).collect(),
            })
            .collect();
        Table {
            providers: self.providers,
            rows,
        }
    }
}

fn first_occurrences<'a>(names: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .cloned()
        .collect()
}
