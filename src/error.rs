use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Probe output that does not match the `ping -q` summary grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised ping summary:\n{raw}")]
pub struct ParseError {
    pub raw: String,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to run resolver: {0}")]
    Spawn(#[source] io::Error),
    #[error("resolver exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to run ping: {0}")]
    Spawn(#[source] io::Error),
    #[error("ping exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("ping output could not be parsed: {stderr}")]
    Parse {
        stderr: String,
        #[source]
        source: ParseError,
    },
    #[error("not an IP address: {0}")]
    InvalidAddress(String),
    #[error("{0} echo requests exceed the icmp sequence space")]
    TooManyRequests(u32),
    #[error("could not open icmp socket: {0}")]
    Socket(#[source] io::Error),
    #[error("icmp error: {0}")]
    Icmp(#[from] surge_ping::SurgeError),
}

/// Which half of a measurement failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Probe,
}

#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("dig error: {0}")]
    Resolve(#[source] ResolveError),
    #[error("ping error ({address}): {source}")]
    Probe {
        address: String,
        #[source]
        source: ProbeError,
    },
}

impl MeasurementError {
    pub fn stage(&self) -> Stage {
        match self {
            MeasurementError::Resolve(_) => Stage::Resolve,
            MeasurementError::Probe { .. } => Stage::Probe,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("measurement batch was cancelled")]
    Cancelled,
    #[error("concurrency gate was closed")]
    GateClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("no table cell for {domain} / {provider}")]
    UnknownKey { domain: String, provider: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not find config directory")]
    NoConfigDir,
    #[error("at least one provider is required")]
    NoProviders,
    #[error("provider {0} has no servers")]
    EmptyProvider(String),
    #[error("provider {0} is listed twice")]
    DuplicateProvider(String),
    #[error("domain {0} is listed twice")]
    DuplicateDomain(String),
    #[error("domain count must be between 1 and {available}, got {requested}")]
    DomainCount { requested: usize, available: usize },
    #[error("best_of must be at least 1")]
    ZeroCount,
    #[error("best_of must be at most {max}, got {requested}")]
    CountTooLarge { requested: u32, max: u32 },
    #[error("max_in_flight must be at least 1")]
    ZeroConcurrency,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}
