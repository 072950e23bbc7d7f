use std::fmt;

use log::debug;

use crate::error::{MeasurementError, Stage};
use crate::ping::ProbeResult;
use crate::ping_executor::Probe;
use crate::resolver::Resolve;

/// One (domain, provider, server) triple to measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub domain: String,
    pub provider: String,
    pub server: String,
}

#[derive(Debug)]
pub enum MeasurementOutcome {
    Success {
        address: String,
        result: ProbeResult,
    },
    NoRecord,
    Failure(MeasurementError),
}

#[derive(Debug)]
pub struct Measurement {
    pub target: Target,
    pub outcome: MeasurementOutcome,
}

impl Measurement {
    /// Best-of-N latency, or `None` for anything that produced no sample.
    pub fn min_latency(&self) -> Option<f64> {
        match &self.outcome {
            MeasurementOutcome::Success { result, .. } => result.min(),
            MeasurementOutcome::NoRecord | MeasurementOutcome::Failure(_) => None,
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match &self.outcome {
            MeasurementOutcome::Failure(err) => Some(err.stage()),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} ({})", self.domain, self.provider, self.server)
    }
}

/// Resolve the target's domain through its server, then probe the answer.
///
/// Every expected failure comes back as an outcome; this never errors.
pub async fn measure<R, P>(resolver: &R, prober: &P, target: Target, count: u32) -> Measurement
where
    R: Resolve,
    P: Probe,
{
    let outcome = run_stages(resolver, prober, &target, count).await;
    Measurement { target, outcome }
}

async fn run_stages<R, P>(
    resolver: &R,
    prober: &P,
    target: &Target,
    count: u32,
) -> MeasurementOutcome
where
    R: Resolve,
    P: Probe,
{
    let address = match resolver.resolve(&target.domain, Some(&target.server)).await {
        Ok(Some(address)) => address,
        Ok(None) => {
            debug!("{target}: no record");
            return MeasurementOutcome::NoRecord;
        }
        Err(err) => return MeasurementOutcome::Failure(MeasurementError::Resolve(err)),
    };
    debug!("{target}: resolved {address}");

    match prober.probe(&address, count).await {
        Ok(result) => {
            debug!("{target}: {address} min {:?} ms", result.min());
            MeasurementOutcome::Success { address, result }
        }
        Err(source) => MeasurementOutcome::Failure(MeasurementError::Probe { address, source }),
    }
}
