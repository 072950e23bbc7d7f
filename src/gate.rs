//! Optional limit on how many measurements are in flight at once.
//!
//! A permit is taken before a measurement resolves and released when it is
//! dropped, after the probe has finished.

use std::future::Future;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::SchedulerError;

pub trait Gate: Send + Sync {
    fn acquire(&self) -> impl Future<Output = Result<GatePermit<'_>, SchedulerError>> + Send;
}

/// Held for the duration of one measurement. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _permit: Option<SemaphorePermit<'a>>,
}

impl GatePermit<'_> {
    /// A permit that holds nothing.
    pub fn unlimited() -> Self {
        Self { _permit: None }
    }
}

#[derive(Debug)]
pub enum ConcurrencyGate {
    Bounded { semaphore: Semaphore, limit: usize },
    Unbounded,
}

impl ConcurrencyGate {
    /// `None` disables limiting.
    pub fn new(max_in_flight: Option<usize>) -> Self {
        match max_in_flight {
            Some(limit) => ConcurrencyGate::Bounded {
                semaphore: Semaphore::new(limit),
                limit,
            },
            None => ConcurrencyGate::Unbounded,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            ConcurrencyGate::Bounded { limit, .. } => Some(*limit),
            ConcurrencyGate::Unbounded => None,
        }
    }
}

impl Gate for ConcurrencyGate {
    async fn acquire(&self) -> Result<GatePermit<'_>, SchedulerError> {
        match self {
            ConcurrencyGate::Bounded { semaphore, .. } => {
                let permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| SchedulerError::GateClosed)?;
                Ok(GatePermit {
                    _permit: Some(permit),
                })
            }
            ConcurrencyGate::Unbounded => Ok(GatePermit::unlimited()),
        }
    }
}
