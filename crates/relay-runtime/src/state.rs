//! Runtime shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use relay_agent::AgentFacade;
use relay_core::config::Config;

/// Shared state accessible from all handlers.
pub struct RuntimeState {
    pub config: Arc<Config>,
    pub agent: Arc<dyn AgentFacade>,
    in_flight: AtomicUsize,
    last_status_change: AtomicI64,
}

/// Health as reported by `GET /ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    HealthyBusy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: HealthStatus,
    /// Unix seconds of the last Healthy/HealthyBusy transition.
    pub time_of_last_update: i64,
}

impl RuntimeState {
    pub fn new(config: Arc<Config>, agent: Arc<dyn AgentFacade>) -> Self {
        Self {
            config,
            agent,
            in_flight: AtomicUsize::new(0),
            last_status_change: AtomicI64::new(chrono::Utc::now().timestamp()),
        }
    }

    /// Mark one unit of work as running until the guard drops.
    pub fn begin_work(self: &Arc<Self>) -> BusyGuard {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.touch();
        }
        BusyGuard {
            state: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn ping(&self) -> PingResponse {
        let status = if self.in_flight() > 0 {
            HealthStatus::HealthyBusy
        } else {
            HealthStatus::Healthy
        };
        PingResponse {
            status,
            time_of_last_update: self.last_status_change.load(Ordering::SeqCst),
        }
    }

    fn touch(&self) {
        self.last_status_change
            .store(chrono::Utc::now().timestamp(), Ordering::SeqCst);
    }
}

/// Keeps the runtime reporting `HealthyBusy` while alive.
pub struct BusyGuard {
    state: Arc<RuntimeState>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.state.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.touch();
        }
    }
}
