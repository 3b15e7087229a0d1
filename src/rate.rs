use crate::counters::{HostCounterSample, MemorySnapshot, Pid};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

// always within [0, 100].
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Percent(f64);

// the previous reading of everything the engine has seen.
#[derive(Debug, Default)]
pub struct RateMemory {
    host: Option<HostCounterSample>,
    processes: HashMap<Pid, u64>,
}

#[derive(Debug, Default)]
pub struct RateEngine {
    memory: RateMemory,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HostUtilization {
    pub percent: Percent,
    // summed across all cpus; zero on the first reading.
    pub total_delta: u64,
}

pub fn memory_utilization(snapshot: MemorySnapshot) -> Percent {
    if snapshot.total_bytes == 0 {
        return Percent::ZERO;
    }

    let available = snapshot.available_bytes as f64 / snapshot.total_bytes as f64;
    Percent::new((1.0 - available) * 100.0)
}

impl Percent {
    pub const ZERO: Self = Self(0.0);
    pub const MAX: Self = Self(100.0);

    /// Clamps `value` into `[0, 100]`. NaN becomes zero.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 100.0))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl RateMemory {
    pub fn host(&self) -> Option<HostCounterSample> {
        self.host
    }

    pub fn baseline(&self, pid: Pid) -> Option<u64> {
        self.processes.get(&pid).copied()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Forgets every pid not in `observed` and returns how many went.
    pub fn retain_observed(&mut self, observed: &HashSet<Pid>) -> usize {
        let before = self.processes.len();
        self.processes.retain(|pid, _| {
            let keep = observed.contains(pid);
            if !keep {
                trace!(pid, "forgetting exited process");
            }
            keep
        });
        before - self.processes.len()
    }
}

impl RateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &RateMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut RateMemory {
        &mut self.memory
    }

    // the reading always becomes the new baseline, even when it yields 0%.
    pub fn compute_host_utilization(&mut self, current: HostCounterSample) -> HostUtilization {
        let Some(previous) = self.memory.host.replace(current) else {
            return HostUtilization::default();
        };

        let total_delta = match current.total_ticks.checked_sub(previous.total_ticks) {
            Some(delta) if delta > 0 => delta,
            _ => {
                debug!(
                    previous = previous.total_ticks,
                    current = current.total_ticks,
                    "host ticks did not advance"
                );
                return HostUtilization::default();
            }
        };
        // iowait may go backwards, so this one is signed.
        let idle_delta = current.idle_ticks as f64 - previous.idle_ticks as f64;

        HostUtilization {
            percent: Percent::new((1.0 - idle_delta / total_delta as f64) * 100.0),
            total_delta,
        }
    }

    // a new pid, or one whose ticks went backwards after reuse, is 0% with a fresh baseline.
    pub fn compute_process_utilization(
        &mut self,
        pid: Pid,
        current_cpu_ticks: u64,
        host_total_delta: u64,
    ) -> Percent {
        match self.memory.processes.insert(pid, current_cpu_ticks) {
            None => {
                trace!(pid, "new process");
                Percent::ZERO
            }
            Some(prior) if current_cpu_ticks < prior => {
                debug!(
                    pid,
                    prior,
                    current = current_cpu_ticks,
                    "cpu ticks went backwards, treating pid as reused"
                );
                Percent::ZERO
            }
            Some(_) if host_total_delta == 0 => Percent::ZERO,
            Some(prior) => {
                let delta = current_cpu_ticks - prior;
                Percent::new(100.0 * delta as f64 / host_total_delta as f64)
            }
        }
    }
}
