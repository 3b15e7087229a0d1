use crate::counters::{Pid, ProcessSample};
use crate::rate::{Percent, RateEngine};
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessEntry {
    pub sample: ProcessSample,
    pub cpu: Percent,
}

/// Rates every sample, then forgets every pid that was not among them.
/// Entries come back in enumeration order.
pub fn reconcile(
    samples: Vec<ProcessSample>,
    engine: &mut RateEngine,
    host_total_delta: u64,
) -> Vec<ProcessEntry> {
    let observed = samples.iter().map(|s| s.pid).collect::<HashSet<Pid>>();

    let entries = samples
        .into_iter()
        .map(|sample| {
            let cpu = engine.compute_process_utilization(
                sample.pid,
                sample.cpu_ticks,
                host_total_delta,
            );
            ProcessEntry { sample, cpu }
        })
        .collect::<Vec<_>>();

    let forgotten = engine.memory_mut().retain_observed(&observed);
    if forgotten > 0 {
        debug!(forgotten, remaining = engine.memory().len(), "reaped exited processes");
    }

    entries
}
