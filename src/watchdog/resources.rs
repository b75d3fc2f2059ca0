use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Point-in-time resource usage of the current process. Fields are `None`
/// when the platform cannot report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub cpu_percent: Option<f32>,
    pub resident_mb: Option<f64>,
    pub virtual_mb: Option<f64>,
}

impl ResourceUsage {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.cpu_percent.is_some() || self.resident_mb.is_some()
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cpu_percent {
            Some(cpu) => write!(f, "CPU={cpu:.1}%")?,
            None => f.write_str("CPU=unavailable")?,
        }
        match (self.resident_mb, self.virtual_mb) {
            (Some(rss), Some(vms)) => write!(f, " MEM=RSS {rss:.1}MB VMS {vms:.1}MB"),
            (Some(rss), None) => write!(f, " MEM=RSS {rss:.1}MB"),
            _ => f.write_str(" MEM=unavailable"),
        }
    }
}

/// One liveness sample emitted by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogHeartbeat {
    pub iteration: u64,
    pub elapsed: Duration,
    pub usage: ResourceUsage,
}

impl fmt::Display for WatchdogHeartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heartbeat: iteration {} after {:.1}s | {}",
            self.iteration,
            self.elapsed.as_secs_f64(),
            self.usage
        )
    }
}

/// Samples this process through `sysinfo`. Each sampler keeps its own
/// `System`, so CPU deltas are measured between calls on the same sampler.
pub struct ResourceSampler {
    system: System,
    pid: Pid,
}

impl ResourceSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Initial refresh to establish baseline for CPU calculation
        if sysinfo::IS_SUPPORTED_SYSTEM {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        }

        Self { system, pid }
    }

    pub fn sample(&mut self) -> ResourceUsage {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return ResourceUsage::unavailable();
        }

        self.system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]));
        match self.system.process(self.pid) {
            Some(process) => ResourceUsage {
                cpu_percent: Some(process.cpu_usage()),
                resident_mb: Some(process.memory() as f64 / BYTES_PER_MIB),
                virtual_mb: Some(process.virtual_memory() as f64 / BYTES_PER_MIB),
            },
            None => ResourceUsage::unavailable(),
        }
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}
