//! Metric sources sampled on every poll tick.

use rand::Rng;
use sysinfo::{Pid, System};
use tracing::debug;

use telemon_core::{Metric, MetricsError, Result};

use crate::alloc;

/// One family of samples. A failing source is skipped for that tick.
pub trait MetricSource: Send {
    fn name(&self) -> &'static str;
    fn collect(&mut self) -> Result<Vec<Metric>>;
}

/// `PollCount` (+1 per tick) and `RandomValue` in `[0, 1)`.
#[derive(Debug, Default)]
pub struct PollSource;

impl MetricSource for PollSource {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        let random: f64 = rand::thread_rng().gen();
        Ok(vec![
            Metric::counter("PollCount", 1),
            Metric::gauge("RandomValue", random),
        ])
    }
}

/// Allocator counters plus this process's memory and CPU.
pub struct RuntimeSource {
    sys: System,
    pid: Option<Pid>,
}

impl RuntimeSource {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for RuntimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for RuntimeSource {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        let stats = alloc::snapshot();
        let mut out = vec![
            Metric::gauge("Alloc", stats.alloc as f64),
            Metric::gauge("TotalAlloc", stats.total_alloc as f64),
            Metric::gauge("Mallocs", stats.mallocs as f64),
            Metric::gauge("Frees", stats.frees as f64),
            Metric::gauge("HeapObjects", stats.heap_objects() as f64),
        ];

        let Some(pid) = self.pid else {
            debug!("current pid unknown; process stats skipped");
            return Ok(out);
        };
        self.sys.refresh_process(pid);
        match self.sys.process(pid) {
            Some(process) => {
                out.push(Metric::gauge("ProcessResident", process.memory() as f64));
                out.push(Metric::gauge("ProcessVirtual", process.virtual_memory() as f64));
                out.push(Metric::gauge("ProcessCpuPercent", f64::from(process.cpu_usage())));
            }
            None => debug!(%pid, "process not visible; process stats skipped"),
        }
        Ok(out)
    }
}

/// Host memory and per-core CPU utilisation.
pub struct HostSource {
    sys: System,
}

impl HostSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes; prime the first one.
        sys.refresh_cpu();
        Self { sys }
    }
}

impl Default for HostSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for HostSource {
    fn name(&self) -> &'static str {
        "host"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        self.sys.refresh_memory();
        self.sys.refresh_cpu();

        let total = self.sys.total_memory();
        if total == 0 {
            return Err(MetricsError::Unavailable("host memory stats unavailable".into()));
        }

        let mut out = vec![
            Metric::gauge("TotalMemory", total as f64),
            Metric::gauge("FreeMemory", self.sys.free_memory() as f64),
        ];
        for (i, cpu) in self.sys.cpus().iter().enumerate() {
            out.push(Metric::gauge(
                format!("CPUutilization{}", i + 1),
                f64::from(cpu.cpu_usage()),
            ));
        }
        Ok(out)
    }
}

/// The three standard sources.
pub fn default_sources() -> Vec<Box<dyn MetricSource>> {
    vec![
        Box::new(RuntimeSource::new()),
        Box::new(HostSource::new()),
        Box::new(PollSource),
    ]
}
