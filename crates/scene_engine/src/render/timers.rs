//! Per-frame CPU and GPU timers
//!
//! Named timers owned by the [`crate::render::RenderManager`]. CPU timers are
//! [`Stopwatch`]es; GPU timers wrap one time-elapsed query each. GPU results
//! arrive a frame or more late, so the last resolved value is kept and
//! returned until a newer one is available.
//!
//! All timers are destroyed on scene teardown, which also releases their
//! driver queries.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::foundation::time::Stopwatch;
use crate::render::driver::{GraphicsDriver, ObjectId};
use crate::render::RenderResult;

struct GpuTimer {
    query: ObjectId,
    running: bool,
    last_ns: Option<u64>,
}

/// Named frame timers
pub struct FrameTimers {
    max_timers: usize,
    cpu: BTreeMap<String, Stopwatch>,
    gpu: BTreeMap<String, GpuTimer>,
}

impl FrameTimers {
    /// Create an empty set holding at most `max_timers` timers of each kind
    pub fn new(max_timers: usize) -> Self {
        Self {
            max_timers,
            cpu: BTreeMap::new(),
            gpu: BTreeMap::new(),
        }
    }

    /// Restart a CPU timer, creating it on first use
    ///
    /// Returns `false` when the timer limit is reached.
    pub fn begin_cpu(&mut self, name: &str) -> bool {
        if !self.cpu.contains_key(name) {
            if self.cpu.len() >= self.max_timers {
                log::warn!("Frame timer limit reached, not timing '{}'", name);
                return false;
            }
            self.cpu.insert(name.to_string(), Stopwatch::new());
        }
        if let Some(stopwatch) = self.cpu.get_mut(name) {
            stopwatch.reset();
            stopwatch.start();
        }
        true
    }

    /// Stop a CPU timer and return its measurement
    pub fn end_cpu(&mut self, name: &str) -> Option<Duration> {
        let stopwatch = self.cpu.get_mut(name)?;
        stopwatch.stop();
        Some(stopwatch.elapsed())
    }

    /// Whether a CPU timer has been started and not stopped
    pub fn is_cpu_running(&self, name: &str) -> bool {
        self.cpu.get(name).is_some_and(Stopwatch::is_running)
    }

    /// Last CPU measurement
    pub fn cpu_elapsed(&self, name: &str) -> Option<Duration> {
        self.cpu.get(name).map(Stopwatch::elapsed)
    }

    /// Start a GPU timer, creating its query on first use
    ///
    /// Only one GPU timer may run at a time; the driver nests nothing.
    pub fn begin_gpu(&mut self, driver: &mut dyn GraphicsDriver, name: &str) -> RenderResult<bool> {
        if self.gpu.values().any(|t| t.running) {
            log::warn!("GPU timer '{}' started while another is running", name);
            return Ok(false);
        }
        if !self.gpu.contains_key(name) {
            if self.gpu.len() >= self.max_timers {
                log::warn!("Frame timer limit reached, not timing '{}' on the GPU", name);
                return Ok(false);
            }
            let query = driver.create_timer_query()?;
            self.gpu.insert(
                name.to_string(),
                GpuTimer { query, running: false, last_ns: None },
            );
        }
        if let Some(timer) = self.gpu.get_mut(name) {
            driver.begin_timer_query(timer.query);
            timer.running = true;
        }
        Ok(true)
    }

    /// Stop a running GPU timer
    pub fn end_gpu(&mut self, driver: &mut dyn GraphicsDriver, name: &str) {
        if let Some(timer) = self.gpu.get_mut(name) {
            if timer.running {
                driver.end_timer_query();
                timer.running = false;
            }
        }
    }

    /// Latest resolved GPU measurement, polling the driver for a newer one
    pub fn gpu_elapsed(&mut self, driver: &mut dyn GraphicsDriver, name: &str) -> Option<Duration> {
        let timer = self.gpu.get_mut(name)?;
        if !timer.running {
            if let Some(ns) = driver.timer_query_result(timer.query) {
                timer.last_ns = Some(ns);
            }
        }
        timer.last_ns.map(Duration::from_nanos)
    }

    /// Number of live timers of both kinds
    pub fn len(&self) -> usize {
        self.cpu.len() + self.gpu.len()
    }

    /// Whether no timers exist
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every timer and release their queries
    pub fn destroy_all(&mut self, driver: &mut dyn GraphicsDriver) {
        for (name, timer) in std::mem::take(&mut self.gpu) {
            if timer.running {
                driver.end_timer_query();
            }
            driver.delete_query(timer.query);
            log::trace!("Destroyed GPU timer '{}'", name);
        }
        self.cpu.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDriver;

    #[test]
    fn test_cpu_timer_measures() {
        let mut timers = FrameTimers::new(4);
        assert!(timers.begin_cpu("sort"));
        assert!(timers.end_cpu("sort").is_some());
        assert!(timers.cpu_elapsed("sort").is_some());
        assert!(timers.cpu_elapsed("missing").is_none());
    }

    #[test]
    fn test_timer_limit() {
        let mut timers = FrameTimers::new(1);
        assert!(timers.begin_cpu("a"));
        assert!(!timers.begin_cpu("b"));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_gpu_timer_resolves_and_is_released() {
        let mut driver = HeadlessDriver::new();
        let mut timers = FrameTimers::new(4);

        assert!(timers.begin_gpu(&mut driver, "opaque").unwrap());
        assert!(!timers.begin_gpu(&mut driver, "transparent").unwrap());
        timers.end_gpu(&mut driver, "opaque");
        assert!(timers.gpu_elapsed(&mut driver, "opaque").is_some());
        assert_eq!(driver.live_object_count(), 1);

        timers.destroy_all(&mut driver);
        assert!(timers.is_empty());
        assert_eq!(driver.live_object_count(), 0);
    }
}
