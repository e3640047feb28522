//! Time sources for the profilers.
//!
//! A [`Clock`] reports an opaque tick counter together with the number of
//! ticks per second. Profilers only ever subtract two readings of the same
//! clock and divide by its frequency.

use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Wait used by [`CpuClock::new`] to calibrate the counter.
pub const DEFAULT_CALIBRATION: Duration = Duration::from_millis(100);

pub trait Clock {
    /// Current reading, in ticks.
    fn now(&self) -> u64;

    /// Ticks per second.
    fn frequency(&self) -> u64;

    /// Converts a tick count into seconds.
    #[allow(clippy::cast_precision_loss)]
    fn seconds(&self, ticks: u64) -> f64 {
        match self.frequency() {
            0 => 0.0,
            frequency => ticks as f64 / frequency as f64,
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn frequency(&self) -> u64 {
        (**self).frequency()
    }
}

/// The operating system's monotonic clock, in nanoseconds since creation.
#[derive(Debug, Clone, Copy)]
pub struct OsClock {
    origin: Instant,
}

impl OsClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for OsClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for OsClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        NANOS_PER_SECOND
    }
}

/// Reads the processor's time stamp counter.
///
/// On targets without one this reads the OS clock in nanoseconds instead.
#[must_use]
pub fn read_cpu_timer() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: `rdtsc` is available on every x86_64 processor.
        #[allow(unused_unsafe)]
        let ticks = unsafe { core::arch::x86_64::_rdtsc() };
        ticks
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        use std::sync::OnceLock;
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        #[allow(clippy::cast_possible_truncation)]
        let nanos = ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as u64;
        nanos
    }
}

/// Estimates the frequency of [`read_cpu_timer`] by spinning for `wait`
/// against the OS clock.
///
/// Returns `0` when no OS time elapsed, which only happens for a zero wait.
#[must_use]
pub fn estimate_cpu_timer_freq(wait: Duration) -> u64 {
    let os_start = Instant::now();
    let cpu_start = read_cpu_timer();

    let mut os_elapsed = Duration::ZERO;
    while os_elapsed < wait {
        os_elapsed = os_start.elapsed();
    }

    let cpu_elapsed = read_cpu_timer().wrapping_sub(cpu_start);
    let os_nanos = os_elapsed.as_nanos();
    if os_nanos == 0 {
        return 0;
    }

    let frequency = u128::from(cpu_elapsed) * u128::from(NANOS_PER_SECOND) / os_nanos;
    let frequency = u64::try_from(frequency).unwrap_or(u64::MAX);
    tracing::debug!(?wait, frequency, "estimated CPU timer frequency");
    frequency
}

/// The time stamp counter, with a frequency estimated once at construction.
#[derive(Debug, Clone, Copy)]
pub struct CpuClock {
    frequency: u64,
}

impl CpuClock {
    /// Calibrates for [`DEFAULT_CALIBRATION`].
    #[must_use]
    pub fn new() -> Self {
        Self::calibrate(DEFAULT_CALIBRATION)
    }

    #[must_use]
    pub fn calibrate(wait: Duration) -> Self {
        Self {
            frequency: estimate_cpu_timer_freq(wait),
        }
    }
}

impl Default for CpuClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for CpuClock {
    fn now(&self) -> u64 {
        read_cpu_timer()
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give
/// another to a profiler.
///
/// ```rust
/// use haversine::profiler::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
/// handle.advance(250);
/// assert_eq!(clock.now(), 250);
/// assert_eq!(clock.seconds(clock.now()), 0.25);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    ticks: Rc<Cell<u64>>,
    frequency: u64,
}

impl ManualClock {
    #[must_use]
    pub fn new(frequency: u64) -> Self {
        Self {
            ticks: Rc::new(Cell::new(0)),
            frequency,
        }
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.set(ticks);
    }

    pub fn advance(&self, ticks: u64) {
        self.ticks.set(self.ticks.get() + ticks);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.get()
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }
}
