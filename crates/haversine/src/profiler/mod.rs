//! Nested-region instrumentation.
//!
//! A [`Profiler`] owns a fixed table of measurement slots and a stack of open
//! regions. Each instrumented call site is given its own slot once, through a
//! [`CallSite`] static, so opening a region is an index into the table rather
//! than a lookup by name.
//!
//! For every slot the profiler accumulates
//!
//! * **exclusive** time: time spent in the region while it was on top of the
//!   stack, i.e. excluding nested regions;
//! * **inclusive** time: wall time of the outermost invocation, including
//!   nested regions. Re-entering a slot recursively is not counted twice;
//! * a call count and an optional byte count for throughput.
//!
//! Regions opened through [`profile_scope!`](crate::profile_scope) also remember
//! the file and line of the call site. They are printed next to the label when
//! the profiler was built with [`Profiler::show_locations`], or when the report
//! is formatted with `{:#}`.
//!
//! Building with the `disable-profiler` feature turns every `profile_scope!`
//! into an inert guard: nothing is timed and the report has no regions.
//!
//! ```rust
//! use haversine::{profile_scope, profiler::{ManualClock, Profiler}};
//!
//! let clock = ManualClock::new(1_000);
//! let mut profiler = Profiler::with_clock("demo", clock.clone());
//! {
//!     let mut outer = profile_scope!(profiler, "outer");
//!     clock.advance(10);
//!     {
//!         let _inner = profile_scope!(outer, "inner", bytes = 1024);
//!         clock.advance(30);
//!     }
//!     clock.advance(5);
//! }
//!
//! # if cfg!(feature = "disable-profiler") { return; }
//! let report = profiler.end().unwrap();
//! let outer = &report.regions[0];
//! let inner = &report.regions[1];
//! assert_eq!(outer.inclusive_ticks, outer.exclusive_ticks + inner.inclusive_ticks);
//! assert_eq!(inner.bytes, 1024);
//! ```

use core::{
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

use thiserror::Error;

pub mod repetition;
pub mod timer;

pub use repetition::{
    RepetitionError, RepetitionProfiler, RepetitionReport, Trial, TrialLines, TrialSample,
    TrialStat,
};
pub use timer::{Clock, CpuClock, ManualClock, OsClock, estimate_cpu_timer_freq, read_cpu_timer};

/// Size of the slot table. Slot `0` is never handed out.
pub const MAX_SLOTS: usize = 64;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("slot {slot} is outside the table of {MAX_SLOTS} slots")]
    SlotOutOfRange { slot: usize },
    #[error("region closed while no region is open")]
    Unbalanced,
    #[error("bytes recorded while no region is open")]
    NoOpenRegion,
    #[error("profiler has already ended")]
    Ended,
}

/// Source position of an instrumented call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Index of a measurement slot, and the call site that claimed it if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: usize,
    location: Option<Location>,
}

impl SlotId {
    /// Wraps a raw slot index. Valid indices are `1..MAX_SLOTS`.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            location: None,
        }
    }

    #[must_use]
    pub const fn at(index: usize, location: Location) -> Self {
        Self {
            index,
            location: Some(location),
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn location(self) -> Option<Location> {
        self.location
    }
}

static NEXT_SLOT: AtomicUsize = AtomicUsize::new(1);

/// Assigns one slot to an instrumented call site, the first time it runs.
///
/// Slots are numbered process-wide in order of first use, so every profiler
/// agrees on them. [`profile_scope!`](crate::profile_scope) declares one of
/// these per invocation.
#[derive(Debug)]
pub struct CallSite {
    slot: AtomicUsize,
    location: Location,
}

impl CallSite {
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self {
            slot: AtomicUsize::new(0),
            location: Location { file, line },
        }
    }

    #[must_use]
    pub const fn location(&self) -> Location {
        self.location
    }

    pub fn slot(&self) -> SlotId {
        let assigned = self.slot.load(Ordering::Relaxed);
        if assigned != 0 {
            return SlotId::at(assigned, self.location);
        }

        let fresh = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
        let index = match self
            .slot
            .compare_exchange(0, fresh, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => fresh,
            Err(existing) => existing,
        };
        SlotId::at(index, self.location)
    }
}

/// Name of the function enclosing a marker function item.
///
/// `profile_scope!` without a label declares a local `fn` and passes it here,
/// so the label is the bare name of the instrumented function. Closures are
/// attributed to the function they are written in.
#[doc(hidden)]
#[must_use]
pub fn function_label<F>(_marker: F) -> &'static str {
    enclosing_function(core::any::type_name::<F>())
}

fn enclosing_function(marker_path: &'static str) -> &'static str {
    let mut path = marker_path
        .rsplit_once("::")
        .map_or(marker_path, |(outer, _)| outer);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path.rsplit_once("::").map_or(path, |(_, name)| name)
}

/// Opens a region for the enclosing call site and returns its [`Scope`].
///
/// The first argument is anything with a `scope` method: a [`Profiler`], a
/// `&mut Profiler`, or an enclosing [`Scope`]. Without a label the region is
/// named after the enclosing function.
///
/// ```rust
/// use haversine::{profile_scope, profiler::Profiler};
///
/// fn checksum(profiler: &mut Profiler, data: &[u8]) -> u64 {
///     let _scope = profile_scope!(profiler);
///     data.iter().map(|&b| u64::from(b)).sum()
/// }
///
/// let mut profiler = Profiler::new("example");
/// for _ in 0..3 {
///     let mut scope = profile_scope!(profiler, "loop body");
///     checksum(&mut scope, b"abc");
/// }
/// # if cfg!(feature = "disable-profiler") { return; }
/// let report = profiler.end().unwrap();
/// assert_eq!(report.region("loop body").unwrap().calls, 3);
/// assert_eq!(report.region("checksum").unwrap().calls, 3);
/// ```
#[cfg(not(feature = "disable-profiler"))]
#[macro_export]
macro_rules! profile_scope {
    ($profiler:expr) => {{
        fn __profile_scope_marker() {}
        static SITE: $crate::profiler::CallSite =
            $crate::profiler::CallSite::new(file!(), line!());
        $profiler.scope(
            SITE.slot(),
            $crate::profiler::function_label(__profile_scope_marker),
        )
    }};
    ($profiler:expr, $label:expr) => {{
        static SITE: $crate::profiler::CallSite =
            $crate::profiler::CallSite::new(file!(), line!());
        $profiler.scope(SITE.slot(), $label)
    }};
    ($profiler:expr, $label:expr, bytes = $bytes:expr) => {{
        static SITE: $crate::profiler::CallSite =
            $crate::profiler::CallSite::new(file!(), line!());
        $profiler.scope_with_bytes(SITE.slot(), $label, $bytes)
    }};
}

/// Profiling is compiled out: every region is an inert [`Scope`].
#[cfg(feature = "disable-profiler")]
#[macro_export]
macro_rules! profile_scope {
    ($profiler:expr) => {
        $profiler.inert_scope()
    };
    ($profiler:expr, $label:expr) => {{
        let _ = $label;
        $profiler.inert_scope()
    }};
    ($profiler:expr, $label:expr, bytes = $bytes:expr) => {{
        let _ = ($label, $bytes);
        $profiler.inert_scope()
    }};
}

#[derive(Debug, Clone, Copy, Default)]
struct Anchor {
    label: &'static str,
    location: Option<Location>,
    calls: u64,
    exclusive: u64,
    inclusive: u64,
    bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    slot: usize,
    opened_at: u64,
    /// Start of the current stretch of exclusive time.
    checkpoint: u64,
    /// Inclusive time of the slot before this invocation opened.
    prior_inclusive: u64,
}

/// Measures nested regions against a [`Clock`].
#[derive(Debug)]
pub struct Profiler<C: Clock = OsClock> {
    name: String,
    clock: C,
    started_at: u64,
    anchors: [Anchor; MAX_SLOTS],
    stack: Vec<Frame>,
    ended: bool,
    show_locations: bool,
}

impl Profiler<OsClock> {
    /// Creates a profiler timed by the OS clock.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, OsClock::new())
    }
}

impl<C: Clock> Profiler<C> {
    /// Creates a profiler and starts its total-time measurement.
    #[must_use]
    pub fn with_clock(name: impl Into<String>, clock: C) -> Self {
        let started_at = clock.now();
        Self {
            name: name.into(),
            clock,
            started_at,
            anchors: [Anchor::default(); MAX_SLOTS],
            stack: Vec::with_capacity(MAX_SLOTS),
            ended: false,
            show_locations: false,
        }
    }

    /// Print each region's call site in the report table.
    #[must_use]
    pub fn show_locations(mut self, show: bool) -> Self {
        self.show_locations = show;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of regions currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Opens a region in `slot`.
    ///
    /// Time elapsed in the enclosing region up to now is charged to it as
    /// exclusive time.
    ///
    /// # Errors
    ///
    /// [`ProfilerError::SlotOutOfRange`] for slot `0` or beyond the table,
    /// [`ProfilerError::Ended`] after [`end`](Self::end).
    pub fn begin_block(&mut self, slot: SlotId, label: &'static str) -> Result<(), ProfilerError> {
        if self.ended {
            return Err(ProfilerError::Ended);
        }
        let location = slot.location();
        let slot = slot.index();
        if slot == 0 || slot >= MAX_SLOTS {
            return Err(ProfilerError::SlotOutOfRange { slot });
        }

        let now = self.clock.now();
        if let Some(parent) = self.stack.last_mut() {
            self.anchors[parent.slot].exclusive += now.saturating_sub(parent.checkpoint);
            parent.checkpoint = now;
        }

        let anchor = &mut self.anchors[slot];
        anchor.label = label;
        anchor.location = location;
        anchor.calls += 1;
        self.stack.push(Frame {
            slot,
            opened_at: now,
            checkpoint: now,
            prior_inclusive: anchor.inclusive,
        });
        Ok(())
    }

    /// Closes the most recently opened region.
    ///
    /// # Errors
    ///
    /// [`ProfilerError::Unbalanced`] when no region is open,
    /// [`ProfilerError::Ended`] after [`end`](Self::end).
    pub fn end_block(&mut self) -> Result<(), ProfilerError> {
        if self.ended {
            return Err(ProfilerError::Ended);
        }
        let now = self.clock.now();
        self.close_top(now).ok_or(ProfilerError::Unbalanced)
    }

    fn close_top(&mut self, now: u64) -> Option<()> {
        let frame = self.stack.pop()?;
        let anchor = &mut self.anchors[frame.slot];
        anchor.exclusive += now.saturating_sub(frame.checkpoint);
        // the outermost invocation of a slot overwrites what nested ones added
        anchor.inclusive = frame.prior_inclusive + now.saturating_sub(frame.opened_at);

        if let Some(parent) = self.stack.last_mut() {
            parent.checkpoint = now;
        }
        Some(())
    }

    /// Attributes `bytes` to the innermost open region.
    ///
    /// # Errors
    ///
    /// [`ProfilerError::NoOpenRegion`] when nothing is open.
    pub fn add_bytes(&mut self, bytes: u64) -> Result<(), ProfilerError> {
        let frame = self.stack.last().ok_or(ProfilerError::NoOpenRegion)?;
        self.anchors[frame.slot].bytes += bytes;
        Ok(())
    }

    /// Opens a region that closes when the returned guard is dropped.
    ///
    /// The guard dereferences to the profiler, so nested regions are opened
    /// through it. If the region cannot be opened the failure is logged and
    /// the guard does nothing on drop.
    pub fn scope(&mut self, slot: SlotId, label: &'static str) -> Scope<'_, C> {
        let active = match self.begin_block(slot, label) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(label, %err, "profiler region not opened");
                false
            }
        };
        Scope {
            profiler: self,
            active,
        }
    }

    /// Like [`scope`](Self::scope), with `bytes` already attributed to the
    /// new region.
    pub fn scope_with_bytes(&mut self, slot: SlotId, label: &'static str, bytes: u64) -> Scope<'_, C> {
        let mut scope = self.scope(slot, label);
        if scope.active {
            // cannot fail: the region was just opened
            let _ = scope.profiler.add_bytes(bytes);
        }
        scope
    }

    /// A guard that opens nothing. `profile_scope!` expands to this when the
    /// `disable-profiler` feature is on.
    #[doc(hidden)]
    pub fn inert_scope(&mut self) -> Scope<'_, C> {
        Scope {
            profiler: self,
            active: false,
        }
    }

    /// Runs `f` inside a region.
    pub fn time<T>(&mut self, slot: SlotId, label: &'static str, f: impl FnOnce(&mut Self) -> T) -> T {
        let mut scope = self.scope(slot, label);
        f(&mut *scope)
    }

    /// Stops the profiler and returns the summary.
    ///
    /// Regions still open are closed at the same instant and logged. Only the
    /// first call produces a report; later calls return `None`.
    pub fn end(&mut self) -> Option<ProfileReport> {
        if self.ended {
            return None;
        }
        let now = self.clock.now();
        while let Some(frame) = self.stack.last() {
            tracing::warn!(
                label = self.anchors[frame.slot].label,
                "profiler region still open at end; closing it"
            );
            self.close_top(now);
        }
        self.ended = true;

        let total_ticks = now.saturating_sub(self.started_at);
        let mut report = ProfileReport::build(&self.name, &self.clock, total_ticks, &self.anchors);
        report.show_locations = self.show_locations;
        tracing::info!(
            profiler = %self.name,
            seconds = report.total_seconds,
            "finished profiler"
        );
        Some(report)
    }
}

/// An open region; closes it on drop.
#[derive(Debug)]
pub struct Scope<'p, C: Clock = OsClock> {
    profiler: &'p mut Profiler<C>,
    active: bool,
}

impl<C: Clock> Scope<'_, C> {
    /// Whether the region was actually opened.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Attributes `bytes` to the innermost open region, normally this one.
    /// An inactive guard drops them instead of charging an enclosing region.
    ///
    /// # Errors
    ///
    /// [`ProfilerError::NoOpenRegion`] if the region was closed behind the
    /// guard's back.
    pub fn add_bytes(&mut self, bytes: u64) -> Result<(), ProfilerError> {
        if !self.active {
            return Ok(());
        }
        self.profiler.add_bytes(bytes)
    }
}

impl<C: Clock> Deref for Scope<'_, C> {
    type Target = Profiler<C>;

    fn deref(&self) -> &Self::Target {
        self.profiler
    }
}

impl<C: Clock> DerefMut for Scope<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.profiler
    }
}

impl<C: Clock> Drop for Scope<'_, C> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let result = self.profiler.end_block();
        debug_assert!(
            result.is_ok() || self.profiler.is_ended(),
            "scope closed out of order: {result:?}"
        );
    }
}

/// One row of a [`ProfileReport`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct RegionReport {
    pub label: &'static str,
    pub location: Option<Location>,
    pub slot: usize,
    pub calls: u64,
    pub exclusive_ticks: u64,
    pub inclusive_ticks: u64,
    pub exclusive_seconds: f64,
    pub inclusive_seconds: f64,
    /// Share of the profiler's total time, in percent.
    pub exclusive_percent: f64,
    pub inclusive_percent: f64,
    pub bytes: u64,
    /// `bytes` over exclusive time, when bytes were recorded.
    pub megabytes_per_second: Option<f64>,
}

/// Summary produced by [`Profiler::end`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct ProfileReport {
    pub name: String,
    pub total_ticks: u64,
    pub total_seconds: f64,
    pub timer_frequency: u64,
    /// Regions with at least one call, in slot order.
    pub regions: Vec<RegionReport>,
    /// Print call sites in the table. `{:#}` prints them regardless.
    #[cfg_attr(any(test, feature = "serde"), serde(skip))]
    pub show_locations: bool,
}

impl ProfileReport {
    #[allow(clippy::cast_precision_loss)]
    fn build<C: Clock>(name: &str, clock: &C, total_ticks: u64, anchors: &[Anchor]) -> Self {
        let percent = |ticks: u64| {
            if total_ticks == 0 {
                0.0
            } else {
                ticks as f64 / total_ticks as f64 * 100.0
            }
        };

        let regions = anchors
            .iter()
            .enumerate()
            .filter(|(_, anchor)| anchor.calls > 0)
            .map(|(slot, anchor)| {
                let exclusive_seconds = clock.seconds(anchor.exclusive);
                let megabytes_per_second = (anchor.bytes > 0 && exclusive_seconds > 0.0)
                    .then(|| anchor.bytes as f64 / BYTES_PER_MEGABYTE / exclusive_seconds);
                RegionReport {
                    label: anchor.label,
                    location: anchor.location,
                    slot,
                    calls: anchor.calls,
                    exclusive_ticks: anchor.exclusive,
                    inclusive_ticks: anchor.inclusive,
                    exclusive_seconds,
                    inclusive_seconds: clock.seconds(anchor.inclusive),
                    exclusive_percent: percent(anchor.exclusive),
                    inclusive_percent: percent(anchor.inclusive),
                    bytes: anchor.bytes,
                    megabytes_per_second,
                }
            })
            .collect();

        Self {
            name: name.to_owned(),
            total_ticks,
            total_seconds: clock.seconds(total_ticks),
            timer_frequency: clock.frequency(),
            regions,
            show_locations: false,
        }
    }

    /// Looks up a region by label.
    #[must_use]
    pub fn region(&self, label: &str) -> Option<&RegionReport> {
        self.regions.iter().find(|r| r.label == label)
    }
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Profiler {} finished in {:.6} seconds",
            self.name, self.total_seconds
        )?;
        let show_locations = self.show_locations || f.alternate();
        let names: Vec<String> = self
            .regions
            .iter()
            .map(|region| match region.location {
                Some(location) if show_locations => {
                    format!("{} [{}] {location}", region.label, region.calls)
                }
                _ => format!("{} [{}]", region.label, region.calls),
            })
            .collect();
        let width = names.iter().map(String::len).max().unwrap_or(0).max(28);

        writeln!(
            f,
            "{:<width$} | {:<26} | {:<26} | Bandwidth",
            "Name[n]", "Time (Ex)", "Time (Inc)"
        )?;
        write!(f, "{}", "-".repeat(width + 72))?;
        for (region, name) in self.regions.iter().zip(&names) {
            let exclusive = format!(
                "{:.5} secs ({:.2}%)",
                region.exclusive_seconds, region.exclusive_percent
            );
            let inclusive = format!(
                "{:.5} secs ({:.2}%)",
                region.inclusive_seconds, region.inclusive_percent
            );
            write!(f, "\n{name:<width$} | {exclusive:<26} | {inclusive:<26} |")?;
            if let Some(rate) = region.megabytes_per_second {
                write!(f, " {rate:.3} MB/s")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SlotId = SlotId::new(1);
    const B: SlotId = SlotId::new(2);

    fn profiler() -> (Profiler<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_000);
        (Profiler::with_clock("test", clock.clone()), clock)
    }

    #[test]
    fn nested_region_is_excluded_from_parent() {
        let (mut p, clock) = profiler();
        p.begin_block(A, "a").unwrap();
        clock.advance(10);
        p.begin_block(B, "b").unwrap();
        clock.advance(20);
        p.end_block().unwrap();
        clock.advance(5);
        p.end_block().unwrap();

        let report = p.end().unwrap();
        let a = report.region("a").unwrap();
        let b = report.region("b").unwrap();
        assert_eq!((a.exclusive_ticks, a.inclusive_ticks), (15, 35));
        assert_eq!((b.exclusive_ticks, b.inclusive_ticks), (20, 20));
        assert_eq!(a.inclusive_ticks, a.exclusive_ticks + b.inclusive_ticks);
    }

    #[test]
    fn recursion_does_not_double_count_inclusive_time() {
        let (mut p, clock) = profiler();
        p.begin_block(A, "a").unwrap();
        clock.advance(10);
        p.begin_block(A, "a").unwrap();
        clock.advance(10);
        p.end_block().unwrap();
        clock.advance(10);
        p.end_block().unwrap();

        let a = p.end().unwrap().regions[0].clone();
        assert_eq!(a.calls, 2);
        assert_eq!(a.exclusive_ticks, 30);
        assert_eq!(a.inclusive_ticks, 30);
    }

    #[test]
    fn repeated_calls_accumulate() {
        let (mut p, clock) = profiler();
        for _ in 0..7 {
            p.begin_block(A, "a").unwrap();
            clock.advance(3);
            p.end_block().unwrap();
        }
        let a = p.end().unwrap().regions[0].clone();
        assert_eq!(a.calls, 7);
        assert_eq!(a.inclusive_ticks, 21);
    }

    #[test]
    fn misuse_is_reported() {
        let (mut p, _clock) = profiler();
        assert_eq!(p.end_block(), Err(ProfilerError::Unbalanced));
        assert_eq!(p.add_bytes(1), Err(ProfilerError::NoOpenRegion));
        assert_eq!(
            p.begin_block(SlotId::new(0), "zero"),
            Err(ProfilerError::SlotOutOfRange { slot: 0 })
        );
        assert_eq!(
            p.begin_block(SlotId::new(MAX_SLOTS), "past"),
            Err(ProfilerError::SlotOutOfRange { slot: MAX_SLOTS })
        );
    }

    #[test]
    fn end_is_idempotent_and_closes_open_regions() {
        let (mut p, clock) = profiler();
        p.begin_block(A, "a").unwrap();
        clock.advance(40);

        let report = p.end().unwrap();
        assert_eq!(report.region("a").unwrap().inclusive_ticks, 40);
        assert_eq!(p.depth(), 0);
        assert!(p.end().is_none());
        assert_eq!(p.begin_block(A, "a"), Err(ProfilerError::Ended));
    }

    #[test]
    fn scope_guard_closes_on_every_exit_path() {
        fn early_return(p: &mut Profiler<ManualClock>, clock: &ManualClock, bail: bool) -> u32 {
            let _scope = p.scope(B, "b");
            clock.advance(2);
            if bail {
                return 1;
            }
            clock.advance(2);
            0
        }

        let (mut p, clock) = profiler();
        {
            let mut outer = p.scope(A, "a");
            early_return(&mut outer, &clock, true);
            early_return(&mut outer, &clock, false);
            assert_eq!(outer.depth(), 1);
        }
        assert_eq!(p.depth(), 0);

        let report = p.end().unwrap();
        let b = report.region("b").unwrap();
        assert_eq!((b.calls, b.inclusive_ticks), (2, 6));
        assert_eq!(report.region("a").unwrap().inclusive_ticks, 6);
    }

    #[test]
    fn scope_after_end_is_inert() {
        let (mut p, _clock) = profiler();
        p.end();
        let scope = p.scope(A, "a");
        assert!(!scope.is_active());
    }

    #[test]
    fn time_wraps_a_closure() {
        let (mut p, clock) = profiler();
        let value = p.time(A, "a", |p| {
            clock.advance(4);
            p.add_bytes(2 * 1024 * 1024).unwrap();
            42
        });
        assert_eq!(value, 42);

        let a = p.end().unwrap().regions[0].clone();
        assert_eq!(a.bytes, 2 * 1024 * 1024);
        // 2 MiB in 4 ms
        assert!((a.megabytes_per_second.unwrap() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn call_sites_get_distinct_stable_slots() {
        static FIRST: CallSite = CallSite::new("first.rs", 1);
        static SECOND: CallSite = CallSite::new("second.rs", 2);
        let a = FIRST.slot();
        let b = SECOND.slot();
        assert_ne!(a.index(), b.index());
        assert_ne!(a.index(), 0);
        assert_eq!(FIRST.slot(), a);
        assert_eq!(
            a.location(),
            Some(Location {
                file: "first.rs",
                line: 1
            })
        );
    }

    #[test]
    fn enclosing_function_names() {
        assert_eq!(enclosing_function("haversine::decode::marker"), "decode");
        assert_eq!(enclosing_function("main::marker"), "main");
        assert_eq!(
            enclosing_function("app::run::{{closure}}::{{closure}}::marker"),
            "run"
        );
        assert_eq!(
            enclosing_function("<app::Reader as app::Source>::fill::marker"),
            "fill"
        );
    }

    #[test]
    fn function_label_names_the_caller() {
        fn parse_header() -> &'static str {
            fn marker() {}
            function_label(marker)
        }
        assert_eq!(parse_header(), "parse_header");
    }

    #[test]
    fn inert_scope_records_nothing() {
        let (mut p, clock) = profiler();
        {
            let mut outer = p.scope(A, "a");
            {
                let mut inert = outer.inert_scope();
                assert!(!inert.is_active());
                clock.advance(5);
                inert.add_bytes(100).unwrap();
                assert_eq!(inert.depth(), 1);
            }
            assert_eq!(outer.depth(), 1);
        }
        let report = p.end().unwrap();
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.region("a").unwrap().bytes, 0);
    }

    #[test]
    fn report_table_with_locations() {
        let site = Location {
            file: "crates/haversine-cli/src/main.rs",
            line: 237,
        };
        let (p, clock) = profiler();
        let mut p = p.show_locations(true);
        p.begin_block(SlotId::at(1, site), "parse").unwrap();
        clock.advance(500);
        p.end_block().unwrap();
        p.begin_block(B, "sum").unwrap();
        clock.advance(500);
        p.end_block().unwrap();

        let report = p.end().unwrap();
        assert_eq!(report.region("parse").unwrap().location, Some(site));
        assert_eq!(report.region("sum").unwrap().location, None);
        insta::assert_snapshot!(report.to_string(), @r"
        Profiler test finished in 1.000000 seconds
        Name[n]                                        | Time (Ex)                  | Time (Inc)                 | Bandwidth
        ----------------------------------------------------------------------------------------------------------------------
        parse [1] crates/haversine-cli/src/main.rs:237 | 0.50000 secs (50.00%)      | 0.50000 secs (50.00%)      |
        sum [1]                                        | 0.50000 secs (50.00%)      | 0.50000 secs (50.00%)      |
        ");
    }

    #[test]
    fn alternate_format_shows_locations() {
        let (mut p, clock) = profiler();
        let site = Location {
            file: "lib.rs",
            line: 9,
        };
        p.begin_block(SlotId::at(1, site), "a").unwrap();
        clock.advance(1);
        p.end_block().unwrap();

        let report = p.end().unwrap();
        assert!(!report.to_string().contains("lib.rs:9"));
        assert!(format!("{report:#}").contains("a [1] lib.rs:9"));
    }

    #[cfg(not(feature = "disable-profiler"))]
    #[test]
    fn macro_records_call_site_and_function_name() {
        fn load_input(p: &mut Profiler<ManualClock>) -> u32 {
            let _scope = crate::profile_scope!(p);
            7
        }

        let (mut p, _clock) = profiler();
        let line = line!() + 1;
        let scope = crate::profile_scope!(p, "outer");
        drop(scope);
        load_input(&mut p);

        let report = p.end().unwrap();
        let outer = report.region("outer").unwrap();
        assert_eq!(
            outer.location,
            Some(Location {
                file: file!(),
                line
            })
        );
        assert_eq!(report.region("load_input").unwrap().calls, 1);
    }

    #[cfg(feature = "disable-profiler")]
    #[test]
    fn disabled_macro_records_nothing() {
        let (mut p, clock) = profiler();
        {
            let mut scope = crate::profile_scope!(p, "outer", bytes = 10);
            assert!(!scope.is_active());
            clock.advance(3);
            scope.add_bytes(5).unwrap();
        }
        let report = p.end().unwrap();
        assert!(report.regions.is_empty());
        assert_eq!(report.total_ticks, 3);
    }

    #[test]
    fn report_table() {
        let (mut p, clock) = profiler();
        p.begin_block(A, "parse").unwrap();
        clock.advance(250);
        p.add_bytes(1024 * 1024).unwrap();
        p.begin_block(B, "sum").unwrap();
        clock.advance(750);
        p.end_block().unwrap();
        p.end_block().unwrap();

        let report = p.end().unwrap();
        insta::assert_snapshot!(report.to_string(), @r"
        Profiler test finished in 1.000000 seconds
        Name[n]                      | Time (Ex)                  | Time (Inc)                 | Bandwidth
        ----------------------------------------------------------------------------------------------------
        parse [1]                    | 0.25000 secs (25.00%)      | 1.00000 secs (100.00%)     | 4.000 MB/s
        sum [1]                      | 0.75000 secs (75.00%)      | 0.75000 secs (75.00%)      |
        ");
    }

    #[test]
    fn report_serializes() {
        let (mut p, clock) = profiler();
        p.begin_block(A, "a").unwrap();
        clock.advance(500);
        p.end_block().unwrap();

        let json = serde_json::to_value(p.end().unwrap()).unwrap();
        assert_eq!(json["name"], "test");
        assert_eq!(json["regions"][0]["label"], "a");
        assert!(json["regions"][0]["location"].is_null());
        assert!(json.get("show_locations").is_none());
        assert_eq!(json["regions"][0]["inclusive_seconds"], 0.5);
        assert!(json["regions"][0]["megabytes_per_second"].is_null());
    }
}
