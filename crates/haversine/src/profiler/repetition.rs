//! Repeated timing of a single block.
//!
//! A [`RepetitionProfiler`] runs a block a fixed number of times, recording
//! elapsed ticks and processed bytes for each trial, and summarises them as
//! minimum, maximum, mean and median. The per-trial figures are kept in the
//! report as well; [`TrialLines`] prints them one per line as
//! `[i] <time> ms, <rate> MB/s` for charting.

use core::fmt;

use thiserror::Error;

use super::timer::{Clock, OsClock};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RepetitionError {
    #[error("a trial is already running")]
    TrialOpen,
    #[error("no trial is running")]
    NoOpenTrial,
    #[error("all {0} trials have already run")]
    Complete(usize),
    #[error("no trials recorded")]
    NoTrials,
}

/// Measurements of one finished trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct TrialSample {
    pub ticks: u64,
    pub bytes: u64,
}

/// Handle passed to the block run by [`RepetitionProfiler::run`].
#[derive(Debug, Default)]
pub struct Trial {
    bytes: u64,
}

impl Trial {
    /// Adds to the bytes processed by the current trial.
    pub fn add_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenTrial {
    started_at: u64,
    bytes: u64,
}

#[derive(Debug)]
pub struct RepetitionProfiler<C: Clock = OsClock> {
    label: String,
    trial_count: usize,
    clock: C,
    trials: Vec<TrialSample>,
    min: Option<TrialSample>,
    max: Option<TrialSample>,
    open: Option<OpenTrial>,
}

impl<C: Clock> RepetitionProfiler<C> {
    #[must_use]
    pub fn new(label: impl Into<String>, trial_count: usize, clock: C) -> Self {
        Self {
            label: label.into(),
            trial_count,
            clock,
            trials: Vec::with_capacity(trial_count),
            min: None,
            max: None,
            open: None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    /// Finished trials, in the order they ran.
    #[must_use]
    pub fn trials(&self) -> &[TrialSample] {
        &self.trials
    }

    /// Fastest trial so far.
    #[must_use]
    pub fn min(&self) -> Option<TrialSample> {
        self.min
    }

    /// Slowest trial so far.
    #[must_use]
    pub fn max(&self) -> Option<TrialSample> {
        self.max
    }

    /// Runs `block` once for every trial not yet recorded, then reports.
    ///
    /// # Errors
    ///
    /// [`RepetitionError::TrialOpen`] if a manual trial is still running,
    /// [`RepetitionError::NoTrials`] when the trial count is zero.
    pub fn run(&mut self, mut block: impl FnMut(&mut Trial)) -> Result<RepetitionReport, RepetitionError> {
        if self.open.is_some() {
            return Err(RepetitionError::TrialOpen);
        }
        tracing::debug!(
            label = %self.label,
            trials = self.trial_count,
            "starting repetition test"
        );

        while self.trials.len() < self.trial_count {
            let mut trial = Trial::default();
            let started_at = self.clock.now();
            block(&mut trial);
            let ticks = self.clock.now().saturating_sub(started_at);
            self.record(TrialSample {
                ticks,
                bytes: trial.bytes,
            });
        }
        self.report()
    }

    /// Starts a trial timed until [`end_trial`](Self::end_trial).
    ///
    /// # Errors
    ///
    /// [`RepetitionError::TrialOpen`] if one is running,
    /// [`RepetitionError::Complete`] once every trial has run.
    pub fn begin_trial(&mut self) -> Result<(), RepetitionError> {
        if self.open.is_some() {
            return Err(RepetitionError::TrialOpen);
        }
        if self.trials.len() >= self.trial_count {
            return Err(RepetitionError::Complete(self.trial_count));
        }
        self.open = Some(OpenTrial {
            started_at: self.clock.now(),
            bytes: 0,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// [`RepetitionError::NoOpenTrial`] outside a trial.
    pub fn add_bytes(&mut self, bytes: u64) -> Result<(), RepetitionError> {
        let open = self.open.as_mut().ok_or(RepetitionError::NoOpenTrial)?;
        open.bytes += bytes;
        Ok(())
    }

    /// Stops the running trial and records it.
    ///
    /// # Errors
    ///
    /// [`RepetitionError::NoOpenTrial`] outside a trial.
    pub fn end_trial(&mut self) -> Result<TrialSample, RepetitionError> {
        let now = self.clock.now();
        let open = self.open.take().ok_or(RepetitionError::NoOpenTrial)?;
        let sample = TrialSample {
            ticks: now.saturating_sub(open.started_at),
            bytes: open.bytes,
        };
        self.record(sample);
        Ok(sample)
    }

    fn record(&mut self, sample: TrialSample) {
        if self.min.is_none_or(|min| sample.ticks < min.ticks) {
            self.min = Some(sample);
        }
        if self.max.is_none_or(|max| sample.ticks > max.ticks) {
            self.max = Some(sample);
        }
        self.trials.push(sample);
    }

    /// Summarises the trials recorded so far.
    ///
    /// # Errors
    ///
    /// [`RepetitionError::NoTrials`] before the first trial finishes.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self) -> Result<RepetitionReport, RepetitionError> {
        let (Some(min), Some(max)) = (self.min, self.max) else {
            return Err(RepetitionError::NoTrials);
        };

        let mut sorted = self.trials.clone();
        sorted.sort_by_key(|trial| trial.ticks);
        let median = sorted[sorted.len() / 2];

        let count = self.trials.len() as f64;
        let mean_ticks = self.trials.iter().map(|t| t.ticks as f64).sum::<f64>() / count;
        let mean_bytes = self.trials.iter().map(|t| t.bytes as f64).sum::<f64>() / count;

        let frequency = self.clock.frequency();
        let sample_stat = |sample: TrialSample| TrialStat::from_sample(sample, frequency);

        Ok(RepetitionReport {
            label: self.label.clone(),
            trials: self.trials.len(),
            min: sample_stat(min),
            max: sample_stat(max),
            mean: TrialStat::new(mean_ticks, mean_bytes, frequency),
            median: sample_stat(median),
            samples: self.trials.iter().copied().map(sample_stat).collect(),
        })
    }
}

/// Time and throughput of one statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct TrialStat {
    pub seconds: f64,
    pub bytes: f64,
    pub megabytes_per_second: Option<f64>,
}

impl TrialStat {
    #[allow(clippy::cast_precision_loss)]
    fn new(ticks: f64, bytes: f64, frequency: u64) -> Self {
        let frequency = frequency as f64;
        let seconds = if frequency > 0.0 { ticks / frequency } else { 0.0 };
        Self {
            seconds,
            bytes,
            megabytes_per_second: (bytes > 0.0 && seconds > 0.0)
                .then(|| bytes / BYTES_PER_MEGABYTE / seconds),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_sample(sample: TrialSample, frequency: u64) -> Self {
        Self::new(sample.ticks as f64, sample.bytes as f64, frequency)
    }
}

impl fmt::Display for TrialStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} secs", self.seconds)?;
        if let Some(rate) = self.megabytes_per_second {
            write!(f, " {rate:.3} MB/s")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct RepetitionReport {
    pub label: String,
    pub trials: usize,
    pub min: TrialStat,
    pub max: TrialStat,
    pub mean: TrialStat,
    /// The trial at index `trials / 2` after sorting by time.
    pub median: TrialStat,
    /// Every trial, in the order it ran.
    pub samples: Vec<TrialStat>,
}

impl RepetitionReport {
    /// One line per trial, for piping into a chart.
    #[must_use]
    pub fn trial_lines(&self) -> TrialLines<'_> {
        TrialLines {
            samples: &self.samples,
        }
    }
}

/// Per-trial listing of a [`RepetitionReport`]: `[i] <time> ms, <rate> MB/s`.
///
/// Trials that recorded no bytes show a rate of zero.
#[derive(Debug, Clone, Copy)]
pub struct TrialLines<'a> {
    samples: &'a [TrialStat],
}

impl fmt::Display for TrialLines<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sample) in self.samples.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(
                f,
                "[{i}] {:.6} ms, {:.3} MB/s",
                sample.seconds * 1000.0,
                sample.megabytes_per_second.unwrap_or(0.0)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for RepetitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} trials)", self.label, self.trials)?;
        writeln!(f, "Min:    {}", self.min)?;
        writeln!(f, "Max:    {}", self.max)?;
        writeln!(f, "Mean:   {}", self.mean)?;
        write!(f, "Median: {}", self.median)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::ManualClock;

    #[test]
    fn runs_exactly_trial_count_trials() {
        let clock = ManualClock::new(1_000);
        let mut profiler = RepetitionProfiler::new("count", 25, clock.clone());
        let mut calls = 0;
        let report = profiler
            .run(|_| {
                calls += 1;
                clock.advance(1);
            })
            .unwrap();
        assert_eq!(calls, 25);
        assert_eq!(report.trials, 25);
        assert_eq!(profiler.trials().len(), 25);
        assert_eq!(profiler.begin_trial(), Err(RepetitionError::Complete(25)));
    }

    #[test]
    fn statistics_are_ordered() {
        let costs = [7, 3, 9, 1, 5, 5, 2];
        let clock = ManualClock::new(1_000);
        let mut profiler = RepetitionProfiler::new("varying", costs.len(), clock.clone());
        let mut next = costs.iter();
        let report = profiler
            .run(|trial| {
                clock.advance(*next.next().unwrap());
                trial.add_bytes(1024);
            })
            .unwrap();

        assert!(report.min.seconds <= report.median.seconds);
        assert!(report.median.seconds <= report.max.seconds);
        assert!(report.min.seconds <= report.mean.seconds);
        assert!(report.mean.seconds <= report.max.seconds);

        assert_eq!(report.min.seconds, 0.001);
        assert_eq!(report.max.seconds, 0.009);
        // sorted: 1 2 3 5 5 7 9
        assert_eq!(report.median.seconds, 0.005);
        assert!((report.mean.seconds - 32.0 / 7.0 / 1000.0).abs() < 1e-12);
        assert_eq!(profiler.min().unwrap().ticks, 1);
        assert_eq!(profiler.max().unwrap().ticks, 9);
    }

    #[test]
    fn manual_trials() {
        let clock = ManualClock::new(1_000);
        let mut profiler = RepetitionProfiler::new("manual", 2, clock.clone());
        assert_eq!(profiler.report(), Err(RepetitionError::NoTrials));
        assert_eq!(profiler.add_bytes(1), Err(RepetitionError::NoOpenTrial));

        profiler.begin_trial().unwrap();
        assert_eq!(profiler.begin_trial(), Err(RepetitionError::TrialOpen));
        profiler.add_bytes(2 * 1024 * 1024).unwrap();
        clock.advance(500);
        let sample = profiler.end_trial().unwrap();
        assert_eq!(
            sample,
            TrialSample {
                ticks: 500,
                bytes: 2 * 1024 * 1024
            }
        );
        assert_eq!(profiler.end_trial(), Err(RepetitionError::NoOpenTrial));

        let report = profiler.report().unwrap();
        assert_eq!(report.trials, 1);
        assert_eq!(report.min.megabytes_per_second, Some(4.0));
        assert_eq!(report.min.to_string(), "0.500000 secs 4.000 MB/s");
    }

    #[test]
    fn run_finishes_remaining_trials() {
        let clock = ManualClock::new(10);
        let mut profiler = RepetitionProfiler::new("resume", 3, clock.clone());
        profiler.begin_trial().unwrap();
        profiler.end_trial().unwrap();

        let mut calls = 0;
        let report = profiler.run(|_| calls += 1).unwrap();
        assert_eq!(calls, 2);
        assert_eq!(report.trials, 3);
        assert_eq!(report.mean.megabytes_per_second, None);
    }

    #[test]
    fn zero_trials_has_no_report() {
        let mut profiler = RepetitionProfiler::new("none", 0, ManualClock::new(1));
        assert_eq!(profiler.run(|_| {}), Err(RepetitionError::NoTrials));
    }

    #[test]
    fn report_text() {
        let clock = ManualClock::new(1_000);
        let mut profiler = RepetitionProfiler::new("read", 2, clock.clone());
        let mut cost = 0;
        let report = profiler
            .run(|trial| {
                cost += 250;
                clock.advance(cost);
                trial.add_bytes(1024 * 1024);
            })
            .unwrap();

        insta::assert_snapshot!(report.to_string(), @r"
        read (2 trials)
        Min:    0.250000 secs 4.000 MB/s
        Max:    0.500000 secs 2.000 MB/s
        Mean:   0.375000 secs 2.667 MB/s
        Median: 0.500000 secs 2.000 MB/s
        ");
    }

    #[test]
    fn lists_every_trial_in_run_order() {
        let clock = ManualClock::new(1_000);
        let mut profiler = RepetitionProfiler::new("read", 3, clock.clone());
        let mut costs = [500, 250, 125].into_iter();
        let report = profiler
            .run(|trial| {
                let cost = costs.next().unwrap();
                clock.advance(cost);
                if cost != 125 {
                    trial.add_bytes(1024 * 1024);
                }
            })
            .unwrap();

        assert_eq!(report.samples.len(), 3);
        assert_eq!(report.samples[0].seconds, 0.5);
        insta::assert_snapshot!(report.trial_lines().to_string(), @r"
        [0] 500.000000 ms, 2.000 MB/s
        [1] 250.000000 ms, 4.000 MB/s
        [2] 125.000000 ms, 0.000 MB/s
        ");
    }
}
