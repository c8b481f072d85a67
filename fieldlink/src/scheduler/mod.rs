/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cycle scheduling with watchdog-safe waiting.
//!
//! [`CycleScheduler`] is the pure timing state machine; [`Station`] drives it
//! with the tokio timer and owns the pipeline and the liveness sink.
//!
//! ```text
//!            elapsed ≥ period
//!   Waiting ─────────────────────► Running
//!     ▲  │ sleep ≤ pulse_interval     │ run_cycle()
//!     │  └─► pulse ─┐                 │
//!     └─────────────┘◄────────────────┘ baseline = now (cycle end), pulse
//! ```
//!
//! # Timing rules
//! * Elapsed time is measured on the monotonic clock (`tokio::time::Instant`),
//!   so wall-clock adjustments never fire or suppress a cycle.
//! * The baseline is reset when the cycle body **completes**.  A slow cycle
//!   pushes the next one back; there is no catch-up.
//! * A wait is never one long sleep: it is cut into slices of at most
//!   `pulse_interval`, with a liveness pulse after each slice.
//! * There is no terminal state.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::config::StationConfig;
use crate::liveness::Liveness;
use crate::pipeline::{CycleReport, Pipeline};

// ── CycleScheduler ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Waiting,
    Running,
}

/// Decision for one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The period has elapsed; run a cycle now.
    Due,
    /// Keep waiting; `remaining` until the period elapses.
    Wait { remaining: Duration },
}

/// Period bookkeeping.  Holds no I/O and never sleeps.
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    period: Duration,
    pulse_interval: Duration,
    baseline: Instant,
    state: SchedulerState,
    /// Set by [`fire_immediately`](Self::fire_immediately) until the next cycle begins.
    due_now: bool,
}

impl CycleScheduler {
    /// Start waiting at `baseline`; the first cycle is due one period later.
    ///
    /// A zero `pulse_interval` is raised to one millisecond so a wait always
    /// makes progress.
    pub fn new(period: Duration, pulse_interval: Duration, baseline: Instant) -> Self {
        Self {
            period,
            pulse_interval: pulse_interval.max(Duration::from_millis(1)),
            baseline,
            state: SchedulerState::Waiting,
            due_now: false,
        }
    }

    /// Make the first cycle due immediately.
    pub fn fire_immediately(&mut self) {
        self.due_now = true;
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn baseline(&self) -> Instant {
        self.baseline
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn pulse_interval(&self) -> Duration {
        self.pulse_interval
    }

    /// Is a cycle due at `now`?
    pub fn poll(&self, now: Instant) -> Tick {
        if self.due_now {
            return Tick::Due;
        }
        let elapsed = now.saturating_duration_since(self.baseline);
        if elapsed >= self.period {
            Tick::Due
        } else {
            Tick::Wait {
                remaining: self.period - elapsed,
            }
        }
    }

    /// Instant at which the current wait slice ends, as seen from `now`.
    pub fn slice_end(&self, now: Instant) -> Instant {
        let due = self.baseline + self.period;
        due.min(now + self.pulse_interval)
    }

    /// Waiting → Running.
    pub fn begin_cycle(&mut self) {
        debug_assert_eq!(self.state, SchedulerState::Waiting);
        self.state = SchedulerState::Running;
        self.due_now = false;
    }

    /// Running → Waiting, measuring the next period from `completed_at`.
    pub fn complete_cycle(&mut self, completed_at: Instant) {
        self.state = SchedulerState::Waiting;
        self.baseline = completed_at;
    }
}

// ── Station ───────────────────────────────────────────────────────────────────

/// What one [`Station::step`] did.
#[derive(Debug)]
pub enum Step {
    /// Slept for one wait slice, then pulsed.
    Waited(Duration),
    /// Ran a full cycle, then pulsed.
    Cycled(CycleReport),
}

/// The running station: scheduler, pipeline and liveness sink.
pub struct Station {
    scheduler: CycleScheduler,
    pipeline: Pipeline,
    liveness: Box<dyn Liveness>,
    cycles: u64,
}

impl Station {
    pub fn new(scheduler: CycleScheduler, pipeline: Pipeline, liveness: Box<dyn Liveness>) -> Self {
        Self {
            scheduler,
            pipeline,
            liveness,
            cycles: 0,
        }
    }

    /// Build the scheduler from `cfg`, baselined at the current instant.
    pub fn from_config(cfg: &StationConfig, pipeline: Pipeline, liveness: Box<dyn Liveness>) -> Self {
        let mut scheduler =
            CycleScheduler::new(cfg.period(), cfg.pulse_interval(), Instant::now());
        if cfg.cycle.run_on_start {
            scheduler.fire_immediately();
        }
        Self::new(scheduler, pipeline, liveness)
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    /// Cycles completed since start.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle immediately, regardless of the period.
    pub async fn run_once(&mut self) -> CycleReport {
        self.scheduler.begin_cycle();
        let report = self.pipeline.run_cycle(self.liveness.as_mut()).await;
        self.scheduler.complete_cycle(Instant::now());
        self.liveness.keep_alive();
        self.cycles += 1;
        report
    }

    /// Either run a due cycle or sleep one slice; pulse liveness afterwards.
    pub async fn step(&mut self) -> Step {
        let now = Instant::now();
        match self.scheduler.poll(now) {
            Tick::Due => Step::Cycled(self.run_once().await),
            Tick::Wait { remaining } => {
                let until = self.scheduler.slice_end(now);
                sleep_until(until).await;
                self.liveness.keep_alive();
                debug!(remaining_ms = remaining.as_millis() as u64, "waiting for next cycle");
                Step::Waited(until - now)
            }
        }
    }

    /// Operate forever.  Only external termination ends this loop.
    pub async fn run(&mut self) {
        info!(
            period_ms = self.scheduler.period().as_millis() as u64,
            pulse_interval_ms = self.scheduler.pulse_interval().as_millis() as u64,
            addresses = self.pipeline.addresses().len(),
            "station running"
        );
        self.liveness.keep_alive();
        loop {
            self.step().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
