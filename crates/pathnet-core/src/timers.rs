//! Request-scoped named stopwatches
//!
//! Each timer moves `Unstarted -> Running -> Concluded`. Starting a stopped
//! timer again resumes it and keeps accumulating. `conclude_all` closes
//! every open timer against a single instant and freezes the resulting
//! mapping; later calls return the same frozen value.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Frozen timer results: name to elapsed milliseconds
pub type Timings = BTreeMap<String, u64>;

/// Timer misuse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("timers already concluded, cannot {action} \"{name}\"")]
    AlreadyConcluded { action: &'static str, name: String },

    #[error("timer \"{0}\" is not running")]
    NotRunning(String),
}

/// Lifecycle state of a single timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Unstarted,
    Running,
    Concluded,
}

#[derive(Debug, Clone)]
struct Timer {
    accumulated: Duration,
    started: Option<Instant>,
}

impl Timer {
    fn elapsed_at(&self, now: Instant) -> Duration {
        match self.started {
            Some(start) => self.accumulated + now.saturating_duration_since(start),
            None => self.accumulated,
        }
    }
}

/// Registry of named timers owned by one request
#[derive(Debug, Default, Clone)]
pub struct Timers {
    timers: BTreeMap<String, Timer>,
    frozen: OnceLock<Timings>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the named timers already running
    pub fn started(names: &[&str]) -> Self {
        let mut timers = Self::new();
        let now = Instant::now();
        for name in names {
            timers.timers.insert(
                (*name).to_string(),
                Timer {
                    accumulated: Duration::ZERO,
                    started: Some(now),
                },
            );
        }
        timers
    }

    /// Start (or resume) a timer
    pub fn start(&mut self, name: &str) -> Result<(), TimerError> {
        if self.is_concluded() {
            return Err(TimerError::AlreadyConcluded {
                action: "start",
                name: name.to_string(),
            });
        }
        let timer = self.timers.entry(name.to_string()).or_insert(Timer {
            accumulated: Duration::ZERO,
            started: None,
        });
        if timer.started.is_none() {
            timer.started = Some(Instant::now());
        }
        Ok(())
    }

    /// Stop a running timer, folding its interval into the accumulated total
    pub fn stop(&mut self, name: &str) -> Result<(), TimerError> {
        if self.is_concluded() {
            return Err(TimerError::AlreadyConcluded {
                action: "stop",
                name: name.to_string(),
            });
        }
        let now = Instant::now();
        let timer = self
            .timers
            .get_mut(name)
            .filter(|t| t.started.is_some())
            .ok_or_else(|| TimerError::NotRunning(name.to_string()))?;
        timer.accumulated = timer.elapsed_at(now);
        timer.started = None;
        Ok(())
    }

    /// Stop the first timer and start the second
    pub fn switch(&mut self, stop: &str, start: &str) -> Result<(), TimerError> {
        self.stop(stop)?;
        self.start(start)
    }

    pub fn state(&self, name: &str) -> TimerState {
        match self.timers.get(name) {
            None => TimerState::Unstarted,
            Some(_) if self.is_concluded() => TimerState::Concluded,
            Some(t) if t.started.is_some() => TimerState::Running,
            Some(_) => TimerState::Concluded,
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// Close every open timer and freeze the mapping.
    ///
    /// Only the first call computes; every call returns the same mapping.
    pub fn conclude_all(&self) -> &Timings {
        self.frozen.get_or_init(|| {
            let now = Instant::now();
            self.timers
                .iter()
                .map(|(name, t)| (name.clone(), t.elapsed_at(now).as_millis() as u64))
                .collect()
        })
    }

    /// Concluded timings, or `None` when nothing was timed
    pub fn timings(&self) -> Option<&Timings> {
        let timings = self.conclude_all();
        (!timings.is_empty()).then_some(timings)
    }

    /// Serialization hook: an empty mapping is omitted rather than written as `{}`
    pub fn is_empty(&self) -> bool {
        self.timings().is_none()
    }
}

impl Serialize for Timers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.conclude_all().serialize(serializer)
    }
}
